//! # Response Router
//!
//! Routes PC-directed inbound frames from the gateway to the command
//! connections. Connections are held in a registry keyed by an integer
//! handle; a handle whose receiver is gone resolves to nothing, so a
//! frame arriving for a closed connection is simply dropped.

use crate::ems::frame::EmsFrame;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

#[derive(Default)]
struct Registry {
    next_handle: u64,
    connections: HashMap<u64, mpsc::UnboundedSender<Arc<EmsFrame>>>,
}

/// Fan-out point for frames addressed to this program.
///
/// The registry is only touched from the reactor thread (accept, close,
/// dispatch); the mutex is never held across an await point.
#[derive(Default)]
pub struct Router {
    registry: Mutex<Registry>,
}

impl Router {
    pub fn new() -> Arc<Router> {
        Arc::new(Router::default())
    }

    /// Adds a connection to the live set, returning its handle and the
    /// receiving end of its frame queue.
    pub fn register(&self) -> (u64, mpsc::UnboundedReceiver<Arc<EmsFrame>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut registry = self.registry.lock().unwrap();
        let handle = registry.next_handle;
        registry.next_handle += 1;
        registry.connections.insert(handle, tx);
        (handle, rx)
    }

    /// Removes a connection from the live set.
    pub fn unregister(&self, handle: u64) {
        self.registry.lock().unwrap().connections.remove(&handle);
    }

    /// Offers a PC-directed frame to every live connection; each decides
    /// for itself whether the frame answers its pending request.
    pub fn dispatch(&self, frame: Arc<EmsFrame>) {
        let mut registry = self.registry.lock().unwrap();
        registry
            .connections
            .retain(|_, tx| tx.send(Arc::clone(&frame)).is_ok());
    }

    /// Number of live connections.
    pub fn connection_count(&self) -> usize {
        self.registry.lock().unwrap().connections.len()
    }
}
