//! The command module contains the TCP command interface: the acceptor
//! that tracks the live connection set, the per-client connection logic,
//! and the router that fans PC-directed bus frames out to connections.

pub mod connection;
pub mod router;

pub use connection::CommandConnection;
pub use router::Router;

use crate::bus::gateway::BusHandle;
use crate::constants::DEFAULT_RESPONSE_TIMEOUT;
use crate::error::EmsError;
use crate::logging::log_info;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

/// TCP acceptor for the command interface. Each accepted client becomes
/// a [`CommandConnection`] registered with the router; closed or failed
/// connections are removed from the live set.
pub struct CommandServer {
    listener: TcpListener,
    router: Arc<Router>,
    bus: BusHandle,
    response_timeout: Duration,
}

impl CommandServer {
    /// Binds the command endpoint.
    pub async fn bind(
        addr: &str,
        bus: BusHandle,
        router: Arc<Router>,
    ) -> Result<CommandServer, EmsError> {
        let listener = TcpListener::bind(addr).await?;
        Ok(CommandServer {
            listener,
            router,
            bus,
            response_timeout: DEFAULT_RESPONSE_TIMEOUT,
        })
    }

    /// Overrides the reply deadline handed to new connections.
    pub fn set_response_timeout(&mut self, timeout: Duration) {
        self.response_timeout = timeout;
    }

    /// The bound endpoint, useful when binding to port 0.
    pub fn local_addr(&self) -> Result<SocketAddr, EmsError> {
        Ok(self.listener.local_addr()?)
    }

    /// Accepts clients until the acceptor socket fails; that failure is
    /// fatal and surfaces to the enclosing process.
    pub async fn run(self) -> Result<(), EmsError> {
        loop {
            let (stream, peer) = self.listener.accept().await?;
            log_info(&format!("Command connection from {peer}"));

            let (handle, frames) = self.router.register();
            let connection =
                CommandConnection::new(stream, self.bus.clone(), frames, self.response_timeout);
            let router = Arc::clone(&self.router);
            tokio::spawn(async move {
                connection.run().await;
                router.unregister(handle);
                log_info(&format!("Command connection from {peer} closed"));
            });
        }
    }
}
