//! # Bus Gateway
//!
//! The gateway task owns the physical transport and is the only place
//! that touches the bus. One `select!` loop drives it: inbound telegrams
//! are framed and dispatched (PC-directed frames to the response router,
//! broadcast data frames to the decoder), outbound command telegrams from
//! the connections are written one at a time. This serialises bus writes
//! and preserves receive order for the value handler.

use crate::command::Router;
use crate::constants::{ADDRESS_PC, DEST_RESPONSE_FLAG};
use crate::ems::decoder::EmsDecoder;
use crate::ems::frame::EmsFrame;
use crate::error::EmsError;
use crate::logging::log_error;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

/// Contract between the gateway and a physical bus link.
///
/// Implementations deliver complete, CRC-validated inbound telegrams one
/// at a time, in receive order, and accept one outbound command telegram
/// per call.
#[async_trait]
pub trait BusTransport: Send {
    /// Receives the next complete inbound telegram, source byte included.
    async fn recv_telegram(&mut self) -> Result<Vec<u8>, EmsError>;

    /// Writes one command telegram (without source byte) to the bus.
    async fn send_telegram(&mut self, telegram: &[u8]) -> Result<(), EmsError>;
}

type SendRequest = (Vec<u8>, oneshot::Sender<Result<(), EmsError>>);

/// Cloneable handle for enqueueing command telegrams to the bus.
///
/// `send` resolves once the gateway has written the telegram, so a send
/// failure reaches the originating caller instead of tearing anything
/// down.
#[derive(Clone)]
pub struct BusHandle {
    tx: mpsc::Sender<SendRequest>,
}

impl BusHandle {
    /// Hands one command telegram to the gateway and awaits the write.
    pub async fn send(&self, telegram: Vec<u8>) -> Result<(), EmsError> {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.tx
            .send((telegram, ack_tx))
            .await
            .map_err(|_| EmsError::BusSend("bus gateway is gone".to_string()))?;
        ack_rx
            .await
            .map_err(|_| EmsError::BusSend("bus gateway dropped the request".to_string()))?
    }
}

/// Owns the transport and routes telegrams between bus, decoder and
/// command connections.
pub struct EmsGateway<T: BusTransport> {
    transport: T,
    decoder: EmsDecoder,
    router: Arc<Router>,
    commands: mpsc::Receiver<SendRequest>,
}

impl<T: BusTransport> EmsGateway<T> {
    /// Creates a gateway and the send handle the command layer uses.
    pub fn new(transport: T, decoder: EmsDecoder, router: Arc<Router>) -> (EmsGateway<T>, BusHandle) {
        let (tx, rx) = mpsc::channel(16);
        (
            EmsGateway {
                transport,
                decoder,
                router,
                commands: rx,
            },
            BusHandle { tx },
        )
    }

    /// Drives the bus until the transport fails.
    ///
    /// Send failures are reported to the enqueueing caller and do not end
    /// the loop; a receive failure means the bus link is gone and is
    /// surfaced to the enclosing process.
    pub async fn run(mut self) -> Result<(), EmsError> {
        let mut commands_open = true;
        loop {
            tokio::select! {
                telegram = self.transport.recv_telegram() => {
                    self.dispatch(&telegram?);
                }
                command = self.commands.recv(), if commands_open => {
                    match command {
                        Some((telegram, ack)) => {
                            let result = self.transport.send_telegram(&telegram).await;
                            if let Err(err) = &result {
                                log_error(&format!("Bus send failed: {err}"));
                            }
                            let _ = ack.send(result);
                        }
                        None => commands_open = false,
                    }
                }
            }
        }
    }

    fn dispatch(&mut self, raw: &[u8]) {
        // runs shorter than a frame header are discarded silently
        let Some(frame) = EmsFrame::parse(raw) else {
            return;
        };
        if frame.dest & !DEST_RESPONSE_FLAG == ADDRESS_PC {
            self.router.dispatch(Arc::new(frame));
        } else {
            self.decoder.handle(&frame);
        }
    }
}
