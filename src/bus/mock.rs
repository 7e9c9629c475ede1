//! Channel-backed bus transport for tests: frames are injected and sent
//! telegrams observed without any physical link.

use crate::bus::gateway::BusTransport;
use crate::error::EmsError;
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Transport half handed to the gateway.
pub struct MockTransport {
    inbound: mpsc::UnboundedReceiver<Vec<u8>>,
    outbound: mpsc::UnboundedSender<Vec<u8>>,
}

/// Test half: inject inbound frames, observe outbound telegrams.
pub struct MockBus {
    pub inject: mpsc::UnboundedSender<Vec<u8>>,
    pub sent: mpsc::UnboundedReceiver<Vec<u8>>,
}

impl MockBus {
    /// Injects one inbound frame, post-link-layer layout (source byte
    /// included, no CRC).
    pub fn inject_frame(&self, frame: &[u8]) {
        let _ = self.inject.send(frame.to_vec());
    }
}

/// Creates a connected transport/controller pair.
pub fn mock_bus() -> (MockTransport, MockBus) {
    let (inject, inbound) = mpsc::unbounded_channel();
    let (outbound, sent) = mpsc::unbounded_channel();
    (
        MockTransport { inbound, outbound },
        MockBus { inject, sent },
    )
}

#[async_trait]
impl BusTransport for MockTransport {
    async fn recv_telegram(&mut self) -> Result<Vec<u8>, EmsError> {
        self.inbound
            .recv()
            .await
            .ok_or_else(|| EmsError::Transport("mock bus closed".to_string()))
    }

    async fn send_telegram(&mut self, telegram: &[u8]) -> Result<(), EmsError> {
        self.outbound
            .send(telegram.to_vec())
            .map_err(|_| EmsError::BusSend("mock bus closed".to_string()))
    }
}
