//! Bus access through a serial-to-TCP bridge that forwards the interface
//! bytes (including parity marks) unchanged.

use crate::bus::framed::FramedBus;
use crate::bus::gateway::BusTransport;
use crate::error::EmsError;
use async_trait::async_trait;
use tokio::net::TcpStream;

pub struct TcpBusTransport {
    inner: FramedBus<TcpStream>,
}

impl TcpBusTransport {
    /// Connects to the bridge at `addr` (`host:port`).
    pub async fn connect(addr: &str) -> Result<TcpBusTransport, EmsError> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|err| EmsError::Transport(err.to_string()))?;
        Ok(TcpBusTransport {
            inner: FramedBus::new(stream),
        })
    }
}

#[async_trait]
impl BusTransport for TcpBusTransport {
    async fn recv_telegram(&mut self) -> Result<Vec<u8>, EmsError> {
        self.inner.recv_telegram().await
    }

    async fn send_telegram(&mut self, telegram: &[u8]) -> Result<(), EmsError> {
        self.inner.send_telegram(telegram).await
    }
}
