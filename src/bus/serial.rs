//! Direct serial-port access to the bus interface via `tokio_serial`.

use crate::bus::framed::FramedBus;
use crate::bus::gateway::BusTransport;
use crate::constants::BUS_BAUD_RATE;
use crate::error::EmsError;
use async_trait::async_trait;
use tokio_serial::{SerialPortBuilderExt, SerialStream};

pub struct SerialBusTransport {
    inner: FramedBus<SerialStream>,
}

impl SerialBusTransport {
    /// Opens the serial device of the bus interface at 9600 8N1.
    pub fn open(path: &str) -> Result<SerialBusTransport, EmsError> {
        let port = tokio_serial::new(path, BUS_BAUD_RATE)
            .open_native_async()
            .map_err(|err| EmsError::Transport(err.to_string()))?;
        Ok(SerialBusTransport {
            inner: FramedBus::new(port),
        })
    }
}

#[async_trait]
impl BusTransport for SerialBusTransport {
    async fn recv_telegram(&mut self) -> Result<Vec<u8>, EmsError> {
        self.inner.recv_telegram().await
    }

    async fn send_telegram(&mut self, telegram: &[u8]) -> Result<(), EmsError> {
        self.inner.send_telegram(telegram).await
    }
}
