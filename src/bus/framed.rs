//! Generic link-layer driver over any async byte stream. The serial and
//! TCP transports differ only in how the stream is opened.

use crate::bus::{encode_for_wire, TelegramAssembler};
use crate::error::EmsError;
use std::collections::VecDeque;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

pub(crate) struct FramedBus<S> {
    stream: S,
    assembler: TelegramAssembler,
    ready: VecDeque<Vec<u8>>,
}

impl<S> FramedBus<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub fn new(stream: S) -> FramedBus<S> {
        FramedBus {
            stream,
            assembler: TelegramAssembler::new(),
            ready: VecDeque::new(),
        }
    }

    /// Reads from the stream until one complete telegram is available.
    pub async fn recv_telegram(&mut self) -> Result<Vec<u8>, EmsError> {
        loop {
            if let Some(telegram) = self.ready.pop_front() {
                return Ok(telegram);
            }
            let mut buf = [0u8; 256];
            let len = self.stream.read(&mut buf).await?;
            if len == 0 {
                return Err(EmsError::Transport("bus connection closed".to_string()));
            }
            self.assembler.feed(&buf[..len], &mut self.ready);
        }
    }

    /// Writes one command telegram, adding our source address and CRC.
    pub async fn send_telegram(&mut self, telegram: &[u8]) -> Result<(), EmsError> {
        let wire = encode_for_wire(telegram);
        self.stream
            .write_all(&wire)
            .await
            .map_err(|err| EmsError::BusSend(err.to_string()))?;
        Ok(())
    }
}
