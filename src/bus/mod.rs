//! The bus module contains the link layer of the EMS bus: telegram
//! reassembly and CRC validation, the gateway task that owns the physical
//! transport, and the transport implementations (serial port, TCP tunnel,
//! and a channel-backed mock for tests).
//!
//! # Wire format
//!
//! The bus interface marks a line break as the byte sequence
//! `0xFF 0x00 0x00` and escapes a literal 0xFF data byte as `0xFF 0xFF`
//! (termios parity-mark semantics; a serial-to-TCP bridge must forward
//! the marks unchanged). Each telegram ends with a CRC byte over all
//! preceding bytes; the assembler verifies and strips it. Runs shorter
//! than a frame header are bus polls and are dropped without comment.

mod framed;
pub mod gateway;
pub mod mock;
pub mod serial;
pub mod tcp;

pub use gateway::{BusHandle, BusTransport, EmsGateway};
pub use mock::{mock_bus, MockBus, MockTransport};
pub use serial::SerialBusTransport;
pub use tcp::TcpBusTransport;

use crate::constants::{ADDRESS_PC, FRAME_HEADER_SIZE};
use crate::error::EmsError;
use crate::logging::log_debug;
use std::collections::VecDeque;

/// Upper bound on a telegram's wire length; longer accumulations mean we
/// lost sync and must resynchronise at the next break.
const MAX_TELEGRAM_SIZE: usize = 128;

/// Link-layer CRC: 8-bit shift register with polynomial 0x0C.
pub(crate) fn crc8(data: &[u8]) -> u8 {
    let mut crc: u8 = 0;
    for &byte in data {
        crc = if crc & 0x80 != 0 {
            (crc << 1) ^ 0x0C
        } else {
            crc << 1
        };
        crc ^= byte;
    }
    crc
}

/// Checks the trailing CRC byte of a completed telegram run.
pub(crate) fn verify_crc(run: &[u8]) -> Result<(), EmsError> {
    let (expected, data) = match run.split_last() {
        Some(split) => split,
        None => return Ok(()),
    };
    let calculated = crc8(data);
    if *expected != calculated {
        return Err(EmsError::InvalidChecksum {
            expected: *expected,
            calculated,
        });
    }
    Ok(())
}

/// Prefixes our own source address and appends the CRC, producing the
/// byte run written to the bus for one outbound command telegram.
pub(crate) fn encode_for_wire(telegram: &[u8]) -> Vec<u8> {
    let mut wire = Vec::with_capacity(telegram.len() + 2);
    wire.push(ADDRESS_PC);
    wire.extend_from_slice(telegram);
    wire.push(crc8(&wire));
    wire
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AssemblerState {
    /// Plain data bytes.
    Data,
    /// Seen 0xFF; the next byte decides between escape and mark.
    Escape,
    /// Seen 0xFF 0x00; a following 0x00 is a line break.
    Mark,
}

/// Accumulates raw bus bytes and splits them into CRC-verified telegrams.
pub(crate) struct TelegramAssembler {
    buf: Vec<u8>,
    state: AssemblerState,
}

impl TelegramAssembler {
    pub fn new() -> TelegramAssembler {
        TelegramAssembler {
            buf: Vec::new(),
            state: AssemblerState::Data,
        }
    }

    /// Feeds raw bytes from the transport, appending every completed
    /// telegram (CRC stripped) to `out`.
    pub fn feed(&mut self, bytes: &[u8], out: &mut VecDeque<Vec<u8>>) {
        for &byte in bytes {
            match self.state {
                AssemblerState::Data => {
                    if byte == 0xFF {
                        self.state = AssemblerState::Escape;
                    } else {
                        self.push(byte);
                    }
                }
                AssemblerState::Escape => {
                    if byte == 0x00 {
                        self.state = AssemblerState::Mark;
                    } else {
                        // 0xFF 0xFF is a literal 0xFF data byte
                        self.push(0xFF);
                        if byte != 0xFF {
                            self.push(byte);
                        }
                        self.state = AssemblerState::Data;
                    }
                }
                AssemblerState::Mark => {
                    if byte == 0x00 {
                        self.finish(out);
                    } else {
                        // parity error on `byte`: the telegram is corrupt
                        log_debug("Discarding telegram after parity error");
                        self.buf.clear();
                    }
                    self.state = AssemblerState::Data;
                }
            }
        }
    }

    fn push(&mut self, byte: u8) {
        if self.buf.len() >= MAX_TELEGRAM_SIZE {
            log_debug("Telegram overlong, resynchronising");
            self.buf.clear();
        }
        self.buf.push(byte);
    }

    fn finish(&mut self, out: &mut VecDeque<Vec<u8>>) {
        // header + at least the CRC byte; anything shorter is a bus poll
        if self.buf.len() > FRAME_HEADER_SIZE {
            match verify_crc(&self.buf) {
                Ok(()) => {
                    self.buf.pop();
                    out.push_back(std::mem::take(&mut self.buf));
                    return;
                }
                Err(err) => log_debug(&format!("Dropping telegram: {err}")),
            }
        }
        self.buf.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::ADDRESS_PC;

    fn wire(telegram: &[u8]) -> Vec<u8> {
        let mut bytes = telegram.to_vec();
        bytes.push(crc8(telegram));
        bytes.extend([0xFF, 0x00, 0x00]);
        bytes
    }

    #[test]
    fn assembles_telegram_with_valid_crc() {
        let telegram = [0x08, 0x00, 0x18, 0x00, 0x01, 0x9A];
        let mut assembler = TelegramAssembler::new();
        let mut out = VecDeque::new();
        assembler.feed(&wire(&telegram), &mut out);
        assert_eq!(out.pop_front().unwrap(), telegram.to_vec());
        assert!(out.is_empty());
    }

    #[test]
    fn reassembles_across_reads() {
        let telegram = [0x10, 0x00, 0x06, 0x00, 12, 3, 4, 5, 6, 7, 2, 0];
        let bytes = wire(&telegram);
        let mut assembler = TelegramAssembler::new();
        let mut out = VecDeque::new();
        for chunk in bytes.chunks(3) {
            assembler.feed(chunk, &mut out);
        }
        assert_eq!(out.pop_front().unwrap(), telegram.to_vec());
    }

    #[test]
    fn unescapes_literal_ff() {
        let telegram = [0x08, 0x00, 0x19, 0x00, 0xFF, 0x38];
        let mut bytes = Vec::new();
        for &byte in &telegram {
            bytes.push(byte);
            if byte == 0xFF {
                bytes.push(0xFF);
            }
        }
        let crc = crc8(&telegram);
        bytes.push(crc);
        if crc == 0xFF {
            bytes.push(0xFF);
        }
        bytes.extend([0xFF, 0x00, 0x00]);

        let mut assembler = TelegramAssembler::new();
        let mut out = VecDeque::new();
        assembler.feed(&bytes, &mut out);
        assert_eq!(out.pop_front().unwrap(), telegram.to_vec());
    }

    #[test]
    fn drops_telegram_with_bad_crc() {
        let telegram = [0x08, 0x00, 0x18, 0x00, 0x01];
        let mut bytes = telegram.to_vec();
        bytes.push(crc8(&telegram) ^ 0x55);
        bytes.extend([0xFF, 0x00, 0x00]);

        let mut assembler = TelegramAssembler::new();
        let mut out = VecDeque::new();
        assembler.feed(&bytes, &mut out);
        assert!(out.is_empty());
    }

    #[test]
    fn drops_bus_polls() {
        // a poll is a single address byte before the break
        let mut assembler = TelegramAssembler::new();
        let mut out = VecDeque::new();
        assembler.feed(&[0x8B, 0xFF, 0x00, 0x00], &mut out);
        assert!(out.is_empty());

        // and the next telegram still frames
        let telegram = [0x08, 0x00, 0x18, 0x00, 0x01, 0x9A];
        assembler.feed(&wire(&telegram), &mut out);
        assert_eq!(out.pop_front().unwrap(), telegram.to_vec());
    }

    #[test]
    fn discards_buffer_on_parity_error() {
        let telegram = [0x08, 0x00, 0x18, 0x00, 0x01, 0x9A];
        let mut assembler = TelegramAssembler::new();
        let mut out = VecDeque::new();
        // garbage run hit by a parity mark, then a clean telegram
        assembler.feed(&[0x12, 0x34, 0xFF, 0x00, 0x56], &mut out);
        assembler.feed(&wire(&telegram), &mut out);
        assert_eq!(out.len(), 1);
        assert_eq!(out.pop_front().unwrap(), telegram.to_vec());
    }

    #[test]
    fn encodes_outbound_with_source_and_crc() {
        let wire = encode_for_wire(&[0x10, 0x3D, 0x02, 43]);
        assert_eq!(wire[0], ADDRESS_PC);
        assert_eq!(&wire[1..5], &[0x10, 0x3D, 0x02, 43]);
        assert_eq!(*wire.last().unwrap(), crc8(&wire[..5]));
    }
}
