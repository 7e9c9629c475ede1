//! # EMS Error Handling
//!
//! This module defines the EmsError enum, which represents the different
//! error types that can occur in the ems-rs crate.

use thiserror::Error;

/// Represents the different error types that can occur in the EMS crate.
#[derive(Debug, Error)]
pub enum EmsError {
    /// Indicates an error on the bus transport (serial port or TCP tunnel).
    #[error("Transport error: {0}")]
    Transport(String),

    /// Indicates a socket-level I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Indicates a link-layer checksum mismatch.
    #[error("Invalid checksum: expected 0x{expected:02X}, calculated 0x{calculated:02X}")]
    InvalidChecksum { expected: u8, calculated: u8 },

    /// Indicates that handing a command telegram to the bus failed.
    #[error("Bus send failed: {0}")]
    BusSend(String),

    /// Indicates that no matching reply arrived within the deadline.
    #[error("Timed out waiting for a bus reply")]
    ResponseTimeout,
}
