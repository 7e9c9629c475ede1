//! EMS Protocol Constants
//!
//! This module defines the constants used on the EMS heating bus: the
//! fixed one-byte module addresses, the message type ids of the telegrams
//! the collector understands, record sizes and the parameter cells the
//! command interface writes to.

use std::time::Duration;

// ----------------------------------------------------------------------------
// Bus addresses
// ----------------------------------------------------------------------------

/// Boiler controller (Universeller Brennerautomat).
pub const ADDRESS_UBA: u8 = 0x08;

/// Operating unit on the boiler.
pub const ADDRESS_BC10: u8 = 0x09;

/// This program's own bus address.
pub const ADDRESS_PC: u8 = 0x0B;

/// Room controller.
pub const ADDRESS_RC: u8 = 0x10;

/// Mixer/warm-water module for heating circuit 1.
pub const ADDRESS_WM10: u8 = 0x11;

/// Mixer module for heating circuit 2.
pub const ADDRESS_MM10: u8 = 0x21;

/// High bit of the destination byte. Set on inbound telegrams it marks a
/// polling request; set on outbound telegrams it requests a response.
pub const DEST_RESPONSE_FLAG: u8 = 0x80;

// ----------------------------------------------------------------------------
// Message type ids
// ----------------------------------------------------------------------------

pub const MSG_UBA_ERRORS_ACTIVE: u8 = 0x10;
pub const MSG_UBA_ERRORS_STORED: u8 = 0x11;
pub const MSG_UBA_PARAMETERS: u8 = 0x16;
pub const MSG_UBA_MONITOR_FAST: u8 = 0x18;
pub const MSG_UBA_MONITOR_SLOW: u8 = 0x19;
pub const MSG_UBA_PARAMETER_WW: u8 = 0x33;
pub const MSG_UBA_MONITOR_WW: u8 = 0x34;

pub const MSG_RC_SYSTEM_TIME: u8 = 0x06;
pub const MSG_RC_HK1_PARAMS: u8 = 0x3D;
pub const MSG_RC_HK1_MONITOR: u8 = 0x3E;
pub const MSG_RC_HK2_PARAMS: u8 = 0x47;
pub const MSG_RC_HK2_MONITOR: u8 = 0x48;
pub const MSG_RC_OUTDOOR_TEMP: u8 = 0xA3;

pub const MSG_WM10_TEMP1: u8 = 0x9C;
pub const MSG_WM10_TEMP2: u8 = 0x1E;
pub const MSG_MM10_TEMP: u8 = 0xAB;

// ----------------------------------------------------------------------------
// Record layouts
// ----------------------------------------------------------------------------

/// Post-link-layer frame header: source, dest, type, offset.
pub const FRAME_HEADER_SIZE: usize = 4;

/// One entry in the controller's error log (see [`crate::ems::value::ErrorRecord`]).
pub const ERROR_RECORD_SIZE: usize = 12;

/// The RC's clock record (see [`crate::ems::value::SystemTimeRecord`]).
pub const SYSTEM_TIME_RECORD_SIZE: usize = 8;

/// Upper bound on error-log entries assembled for one `geterrors` request.
pub const ERROR_LOG_CAPACITY: usize = 32;

// ----------------------------------------------------------------------------
// Parameter cells addressed by the command interface
// ----------------------------------------------------------------------------

/// Heating-circuit parameter block (RC types 0x3D/0x47): offsets of the
/// temperature setpoints, stored as half-degrees.
pub const HK_PARAM_NIGHT_TEMP: u8 = 1;
pub const HK_PARAM_DAY_TEMP: u8 = 2;
pub const HK_PARAM_HOLIDAY_TEMP: u8 = 3;

/// Warm-water parameter block (UBA type 0x33) cell offsets.
pub const WW_PARAM_TEMP: u8 = 2;
pub const WW_PARAM_DESINFECT_ENABLE: u8 = 4;
pub const WW_PARAM_DESINFECT_DAY: u8 = 5;
pub const WW_PARAM_ZIRKPUMP_ENABLE: u8 = 6;
pub const WW_PARAM_ZIRKPUMP_COUNT: u8 = 7;
pub const WW_PARAM_DESINFECT_TEMP: u8 = 8;

// ----------------------------------------------------------------------------
// Timing
// ----------------------------------------------------------------------------

/// Deadline for a correlated bus reply. Bounded; never infinite.
pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_millis(2000);

/// The EMS bus runs at 9600 baud, 8N1.
pub const BUS_BAUD_RATE: u32 = 9600;
