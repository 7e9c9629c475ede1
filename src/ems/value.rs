//! # EMS Value Model
//!
//! A single reading taken off the bus: a measured quantity tag, the
//! logical subject it belongs to, and one of seven payload shapes. Values
//! are constructed once by the decoder and passed to the dispatch
//! callback; they never change afterwards.

use crate::constants::{ERROR_RECORD_SIZE, SYSTEM_TIME_RECORD_SIZE};

/// The measured quantity a value describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    SollTemp,
    IstTemp,
    SetTemp,
    GedaempfteTemp,
    MaxLeistung,
    MomLeistung,
    Flammenstrom,
    Systemdruck,
    BetriebsZeit,
    HeizZeit,
    Brennerstarts,
    PumpenModulation,
    WarmwasserbereitungsZeit,
    WarmwasserBereitungen,
    EinschaltHysterese,
    AusschaltHysterese,
    MinModulation,
    MaxModulation,
    AntipendelZeit,
    PumpenNachlaufZeit,
    EinschaltoptimierungsZeit,
    AusschaltoptimierungsZeit,
    TemperaturAenderung,
    Mischersteuerung,
    FlammeAktiv,
    BrennerAktiv,
    ZuendungAktiv,
    PumpeAktiv,
    DreiWegeVentilAufWW,
    ZirkulationAktiv,
    Tagbetrieb,
    Sommerbetrieb,
    Automatikbetrieb,
    Ausschaltoptimierung,
    Einschaltoptimierung,
    WWVorrang,
    Estrichtrocknung,
    Ferien,
    Frostschutz,
    Party,
    SchaltuhrEin,
    EinmalLadungAktiv,
    DesinfektionAktiv,
    NachladungAktiv,
    WarmwasserBereitung,
    WarmwasserTempOK,
    WWSystemType,
    Schaltpunkte,
    HKKennlinie,
    ServiceCode,
    FehlerCode,
    Fehler,
    SystemZeit,
}

/// The logical subject a value belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubType {
    None,
    Kessel,
    WW,
    HK1,
    HK2,
    Raum,
    Aussen,
    Ruecklauf,
    Abgas,
    Zirkulation,
}

/// The RC's clock record as delivered in a system-time telegram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SystemTimeRecord {
    /// Years since 2000.
    pub year: u8,
    pub month: u8,
    pub hour: u8,
    pub day: u8,
    pub minute: u8,
    pub second: u8,
    pub day_of_week: u8,
    /// Daylight saving time in effect.
    pub dst: bool,
}

impl SystemTimeRecord {
    /// Decodes the 8-byte wire layout: year, month, hour, day, minute,
    /// second, day of week, flags (bit 0 = DST).
    pub fn parse(data: &[u8]) -> Option<SystemTimeRecord> {
        if data.len() < SYSTEM_TIME_RECORD_SIZE {
            return None;
        }
        Some(SystemTimeRecord {
            year: data[0],
            month: data[1],
            hour: data[2],
            day: data[3],
            minute: data[4],
            second: data[5],
            day_of_week: data[6],
            dst: data[7] & 0x01 != 0,
        })
    }
}

/// One entry of the controller's error log.
///
/// The controller stores twelve bytes per slot: a two-character display
/// code, the numeric cause code, an abbreviated timestamp, the fault
/// duration and the address of the module that raised it. Unused slots
/// are filled with 0x00 or 0xFF.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorRecord {
    pub display_code: [u8; 2],
    pub cause_code: u16,
    /// Years since 2000.
    pub year: u8,
    pub month: u8,
    pub hour: u8,
    pub day: u8,
    pub minute: u8,
    pub duration_minutes: u16,
    pub source: u8,
}

impl ErrorRecord {
    /// Decodes the 12-byte wire layout.
    pub fn parse(data: &[u8]) -> Option<ErrorRecord> {
        if data.len() < ERROR_RECORD_SIZE {
            return None;
        }
        Some(ErrorRecord {
            display_code: [data[0], data[1]],
            cause_code: u16::from_be_bytes([data[2], data[3]]),
            year: data[4],
            month: data[5],
            hour: data[6],
            day: data[7],
            minute: data[8],
            duration_minutes: u16::from_be_bytes([data[9], data[10]]),
            source: data[11],
        })
    }

    /// Whether this slot holds an actual error entry.
    pub fn has_entry(&self) -> bool {
        self.display_code[0] != 0x00 && self.display_code[0] != 0xFF
    }
}

/// An error-log entry together with its position in the log and the
/// telegram type it was read from (active vs stored errors).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorEntry {
    /// Telegram type id the record arrived in (0x10 active, 0x11 stored).
    pub source_type: u8,
    /// Slot index within the log.
    pub index: u32,
    pub record: ErrorRecord,
}

/// The payload of a value, one of seven shapes.
#[derive(Debug, Clone, PartialEq)]
pub enum Reading {
    Numeric(f64),
    Boolean(bool),
    Enumeration(u8),
    Kennlinie { low: u8, medium: u8, high: u8 },
    SystemTime(SystemTimeRecord),
    Error(ErrorEntry),
    Formatted(String),
}

/// Represents a single decoded reading from the bus.
#[derive(Debug, Clone, PartialEq)]
pub struct EmsValue {
    value_type: ValueType,
    subtype: SubType,
    reading: Reading,
}

impl EmsValue {
    /// Builds a numeric value from a big-endian byte slice.
    ///
    /// Values with the highest bit of the first byte set are treated as
    /// negative, e.g. two bytes 0xFF 0xFE give -2 before scaling.
    pub fn numeric(value_type: ValueType, subtype: SubType, data: &[u8], divider: i32) -> EmsValue {
        let mut value: i64 = 0;
        for &byte in data {
            value = (value << 8) | i64::from(byte);
        }
        if !data.is_empty() && data[0] & 0x80 != 0 {
            value -= 1i64 << (data.len() * 8);
        }
        EmsValue {
            value_type,
            subtype,
            reading: Reading::Numeric(value as f64 / f64::from(divider)),
        }
    }

    /// Builds a boolean value from bit `bit` of `byte`.
    pub fn boolean(value_type: ValueType, subtype: SubType, byte: u8, bit: u8) -> EmsValue {
        EmsValue {
            value_type,
            subtype,
            reading: Reading::Boolean(byte & (1 << bit) != 0),
        }
    }

    /// Builds an enumeration value from one raw byte.
    pub fn enumeration(value_type: ValueType, subtype: SubType, value: u8) -> EmsValue {
        EmsValue {
            value_type,
            subtype,
            reading: Reading::Enumeration(value),
        }
    }

    /// Builds a heating-curve triple.
    pub fn kennlinie(
        value_type: ValueType,
        subtype: SubType,
        low: u8,
        medium: u8,
        high: u8,
    ) -> EmsValue {
        EmsValue {
            value_type,
            subtype,
            reading: Reading::Kennlinie { low, medium, high },
        }
    }

    /// Wraps a clock record.
    pub fn system_time(value_type: ValueType, subtype: SubType, record: SystemTimeRecord) -> EmsValue {
        EmsValue {
            value_type,
            subtype,
            reading: Reading::SystemTime(record),
        }
    }

    /// Wraps an error-log entry.
    pub fn error(value_type: ValueType, subtype: SubType, entry: ErrorEntry) -> EmsValue {
        EmsValue {
            value_type,
            subtype,
            reading: Reading::Error(entry),
        }
    }

    /// Wraps a pre-rendered string.
    pub fn formatted(value_type: ValueType, subtype: SubType, value: String) -> EmsValue {
        EmsValue {
            value_type,
            subtype,
            reading: Reading::Formatted(value),
        }
    }

    pub fn value_type(&self) -> ValueType {
        self.value_type
    }

    pub fn subtype(&self) -> SubType {
        self.subtype
    }

    pub fn reading(&self) -> &Reading {
        &self.reading
    }

    /// Convenience accessor for numeric readings.
    pub fn as_numeric(&self) -> Option<f64> {
        match self.reading {
            Reading::Numeric(v) => Some(v),
            _ => None,
        }
    }

    /// Convenience accessor for boolean readings.
    pub fn as_bool(&self) -> Option<bool> {
        match self.reading {
            Reading::Boolean(v) => Some(v),
            _ => None,
        }
    }
}
