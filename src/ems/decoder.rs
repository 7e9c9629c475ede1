//! # EMS Telegram Decoder
//!
//! Parses one inbound telegram into zero or more [`EmsValue`]s based on
//! its (source address, type id, offset). Each known telegram maps to a
//! static list of descriptors interpreted by one generic applier; a
//! descriptor only fires when its bytes lie fully inside the payload
//! window, so partial telegrams emit exactly the fields they carry.
//!
//! Telegram layouts follow the controller family's documented messages:
//! the boiler controller's fast/slow monitors, parameter and warm-water
//! blocks and error log, the room controller's clock, heating-circuit
//! monitors and outdoor temperature, and the mixer modules' temperature
//! reports.

use crate::constants::*;
use crate::ems::frame::EmsFrame;
use crate::ems::value::{EmsValue, ErrorEntry, ErrorRecord, SubType, SystemTimeRecord, ValueType};
use crate::ems::value::{SubType as S, ValueType as T};
use crate::logging::log_debug;

/// Callback invoked synchronously for every decoded value.
pub type ValueHandler = Box<dyn FnMut(EmsValue) + Send>;

/// Describes how to extract one value from a telegram payload at a given
/// logical offset.
#[derive(Debug, Clone, Copy)]
enum Descriptor {
    Numeric {
        offset: usize,
        width: usize,
        divider: i32,
        value_type: ValueType,
        subtype: SubType,
    },
    Bool {
        offset: usize,
        bit: u8,
        value_type: ValueType,
        subtype: SubType,
    },
}

const fn num(offset: usize, width: usize, divider: i32, value_type: T, subtype: S) -> Descriptor {
    Descriptor::Numeric {
        offset,
        width,
        divider,
        value_type,
        subtype,
    }
}

const fn bit(offset: usize, bit: u8, value_type: T, subtype: S) -> Descriptor {
    Descriptor::Bool {
        offset,
        bit,
        value_type,
        subtype,
    }
}

const UBA_MONITOR_FAST: &[Descriptor] = &[
    num(0, 1, 1, T::SollTemp, S::Kessel),
    num(1, 2, 10, T::IstTemp, S::Kessel),
    num(3, 1, 1, T::MaxLeistung, S::None),
    num(4, 1, 1, T::MomLeistung, S::None),
    num(11, 2, 10, T::IstTemp, S::WW),
    num(13, 2, 10, T::IstTemp, S::Ruecklauf),
    num(15, 2, 10, T::Flammenstrom, S::None),
    num(17, 1, 10, T::Systemdruck, S::None),
    bit(7, 0, T::FlammeAktiv, S::None),
    bit(7, 2, T::BrennerAktiv, S::None),
    bit(7, 3, T::ZuendungAktiv, S::None),
    bit(7, 5, T::PumpeAktiv, S::Kessel),
    bit(7, 6, T::DreiWegeVentilAufWW, S::None),
    bit(7, 7, T::ZirkulationAktiv, S::None),
];

const UBA_MONITOR_SLOW: &[Descriptor] = &[
    num(0, 2, 10, T::IstTemp, S::Aussen),
    num(2, 2, 10, T::IstTemp, S::Kessel),
    num(4, 2, 10, T::IstTemp, S::Abgas),
    num(9, 1, 1, T::PumpenModulation, S::None),
    num(10, 3, 1, T::Brennerstarts, S::None),
    num(13, 3, 1, T::BetriebsZeit, S::None),
    num(19, 3, 1, T::HeizZeit, S::None),
];

const UBA_PARAMETERS: &[Descriptor] = &[
    num(1, 1, 1, T::SetTemp, S::Kessel),
    num(4, 1, 1, T::EinschaltHysterese, S::Kessel),
    num(5, 1, 1, T::AusschaltHysterese, S::Kessel),
    num(6, 1, 1, T::AntipendelZeit, S::None),
    num(8, 1, 1, T::PumpenNachlaufZeit, S::Kessel),
    num(9, 1, 1, T::MaxModulation, S::Kessel),
    num(10, 1, 1, T::MinModulation, S::Kessel),
];

const UBA_MONITOR_WW: &[Descriptor] = &[
    num(0, 1, 1, T::SollTemp, S::WW),
    num(1, 2, 10, T::IstTemp, S::WW),
    num(10, 3, 1, T::WarmwasserbereitungsZeit, S::None),
    num(13, 3, 1, T::WarmwasserBereitungen, S::None),
    bit(5, 0, T::Tagbetrieb, S::WW),
    bit(5, 1, T::EinmalLadungAktiv, S::WW),
    bit(5, 2, T::DesinfektionAktiv, S::WW),
    bit(5, 3, T::WarmwasserBereitung, S::None),
    bit(5, 4, T::NachladungAktiv, S::WW),
    bit(5, 5, T::WarmwasserTempOK, S::None),
    bit(7, 0, T::Tagbetrieb, S::Zirkulation),
    bit(7, 2, T::ZirkulationAktiv, S::None),
];

const RC_OUTDOOR_TEMP: &[Descriptor] = &[num(0, 1, 1, T::GedaempfteTemp, S::Aussen)];

const WM_TEMP1: &[Descriptor] = &[
    num(0, 2, 10, T::IstTemp, S::HK1),
    // byte 2 = 0 -> pump off, 100 = 0x64 -> pump on
    bit(2, 2, T::PumpeAktiv, S::HK1),
];

const WM_TEMP2: &[Descriptor] = &[num(0, 2, 10, T::IstTemp, S::HK1)];

const MM_TEMP: &[Descriptor] = &[
    num(0, 1, 1, T::SollTemp, S::HK2),
    num(1, 2, 10, T::IstTemp, S::HK2),
    num(3, 1, 1, T::Mischersteuerung, S::None),
    // byte 3 = 0 -> pump off, 100 = 0x64 -> pump on
    bit(3, 2, T::PumpeAktiv, S::HK2),
];

const fn hk_monitor_descriptors(hk: S) -> [Descriptor; 16] {
    [
        num(2, 1, 2, T::SollTemp, S::Raum),
        num(3, 2, 10, T::IstTemp, S::Raum),
        num(5, 1, 1, T::EinschaltoptimierungsZeit, hk),
        num(6, 1, 1, T::AusschaltoptimierungsZeit, hk),
        num(14, 1, 1, T::SollTemp, hk),
        bit(0, 0, T::Ausschaltoptimierung, hk),
        bit(0, 1, T::Einschaltoptimierung, hk),
        bit(0, 2, T::Automatikbetrieb, hk),
        bit(0, 3, T::WWVorrang, hk),
        bit(0, 4, T::Estrichtrocknung, hk),
        bit(0, 5, T::Ferien, hk),
        bit(0, 6, T::Frostschutz, hk),
        bit(1, 0, T::Sommerbetrieb, hk),
        bit(1, 1, T::Tagbetrieb, hk),
        bit(1, 7, T::Party, hk),
        bit(13, 4, T::SchaltuhrEin, hk),
    ]
}

const HK1_MONITOR: [Descriptor; 16] = hk_monitor_descriptors(S::HK1);
const HK2_MONITOR: [Descriptor; 16] = hk_monitor_descriptors(S::HK2);

/// Decodes inbound telegrams into a stream of [`EmsValue`]s.
///
/// The value handler must be wired before the first telegram is handled
/// and must not change during operation; without one, telegrams are not
/// parsed at all.
#[derive(Default)]
pub struct EmsDecoder {
    handler: Option<ValueHandler>,
}

impl EmsDecoder {
    /// Creates a decoder without a value handler.
    pub fn new() -> EmsDecoder {
        EmsDecoder::default()
    }

    /// Installs the value handler. It runs synchronously on the reactor
    /// thread and must not block.
    pub fn set_handler<F>(&mut self, handler: F)
    where
        F: FnMut(EmsValue) + Send + 'static,
    {
        self.handler = Some(Box::new(handler));
    }

    /// Decodes one telegram, invoking the value handler for every field
    /// present in its payload window.
    ///
    /// All-zero headers and polling requests are discarded without
    /// decoding. Unknown (source, type) combinations are reported on the
    /// debug channel only.
    pub fn handle(&mut self, frame: &EmsFrame) {
        if frame.has_invalid_header() {
            return;
        }
        if frame.is_polling() {
            return;
        }
        if self.handler.is_none() {
            // pointless to parse in that case
            return;
        }

        let handled = match frame.source {
            ADDRESS_UBA => self.handle_uba(frame),
            ADDRESS_BC10 => matches!(frame.frame_type, 0x29),
            ADDRESS_RC => self.handle_rc(frame),
            ADDRESS_WM10 => self.handle_wm10(frame),
            ADDRESS_MM10 => self.handle_mm10(frame),
            _ => false,
        };

        if !handled {
            log_debug(&format!(
                "Unhandled telegram received (source 0x{:02X}, type 0x{:02X})",
                frame.source, frame.frame_type
            ));
        }
    }

    fn handle_uba(&mut self, frame: &EmsFrame) -> bool {
        match frame.frame_type {
            MSG_UBA_ERRORS_ACTIVE | MSG_UBA_ERRORS_STORED => {
                self.parse_error_log(frame);
                true
            }
            MSG_UBA_PARAMETERS => {
                self.apply(frame, UBA_PARAMETERS);
                true
            }
            MSG_UBA_MONITOR_FAST => {
                self.parse_uba_monitor_fast(frame);
                true
            }
            MSG_UBA_MONITOR_SLOW => {
                self.apply(frame, UBA_MONITOR_SLOW);
                true
            }
            MSG_UBA_PARAMETER_WW => {
                self.parse_ww_parameters(frame);
                true
            }
            MSG_UBA_MONITOR_WW => {
                self.parse_ww_monitor(frame);
                true
            }
            // status telegrams with no decodable content
            0x07 | 0x1C => true,
            _ => false,
        }
    }

    fn handle_rc(&mut self, frame: &EmsFrame) -> bool {
        match frame.frame_type {
            MSG_RC_SYSTEM_TIME => {
                self.parse_system_time(frame);
                true
            }
            MSG_RC_HK1_MONITOR => {
                self.parse_hk_monitor(frame, S::HK1, &HK1_MONITOR);
                true
            }
            MSG_RC_HK2_MONITOR => {
                self.parse_hk_monitor(frame, S::HK2, &HK2_MONITOR);
                true
            }
            MSG_RC_OUTDOOR_TEMP => {
                self.apply(frame, RC_OUTDOOR_TEMP);
                true
            }
            // commands addressed to other modules
            0x1A | 0x35 | 0x9D | 0xA2 | 0xAC => true,
            _ => false,
        }
    }

    fn handle_wm10(&mut self, frame: &EmsFrame) -> bool {
        match frame.frame_type {
            MSG_WM10_TEMP1 => {
                self.apply(frame, WM_TEMP1);
                true
            }
            MSG_WM10_TEMP2 => {
                self.apply(frame, WM_TEMP2);
                true
            }
            _ => false,
        }
    }

    fn handle_mm10(&mut self, frame: &EmsFrame) -> bool {
        match frame.frame_type {
            MSG_MM10_TEMP => {
                self.apply(frame, MM_TEMP);
                true
            }
            _ => false,
        }
    }

    fn parse_uba_monitor_fast(&mut self, frame: &EmsFrame) {
        self.apply(frame, UBA_MONITOR_FAST);

        if frame.can_access(18, 2) {
            let text = format!("{}{}", frame.at(18) as char, frame.at(19) as char);
            self.emit(EmsValue::formatted(T::ServiceCode, S::None, text));
        }
        if frame.can_access(20, 2) {
            let code = u16::from_be_bytes([frame.at(20), frame.at(21)]);
            self.emit(EmsValue::formatted(T::FehlerCode, S::None, code.to_string()));
        }
    }

    fn parse_ww_parameters(&mut self, frame: &EmsFrame) {
        if frame.can_access(WW_PARAM_ZIRKPUMP_COUNT as usize, 1) {
            let value = frame.at(WW_PARAM_ZIRKPUMP_COUNT as usize);
            self.emit(EmsValue::enumeration(T::Schaltpunkte, S::Zirkulation, value));
        }
    }

    fn parse_ww_monitor(&mut self, frame: &EmsFrame) {
        self.apply(frame, UBA_MONITOR_WW);

        if frame.can_access(8, 1) {
            self.emit(EmsValue::enumeration(T::WWSystemType, S::None, frame.at(8)));
        }
    }

    fn parse_system_time(&mut self, frame: &EmsFrame) {
        if frame.can_access(0, SYSTEM_TIME_RECORD_SIZE) {
            if let Some(record) = SystemTimeRecord::parse(frame.slice(0, SYSTEM_TIME_RECORD_SIZE)) {
                self.emit(EmsValue::system_time(T::SystemZeit, S::None, record));
            }
        }
    }

    fn parse_hk_monitor(&mut self, frame: &EmsFrame, hk: SubType, descriptors: &[Descriptor]) {
        self.apply(frame, descriptors);

        if frame.can_access(7, 3) {
            self.emit(EmsValue::kennlinie(
                T::HKKennlinie,
                hk,
                frame.at(7),
                frame.at(8),
                frame.at(9),
            ));
        }

        // the temperature-change field only carries data while bit 0 of
        // byte 15 is clear
        if frame.can_access(15, 1) && frame.at(15) & 0x01 == 0 && frame.can_access(10, 2) {
            self.emit(EmsValue::numeric(
                T::TemperaturAenderung,
                S::Raum,
                frame.slice(10, 2),
                100,
            ));
        }
    }

    fn parse_error_log(&mut self, frame: &EmsFrame) {
        for entry in collect_error_entries(frame) {
            self.emit(EmsValue::error(T::Fehler, S::None, entry));
        }
    }

    fn apply(&mut self, frame: &EmsFrame, descriptors: &[Descriptor]) {
        for descriptor in descriptors {
            match *descriptor {
                Descriptor::Numeric {
                    offset,
                    width,
                    divider,
                    value_type,
                    subtype,
                } => {
                    if frame.can_access(offset, width) {
                        self.emit(EmsValue::numeric(
                            value_type,
                            subtype,
                            frame.slice(offset, width),
                            divider,
                        ));
                    }
                }
                Descriptor::Bool {
                    offset,
                    bit,
                    value_type,
                    subtype,
                } => {
                    if frame.can_access(offset, 1) {
                        self.emit(EmsValue::boolean(value_type, subtype, frame.at(offset), bit));
                    }
                }
            }
        }
    }

    fn emit(&mut self, value: EmsValue) {
        if let Some(handler) = self.handler.as_mut() {
            handler(value);
        }
    }
}

/// Walks the error records of an error-log telegram.
///
/// The first record starts at the first logical offset that is aligned to
/// the record width and lies at or above the frame offset; iteration
/// emits one entry per full record in the payload window. The entry index
/// is the aligned offset divided by the record width.
pub fn collect_error_entries(frame: &EmsFrame) -> Vec<ErrorEntry> {
    let width = ERROR_RECORD_SIZE;
    let offset = frame.offset as usize;
    let mut start = if offset % width != 0 {
        (offset / width + 1) * width
    } else {
        offset
    };

    let mut entries = Vec::new();
    while frame.can_access(start, width) {
        if let Some(record) = ErrorRecord::parse(frame.slice(start, width)) {
            entries.push(ErrorEntry {
                source_type: frame.frame_type,
                index: (start / width) as u32,
                record,
            });
        }
        start += width;
    }
    entries
}
