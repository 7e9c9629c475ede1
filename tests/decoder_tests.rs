//! Unit tests for the `ems::decoder` module: telegram dispatch, partial
//! payload windows, the error-log walk, and the documented end-to-end
//! decode scenarios.

use ems_rs::ems::frame::EmsFrame;
use ems_rs::ems::value::Reading;
use ems_rs::{EmsDecoder, EmsValue, SubType, ValueType};
use std::sync::{Arc, Mutex};

/// Runs one telegram through a decoder and collects the emitted values.
fn decode(raw: &[u8]) -> Vec<EmsValue> {
    let values = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&values);
    let mut decoder = EmsDecoder::new();
    decoder.set_handler(move |value| sink.lock().unwrap().push(value));

    let frame = EmsFrame::parse(raw).expect("test telegram must frame");
    decoder.handle(&frame);

    let collected = values.lock().unwrap().clone();
    collected
}

fn telegram(source: u8, dest: u8, frame_type: u8, offset: u8, payload: &[u8]) -> Vec<u8> {
    let mut raw = vec![source, dest, frame_type, offset];
    raw.extend_from_slice(payload);
    raw
}

fn numeric_of(values: &[EmsValue], value_type: ValueType, subtype: SubType) -> Option<f64> {
    values
        .iter()
        .find(|v| v.value_type() == value_type && v.subtype() == subtype)
        .and_then(|v| v.as_numeric())
}

fn bool_of(values: &[EmsValue], value_type: ValueType, subtype: SubType) -> Option<bool> {
    values
        .iter()
        .find(|v| v.value_type() == value_type && v.subtype() == subtype)
        .and_then(|v| v.as_bool())
}

/// Decodes the documented boiler fast-monitor telegram: setpoint 0,
/// boiler temperature 41.0, burner and flame off, and no service code
/// because only one of its two bytes is present.
#[test]
fn test_uba_monitor_fast() {
    let raw = [
        0x08, 0x10, 0x18, 0x00, 0x00, 0x01, 0x9A, 0x00, 0x00, 0x00, 0xD6, 0x00, 0x00, 0x00, 0xA8,
        0x00, 0x00, 0x00, 0x15, 0x32, 0x38, 0x00, 0x00,
    ];
    let values = decode(&raw);

    assert_eq!(numeric_of(&values, ValueType::SollTemp, SubType::Kessel), Some(0.0));
    assert_eq!(numeric_of(&values, ValueType::IstTemp, SubType::Kessel), Some(41.0));
    assert_eq!(bool_of(&values, ValueType::FlammeAktiv, SubType::None), Some(false));
    assert_eq!(bool_of(&values, ValueType::BrennerAktiv, SubType::None), Some(false));
    assert_eq!(
        numeric_of(&values, ValueType::IstTemp, SubType::Ruecklauf),
        Some(2.1)
    );
    // 19-byte payload: byte 19 is missing, so no service code fires
    assert!(!values
        .iter()
        .any(|v| matches!(v.reading(), Reading::Formatted(_))));
}

/// Decodes a fast-monitor telegram long enough to carry the service and
/// fault codes.
#[test]
fn test_uba_monitor_fast_service_code() {
    let mut payload = vec![0u8; 22];
    payload[18] = b'0';
    payload[19] = b'Y';
    payload[20] = 0x02;
    payload[21] = 0x04;
    let values = decode(&telegram(0x08, 0x00, 0x18, 0x00, &payload));

    let formatted: Vec<&str> = values
        .iter()
        .filter_map(|v| match v.reading() {
            Reading::Formatted(text) => Some(text.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(formatted, vec!["0Y", "516"]);
}

/// A polling request must produce no callbacks at all.
#[test]
fn test_polling_discarded() {
    assert!(decode(&[0x08, 0x88, 0x18, 0x00]).is_empty());
}

/// An all-zero header must produce no callbacks.
#[test]
fn test_invalid_header_discarded() {
    assert!(decode(&[0x00, 0x00, 0x00, 0x05, 0xAB, 0xCD]).is_empty());
}

/// Unknown (source, type) combinations decode to nothing.
#[test]
fn test_unknown_telegram() {
    assert!(decode(&telegram(0x08, 0x00, 0x99, 0x00, &[1, 2, 3])).is_empty());
    assert!(decode(&telegram(0x42, 0x00, 0x18, 0x00, &[1, 2, 3])).is_empty());
}

/// A partial monitor window emits only the fields it actually carries.
#[test]
fn test_partial_window() {
    // logical 11..15 of the fast monitor: warm-water and return line
    let values = decode(&telegram(0x08, 0x00, 0x18, 0x0B, &[0x00, 0x64, 0x00, 0xC8]));
    assert_eq!(values.len(), 2);
    assert_eq!(numeric_of(&values, ValueType::IstTemp, SubType::WW), Some(10.0));
    assert_eq!(
        numeric_of(&values, ValueType::IstTemp, SubType::Ruecklauf),
        Some(20.0)
    );
}

/// Decodes the slow monitor, including a negative outdoor temperature
/// and a three-byte counter.
#[test]
fn test_uba_monitor_slow() {
    let payload = [
        0xFF, 0x38, // outdoor -20.0
        0x01, 0x9A, // boiler 41.0
        0x00, 0xFA, // flue gas 25.0
        0x00, 0x00, 0x00, 0x4B, // modulation 75
        0x00, 0x2A, 0xF8, // burner starts 11000
        0x00, 0x10, 0x00, // operating minutes
    ];
    let values = decode(&telegram(0x08, 0x00, 0x19, 0x00, &payload));
    assert_eq!(numeric_of(&values, ValueType::IstTemp, SubType::Aussen), Some(-20.0));
    assert_eq!(numeric_of(&values, ValueType::IstTemp, SubType::Abgas), Some(25.0));
    assert_eq!(
        numeric_of(&values, ValueType::Brennerstarts, SubType::None),
        Some(11000.0)
    );
    // 16-byte payload: the heating-minutes counter at 19..22 is absent
    assert_eq!(numeric_of(&values, ValueType::HeizZeit, SubType::None), None);
}

/// Decodes the warm-water monitor with its status bits and system type.
#[test]
fn test_uba_monitor_ww() {
    let payload = [
        50, // setpoint
        0x01, 0xF4, // actual 50.0
        0x00, 0x00, 0b0000_0101, // day mode + disinfection running
        0x00, 0b0000_0100, // circulation active
        0x02, // system type
    ];
    let values = decode(&telegram(0x08, 0x00, 0x34, 0x00, &payload));
    assert_eq!(numeric_of(&values, ValueType::SollTemp, SubType::WW), Some(50.0));
    assert_eq!(numeric_of(&values, ValueType::IstTemp, SubType::WW), Some(50.0));
    assert_eq!(bool_of(&values, ValueType::Tagbetrieb, SubType::WW), Some(true));
    assert_eq!(
        bool_of(&values, ValueType::DesinfektionAktiv, SubType::WW),
        Some(true)
    );
    assert_eq!(
        bool_of(&values, ValueType::ZirkulationAktiv, SubType::None),
        Some(true)
    );
    assert!(values.iter().any(|v| {
        v.value_type() == ValueType::WWSystemType && *v.reading() == Reading::Enumeration(2)
    }));
}

fn hk_monitor_payload(condition_byte: u8) -> Vec<u8> {
    vec![
        0b0000_0100, // automatic mode
        0b0000_0010, // day mode
        42,   // room setpoint 21.0
        0x00, 0xD2, // room actual 21.0
        10,   // switch-on optimisation
        20,   // switch-off optimisation
        12, 18, 24, // heating curve
        0x00, 0x96, // temperature change 1.5
        0x00,
        0b0001_0000, // timer active
        45,   // circuit setpoint
        condition_byte,
    ]
}

/// Decodes a full heating-circuit monitor for circuit 1.
#[test]
fn test_rc_hk_monitor() {
    let values = decode(&telegram(0x10, 0x00, 0x3E, 0x00, &hk_monitor_payload(0x00)));

    assert_eq!(numeric_of(&values, ValueType::SollTemp, SubType::Raum), Some(21.0));
    assert_eq!(numeric_of(&values, ValueType::IstTemp, SubType::Raum), Some(21.0));
    assert_eq!(numeric_of(&values, ValueType::SollTemp, SubType::HK1), Some(45.0));
    assert_eq!(
        bool_of(&values, ValueType::Automatikbetrieb, SubType::HK1),
        Some(true)
    );
    assert_eq!(bool_of(&values, ValueType::Tagbetrieb, SubType::HK1), Some(true));
    assert_eq!(bool_of(&values, ValueType::SchaltuhrEin, SubType::HK1), Some(true));
    assert_eq!(bool_of(&values, ValueType::Ferien, SubType::HK1), Some(false));
    assert!(values.iter().any(|v| {
        v.subtype() == SubType::HK1
            && *v.reading()
                == Reading::Kennlinie {
                    low: 12,
                    medium: 18,
                    high: 24,
                }
    }));
}

/// The same telegram from type 0x48 tags its values with circuit 2.
#[test]
fn test_rc_hk2_monitor() {
    let values = decode(&telegram(0x10, 0x00, 0x48, 0x00, &hk_monitor_payload(0x00)));
    assert_eq!(numeric_of(&values, ValueType::SollTemp, SubType::HK2), Some(45.0));
    assert_eq!(
        bool_of(&values, ValueType::Automatikbetrieb, SubType::HK2),
        Some(true)
    );
}

/// The temperature-change field is only emitted while bit 0 of byte 15
/// is clear, and never when byte 15 is absent.
#[test]
fn test_hk_monitor_conditional_field() {
    let emitted = decode(&telegram(0x10, 0x00, 0x3E, 0x00, &hk_monitor_payload(0x00)));
    assert_eq!(
        numeric_of(&emitted, ValueType::TemperaturAenderung, SubType::Raum),
        Some(1.5)
    );

    let masked = decode(&telegram(0x10, 0x00, 0x3E, 0x00, &hk_monitor_payload(0x01)));
    assert_eq!(
        numeric_of(&masked, ValueType::TemperaturAenderung, SubType::Raum),
        None
    );

    let mut truncated = hk_monitor_payload(0x00);
    truncated.truncate(15);
    let absent = decode(&telegram(0x10, 0x00, 0x3E, 0x00, &truncated));
    assert_eq!(
        numeric_of(&absent, ValueType::TemperaturAenderung, SubType::Raum),
        None
    );
}

/// Decodes the RC clock telegram.
#[test]
fn test_rc_system_time() {
    let values = decode(&telegram(0x10, 0x00, 0x06, 0x00, &[12, 3, 4, 5, 6, 7, 2, 0x01]));
    assert_eq!(values.len(), 1);
    match values[0].reading() {
        Reading::SystemTime(record) => {
            assert_eq!(record.year, 12);
            assert_eq!(record.day, 5);
            assert!(record.dst);
        }
        other => panic!("expected a clock record, got {other:?}"),
    }

    // a short window carries no clock
    assert!(decode(&telegram(0x10, 0x00, 0x06, 0x00, &[12, 3, 4])).is_empty());
}

/// Decodes the damped outdoor temperature.
#[test]
fn test_rc_outdoor_temp() {
    let values = decode(&telegram(0x10, 0x00, 0xA3, 0x00, &[0xF6]));
    assert_eq!(
        numeric_of(&values, ValueType::GedaempfteTemp, SubType::Aussen),
        Some(-10.0)
    );
}

/// Decodes the mixer-module telegrams, including the pump bit encoded as
/// 0/100.
#[test]
fn test_wm_and_mm_telegrams() {
    let values = decode(&telegram(0x11, 0x00, 0x9C, 0x00, &[0x01, 0x90, 0x64]));
    assert_eq!(numeric_of(&values, ValueType::IstTemp, SubType::HK1), Some(40.0));
    assert_eq!(bool_of(&values, ValueType::PumpeAktiv, SubType::HK1), Some(true));

    let values = decode(&telegram(0x11, 0x00, 0x1E, 0x00, &[0x01, 0x2C]));
    assert_eq!(numeric_of(&values, ValueType::IstTemp, SubType::HK1), Some(30.0));

    let values = decode(&telegram(0x21, 0x00, 0xAB, 0x00, &[40, 0x01, 0x2C, 0x00]));
    assert_eq!(numeric_of(&values, ValueType::SollTemp, SubType::HK2), Some(40.0));
    assert_eq!(numeric_of(&values, ValueType::IstTemp, SubType::HK2), Some(30.0));
    assert_eq!(bool_of(&values, ValueType::PumpeAktiv, SubType::HK2), Some(false));
}

fn error_record(display: &[u8; 2], index_marker: u8) -> Vec<u8> {
    vec![
        display[0],
        display[1],
        0x02,
        0x04,
        12,
        3,
        4,
        index_marker,
        6,
        0x00,
        0x17,
        0x10,
    ]
}

/// Three full records starting at one record width emit indices 1, 2, 3.
#[test]
fn test_error_record_iteration() {
    let mut payload = Vec::new();
    payload.extend(error_record(b"A1", 1));
    payload.extend(error_record(b"A2", 2));
    payload.extend(error_record(b"A3", 3));
    let values = decode(&telegram(0x08, 0x00, 0x10, 12, &payload));

    let indices: Vec<u32> = values
        .iter()
        .filter_map(|v| match v.reading() {
            Reading::Error(entry) => Some(entry.index),
            _ => None,
        })
        .collect();
    assert_eq!(indices, vec![1, 2, 3]);
}

/// An unaligned window starts at the next aligned record and carries the
/// originating telegram type.
#[test]
fn test_error_record_alignment() {
    // logical 5..36: records align at 12 and 24
    let mut payload = vec![0u8; 7];
    payload.extend(error_record(b"A1", 1));
    payload.extend(error_record(b"A2", 2));
    let values = decode(&telegram(0x08, 0x00, 0x11, 5, &payload));

    let entries: Vec<_> = values
        .iter()
        .filter_map(|v| match v.reading() {
            Reading::Error(entry) => Some(entry),
            _ => None,
        })
        .collect();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].index, 1);
    assert_eq!(entries[1].index, 2);
    assert!(entries.iter().all(|entry| entry.source_type == 0x11));
    assert_eq!(entries[0].record.display_code, *b"A1");
}

/// A window that ends mid-record emits only the full records.
#[test]
fn test_error_record_partial_tail() {
    let mut payload = error_record(b"A1", 1);
    payload.extend(&error_record(b"A2", 2)[..6]);
    let values = decode(&telegram(0x08, 0x00, 0x10, 12, &payload));
    assert_eq!(values.len(), 1);
}

/// Decodes the boiler parameter telegram.
#[test]
fn test_uba_parameters() {
    let payload = [0x00, 75, 0x00, 0x00, 0xFA, 0x06, 10, 0x00, 5, 100, 30];
    let values = decode(&telegram(0x08, 0x00, 0x16, 0x00, &payload));
    assert_eq!(numeric_of(&values, ValueType::SetTemp, SubType::Kessel), Some(75.0));
    assert_eq!(
        numeric_of(&values, ValueType::EinschaltHysterese, SubType::Kessel),
        Some(-6.0)
    );
    assert_eq!(
        numeric_of(&values, ValueType::MaxModulation, SubType::Kessel),
        Some(100.0)
    );
    assert_eq!(
        numeric_of(&values, ValueType::MinModulation, SubType::Kessel),
        Some(30.0)
    );
}

/// Decodes the circulation switch points from the warm-water parameter
/// telegram.
#[test]
fn test_uba_ww_parameters() {
    let values = decode(&telegram(0x08, 0x00, 0x33, 0x00, &[0, 0, 0, 0, 0, 0, 0, 3]));
    assert_eq!(values.len(), 1);
    assert_eq!(values[0].value_type(), ValueType::Schaltpunkte);
    assert_eq!(values[0].subtype(), SubType::Zirkulation);
    assert_eq!(*values[0].reading(), Reading::Enumeration(3));
}
