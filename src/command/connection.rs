//! # Command Connection
//!
//! Per-client line protocol. Each request is one newline-terminated line
//! of whitespace-separated tokens; each request gets exactly one reply
//! line starting with `OK`, `ERR:CMD`, `ERR:ARGS`, `ERR:TIMEOUT` or
//! `ERR:BUS`. Reads are serialised: the next line is not read until the
//! current request has been answered, so at most one command per
//! connection is in flight on the bus.
//!
//! Recognised commands:
//!
//! | Command | Effect |
//! |---|---|
//! | `geterrors <index>` | read the error log starting at a record index |
//! | `hk1\|hk2 daytemp <10..30>` | set the day setpoint of the circuit |
//! | `hk1\|hk2 nighttemp <10..30>` | set the night setpoint |
//! | `hk1\|hk2 holidaytemp <5..30>` | set the holiday setpoint |
//! | `hk1\|hk2 getdaytemp\|getnighttemp\|getholidaytemp` | query a setpoint |
//! | `ww temp <30..80>` | set the warm-water setpoint |
//! | `ww gettemp` | query the warm-water setpoint |
//! | `thermdesinfect enable on\|off` | thermal disinfection on/off |
//! | `thermdesinfect day <monday..sunday\|all>` | disinfection weekday |
//! | `thermdesinfect temp <60..80>` | disinfection temperature |
//! | `zirkpump enable on\|off` | circulation pump on/off |
//! | `zirkpump count <1..7>` | circulation switch points per hour |

use crate::bus::gateway::BusHandle;
use crate::constants::*;
use crate::ems::decoder::collect_error_entries;
use crate::ems::frame::{pack_command, EmsFrame};
use crate::ems::value::ErrorEntry;
use crate::error::EmsError;
use crate::logging::log_debug;
use std::ops::RangeInclusive;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};

/// Failure modes of one command line, each mapped to a reply marker.
enum CommandError {
    /// Unrecognised or malformed command.
    InvalidCmd,
    /// Recognised command with invalid arguments.
    InvalidArgs,
    /// No matching bus reply within the deadline.
    Timeout,
    /// The telegram could not be handed to the bus.
    Bus,
}

impl From<EmsError> for CommandError {
    fn from(err: EmsError) -> CommandError {
        match err {
            EmsError::ResponseTimeout => CommandError::Timeout,
            _ => CommandError::Bus,
        }
    }
}

/// Pattern an inbound PC-directed frame must match to answer the request
/// currently in flight.
struct PendingReply {
    source: u8,
    frame_type: u8,
    /// For single-cell queries, the logical offset the reply must cover;
    /// `None` accepts any window of the right (source, type).
    offset: Option<u8>,
}

impl PendingReply {
    fn matches(&self, frame: &EmsFrame) -> bool {
        frame.source == self.source
            && frame.frame_type == self.frame_type
            && match self.offset {
                Some(offset) => frame.can_access(offset as usize, 1),
                None => true,
            }
    }
}

/// One client on the command interface.
pub struct CommandConnection {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    bus: BusHandle,
    frames: mpsc::UnboundedReceiver<Arc<EmsFrame>>,
    response_timeout: Duration,
    /// Bus replies consumed by the request currently in flight.
    response_counter: u32,
}

impl CommandConnection {
    pub fn new(
        stream: TcpStream,
        bus: BusHandle,
        frames: mpsc::UnboundedReceiver<Arc<EmsFrame>>,
        response_timeout: Duration,
    ) -> CommandConnection {
        let (read_half, write_half) = stream.into_split();
        CommandConnection {
            reader: BufReader::new(read_half),
            writer: write_half,
            bus,
            frames,
            response_timeout,
            response_counter: 0,
        }
    }

    /// Serves the client until it disconnects or the socket fails.
    pub async fn run(mut self) {
        let mut line = String::new();
        loop {
            line.clear();
            match self.reader.read_line(&mut line).await {
                Ok(0) => break,
                Ok(_) => {}
                Err(err) => {
                    log_debug(&format!("Command connection read failed: {err}"));
                    break;
                }
            }
            let reply = self.process(line.trim()).await;
            if self.respond(&reply).await.is_err() {
                break;
            }
        }
    }

    async fn respond(&mut self, reply: &str) -> Result<(), EmsError> {
        self.writer.write_all(reply.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        Ok(())
    }

    async fn process(&mut self, line: &str) -> String {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        self.response_counter = 0;
        // a reply left over from an abandoned request must never answer
        // this one
        while self.frames.try_recv().is_ok() {}

        match self.execute(&tokens).await {
            Ok(Some(data)) => format!("OK {data}"),
            Ok(None) => "OK".to_string(),
            Err(CommandError::InvalidCmd) => "ERR:CMD".to_string(),
            Err(CommandError::InvalidArgs) => "ERR:ARGS".to_string(),
            Err(CommandError::Timeout) => "ERR:TIMEOUT".to_string(),
            Err(CommandError::Bus) => "ERR:BUS".to_string(),
        }
    }

    async fn execute(&mut self, tokens: &[&str]) -> Result<Option<String>, CommandError> {
        match tokens.first() {
            Some(&"geterrors") => self.get_errors(&tokens[1..]).await,
            Some(&"hk1") => self.hk_command(&tokens[1..], MSG_RC_HK1_PARAMS).await,
            Some(&"hk2") => self.hk_command(&tokens[1..], MSG_RC_HK2_PARAMS).await,
            Some(&"ww") => self.ww_command(&tokens[1..]).await,
            Some(&"thermdesinfect") => self.therm_desinfect_command(&tokens[1..]).await,
            Some(&"zirkpump") => self.zirk_pump_command(&tokens[1..]).await,
            _ => Err(CommandError::InvalidCmd),
        }
    }

    async fn hk_command(
        &mut self,
        tokens: &[&str],
        params_type: u8,
    ) -> Result<Option<String>, CommandError> {
        match tokens.first() {
            Some(&"daytemp") => {
                self.set_setpoint(params_type, HK_PARAM_DAY_TEMP, tokens.get(1), 10.0..=30.0)
                    .await
            }
            Some(&"nighttemp") => {
                self.set_setpoint(params_type, HK_PARAM_NIGHT_TEMP, tokens.get(1), 10.0..=30.0)
                    .await
            }
            Some(&"holidaytemp") => {
                self.set_setpoint(params_type, HK_PARAM_HOLIDAY_TEMP, tokens.get(1), 5.0..=30.0)
                    .await
            }
            Some(&"getdaytemp") => {
                self.get_parameter(ADDRESS_RC, params_type, HK_PARAM_DAY_TEMP, 2)
                    .await
            }
            Some(&"getnighttemp") => {
                self.get_parameter(ADDRESS_RC, params_type, HK_PARAM_NIGHT_TEMP, 2)
                    .await
            }
            Some(&"getholidaytemp") => {
                self.get_parameter(ADDRESS_RC, params_type, HK_PARAM_HOLIDAY_TEMP, 2)
                    .await
            }
            _ => Err(CommandError::InvalidCmd),
        }
    }

    async fn ww_command(&mut self, tokens: &[&str]) -> Result<Option<String>, CommandError> {
        match tokens.first() {
            Some(&"temp") => {
                let value = parse_u8_in(tokens.get(1), 30..=80)?;
                self.write_parameter(ADDRESS_UBA, MSG_UBA_PARAMETER_WW, WW_PARAM_TEMP, value)
                    .await
            }
            Some(&"gettemp") => {
                self.get_parameter(ADDRESS_UBA, MSG_UBA_PARAMETER_WW, WW_PARAM_TEMP, 1)
                    .await
            }
            _ => Err(CommandError::InvalidCmd),
        }
    }

    async fn therm_desinfect_command(
        &mut self,
        tokens: &[&str],
    ) -> Result<Option<String>, CommandError> {
        match tokens.first() {
            Some(&"enable") => {
                let value = if parse_on_off(tokens.get(1))? { 0xFF } else { 0x00 };
                self.write_parameter(
                    ADDRESS_UBA,
                    MSG_UBA_PARAMETER_WW,
                    WW_PARAM_DESINFECT_ENABLE,
                    value,
                )
                .await
            }
            Some(&"day") => {
                let value = parse_weekday(tokens.get(1))?;
                self.write_parameter(
                    ADDRESS_UBA,
                    MSG_UBA_PARAMETER_WW,
                    WW_PARAM_DESINFECT_DAY,
                    value,
                )
                .await
            }
            Some(&"temp") => {
                let value = parse_u8_in(tokens.get(1), 60..=80)?;
                self.write_parameter(
                    ADDRESS_UBA,
                    MSG_UBA_PARAMETER_WW,
                    WW_PARAM_DESINFECT_TEMP,
                    value,
                )
                .await
            }
            _ => Err(CommandError::InvalidCmd),
        }
    }

    async fn zirk_pump_command(&mut self, tokens: &[&str]) -> Result<Option<String>, CommandError> {
        match tokens.first() {
            Some(&"enable") => {
                let value = if parse_on_off(tokens.get(1))? { 0xFF } else { 0x00 };
                self.write_parameter(
                    ADDRESS_UBA,
                    MSG_UBA_PARAMETER_WW,
                    WW_PARAM_ZIRKPUMP_ENABLE,
                    value,
                )
                .await
            }
            Some(&"count") => {
                let value = parse_u8_in(tokens.get(1), 1..=7)?;
                self.write_parameter(
                    ADDRESS_UBA,
                    MSG_UBA_PARAMETER_WW,
                    WW_PARAM_ZIRKPUMP_COUNT,
                    value,
                )
                .await
            }
            _ => Err(CommandError::InvalidCmd),
        }
    }

    /// Reads the error log starting at a record index, requesting
    /// successive windows until one yields no further entries.
    async fn get_errors(&mut self, tokens: &[&str]) -> Result<Option<String>, CommandError> {
        let start: u32 = tokens
            .first()
            .ok_or(CommandError::InvalidArgs)?
            .parse()
            .map_err(|_| CommandError::InvalidArgs)?;

        let mut index = start;
        let mut entries: Vec<ErrorEntry> = Vec::new();
        loop {
            let offset = index as usize * ERROR_RECORD_SIZE;
            if offset > u8::MAX as usize {
                break;
            }
            self.send_command(
                ADDRESS_UBA,
                MSG_UBA_ERRORS_ACTIVE,
                offset as u8,
                &[(2 * ERROR_RECORD_SIZE) as u8],
                true,
            )
            .await?;
            let pending = PendingReply {
                source: ADDRESS_UBA,
                frame_type: MSG_UBA_ERRORS_ACTIVE,
                offset: None,
            };
            let frame = self.await_reply(&pending).await?;

            let fresh: Vec<ErrorEntry> = collect_error_entries(&frame)
                .into_iter()
                .filter(|entry| entry.index >= index && entry.record.has_entry())
                .collect();
            if fresh.is_empty() {
                break;
            }
            index = fresh.last().map(|entry| entry.index).unwrap_or(index) + 1;
            entries.extend(fresh);
            if entries.len() >= ERROR_LOG_CAPACITY {
                break;
            }
        }

        log_debug(&format!(
            "Error log assembled from {} replies, {} entries",
            self.response_counter,
            entries.len()
        ));
        if entries.is_empty() {
            Ok(None)
        } else {
            Ok(Some(format_error_entries(&entries)))
        }
    }

    /// Writes one parameter byte; no reply is requested, so the command
    /// completes as soon as the bus accepts the telegram.
    async fn write_parameter(
        &mut self,
        dest: u8,
        frame_type: u8,
        offset: u8,
        value: u8,
    ) -> Result<Option<String>, CommandError> {
        self.send_command(dest, frame_type, offset, &[value], false)
            .await?;
        Ok(None)
    }

    /// Parses and range-checks a setpoint given in degrees, stored by the
    /// controller as half-degrees.
    async fn set_setpoint(
        &mut self,
        params_type: u8,
        offset: u8,
        arg: Option<&&str>,
        range: RangeInclusive<f64>,
    ) -> Result<Option<String>, CommandError> {
        let value: f64 = arg
            .ok_or(CommandError::InvalidArgs)?
            .parse()
            .map_err(|_| CommandError::InvalidArgs)?;
        if !range.contains(&value) {
            return Err(CommandError::InvalidArgs);
        }
        self.write_parameter(ADDRESS_RC, params_type, offset, (value * 2.0).round() as u8)
            .await
    }

    /// Queries one parameter cell and formats the replied byte with the
    /// cell's divider.
    async fn get_parameter(
        &mut self,
        dest: u8,
        frame_type: u8,
        offset: u8,
        divider: u8,
    ) -> Result<Option<String>, CommandError> {
        self.send_command(dest, frame_type, offset, &[1], true).await?;
        let pending = PendingReply {
            source: dest,
            frame_type,
            offset: Some(offset),
        };
        let frame = self.await_reply(&pending).await?;
        let raw = frame.at(offset as usize);
        let text = if divider == 1 {
            format!("{raw}")
        } else {
            format!("{:.1}", f64::from(raw) / f64::from(divider))
        };
        Ok(Some(text))
    }

    async fn send_command(
        &mut self,
        dest: u8,
        frame_type: u8,
        offset: u8,
        payload: &[u8],
        expect_response: bool,
    ) -> Result<(), CommandError> {
        let telegram = pack_command(dest, frame_type, offset, payload, expect_response);
        Ok(self.bus.send(telegram).await?)
    }

    /// Waits for the frame answering the request in flight. Frames meant
    /// for other connections are ignored; the deadline is bounded.
    async fn await_reply(&mut self, pending: &PendingReply) -> Result<Arc<EmsFrame>, CommandError> {
        let deadline = Instant::now() + self.response_timeout;
        loop {
            tokio::select! {
                frame = self.frames.recv() => {
                    match frame {
                        Some(frame) if pending.matches(&frame) => {
                            self.response_counter += 1;
                            return Ok(frame);
                        }
                        Some(_) => continue,
                        None => {
                            return Err(EmsError::Transport(
                                "frame router is gone".to_string(),
                            )
                            .into())
                        }
                    }
                }
                _ = sleep_until(deadline) => return Err(EmsError::ResponseTimeout.into()),
            }
        }
    }
}

fn parse_u8_in(
    arg: Option<&&str>,
    range: RangeInclusive<u8>,
) -> Result<u8, CommandError> {
    let value: u8 = arg
        .ok_or(CommandError::InvalidArgs)?
        .parse()
        .map_err(|_| CommandError::InvalidArgs)?;
    if range.contains(&value) {
        Ok(value)
    } else {
        Err(CommandError::InvalidArgs)
    }
}

fn parse_on_off(arg: Option<&&str>) -> Result<bool, CommandError> {
    match arg {
        Some(&"on") => Ok(true),
        Some(&"off") => Ok(false),
        _ => Err(CommandError::InvalidArgs),
    }
}

fn parse_weekday(arg: Option<&&str>) -> Result<u8, CommandError> {
    match arg {
        Some(&"monday") => Ok(0),
        Some(&"tuesday") => Ok(1),
        Some(&"wednesday") => Ok(2),
        Some(&"thursday") => Ok(3),
        Some(&"friday") => Ok(4),
        Some(&"saturday") => Ok(5),
        Some(&"sunday") => Ok(6),
        Some(&"all") => Ok(0xFF),
        _ => Err(CommandError::InvalidArgs),
    }
}

fn format_error_entries(entries: &[ErrorEntry]) -> String {
    entries
        .iter()
        .map(format_error_entry)
        .collect::<Vec<String>>()
        .join(" ")
}

/// One log entry as a single reply token:
/// `index:display:cause:timestamp:duration:source`.
fn format_error_entry(entry: &ErrorEntry) -> String {
    let record = &entry.record;
    format!(
        "{}:{}{}:{}:20{:02}-{:02}-{:02}T{:02}:{:02}:{}m:0x{:02X}",
        entry.index,
        record.display_code[0] as char,
        record.display_code[1] as char,
        record.cause_code,
        record.year,
        record.month,
        record.day,
        record.hour,
        record.minute,
        record.duration_minutes,
        record.source,
    )
}
