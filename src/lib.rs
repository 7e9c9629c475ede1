//! # ems-rs - Collector and Control Gateway for the EMS Heating Bus
//!
//! The ems-rs crate collects data from the EMS bus used by a family of
//! residential heating controllers (boiler controller, room controller,
//! mixer and warm-water modules) and exposes a line-based TCP command
//! interface for parameter queries and changes.
//!
//! ## Features
//!
//! - Reassemble and CRC-check bus telegrams from a serial port or a
//!   serial-to-TCP bridge
//! - Decode known telegrams into a stream of typed values delivered to a
//!   synchronous handler callback
//! - Serve multiple concurrent TCP command clients, translating textual
//!   commands into bus telegrams
//! - Correlate asynchronous bus replies back to the requesting client
//!   under a bounded deadline
//!
//! ## Usage
//!
//! ```ignore
//! use ems_rs::{CommandServer, EmsDecoder, EmsGateway, Router, TcpBusTransport};
//!
//! let router = Router::new();
//! let mut decoder = EmsDecoder::new();
//! decoder.set_handler(|value| println!("{value:?}"));
//!
//! let transport = TcpBusTransport::connect("heating:2000").await?;
//! let (gateway, bus) = EmsGateway::new(transport, decoder, router.clone());
//! let server = CommandServer::bind("127.0.0.1:7777", bus, router).await?;
//!
//! tokio::select! {
//!     result = gateway.run() => result?,
//!     result = server.run() => result?,
//! }
//! ```

pub mod bus;
pub mod command;
pub mod constants;
pub mod ems;
pub mod error;
pub mod logging;

pub use bus::{BusHandle, BusTransport, EmsGateway, SerialBusTransport, TcpBusTransport};
pub use command::{CommandConnection, CommandServer, Router};
pub use ems::{pack_command, EmsDecoder, EmsFrame, EmsValue, Reading, SubType, ValueType};
pub use error::EmsError;
pub use logging::{init_logger, log_debug, log_error, log_info, log_warn};
