//! The ems module contains the core EMS protocol implementation: telegram
//! framing and packing, the value model, and the telegram decoder.

pub mod decoder;
pub mod frame;
pub mod value;

pub use decoder::{EmsDecoder, ValueHandler};
pub use frame::{pack_command, EmsFrame};
pub use value::{EmsValue, Reading, SubType, ValueType};
