//! Record reassembly and parsing for the serial scale protocol.
//!
//! Scales emit free-text records terminated by `\n` or `\r`. The
//! [`LineAssembler`] turns an arbitrary byte stream into complete
//! records; [`parse_reading`] turns one record into a [`Reading`].
//!
//! [`Reading`]: crate::types::Reading

pub mod frame;
pub mod parser;

pub use frame::LineAssembler;
pub use parser::parse_reading;
