//! Data types for scale readings and connection configuration.

pub mod config;
pub mod reading;

pub use config::{ConnectionConfig, ConnectionStatus, DataBits, Parity, StopBits};
pub use reading::{Reading, Unit};
