//! Error types for the scalelink library.

use thiserror::Error;

/// The main error type for scalelink operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Serial port error.
    #[error("serial port error: {0}")]
    Serial(#[from] tokio_serial::Error),

    /// No port was specified and enumeration found none.
    #[error("no serial port specified and none detected")]
    NoPortAvailable,

    /// Fatal fault on the open serial connection.
    #[error("communication fault: {message}")]
    Communication { message: String },
}

/// Result type alias for scalelink operations.
pub type Result<T> = std::result::Result<T, Error>;
