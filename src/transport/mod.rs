//! Transport layer for the scale connection.
//!
//! This module provides the abstraction over the physical link.
//! Currently only serial is implemented; tests substitute in-memory
//! byte sources.

pub mod serial;

use std::future::Future;
use std::pin::Pin;

use tokio::io::AsyncRead;

use crate::error::Result;
use crate::types::ConnectionConfig;

/// Byte source handed to the read loop.
///
/// The loop takes exclusive ownership; dropping it releases the
/// underlying resource.
pub type ByteReader = Box<dyn AsyncRead + Send + Sync + Unpin>;

/// Trait for transport implementations.
pub trait Transport: Send + Sync {
    /// Opens the named port and returns its byte stream.
    fn open(
        &mut self,
        port: &str,
        config: &ConnectionConfig,
    ) -> Pin<Box<dyn Future<Output = Result<ByteReader>> + Send + '_>>;

    /// Enumerates candidate ports for automatic selection.
    fn available_ports(&self) -> Result<Vec<String>>;
}

pub use serial::SerialTransport;
