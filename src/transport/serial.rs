//! Serial transport implementation.
//!
//! Opens the physical port with the full parameter set scales are
//! configured with (baud, data bits, parity, stop bits, timeout).

use std::future::Future;
use std::pin::Pin;

use tokio_serial::SerialPortBuilderExt;

use crate::error::{Error, Result};
use crate::transport::{ByteReader, Transport};
use crate::types::ConnectionConfig;

/// Serial transport backed by `tokio-serial`.
#[derive(Debug, Default)]
pub struct SerialTransport;

impl SerialTransport {
    /// Creates a new serial transport.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Transport for SerialTransport {
    fn open(
        &mut self,
        port: &str,
        config: &ConnectionConfig,
    ) -> Pin<Box<dyn Future<Output = Result<ByteReader>> + Send + '_>> {
        let port = port.to_owned();
        let config = config.clone();
        Box::pin(async move {
            tracing::info!(port, baud = config.baud_rate, "opening serial port");

            let stream = tokio_serial::new(&port, config.baud_rate)
                .data_bits(config.data_bits.into())
                .parity(config.parity.into())
                .stop_bits(config.stop_bits.into())
                .timeout(config.timeout)
                .open_native_async()
                .map_err(Error::Serial)?;

            tracing::info!(port, "serial port open");
            Ok(Box::new(stream) as ByteReader)
        })
    }

    fn available_ports(&self) -> Result<Vec<String>> {
        list_ports()
    }
}

/// Lists available serial ports.
///
/// # Errors
///
/// Returns an error if the port list cannot be retrieved.
pub fn list_ports() -> Result<Vec<String>> {
    let ports = tokio_serial::available_ports().map_err(Error::Serial)?;
    Ok(ports.into_iter().map(|p| p.port_name).collect())
}
