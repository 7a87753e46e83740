//! Connection configuration and status types.
//!
//! Defaults mirror the parameter set most industrial indicators ship
//! with: 9600 baud, 7 data bits, even parity, one stop bit.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default baud rate.
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Default read timeout applied to the serial port.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);

/// Number of data bits per character.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataBits {
    #[serde(rename = "5")]
    Five,
    #[serde(rename = "6")]
    Six,
    #[default]
    #[serde(rename = "7")]
    Seven,
    #[serde(rename = "8")]
    Eight,
}

impl From<DataBits> for tokio_serial::DataBits {
    fn from(bits: DataBits) -> Self {
        match bits {
            DataBits::Five => Self::Five,
            DataBits::Six => Self::Six,
            DataBits::Seven => Self::Seven,
            DataBits::Eight => Self::Eight,
        }
    }
}

/// Parity checking mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Parity {
    None,
    #[default]
    Even,
    Odd,
}

impl From<Parity> for tokio_serial::Parity {
    fn from(parity: Parity) -> Self {
        match parity {
            Parity::None => Self::None,
            Parity::Even => Self::Even,
            Parity::Odd => Self::Odd,
        }
    }
}

/// Number of stop bits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopBits {
    #[default]
    #[serde(rename = "1")]
    One,
    #[serde(rename = "2")]
    Two,
}

impl From<StopBits> for tokio_serial::StopBits {
    fn from(bits: StopBits) -> Self {
        match bits {
            StopBits::One => Self::One,
            StopBits::Two => Self::Two,
        }
    }
}

/// Configuration for the scale connection.
///
/// Immutable once a connection is established; changing parameters
/// requires a disconnect/connect cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Serial port path (e.g., "/dev/ttyUSB0" or "COM3").
    ///
    /// When absent the first enumerated port is used.
    pub port: Option<String>,
    /// Baud rate.
    pub baud_rate: u32,
    /// Data bits per character.
    pub data_bits: DataBits,
    /// Parity mode.
    pub parity: Parity,
    /// Stop bits.
    pub stop_bits: StopBits,
    /// Read timeout for the underlying port.
    #[serde(with = "timeout_secs")]
    pub timeout: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            port: None,
            baud_rate: DEFAULT_BAUD_RATE,
            data_bits: DataBits::default(),
            parity: Parity::default(),
            stop_bits: StopBits::default(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl ConnectionConfig {
    /// Creates a configuration for a specific port with default settings.
    #[must_use]
    pub fn new(port: impl Into<String>) -> Self {
        Self {
            port: Some(port.into()),
            ..Self::default()
        }
    }

    /// Sets the baud rate.
    #[must_use]
    pub const fn baud_rate(mut self, rate: u32) -> Self {
        self.baud_rate = rate;
        self
    }

    /// Sets the data bits.
    #[must_use]
    pub const fn data_bits(mut self, bits: DataBits) -> Self {
        self.data_bits = bits;
        self
    }

    /// Sets the parity mode.
    #[must_use]
    pub const fn parity(mut self, parity: Parity) -> Self {
        self.parity = parity;
        self
    }

    /// Sets the stop bits.
    #[must_use]
    pub const fn stop_bits(mut self, bits: StopBits) -> Self {
        self.stop_bits = bits;
        self
    }

    /// Sets the read timeout.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Serialize the read timeout as fractional seconds, the way scale
/// front-ends submit it.
mod timeout_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(timeout: &Duration, ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_f64(timeout.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(de)?;
        if secs.is_finite() && secs >= 0.0 {
            Ok(Duration::from_secs_f64(secs))
        } else {
            Err(serde::de::Error::custom("timeout must be a non-negative number"))
        }
    }
}

/// Snapshot of the connection state, as reported by
/// [`ScaleMonitor::status`](crate::monitor::ScaleMonitor::status).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionStatus {
    /// Whether a connection is currently open.
    pub connected: bool,
    /// The open port, if connected.
    pub port: Option<String>,
    /// Description of the last synchronous failure, if any.
    pub error: Option<String>,
}

impl ConnectionStatus {
    /// Status for an open connection.
    #[must_use]
    pub fn connected(port: impl Into<String>) -> Self {
        Self {
            connected: true,
            port: Some(port.into()),
            error: None,
        }
    }

    /// Status for a closed connection.
    #[must_use]
    pub fn disconnected() -> Self {
        Self::default()
    }
}
