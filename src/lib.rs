//! # scalelink
//!
//! A Rust library for streaming weight readings from serial-attached
//! industrial scales.
//!
//! One scale, many observers: the library opens the serial link, reads
//! the instrument's free-text records, parses each into a structured
//! [`Reading`], and fans it out to every live subscriber. Malformed
//! records, transient I/O errors, and subscribers that vanish never
//! bring the pipeline down.
//!
//! ## Features
//!
//! - Async/await based API using Tokio
//! - Tolerant record parsing with best-effort defaults
//! - Broadcast delivery that prunes dead subscribers instead of failing
//! - Cooperative teardown of the polling read loop
//!
//! ## Quick Start
//!
//! ```no_run
//! use scalelink::{ConnectionConfig, ScaleEvent, ScaleMonitor};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), scalelink::Error> {
//!     let mut monitor = ScaleMonitor::serial();
//!     let mut readings = monitor.subscribe().await;
//!
//!     // No port named: the first available one is used
//!     let status = monitor.connect(&ConnectionConfig::default()).await?;
//!     println!("Connected to: {:?}", status.port);
//!
//!     while let Some(event) = readings.recv().await {
//!         if let ScaleEvent::Reading(reading) = event {
//!             println!("{} {} (stable: {})", reading.value, reading.unit, reading.stable);
//!         }
//!     }
//!
//!     monitor.disconnect().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`protocol`] - Record reassembly ([`LineAssembler`]) and parsing
//! - [`types`] - Data structures (readings, units, configuration)
//! - [`transport`] - Transport implementations (currently serial)
//! - [`event`] - Broadcast hub and subscriber channels
//! - [`monitor`] - High-level [`ScaleMonitor`] connection supervisor

pub mod error;
pub mod event;
pub mod monitor;
pub mod protocol;
pub mod transport;
pub mod types;

// Re-exports for convenience
pub use error::{Error, Result};
pub use event::{BroadcastHub, ScaleEvent, Subscriber, SubscriberId};
pub use monitor::{ConnectionState, ScaleMonitor};
pub use protocol::{LineAssembler, parse_reading};
pub use transport::{SerialTransport, serial::list_ports};
pub use types::{
    ConnectionConfig, ConnectionStatus, DataBits, Parity, Reading, StopBits, Unit,
};
