//! Connection supervisor for the scale link.
//!
//! [`ScaleMonitor`] owns the lifecycle of the single physical
//! connection: it opens the port, runs one background read loop that
//! feeds the line assembler and publishes parsed readings, reports
//! terminal faults, and guarantees clean teardown on disconnect.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time;

use crate::error::{Error, Result};
use crate::event::{BroadcastHub, Subscriber};
use crate::protocol::{LineAssembler, parse_reading};
use crate::transport::{ByteReader, SerialTransport, Transport};
use crate::types::{ConnectionConfig, ConnectionStatus};

/// Default interval between polls for available bytes.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Default backoff after a transient read fault.
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_millis(100);

/// Connection lifecycle state. Exactly one per monitor; transitions are
/// serialized through the monitor's `&mut self` operations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ConnectionState {
    /// No connection open.
    #[default]
    Disconnected,
    /// Connection open on the named port.
    Connected {
        /// The open port.
        port: String,
    },
}

/// Supervisor bridging one serial-attached scale to live subscribers.
pub struct ScaleMonitor<T> {
    transport: T,
    hub: BroadcastHub,
    state: Arc<watch::Sender<ConnectionState>>,
    read_task: Option<JoinHandle<()>>,
    stop_tx: Option<watch::Sender<bool>>,
    poll_interval: Duration,
    retry_backoff: Duration,
}

impl ScaleMonitor<SerialTransport> {
    /// Creates a monitor backed by the serial transport.
    #[must_use]
    pub fn serial() -> Self {
        Self::new(SerialTransport::new())
    }
}

impl<T: Transport + 'static> ScaleMonitor<T> {
    /// Creates a monitor with the given transport.
    #[must_use]
    pub fn new(transport: T) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            transport,
            hub: BroadcastHub::default(),
            state: Arc::new(state),
            read_task: None,
            stop_tx: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
        }
    }

    /// Sets the interval between polls for available bytes.
    #[must_use]
    pub const fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Sets the backoff after a transient read fault.
    #[must_use]
    pub const fn retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    /// Connects to the scale and starts the read loop.
    ///
    /// Idempotent: when already connected this returns the current
    /// status unchanged and opens nothing. When the config names no
    /// port, the first enumerated port is used.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoPortAvailable`] when no port is named and
    /// none is detected, or the underlying open error. State remains
    /// disconnected on failure.
    pub async fn connect(&mut self, config: &ConnectionConfig) -> Result<ConnectionStatus> {
        let current = self.state.borrow().clone();
        if let ConnectionState::Connected { port } = current {
            tracing::debug!(port, "connect called while already connected");
            return Ok(ConnectionStatus::connected(port));
        }

        let port = match &config.port {
            Some(port) => port.clone(),
            None => {
                let mut ports = self.transport.available_ports()?;
                if ports.is_empty() {
                    tracing::error!("no serial port specified and none detected");
                    return Err(Error::NoPortAvailable);
                }
                let first = ports.remove(0);
                tracing::info!(port = first, "using first available port");
                first
            }
        };

        let reader = self.transport.open(&port, config).await?;

        self.state.send_replace(ConnectionState::Connected { port: port.clone() });

        let (stop_tx, stop_rx) = watch::channel(false);
        let hub = self.hub.clone();
        let state = Arc::clone(&self.state);
        let poll_interval = self.poll_interval;
        let retry_backoff = self.retry_backoff;

        self.read_task = Some(tokio::spawn(async move {
            run_read_loop(reader, hub, state, stop_rx, poll_interval, retry_backoff).await;
        }));
        self.stop_tx = Some(stop_tx);

        tracing::info!(port, "connected to scale");
        Ok(ConnectionStatus::connected(port))
    }

    /// Disconnects from the scale.
    ///
    /// Signals the read loop to stop and waits for it to finish before
    /// returning; the port is released when the loop drops its reader.
    /// Idempotent: disconnecting an already-disconnected monitor is a
    /// no-op returning the disconnected status.
    pub async fn disconnect(&mut self) -> Result<ConnectionStatus> {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(true);
        }
        if let Some(task) = self.read_task.take() {
            if let Err(e) = task.await {
                if e.is_panic() {
                    tracing::error!("read loop panicked: {e}");
                }
            }
            tracing::info!("disconnected from scale");
        }
        self.state.send_replace(ConnectionState::Disconnected);
        Ok(ConnectionStatus::disconnected())
    }

    /// Returns the current connection status.
    ///
    /// Reads cached state only; never touches the port.
    #[must_use]
    pub fn status(&self) -> ConnectionStatus {
        match &*self.state.borrow() {
            ConnectionState::Disconnected => ConnectionStatus::disconnected(),
            ConnectionState::Connected { port } => ConnectionStatus::connected(port.clone()),
        }
    }

    /// Registers a new subscriber for readings and error events.
    pub async fn subscribe(&self) -> Subscriber {
        self.hub.subscribe().await
    }

    /// Returns the broadcast hub, for routing subscriber control
    /// traffic such as `ping`.
    #[must_use]
    pub const fn hub(&self) -> &BroadcastHub {
        &self.hub
    }
}

impl<T> Drop for ScaleMonitor<T> {
    fn drop(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(true);
        }
        if let Some(task) = self.read_task.take() {
            task.abort();
        }
    }
}

/// A fault the read loop may ride out within one polling iteration.
fn is_transient(error: &io::Error) -> bool {
    matches!(
        error.kind(),
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
    )
}

/// The background read loop.
///
/// Polls for bytes every `poll_interval`, feeding complete lines
/// through the parser to the hub. The stop signal is checked every
/// iteration; the reader is owned exclusively here and released when
/// the loop returns. A fatal fault broadcasts one error event and
/// forces the cached state to disconnected before stopping.
async fn run_read_loop(
    mut reader: ByteReader,
    hub: BroadcastHub,
    state: Arc<watch::Sender<ConnectionState>>,
    mut stop_rx: watch::Receiver<bool>,
    poll_interval: Duration,
    retry_backoff: Duration,
) {
    let mut assembler = LineAssembler::new();
    let mut buf = [0u8; 1024];

    tracing::debug!("read loop started");

    loop {
        if *stop_rx.borrow() {
            tracing::debug!("read loop stop requested");
            break;
        }

        match time::timeout(poll_interval, reader.read(&mut buf)).await {
            // No bytes within this interval; re-check the stop signal
            Err(_) => {}
            Ok(Ok(0)) => {
                tracing::error!("serial port closed");
                hub.error("communication fault: serial port closed").await;
                state.send_replace(ConnectionState::Disconnected);
                break;
            }
            Ok(Ok(n)) => {
                tracing::trace!("received {n} bytes");
                assembler.feed(&buf[..n]);
                while let Some(line) = assembler.next_line() {
                    let reading = parse_reading(&line);
                    tracing::debug!(
                        value = reading.value,
                        unit = %reading.unit,
                        stable = reading.stable,
                        "reading"
                    );
                    hub.publish(reading).await;
                }
            }
            Ok(Err(e)) if is_transient(&e) => {
                tracing::warn!("transient read error: {e}");
                // The stop signal must interrupt the backoff too
                tokio::select! {
                    _ = stop_rx.changed() => {
                        tracing::debug!("read loop stop requested");
                        break;
                    }
                    () = time::sleep(retry_backoff) => {}
                }
            }
            Ok(Err(e)) => {
                tracing::error!("serial communication fault: {e}");
                hub.error(format!("communication fault: {e}")).await;
                state.send_replace(ConnectionState::Disconnected);
                break;
            }
        }
    }

    tracing::debug!("read loop stopped");
}

#[cfg(test)]
mod tests {
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::event::ScaleEvent;
    use crate::types::Unit;

    struct MockTransport {
        ports: Vec<String>,
        reader: Option<ByteReader>,
        opens: Arc<AtomicUsize>,
    }

    impl MockTransport {
        fn new(ports: &[&str], reader: Option<ByteReader>) -> Self {
            Self {
                ports: ports.iter().map(|&p| p.to_owned()).collect(),
                reader,
                opens: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    impl Transport for MockTransport {
        fn open(
            &mut self,
            _port: &str,
            _config: &ConnectionConfig,
        ) -> Pin<Box<dyn Future<Output = Result<ByteReader>> + Send + '_>> {
            self.opens.fetch_add(1, Ordering::SeqCst);
            let reader = self.reader.take();
            Box::pin(async move {
                reader.ok_or_else(|| Error::Communication {
                    message: "mock reader already taken".into(),
                })
            })
        }

        fn available_ports(&self) -> Result<Vec<String>> {
            Ok(self.ports.clone())
        }
    }

    fn monitor_with_stream(ports: &[&str]) -> (ScaleMonitor<MockTransport>, tokio::io::DuplexStream) {
        let (scale_end, reader) = tokio::io::duplex(1024);
        let transport = MockTransport::new(ports, Some(Box::new(reader)));
        let monitor = ScaleMonitor::new(transport).poll_interval(Duration::from_millis(10));
        (monitor, scale_end)
    }

    async fn recv_with_timeout(sub: &mut Subscriber) -> Option<ScaleEvent> {
        time::timeout(Duration::from_secs(1), sub.recv())
            .await
            .expect("timed out waiting for event")
    }

    #[tokio::test]
    async fn test_connect_uses_first_available_port() {
        let (mut monitor, _scale) = monitor_with_stream(&["/dev/ttyS7", "/dev/ttyS8"]);

        let status = monitor.connect(&ConnectionConfig::default()).await.unwrap();
        assert!(status.connected);
        assert_eq!(status.port.as_deref(), Some("/dev/ttyS7"));
        assert_eq!(monitor.status(), status);
    }

    #[tokio::test]
    async fn test_connect_without_ports_is_configuration_error() {
        let transport = MockTransport::new(&[], None);
        let mut monitor = ScaleMonitor::new(transport);

        let result = monitor.connect(&ConnectionConfig::default()).await;
        assert!(matches!(result, Err(Error::NoPortAvailable)));
        assert!(!monitor.status().connected);
    }

    #[tokio::test]
    async fn test_connect_twice_is_idempotent() {
        let (mut monitor, _scale) = monitor_with_stream(&["COM3"]);
        let opens = Arc::clone(&monitor.transport.opens);

        let first = monitor.connect(&ConnectionConfig::default()).await.unwrap();
        let second = monitor.connect(&ConnectionConfig::default()).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(second.port.as_deref(), Some("COM3"));
        assert_eq!(opens.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_disconnect_when_disconnected_is_noop() {
        let transport = MockTransport::new(&[], None);
        let mut monitor = ScaleMonitor::new(transport);

        let status = monitor.disconnect().await.unwrap();
        assert_eq!(status, ConnectionStatus::disconnected());

        // A second call behaves identically
        let status = monitor.disconnect().await.unwrap();
        assert!(!status.connected);
    }

    #[tokio::test]
    async fn test_readings_flow_to_subscribers() {
        let (mut monitor, mut scale) = monitor_with_stream(&["COM3"]);
        let mut sub = monitor.subscribe().await;

        monitor.connect(&ConnectionConfig::default()).await.unwrap();

        use tokio::io::AsyncWriteExt;
        scale.write_all(b"ST +  0.178 kg\r\n").await.unwrap();

        let event = recv_with_timeout(&mut sub).await.unwrap();
        let ScaleEvent::Reading(reading) = event else {
            panic!("expected a reading, got {event:?}");
        };
        assert_eq!(reading.value, 0.178);
        assert_eq!(reading.unit, Unit::Kg);
        assert!(reading.stable);
        assert_eq!(reading.raw, "ST +  0.178 kg");

        monitor.disconnect().await.unwrap();
    }

    #[tokio::test]
    async fn test_partial_records_assembled_across_polls() {
        let (mut monitor, mut scale) = monitor_with_stream(&["COM3"]);
        let mut sub = monitor.subscribe().await;

        monitor.connect(&ConnectionConfig::default()).await.unwrap();

        use tokio::io::AsyncWriteExt;
        scale.write_all(b"US 3,").await.unwrap();
        time::sleep(Duration::from_millis(30)).await;
        scale.write_all(b"5 g\n").await.unwrap();

        let event = recv_with_timeout(&mut sub).await.unwrap();
        let ScaleEvent::Reading(reading) = event else {
            panic!("expected a reading, got {event:?}");
        };
        assert_eq!(reading.value, 3.5);
        assert_eq!(reading.unit, Unit::G);
        assert!(!reading.stable);

        monitor.disconnect().await.unwrap();
    }

    #[tokio::test]
    async fn test_fatal_fault_broadcasts_once_and_disconnects() {
        let (mut monitor, scale) = monitor_with_stream(&["COM3"]);
        let mut sub = monitor.subscribe().await;

        monitor.connect(&ConnectionConfig::default()).await.unwrap();
        assert!(monitor.status().connected);

        // Closing the scale end makes the next poll read EOF
        drop(scale);

        let event = recv_with_timeout(&mut sub).await.unwrap();
        assert!(matches!(event, ScaleEvent::Error { .. }));
        assert!(!monitor.status().connected);

        // The loop stopped: no further events arrive
        time::sleep(Duration::from_millis(50)).await;
        assert!(sub.try_recv().is_err());

        // Teardown after a fault is still clean
        let status = monitor.disconnect().await.unwrap();
        assert!(!status.connected);
    }

    /// Reader that never has data, as a port with nothing to say.
    struct SilentReader;

    impl tokio::io::AsyncRead for SilentReader {
        fn poll_read(
            self: Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
            _buf: &mut tokio::io::ReadBuf<'_>,
        ) -> std::task::Poll<io::Result<()>> {
            std::task::Poll::Ready(Err(io::Error::new(io::ErrorKind::TimedOut, "no data yet")))
        }
    }

    #[tokio::test]
    async fn test_disconnect_interrupts_transient_backoff() {
        let transport = MockTransport::new(&["COM3"], Some(Box::new(SilentReader)));
        let mut monitor = ScaleMonitor::new(transport)
            .poll_interval(Duration::from_millis(10))
            .retry_backoff(Duration::from_secs(5));
        let mut sub = monitor.subscribe().await;

        monitor.connect(&ConnectionConfig::default()).await.unwrap();

        // Let the loop hit the transient fault and enter its backoff
        time::sleep(Duration::from_millis(50)).await;

        let status = time::timeout(Duration::from_millis(500), monitor.disconnect())
            .await
            .expect("disconnect blocked behind the retry backoff")
            .unwrap();
        assert!(!status.connected);

        // Transient faults are never surfaced to subscribers
        assert!(sub.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_disconnect_stops_loop_promptly() {
        let (mut monitor, _scale) = monitor_with_stream(&["COM3"]);
        monitor.connect(&ConnectionConfig::default()).await.unwrap();

        let status = time::timeout(Duration::from_millis(500), monitor.disconnect())
            .await
            .expect("disconnect did not observe the stop signal")
            .unwrap();
        assert!(!status.connected);
    }
}
