//! Outbound event model and the broadcast hub.
//!
//! Every completed record fans out to all live subscribers as a
//! [`ScaleEvent`]. Delivery is best-effort: a subscriber whose channel
//! is closed or full is pruned after the broadcast pass and never
//! blocks delivery to the others.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use tokio::sync::{RwLock, mpsc};

use crate::types::Reading;

/// Default per-subscriber channel capacity.
pub const DEFAULT_SUBSCRIBER_CAPACITY: usize = 64;

/// Unique identifier for a registered subscriber.
pub type SubscriberId = u64;

/// Events delivered to subscribers.
#[derive(Debug, Clone, PartialEq)]
pub enum ScaleEvent {
    /// A parsed weight reading.
    Reading(Reading),
    /// A fault on the scale connection, for display purposes only.
    Error {
        /// Human-readable description.
        message: String,
    },
    /// Reply to a subscriber's `ping` control token.
    Pong,
}

/// Error message shape on the wire.
#[derive(Serialize)]
struct ErrorEvent<'a> {
    error: &'a str,
    #[serde(rename = "type")]
    kind: &'static str,
}

impl ScaleEvent {
    /// Renders this event as the text a subscriber channel carries.
    ///
    /// Readings and errors are JSON objects; `Pong` is the literal
    /// token `pong`.
    #[must_use]
    pub fn to_wire_text(&self) -> String {
        match self {
            Self::Reading(reading) => {
                serde_json::to_string(reading).unwrap_or_else(|e| {
                    tracing::error!("failed to serialize reading: {e}");
                    String::from("{}")
                })
            }
            Self::Error { message } => {
                let event = ErrorEvent {
                    error: message,
                    kind: "error",
                };
                serde_json::to_string(&event).unwrap_or_else(|e| {
                    tracing::error!("failed to serialize error event: {e}");
                    String::from("{}")
                })
            }
            Self::Pong => String::from("pong"),
        }
    }
}

/// A live subscriber handle.
///
/// Dropping the handle closes the receiving channel; the hub notices on
/// the next delivery attempt and removes the registration.
pub struct Subscriber {
    id: SubscriberId,
    receiver: mpsc::Receiver<ScaleEvent>,
}

impl Subscriber {
    /// Returns this subscriber's identity in the hub.
    #[must_use]
    pub const fn id(&self) -> SubscriberId {
        self.id
    }

    /// Receives the next event, or `None` once unregistered.
    pub async fn recv(&mut self) -> Option<ScaleEvent> {
        self.receiver.recv().await
    }

    /// Receives without waiting; `Err` when empty or unregistered.
    pub fn try_recv(&mut self) -> Result<ScaleEvent, mpsc::error::TryRecvError> {
        self.receiver.try_recv()
    }
}

/// Fans readings and errors out to all registered subscribers.
///
/// Cheap to clone; clones share the same registry.
#[derive(Clone)]
pub struct BroadcastHub {
    subscribers: Arc<RwLock<HashMap<SubscriberId, mpsc::Sender<ScaleEvent>>>>,
    next_id: Arc<AtomicU64>,
    capacity: usize,
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new(DEFAULT_SUBSCRIBER_CAPACITY)
    }
}

impl BroadcastHub {
    /// Creates a hub whose subscriber channels hold `capacity` events.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            subscribers: Arc::new(RwLock::new(HashMap::new())),
            next_id: Arc::new(AtomicU64::new(1)),
            capacity,
        }
    }

    /// Registers a new subscriber.
    pub async fn subscribe(&self) -> Subscriber {
        let (sender, receiver) = mpsc::channel(self.capacity);
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        self.subscribers.write().await.insert(id, sender);
        tracing::debug!(subscriber = id, "subscriber registered");

        Subscriber { id, receiver }
    }

    /// Removes a subscriber from the registry.
    pub async fn unsubscribe(&self, id: SubscriberId) {
        if self.subscribers.write().await.remove(&id).is_some() {
            tracing::debug!(subscriber = id, "subscriber removed");
        }
    }

    /// Delivers a reading to every current subscriber.
    pub async fn publish(&self, reading: Reading) {
        self.broadcast(ScaleEvent::Reading(reading)).await;
    }

    /// Delivers an error event to every current subscriber.
    pub async fn error(&self, message: impl Into<String>) {
        self.broadcast(ScaleEvent::Error {
            message: message.into(),
        })
        .await;
    }

    /// Handles a control token received from one subscriber.
    ///
    /// `ping` is answered with [`ScaleEvent::Pong`] on that subscriber's
    /// own channel; anything else is ignored.
    pub async fn handle_control(&self, id: SubscriberId, token: &str) {
        if token.trim() != "ping" {
            tracing::debug!(subscriber = id, token, "ignoring unknown control token");
            return;
        }

        let sender = {
            let subs = self.subscribers.read().await;
            subs.get(&id).cloned()
        };
        if let Some(sender) = sender {
            if sender.try_send(ScaleEvent::Pong).is_err() {
                self.unsubscribe(id).await;
            }
        }
    }

    /// Returns the number of currently registered subscribers.
    pub async fn subscriber_count(&self) -> usize {
        self.subscribers.read().await.len()
    }

    /// Snapshot the registry, attempt delivery to each entry, then
    /// remove exactly the entries that failed. Removal never happens
    /// mid-iteration, and the lock is not held while sending, so
    /// subscribers may join or leave during a broadcast.
    async fn broadcast(&self, event: ScaleEvent) {
        let snapshot: Vec<(SubscriberId, mpsc::Sender<ScaleEvent>)> = {
            let subs = self.subscribers.read().await;
            if subs.is_empty() {
                return;
            }
            subs.iter().map(|(id, tx)| (*id, tx.clone())).collect()
        };

        let mut failed = Vec::new();
        for (id, sender) in snapshot {
            if sender.try_send(event.clone()).is_err() {
                failed.push(id);
            }
        }

        if !failed.is_empty() {
            let mut subs = self.subscribers.write().await;
            for id in &failed {
                subs.remove(id);
            }
            tracing::debug!(pruned = failed.len(), "removed unreachable subscribers");
        }
    }
}
