//! # Broadcast bus for operator health and error envelopes.
//!
//! [`Broadcast`] wraps [`tokio::sync::broadcast`] so any component can submit
//! `{source, type, data}` envelopes without blocking, and any number of
//! listeners (status subscriptions, UI streams) can observe them.
//!
//! ## Rules
//! - **Non-blocking submit**: `submit()` never waits for receivers.
//! - **No history**: a receiver only sees envelopes submitted after it subscribed.
//! - **FIFO**: every receiver observes envelopes in submission order.
//! - **Bounded**: receivers that fall more than `capacity` envelopes behind get
//!   `RecvError::Lagged(n)` and skip the `n` oldest ones.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::trace;

/// Default number of envelopes buffered for slow receivers
pub const DEFAULT_BUS_CAPACITY: usize = 256;

/// Component that produced an envelope
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum BroadcastSource {
    OperatorSyncChannel,
    MeshSyncChannel,
}

/// Kind of envelope; `health` carries a boolean, `error` a message
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    Health,
    Error,
}

/// Immutable envelope delivered to every live subscriber
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct BroadcastMessage {
    pub source: BroadcastSource,
    #[serde(rename = "type")]
    pub kind: MessageType,
    pub data: Value,
}

impl BroadcastMessage {
    /// Health envelope: `true` while work is in progress, `false` once steady
    pub fn health(source: BroadcastSource, in_progress: bool) -> Self {
        Self {
            source,
            kind: MessageType::Health,
            data: Value::Bool(in_progress),
        }
    }

    pub fn error(source: BroadcastSource, err: &dyn std::error::Error) -> Self {
        Self {
            source,
            kind: MessageType::Error,
            data: Value::String(err.to_string()),
        }
    }
}

/// Multi-producer, multi-consumer envelope bus
///
/// Cheap to clone; clones share the same channel.
#[derive(Clone, Debug)]
pub struct Broadcast {
    tx: broadcast::Sender<BroadcastMessage>,
}

impl Broadcast {
    /// Creates a bus buffering at most `capacity` envelopes (clamped to 1)
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Delivers `msg` to every current subscriber
    ///
    /// Envelopes submitted while nobody listens are dropped.
    pub fn submit(&self, msg: BroadcastMessage) {
        trace!(source = ?msg.source, kind = ?msg.kind, "broadcast submit");
        #[cfg(feature = "metrics")]
        crate::controller::metrics::inc_broadcast_submitted(msg.source, msg.kind);
        let _ = self.tx.send(msg);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BroadcastMessage> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for Broadcast {
    fn default() -> Self {
        Self::new(DEFAULT_BUS_CAPACITY)
    }
}
