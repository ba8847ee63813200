//! MeshSync liveness signal
//!
//! Written by the operator probe and the event pump whenever MeshSync shows
//! signs of life; read by anything that wants the last heartbeat time.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::watch;

#[derive(Clone, Debug)]
pub struct Liveness {
    tx: Arc<watch::Sender<Option<DateTime<Utc>>>>,
}

impl Liveness {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    /// Record a heartbeat observed now
    pub fn beat(&self) {
        self.tx.send_replace(Some(Utc::now()));
    }

    pub fn last_seen(&self) -> Option<DateTime<Utc>> {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<DateTime<Utc>>> {
        self.tx.subscribe()
    }
}

impl Default for Liveness {
    fn default() -> Self {
        Self::new()
    }
}
