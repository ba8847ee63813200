//! In-process broker with queue-group delivery
//!
//! Used for single-node runs and tests. Every subject keeps its queue groups;
//! a published message reaches one member of each group, chosen round-robin.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};
use tracing::debug;

use super::{Broker, BrokerDialer, BrokerError, ConnectionInfo, Message};

#[derive(Default)]
struct QueueGroup {
    members: Vec<mpsc::Sender<Message>>,
    next: usize,
}

#[derive(Default)]
struct Inner {
    groups: Mutex<HashMap<String, HashMap<String, QueueGroup>>>,
    published: Mutex<Vec<(String, Message)>>,
    dialed: Mutex<Vec<String>>,
    disconnected: AtomicBool,
    refuse_dial: AtomicBool,
    refuse_subscribe: AtomicBool,
}

/// Cloneable handle; clones share subscriptions and history
#[derive(Clone, Default)]
pub struct MemoryBroker {
    inner: Arc<Inner>,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the broker report `NotConnected` and reject publishes
    pub fn set_disconnected(&self, disconnected: bool) {
        self.inner.disconnected.store(disconnected, Ordering::SeqCst);
    }

    pub fn set_refuse_dial(&self, refuse: bool) {
        self.inner.refuse_dial.store(refuse, Ordering::SeqCst);
    }

    pub fn set_refuse_subscribe(&self, refuse: bool) {
        self.inner.refuse_subscribe.store(refuse, Ordering::SeqCst);
    }

    /// Messages published so far on `subject`, oldest first
    pub async fn published(&self, subject: &str) -> Vec<Message> {
        self.inner
            .published
            .lock()
            .await
            .iter()
            .filter(|(s, _)| s == subject)
            .map(|(_, m)| m.clone())
            .collect()
    }

    pub async fn dialed_endpoints(&self) -> Vec<String> {
        self.inner.dialed.lock().await.clone()
    }

    /// Number of live subscriptions across all subjects and groups
    pub async fn subscription_count(&self) -> usize {
        self.inner
            .groups
            .lock()
            .await
            .values()
            .flat_map(|groups| groups.values())
            .map(|group| group.members.iter().filter(|tx| !tx.is_closed()).count())
            .sum()
    }
}

#[async_trait]
impl Broker for MemoryBroker {
    fn info(&self) -> ConnectionInfo {
        if self.inner.disconnected.load(Ordering::SeqCst) {
            ConnectionInfo::NotConnected
        } else {
            ConnectionInfo::Connected
        }
    }

    async fn publish(&self, subject: &str, msg: &Message) -> Result<(), BrokerError> {
        if self.info() == ConnectionInfo::NotConnected {
            return Err(BrokerError::Publish {
                subject: subject.to_string(),
                reason: "connection closed".to_string(),
            });
        }

        self.inner
            .published
            .lock()
            .await
            .push((subject.to_string(), msg.clone()));

        // Pick one live member per group, then send without holding the lock
        let targets: Vec<mpsc::Sender<Message>> = {
            let mut groups = self.inner.groups.lock().await;
            groups
                .get_mut(subject)
                .map(|groups| {
                    groups
                        .values_mut()
                        .filter_map(|group| {
                            group.members.retain(|tx| !tx.is_closed());
                            if group.members.is_empty() {
                                return None;
                            }
                            let idx = group.next % group.members.len();
                            group.next = group.next.wrapping_add(1);
                            Some(group.members[idx].clone())
                        })
                        .collect()
                })
                .unwrap_or_default()
        };

        for tx in targets {
            if tx.send(msg.clone()).await.is_err() {
                debug!("Dropping message on {}: subscriber went away", subject);
            }
        }
        Ok(())
    }

    async fn subscribe(
        &self,
        subject: &str,
        queue: &str,
        tx: mpsc::Sender<Message>,
    ) -> Result<(), BrokerError> {
        if self.inner.refuse_subscribe.load(Ordering::SeqCst) {
            return Err(BrokerError::Subscribe {
                subject: subject.to_string(),
                reason: "subscription refused".to_string(),
            });
        }

        self.inner
            .groups
            .lock()
            .await
            .entry(subject.to_string())
            .or_default()
            .entry(queue.to_string())
            .or_default()
            .members
            .push(tx);
        debug!("Subscribed to {} on queue {}", subject, queue);
        Ok(())
    }
}

#[async_trait]
impl BrokerDialer for MemoryBroker {
    async fn dial(&self, endpoint: &str) -> Result<Arc<dyn Broker>, BrokerError> {
        if self.inner.refuse_dial.load(Ordering::SeqCst) {
            return Err(BrokerError::Dial {
                endpoint: endpoint.to_string(),
                reason: "connection refused".to_string(),
            });
        }
        self.inner.dialed.lock().await.push(endpoint.to_string());
        Ok(Arc::new(self.clone()))
    }
}
