//! Message broker abstraction used to reach MeshSync
//!
//! The wire implementation (NATS or otherwise) lives outside this crate; the
//! controller only needs the operations exposed by [`Broker`] plus a
//! [`BrokerDialer`] that opens a connection for an endpoint advertised by the
//! operator. [`BrokerConnection`] holds one connection per endpoint.

pub mod memory;
mod message;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::{mpsc, RwLock};
use tracing::{info, warn};

pub use memory::MemoryBroker;
pub use message::{Entity, EventType, Message, ObjectType, RequestObject};

/// Subject carrying outbound request envelopes to MeshSync
pub const REQUEST_SUBJECT: &str = "meshery.meshsync.request";

/// Subject on which MeshSync publishes discovery events
pub const MESHSYNC_SUBJECT: &str = "meshery.meshsync.core";

/// Queue group shared by every controller replica
pub const BROKER_QUEUE: &str = "meshery";

/// Connection state as reported by a broker
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionInfo {
    Connected,
    NotConnected,
}

impl fmt::Display for ConnectionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionInfo::Connected => f.write_str("connected"),
            ConnectionInfo::NotConnected => f.write_str("not-connected"),
        }
    }
}

#[derive(Error, Debug)]
pub enum BrokerError {
    #[error("broker connection is not established")]
    NotConnected,

    #[error("failed to connect to broker at {endpoint}: {reason}")]
    Dial { endpoint: String, reason: String },

    #[error("broker endpoint unavailable: {0}")]
    EndpointUnavailable(String),

    #[error("publish on {subject} failed: {reason}")]
    Publish { subject: String, reason: String },

    #[error("subscribe to {subject} failed: {reason}")]
    Subscribe { subject: String, reason: String },

    #[error("operator API error: {0}")]
    Kube(#[from] kube::Error),
}

/// Operations the controller performs on a live broker connection
#[async_trait]
pub trait Broker: Send + Sync {
    fn info(&self) -> ConnectionInfo;

    async fn publish(&self, subject: &str, msg: &Message) -> Result<(), BrokerError>;

    /// Deliver messages on `subject` into `tx`, load-balanced across `queue`
    async fn subscribe(
        &self,
        subject: &str,
        queue: &str,
        tx: mpsc::Sender<Message>,
    ) -> Result<(), BrokerError>;
}

/// Opens broker connections for endpoints advertised by the operator
#[async_trait]
pub trait BrokerDialer: Send + Sync {
    async fn dial(&self, endpoint: &str) -> Result<Arc<dyn Broker>, BrokerError>;
}

/// Controller-owned broker connections, one per advertised endpoint
pub struct BrokerConnection {
    held: RwLock<HashMap<String, Arc<dyn Broker>>>,
    dialer: Arc<dyn BrokerDialer>,
}

impl BrokerConnection {
    pub fn new(dialer: Arc<dyn BrokerDialer>) -> Self {
        Self {
            held: RwLock::new(HashMap::new()),
            dialer,
        }
    }

    pub async fn is_empty(&self) -> bool {
        self.held.read().await.is_empty()
    }

    /// `Connected` when any held broker reports it, `NotConnected` otherwise
    pub async fn info(&self) -> ConnectionInfo {
        let held = self.held.read().await;
        if held
            .values()
            .any(|broker| broker.info() == ConnectionInfo::Connected)
        {
            ConnectionInfo::Connected
        } else {
            ConnectionInfo::NotConnected
        }
    }

    pub async fn get(&self, endpoint: &str) -> Option<Arc<dyn Broker>> {
        self.held.read().await.get(endpoint).cloned()
    }

    /// Endpoints with a held connection, sorted
    pub async fn endpoints(&self) -> Vec<String> {
        let mut endpoints: Vec<String> = self.held.read().await.keys().cloned().collect();
        endpoints.sort();
        endpoints
    }

    /// Return the connection for `endpoint`, dialing it first if none is held
    pub async fn ensure(&self, endpoint: &str) -> Result<Arc<dyn Broker>, BrokerError> {
        let mut held = self.held.write().await;
        if let Some(broker) = held.get(endpoint) {
            return Ok(broker.clone());
        }

        let broker = self.dialer.dial(endpoint).await?;
        info!("Connected to broker at {}", endpoint);
        held.insert(endpoint.to_string(), broker.clone());
        Ok(broker)
    }

    /// Publish on every held connection
    ///
    /// All connections are attempted; the first failure is returned.
    pub async fn publish(&self, subject: &str, msg: &Message) -> Result<(), BrokerError> {
        let held: Vec<(String, Arc<dyn Broker>)> = self
            .held
            .read()
            .await
            .iter()
            .map(|(endpoint, broker)| (endpoint.clone(), broker.clone()))
            .collect();
        if held.is_empty() {
            return Err(BrokerError::NotConnected);
        }

        let mut first_error = None;
        for (endpoint, broker) in held {
            if let Err(e) = broker.publish(subject, msg).await {
                warn!("Publish on {} via {} failed: {}", subject, endpoint, e);
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for BrokerConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BrokerConnection").finish_non_exhaustive()
    }
}
