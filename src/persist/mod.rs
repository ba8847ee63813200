//! Relational persistence for discovery data
//!
//! [`Persister`] combines the schema migrator used by resync with the small
//! DAO surface the event pump writes through. [`PgPersister`] is the sqlx
//! implementation; [`MemoryPersister`] keeps everything in process.

mod discovery;
pub mod memory;
pub mod postgres;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::broker::EventType;

pub use discovery::{DiscoveryTable, KeyValue, Object, ResourceAttribute, ResourceObjectMeta};
pub use memory::MemoryPersister;
pub use postgres::PgPersister;

#[cfg(test)]
pub(crate) use discovery::pod_json;

#[derive(Error, Debug)]
pub enum PersistError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("table {0} does not exist")]
    MissingTable(DiscoveryTable),

    #[error("cannot decode discovery object: {0}")]
    Decode(String),

    #[error("{0}")]
    Backend(String),
}

/// Schema migrator and discovery DAO
#[async_trait]
pub trait Persister: Send + Sync {
    async fn drop_tables(&self, tables: &[DiscoveryTable]) -> Result<(), PersistError>;

    /// Create `tables`; either all of them become visible or none do
    async fn create_tables(&self, tables: &[DiscoveryTable]) -> Result<(), PersistError>;

    async fn table_exists(&self, table: DiscoveryTable) -> Result<bool, PersistError>;

    async fn count(&self, table: DiscoveryTable) -> Result<u64, PersistError>;

    /// Apply a discovery event: `ADDED`/`MODIFIED` upsert, `DELETED` removes
    async fn record_object(&self, event: EventType, object: &Object) -> Result<(), PersistError>;

    /// Stamp `cluster_name` on every object discovered in `cluster_id`
    async fn update_cluster_name(
        &self,
        cluster_id: &str,
        cluster_name: &str,
    ) -> Result<u64, PersistError>;
}

/// Source of the request's persister
pub trait Provider: Send + Sync {
    fn generic_persister(&self) -> Option<Arc<dyn Persister>>;
}

/// Provider backed by a fixed, possibly absent, persister
#[derive(Clone, Default)]
pub struct StaticProvider {
    persister: Option<Arc<dyn Persister>>,
}

impl StaticProvider {
    pub fn new(persister: Arc<dyn Persister>) -> Self {
        Self {
            persister: Some(persister),
        }
    }

    /// A provider with no persister, resync with `clearDb` fails on it
    pub fn empty() -> Self {
        Self::default()
    }
}

impl Provider for StaticProvider {
    fn generic_persister(&self) -> Option<Arc<dyn Persister>> {
        self.persister.clone()
    }
}
