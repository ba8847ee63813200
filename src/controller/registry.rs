//! Connection registry mapping Kubernetes contexts to broker endpoints
//!
//! One registry exists per process; it is handed to the controller rather
//! than reached through a global so tests can use isolated instances.

use std::collections::{BTreeMap, HashMap};
use std::sync::{PoisonError, RwLock};

use tracing::{info, warn};

/// Thread-safe `context id -> broker endpoint` map
///
/// An empty endpoint means "unbound"; it is never stored.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    entries: RwLock<HashMap<String, String>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Endpoint bound to `id`, or `""` when unbound
    pub fn get(&self, id: &str) -> String {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn is_bound(&self, id: &str) -> bool {
        !self.get(id).is_empty()
    }

    /// Bind `id` to `endpoint`, replacing any previous binding
    pub fn set(&self, id: &str, endpoint: &str) {
        if endpoint.is_empty() {
            warn!("Refusing to bind context {} to an empty endpoint", id);
            return;
        }
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.insert(id.to_string(), endpoint.to_string());
        #[cfg(feature = "metrics")]
        super::metrics::set_registered_contexts(entries.len());
    }

    /// Remove the binding for `id`, returning the endpoint it had
    pub fn unbind(&self, id: &str) -> Option<String> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let removed = entries.remove(id);
        #[cfg(feature = "metrics")]
        super::metrics::set_registered_contexts(entries.len());
        removed
    }

    /// Distinct endpoints currently bound
    pub fn endpoints(&self) -> Vec<String> {
        let mut endpoints: Vec<String> = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        endpoints.sort();
        endpoints.dedup();
        endpoints
    }

    /// Ordered copy of every binding
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn log(&self) {
        for (id, endpoint) in self.snapshot() {
            info!("Context {} bound to broker at {}", id, endpoint);
        }
    }
}
