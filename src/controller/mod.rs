//! MeshSync controller
//!
//! Binds Kubernetes contexts to the broker advertised by the Meshery operator,
//! pumps MeshSync discovery events into the persister and streams the
//! MeshSync status to subscribers.

mod binder;
pub mod config;
#[cfg(feature = "metrics")]
pub mod metrics;
mod operator_sync;
mod probe;
#[cfg(test)]
mod probe_test;
mod pump;
pub mod registry;
mod resync;
mod state;
mod subscription;
#[cfg(test)]
pub(crate) mod test_support;

pub use config::ControllerConfig;
pub use registry::ConnectionRegistry;
pub use state::{MeshSyncSignal, SyncController, SyncPing};
