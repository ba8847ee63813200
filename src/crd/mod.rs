//! Custom Resource Definitions owned by the Meshery operator
//!
//! The controller only reads these; the operator creates and reconciles them.

mod broker;
mod meshsync;
pub mod types;

pub use broker::{Broker, BrokerEndpoint, BrokerSpec, BrokerStatus, BROKER_RESOURCE_NAME};
pub use meshsync::{MeshSync, MeshSyncSpec, MeshSyncStatus, MESHSYNC_RESOURCE_NAME, VERSION_LABEL};
pub use types::*;

/// Namespace the operator installs its resources into
pub const OPERATOR_NAMESPACE: &str = "meshery";
