//! Error types for the MeshSync controller

use thiserror::Error;

use crate::broker::BrokerError;
use crate::persist::PersistError;

#[derive(Error, Debug)]
pub enum Error {
    /// No usable Kubernetes context was attached to the request
    #[error("no Kubernetes context found for the request")]
    NilClient,

    /// The operator client could not be built from the cluster configuration
    #[error("cannot find Meshery client")]
    MesheryClientMissing,

    /// Reading MeshSync information through the operator client failed
    #[error("failed to get MeshSync data")]
    MeshSyncSubscription,

    /// Schema mutation attempted without a persister
    #[error("database handler is not available")]
    EmptyHandler,

    /// Dropping or recreating the discovery tables failed
    #[error("failed to delete discovery data: {0}")]
    DeleteData(#[source] PersistError),

    /// The broker reports it is not connected
    #[error("broker is not connected")]
    BrokerNotConnected,

    /// Publishing a request on the broker failed
    #[error("failed to publish to broker: {0}")]
    PublishBroker(#[source] BrokerError),

    /// Subscribing to the broker for discovery events failed
    #[error("failed to subscribe to MeshSync through the broker: {0}")]
    AddonSubscription(#[source] BrokerError),

    /// Kubernetes API error
    #[error("Kubernetes API error: {0}")]
    KubeError(#[from] kube::Error),

    /// Kubeconfig could not be loaded or resolved
    #[error("kubeconfig error: {0}")]
    KubeconfigError(#[from] kube::config::KubeconfigError),

    /// Persistence error outside of schema mutation
    #[error("persistence error: {0}")]
    PersistError(#[from] PersistError),

    /// Configuration error
    #[error("configuration error: {0}")]
    ConfigError(String),
}

impl Error {
    /// Stable code surfaced to subscribers alongside the description
    pub fn code(&self) -> &'static str {
        match self {
            Error::NilClient => "meshsync-1000",
            Error::MesheryClientMissing | Error::MeshSyncSubscription => "meshsync-1001",
            Error::EmptyHandler => "meshsync-1002",
            Error::DeleteData(_) => "meshsync-1003",
            Error::BrokerNotConnected => "meshsync-1004",
            Error::PublishBroker(_) => "meshsync-1005",
            Error::AddonSubscription(_) => "meshsync-1006",
            Error::KubeError(_) | Error::KubeconfigError(_) => "meshsync-1007",
            Error::PersistError(_) => "meshsync-1008",
            Error::ConfigError(_) => "meshsync-1009",
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_errors_share_a_code() {
        assert_eq!(
            Error::MesheryClientMissing.code(),
            Error::MeshSyncSubscription.code()
        );
        assert_ne!(Error::NilClient.code(), Error::EmptyHandler.code());
    }

    #[test]
    fn test_wrapped_errors_keep_inner_message() {
        let err = Error::PublishBroker(BrokerError::NotConnected);
        assert_eq!(
            err.to_string(),
            "failed to publish to broker: broker connection is not established"
        );

        let err = Error::DeleteData(PersistError::Backend("relation busy".to_string()));
        assert!(err.to_string().contains("relation busy"));
    }
}
