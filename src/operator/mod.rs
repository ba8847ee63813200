//! Client for the Meshery operator's custom resources
//!
//! [`OperatorClientFactory`] is the seam the probe and binder go through, so
//! the in-cluster operator can be replaced by anything that reports the same
//! resources.

use std::sync::Arc;

use async_trait::async_trait;
use kube::api::Api;
use kube::Client;
use tracing::debug;

use crate::crd::{Broker, MeshSync, BROKER_RESOURCE_NAME, MESHSYNC_RESOURCE_NAME, OPERATOR_NAMESPACE};
use crate::error::{Error, Result};
use crate::liveness::Liveness;
use crate::model::{KubeHandler, OperatorControllerStatus, Status};

/// Name reported for the MeshSync controller
pub const MESHSYNC_CONTROLLER_NAME: &str = "meshsync";

#[async_trait]
pub trait OperatorClient: Send + Sync {
    /// MeshSync controller status; may beat `liveness` when MeshSync is publishing
    async fn meshsync_info(&self, liveness: &Liveness) -> Result<OperatorControllerStatus>;

    /// Broker endpoint advertised by the operator, `None` until it has one
    async fn broker_endpoint(&self) -> Result<Option<String>>;
}

pub trait OperatorClientFactory: Send + Sync {
    fn client_for(&self, handler: &KubeHandler) -> Result<Arc<dyn OperatorClient>>;
}

/// Reads `MeshSync` and `Broker` resources through the cluster's client
pub struct KubeOperatorClient {
    meshsyncs: Api<MeshSync>,
    brokers: Api<Broker>,
}

impl KubeOperatorClient {
    pub fn new(client: Client, namespace: &str) -> Self {
        Self {
            meshsyncs: Api::namespaced(client.clone(), namespace),
            brokers: Api::namespaced(client, namespace),
        }
    }
}

#[async_trait]
impl OperatorClient for KubeOperatorClient {
    async fn meshsync_info(&self, liveness: &Liveness) -> Result<OperatorControllerStatus> {
        let meshsync = self
            .meshsyncs
            .get(MESHSYNC_RESOURCE_NAME)
            .await
            .map_err(Error::KubeError)?;

        if meshsync.is_publishing() {
            liveness.beat();
        }

        Ok(OperatorControllerStatus::new(
            MESHSYNC_CONTROLLER_NAME,
            meshsync.version_label(),
            Status::Enabled,
        ))
    }

    async fn broker_endpoint(&self) -> Result<Option<String>> {
        let broker = self
            .brokers
            .get_opt(BROKER_RESOURCE_NAME)
            .await
            .map_err(Error::KubeError)?;
        let endpoint = broker.and_then(|b| b.advertised_endpoint());
        debug!("Operator broker endpoint: {:?}", endpoint);
        Ok(endpoint)
    }
}

/// Builds [`KubeOperatorClient`]s over a context's client
#[derive(Clone, Debug)]
pub struct KubeOperatorFactory {
    namespace: String,
}

impl KubeOperatorFactory {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }
}

impl Default for KubeOperatorFactory {
    fn default() -> Self {
        Self::new(OPERATOR_NAMESPACE)
    }
}

impl OperatorClientFactory for KubeOperatorFactory {
    fn client_for(&self, handler: &KubeHandler) -> Result<Arc<dyn OperatorClient>> {
        Ok(Arc::new(KubeOperatorClient::new(
            handler.client.clone(),
            &self.namespace,
        )))
    }
}
