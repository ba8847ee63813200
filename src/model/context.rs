//! Kubernetes contexts and the request-scoped values that carry them

use std::path::Path;
use std::sync::Arc;

use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{Error, Result};

/// A named Kubernetes cluster access configuration
#[derive(Clone, Debug)]
pub struct K8sContext {
    /// Opaque identifier used as the connection registry key
    pub id: String,
    /// Context name as it appears in the kubeconfig
    pub name: String,
    /// API server URL; discovered objects are tagged with it as their cluster id
    pub kubernetes_server_id: String,
    kubeconfig: Arc<Kubeconfig>,
}

/// REST configuration and typed client for one cluster
#[derive(Clone)]
pub struct KubeHandler {
    pub config: Config,
    pub client: Client,
}

impl K8sContext {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        kubernetes_server_id: impl Into<String>,
        kubeconfig: Kubeconfig,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kubernetes_server_id: kubernetes_server_id.into(),
            kubeconfig: Arc::new(kubeconfig),
        }
    }

    /// Resolve a single named context, using its API server URL as the server id
    pub async fn load(kubeconfig: &Kubeconfig, context: &str) -> Result<Self> {
        let options = KubeConfigOptions {
            context: Some(context.to_string()),
            ..Default::default()
        };
        let config = Config::from_custom_kubeconfig(kubeconfig.clone(), &options).await?;

        Ok(Self::new(
            context,
            context,
            config.cluster_url.to_string(),
            kubeconfig.clone(),
        ))
    }

    /// Resolve every context in the kubeconfig, or only `only` when non-empty
    pub async fn load_all(kubeconfig: &Kubeconfig, only: &[String]) -> Result<Vec<Self>> {
        let mut contexts = Vec::new();
        for named in &kubeconfig.contexts {
            if !only.is_empty() && !only.contains(&named.name) {
                continue;
            }
            contexts.push(Self::load(kubeconfig, &named.name).await?);
        }
        debug!("Loaded {} Kubernetes contexts", contexts.len());
        Ok(contexts)
    }

    /// Read a kubeconfig file and resolve its contexts
    pub async fn load_from_path(path: &Path, only: &[String]) -> Result<Vec<Self>> {
        let kubeconfig = Kubeconfig::read_from(path)?;
        Self::load_all(&kubeconfig, only).await
    }

    /// Build the REST config and client for this context
    pub async fn generate_kube_handler(&self) -> Result<KubeHandler> {
        let options = KubeConfigOptions {
            context: Some(self.name.clone()),
            ..Default::default()
        };
        let config = Config::from_custom_kubeconfig((*self.kubeconfig).clone(), &options).await?;
        let client = Client::try_from(config.clone()).map_err(Error::KubeError)?;
        Ok(KubeHandler { config, client })
    }
}

/// Request-scoped values: the contexts in scope and the request's cancellation
///
/// The cluster list plays the role of the `KubeClusters` request value; a
/// request that never attached one is distinguished from an empty list only
/// for logging, both resolve to [`Error::NilClient`].
#[derive(Clone, Debug, Default)]
pub struct RequestContext {
    kube_clusters: Option<Vec<K8sContext>>,
    cancellation: CancellationToken,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_kube_clusters(mut self, contexts: Vec<K8sContext>) -> Self {
        self.kube_clusters = Some(contexts);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// Contexts in scope for this request, in caller order
    pub fn kube_clusters(&self) -> Result<&[K8sContext]> {
        match self.kube_clusters.as_deref() {
            Some(contexts) if !contexts.is_empty() => Ok(contexts),
            _ => Err(Error::NilClient),
        }
    }

    /// The in-scope context with the given id
    pub fn kube_cluster(&self, id: &str) -> Result<&K8sContext> {
        self.kube_clusters()?
            .iter()
            .find(|c| c.id == id)
            .ok_or(Error::NilClient)
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }
}

/// Administrative resync request
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResyncActions {
    /// Drop and recreate the discovery tables
    #[serde(default)]
    pub clear_db: bool,
    /// Ask MeshSync to rediscover the cluster
    #[serde(default)]
    pub re_sync: bool,
    /// Demote schema failures to warnings instead of aborting
    #[serde(default)]
    pub force: bool,
}
