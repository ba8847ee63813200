//! Broker Custom Resource Definition
//!
//! The operator deploys the broker MeshSync publishes to and reports its
//! reachable endpoints on the resource status.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::types::Condition;

/// Name of the broker resource the operator creates
pub const BROKER_RESOURCE_NAME: &str = "meshery-broker";

#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "meshery.layer5.io",
    version = "v1alpha1",
    kind = "Broker",
    namespaced,
    status = "BrokerStatus",
    printcolumn = r#"{"name":"External","type":"string","jsonPath":".status.endpoint.external"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct BrokerSpec {
    /// Number of broker replicas
    #[serde(default = "default_size")]
    pub size: i32,
}

fn default_size() -> i32 {
    1
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct BrokerEndpoint {
    /// Endpoint reachable from inside the cluster
    #[serde(default)]
    pub internal: String,
    /// Endpoint reachable from outside the cluster, `host:port`
    #[serde(default)]
    pub external: String,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BrokerStatus {
    #[serde(default)]
    pub endpoint: BrokerEndpoint,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}

impl Broker {
    /// Endpoint the controller should dial, once the operator has published one
    ///
    /// The external endpoint is preferred since the controller normally runs
    /// outside the cluster; the internal one is the fallback.
    pub fn advertised_endpoint(&self) -> Option<String> {
        let endpoint = &self.status.as_ref()?.endpoint;
        [&endpoint.external, &endpoint.internal]
            .into_iter()
            .find(|e| !e.is_empty())
            .map(|e| {
                if e.contains("://") {
                    e.to_string()
                } else {
                    format!("nats://{}", e)
                }
            })
    }
}
