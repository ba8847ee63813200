//! MeshSync Custom Resource Definition

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::types::{BrokerRef, Condition};

/// Name of the MeshSync resource the operator creates
pub const MESHSYNC_RESOURCE_NAME: &str = "meshery-meshsync";

/// Label carrying the deployed MeshSync version
pub const VERSION_LABEL: &str = "version";

#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "meshery.layer5.io",
    version = "v1alpha1",
    kind = "MeshSync",
    namespaced,
    status = "MeshSyncStatus",
    printcolumn = r#"{"name":"PublishingTo","type":"string","jsonPath":".status.publishing-to"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct MeshSyncSpec {
    #[serde(default)]
    pub size: i32,
    #[serde(default)]
    pub broker: BrokerRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct MeshSyncStatus {
    /// Broker endpoint MeshSync is currently publishing to
    #[serde(default, rename = "publishing-to")]
    pub publishing_to: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}

impl MeshSync {
    pub fn version_label(&self) -> String {
        self.metadata
            .labels
            .as_ref()
            .and_then(|labels| labels.get(VERSION_LABEL))
            .cloned()
            .unwrap_or_default()
    }

    /// Whether MeshSync reports an active publishing target
    pub fn is_publishing(&self) -> bool {
        self.status
            .as_ref()
            .map(|s| !s.publishing_to.is_empty())
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_version_label() {
        let mut meshsync = MeshSync::new(MESHSYNC_RESOURCE_NAME, MeshSyncSpec::default());
        assert_eq!(meshsync.version_label(), "");

        meshsync.metadata.labels = Some(BTreeMap::from([(
            VERSION_LABEL.to_string(),
            "v0.6.24".to_string(),
        )]));
        assert_eq!(meshsync.version_label(), "v0.6.24");
    }

    #[test]
    fn test_publishing_status_parses() {
        let status: MeshSyncStatus =
            serde_json::from_str(r#"{"publishing-to": "nats://meshery-nats:4222"}"#).unwrap();
        assert_eq!(status.publishing_to, "nats://meshery-nats:4222");

        let mut meshsync = MeshSync::new(MESHSYNC_RESOURCE_NAME, MeshSyncSpec::default());
        assert!(!meshsync.is_publishing());
        meshsync.status = Some(status);
        assert!(meshsync.is_publishing());
    }
}
