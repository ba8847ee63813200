//! Types shared by the operator's custom resources

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Status condition reported by the operator, following Kubernetes conventions
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of condition (e.g., "Ready", "Reconciling")
    #[serde(rename = "type")]
    pub type_: String,
    /// Status of the condition: "True", "False", or "Unknown"
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<String>,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub message: String,
}

impl Condition {
    pub fn is_true(&self) -> bool {
        self.status == "True"
    }
}

/// Reference to a broker managed by the operator
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct NativeBrokerRef {
    pub name: String,
    pub namespace: String,
}

/// Broker MeshSync publishes to: either operator-managed or an external URL
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct BrokerRef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub native: Option<NativeBrokerRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom: Option<CustomBrokerRef>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct CustomBrokerRef {
    pub url: String,
}
