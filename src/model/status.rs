//! Operator controller status values surfaced to subscribers

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Lifecycle state of an in-cluster controller (operator, MeshSync, broker)
///
/// The serialized strings are part of the subscription wire format.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    Disabled,
    Enabled,
    Processing,
    Connected,
    #[default]
    Unknown,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Disabled => "DISABLED",
            Status::Enabled => "ENABLED",
            Status::Processing => "PROCESSING",
            Status::Connected => "CONNECTED",
            Status::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error embedded in a status record so subscribers see the reason inline
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct ControllerError {
    pub code: String,
    pub description: String,
}

impl From<&Error> for ControllerError {
    fn from(err: &Error) -> Self {
        Self {
            code: err.code().to_string(),
            description: err.to_string(),
        }
    }
}

/// Status of a single in-cluster controller as reported by the operator probe
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct OperatorControllerStatus {
    pub name: String,
    pub version: String,
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ControllerError>,
}

impl OperatorControllerStatus {
    pub fn new(name: impl Into<String>, version: impl Into<String>, status: Status) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            status,
            error: None,
        }
    }

    /// A `DISABLED` record carrying `err` as its reason
    pub fn disabled(err: &Error) -> Self {
        Self {
            name: String::new(),
            version: String::new(),
            status: Status::Disabled,
            error: Some(err.into()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.status == Status::Enabled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_wire_strings() {
        assert_eq!(
            serde_json::to_string(&Status::Disabled).unwrap(),
            "\"DISABLED\""
        );
        assert_eq!(
            serde_json::to_string(&Status::Processing).unwrap(),
            "\"PROCESSING\""
        );
        let parsed: Status = serde_json::from_str("\"CONNECTED\"").unwrap();
        assert_eq!(parsed, Status::Connected);
        assert_eq!(Status::Enabled.to_string(), "ENABLED");
    }

    #[test]
    fn test_disabled_record_embeds_error() {
        let status = OperatorControllerStatus::disabled(&Error::MeshSyncSubscription);
        assert_eq!(status.status, Status::Disabled);
        assert!(status.name.is_empty());

        let error = status.error.expect("error should be embedded");
        assert_eq!(error.code, "meshsync-1001");
        assert_eq!(error.description, "failed to get MeshSync data");
    }

    #[test]
    fn test_error_is_omitted_when_absent() {
        let status = OperatorControllerStatus::new("meshsync", "v0.6.0", Status::Enabled);
        let json = serde_json::to_value(&status).unwrap();
        assert!(json.get("error").is_none());
        assert_eq!(json["status"], "ENABLED");
        assert!(status.is_enabled());
    }
}
