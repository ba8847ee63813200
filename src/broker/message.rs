//! Broker envelope exchanged with MeshSync

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// What an inbound message carries
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum ObjectType {
    #[serde(rename = "meshsync-data")]
    MeshSync,
    #[serde(rename = "meshsync-liveness")]
    Liveness,
    #[serde(rename = "smi")]
    Smi,
    #[serde(other)]
    Unknown,
}

impl ObjectType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectType::MeshSync => "meshsync-data",
            ObjectType::Liveness => "meshsync-liveness",
            ObjectType::Smi => "smi",
            ObjectType::Unknown => "unknown",
        }
    }
}

/// Change that produced a discovery event
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum EventType {
    #[serde(rename = "ADDED")]
    Add,
    #[serde(rename = "MODIFIED")]
    Update,
    #[serde(rename = "DELETED")]
    Delete,
    #[serde(rename = "ERROR")]
    Error,
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EventType::Add => "ADDED",
            EventType::Update => "MODIFIED",
            EventType::Delete => "DELETED",
            EventType::Error => "ERROR",
        })
    }
}

/// Target of an outbound request
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum Entity {
    #[serde(rename = "resync-discovery")]
    ReSyncDiscovery,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct RequestObject {
    pub entity: Entity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

/// Envelope for both directions: `request` outbound, `object` inbound
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Message {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_type: Option<ObjectType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_type: Option<EventType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<RequestObject>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object: Option<Value>,
}

impl Message {
    pub fn request(entity: Entity) -> Self {
        Self {
            request: Some(RequestObject {
                entity,
                payload: None,
            }),
            ..Default::default()
        }
    }

    pub fn discovery(event_type: EventType, object: Value) -> Self {
        Self {
            object_type: Some(ObjectType::MeshSync),
            event_type: Some(event_type),
            object: Some(object),
            ..Default::default()
        }
    }

    pub fn liveness() -> Self {
        Self {
            object_type: Some(ObjectType::Liveness),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_resync_request_wire_format() {
        let json = serde_json::to_value(Message::request(Entity::ReSyncDiscovery)).unwrap();
        assert_eq!(json, json!({"Request": {"Entity": "resync-discovery"}}));
    }

    #[test]
    fn test_inbound_discovery_event_parses() {
        let msg: Message = serde_json::from_value(json!({
            "ObjectType": "meshsync-data",
            "EventType": "MODIFIED",
            "Object": {"kind": "Pod"}
        }))
        .unwrap();
        assert_eq!(msg.object_type, Some(ObjectType::MeshSync));
        assert_eq!(msg.event_type, Some(EventType::Update));
        assert_eq!(msg.object.unwrap()["kind"], "Pod");
    }

    #[test]
    fn test_unrecognised_object_type_is_unknown() {
        let msg: Message = serde_json::from_value(json!({"ObjectType": "istio-adapter"})).unwrap();
        assert_eq!(msg.object_type, Some(ObjectType::Unknown));
    }
}
