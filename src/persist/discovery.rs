//! Discovery entities written by MeshSync events

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::PersistError;

/// The five tables owned by the discovery schema
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DiscoveryTable {
    KeyValue,
    Object,
    ResourceSpec,
    ResourceStatus,
    ResourceObjectMeta,
}

impl DiscoveryTable {
    /// Every discovery table; schema wipes and rebuilds always cover all of them
    pub const ALL: [DiscoveryTable; 5] = [
        DiscoveryTable::KeyValue,
        DiscoveryTable::Object,
        DiscoveryTable::ResourceSpec,
        DiscoveryTable::ResourceStatus,
        DiscoveryTable::ResourceObjectMeta,
    ];

    pub fn table_name(&self) -> &'static str {
        match self {
            DiscoveryTable::KeyValue => "key_values",
            DiscoveryTable::Object => "objects",
            DiscoveryTable::ResourceSpec => "resource_specs",
            DiscoveryTable::ResourceStatus => "resource_statuses",
            DiscoveryTable::ResourceObjectMeta => "resource_object_meta",
        }
    }
}

impl fmt::Display for DiscoveryTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table_name())
    }
}

/// Label or annotation row attached to an object
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct KeyValue {
    #[serde(default)]
    pub unique_id: String,
    #[serde(default)]
    pub kind: String,
    pub key: String,
    #[serde(default)]
    pub value: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceObjectMeta {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub uid: String,
    #[serde(default)]
    pub resource_version: String,
    #[serde(default)]
    pub generation: i64,
    #[serde(default)]
    pub creation_timestamp: Option<String>,
    #[serde(default)]
    pub labels: Vec<KeyValue>,
    #[serde(default)]
    pub annotations: Vec<KeyValue>,
    #[serde(default)]
    pub cluster_name: String,
}

/// Opaque JSON attribute blob for spec and status
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct ResourceAttribute {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub attribute: String,
}

/// A discovered Kubernetes object with its owned rows
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Object {
    pub id: String,
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub api_version: String,
    #[serde(default, alias = "cluster_id")]
    pub cluster_id: String,
    #[serde(default, rename = "metadata")]
    pub object_meta: ResourceObjectMeta,
    #[serde(default)]
    pub spec: Option<ResourceAttribute>,
    #[serde(default)]
    pub status: Option<ResourceAttribute>,
}

impl Object {
    /// Decode a broker payload, propagating the object id to its owned rows
    pub fn from_value(value: Value) -> Result<Self, PersistError> {
        let mut object: Object =
            serde_json::from_value(value).map_err(|e| PersistError::Decode(e.to_string()))?;
        if object.id.is_empty() {
            return Err(PersistError::Decode("object has no id".to_string()));
        }
        object.normalize();
        Ok(object)
    }

    fn normalize(&mut self) {
        let id = self.id.clone();
        self.object_meta.id = id.clone();
        for (kind, rows) in [
            ("label", &mut self.object_meta.labels),
            ("annotation", &mut self.object_meta.annotations),
        ] {
            for kv in rows.iter_mut() {
                kv.unique_id = id.clone();
                kv.kind = kind.to_string();
            }
        }
        if let Some(spec) = self.spec.as_mut() {
            spec.id = id.clone();
        }
        if let Some(status) = self.status.as_mut() {
            status.id = id;
        }
    }

    pub fn name(&self) -> &str {
        &self.object_meta.name
    }

    pub fn namespace(&self) -> &str {
        &self.object_meta.namespace
    }

    pub fn key_values(&self) -> impl Iterator<Item = &KeyValue> {
        self.object_meta
            .labels
            .iter()
            .chain(self.object_meta.annotations.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    pub(crate) fn pod_json(id: &str, name: &str, namespace: &str) -> Value {
        json!({
            "id": id,
            "kind": "Pod",
            "apiVersion": "v1",
            "cluster_id": "https://127.0.0.1:6443/",
            "metadata": {
                "name": name,
                "namespace": namespace,
                "labels": [{"key": "app", "value": name}],
                "annotations": [{"key": "owner", "value": "platform"}]
            },
            "spec": {"attribute": "{\"nodeName\":\"kind-worker\"}"},
            "status": {"attribute": "{\"phase\":\"Running\"}"}
        })
    }

    #[test]
    fn test_from_value_propagates_ids() {
        let object = Object::from_value(pod_json("obj-1", "web", "default")).unwrap();
        assert_eq!(object.object_meta.id, "obj-1");
        assert_eq!(object.spec.as_ref().unwrap().id, "obj-1");
        assert_eq!(object.status.as_ref().unwrap().id, "obj-1");

        let kinds: Vec<&str> = object.key_values().map(|kv| kv.kind.as_str()).collect();
        assert_eq!(kinds, vec!["label", "annotation"]);
        assert!(object.key_values().all(|kv| kv.unique_id == "obj-1"));
        assert_eq!(object.cluster_id, "https://127.0.0.1:6443/");
    }

    #[test]
    fn test_from_value_requires_id() {
        let err = Object::from_value(json!({"kind": "Pod"})).unwrap_err();
        assert!(matches!(err, PersistError::Decode(_)));
    }

    #[test]
    fn test_table_names_are_distinct() {
        let mut names: Vec<&str> = DiscoveryTable::ALL.iter().map(|t| t.table_name()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), 5);
    }
}

#[cfg(test)]
pub(crate) use tests::pod_json;
