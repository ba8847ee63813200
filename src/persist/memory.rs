//! In-process persister

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{
    DiscoveryTable, KeyValue, Object, PersistError, Persister, ResourceAttribute,
    ResourceObjectMeta,
};
use crate::broker::EventType;

#[derive(Default)]
struct Tables {
    present: HashSet<DiscoveryTable>,
    objects: BTreeMap<String, (String, String, String)>,
    metas: HashMap<String, ResourceObjectMeta>,
    specs: HashMap<String, ResourceAttribute>,
    statuses: HashMap<String, ResourceAttribute>,
    key_values: Vec<KeyValue>,
}

impl Tables {
    fn require(&self, table: DiscoveryTable) -> Result<(), PersistError> {
        if self.present.contains(&table) {
            Ok(())
        } else {
            Err(PersistError::MissingTable(table))
        }
    }

    fn clear(&mut self, table: DiscoveryTable) {
        match table {
            DiscoveryTable::KeyValue => self.key_values.clear(),
            DiscoveryTable::Object => self.objects.clear(),
            DiscoveryTable::ResourceSpec => self.specs.clear(),
            DiscoveryTable::ResourceStatus => self.statuses.clear(),
            DiscoveryTable::ResourceObjectMeta => self.metas.clear(),
        }
    }

    fn remove(&mut self, id: &str) {
        self.objects.remove(id);
        self.metas.remove(id);
        self.specs.remove(id);
        self.statuses.remove(id);
        self.key_values.retain(|kv| kv.unique_id != id);
    }
}

/// Discovery tables held in memory; starts with the full schema in place
pub struct MemoryPersister {
    tables: Mutex<Tables>,
    fail_ddl: AtomicBool,
}

impl MemoryPersister {
    pub fn new() -> Self {
        let tables = Tables {
            present: DiscoveryTable::ALL.into_iter().collect(),
            ..Default::default()
        };
        Self {
            tables: Mutex::new(tables),
            fail_ddl: AtomicBool::new(false),
        }
    }

    /// Make schema operations fail, for exercising resync error handling
    pub fn set_fail_ddl(&self, fail: bool) {
        self.fail_ddl.store(fail, Ordering::SeqCst);
    }

    /// Cluster name stamped on an object, if the object exists
    pub async fn cluster_name_of(&self, id: &str) -> Option<String> {
        self.tables
            .lock()
            .await
            .metas
            .get(id)
            .map(|meta| meta.cluster_name.clone())
    }

    fn check_ddl(&self, op: &str) -> Result<(), PersistError> {
        if self.fail_ddl.load(Ordering::SeqCst) {
            return Err(PersistError::Backend(format!("{} rejected", op)));
        }
        Ok(())
    }
}

impl Default for MemoryPersister {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Persister for MemoryPersister {
    async fn drop_tables(&self, tables: &[DiscoveryTable]) -> Result<(), PersistError> {
        self.check_ddl("drop table")?;
        let mut state = self.tables.lock().await;
        for table in tables {
            state.clear(*table);
            state.present.remove(table);
        }
        Ok(())
    }

    async fn create_tables(&self, tables: &[DiscoveryTable]) -> Result<(), PersistError> {
        self.check_ddl("create table")?;
        let mut state = self.tables.lock().await;
        for table in tables {
            state.present.insert(*table);
        }
        Ok(())
    }

    async fn table_exists(&self, table: DiscoveryTable) -> Result<bool, PersistError> {
        Ok(self.tables.lock().await.present.contains(&table))
    }

    async fn count(&self, table: DiscoveryTable) -> Result<u64, PersistError> {
        let state = self.tables.lock().await;
        state.require(table)?;
        let n = match table {
            DiscoveryTable::KeyValue => state.key_values.len(),
            DiscoveryTable::Object => state.objects.len(),
            DiscoveryTable::ResourceSpec => state.specs.len(),
            DiscoveryTable::ResourceStatus => state.statuses.len(),
            DiscoveryTable::ResourceObjectMeta => state.metas.len(),
        };
        Ok(n as u64)
    }

    async fn record_object(&self, event: EventType, object: &Object) -> Result<(), PersistError> {
        let mut state = self.tables.lock().await;
        for table in DiscoveryTable::ALL {
            state.require(table)?;
        }

        state.remove(&object.id);
        if matches!(event, EventType::Delete) {
            return Ok(());
        }

        state.objects.insert(
            object.id.clone(),
            (
                object.kind.clone(),
                object.api_version.clone(),
                object.cluster_id.clone(),
            ),
        );
        state
            .metas
            .insert(object.id.clone(), object.object_meta.clone());
        if let Some(spec) = &object.spec {
            state.specs.insert(object.id.clone(), spec.clone());
        }
        if let Some(status) = &object.status {
            state.statuses.insert(object.id.clone(), status.clone());
        }
        state.key_values.extend(object.key_values().cloned());
        Ok(())
    }

    async fn update_cluster_name(
        &self,
        cluster_id: &str,
        cluster_name: &str,
    ) -> Result<u64, PersistError> {
        let mut guard = self.tables.lock().await;
        let state = &mut *guard;
        state.require(DiscoveryTable::Object)?;
        state.require(DiscoveryTable::ResourceObjectMeta)?;

        let mut updated = 0;
        for (id, (_, _, object_cluster)) in state.objects.iter() {
            if object_cluster != cluster_id {
                continue;
            }
            if let Some(meta) = state.metas.get_mut(id) {
                meta.cluster_name = cluster_name.to_string();
                updated += 1;
            }
        }
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persist::pod_json;

    fn pod(id: &str) -> Object {
        Object::from_value(pod_json(id, id, "default")).unwrap()
    }

    #[tokio::test]
    async fn test_add_update_delete() {
        let store = MemoryPersister::new();
        store.record_object(EventType::Add, &pod("a")).await.unwrap();
        store.record_object(EventType::Update, &pod("a")).await.unwrap();
        store.record_object(EventType::Add, &pod("b")).await.unwrap();

        assert_eq!(store.count(DiscoveryTable::Object).await.unwrap(), 2);
        assert_eq!(store.count(DiscoveryTable::KeyValue).await.unwrap(), 4);

        store.record_object(EventType::Delete, &pod("a")).await.unwrap();
        assert_eq!(store.count(DiscoveryTable::Object).await.unwrap(), 1);
        assert_eq!(store.count(DiscoveryTable::ResourceSpec).await.unwrap(), 1);
        assert_eq!(store.count(DiscoveryTable::KeyValue).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_drop_then_create_leaves_empty_schema() {
        let store = MemoryPersister::new();
        store.record_object(EventType::Add, &pod("a")).await.unwrap();

        store.drop_tables(&DiscoveryTable::ALL).await.unwrap();
        assert!(!store.table_exists(DiscoveryTable::Object).await.unwrap());
        assert!(store.record_object(EventType::Add, &pod("b")).await.is_err());

        store.create_tables(&DiscoveryTable::ALL).await.unwrap();
        for table in DiscoveryTable::ALL {
            assert!(store.table_exists(table).await.unwrap());
            assert_eq!(store.count(table).await.unwrap(), 0);
        }
    }

    #[tokio::test]
    async fn test_update_cluster_name_matches_cluster_id() {
        let store = MemoryPersister::new();
        store.record_object(EventType::Add, &pod("a")).await.unwrap();

        let updated = store
            .update_cluster_name("https://127.0.0.1:6443/", "east")
            .await
            .unwrap();
        assert_eq!(updated, 1);
        assert_eq!(store.cluster_name_of("a").await.as_deref(), Some("east"));

        let updated = store.update_cluster_name("other", "west").await.unwrap();
        assert_eq!(updated, 0);
    }

    #[tokio::test]
    async fn test_failing_ddl() {
        let store = MemoryPersister::new();
        store.set_fail_ddl(true);
        assert!(store.drop_tables(&DiscoveryTable::ALL).await.is_err());
        assert!(store.table_exists(DiscoveryTable::KeyValue).await.unwrap());
    }
}
