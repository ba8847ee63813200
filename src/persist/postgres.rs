//! Postgres persister
//!
//! Table DDL mirrors the discovery entities one-to-one; labels and annotations
//! share `key_values`, distinguished by `kind`.

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::debug;

use super::{DiscoveryTable, Object, PersistError, Persister};
use crate::broker::EventType;

fn create_statement(table: DiscoveryTable) -> &'static str {
    match table {
        DiscoveryTable::KeyValue => {
            r#"CREATE TABLE IF NOT EXISTS key_values (
                unique_id TEXT NOT NULL,
                kind TEXT NOT NULL,
                key TEXT NOT NULL,
                value TEXT NOT NULL DEFAULT '',
                PRIMARY KEY (unique_id, kind, key)
            )"#
        }
        DiscoveryTable::Object => {
            r#"CREATE TABLE IF NOT EXISTS objects (
                id TEXT PRIMARY KEY,
                kind TEXT NOT NULL,
                api_version TEXT NOT NULL,
                cluster_id TEXT NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )"#
        }
        DiscoveryTable::ResourceSpec => {
            r#"CREATE TABLE IF NOT EXISTS resource_specs (
                id TEXT PRIMARY KEY,
                attribute TEXT NOT NULL DEFAULT ''
            )"#
        }
        DiscoveryTable::ResourceStatus => {
            r#"CREATE TABLE IF NOT EXISTS resource_statuses (
                id TEXT PRIMARY KEY,
                attribute TEXT NOT NULL DEFAULT ''
            )"#
        }
        DiscoveryTable::ResourceObjectMeta => {
            r#"CREATE TABLE IF NOT EXISTS resource_object_meta (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL DEFAULT '',
                namespace TEXT NOT NULL DEFAULT '',
                uid TEXT NOT NULL DEFAULT '',
                resource_version TEXT NOT NULL DEFAULT '',
                generation BIGINT NOT NULL DEFAULT 0,
                creation_timestamp TEXT,
                cluster_name TEXT NOT NULL DEFAULT ''
            )"#
        }
    }
}

/// Persister on a Postgres connection pool
#[derive(Clone)]
pub struct PgPersister {
    pool: PgPool,
}

impl PgPersister {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, PersistError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Create any missing discovery tables
    pub async fn migrate(&self) -> Result<(), PersistError> {
        self.create_tables(&DiscoveryTable::ALL).await
    }
}

#[async_trait]
impl Persister for PgPersister {
    async fn drop_tables(&self, tables: &[DiscoveryTable]) -> Result<(), PersistError> {
        if tables.is_empty() {
            return Ok(());
        }
        let names: Vec<&str> = tables.iter().map(|t| t.table_name()).collect();
        let statement = format!("DROP TABLE IF EXISTS {} CASCADE", names.join(", "));
        debug!("{}", statement);
        sqlx::query(&statement).execute(&self.pool).await?;
        Ok(())
    }

    async fn create_tables(&self, tables: &[DiscoveryTable]) -> Result<(), PersistError> {
        let mut tx = self.pool.begin().await?;
        for table in tables {
            sqlx::query(create_statement(*table))
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn table_exists(&self, table: DiscoveryTable) -> Result<bool, PersistError> {
        let exists: bool = sqlx::query_scalar("SELECT to_regclass($1::text) IS NOT NULL")
            .bind(table.table_name())
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }

    async fn count(&self, table: DiscoveryTable) -> Result<u64, PersistError> {
        let statement = format!("SELECT COUNT(*) FROM {}", table.table_name());
        let count: i64 = sqlx::query_scalar(&statement)
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as u64)
    }

    async fn record_object(&self, event: EventType, object: &Object) -> Result<(), PersistError> {
        let mut tx = self.pool.begin().await?;

        for table in ["key_values", "resource_specs", "resource_statuses"] {
            let column = if table == "key_values" { "unique_id" } else { "id" };
            sqlx::query(&format!("DELETE FROM {} WHERE {} = $1", table, column))
                .bind(&object.id)
                .execute(&mut *tx)
                .await?;
        }

        if matches!(event, EventType::Delete) {
            sqlx::query("DELETE FROM resource_object_meta WHERE id = $1")
                .bind(&object.id)
                .execute(&mut *tx)
                .await?;
            sqlx::query("DELETE FROM objects WHERE id = $1")
                .bind(&object.id)
                .execute(&mut *tx)
                .await?;
            tx.commit().await?;
            return Ok(());
        }

        sqlx::query(
            r#"INSERT INTO objects (id, kind, api_version, cluster_id, updated_at)
               VALUES ($1, $2, $3, $4, now())
               ON CONFLICT (id) DO UPDATE SET
                 kind = EXCLUDED.kind,
                 api_version = EXCLUDED.api_version,
                 cluster_id = EXCLUDED.cluster_id,
                 updated_at = now()"#,
        )
        .bind(&object.id)
        .bind(&object.kind)
        .bind(&object.api_version)
        .bind(&object.cluster_id)
        .execute(&mut *tx)
        .await?;

        let meta = &object.object_meta;
        sqlx::query(
            r#"INSERT INTO resource_object_meta
                 (id, name, namespace, uid, resource_version, generation, creation_timestamp)
               VALUES ($1, $2, $3, $4, $5, $6, $7)
               ON CONFLICT (id) DO UPDATE SET
                 name = EXCLUDED.name,
                 namespace = EXCLUDED.namespace,
                 uid = EXCLUDED.uid,
                 resource_version = EXCLUDED.resource_version,
                 generation = EXCLUDED.generation,
                 creation_timestamp = EXCLUDED.creation_timestamp"#,
        )
        .bind(&object.id)
        .bind(&meta.name)
        .bind(&meta.namespace)
        .bind(&meta.uid)
        .bind(&meta.resource_version)
        .bind(meta.generation)
        .bind(&meta.creation_timestamp)
        .execute(&mut *tx)
        .await?;

        for (table, attribute) in [
            ("resource_specs", object.spec.as_ref()),
            ("resource_statuses", object.status.as_ref()),
        ] {
            if let Some(attribute) = attribute {
                sqlx::query(&format!(
                    "INSERT INTO {} (id, attribute) VALUES ($1, $2)",
                    table
                ))
                .bind(&object.id)
                .bind(&attribute.attribute)
                .execute(&mut *tx)
                .await?;
            }
        }

        for kv in object.key_values() {
            sqlx::query(
                r#"INSERT INTO key_values (unique_id, kind, key, value)
                   VALUES ($1, $2, $3, $4)
                   ON CONFLICT (unique_id, kind, key) DO UPDATE SET value = EXCLUDED.value"#,
            )
            .bind(&kv.unique_id)
            .bind(&kv.kind)
            .bind(&kv.key)
            .bind(&kv.value)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn update_cluster_name(
        &self,
        cluster_id: &str,
        cluster_name: &str,
    ) -> Result<u64, PersistError> {
        let result = sqlx::query(
            r#"UPDATE resource_object_meta SET cluster_name = $2
               WHERE id IN (SELECT id FROM objects WHERE cluster_id = $1)"#,
        )
        .bind(cluster_id)
        .bind(cluster_name)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}
