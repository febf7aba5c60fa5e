//! Storage backends for entity data and cached result trees.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use tokio::sync::Mutex;

use crate::entity::EntityData;
use crate::error::Result;
use crate::result_tree::ResultTree;

/// Backing store for the cache. Both implementations present the same
/// semantics; the sqlite one additionally survives process restarts.
#[async_trait]
pub trait CacheProvider: Send + Sync {
    async fn get_entity(&self, global_id: &str) -> Result<Option<EntityData>>;

    async fn put_entity(&self, entity: EntityData) -> Result<()>;

    /// Mints a fresh global id for an entity the server did not name.
    async fn create_global_id(&self) -> Result<String>;

    async fn get_result_tree(&self, query_id: &str) -> Result<Option<ResultTree>>;

    async fn set_result_tree(&self, query_id: &str, tree: ResultTree) -> Result<()>;

    async fn contains_result_tree(&self, query_id: &str) -> Result<bool>;

    async fn close(&self) -> Result<()>;
}

/// In-process provider; the default when persistence is not needed.
#[derive(Default)]
pub struct MemoryCacheProvider {
    entities: Mutex<HashMap<String, EntityData>>,
    result_trees: Mutex<HashMap<String, ResultTree>>,
    next_id: AtomicU64,
}

impl MemoryCacheProvider {
    pub fn new() -> MemoryCacheProvider {
        MemoryCacheProvider::default()
    }
}

#[async_trait]
impl CacheProvider for MemoryCacheProvider {
    async fn get_entity(&self, global_id: &str) -> Result<Option<EntityData>> {
        Ok(self.entities.lock().await.get(global_id).cloned())
    }

    async fn put_entity(&self, entity: EntityData) -> Result<()> {
        self.entities
            .lock()
            .await
            .insert(entity.global_id.clone(), entity);
        Ok(())
    }

    async fn create_global_id(&self) -> Result<String> {
        let n = self.next_id.fetch_add(1, Ordering::Relaxed);
        Ok(format!("local-{n}"))
    }

    async fn get_result_tree(&self, query_id: &str) -> Result<Option<ResultTree>> {
        Ok(self.result_trees.lock().await.get(query_id).cloned())
    }

    async fn set_result_tree(&self, query_id: &str, tree: ResultTree) -> Result<()> {
        self.result_trees
            .lock()
            .await
            .insert(query_id.to_string(), tree);
        Ok(())
    }

    async fn contains_result_tree(&self, query_id: &str) -> Result<bool> {
        Ok(self.result_trees.lock().await.contains_key(query_id))
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// Sqlite-backed provider. Rows hold the records as JSON so the two
/// providers stay interchangeable.
pub struct SqliteCacheProvider {
    conn: Mutex<Connection>,
    next_id: AtomicU64,
}

impl SqliteCacheProvider {
    pub fn new(path: impl AsRef<Path>) -> Result<SqliteCacheProvider> {
        Self::from_connection(Connection::open(path)?)
    }

    pub fn in_memory() -> Result<SqliteCacheProvider> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<SqliteCacheProvider> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS entities (
                global_id TEXT PRIMARY KEY,
                data TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS result_trees (
                query_id TEXT PRIMARY KEY,
                data TEXT NOT NULL
            );",
        )?;
        Ok(SqliteCacheProvider {
            conn: Mutex::new(conn),
            next_id: AtomicU64::new(0),
        })
    }
}

#[async_trait]
impl CacheProvider for SqliteCacheProvider {
    async fn get_entity(&self, global_id: &str) -> Result<Option<EntityData>> {
        let conn = self.conn.lock().await;
        let row: Option<String> = conn
            .query_row(
                "SELECT data FROM entities WHERE global_id = ?1",
                params![global_id],
                |row| row.get(0),
            )
            .optional()?;
        match row {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn put_entity(&self, entity: EntityData) -> Result<()> {
        let json = serde_json::to_string(&entity)?;
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO entities (global_id, data) VALUES (?1, ?2)
             ON CONFLICT(global_id) DO UPDATE SET data = excluded.data",
            params![entity.global_id, json],
        )?;
        Ok(())
    }

    async fn create_global_id(&self) -> Result<String> {
        let n = self.next_id.fetch_add(1, Ordering::Relaxed);
        Ok(format!("local-{n}"))
    }

    async fn get_result_tree(&self, query_id: &str) -> Result<Option<ResultTree>> {
        let conn = self.conn.lock().await;
        let row: Option<String> = conn
            .query_row(
                "SELECT data FROM result_trees WHERE query_id = ?1",
                params![query_id],
                |row| row.get(0),
            )
            .optional()?;
        match row {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn set_result_tree(&self, query_id: &str, tree: ResultTree) -> Result<()> {
        let json = serde_json::to_string(&tree)?;
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO result_trees (query_id, data) VALUES (?1, ?2)
             ON CONFLICT(query_id) DO UPDATE SET data = excluded.data",
            params![query_id, json],
        )?;
        Ok(())
    }

    async fn contains_result_tree(&self, query_id: &str) -> Result<bool> {
        let conn = self.conn.lock().await;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM result_trees WHERE query_id = ?1",
            params![query_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}
