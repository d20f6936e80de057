//! SQLite-backed partitions
//!
//! One database file holds both partitions in a single `kv` table. rusqlite is
//! blocking, so every call runs on the blocking pool.

use std::{
    path::Path,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection};
use serde_json::Value;

use super::{
    backend::{encode_items, Items, KvStore, Partition},
    schema,
};
use crate::errors::{PromptError, Result};

/// Shared connection to the promptdock database
#[derive(Clone)]
pub struct SqliteDb {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteDb {
    /// Open (creating if missing) the database file and run the schema
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        // journal_mode reports the resulting mode as a row
        conn.query_row("PRAGMA journal_mode = WAL", [], |_| Ok(()))?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(schema::SCHEMA)?;
        tracing::debug!("sqlite schema ready");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// A view of one partition, optionally limited per item
    pub fn partition(&self, partition: Partition, quota: Option<usize>) -> SqliteStore {
        SqliteStore {
            conn: Arc::clone(&self.conn),
            partition,
            quota,
        }
    }
}

#[derive(Clone)]
pub struct SqliteStore {
    conn:      Arc<Mutex<Connection>>,
    partition: Partition,
    quota:     Option<usize>,
}

impl SqliteStore {
    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection, &'static str) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        let partition = self.partition.as_str();

        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|_| PromptError::StorageError("sqlite connection lock poisoned".into()))?;
            f(&mut guard, partition)
        })
        .await
        .map_err(|e| PromptError::StorageError(format!("storage task failed: {}", e)))?
    }
}

#[async_trait]
impl KvStore for SqliteStore {
    async fn get_all(&self) -> Result<Items> {
        self.with_conn(|conn, partition| {
            let mut stmt = conn.prepare("SELECT key, value FROM kv WHERE partition = ?1")?;
            let rows = stmt.query_map(params![partition], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?;

            let mut items = Items::new();
            for row in rows {
                let (key, raw) = row?;
                items.insert(key, serde_json::from_str(&raw)?);
            }
            Ok(items)
        })
        .await
    }

    async fn get(&self, key: &str) -> Result<Option<Value>> {
        let key = key.to_string();
        self.with_conn(move |conn, partition| {
            let mut stmt = conn.prepare("SELECT value FROM kv WHERE partition = ?1 AND key = ?2")?;
            let mut rows = stmt.query(params![partition, key])?;

            let raw: Option<String> = match rows.next()? {
                Some(row) => Some(row.get(0)?),
                None => None,
            };
            raw.map(|raw| serde_json::from_str(&raw))
                .transpose()
                .map_err(PromptError::from)
        })
        .await
    }

    async fn set_many(&self, items: Vec<(String, Value)>) -> Result<()> {
        let encoded = encode_items(self.partition, &items, self.quota)?;
        let now = Utc::now().timestamp_millis();

        self.with_conn(move |conn, partition| {
            let tx = conn.transaction()?;
            for (key, value) in &encoded {
                tx.execute(
                    "INSERT INTO kv (partition, key, value, updated_at) VALUES (?1, ?2, ?3, ?4)
                     ON CONFLICT(partition, key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                    params![partition, key, value, now],
                )?;
            }
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn remove(&self, keys: Vec<String>) -> Result<()> {
        self.with_conn(move |conn, partition| {
            let tx = conn.transaction()?;
            for key in &keys {
                tx.execute(
                    "DELETE FROM kv WHERE partition = ?1 AND key = ?2",
                    params![partition, key],
                )?;
            }
            tx.commit()?;
            Ok(())
        })
        .await
    }
}
