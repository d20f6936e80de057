//! Persistence layer
//!
//! Application state lives in two key-value partitions: a small synced one for
//! settings and the last-used pointer, and a local one holding one entry per
//! prompt. [`Store`] assembles the unified [`AppState`] on every read and
//! broadcasts an update after every mutation.

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tokio::sync::Mutex as AsyncMutex;

use crate::{
    broadcast::{Hub, UpdateEvent},
    config::Config,
    errors::Result,
    messages::RuntimeMessage,
};

pub mod backend;
pub mod memory;
pub mod model;
pub mod prompts;
pub mod schema;
pub mod snapshot;
pub mod sqlite;

pub use backend::{Items, KvStore, Partition};
pub use memory::MemoryStore;
pub use model::{AppState, InsertMode, Prompt, PromptDraft, Settings, SettingsPatch, Theme};
pub use prompts::UpsertKind;
pub use sqlite::{SqliteDb, SqliteStore};

/// Handle to both partitions plus the hub mutations are announced on
///
/// Cheap to clone; clones share the backends, the hub and the init guard.
#[derive(Clone)]
pub struct Store {
    synced:    Arc<dyn KvStore>,
    local:     Arc<dyn KvStore>,
    hub:       Hub,
    init_lock: Arc<AsyncMutex<()>>,
}

impl Store {
    pub fn new(synced: Arc<dyn KvStore>, local: Arc<dyn KvStore>, hub: Hub) -> Self {
        Self {
            synced,
            local,
            hub,
            init_lock: Arc::new(AsyncMutex::new(())),
        }
    }

    /// Both partitions in memory, no quota
    pub fn in_memory(hub: Hub) -> Self {
        Self::new(
            Arc::new(MemoryStore::new(Partition::Synced)),
            Arc::new(MemoryStore::new(Partition::Local)),
            hub,
        )
    }

    /// Open the SQLite file named by the config
    ///
    /// The synced partition gets the configured per-item quota.
    pub fn open(config: &Config, hub: Hub) -> Result<Self> {
        let path = config.database_path();
        let db = SqliteDb::open(&path)?;
        tracing::info!(path = %path.display(), "opened prompt store");

        Ok(Self::new(
            Arc::new(db.partition(Partition::Synced, Some(config.sync_item_quota))),
            Arc::new(db.partition(Partition::Local, None)),
            hub,
        ))
    }

    pub fn hub(&self) -> &Hub {
        &self.hub
    }

    /// Announce a mutation to every live surface
    ///
    /// Best-effort: serialization or delivery problems are logged and dropped.
    fn notify(&self, event: UpdateEvent) {
        match RuntimeMessage::PromptsUpdated(event).to_json() {
            Ok(json) => {
                let delivered = self.hub.broadcast(&json);
                tracing::trace!(delivered, "broadcast update");
            },
            Err(err) => tracing::warn!("failed to encode update broadcast: {}", err),
        }
    }
}

pub(crate) fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

pub(crate) fn as_object(value: Option<Value>) -> serde_json::Map<String, Value> {
    match value {
        Some(Value::Object(map)) => map,
        _ => serde_json::Map::new(),
    }
}
