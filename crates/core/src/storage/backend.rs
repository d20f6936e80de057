//! Key-value partition abstraction
//!
//! Both partitions expose the same small async surface. Each call is atomic
//! for its own partition only; nothing spans partitions.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::Value;

use crate::errors::{PromptError, Result};

/// Entries of one partition, keyed by storage key
pub type Items = BTreeMap<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Partition {
    /// Small settings and pointers; may be quota-limited per item
    Synced,
    /// Prompt bodies
    Local,
}

impl Partition {
    pub fn as_str(self) -> &'static str {
        match self {
            Partition::Synced => "synced",
            Partition::Local => "local",
        }
    }
}

#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get_all(&self) -> Result<Items>;

    async fn get(&self, key: &str) -> Result<Option<Value>>;

    /// Write every item or none of them
    async fn set_many(&self, items: Vec<(String, Value)>) -> Result<()>;

    async fn remove(&self, keys: Vec<String>) -> Result<()>;

    async fn set(&self, key: String, value: Value) -> Result<()> {
        self.set_many(vec![(key, value)]).await
    }
}

/// Serialize items and enforce an optional per-item byte quota
///
/// Size is counted as key length plus serialized value length.
pub(crate) fn encode_items(
    partition: Partition,
    items: &[(String, Value)],
    quota: Option<usize>,
) -> Result<Vec<(String, String)>> {
    items
        .iter()
        .map(|(key, value)| {
            let encoded = serde_json::to_string(value)?;
            if let Some(limit) = quota {
                let size = key.len() + encoded.len();
                if size > limit {
                    return Err(PromptError::StorageError(format!(
                        "item '{}' is {} bytes, over the {} partition quota of {} bytes",
                        key,
                        size,
                        partition.as_str(),
                        limit
                    )));
                }
            }
            Ok((key.clone(), encoded))
        })
        .collect()
}
