//! In-process partition, used for tests and ephemeral sessions

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use serde_json::Value;

use super::backend::{encode_items, Items, KvStore, Partition};
use crate::errors::{PromptError, Result};

#[derive(Clone)]
pub struct MemoryStore {
    partition: Partition,
    inner:     Arc<Mutex<MemoryInner>>,
}

#[derive(Default)]
struct MemoryInner {
    items:       Items,
    quota:       Option<usize>,
    fail_writes: bool,
}

impl MemoryStore {
    pub fn new(partition: Partition) -> Self {
        Self {
            partition,
            inner: Arc::new(Mutex::new(MemoryInner::default())),
        }
    }

    pub fn with_quota(self, quota: usize) -> Self {
        if let Ok(mut inner) = self.inner.lock() {
            inner.quota = Some(quota);
        }
        self
    }

    /// Make every subsequent write fail, simulating a platform storage error
    pub fn set_failing(&self, failing: bool) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.fail_writes = failing;
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryInner>> {
        self.inner
            .lock()
            .map_err(|_| PromptError::StorageError("memory store lock poisoned".into()))
    }

    fn check_writable(&self, inner: &MemoryInner) -> Result<()> {
        if inner.fail_writes {
            return Err(PromptError::StorageError(format!(
                "{} partition rejected the write",
                self.partition.as_str()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get_all(&self) -> Result<Items> {
        Ok(self.lock()?.items.clone())
    }

    async fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.lock()?.items.get(key).cloned())
    }

    async fn set_many(&self, items: Vec<(String, Value)>) -> Result<()> {
        let mut inner = self.lock()?;
        self.check_writable(&inner)?;
        encode_items(self.partition, &items, inner.quota)?;

        for (key, value) in items {
            inner.items.insert(key, value);
        }
        Ok(())
    }

    async fn remove(&self, keys: Vec<String>) -> Result<()> {
        let mut inner = self.lock()?;
        self.check_writable(&inner)?;

        for key in keys {
            inner.items.remove(&key);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn test_set_get_remove() {
        let store = MemoryStore::new(Partition::Local);
        store.set("a".into(), json!(1)).await.unwrap();
        store
            .set_many(vec![("b".into(), json!(2)), ("c".into(), json!(3))])
            .await
            .unwrap();

        assert_eq!(store.get("a").await.unwrap(), Some(json!(1)));
        assert_eq!(store.get_all().await.unwrap().len(), 3);

        store.remove(vec!["a".into(), "missing".into()]).await.unwrap();
        assert_eq!(store.get("a").await.unwrap(), None);
        assert_eq!(store.get_all().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_quota_rejects_whole_batch() {
        let store = MemoryStore::new(Partition::Synced).with_quota(12);
        let result = store
            .set_many(vec![
                ("ok".into(), json!(1)),
                ("big".into(), json!("far too large for the quota")),
            ])
            .await;

        assert!(matches!(result, Err(PromptError::StorageError(_))));
        assert!(store.get_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failing_writes() {
        let store = MemoryStore::new(Partition::Local);
        store.set("a".into(), json!(1)).await.unwrap();
        store.set_failing(true);

        assert!(store.set("b".into(), json!(2)).await.is_err());
        assert!(store.remove(vec!["a".into()]).await.is_err());
        assert_eq!(store.get("a").await.unwrap(), Some(json!(1)));
    }
}
