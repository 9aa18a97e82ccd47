//! In-memory store implementations.
//!
//! Used where no durable area exists and as fakes in tests. Both can be
//! switched into a failing mode to simulate an unreachable backend.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use super::{paths, DocumentStore, KeyValueStore};
use crate::errors::AppError;

#[derive(Default)]
pub struct MemoryKvStore {
    entries: RwLock<BTreeMap<String, String>>,
    failing: AtomicBool,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), AppError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(AppError::Storage("key-value store unavailable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for MemoryKvStore {
    async fn get(&self, key: &str) -> Result<Option<String>, AppError> {
        self.check()?;
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), AppError> {
        self.check()?;
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), AppError> {
        self.check()?;
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, AppError> {
        self.check()?;
        Ok(self
            .entries
            .read()
            .await
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct MemoryDocumentStore {
    docs: RwLock<BTreeMap<String, Value>>,
    offline: AtomicBool,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Snapshot of every stored path, for assertions.
    pub async fn paths(&self) -> Vec<String> {
        self.docs.read().await.keys().cloned().collect()
    }

    fn check(&self) -> Result<(), AppError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(AppError::Network("remote store unreachable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn get(&self, path: &str) -> Result<Option<Value>, AppError> {
        self.check()?;
        Ok(self.docs.read().await.get(path).cloned())
    }

    async fn set(&self, path: &str, doc: &Value) -> Result<(), AppError> {
        self.check()?;
        self.docs.write().await.insert(path.to_string(), doc.clone());
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<(), AppError> {
        self.check()?;
        self.docs.write().await.remove(path);
        Ok(())
    }

    async fn list(&self, collection_path: &str) -> Result<Vec<(String, Value)>, AppError> {
        self.check()?;
        Ok(self
            .docs
            .read()
            .await
            .iter()
            .filter_map(|(path, doc)| {
                let (parent, id) = paths::split(path);
                (parent == collection_path).then(|| (id.to_string(), doc.clone()))
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_list_only_returns_direct_children() {
        let store = MemoryDocumentStore::new();
        store.set("users/u1/collections/a", &json!({ "id": "a" })).await.unwrap();
        store.set("users/u1/collections/b", &json!({ "id": "b" })).await.unwrap();
        store.set("users/u1/binderOrder", &json!({ "order": [] })).await.unwrap();
        store.set("users/u2/collections/c", &json!({ "id": "c" })).await.unwrap();

        let ids: Vec<String> = store
            .list("users/u1/collections")
            .await
            .unwrap()
            .into_iter()
            .map(|(id, _)| id)
            .collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_failing_kv_store_errors() {
        let store = MemoryKvStore::new();
        store.set("k", "v").await.unwrap();
        store.set_failing(true);
        assert!(store.get("k").await.is_err());
        store.set_failing(false);
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v"));
    }
}
