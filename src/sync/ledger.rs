//! Device-local collection state that is never synced.
//!
//! Hidden slots and view preferences live only in the device key-value
//! store. Every failure here is logged and swallowed; a preference that
//! failed to persist must not break the collection view.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::models::Collection;
use crate::store::{key_segment, KeyValueStore};

pub const LOCAL_REMOVED_PREFIX: &str = "localRemovedSlots:";
pub const VIEW_MODE_PREFIX: &str = "viewMode:";

/// Slots the user hid on this device, per collection.
pub struct LocalRemovedLedger {
    kv: Arc<dyn KeyValueStore>,
    // Serializes read-modify-write cycles within this process
    write_lock: Mutex<()>,
}

impl LocalRemovedLedger {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self {
            kv,
            write_lock: Mutex::new(()),
        }
    }

    fn key(collection_id: &str) -> String {
        format!("{}{}", LOCAL_REMOVED_PREFIX, key_segment(collection_id))
    }

    pub async fn removed_slots(&self, collection_id: &str) -> BTreeSet<String> {
        match self.kv.get(&Self::key(collection_id)).await {
            Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_default(),
            Ok(None) => BTreeSet::new(),
            Err(e) => {
                tracing::warn!("Failed to read hidden slots for {}: {}", collection_id, e);
                BTreeSet::new()
            }
        }
    }

    pub async fn mark_removed(&self, collection_id: &str, slot: &str) {
        let _guard = self.write_lock.lock().await;
        let mut slots = self.removed_slots(collection_id).await;
        if slots.insert(slot.to_string()) {
            self.write(collection_id, &slots).await;
        }
    }

    pub async fn restore(&self, collection_id: &str, slot: &str) {
        let _guard = self.write_lock.lock().await;
        let mut slots = self.removed_slots(collection_id).await;
        if slots.remove(slot) {
            self.write(collection_id, &slots).await;
        }
    }

    pub async fn clear(&self, collection_id: &str) {
        let _guard = self.write_lock.lock().await;
        if let Err(e) = self.kv.remove(&Self::key(collection_id)).await {
            tracing::warn!("Failed to clear hidden slots for {}: {}", collection_id, e);
        }
    }

    /// The collection's slots minus those hidden on this device, in order.
    pub async fn visible_slots(&self, collection: &Collection) -> Vec<String> {
        let hidden = self.removed_slots(&collection.id).await;
        collection
            .slots
            .iter()
            .filter(|slot| !hidden.contains(*slot))
            .cloned()
            .collect()
    }

    async fn write(&self, collection_id: &str, slots: &BTreeSet<String>) {
        let key = Self::key(collection_id);
        let result = if slots.is_empty() {
            self.kv.remove(&key).await
        } else {
            match serde_json::to_string(slots) {
                Ok(raw) => self.kv.set(&key, &raw).await,
                Err(e) => Err(e.into()),
            }
        };
        if let Err(e) = result {
            tracing::warn!("Failed to persist hidden slots for {}: {}", collection_id, e);
        }
    }
}

/// Collection layout preference.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    #[default]
    Grid,
    List,
}

impl ViewMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViewMode::Grid => "grid",
            ViewMode::List => "list",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "grid" => Some(ViewMode::Grid),
            "list" => Some(ViewMode::List),
            _ => None,
        }
    }
}

/// Per-collection display preferences.
pub struct Preferences {
    kv: Arc<dyn KeyValueStore>,
}

impl Preferences {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    fn key(collection_id: &str) -> String {
        format!("{}{}", VIEW_MODE_PREFIX, key_segment(collection_id))
    }

    pub async fn view_mode(&self, collection_id: &str) -> ViewMode {
        match self.kv.get(&Self::key(collection_id)).await {
            Ok(Some(raw)) => ViewMode::parse(&raw).unwrap_or_default(),
            Ok(None) => ViewMode::default(),
            Err(e) => {
                tracing::warn!("Failed to read view mode for {}: {}", collection_id, e);
                ViewMode::default()
            }
        }
    }

    pub async fn set_view_mode(&self, collection_id: &str, mode: ViewMode) {
        if let Err(e) = self.kv.set(&Self::key(collection_id), mode.as_str()).await {
            tracing::warn!("Failed to persist view mode for {}: {}", collection_id, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CollectionType;
    use crate::store::{paths, DocumentStore, MemoryDocumentStore, MemoryKvStore};
    use crate::sync::{CollectionSynchronizer, Session};

    #[tokio::test]
    async fn test_mark_and_restore_slots() {
        let ledger = LocalRemovedLedger::new(Arc::new(MemoryKvStore::new()));
        ledger.mark_removed("c1", "sv03.5-004").await;
        ledger.mark_removed("c1", "sv03.5-004").await;
        ledger.mark_removed("c1", "sv03.5-007").await;
        ledger.mark_removed("c2", "sv03.5-001").await;

        assert_eq!(ledger.removed_slots("c1").await.len(), 2);

        ledger.restore("c1", "sv03.5-004").await;
        let remaining: Vec<String> = ledger.removed_slots("c1").await.into_iter().collect();
        assert_eq!(remaining, vec!["sv03.5-007"]);

        ledger.clear("c1").await;
        assert!(ledger.removed_slots("c1").await.is_empty());
        assert_eq!(ledger.removed_slots("c2").await.len(), 1);
    }

    #[tokio::test]
    async fn test_visible_slots_filters_hidden_in_order() {
        let ledger = LocalRemovedLedger::new(Arc::new(MemoryKvStore::new()));
        let mut collection = Collection::new(CollectionType::BySet, "151").with_id("c1");
        collection.add_slot("a");
        collection.add_slot("b");
        collection.add_slot("c");

        ledger.mark_removed("c1", "b").await;
        assert_eq!(ledger.visible_slots(&collection).await, vec!["a", "c"]);
        assert_eq!(collection.slots.len(), 3);
    }

    #[tokio::test]
    async fn test_marking_removed_never_touches_remote_document() {
        let kv = Arc::new(MemoryKvStore::new());
        let remote = Arc::new(MemoryDocumentStore::new());
        let remote_dyn: Arc<dyn DocumentStore> = remote.clone();
        let sync = CollectionSynchronizer::new(Some(remote_dyn), kv.clone());
        let ledger = LocalRemovedLedger::new(kv);
        let session = Session::signed_in("u1");

        let mut collection = Collection::new(CollectionType::MasterSet, "151").with_id("x");
        collection.add_slot("k");
        sync.push(&session, &[collection]).await.unwrap();

        let path = paths::collection("u1", "x");
        let before = remote.get(&path).await.unwrap();
        ledger.mark_removed("x", "k").await;
        let after = remote.get(&path).await.unwrap();

        assert_eq!(before, after);
        assert_eq!(remote.paths().await, vec![path]);
    }

    #[tokio::test]
    async fn test_failures_are_swallowed() {
        let kv = Arc::new(MemoryKvStore::new());
        kv.set_failing(true);
        let ledger = LocalRemovedLedger::new(kv.clone());
        let prefs = Preferences::new(kv);

        ledger.mark_removed("c1", "a").await;
        assert!(ledger.removed_slots("c1").await.is_empty());
        prefs.set_view_mode("c1", ViewMode::List).await;
        assert_eq!(prefs.view_mode("c1").await, ViewMode::Grid);
    }

    #[tokio::test]
    async fn test_view_mode_roundtrip() {
        let prefs = Preferences::new(Arc::new(MemoryKvStore::new()));
        assert_eq!(prefs.view_mode("c1").await, ViewMode::Grid);
        prefs.set_view_mode("c1", ViewMode::List).await;
        assert_eq!(prefs.view_mode("c1").await, ViewMode::List);
    }
}
