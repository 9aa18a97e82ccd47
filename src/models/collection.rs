//! Collection and binder order models matching the app's stored documents.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// How a collection decides which cards belong in it.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum CollectionType {
    /// Collect everything
    #[default]
    All,
    /// Every card and variant of one set
    MasterSet,
    /// A single tracked card
    Single,
    /// Grouped by an external set identifier
    BySet,
}

/// Switches for master-set style collections.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CollectionOptions {
    #[serde(default)]
    pub include_reverse_holos: bool,
    #[serde(default)]
    pub include_bonus_variants: bool,
    #[serde(default)]
    pub include_secret_rares: bool,
}

/// A user-owned collection of card slots.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Collection {
    pub id: String,
    #[serde(rename = "type", default, deserialize_with = "lenient_collection_type")]
    collection_type: CollectionType,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub set_id: Option<String>,
    pub slots: Vec<String>,
    #[serde(default)]
    pub options: CollectionOptions,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl Collection {
    /// Create a new collection with a fresh identifier.
    pub fn new(collection_type: CollectionType, name: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            collection_type,
            name: name.into(),
            subtitle: None,
            set_id: None,
            slots: Vec::new(),
            options: CollectionOptions::default(),
            created_at: Utc::now(),
        }
    }

    /// Builder-style override of the generated identifier.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_set(mut self, set_id: impl Into<String>) -> Self {
        self.set_id = Some(set_id.into());
        self
    }

    /// The collection type. Fixed once the collection exists.
    pub fn collection_type(&self) -> CollectionType {
        self.collection_type
    }

    /// Append a slot, keeping slots unique and in insertion order.
    /// Returns false if the slot was already present.
    pub fn add_slot(&mut self, slot: impl Into<String>) -> bool {
        let slot = slot.into();
        if self.slots.contains(&slot) {
            return false;
        }
        self.slots.push(slot);
        true
    }

    pub fn remove_slot(&mut self, slot: &str) -> bool {
        let before = self.slots.len();
        self.slots.retain(|s| s != slot);
        self.slots.len() != before
    }

    /// Parse a stored document, returning `None` when it lacks the minimum
    /// fields (`id`, `name`, `slots`) or does not deserialize.
    pub fn from_document(doc: &Value) -> Option<Self> {
        let obj = doc.as_object()?;
        let has_id = obj.get("id").and_then(Value::as_str).is_some_and(|s| !s.is_empty());
        let has_name = obj.get("name").is_some_and(Value::is_string);
        let has_slots = obj.get("slots").is_some_and(Value::is_array);
        if !(has_id && has_name && has_slots) {
            return None;
        }
        serde_json::from_value(doc.clone()).ok()
    }
}

/// Missing, unknown or mistyped `type` values fall back to `All` so a
/// document is only rejected for lacking `id`, `name` or `slots`.
fn lenient_collection_type<'de, D>(deserializer: D) -> Result<CollectionType, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(raw
        .and_then(|v| serde_json::from_value(v).ok())
        .unwrap_or_default())
}

/// The user's preferred ordering of collections in the binder view.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BinderOrder {
    #[serde(default)]
    pub order: Vec<String>,
}

impl BinderOrder {
    pub fn new(order: Vec<String>) -> Self {
        Self { order }
    }

    /// Order collections: listed ids first (first occurrence wins, unknown
    /// ids skipped), then the rest by creation time.
    pub fn apply(&self, collections: Vec<Collection>) -> Vec<Collection> {
        let mut remaining = collections;
        let mut ordered = Vec::with_capacity(remaining.len());

        for id in &self.order {
            if let Some(pos) = remaining.iter().position(|c| &c.id == id) {
                ordered.push(remaining.remove(pos));
            }
        }

        remaining.sort_by_key(|c| c.created_at);
        ordered.extend(remaining);
        ordered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn collection_at(id: &str, secs: i64) -> Collection {
        let mut c = Collection::new(CollectionType::All, id).with_id(id);
        c.created_at = Utc.timestamp_opt(secs, 0).unwrap();
        c
    }

    #[test]
    fn test_from_document_requires_minimum_fields() {
        let valid = json!({ "id": "a", "type": "masterSet", "name": "151", "slots": ["sv03.5-001"] });
        let no_slots = json!({ "id": "b", "type": "all", "name": "Everything" });
        let no_id = json!({ "type": "all", "name": "Everything", "slots": [] });

        let parsed = Collection::from_document(&valid).unwrap();
        assert_eq!(parsed.collection_type(), CollectionType::MasterSet);
        assert_eq!(parsed.slots, vec!["sv03.5-001"]);
        assert!(Collection::from_document(&no_slots).is_none());
        assert!(Collection::from_document(&no_id).is_none());
    }

    #[test]
    fn test_slots_stay_unique() {
        let mut c = Collection::new(CollectionType::Single, "Charizard");
        assert!(c.add_slot("sv03.5-006"));
        assert!(!c.add_slot("sv03.5-006"));
        assert_eq!(c.slots.len(), 1);
        assert!(c.remove_slot("sv03.5-006"));
        assert!(!c.remove_slot("sv03.5-006"));
    }

    #[test]
    fn test_binder_order_apply_tolerates_stale_ids() {
        let collections = vec![collection_at("a", 3), collection_at("b", 1), collection_at("c", 2)];
        let order = BinderOrder::new(vec!["c".into(), "gone".into(), "c".into()]);

        let ids: Vec<String> = order.apply(collections).into_iter().map(|c| c.id).collect();
        assert_eq!(ids, vec!["c", "b", "a"]);
    }

    #[test]
    fn test_from_document_tolerates_missing_or_unknown_type() {
        let untyped = json!({ "id": "a", "name": "Binder", "slots": ["x"] });
        let parsed = Collection::from_document(&untyped).unwrap();
        assert_eq!(parsed.collection_type(), CollectionType::All);
        assert_eq!(parsed.slots, vec!["x"]);

        let unknown = json!({ "id": "b", "name": "Binder", "type": "wishlist", "slots": [] });
        assert_eq!(
            Collection::from_document(&unknown).unwrap().collection_type(),
            CollectionType::All
        );

        let known = json!({ "id": "c", "name": "151", "type": "bySet", "slots": [] });
        assert_eq!(
            Collection::from_document(&known).unwrap().collection_type(),
            CollectionType::BySet
        );
    }
}
