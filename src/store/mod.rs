//! Storage seams consumed by the sync core.
//!
//! The device key-value store and the remote collection store are external
//! collaborators; the core only talks to them through these traits.

mod memory;

pub use memory::*;

use async_trait::async_trait;
use serde_json::Value;

use crate::errors::AppError;

/// Durable string-keyed store on the device.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, AppError>;

    async fn set(&self, key: &str, value: &str) -> Result<(), AppError>;

    /// Removing a missing key is not an error.
    async fn remove(&self, key: &str) -> Result<(), AppError>;

    /// All keys starting with `prefix`, sorted.
    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, AppError>;
}

/// Multi-tenant document store addressed by slash separated paths.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, path: &str) -> Result<Option<Value>, AppError>;

    /// Full-document overwrite.
    async fn set(&self, path: &str, doc: &Value) -> Result<(), AppError>;

    /// Deleting a missing document is not an error.
    async fn delete(&self, path: &str) -> Result<(), AppError>;

    /// Direct child documents of `collection_path` as `(doc_id, body)`.
    async fn list(&self, collection_path: &str) -> Result<Vec<(String, Value)>, AppError>;
}

/// Replace anything but ASCII alphanumerics, `-` and `_` so ids can be
/// embedded in store keys.
pub fn key_segment(raw: &str) -> String {
    raw.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Document paths in the remote collection store.
pub mod paths {
    pub fn collections(uid: &str) -> String {
        format!("users/{}/collections", uid)
    }

    pub fn collection(uid: &str, collection_id: &str) -> String {
        format!("users/{}/collections/{}", uid, collection_id)
    }

    pub fn binder_order(uid: &str) -> String {
        format!("users/{}/binderOrder", uid)
    }

    /// Whether `segment` can be embedded as a single path segment. Anything
    /// containing `/` would land in a nested collection that listing never sees.
    pub fn is_valid_segment(segment: &str) -> bool {
        !segment.is_empty() && !segment.contains('/')
    }

    /// Split a document path into `(parent collection path, doc id)`.
    pub fn split(path: &str) -> (&str, &str) {
        path.rsplit_once('/').unwrap_or(("", path))
    }
}

#[cfg(test)]
mod tests {
    use super::{key_segment, paths};

    #[test]
    fn test_key_segment() {
        assert_eq!(key_segment("sv03.5"), "sv03_5");
        assert_eq!(key_segment("a/b:c"), "a_b_c");
        assert_eq!(key_segment("uid-123_x"), "uid-123_x");
    }

    #[test]
    fn test_paths() {
        assert_eq!(paths::collection("u1", "c1"), "users/u1/collections/c1");
        assert_eq!(paths::binder_order("u1"), "users/u1/binderOrder");
        assert_eq!(paths::split("users/u1/collections/c1"), ("users/u1/collections", "c1"));
        assert_eq!(paths::split("root"), ("", "root"));
        assert!(paths::is_valid_segment("c1"));
        assert!(!paths::is_valid_segment("a/b"));
        assert!(!paths::is_valid_segment(""));
    }
}
