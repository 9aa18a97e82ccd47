//! Local image override store.
//!
//! Overrides are plain files under the app's private documents area, one
//! directory per namespace. A file existing at the deterministic path is the
//! only record of an override; there is no manifest.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::AppError;

/// Directory under the documents root holding both namespaces.
pub const OVERRIDES_ROOT: &str = "card-overrides";

/// Longest sanitized card id used in a filename.
pub const MAX_FILENAME_STEM: usize = 120;

const EXTENSION: &str = "jpg";

/// Override namespace, in precedence order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Namespace {
    /// Curated bundle shared by every install
    Admin,
    /// This device only
    User,
}

impl Namespace {
    /// Resolution order: admin always beats user.
    pub const PRECEDENCE: [Namespace; 2] = [Namespace::Admin, Namespace::User];

    pub fn as_str(&self) -> &'static str {
        match self {
            Namespace::Admin => "admin",
            Namespace::User => "user",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "admin" => Some(Namespace::Admin),
            "user" => Some(Namespace::User),
            _ => None,
        }
    }
}

/// Replace path-unsafe characters and bound the length.
pub fn sanitize_card_id(card_id: &str) -> String {
    card_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .take(MAX_FILENAME_STEM)
        .collect()
}

/// Per-device override files. Without a documents root every operation is a
/// no-op and resolution is always `None`.
#[derive(Debug, Clone)]
pub struct LocalImageOverrideStore {
    root: Option<PathBuf>,
}

impl LocalImageOverrideStore {
    /// `documents_dir` is the app's private file area, if the platform has one.
    pub fn new(documents_dir: Option<&Path>) -> Self {
        Self {
            root: documents_dir.map(|dir| dir.join(OVERRIDES_ROOT)),
        }
    }

    pub fn is_available(&self) -> bool {
        self.root.is_some()
    }

    fn namespace_dir(&self, namespace: Namespace) -> Option<PathBuf> {
        self.root.as_ref().map(|root| root.join(namespace.as_str()))
    }

    fn override_path(&self, card_id: &str, namespace: Namespace) -> Option<PathBuf> {
        let stem = sanitize_card_id(card_id);
        self.namespace_dir(namespace)
            .map(|dir| dir.join(format!("{}.{}", stem, EXTENSION)))
    }

    /// Admin override, else user override, else `None`.
    pub async fn resolve_best(&self, card_id: &str) -> Option<PathBuf> {
        for namespace in Namespace::PRECEDENCE {
            if let Some(path) = self.existing(card_id, namespace).await {
                return Some(path);
            }
        }
        None
    }

    /// Path of the override in one namespace, if the file exists.
    pub async fn existing(&self, card_id: &str, namespace: Namespace) -> Option<PathBuf> {
        let path = self.override_path(card_id, namespace)?;
        match tokio::fs::try_exists(&path).await {
            Ok(true) => Some(path),
            Ok(false) => None,
            Err(e) => {
                tracing::warn!("Could not check override {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Copy `source` into the namespace, creating directories as needed.
    /// Returns the stored path, or `None` when overrides are unavailable.
    pub async fn set_override(
        &self,
        card_id: &str,
        source: &Path,
        namespace: Namespace,
    ) -> Result<Option<PathBuf>, AppError> {
        let (Some(dir), Some(target)) = (
            self.namespace_dir(namespace),
            self.override_path(card_id, namespace),
        ) else {
            return Ok(None);
        };

        tokio::fs::create_dir_all(&dir).await?;
        tokio::fs::copy(source, &target).await.map_err(|e| {
            AppError::Storage(format!(
                "Failed to copy override from {}: {}",
                source.display(),
                e
            ))
        })?;

        tracing::info!("Stored {} override for {}", namespace.as_str(), card_id);
        Ok(Some(target))
    }

    /// Idempotent; failures are logged and swallowed.
    pub async fn remove_override(&self, card_id: &str, namespace: Namespace) {
        let Some(path) = self.override_path(card_id, namespace) else {
            return;
        };
        match tokio::fs::remove_file(&path).await {
            Ok(()) => tracing::info!("Removed {} override for {}", namespace.as_str(), card_id),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!("Failed to remove override {}: {}", path.display(), e),
        }
    }

    /// Sanitized card ids with an override in `namespace`, sorted.
    pub async fn list_overrides(&self, namespace: Namespace) -> Vec<String> {
        let Some(dir) = self.namespace_dir(namespace) else {
            return Vec::new();
        };
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(_) => return Vec::new(),
        };

        let mut ids = Vec::new();
        loop {
            match entries.next_entry().await {
                Ok(Some(entry)) => {
                    let path = entry.path();
                    if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                        continue;
                    }
                    if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                        ids.push(stem.to_string());
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!("Failed to list overrides in {}: {}", dir.display(), e);
                    break;
                }
            }
        }
        ids.sort();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn source_image(dir: &TempDir, name: &str) -> PathBuf {
        let path = dir.path().join(name);
        tokio::fs::write(&path, b"jpeg-bytes").await.unwrap();
        path
    }

    #[test]
    fn test_sanitize_blocks_traversal_and_bounds_length() {
        assert_eq!(sanitize_card_id("sv03.5-025"), "sv03.5-025");
        assert_eq!(sanitize_card_id("../../etc/passwd"), ".._.._etc_passwd");
        assert!(!sanitize_card_id("a/b\\c").contains(['/', '\\']));
        assert_eq!(sanitize_card_id(&"x".repeat(500)).len(), MAX_FILENAME_STEM);
    }

    #[tokio::test]
    async fn test_admin_override_takes_precedence() {
        let docs = TempDir::new().unwrap();
        let src = TempDir::new().unwrap();
        let store = LocalImageOverrideStore::new(Some(docs.path()));
        let image = source_image(&src, "a.jpg").await;

        assert!(store.resolve_best("sv03.5-025").await.is_none());

        let user_path = store
            .set_override("sv03.5-025", &image, Namespace::User)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(store.resolve_best("sv03.5-025").await, Some(user_path.clone()));

        let admin_path = store
            .set_override("sv03.5-025", &image, Namespace::Admin)
            .await
            .unwrap()
            .unwrap();
        assert_ne!(admin_path, user_path);
        assert_eq!(store.resolve_best("sv03.5-025").await, Some(admin_path));

        store.remove_override("sv03.5-025", Namespace::Admin).await;
        assert_eq!(store.resolve_best("sv03.5-025").await, Some(user_path));
    }

    #[tokio::test]
    async fn test_remove_is_idempotent_and_list_reflects_files() {
        let docs = TempDir::new().unwrap();
        let src = TempDir::new().unwrap();
        let store = LocalImageOverrideStore::new(Some(docs.path()));
        let image = source_image(&src, "b.jpg").await;

        store.remove_override("never-set", Namespace::User).await;
        assert!(store.list_overrides(Namespace::User).await.is_empty());

        store.set_override("SV8a-100", &image, Namespace::User).await.unwrap();
        store.set_override("sv03.5-001", &image, Namespace::User).await.unwrap();
        assert_eq!(
            store.list_overrides(Namespace::User).await,
            vec!["SV8a-100", "sv03.5-001"]
        );
        assert!(store.list_overrides(Namespace::Admin).await.is_empty());

        store.remove_override("SV8a-100", Namespace::User).await;
        store.remove_override("SV8a-100", Namespace::User).await;
        assert_eq!(store.list_overrides(Namespace::User).await, vec!["sv03.5-001"]);
    }

    #[tokio::test]
    async fn test_missing_source_is_an_error() {
        let docs = TempDir::new().unwrap();
        let store = LocalImageOverrideStore::new(Some(docs.path()));
        let err = store
            .set_override("a-1", Path::new("/nonexistent/source.jpg"), Namespace::User)
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), crate::errors::codes::STORAGE_ERROR);
    }

    #[tokio::test]
    async fn test_unavailable_store_is_a_no_op() {
        let src = TempDir::new().unwrap();
        let store = LocalImageOverrideStore::new(None);
        let image = source_image(&src, "c.jpg").await;

        assert!(!store.is_available());
        assert!(store
            .set_override("a-1", &image, Namespace::Admin)
            .await
            .unwrap()
            .is_none());
        assert!(store.resolve_best("a-1").await.is_none());
        assert!(store.list_overrides(Namespace::Admin).await.is_empty());
        store.remove_override("a-1", Namespace::Admin).await;
    }
}
