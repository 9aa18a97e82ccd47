//! Collection synchronizer.
//!
//! Reconciles a user's collections and binder order with the remote
//! collection store. `push` is the authority for deletions: every remote
//! collection absent from the pushed list is removed afterwards. The write
//! and cleanup steps are not transactional; a crash in between leaves orphan
//! documents that the next successful push from any device removes, since
//! cleanup always re-evaluates against the latest pushed list.
//!
//! Concurrent pushes from one device are not serialized here. Callers
//! debounce their saves so one push's cleanup cannot delete documents an
//! overlapping push just wrote.

mod ledger;

pub use ledger::*;

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::json;

use crate::errors::AppError;
use crate::models::{BinderOrder, Collection};
use crate::store::{key_segment, paths, DocumentStore, KeyValueStore};

/// Key for collections of a signed-out user.
pub const LOCAL_COLLECTIONS_KEY: &str = "localCollections";

/// Prefix for the per-user offline mirror of remote collections.
pub const COLLECTIONS_CACHE_PREFIX: &str = "collectionsCache:";

/// Who the caller is acting as. Owned by the authentication layer and passed
/// into every call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    uid: Option<String>,
}

impl Session {
    pub fn anonymous() -> Self {
        Self { uid: None }
    }

    pub fn signed_in(uid: impl Into<String>) -> Self {
        Self {
            uid: Some(uid.into()),
        }
    }

    pub fn uid(&self) -> Option<&str> {
        self.uid.as_deref()
    }
}

pub struct CollectionSynchronizer {
    remote: Option<Arc<dyn DocumentStore>>,
    local: Arc<dyn KeyValueStore>,
}

impl CollectionSynchronizer {
    /// `remote` is `None` when the document store was never configured.
    pub fn new(remote: Option<Arc<dyn DocumentStore>>, local: Arc<dyn KeyValueStore>) -> Self {
        Self { remote, local }
    }

    fn remote_for<'a>(
        &'a self,
        session: &'a Session,
    ) -> Result<(&'a dyn DocumentStore, &'a str), AppError> {
        let remote = self.remote.as_deref().ok_or_else(|| {
            AppError::NotInitialized("Remote collection store is not configured".to_string())
        })?;
        let uid = session.uid().ok_or_else(|| {
            AppError::NotInitialized("No signed-in user for remote sync".to_string())
        })?;
        if !paths::is_valid_segment(uid) {
            return Err(AppError::Validation(format!("Invalid user id: {}", uid)));
        }
        Ok((remote, uid))
    }

    /// Read every valid collection of the user. Read failures yield an empty
    /// list, which callers must treat as "unknown" rather than "none".
    pub async fn pull(&self, session: &Session) -> Result<Vec<Collection>, AppError> {
        let (remote, uid) = self.remote_for(session)?;
        match fetch_collections(remote, uid).await {
            Ok(collections) => Ok(collections),
            Err(e) => {
                tracing::warn!("Pull failed for user {}: {}", uid, e);
                Ok(Vec::new())
            }
        }
    }

    /// Overwrite every passed collection, then delete remote collections
    /// missing from the list.
    pub async fn push(&self, session: &Session, collections: &[Collection]) -> Result<(), AppError> {
        let (remote, uid) = self.remote_for(session)?;

        if let Some(bad) = collections.iter().find(|c| !paths::is_valid_segment(&c.id)) {
            return Err(AppError::Validation(format!(
                "Invalid collection id: {:?}",
                bad.id
            )));
        }

        for collection in collections {
            let doc = serde_json::to_value(collection)?;
            remote
                .set(&paths::collection(uid, &collection.id), &doc)
                .await?;
        }

        let keep: HashSet<&str> = collections.iter().map(|c| c.id.as_str()).collect();
        let existing = remote.list(&paths::collections(uid)).await?;
        let mut deleted = 0usize;
        for (doc_id, _) in existing {
            if !keep.contains(doc_id.as_str()) {
                remote.delete(&paths::collection(uid, &doc_id)).await?;
                deleted += 1;
            }
        }

        tracing::info!(
            "Pushed {} collections for user {} ({} removed)",
            collections.len(),
            uid,
            deleted
        );
        Ok(())
    }

    /// The user's binder order. Missing, malformed or unreadable data yields
    /// an empty order.
    pub async fn pull_order(&self, session: &Session) -> Result<Vec<String>, AppError> {
        let (remote, uid) = self.remote_for(session)?;
        let doc = match remote.get(&paths::binder_order(uid)).await {
            Ok(Some(doc)) => doc,
            Ok(None) => return Ok(Vec::new()),
            Err(e) => {
                tracing::warn!("Binder order read failed for user {}: {}", uid, e);
                return Ok(Vec::new());
            }
        };
        Ok(serde_json::from_value::<BinderOrder>(doc)
            .map(|b| b.order)
            .unwrap_or_default())
    }

    pub async fn push_order(&self, session: &Session, order: &[String]) -> Result<(), AppError> {
        let (remote, uid) = self.remote_for(session)?;
        remote
            .set(&paths::binder_order(uid), &json!({ "order": order }))
            .await
    }

    /// Collections for display. Signed-in users read remote and mirror it
    /// locally, falling back to the mirror when the remote is unreachable.
    /// Signed-out users only have the local copy.
    pub async fn load_collections(&self, session: &Session) -> Result<Vec<Collection>, AppError> {
        let Some(uid) = session.uid() else {
            return Ok(self.read_local(LOCAL_COLLECTIONS_KEY).await);
        };

        let (remote, _) = self.remote_for(session)?;
        let cache_key = format!("{}{}", COLLECTIONS_CACHE_PREFIX, key_segment(uid));
        match fetch_collections(remote, uid).await {
            Ok(collections) => {
                self.write_local(&cache_key, &collections).await;
                Ok(collections)
            }
            Err(e) => {
                tracing::warn!("Remote unavailable for user {}, serving local copy: {}", uid, e);
                Ok(self.read_local(&cache_key).await)
            }
        }
    }

    /// Save locally first, then push when signed in.
    pub async fn save_collections(
        &self,
        session: &Session,
        collections: &[Collection],
    ) -> Result<(), AppError> {
        match session.uid() {
            None => {
                self.write_local(LOCAL_COLLECTIONS_KEY, collections).await;
                Ok(())
            }
            Some(uid) => {
                let cache_key = format!("{}{}", COLLECTIONS_CACHE_PREFIX, key_segment(uid));
                self.write_local(&cache_key, collections).await;
                self.push(session, collections).await
            }
        }
    }

    async fn read_local(&self, key: &str) -> Vec<Collection> {
        match self.local.get(key).await {
            Ok(Some(raw)) => serde_json::from_str::<Vec<serde_json::Value>>(&raw)
                .map(|docs| docs.iter().filter_map(Collection::from_document).collect())
                .unwrap_or_default(),
            Ok(None) => Vec::new(),
            Err(e) => {
                tracing::warn!("Failed to read local collections {}: {}", key, e);
                Vec::new()
            }
        }
    }

    async fn write_local(&self, key: &str, collections: &[Collection]) {
        let result = match serde_json::to_string(collections) {
            Ok(raw) => self.local.set(key, &raw).await,
            Err(e) => Err(e.into()),
        };
        if let Err(e) = result {
            tracing::warn!("Failed to persist local collections {}: {}", key, e);
        }
    }
}

async fn fetch_collections(
    remote: &dyn DocumentStore,
    uid: &str,
) -> Result<Vec<Collection>, AppError> {
    let docs = remote.list(&paths::collections(uid)).await?;
    let total = docs.len();
    let collections: Vec<Collection> = docs
        .iter()
        .filter_map(|(doc_id, doc)| {
            let parsed = Collection::from_document(doc);
            if parsed.is_none() {
                tracing::debug!("Dropping malformed collection document {}", doc_id);
            }
            parsed
        })
        .collect();

    if collections.len() != total {
        tracing::warn!(
            "Dropped {} malformed collection documents for user {}",
            total - collections.len(),
            uid
        );
    }
    Ok(collections)
}
