//! Catalog staleness check and offline refresh.
//!
//! A refresh downloads every advertised set before writing anything, writes
//! the new data under a fresh generation, and only then swaps the manifest
//! to point at it. Readers always see either the old complete snapshot or
//! the new complete snapshot.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::cache::{system_clock, Clock};
use crate::catalog::CatalogClient;
use crate::errors::AppError;
use crate::models::{CardId, CatalogCard};
use crate::store::{key_segment, KeyValueStore};

pub const CATALOG_MANIFEST_KEY: &str = "catalogManifest";
pub const CATALOG_SET_PREFIX: &str = "catalogSet:";

/// Snapshot age in days after which the catalog is considered stale.
pub const CATALOG_TTL_DAYS: i64 = 7;

/// Commit record for the current catalog snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CatalogManifest {
    pub generation: String,
    pub synced_at: DateTime<Utc>,
    pub sets: Vec<String>,
    pub card_count: usize,
}

/// Cooperative cancellation shared between the caller and a running refresh.
/// In-flight requests finish; only the resulting writes are skipped.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    Completed { cards: usize },
    Cancelled,
}

/// Clamps reported fractions into [0, 1] and never lets them go backwards.
struct Progress<F: FnMut(f64, &str)> {
    callback: F,
    last: f64,
}

impl<F: FnMut(f64, &str)> Progress<F> {
    fn new(callback: F) -> Self {
        Self {
            callback,
            last: 0.0,
        }
    }

    fn report(&mut self, fraction: f64, message: &str) {
        let fraction = fraction.clamp(0.0, 1.0).max(self.last);
        self.last = fraction;
        (self.callback)(fraction, message);
    }
}

fn set_key(generation: &str, set_id: &str) -> String {
    format!("{}{}:{}", CATALOG_SET_PREFIX, generation, key_segment(set_id))
}

fn generation_prefix(generation: &str) -> String {
    format!("{}{}:", CATALOG_SET_PREFIX, generation)
}

pub struct RefreshOrchestrator {
    kv: Arc<dyn KeyValueStore>,
    client: Arc<dyn CatalogClient>,
    sets: Vec<String>,
    clock: Clock,
    running: Mutex<()>,
}

impl RefreshOrchestrator {
    /// `sets` is the catalog needed for the app's offline features.
    pub fn new(kv: Arc<dyn KeyValueStore>, client: Arc<dyn CatalogClient>, sets: Vec<String>) -> Self {
        Self {
            kv,
            client,
            sets,
            clock: system_clock(),
            running: Mutex::new(()),
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn sets(&self) -> &[String] {
        &self.sets
    }

    pub async fn manifest(&self) -> Option<CatalogManifest> {
        match self.kv.get(CATALOG_MANIFEST_KEY).await {
            Ok(Some(raw)) => serde_json::from_str(&raw).ok(),
            Ok(None) => None,
            Err(e) => {
                tracing::warn!("Failed to read catalog manifest: {}", e);
                None
            }
        }
    }

    /// True when there is no usable snapshot, it covers different sets, or
    /// it is older than the freshness window.
    pub async fn is_cache_stale(&self) -> bool {
        let Some(manifest) = self.manifest().await else {
            return true;
        };

        let mut cached = manifest.sets.clone();
        let mut wanted = self.sets.clone();
        cached.sort();
        wanted.sort();
        if cached != wanted {
            return true;
        }

        (self.clock)() - manifest.synced_at >= Duration::days(CATALOG_TTL_DAYS)
    }

    /// Background refresh without progress reporting.
    pub async fn sync_card_data(&self) -> Result<RefreshOutcome, AppError> {
        self.sync_card_data_with_progress(|_, _| {}, &CancelFlag::new())
            .await
    }

    /// Download and commit every advertised set. On error or cancellation
    /// the previous snapshot is left untouched.
    pub async fn sync_card_data_with_progress<F>(
        &self,
        on_progress: F,
        cancel: &CancelFlag,
    ) -> Result<RefreshOutcome, AppError>
    where
        F: FnMut(f64, &str),
    {
        let _running = self.running.lock().await;
        let mut progress = Progress::new(on_progress);
        progress.report(0.0, "Checking card data");

        let total = self.sets.len().max(1) as f64;
        let mut downloaded: Vec<(&str, Vec<CatalogCard>)> = Vec::with_capacity(self.sets.len());

        for (index, set_id) in self.sets.iter().enumerate() {
            if cancel.is_cancelled() {
                tracing::info!("Catalog refresh cancelled before {}", set_id);
                return Ok(RefreshOutcome::Cancelled);
            }
            progress.report(0.8 * index as f64 / total, &format!("Downloading {}", set_id));

            let cards = self.client.fetch_set(set_id).await?;
            if cards.is_empty() {
                return Err(AppError::Network(format!(
                    "Catalog returned no cards for set {}",
                    set_id
                )));
            }
            downloaded.push((set_id.as_str(), cards));
        }

        if cancel.is_cancelled() {
            tracing::info!("Catalog refresh cancelled before saving");
            return Ok(RefreshOutcome::Cancelled);
        }

        progress.report(0.8, "Saving card data");
        let generation = uuid::Uuid::new_v4().simple().to_string();
        let mut card_count = 0usize;

        for (set_id, cards) in &downloaded {
            let stored = serde_json::to_string(cards)
                .map_err(AppError::from)
                .map(|raw| (raw, cards.len()));
            let written = match stored {
                Ok((raw, count)) => self
                    .kv
                    .set(&set_key(&generation, set_id), &raw)
                    .await
                    .map(|_| count),
                Err(e) => Err(e),
            };
            match written {
                Ok(count) => card_count += count,
                Err(e) => {
                    self.discard_generation(&generation).await;
                    return Err(e);
                }
            }
        }

        if cancel.is_cancelled() {
            self.discard_generation(&generation).await;
            tracing::info!("Catalog refresh cancelled before commit");
            return Ok(RefreshOutcome::Cancelled);
        }

        let previous = self.manifest().await.map(|m| m.generation);
        let manifest = CatalogManifest {
            generation: generation.clone(),
            synced_at: (self.clock)(),
            sets: self.sets.clone(),
            card_count,
        };
        let committed = match serde_json::to_string(&manifest) {
            Ok(raw) => self.kv.set(CATALOG_MANIFEST_KEY, &raw).await,
            Err(e) => Err(e.into()),
        };
        if let Err(e) = committed {
            self.discard_generation(&generation).await;
            return Err(e);
        }

        progress.report(0.95, "Cleaning up");
        self.discard_retired_generations(&generation, previous.as_deref())
            .await;

        progress.report(1.0, "Card data up to date");
        tracing::info!(
            "Catalog refreshed: {} cards across {} sets",
            card_count,
            self.sets.len()
        );
        Ok(RefreshOutcome::Completed { cards: card_count })
    }

    /// Cards of one set from the committed snapshot. A reader that raced a
    /// commit and found its generation gone retries once with the new manifest.
    pub async fn cached_set(&self, set_id: &str) -> Vec<CatalogCard> {
        let Some(manifest) = self.manifest().await else {
            return Vec::new();
        };
        if let Some(cards) = self.read_set(&manifest.generation, set_id).await {
            return cards;
        }
        match self.manifest().await {
            Some(latest) if latest.generation != manifest.generation => self
                .read_set(&latest.generation, set_id)
                .await
                .unwrap_or_default(),
            _ => Vec::new(),
        }
    }

    async fn read_set(&self, generation: &str, set_id: &str) -> Option<Vec<CatalogCard>> {
        match self.kv.get(&set_key(generation, set_id)).await {
            Ok(Some(raw)) => Some(serde_json::from_str(&raw).unwrap_or_default()),
            Ok(None) => None,
            Err(e) => {
                tracing::warn!("Failed to read cached set {}: {}", set_id, e);
                None
            }
        }
    }

    /// Look up a `{setId}-{localNumber}` card in the committed snapshot.
    pub async fn cached_card(&self, card_id: &str) -> Option<CatalogCard> {
        let parsed = CardId::parse(card_id)?;
        self.cached_set(parsed.set_id)
            .await
            .into_iter()
            .find(|card| card.id == card_id)
    }

    async fn discard_generation(&self, generation: &str) {
        self.remove_keys(|key| key.starts_with(&generation_prefix(generation)))
            .await;
    }

    /// Remove every generation except the committed one and the one it
    /// replaced; readers still holding the previous manifest keep working.
    async fn discard_retired_generations(&self, current: &str, previous: Option<&str>) {
        let current = generation_prefix(current);
        let previous = previous.map(generation_prefix);
        self.remove_keys(|key| {
            let retained = previous.as_deref().is_some_and(|p| key.starts_with(p));
            !key.starts_with(&current) && !retained
        })
        .await;
    }

    async fn remove_keys(&self, predicate: impl Fn(&str) -> bool) {
        let keys = match self.kv.list_keys(CATALOG_SET_PREFIX).await {
            Ok(keys) => keys,
            Err(e) => {
                tracing::warn!("Failed to list catalog keys for cleanup: {}", e);
                return;
            }
        };
        for key in keys.iter().filter(|k| predicate(k)) {
            if let Err(e) = self.kv.remove(key).await {
                tracing::warn!("Failed to remove catalog key {}: {}", key, e);
            }
        }
    }
}
