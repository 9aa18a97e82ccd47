//! Catalog fallback cache.
//!
//! Resolves a card id to its best-known image and metadata by walking an
//! ordered list of cache tiers, then falling through to a single catalog
//! lookup. Precedence lives in the tier order, not in branching.

mod tiers;

pub use tiers::*;

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::catalog::CatalogClient;
use crate::models::CardFallback;
use crate::store::KeyValueStore;

/// Source of the current time, injectable for freshness tests.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

pub fn system_clock() -> Clock {
    Arc::new(Utc::now)
}

/// Ordered cache tiers, first tier checked first.
pub struct TieredCache {
    tiers: Vec<Arc<dyn CacheTier>>,
}

impl TieredCache {
    pub fn new(tiers: Vec<Arc<dyn CacheTier>>) -> Self {
        Self { tiers }
    }

    /// First hit wins; every tier ahead of the hit is backfilled.
    pub async fn get(&self, card_id: &str) -> Option<CardFallback> {
        for (index, tier) in self.tiers.iter().enumerate() {
            if let Some(value) = tier.get(card_id).await {
                tracing::debug!("Fallback hit for {} in {} tier", card_id, tier.name());
                write_tiers(&self.tiers[..index], card_id, &value).await;
                return Some(value);
            }
        }
        None
    }

    /// Write through every tier.
    pub async fn put(&self, card_id: &str, value: &CardFallback) {
        write_tiers(&self.tiers, card_id, value).await;
    }
}

/// Best-effort write; a failing tier is logged and skipped since earlier
/// tiers still hold the value for this session.
async fn write_tiers(tiers: &[Arc<dyn CacheTier>], card_id: &str, value: &CardFallback) {
    for tier in tiers {
        if let Err(e) = tier.set(card_id, value).await {
            tracing::warn!(
                "Failed to write {} to {} fallback tier: {}",
                card_id,
                tier.name(),
                e
            );
        }
    }
}

/// Fallback cache in front of the external catalog.
pub struct CatalogFallbackCache {
    cache: TieredCache,
    client: Arc<dyn CatalogClient>,
}

impl CatalogFallbackCache {
    /// Memory tier, then the persisted tier over `kv`.
    pub fn new(kv: Arc<dyn KeyValueStore>, client: Arc<dyn CatalogClient>) -> Self {
        let tiers: Vec<Arc<dyn CacheTier>> = vec![
            Arc::new(MemoryTier::new()),
            Arc::new(PersistentTier::new(kv)),
        ];
        Self::with_tiers(tiers, client)
    }

    pub fn with_tiers(tiers: Vec<Arc<dyn CacheTier>>, client: Arc<dyn CatalogClient>) -> Self {
        Self {
            cache: TieredCache::new(tiers),
            client,
        }
    }

    /// Resolve a card's fallback record. Performs at most one catalog request
    /// and never retries; catalog failures and image-less cards yield `None`
    /// and nothing is cached for them.
    pub async fn resolve(&self, card_id: &str) -> Option<CardFallback> {
        if let Some(hit) = self.cache.get(card_id).await {
            return Some(hit);
        }

        let card = match self.client.fetch_card(card_id).await {
            Ok(Some(card)) => card,
            Ok(None) => {
                tracing::debug!("Catalog has no card {}", card_id);
                return None;
            }
            Err(e) => {
                tracing::warn!("Catalog lookup failed for {}: {}", card_id, e);
                return None;
            }
        };

        let fallback = card.to_fallback()?;
        self.cache.put(card_id, &fallback).await;
        Some(fallback)
    }
}
