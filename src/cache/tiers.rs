//! Cache tiers for card fallback records.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use super::{system_clock, Clock};
use crate::errors::AppError;
use crate::models::CardFallback;
use crate::store::KeyValueStore;

/// Age in days after which a persisted fallback record is treated as absent.
pub const FALLBACK_TTL_DAYS: i64 = 7;

/// Key prefix for persisted fallback records.
pub const FALLBACK_KEY_PREFIX: &str = "fallbackCard:";

/// One level of the fallback cache. A tier that cannot answer reports a miss.
#[async_trait]
pub trait CacheTier: Send + Sync {
    fn name(&self) -> &'static str;

    async fn get(&self, card_id: &str) -> Option<CardFallback>;

    async fn set(&self, card_id: &str, value: &CardFallback) -> Result<(), AppError>;
}

/// Process-lifetime tier. Never expires; a restart clears it.
#[derive(Default)]
pub struct MemoryTier {
    entries: RwLock<HashMap<String, CardFallback>>,
}

impl MemoryTier {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheTier for MemoryTier {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, card_id: &str) -> Option<CardFallback> {
        self.entries.read().await.get(card_id).cloned()
    }

    async fn set(&self, card_id: &str, value: &CardFallback) -> Result<(), AppError> {
        self.entries
            .write()
            .await
            .insert(card_id.to_string(), value.clone());
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredFallback {
    data: CardFallback,
    /// Unix millis of the write
    cached_at: i64,
}

/// Tier persisted in the device key-value store with a fixed freshness window.
pub struct PersistentTier {
    kv: Arc<dyn KeyValueStore>,
    clock: Clock,
}

impl PersistentTier {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self {
            kv,
            clock: system_clock(),
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    fn is_fresh(&self, cached_at: DateTime<Utc>) -> bool {
        (self.clock)() - cached_at < Duration::days(FALLBACK_TTL_DAYS)
    }
}

/// Store key for a card id. Non-alphanumeric characters become `_`.
pub fn fallback_key(card_id: &str) -> String {
    let normalized: String = card_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    format!("{}{}", FALLBACK_KEY_PREFIX, normalized)
}

#[async_trait]
impl CacheTier for PersistentTier {
    fn name(&self) -> &'static str {
        "persistent"
    }

    async fn get(&self, card_id: &str) -> Option<CardFallback> {
        let raw = match self.kv.get(&fallback_key(card_id)).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!("Fallback cache read failed for {}: {}", card_id, e);
                return None;
            }
        };

        let stored: StoredFallback = serde_json::from_str(&raw).ok()?;
        let cached_at = DateTime::from_timestamp_millis(stored.cached_at)?;
        if !self.is_fresh(cached_at) {
            tracing::debug!("Fallback entry for {} is stale", card_id);
            return None;
        }
        Some(stored.data)
    }

    async fn set(&self, card_id: &str, value: &CardFallback) -> Result<(), AppError> {
        let stored = StoredFallback {
            data: value.clone(),
            cached_at: (self.clock)().timestamp_millis(),
        };
        let raw = serde_json::to_string(&stored)?;
        self.kv.set(&fallback_key(card_id), &raw).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryKvStore;
    use chrono::TimeZone;
    use std::sync::Mutex;

    fn fallback() -> CardFallback {
        CardFallback {
            image_large: "https://img/large.png".to_string(),
            image_small: "https://img/small.png".to_string(),
            name: Some("Pikachu".to_string()),
            set: Some("sv03.5".to_string()),
        }
    }

    #[test]
    fn test_fallback_key_normalizes() {
        assert_eq!(fallback_key("sv03.5-025"), "fallbackCard:sv03_5_025");
        assert_eq!(fallback_key("../etc"), "fallbackCard:___etc");
    }

    #[tokio::test]
    async fn test_persistent_entry_freshness_window() {
        let written_at = Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap();
        let now = Arc::new(Mutex::new(written_at));
        let clock_now = now.clone();
        let clock: Clock = Arc::new(move || *clock_now.lock().unwrap());

        let tier = PersistentTier::new(Arc::new(MemoryKvStore::new())).with_clock(clock);
        tier.set("sv03.5-025", &fallback()).await.unwrap();

        *now.lock().unwrap() = written_at + Duration::days(6) + Duration::hours(23);
        assert_eq!(tier.get("sv03.5-025").await, Some(fallback()));

        *now.lock().unwrap() = written_at + Duration::days(7) + Duration::hours(1);
        assert_eq!(tier.get("sv03.5-025").await, None);
    }

    #[tokio::test]
    async fn test_persistent_tier_ignores_garbage() {
        let kv = Arc::new(MemoryKvStore::new());
        kv.set(&fallback_key("x-1"), "not json").await.unwrap();
        let tier = PersistentTier::new(kv);
        assert!(tier.get("x-1").await.is_none());
    }
}
