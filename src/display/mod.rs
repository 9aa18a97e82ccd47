//! Card display resolution.
//!
//! Local overrides win over the catalog fallback cache, which in turn wins
//! over having no image at all.

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;

use crate::cache::CatalogFallbackCache;
use crate::models::{CardId, CardImages, CardSet, CatalogCard};
use crate::overrides::LocalImageOverrideStore;
use crate::refresh::RefreshOrchestrator;
use crate::variants::VariantEligibility;

/// Where the displayed image comes from.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "source", rename_all = "camelCase")]
pub enum ImageSource {
    Override { path: PathBuf },
    Remote { large: String, small: String },
    None,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CardDisplay {
    pub card_id: String,
    pub name: Option<String>,
    pub set_id: Option<String>,
    pub image: ImageSource,
    pub variants: Vec<String>,
}

pub struct CardDisplayService {
    variants: Arc<VariantEligibility>,
    overrides: Arc<LocalImageOverrideStore>,
    fallback: Arc<CatalogFallbackCache>,
    catalog: Arc<RefreshOrchestrator>,
}

impl CardDisplayService {
    pub fn new(
        variants: Arc<VariantEligibility>,
        overrides: Arc<LocalImageOverrideStore>,
        fallback: Arc<CatalogFallbackCache>,
        catalog: Arc<RefreshOrchestrator>,
    ) -> Self {
        Self {
            variants,
            overrides,
            fallback,
            catalog,
        }
    }

    /// Build the display record for `card_id`, starting from the caller's
    /// known variant list.
    pub async fn resolve(&self, card_id: &str, variants: &[String]) -> CardDisplay {
        let parsed = CardId::parse(card_id);
        let offline = self.catalog.cached_card(card_id).await;
        let override_path = self.overrides.resolve_best(card_id).await;

        // The fallback record also supplies the name rules like excludeEx need
        // when the card is missing from the offline snapshot.
        let fallback = if override_path.is_none() || offline.is_none() {
            self.fallback.resolve(card_id).await
        } else {
            None
        };

        let card = offline.or_else(|| {
            let fallback = fallback.as_ref()?;
            Some(CatalogCard {
                id: card_id.to_string(),
                name: fallback.name.clone()?,
                number: parsed.as_ref().map(|id| id.local_number.to_string()),
                set: fallback.set.clone().map(|id| CardSet { id, name: None }),
                images: CardImages::default(),
            })
        });

        let variants = match &parsed {
            Some(id) => self
                .variants
                .augment(variants, id.set_id, id.local_number, card.as_ref()),
            None => variants.to_vec(),
        };

        let name = card.as_ref().map(|c| c.name.clone()).filter(|n| !n.is_empty());
        let set_id = fallback
            .as_ref()
            .and_then(|f| f.set.clone())
            .or_else(|| parsed.as_ref().map(|id| id.set_id.to_string()));

        let image = match (override_path, fallback) {
            (Some(path), _) => ImageSource::Override { path },
            (None, Some(fallback)) => ImageSource::Remote {
                large: fallback.image_large,
                small: fallback.image_small,
            },
            (None, None) => {
                tracing::debug!("No image available for {}", card_id);
                ImageSource::None
            }
        };

        CardDisplay {
            card_id: card_id.to_string(),
            name,
            set_id,
            image,
            variants,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogClient;
    use crate::errors::AppError;
    use crate::overrides::Namespace;
    use crate::store::MemoryKvStore;
    use crate::variants::BONUS_VARIANT;
    use async_trait::async_trait;
    use tempfile::TempDir;

    struct FakeCatalog;

    #[async_trait]
    impl CatalogClient for FakeCatalog {
        async fn fetch_card(&self, card_id: &str) -> Result<Option<CatalogCard>, AppError> {
            if card_id.starts_with("offline") {
                return Err(AppError::Network("unreachable".to_string()));
            }
            let (name, set_id) = match card_id.split_once('-') {
                Some(("SV8a", _)) => ("Pidgeot ex", "SV8a"),
                _ => ("Charmander", "sv03.5"),
            };
            Ok(Some(CatalogCard {
                id: card_id.to_string(),
                name: name.to_string(),
                number: None,
                set: Some(CardSet {
                    id: set_id.to_string(),
                    name: None,
                }),
                images: CardImages {
                    small: Some("https://img/small.png".to_string()),
                    large: Some("https://img/large.png".to_string()),
                },
            }))
        }

        async fn fetch_set(&self, _set_id: &str) -> Result<Vec<CatalogCard>, AppError> {
            Ok(Vec::new())
        }
    }

    fn service(documents: Option<&std::path::Path>) -> CardDisplayService {
        let kv = Arc::new(MemoryKvStore::new());
        let client: Arc<dyn CatalogClient> = Arc::new(FakeCatalog);
        CardDisplayService::new(
            Arc::new(VariantEligibility::default()),
            Arc::new(LocalImageOverrideStore::new(documents)),
            Arc::new(CatalogFallbackCache::new(kv.clone(), client.clone())),
            Arc::new(RefreshOrchestrator::new(kv, client, Vec::new())),
        )
    }

    #[tokio::test]
    async fn test_remote_image_with_bonus_variant() {
        let display = service(None)
            .resolve("sv03.5-004", &["normal".to_string()])
            .await;

        assert_eq!(display.name.as_deref(), Some("Charmander"));
        assert_eq!(display.set_id.as_deref(), Some("sv03.5"));
        assert_eq!(display.variants, vec!["normal", BONUS_VARIANT]);
        assert!(matches!(display.image, ImageSource::Remote { .. }));
    }

    #[tokio::test]
    async fn test_override_wins_over_remote() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("scan.jpg");
        std::fs::write(&source, b"jpeg").unwrap();

        let svc = service(Some(dir.path()));
        let stored = svc
            .overrides
            .set_override("sv03.5-004", &source, Namespace::User)
            .await
            .unwrap()
            .unwrap();

        let display = svc.resolve("sv03.5-004", &[]).await;
        assert_eq!(display.image, ImageSource::Override { path: stored });
    }

    #[tokio::test]
    async fn test_no_image_when_catalog_unreachable() {
        let display = service(None).resolve("offline-1", &[]).await;
        assert_eq!(display.image, ImageSource::None);
        assert_eq!(display.set_id.as_deref(), Some("offline"));
        assert!(display.variants.is_empty());
    }

    #[tokio::test]
    async fn test_ex_card_outside_snapshot_gets_no_bonus_variant() {
        let display = service(None).resolve("SV8a-100", &[]).await;

        assert_eq!(display.name.as_deref(), Some("Pidgeot ex"));
        assert!(matches!(display.image, ImageSource::Remote { .. }));
        assert!(display.variants.is_empty());
    }

    #[tokio::test]
    async fn test_override_still_uses_catalog_name_for_variants() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("scan.jpg");
        std::fs::write(&source, b"jpeg").unwrap();

        let svc = service(Some(dir.path()));
        svc.overrides
            .set_override("SV8a-100", &source, Namespace::Admin)
            .await
            .unwrap();

        let display = svc.resolve("SV8a-100", &[]).await;
        assert!(matches!(display.image, ImageSource::Override { .. }));
        assert!(display.variants.is_empty());
    }
}
