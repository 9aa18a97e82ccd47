//! Catalog card models and the cached fallback record.

use serde::{Deserialize, Serialize};

/// Image URLs as returned by the catalog API.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CardImages {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub small: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub large: Option<String>,
}

/// The owning set of a catalog card.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CardSet {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// An external catalog record. Never owned by this service, only cached.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CatalogCard {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub set: Option<CardSet>,
    #[serde(default)]
    pub images: CardImages,
}

impl CatalogCard {
    /// Reduce to the cached fallback record. `None` when the card carries no
    /// image at all, since such a record is useless as a fallback.
    pub fn to_fallback(&self) -> Option<CardFallback> {
        let CardImages { small, large } = &self.images;
        if small.is_none() && large.is_none() {
            return None;
        }
        let large = large.clone().or_else(|| small.clone()).unwrap_or_default();
        let small = small.clone().unwrap_or_else(|| large.clone());
        Some(CardFallback {
            image_large: large,
            image_small: small,
            name: (!self.name.is_empty()).then(|| self.name.clone()),
            set: self.set.as_ref().map(|s| s.id.clone()),
        })
    }
}

/// Best-known image and metadata for a card.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CardFallback {
    pub image_large: String,
    pub image_small: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub set: Option<String>,
}

/// A `{setId}-{localNumber}` card identifier split into its parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardId<'a> {
    pub set_id: &'a str,
    pub local_number: &'a str,
}

impl<'a> CardId<'a> {
    /// Split on the last `-`; set ids may contain dashes, local numbers do not.
    pub fn parse(raw: &'a str) -> Option<Self> {
        let (set_id, local_number) = raw.rsplit_once('-')?;
        if set_id.is_empty() || local_number.is_empty() {
            return None;
        }
        Some(Self {
            set_id,
            local_number,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card(small: Option<&str>, large: Option<&str>) -> CatalogCard {
        CatalogCard {
            id: "sv03.5-006".to_string(),
            name: "Charizard ex".to_string(),
            number: Some("6".to_string()),
            set: Some(CardSet {
                id: "sv03.5".to_string(),
                name: None,
            }),
            images: CardImages {
                small: small.map(str::to_string),
                large: large.map(str::to_string),
            },
        }
    }

    #[test]
    fn test_to_fallback_requires_an_image() {
        assert!(card(None, None).to_fallback().is_none());

        let only_small = card(Some("s.png"), None).to_fallback().unwrap();
        assert_eq!(only_small.image_large, "s.png");
        assert_eq!(only_small.image_small, "s.png");
        assert_eq!(only_small.set.as_deref(), Some("sv03.5"));
    }

    #[test]
    fn test_card_id_parse() {
        let id = CardId::parse("swsh12pt5gg-GG01").unwrap();
        assert_eq!(id.set_id, "swsh12pt5gg");
        assert_eq!(id.local_number, "GG01");

        let dashed = CardId::parse("sm-p-SM01").unwrap();
        assert_eq!(dashed.set_id, "sm-p");

        assert!(CardId::parse("nodash").is_none());
        assert!(CardId::parse("sv03.5-").is_none());
    }
}
