//! External card catalog API client.
//!
//! Requests always carry a minimal field projection so responses stay small
//! on mobile connections.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serde::Deserialize;

use crate::errors::AppError;
use crate::models::CatalogCard;

/// Fields requested from the catalog for every card.
pub const CARD_PROJECTION: &str = "id,name,number,images,set";

/// Page size used when listing a whole set.
const PAGE_SIZE: usize = 250;

/// Read-only access to the external catalog.
#[async_trait]
pub trait CatalogClient: Send + Sync {
    /// Look up one card. `Ok(None)` when the catalog does not know it.
    async fn fetch_card(&self, card_id: &str) -> Result<Option<CatalogCard>, AppError>;

    /// Every card of a set.
    async fn fetch_set(&self, set_id: &str) -> Result<Vec<CatalogCard>, AppError>;
}

#[derive(Debug, Deserialize)]
struct CardEnvelope {
    data: CatalogCard,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageEnvelope {
    #[serde(default)]
    data: Vec<CatalogCard>,
    #[serde(default)]
    total_count: Option<usize>,
}

/// reqwest-based catalog client.
#[derive(Debug, Clone)]
pub struct HttpCatalogClient {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpCatalogClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, AppError> {
        let raw = base_url.into();
        let base_url = Url::parse(&raw)
            .ok()
            .filter(|url| !url.cannot_be_a_base())
            .ok_or_else(|| AppError::Validation(format!("Invalid catalog URL {:?}", raw)))?;
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, base_url })
    }

    /// Ids are pushed as single path segments, so reserved characters are
    /// percent-encoded rather than read as path, query or fragment.
    fn card_url(&self, card_id: &str) -> Result<Url, AppError> {
        self.endpoint(&["cards", card_id])
    }

    fn cards_url(&self) -> Result<Url, AppError> {
        self.endpoint(&["cards"])
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, AppError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| AppError::Validation(format!("Invalid catalog URL {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

#[async_trait]
impl CatalogClient for HttpCatalogClient {
    async fn fetch_card(&self, card_id: &str) -> Result<Option<CatalogCard>, AppError> {
        let response = self
            .client
            .get(self.card_url(card_id)?)
            .query(&[("select", CARD_PROJECTION)])
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(AppError::Network(format!(
                "Catalog returned {} for card {}",
                response.status(),
                card_id
            )));
        }

        let envelope: CardEnvelope = response.json().await?;
        Ok(Some(envelope.data))
    }

    async fn fetch_set(&self, set_id: &str) -> Result<Vec<CatalogCard>, AppError> {
        let query = format!("set.id:{}", set_id);
        let page_size = PAGE_SIZE.to_string();
        let mut cards = Vec::new();
        let mut page = 1usize;

        loop {
            let page_str = page.to_string();
            let response = self
                .client
                .get(self.cards_url()?)
                .query(&[
                    ("q", query.as_str()),
                    ("select", CARD_PROJECTION),
                    ("page", page_str.as_str()),
                    ("pageSize", page_size.as_str()),
                ])
                .send()
                .await?;

            if !response.status().is_success() {
                return Err(AppError::Network(format!(
                    "Catalog returned {} for set {}",
                    response.status(),
                    set_id
                )));
            }

            let envelope: PageEnvelope = response.json().await?;
            let received = envelope.data.len();
            cards.extend(envelope.data);

            let total = envelope.total_count.unwrap_or(cards.len());
            if received < PAGE_SIZE || cards.len() >= total {
                break;
            }
            page += 1;
        }

        tracing::debug!("Fetched {} cards for set {}", cards.len(), set_id);
        Ok(cards)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base: &str) -> HttpCatalogClient {
        HttpCatalogClient::new(base, Duration::from_secs(1)).unwrap()
    }

    #[test]
    fn test_card_url_encodes_reserved_characters() {
        let url = client("https://api.example.com/v2").card_url("a/b?c#d").unwrap();
        assert_eq!(url.as_str(), "https://api.example.com/v2/cards/a%2Fb%3Fc%23d");
        assert_eq!(url.query(), None);
        assert_eq!(url.fragment(), None);
    }

    #[test]
    fn test_trailing_slash_on_base_is_ignored() {
        let url = client("https://api.example.com/v2/").card_url("sv03.5-004").unwrap();
        assert_eq!(url.as_str(), "https://api.example.com/v2/cards/sv03.5-004");
        assert_eq!(
            client("https://api.example.com/v2/").cards_url().unwrap().as_str(),
            "https://api.example.com/v2/cards"
        );
    }

    #[test]
    fn test_invalid_base_url_is_rejected() {
        for base in ["not a url", "mailto:catalog@example.com"] {
            assert!(matches!(
                HttpCatalogClient::new(base, Duration::from_secs(1)),
                Err(AppError::Validation(_))
            ));
        }
    }
}
