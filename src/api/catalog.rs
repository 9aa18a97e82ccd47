//! Offline catalog status and refresh endpoints.

use axum::extract::State;
use serde::Serialize;

use super::{success, ApiResult};
use crate::refresh::{CancelFlag, CatalogManifest, RefreshOutcome};
use crate::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogStatus {
    pub stale: bool,
    pub sets: Vec<String>,
    pub manifest: Option<CatalogManifest>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum RefreshReport {
    Completed { cards: usize },
    Cancelled,
}

impl From<RefreshOutcome> for RefreshReport {
    fn from(outcome: RefreshOutcome) -> Self {
        match outcome {
            RefreshOutcome::Completed { cards } => RefreshReport::Completed { cards },
            RefreshOutcome::Cancelled => RefreshReport::Cancelled,
        }
    }
}

/// GET /api/catalog/status
pub async fn catalog_status(State(state): State<AppState>) -> ApiResult<CatalogStatus> {
    success(CatalogStatus {
        stale: state.refresh.is_cache_stale().await,
        sets: state.refresh.sets().to_vec(),
        manifest: state.refresh.manifest().await,
    })
}

/// POST /api/catalog/refresh - Download the offline catalog now.
pub async fn refresh_catalog(State(state): State<AppState>) -> ApiResult<RefreshReport> {
    let outcome = state
        .refresh
        .sync_card_data_with_progress(
            |fraction, message| {
                tracing::debug!("Catalog refresh {:.0}%: {}", fraction * 100.0, message)
            },
            &CancelFlag::new(),
        )
        .await?;
    success(outcome.into())
}
