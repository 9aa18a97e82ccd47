//! Image override endpoints.

use std::path::PathBuf;

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};

use super::{success, ApiResult};
use crate::errors::AppError;
use crate::overrides::Namespace;
use crate::AppState;

fn parse_namespace(raw: &str) -> Result<Namespace, AppError> {
    Namespace::parse(raw)
        .ok_or_else(|| AppError::Validation(format!("Unknown override namespace: {}", raw)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetOverrideRequest {
    /// Image file on this device to copy into the override store
    pub source_path: PathBuf,
}

#[derive(Debug, Serialize)]
pub struct StoredOverride {
    /// `None` when overrides are unavailable on this platform
    pub path: Option<PathBuf>,
}

/// GET /api/overrides/:namespace - Card ids with an override.
pub async fn list_overrides(
    State(state): State<AppState>,
    Path(namespace): Path<String>,
) -> ApiResult<Vec<String>> {
    let namespace = parse_namespace(&namespace)?;
    success(state.overrides.list_overrides(namespace).await)
}

/// PUT /api/overrides/:namespace/:card_id - Store an override image.
pub async fn set_override(
    State(state): State<AppState>,
    Path((namespace, card_id)): Path<(String, String)>,
    Json(request): Json<SetOverrideRequest>,
) -> ApiResult<StoredOverride> {
    let namespace = parse_namespace(&namespace)?;
    let path = state
        .overrides
        .set_override(&card_id, &request.source_path, namespace)
        .await?;
    success(StoredOverride { path })
}

/// DELETE /api/overrides/:namespace/:card_id
pub async fn remove_override(
    State(state): State<AppState>,
    Path((namespace, card_id)): Path<(String, String)>,
) -> ApiResult<()> {
    let namespace = parse_namespace(&namespace)?;
    state.overrides.remove_override(&card_id, namespace).await;
    success(())
}
