//! Collection, binder order and device-local collection state endpoints.

use std::collections::HashSet;

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};

use super::{success, ApiResult, CurrentSession};
use crate::errors::AppError;
use crate::models::{BinderOrder, Collection};
use crate::store::paths;
use crate::sync::ViewMode;
use crate::AppState;

/// GET /api/collections - The caller's collections in binder order.
pub async fn list_collections(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
) -> ApiResult<Vec<Collection>> {
    let collections = state.sync.load_collections(&session).await?;

    let order = if session.uid().is_some() {
        state.sync.pull_order(&session).await?
    } else {
        Vec::new()
    };

    success(BinderOrder::new(order).apply(collections))
}

/// PUT /api/collections - Replace the caller's full collection list.
pub async fn save_collections(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    Json(collections): Json<Vec<Collection>>,
) -> ApiResult<usize> {
    let mut seen = HashSet::new();
    for collection in &collections {
        if collection.id.trim().is_empty() {
            return Err(AppError::Validation("Collection id is required".to_string()));
        }
        if !paths::is_valid_segment(&collection.id) {
            return Err(AppError::Validation(format!(
                "Collection id {:?} must not contain '/'",
                collection.id
            )));
        }
        if collection.name.trim().is_empty() {
            return Err(AppError::Validation(format!(
                "Collection {} has no name",
                collection.id
            )));
        }
        if !seen.insert(collection.id.as_str()) {
            return Err(AppError::Validation(format!(
                "Duplicate collection id {}",
                collection.id
            )));
        }
    }

    state.sync.save_collections(&session, &collections).await?;
    success(collections.len())
}

/// GET /api/binder-order
pub async fn get_binder_order(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
) -> ApiResult<BinderOrder> {
    let order = state.sync.pull_order(&session).await?;
    success(BinderOrder::new(order))
}

/// PUT /api/binder-order
pub async fn save_binder_order(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    Json(request): Json<BinderOrder>,
) -> ApiResult<BinderOrder> {
    state.sync.push_order(&session, &request.order).await?;
    success(request)
}

#[derive(Debug, Deserialize)]
pub struct SlotRequest {
    pub slot: String,
}

/// GET /api/collections/:id/removed-slots - Slots hidden on this device.
pub async fn list_removed_slots(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Vec<String>> {
    success(state.ledger.removed_slots(&id).await.into_iter().collect())
}

/// POST /api/collections/:id/removed-slots - Hide a slot on this device.
pub async fn mark_slot_removed(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<SlotRequest>,
) -> ApiResult<Vec<String>> {
    if request.slot.trim().is_empty() {
        return Err(AppError::Validation("Slot is required".to_string()));
    }
    state.ledger.mark_removed(&id, &request.slot).await;
    success(state.ledger.removed_slots(&id).await.into_iter().collect())
}

/// DELETE /api/collections/:id/removed-slots/:slot - Show a hidden slot again.
pub async fn restore_slot(
    State(state): State<AppState>,
    Path((id, slot)): Path<(String, String)>,
) -> ApiResult<Vec<String>> {
    state.ledger.restore(&id, &slot).await;
    success(state.ledger.removed_slots(&id).await.into_iter().collect())
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewModeBody {
    pub view_mode: ViewMode,
}

/// GET /api/collections/:id/view-mode
pub async fn get_view_mode(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<ViewModeBody> {
    success(ViewModeBody {
        view_mode: state.preferences.view_mode(&id).await,
    })
}

/// PUT /api/collections/:id/view-mode
pub async fn set_view_mode(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<ViewModeBody>,
) -> ApiResult<ViewModeBody> {
    state.preferences.set_view_mode(&id, request.view_mode).await;
    success(request)
}
