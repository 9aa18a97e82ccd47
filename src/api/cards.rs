//! Card display endpoint.

use axum::extract::{Path, Query, State};
use serde::Deserialize;

use super::{success, ApiResult};
use crate::display::CardDisplay;
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct CardQuery {
    /// Comma separated variants the app already knows for the card
    #[serde(default)]
    pub variants: Option<String>,
}

/// GET /api/cards/:id - Display data for one card.
pub async fn get_card(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<CardQuery>,
) -> ApiResult<CardDisplay> {
    let variants: Vec<String> = query
        .variants
        .as_deref()
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect();

    success(state.display.resolve(&id, &variants).await)
}
