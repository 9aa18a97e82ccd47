//! REST API module.
//!
//! Thin handlers over the sync core, following the app's JSON envelope.

mod cards;
mod catalog;
mod collections;
mod overrides;

pub use cards::*;
pub use catalog::*;
pub use collections::*;
pub use overrides::*;

use std::convert::Infallible;

use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::errors::AppError;
use crate::sync::Session;

/// Header carrying the signed-in user id, set by the app's auth layer.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Success response envelope.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn new(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

/// Response type that can be either success or error.
pub type ApiResult<T> = Result<ApiResponse<T>, AppError>;

/// Create a successful API response.
pub fn success<T: Serialize>(data: T) -> ApiResult<T> {
    Ok(ApiResponse::new(data))
}

/// The caller's session. A missing or blank `x-user-id` is anonymous.
#[derive(Debug, Clone)]
pub struct CurrentSession(pub Session);

impl<S: Send + Sync> FromRequestParts<S> for CurrentSession {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let session = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|uid| !uid.is_empty())
            .map(Session::signed_in)
            .unwrap_or_else(Session::anonymous);
        Ok(CurrentSession(session))
    }
}
