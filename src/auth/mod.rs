//! PSK authentication for the localhost bridge.
//!
//! Only the app process holding the key may call the API. Keys are compared
//! in constant time.

use axum::{
    extract::Request,
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use subtle::ConstantTimeEq;

use crate::errors::{AppError, ErrorResponse};

/// Header name for the API key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Reject requests that do not carry `expected_psk`. With no key configured
/// every request passes.
pub async fn psk_auth_layer(
    expected_psk: Option<String>,
    request: Request,
    next: Next,
) -> Response {
    let Some(expected) = expected_psk else {
        return next.run(request).await;
    };

    match presented_key(request.headers()) {
        Some(key) if keys_match(key, &expected) => next.run(request).await,
        Some(_) => unauthorized_response("Invalid API key"),
        None => unauthorized_response("Missing API key"),
    }
}

/// The key from `x-api-key`, else from a bearer token.
fn presented_key(headers: &HeaderMap) -> Option<&str> {
    if let Some(key) = headers.get(API_KEY_HEADER).and_then(|v| v.to_str().ok()) {
        return Some(key);
    }
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
}

fn keys_match(provided: &str, expected: &str) -> bool {
    provided.as_bytes().ct_eq(expected.as_bytes()).into()
}

fn unauthorized_response(message: &str) -> Response {
    tracing::warn!("Rejected API request: {}", message);
    let body = ErrorResponse::new(&AppError::Unauthorized(message.to_string()));
    (StatusCode::UNAUTHORIZED, Json(body)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_keys_match() {
        assert!(keys_match("card-key-123", "card-key-123"));
        assert!(!keys_match("card-key-123", "card-key-124"));
        assert!(!keys_match("short", "much-longer-key"));
        assert!(keys_match("", ""));
    }

    #[test]
    fn test_presented_key_prefers_api_key_header() {
        let mut headers = HeaderMap::new();
        assert_eq!(presented_key(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer from-bearer"));
        assert_eq!(presented_key(&headers), Some("from-bearer"));

        headers.insert(API_KEY_HEADER, HeaderValue::from_static("from-header"));
        assert_eq!(presented_key(&headers), Some("from-header"));
    }

    #[tokio::test]
    async fn test_unauthorized_body_uses_error_envelope() {
        let response = unauthorized_response("Invalid API key");
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["success"], false);
        assert_eq!(body["error"]["code"], "UNAUTHORIZED");
        assert_eq!(body["error"]["message"], "Invalid API key");
    }
}
