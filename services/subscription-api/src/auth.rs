//! API key authentication

use axum::extract::{Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;
use subtle::ConstantTimeEq;

use crate::error::ApiError;
use crate::state::AppState;

/// Headers accepted for the shared API key, checked in order
pub const API_KEY_HEADERS: [&str; 2] = ["api_key", "x-api-key"];

/// Reject requests that do not carry the configured API key
pub async fn require_api_key(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(provided) = presented_key(request.headers()) else {
        tracing::debug!(path = %request.uri().path(), "Missing API key");
        return Err(ApiError::Unauthorized);
    };

    // Constant-time comparison
    let valid: bool = provided
        .as_bytes()
        .ct_eq(state.config.api_key.as_bytes())
        .into();
    if !valid {
        tracing::warn!(path = %request.uri().path(), "Invalid API key");
        return Err(ApiError::Unauthorized);
    }

    Ok(next.run(request).await)
}

fn presented_key(headers: &HeaderMap) -> Option<&str> {
    API_KEY_HEADERS
        .iter()
        .find_map(|name| headers.get(*name))
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|key| !key.is_empty())
}
