//! API route modules.
//!
//! Organizes routes by resource type.

pub mod candidates;
pub mod health;
pub mod pipeline;
pub mod queue;

use axum::Router;
use bytes::Bytes;
use serde::de::DeserializeOwned;

use crate::api::error::ApiError;
use crate::api::middleware::api_key_auth;
use crate::api::server::AppState;

/// Create the main API router with all routes.
pub fn create_router(state: AppState) -> Router {
    let queue = queue::router().route_layer(axum::middleware::from_fn_with_state(
        state.auth.clone(),
        api_key_auth,
    ));

    Router::new()
        .merge(pipeline::router())
        .nest("/queue", queue)
        .nest("/candidates", candidates::router())
        .nest("/health", health::router())
        .with_state(state)
}

/// Parse a JSON body; an empty body yields `T::default()`.
pub(crate) fn parse_body<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| ApiError::validation(format!("Invalid JSON body: {e}")))
}

/// A required, non-blank string field.
pub(crate) fn required(value: Option<String>, field: &str) -> Result<String, ApiError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::validation(format!("{field} is required")))
}
