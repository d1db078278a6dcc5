//! API key authentication for the queue-management endpoints.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

use crate::api::error::ApiError;

/// API key authentication configuration.
#[derive(Debug, Clone)]
pub struct ApiKeyAuth {
    /// Valid API keys; empty disables the check
    api_keys: Arc<Vec<String>>,
    /// Header name for API key
    header_name: String,
}

impl ApiKeyAuth {
    /// Create a new API key authenticator.
    pub fn new(api_keys: Vec<String>) -> Self {
        Self {
            api_keys: Arc::new(api_keys),
            header_name: "X-API-Key".to_string(),
        }
    }

    /// Check if an API key is valid.
    pub fn is_valid(&self, key: &str) -> bool {
        self.api_keys.iter().any(|k| k == key)
    }

    pub fn is_enabled(&self) -> bool {
        !self.api_keys.is_empty()
    }
}

impl Default for ApiKeyAuth {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

/// Middleware function for API key authentication.
pub async fn api_key_auth(
    State(auth): State<ApiKeyAuth>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    // Skip auth if no API keys are configured
    if !auth.is_enabled() {
        return Ok(next.run(request).await);
    }

    let api_key = request
        .headers()
        .get(auth.header_name.as_str())
        .and_then(|v| v.to_str().ok());

    match api_key {
        Some(key) if auth.is_valid(key) => Ok(next.run(request).await),
        Some(_) => {
            tracing::warn!("Invalid API key provided");
            Err(ApiError::unauthorized("Invalid API key"))
        }
        None => {
            tracing::warn!("Missing API key in request");
            Err(ApiError::unauthorized("Missing API key"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_validation() {
        let auth = ApiKeyAuth::new(vec!["secret".to_string()]);
        assert!(auth.is_enabled());
        assert!(auth.is_valid("secret"));
        assert!(!auth.is_valid("other"));
        assert!(!ApiKeyAuth::default().is_enabled());
    }
}
