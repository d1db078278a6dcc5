//! API error handling.
//!
//! Every failure is answered with a JSON `{error, code}` body.

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::error::Error;

/// API error response body.
#[derive(Debug, Serialize)]
pub struct ApiErrorResponse {
    /// Human-readable error message
    pub error: String,
    /// Error code for programmatic handling
    pub code: String,
}

/// API error type that can be converted to HTTP responses.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: String,
    pub message: String,
}

impl ApiError {
    /// Create a new API error.
    pub fn new(status: StatusCode, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            code: code.into(),
            message: message.into(),
        }
    }

    /// Create a 400 validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "VALIDATION_ERROR", message)
    }

    /// Create a 401 Unauthorized error.
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", message)
    }

    /// Create a 404 Not Found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", message)
    }

    /// Create a 502 Bad Gateway error.
    pub fn bad_gateway(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR", message)
    }

    /// Create a 500 Internal Server Error.
    pub fn internal(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, code, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiErrorResponse {
            error: self.message,
            code: self.code,
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        match err {
            Error::NotFound { entity_type, id } => {
                ApiError::not_found(format!("{} with id '{}' not found", entity_type, id))
            }
            Error::Validation(msg) => ApiError::validation(msg),
            Error::MediaNotReady(_) => {
                ApiError::new(StatusCode::BAD_REQUEST, "MEDIA_NOT_READY", err.to_string())
            }
            Error::NoAnalysisFound(_) => {
                ApiError::new(StatusCode::BAD_REQUEST, "NO_ANALYSIS_FOUND", err.to_string())
            }
            Error::Unauthorized(msg) => ApiError::unauthorized(msg),
            Error::Upstream { .. } | Error::Http(_) => {
                tracing::warn!("Upstream error: {}", err);
                ApiError::bad_gateway(err.to_string())
            }
            Error::ProcessingTimeout(_) => ApiError::internal("PROCESSING_TIMEOUT", err.to_string()),
            Error::UploadFailed(_) => ApiError::internal("UPLOAD_FAILED", err.to_string()),
            Error::InferenceFailed(_) => ApiError::internal("INFERENCE_FAILED", err.to_string()),
            Error::Persist(msg) => {
                tracing::error!("Persist error: {}", msg);
                ApiError::internal("PERSIST_ERROR", "Failed to persist result")
            }
            Error::DatabaseSqlx(e) => {
                tracing::error!("Database error: {}", e);
                ApiError::internal("DATABASE_ERROR", "Database error occurred")
            }
            Error::Database(msg) => {
                tracing::error!("Database error: {}", msg);
                ApiError::internal("DATABASE_ERROR", "Database error occurred")
            }
            _ => {
                tracing::error!("Unexpected error: {}", err);
                ApiError::internal("INTERNAL_ERROR", "An unexpected error occurred")
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::validation(rejection.body_text())
    }
}

/// Result type for API handlers.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (Error::not_found("Candidate", "1"), StatusCode::NOT_FOUND),
            (Error::validation("candidateId is required"), StatusCode::BAD_REQUEST),
            (Error::MediaNotReady("1".into()), StatusCode::BAD_REQUEST),
            (Error::NoAnalysisFound("1".into()), StatusCode::BAD_REQUEST),
            (Error::Unauthorized("bad key".into()), StatusCode::UNAUTHORIZED),
            (Error::upstream("gemini", 503, "busy"), StatusCode::BAD_GATEWAY),
            (
                Error::ProcessingTimeout("files/a".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (Error::Persist("disk".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            let api: ApiError = err.into();
            assert_eq!(api.status, status, "{}", api.message);
        }
    }

    #[test]
    fn test_not_found_message() {
        let api: ApiError = Error::not_found("Candidate", "123").into();
        assert_eq!(api.code, "NOT_FOUND");
        assert!(api.message.contains("123"));
    }
}
