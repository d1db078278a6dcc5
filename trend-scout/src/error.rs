//! Application-wide error types.

use thiserror::Error;

/// Application-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Application-wide error type.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    DatabaseSqlx(#[from] sqlx::Error),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Database migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound { entity_type: String, id: String },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("{service} returned {status}: {message}")]
    Upstream {
        service: &'static str,
        status: u16,
        message: String,
    },

    #[error("Media not ready for candidate {0}")]
    MediaNotReady(String),

    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Remote file {0} did not become active in time")]
    ProcessingTimeout(String),

    #[error("Inference call failed: {0}")]
    InferenceFailed(String),

    #[error("No analysis found for candidate {0}")]
    NoAnalysisFound(String),

    #[error("Persist error: {0}")]
    Persist(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    pub fn not_found(entity_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: entity_type.into(),
            id: id.into(),
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn upstream(service: &'static str, status: u16, message: impl Into<String>) -> Self {
        Self::Upstream {
            service,
            status,
            message: message.into(),
        }
    }

    /// Whether re-running the same job could succeed.
    ///
    /// Missing rows, bad input and missing prerequisites will fail the same
    /// way on every attempt, so the queue fails them terminally.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            Self::NotFound { .. }
                | Self::Validation(_)
                | Self::Configuration(_)
                | Self::MediaNotReady(_)
                | Self::NoAnalysisFound(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_message() {
        let err = Error::not_found("Candidate", "123");
        assert_eq!(err.to_string(), "Entity not found: Candidate with id 123");
    }

    #[test]
    fn test_retryable_classification() {
        assert!(!Error::not_found("Job", "1").is_retryable());
        assert!(!Error::NoAnalysisFound("1".into()).is_retryable());
        assert!(!Error::MediaNotReady("1".into()).is_retryable());
        assert!(Error::upstream("gemini", 503, "overloaded").is_retryable());
        assert!(Error::ProcessingTimeout("files/abc".into()).is_retryable());
    }
}
