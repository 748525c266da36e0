//! Error types for tis-ingest
//!
//! `ApiError` is what HTTP handlers return. `StageError` is what a pipeline
//! stage returns; the orchestrator turns it into a result envelope instead of
//! propagating it.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use tis_common::events::ProcessingStage;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Conflict (409) - e.g., decisions already submitted
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Upload too large (413)
    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// tis-common error
    #[error("Common error: {0}")]
    Common(#[from] tis_common::Error),
}

impl ApiError {
    fn parts(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            ApiError::Conflict(_) => (StatusCode::CONFLICT, "conflict"),
            ApiError::PayloadTooLarge(_) => (StatusCode::PAYLOAD_TOO_LARGE, "payload_too_large"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
            ApiError::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "io_error"),
            ApiError::Common(tis_common::Error::NotFound(_)) => {
                (StatusCode::NOT_FOUND, "not_found")
            }
            ApiError::Common(tis_common::Error::InvalidInput(_)) => {
                (StatusCode::BAD_REQUEST, "bad_request")
            }
            ApiError::Common(_) => (StatusCode::INTERNAL_SERVER_ERROR, "common_error"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.parts();
        let message = match &self {
            ApiError::NotFound(msg)
            | ApiError::BadRequest(msg)
            | ApiError::Conflict(msg)
            | ApiError::PayloadTooLarge(msg)
            | ApiError::Internal(msg) => msg.clone(),
            other => other.to_string(),
        };

        let body = Json(json!({
            "status": "error",
            "code": code,
            "message": message,
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

/// Failure of one pipeline stage for one file
///
/// Any variant ends processing for that file. The message is user-facing,
/// `details` carries the underlying error chain for operators.
#[derive(Debug, Error)]
pub enum StageError {
    #[error("Extraction failed: {message}")]
    Extraction {
        message: String,
        details: Option<String>,
    },

    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        details: Option<String>,
    },

    #[error("Structuring failed: {message}")]
    Structuring {
        message: String,
        details: Option<String>,
    },

    #[error("Review failed: {message}")]
    Review {
        message: String,
        details: Option<String>,
    },

    #[error("Storage failed: {message}")]
    Storage {
        message: String,
        details: Option<String>,
    },
}

impl StageError {
    pub fn extraction(message: impl Into<String>) -> Self {
        StageError::Extraction {
            message: message.into(),
            details: None,
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        StageError::Validation {
            message: message.into(),
            details: None,
        }
    }

    pub fn structuring(message: impl Into<String>) -> Self {
        StageError::Structuring {
            message: message.into(),
            details: None,
        }
    }

    pub fn review(message: impl Into<String>) -> Self {
        StageError::Review {
            message: message.into(),
            details: None,
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        StageError::Storage {
            message: message.into(),
            details: None,
        }
    }

    /// Attach the error chain of `source` as operator details
    pub fn with_source(mut self, source: &(dyn std::error::Error + 'static)) -> Self {
        let chain = error_chain(source);
        match &mut self {
            StageError::Extraction { details, .. }
            | StageError::Validation { details, .. }
            | StageError::Structuring { details, .. }
            | StageError::Review { details, .. }
            | StageError::Storage { details, .. } => *details = Some(chain),
        }
        self
    }

    /// Stage the file was in when the error occurred
    pub fn stage(&self) -> ProcessingStage {
        match self {
            StageError::Extraction { .. } => ProcessingStage::Uploaded,
            StageError::Validation { .. } => ProcessingStage::Extracted,
            StageError::Structuring { .. } => ProcessingStage::Validated,
            StageError::Review { .. } => ProcessingStage::Structured,
            StageError::Storage { .. } => ProcessingStage::Reviewed,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            StageError::Extraction { message, .. }
            | StageError::Validation { message, .. }
            | StageError::Structuring { message, .. }
            | StageError::Review { message, .. }
            | StageError::Storage { message, .. } => message,
        }
    }

    pub fn details(&self) -> Option<&str> {
        match self {
            StageError::Extraction { details, .. }
            | StageError::Validation { details, .. }
            | StageError::Structuring { details, .. }
            | StageError::Review { details, .. }
            | StageError::Storage { details, .. } => details.as_deref(),
        }
    }
}

/// Render an error and all of its sources, outermost first
pub fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut parts = vec![err.to_string()];
    let mut current = err.source();
    while let Some(source) = current {
        parts.push(source.to_string());
        current = source.source();
    }
    parts.join(": caused by: ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Error)]
    #[error("outer")]
    struct Outer(#[source] std::io::Error);

    #[test]
    fn test_with_source_records_chain() {
        let inner = std::io::Error::new(std::io::ErrorKind::Other, "disk gone");
        let err = StageError::storage("insert failed").with_source(&Outer(inner));

        assert_eq!(err.message(), "insert failed");
        assert_eq!(err.details(), Some("outer: caused by: disk gone"));
        assert_eq!(err.stage(), ProcessingStage::Reviewed);
    }

    #[test]
    fn test_api_error_status_codes() {
        assert_eq!(
            ApiError::Conflict("x".into()).into_response().status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::Common(tis_common::Error::NotFound("x".into()))
                .into_response()
                .status(),
            StatusCode::NOT_FOUND
        );
    }
}
