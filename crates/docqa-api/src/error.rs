//! API error types and JSON error response formatting.
//!
//! ApiError maps internal errors to HTTP status codes with a consistent
//! `{ "error", "message" }` body.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use docqa_chat::ChatError;
use docqa_core::error::DocqaError;

/// JSON error response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Machine-readable error code (e.g., "bad_request", "not_found").
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// API error type that maps to HTTP status codes and JSON responses.
#[derive(Debug)]
pub enum ApiError {
    /// 400 - missing or invalid parameters.
    BadRequest(String),
    /// 404 - resource does not exist, including a missing index.
    NotFound(String),
    /// 500 - unexpected server error.
    Internal(String),
    /// 503 - the service is shutting down.
    ServiceUnavailable(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "Request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg)
            }
            ApiError::ServiceUnavailable(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, "service_unavailable", msg)
            }
        };

        let body = ErrorBody {
            error: error_code.to_string(),
            message,
            details: None,
        };

        (status, Json(body)).into_response()
    }
}

impl From<DocqaError> for ApiError {
    fn from(err: DocqaError) -> Self {
        match err {
            DocqaError::NotFound(msg) => ApiError::NotFound(msg),
            DocqaError::IndexUnavailable(msg) => {
                ApiError::NotFound(format!("vector index unavailable: {}", msg))
            }
            DocqaError::InvalidInput(msg) | DocqaError::Config(msg) => ApiError::BadRequest(msg),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<ChatError> for ApiError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::EmptyQuestion | ChatError::QuestionTooLong(_) => {
                ApiError::BadRequest(err.to_string())
            }
            ChatError::IndexUnavailable(_) => ApiError::NotFound(err.to_string()),
            ChatError::ShuttingDown => ApiError::ServiceUnavailable(err.to_string()),
            ChatError::StorageError(_) => ApiError::Internal(err.to_string()),
        }
    }
}
