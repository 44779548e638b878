//! HTTP error mapping for ivts-ts

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed request body or parameters (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Service-layer error, mapped by kind
    #[error(transparent)]
    Service(#[from] ivts_common::Error),
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl ApiError {
    fn parts(&self) -> (StatusCode, &'static str, bool) {
        use ivts_common::Error;

        match self {
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", false),
            ApiError::Service(err) => {
                let retryable = err.is_retryable();
                match err {
                    Error::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND", retryable),
                    Error::AlreadyFinalized { .. } => {
                        (StatusCode::CONFLICT, "ALREADY_FINALIZED", retryable)
                    }
                    Error::InvalidInput(_) => (StatusCode::BAD_REQUEST, "INVALID_INPUT", retryable),
                    Error::StorageUnavailable(_) => (
                        StatusCode::SERVICE_UNAVAILABLE,
                        "STORAGE_UNAVAILABLE",
                        retryable,
                    ),
                    Error::RenderFailure(_) => {
                        (StatusCode::BAD_GATEWAY, "RENDER_FAILURE", retryable)
                    }
                    Error::Io(_) | Error::Config(_) | Error::Internal(_) => (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "INTERNAL_ERROR",
                        retryable,
                    ),
                }
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, retryable) = self.parts();

        if status.is_server_error() {
            tracing::error!(code = error_code, "Request failed: {}", self);
        }

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": self.to_string(),
                "retryable": retryable,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
