//! API error types.

use crate::engine::EngineError;
use crate::metrics::record_upload_error;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use berth_metadata::MetadataError;
use serde::Serialize;

/// API error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
}

/// API error type.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Get the error code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "bad_request",
            Self::NotFound(_) => "not_found",
            Self::Internal(_) => "internal_error",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<EngineError> for ApiError {
    fn from(e: EngineError) -> Self {
        match e {
            EngineError::Validation(msg) => Self::BadRequest(msg),
            // Quota rejection is a specialization of validation
            quota @ EngineError::QuotaExceeded { .. } => Self::BadRequest(quota.to_string()),
            EngineError::NotFound => Self::NotFound("upload not found".to_string()),
            EngineError::Metadata(MetadataError::NotFound(id)) => {
                Self::NotFound(format!("upload not found: {id}"))
            }
            EngineError::Storage(err) => Self::Internal(err.to_string()),
            EngineError::Metadata(err) => Self::Internal(err.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        record_upload_error(self.code());
        let status = self.status_code();
        let body = ErrorResponse {
            code: self.code().to_string(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// Result type for API handlers.
pub type ApiResult<T> = std::result::Result<T, ApiError>;
