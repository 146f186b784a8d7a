// src/api/error.rs
// Centralized error handling for HTTP API responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;
use tracing::error;

use crate::error::{StorageError, VigilError};

/// Standard API error response format
#[derive(Debug)]
pub struct ApiError {
    pub message: String,
    pub status_code: StatusCode,
}

impl ApiError {
    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status_code: StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status_code: StatusCode::BAD_REQUEST,
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status_code: StatusCode::UNAUTHORIZED,
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ApiError {}

impl From<VigilError> for ApiError {
    fn from(e: VigilError) -> Self {
        error!("request failed: {}", e);
        ApiError::internal(e.to_string())
    }
}

impl From<StorageError> for ApiError {
    fn from(e: StorageError) -> Self {
        error!("storage failure: {}", e);
        ApiError::internal(e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({
            "status": "error",
            "message": self.message,
        });
        (self.status_code, Json(body)).into_response()
    }
}

/// Result type alias for API operations
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_creation() {
        let error = ApiError::internal("test error");
        assert_eq!(error.status_code, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(error.message, "test error");

        let error = ApiError::unauthorized("key required");
        assert_eq!(error.status_code, StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_storage_error_maps_to_internal() {
        let storage = StorageError::Io {
            op: "read",
            path: "/tmp/x".into(),
            source: std::io::Error::other("boom"),
        };
        let error: ApiError = storage.into();
        assert_eq!(error.status_code, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(error.message.contains("read"));
    }
}
