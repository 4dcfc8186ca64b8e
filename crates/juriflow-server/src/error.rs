//! HTTP error surface.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use juriflow::error::Error as CoreError;

/// Error type for the HTTP layer.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ApiError {
    /// Bad request body or parameters
    #[error("Invalid request: {0}")]
    Validation(String),

    /// File type not accepted by this endpoint
    #[error("Unsupported media type: {0}")]
    UnsupportedMedia(String),

    /// Upload exceeds the size limit
    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    /// Unknown identifier
    #[error("Not found: {0}")]
    NotFound(String),

    /// Result polled before the job reached a terminal state
    #[error("Result not ready: {0}")]
    TooEarly(String),

    /// The background job itself failed
    #[error("Job failed: {0}")]
    JobFailed(String),

    /// Anything else
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error response structure for the API
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error_message: String,
    pub status: u16,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::UnsupportedMedia(msg) => (StatusCode::UNSUPPORTED_MEDIA_TYPE, msg),
            ApiError::PayloadTooLarge(msg) => (StatusCode::PAYLOAD_TOO_LARGE, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::TooEarly(msg) => (StatusCode::TOO_EARLY, msg),
            ApiError::JobFailed(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        let body = Json(ErrorResponse {
            error_message: message,
            status: status.as_u16(),
        });
        (status, body).into_response()
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation(msg) => Self::Validation(msg),
            CoreError::NotFound(msg) => Self::NotFound(msg),
            CoreError::TooEarly(msg) => Self::TooEarly(msg),
            CoreError::UnsupportedType(msg) => Self::UnsupportedMedia(msg),
            other => Self::Internal(other.to_string()),
        }
    }
}

/// Result type alias for handlers.
pub type Result<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_maps_to_400() {
        let response = ApiError::Validation("bad prompt".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn too_early_maps_to_425() {
        let response = ApiError::TooEarly("still running".into()).into_response();
        assert_eq!(response.status(), StatusCode::TOO_EARLY);
    }

    #[test]
    fn unsupported_media_maps_to_415() {
        let response = ApiError::UnsupportedMedia(".exe".into()).into_response();
        assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    }

    #[test]
    fn payload_too_large_maps_to_413() {
        let response = ApiError::PayloadTooLarge("51 MB".into()).into_response();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[test]
    fn core_errors_translate() {
        assert!(matches!(
            ApiError::from(CoreError::validation("x")),
            ApiError::Validation(_)
        ));
        assert!(matches!(
            ApiError::from(CoreError::not_found("x")),
            ApiError::NotFound(_)
        ));
        assert!(matches!(
            ApiError::from(CoreError::too_early("x")),
            ApiError::TooEarly(_)
        ));
        assert!(matches!(
            ApiError::from(CoreError::upstream("x")),
            ApiError::Internal(_)
        ));
    }
}
