//! HTTP-facing error type for the engine API

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// Generic error
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Engine errors keep their semantics across the HTTP boundary: a missing
/// record is 404, a rejected input is 400, everything else is 500.
impl From<museguard_common::Error> for ApiError {
    fn from(err: museguard_common::Error) -> Self {
        match err {
            museguard_common::Error::NotFound(msg) => ApiError::NotFound(msg),
            museguard_common::Error::InvalidInput(msg) => ApiError::BadRequest(msg),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg),
            ApiError::Other(ref err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                err.to_string(),
            ),
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_error_mapping() {
        let not_found: ApiError = museguard_common::Error::NotFound("Verdict 7".into()).into();
        assert!(matches!(not_found, ApiError::NotFound(_)));

        let bad: ApiError = museguard_common::Error::InvalidInput("empty".into()).into();
        assert!(matches!(bad, ApiError::BadRequest(_)));

        let internal: ApiError = museguard_common::Error::Internal("boom".into()).into();
        assert!(matches!(internal, ApiError::Internal(_)));
    }
}
