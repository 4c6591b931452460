//! Error types for remusic-server
//!
//! Validation and not-found errors become 4xx responses. Anything else is a
//! 500 with the error message. Pipeline failures never surface here: they are
//! recorded on the score row and read back by polling clients.

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
    #[error("{0}")]
    NotFound(String),

    /// Invalid request (400)
    #[error("{0}")]
    BadRequest(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed or oversized multipart body
    #[error("Invalid upload: {0}")]
    Multipart(#[from] axum::extract::multipart::MultipartError),

    /// Store or configuration error from remusic-common
    #[error("{0}")]
    Common(#[from] remusic_common::Error),
}

impl ApiError {
    /// 404 for a score id that does not exist
    pub fn score_not_found() -> Self {
        ApiError::NotFound("Score not found".to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code) = match &self {
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ApiError::Multipart(e) => (e.status(), "INVALID_UPLOAD"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
            ApiError::Io(_) | ApiError::Common(remusic_common::Error::Io(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "IO_ERROR")
            }
            ApiError::Common(remusic_common::Error::Database(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "DATABASE_ERROR")
            }
            ApiError::Common(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        };

        let message = self.to_string();
        if status.is_server_error() {
            tracing::error!(code = error_code, error = %message, "Request failed");
        }

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
