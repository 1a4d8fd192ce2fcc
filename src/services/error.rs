//! Error handling for route handlers
//!
//! `ApiError` is the request-level error taxonomy: every handler failure maps
//! to exactly one variant, and the variant determines the HTTP status. Business
//! outcomes (a target not being ready) are never errors - they come back as
//! `scheduled_pending` with issues attached.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed input (empty caption, bad month string). Never retried.
    #[error("{0}")]
    Validation(String),

    /// Unknown id within the caller's scope.
    #[error("not found")]
    NotFound,

    /// Concurrent mutation detected, or the post is in a state that rejects
    /// the requested mutation. Caller retries with fresh data.
    #[error("{0}")]
    Conflict(String),

    /// Connection registry or store unreachable while classifying. The
    /// entity's persisted state is left untouched.
    #[error("dependency unavailable: {0}")]
    Dependency(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound => (StatusCode::NOT_FOUND, "not found".to_string()),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::Dependency(msg) => {
                eprintln!("[api] dependency error: {}", msg);
                (StatusCode::BAD_GATEWAY, "upstream dependency unavailable".to_string())
            }
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized".to_string()),
            ApiError::Database(sqlx::Error::RowNotFound) => {
                (StatusCode::NOT_FOUND, "not found".to_string())
            }
            ApiError::Database(e) => {
                eprintln!("[api] database error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string())
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// Extension trait for logging errors and converting to StatusCode
///
/// Used by the auth/session routes that still speak raw `StatusCode`; the
/// scheduling surface returns `ApiError` instead.
pub trait LogErr<T> {
    /// Log error with context and return INTERNAL_SERVER_ERROR
    fn log_500(self, context: &str) -> Result<T, StatusCode>;

    /// Log error with context and return a custom StatusCode
    fn log_status(self, context: &str, status: StatusCode) -> Result<T, StatusCode>;
}

impl<T, E: std::fmt::Display> LogErr<T> for Result<T, E> {
    fn log_500(self, context: &str) -> Result<T, StatusCode> {
        self.map_err(|e| {
            eprintln!("{}: {}", context, e);
            StatusCode::INTERNAL_SERVER_ERROR
        })
    }

    fn log_status(self, context: &str, status: StatusCode) -> Result<T, StatusCode> {
        self.map_err(|e| {
            eprintln!("{}: {}", context, e);
            status
        })
    }
}
