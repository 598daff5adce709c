//! Error types for Libris server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Stable numeric error codes exposed to API clients
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ErrorCode {
    Failure = 1,
    NotAuthenticated = 2,
    NotAuthorized = 3,
    DbFailure = 4,
    NoSuchEntity = 5,
    BadValue = 6,
    StateConflict = 7,
}

/// Main application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Precondition of a state transition was violated (book already reserved,
    /// reservation already returned, duplicate catalog entry)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Transient write conflict detected by the store. Retried by the
    /// transactional scope and never surfaced as-is to callers.
    #[error("Transaction conflict: {0}")]
    TransactionConflict(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// Whether the error is a transient store failure worth retrying
    pub fn is_transient(&self) -> bool {
        match self {
            AppError::TransactionConflict(_) => true,
            AppError::Database(sqlx::Error::Database(db)) => {
                // serialization_failure, deadlock_detected
                matches!(db.code().as_deref(), Some("40001") | Some("40P01"))
            }
            _ => false,
        }
    }
}

/// Error response body
#[derive(Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub code: u32,
    pub error: String,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Authentication(msg) => {
                (StatusCode::UNAUTHORIZED, ErrorCode::NotAuthenticated, msg.clone())
            }
            AppError::Forbidden(msg) => {
                (StatusCode::FORBIDDEN, ErrorCode::NotAuthorized, msg.clone())
            }
            AppError::NotFound(msg) => {
                (StatusCode::NOT_FOUND, ErrorCode::NoSuchEntity, msg.clone())
            }
            AppError::InvalidInput(msg) => {
                (StatusCode::BAD_REQUEST, ErrorCode::BadValue, msg.clone())
            }
            AppError::Conflict(msg) | AppError::TransactionConflict(msg) => {
                (StatusCode::CONFLICT, ErrorCode::StateConflict, msg.clone())
            }
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorCode::DbFailure,
                    "Database error".to_string(),
                )
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorCode::Failure,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = Json(ErrorResponse {
            code: code as u32,
            error: format!("{:?}", code),
            message,
        });

        (status, body).into_response()
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::InvalidInput(errors.to_string())
    }
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;
