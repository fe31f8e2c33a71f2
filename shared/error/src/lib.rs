use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;

#[derive(Debug)]
pub enum AppError {
    // Database errors
    Database(sqlx::Error),
    DatabaseError(String), // String-based database error

    // Validation errors (structural input violations)
    ValidationError(String),

    // Concurrency errors
    ConcurrentRunInProgress(String), // Tenant lock already held
    LockError(String),               // Lock backend failure

    // Business logic errors
    NotFound(String),       // Generic not found with custom message
    IllegalState(String),   // Operation not allowed in current run state
    TenantMismatch(String), // Cross-tenant reference, fails closed

    // Internal errors
    InternalError(String),
    ConfigError(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Database(e) => write!(f, "Database error: {}", e),
            AppError::DatabaseError(msg) => write!(f, "Database error: {}", msg),
            AppError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            AppError::ConcurrentRunInProgress(msg) => {
                write!(f, "Concurrent run in progress: {}", msg)
            },
            AppError::LockError(msg) => write!(f, "Lock error: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::IllegalState(msg) => write!(f, "Illegal state: {}", msg),
            AppError::TenantMismatch(msg) => write!(f, "Tenant mismatch: {}", msg),
            AppError::InternalError(msg) => write!(f, "Internal error: {}", msg),
            AppError::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message, error_code) = match self {
            AppError::Database(ref e) => {
                tracing::error!("Database error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Database error".to_string(),
                    "DATABASE_ERROR",
                )
            },
            AppError::DatabaseError(ref msg) => {
                tracing::error!("Database error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Database error".to_string(),
                    "DATABASE_ERROR",
                )
            },
            AppError::ValidationError(ref msg) => {
                (StatusCode::BAD_REQUEST, msg.clone(), "VALIDATION_ERROR")
            },
            AppError::ConcurrentRunInProgress(ref msg) => {
                (StatusCode::CONFLICT, msg.clone(), "CONCURRENT_RUN_IN_PROGRESS")
            },
            AppError::LockError(ref msg) => {
                tracing::error!("Lock error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Lock error".to_string(),
                    "LOCK_ERROR",
                )
            },
            AppError::NotFound(ref msg) => (StatusCode::NOT_FOUND, msg.clone(), "NOT_FOUND"),
            AppError::IllegalState(ref msg) => (StatusCode::CONFLICT, msg.clone(), "ILLEGAL_STATE"),
            // Cross-tenant references are reported as NOT_FOUND so that the
            // existence of another tenant's entities is never disclosed.
            AppError::TenantMismatch(ref msg) => {
                tracing::warn!("Tenant mismatch rejected: {}", msg);
                (StatusCode::NOT_FOUND, "Not found".to_string(), "NOT_FOUND")
            },
            AppError::InternalError(ref msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal error".to_string(),
                    "INTERNAL_ERROR",
                )
            },
            AppError::ConfigError(ref msg) => {
                tracing::error!("Config error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Configuration error".to_string(),
                    "CONFIG_ERROR",
                )
            },
        };

        let body = Json(json!({
            "error": error_message,
            "code": error_code,
        }));

        (status, body).into_response()
    }
}

// From implementations for common error types
impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Database(err)
    }
}

impl From<std::env::VarError> for AppError {
    fn from(err: std::env::VarError) -> Self {
        AppError::ConfigError(err.to_string())
    }
}
