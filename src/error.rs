use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    Json,
};
use rusqlite::ErrorCode;
use serde::Serialize;
use thiserror::Error;

/// Human-readable messages shared between the engine, handlers and tests.
pub mod msg {
    pub const LICENSE_NOT_FOUND: &str = "License not found";
    pub const EMAIL_EMPTY: &str = "Email cannot be empty";
    pub const INVALID_EMAIL_FORMAT: &str = "Invalid email format";
    pub const INVALID_CODE_FORMAT: &str = "License code must look like XXXX-XXXX-XXXX-XXXX";
    pub const DEVICE_ID_EMPTY: &str = "Device id cannot be empty";
    pub const DEVICE_ID_TOO_LONG: &str = "Device id is too long";
    pub const CODE_GENERATION_EXHAUSTED: &str = "Could not generate a unique license code";
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("License expired at {expires_at}")]
    Expired { expires_at: i64 },

    #[error("Device limit reached ({limit}/{limit})")]
    DeviceLimit { limit: usize },

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// True for storage failures, the only class a caller may retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::Database(_) | AppError::Pool(_))
    }

    /// True when SQLite refused the write lock (busy or locked) and the
    /// transaction can be replayed from the start.
    pub fn is_lock_conflict(&self) -> bool {
        match self {
            AppError::Database(rusqlite::Error::SqliteFailure(e, _)) => matches!(
                e.code,
                ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked
            ),
            _ => false,
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, details) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "Not found", Some(msg.clone())),
            AppError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, "Bad request", Some(msg.clone()))
            }
            AppError::Expired { expires_at } => (
                StatusCode::GONE,
                "License expired",
                Some(format!("expired at {}", expires_at)),
            ),
            AppError::DeviceLimit { limit } => (
                StatusCode::FORBIDDEN,
                "Device limit reached",
                Some(format!("{} devices already registered", limit)),
            ),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized", None),
            AppError::Database(e) => {
                tracing::error!("Database error: {}", e);
                (StatusCode::SERVICE_UNAVAILABLE, "Storage unavailable", None)
            }
            AppError::Pool(e) => {
                tracing::error!("Pool error: {}", e);
                (StatusCode::SERVICE_UNAVAILABLE, "Storage unavailable", None)
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error", None)
            }
        };

        let body = ErrorResponse {
            error: error.to_string(),
            details,
        };

        let mut response = (status, Json(body)).into_response();
        if self.is_retryable() {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from_static(RETRY_AFTER_SECS));
        }
        response
    }
}

/// Hint sent with storage failures; the write lock is normally released
/// within a second.
const RETRY_AFTER_SECS: &str = "1";

pub type Result<T> = std::result::Result<T, AppError>;
