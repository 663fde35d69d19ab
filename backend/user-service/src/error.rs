use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use thiserror::Error;

use crate::db::UserStoreError;
use crate::response;
use crate::security::PasswordError;

pub type Result<T> = std::result::Result<T, AppError>;

pub const INVALID_REQUEST: &str = "Invalid request data";

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    NotFound(String),

    /// Detail is logged, the caller only sees the label
    #[error("Database error")]
    Database(#[source] sqlx::Error),

    #[error("Database error")]
    DatabaseTimeout(std::time::Duration),

    #[error("{0}")]
    Internal(String),
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Database(_) | AppError::DatabaseTimeout(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        match self {
            AppError::Database(e) => tracing::error!(error = %e, "database operation failed"),
            AppError::DatabaseTimeout(limit) => {
                tracing::error!(timeout_ms = limit.as_millis() as u64, "database operation timed out")
            }
            _ => {}
        }
        response::failure(self.status_code(), &self.to_string())
    }
}

impl From<UserStoreError> for AppError {
    fn from(err: UserStoreError) -> Self {
        match err {
            UserStoreError::UsernameTaken => {
                AppError::BadRequest("Username already exists".to_string())
            }
            UserStoreError::NotFound => AppError::NotFound("User not found".to_string()),
            UserStoreError::Database(e) => AppError::Database(e),
            UserStoreError::Timeout(limit) => AppError::DatabaseTimeout(limit),
        }
    }
}

impl From<PasswordError> for AppError {
    fn from(err: PasswordError) -> Self {
        tracing::error!(error = %err, "password hashing failed");
        AppError::Internal("Failed to process password".to_string())
    }
}

impl From<actix_web::error::BlockingError> for AppError {
    fn from(_: actix_web::error::BlockingError) -> Self {
        AppError::Internal("Internal server error".to_string())
    }
}

/// Report the first failing field's message, in field-name order
impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
        fields.sort_by(|(a, _), (b, _)| a.cmp(b));

        let message = fields
            .into_iter()
            .flat_map(|(_, errs)| errs.iter())
            .find_map(|e| e.message.as_ref().map(|m| m.to_string()))
            .unwrap_or_else(|| INVALID_REQUEST.to_string());

        AppError::BadRequest(message)
    }
}
