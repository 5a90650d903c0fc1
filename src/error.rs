//!
//! # Custom Error Handling
//!
//! This module defines `AppError`, the error type returned by every handler.
//! Each variant maps to one HTTP status and is rendered as a JSON body of the
//! form `{"error": "..."}`, so no internal fault ever reaches a client raw.
//!
//! `From` conversions exist for the lower-level errors handlers meet
//! (`StoreError`, `sqlx::Error`, `validator::ValidationErrors`,
//! `jsonwebtoken::errors::Error`, `bcrypt::BcryptError`) so `?` does the
//! translation.

use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use serde_json::json;
use thiserror::Error;
use validator::ValidationErrors;

use crate::store::StoreError;

/// Represents all possible errors that can occur within the application.
#[derive(Debug, Error)]
pub enum AppError {
    /// Malformed or missing input (HTTP 400).
    #[error("Bad Request: {0}")]
    BadRequest(String),
    /// Input that deserialized but failed `validator` rules (HTTP 400).
    #[error("Validation Error: {0}")]
    ValidationError(String),
    /// Authentication required but absent (HTTP 401).
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    /// A credential was presented but is invalid or expired (HTTP 403).
    #[error("Forbidden: {0}")]
    Forbidden(String),
    /// The resource does not exist or is not visible to the caller (HTTP 404).
    #[error("Not Found: {0}")]
    NotFound(String),
    /// Unexpected server-side failure (HTTP 500).
    #[error("Internal Server Error: {0}")]
    InternalServerError(String),
    /// Failure inside the persistence layer (HTTP 500).
    /// The detail is logged, never sent to the client.
    #[error("Database Error: {0}")]
    DatabaseError(String),
}

impl AppError {
    fn client_message(&self) -> &str {
        match self {
            AppError::BadRequest(msg)
            | AppError::ValidationError(msg)
            | AppError::Unauthorized(msg)
            | AppError::Forbidden(msg)
            | AppError::NotFound(msg)
            | AppError::InternalServerError(msg) => msg,
            AppError::DatabaseError(_) => "Server error",
        }
    }
}

/// Converts `AppError` variants into JSON `HttpResponse` objects.
impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) | AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InternalServerError(_) | AppError::DatabaseError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        if let AppError::DatabaseError(detail) = self {
            log::error!("database failure: {}", detail);
        }
        HttpResponse::build(self.status_code()).json(json!({
            "error": self.client_message()
        }))
    }
}

/// Store failures. A duplicate email is a client conflict; everything else
/// is a transient server error.
impl From<StoreError> for AppError {
    fn from(error: StoreError) -> AppError {
        match error {
            StoreError::DuplicateEmail => AppError::BadRequest("Email already exists".into()),
            StoreError::Database(e) => AppError::DatabaseError(e.to_string()),
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(error: sqlx::Error) -> AppError {
        match error {
            sqlx::Error::RowNotFound => AppError::NotFound("Record not found".into()),
            _ => AppError::DatabaseError(error.to_string()),
        }
    }
}

/// The detailed validation messages are preserved.
impl From<ValidationErrors> for AppError {
    fn from(error: ValidationErrors) -> AppError {
        AppError::ValidationError(error.to_string())
    }
}

impl From<jsonwebtoken::errors::Error> for AppError {
    fn from(error: jsonwebtoken::errors::Error) -> AppError {
        AppError::InternalServerError(format!("Failed to process token: {}", error))
    }
}

impl From<bcrypt::BcryptError> for AppError {
    fn from(error: bcrypt::BcryptError) -> AppError {
        AppError::InternalServerError(error.to_string())
    }
}
