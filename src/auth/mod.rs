pub mod extractors;
pub mod middleware;
pub mod password;
pub mod token;

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::PublicUser;

// Re-export necessary items
pub use extractors::AuthenticatedUser;
pub use middleware::AuthMiddleware;
pub use password::{hash_password, verify_password};
pub use token::{issue_random_token, SessionClaims, TokenIssuer};

/// Payload of a signup request.
#[derive(Debug, Deserialize, Validate)]
pub struct SignupRequest {
    #[validate(email)]
    pub email: String,
    /// At least 6 characters, the same floor a password reset enforces.
    #[validate(length(min = 6))]
    pub password: String,
    /// Display name; defaults to the local part of the email.
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
}

impl SignupRequest {
    pub fn display_name(&self) -> String {
        self.name.clone().unwrap_or_else(|| {
            self.email
                .split('@')
                .next()
                .unwrap_or_default()
                .to_string()
        })
    }
}

/// Payload of a login request.
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1))]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
}

/// Query string of the email verification link.
#[derive(Debug, Deserialize)]
pub struct VerifyEmailQuery {
    pub token: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ForgotPasswordRequest {
    #[validate(length(min = 1))]
    pub email: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ResetPasswordRequest {
    #[validate(length(min = 1))]
    pub token: String,
    #[serde(rename = "newPassword")]
    #[validate(length(
        min = 6,
        message = "Password must be at least 6 characters"
    ))]
    pub new_password: String,
}

/// Response after a successful signup or login.
#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    /// The session JWT.
    pub token: String,
    pub user: PublicUser,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// A body carrying only a human-readable message.
#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
