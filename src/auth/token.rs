use crate::error::AppError;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};

/// Lifetime of a session token.
pub const SESSION_TTL_HOURS: i64 = 24;

/// Random bytes behind a verification or reset token (hex-encoded to 64 chars).
const RANDOM_TOKEN_BYTES: usize = 32;

/// Represents the claims encoded within a session JWT.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct SessionClaims {
    /// Subject of the token: the user's id.
    pub sub: i32,
    pub email: String,
    /// Issued-at timestamp (seconds since epoch).
    pub iat: i64,
    /// Expiration timestamp (seconds since epoch).
    pub exp: i64,
}

/// Signs and verifies session tokens with the process-wide secret.
///
/// Verification is stateless: it never consults the credential store, so a
/// user changed after issuance stays trusted until the token expires. There
/// is no revocation list.
#[derive(Clone)]
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl TokenIssuer {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::default();
        validation.leeway = 0;
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// Issues a session token for `user_id`/`email`, valid for 24 hours.
    pub fn issue_session(&self, user_id: i32, email: &str) -> Result<String, AppError> {
        self.issue_session_at(user_id, email, Utc::now())
    }

    /// Issues a session token as if the current time were `issued_at`.
    pub fn issue_session_at(
        &self,
        user_id: i32,
        email: &str,
        issued_at: DateTime<Utc>,
    ) -> Result<String, AppError> {
        let claims = SessionClaims {
            sub: user_id,
            email: email.to_string(),
            iat: issued_at.timestamp(),
            exp: (issued_at + Duration::hours(SESSION_TTL_HOURS)).timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| AppError::InternalServerError(format!("Failed to generate token: {}", e)))
    }

    /// Verifies the signature and expiry of a session token.
    ///
    /// A token is accepted up to and including its `exp` second and
    /// rejected strictly after.
    pub fn verify_session(&self, token: &str) -> Result<SessionClaims, AppError> {
        decode::<SessionClaims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                log::debug!("rejected session token: {}", e);
                AppError::Forbidden("Invalid or expired token".into())
            })
    }
}

/// Produces an unguessable opaque token for email verification or password
/// reset: 32 bytes from the OS RNG, hex-encoded.
pub fn issue_random_token() -> String {
    let mut bytes = [0u8; RANDOM_TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}
