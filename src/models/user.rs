use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::auth::token::issue_random_token;
use crate::models::task::TaskStats;

/// Colour given to accounts that never picked one.
pub const DEFAULT_AVATAR_COLOR: &str = "#667eea";

/// Palette a new account's avatar colour is drawn from.
pub const AVATAR_COLORS: [&str; 8] = [
    "#667eea", "#764ba2", "#f093fb", "#4facfe", "#43e97b", "#fa709a", "#feca57", "#ee5a6f",
];

/// Lifetime of an email verification token.
pub const VERIFICATION_TOKEN_TTL_HOURS: i64 = 24;
/// Lifetime of a password reset token.
pub const RESET_TOKEN_TTL_HOURS: i64 = 1;

/// A single-use random token stored on the user row together with its
/// expiry. Holding both in one value keeps them set or cleared together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl IssuedToken {
    pub fn new(ttl: Duration) -> Self {
        Self {
            token: issue_random_token(),
            expires_at: Utc::now() + ttl,
        }
    }

    /// Email verification token, valid for 24 hours.
    pub fn verification() -> Self {
        Self::new(Duration::hours(VERIFICATION_TOKEN_TTL_HOURS))
    }

    /// Password reset token, valid for 1 hour.
    pub fn reset() -> Self {
        Self::new(Duration::hours(RESET_TOKEN_TTL_HOURS))
    }

    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }

    /// True when `candidate` is this token and it has not expired.
    pub fn accepts(&self, candidate: &str, now: DateTime<Utc>) -> bool {
        self.token == candidate && self.is_live(now)
    }
}

/// A stored account. Holds the password hash, so it is never serialized;
/// responses go through [`PublicUser`] or [`Profile`].
#[derive(Debug, Clone)]
pub struct User {
    pub id: i32,
    pub email: String,
    pub password_hash: String,
    pub name: String,
    pub avatar_color: String,
    pub email_verified: bool,
    pub verification: Option<IssuedToken>,
    pub reset: Option<IssuedToken>,
    pub created_at: DateTime<Utc>,
}

/// Fields supplied when an account is created.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub name: String,
    pub avatar_color: String,
    pub verification: Option<IssuedToken>,
}

/// Partial update of a user row. `None` leaves a field untouched; for the
/// token slots `Some(None)` clears both token and expiry.
#[derive(Debug, Clone, Default)]
pub struct UserPatch {
    pub name: Option<String>,
    pub avatar_color: Option<String>,
    pub password_hash: Option<String>,
    pub email_verified: Option<bool>,
    pub verification: Option<Option<IssuedToken>>,
    pub reset: Option<Option<IssuedToken>>,
}

impl UserPatch {
    /// Marks the email verified and consumes the verification token.
    pub fn verify_email() -> Self {
        Self {
            email_verified: Some(true),
            verification: Some(None),
            ..Self::default()
        }
    }

    /// Replaces the password hash and consumes the reset token.
    pub fn reset_password(password_hash: String) -> Self {
        Self {
            password_hash: Some(password_hash),
            reset: Some(None),
            ..Self::default()
        }
    }

    pub fn apply_to(self, user: &mut User) {
        if let Some(name) = self.name {
            user.name = name;
        }
        if let Some(avatar_color) = self.avatar_color {
            user.avatar_color = avatar_color;
        }
        if let Some(password_hash) = self.password_hash {
            user.password_hash = password_hash;
        }
        if let Some(email_verified) = self.email_verified {
            user.email_verified = email_verified;
        }
        if let Some(verification) = self.verification {
            user.verification = verification;
        }
        if let Some(reset) = self.reset {
            user.reset = reset;
        }
    }
}

/// The user fields returned alongside a session token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicUser {
    pub id: i32,
    pub email: String,
    pub name: String,
    pub avatar_color: String,
    pub email_verified: bool,
}

impl From<&User> for PublicUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            name: user.name.clone(),
            avatar_color: user.avatar_color.clone(),
            email_verified: user.email_verified,
        }
    }
}

/// Profile page payload: account fields plus task statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: i32,
    pub email: String,
    pub name: String,
    pub avatar_color: String,
    pub email_verified: bool,
    pub created_at: DateTime<Utc>,
    pub stats: TaskStats,
}

impl Profile {
    pub fn new(user: &User, stats: TaskStats) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            name: user.name.clone(),
            avatar_color: user.avatar_color.clone(),
            email_verified: user.email_verified,
            created_at: user.created_at,
            stats,
        }
    }
}

/// Editable profile fields.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct ProfileUpdate {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    #[validate(length(min = 1, max = 32))]
    pub avatar_color: Option<String>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.avatar_color.is_none()
    }
}

impl From<ProfileUpdate> for UserPatch {
    fn from(update: ProfileUpdate) -> Self {
        Self {
            name: update.name,
            avatar_color: update.avatar_color,
            ..Self::default()
        }
    }
}

/// Response of a profile update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileSummary {
    pub id: i32,
    pub email: String,
    pub name: String,
    pub avatar_color: String,
}

impl From<&User> for ProfileSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            name: user.name.clone(),
            avatar_color: user.avatar_color.clone(),
        }
    }
}
