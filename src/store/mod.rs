//! Persistence boundary.
//!
//! Handlers talk to the database through two traits, [`CredentialStore`] for
//! user rows and [`TaskStore`] for owner-scoped tasks. Every method is a
//! single atomic operation; no transaction spans calls.
//!
//! [`postgres::PgStore`] is the production backend and [`memory::MemoryStore`]
//! backs development runs without `DATABASE_URL` and the test-suite.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{NewUser, Task, TaskPatch, TaskQuery, TaskSummary, User, UserPatch};

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    /// Insert rejected by the unique constraint on `users.email`.
    #[error("email already registered")]
    DuplicateEmail,
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    async fn find_user_by_id(&self, id: i32) -> Result<Option<User>, StoreError>;

    /// Only matches a verification token whose expiry is after `now`.
    async fn find_user_by_verification_token(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<User>, StoreError>;

    /// Only matches a reset token whose expiry is after `now`.
    async fn find_user_by_reset_token(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<User>, StoreError>;

    /// Marks the owner of a live verification token verified and clears the
    /// token, in one atomic step. Unknown, consumed and expired tokens (expiry
    /// not after `now`) yield `None`, so a token succeeds at most once even
    /// under concurrent requests.
    async fn consume_verification_token(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<User>, StoreError>;

    /// Replaces the password of the owner of a live reset token and clears
    /// the token, atomically; same matching rules as
    /// [`consume_verification_token`](Self::consume_verification_token).
    async fn consume_reset_token(
        &self,
        token: &str,
        password_hash: String,
        now: DateTime<Utc>,
    ) -> Result<Option<User>, StoreError>;

    /// Fails with [`StoreError::DuplicateEmail`] when the email is taken.
    async fn insert_user(&self, user: NewUser) -> Result<User, StoreError>;

    /// Applies the present fields of `patch`; `None` when no such user.
    async fn update_user(&self, id: i32, patch: UserPatch) -> Result<Option<User>, StoreError>;
}

/// Task persistence. Every method is scoped by `owner`: a task owned by
/// someone else behaves exactly like a missing one.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Newest first. Status and category match exactly; search is a
    /// case-insensitive substring match over title or description.
    async fn list_tasks(&self, owner: i32, query: &TaskQuery) -> Result<Vec<Task>, StoreError>;

    async fn insert_task(&self, task: Task) -> Result<Task, StoreError>;

    async fn update_task(
        &self,
        owner: i32,
        id: Uuid,
        patch: &TaskPatch,
    ) -> Result<Option<Task>, StoreError>;

    /// Returns whether a row was removed.
    async fn delete_task(&self, owner: i32, id: Uuid) -> Result<bool, StoreError>;

    async fn count_by_status(&self, owner: i32) -> Result<TaskSummary, StoreError>;

    /// Distinct non-null categories, sorted.
    async fn list_categories(&self, owner: i32) -> Result<Vec<String>, StoreError>;
}
