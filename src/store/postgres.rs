use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Executor, FromRow, PgPool};
use uuid::Uuid;

use crate::models::{
    IssuedToken, NewUser, Task, TaskPatch, TaskQuery, TaskStatus, TaskSummary, User, UserPatch,
};
use crate::store::{CredentialStore, StoreError, TaskStore};

/// Idempotent bootstrap schema, applied on startup.
const SCHEMA: &str = r#"
DO $$ BEGIN
    CREATE TYPE task_status AS ENUM ('TODO', 'IN_PROGRESS', 'DONE');
EXCEPTION
    WHEN duplicate_object THEN NULL;
END $$;

CREATE TABLE IF NOT EXISTS users (
    id SERIAL PRIMARY KEY,
    email TEXT UNIQUE NOT NULL,
    password_hash TEXT NOT NULL,
    name TEXT NOT NULL,
    avatar_color TEXT NOT NULL DEFAULT '#667eea',
    email_verified BOOLEAN NOT NULL DEFAULT FALSE,
    verification_token TEXT,
    verification_token_expires TIMESTAMPTZ,
    reset_token TEXT,
    reset_token_expires TIMESTAMPTZ,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    CHECK ((verification_token IS NULL) = (verification_token_expires IS NULL)),
    CHECK ((reset_token IS NULL) = (reset_token_expires IS NULL))
);

CREATE TABLE IF NOT EXISTS tasks (
    id UUID PRIMARY KEY,
    user_id INTEGER NOT NULL REFERENCES users(id),
    title TEXT NOT NULL,
    description TEXT,
    status task_status NOT NULL DEFAULT 'TODO',
    category TEXT,
    due_date DATE,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE INDEX IF NOT EXISTS tasks_user_id_idx ON tasks (user_id);
"#;

const USER_COLUMNS: &str = "id, email, password_hash, name, avatar_color, email_verified, \
     verification_token, verification_token_expires, reset_token, reset_token_expires, created_at";

const TASK_COLUMNS: &str =
    "id, user_id, title, description, status, category, due_date, created_at, updated_at";

#[derive(Debug, FromRow)]
struct UserRow {
    id: i32,
    email: String,
    password_hash: String,
    name: String,
    avatar_color: String,
    email_verified: bool,
    verification_token: Option<String>,
    verification_token_expires: Option<DateTime<Utc>>,
    reset_token: Option<String>,
    reset_token_expires: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

fn issued(token: Option<String>, expires_at: Option<DateTime<Utc>>) -> Option<IssuedToken> {
    match (token, expires_at) {
        (Some(token), Some(expires_at)) => Some(IssuedToken { token, expires_at }),
        _ => None,
    }
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            email: row.email,
            password_hash: row.password_hash,
            name: row.name,
            avatar_color: row.avatar_color,
            email_verified: row.email_verified,
            verification: issued(row.verification_token, row.verification_token_expires),
            reset: issued(row.reset_token, row.reset_token_expires),
            created_at: row.created_at,
        }
    }
}

/// Splits a token slot update into the column values and a "touch" flag.
fn token_columns(
    slot: Option<Option<IssuedToken>>,
) -> (bool, Option<String>, Option<DateTime<Utc>>) {
    match slot {
        None => (false, None, None),
        Some(None) => (true, None, None),
        Some(Some(issued)) => (true, Some(issued.token), Some(issued.expires_at)),
    }
}

/// Escapes `LIKE` wildcards so user input matches literally.
fn like_pattern(search: &str) -> String {
    let escaped = search
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

/// PostgreSQL-backed credential and task store.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPool::connect(database_url).await?;
        Ok(Self::new(pool))
    }

    /// Creates the tables and enum type when missing.
    pub async fn init_schema(&self) -> Result<(), StoreError> {
        // Unprepared execution so the multi-statement script runs as one batch.
        (&self.pool).execute(SCHEMA).await?;
        Ok(())
    }

    /// Runs a user statement keyed by a token (`$1`) and the current time
    /// (`$2`), with an optional password hash as `$3`.
    ///
    /// For the consuming `UPDATE ... RETURNING` forms, row locking makes a
    /// concurrent second statement re-check its `WHERE` after the first
    /// commits, so it finds the token already cleared.
    async fn user_by_token(
        &self,
        sql: &str,
        token: &str,
        now: DateTime<Utc>,
        password_hash: Option<String>,
    ) -> Result<Option<User>, StoreError> {
        let mut query = sqlx::query_as::<_, UserRow>(sql).bind(token).bind(now);
        if let Some(password_hash) = password_hash {
            query = query.bind(password_hash);
        }
        let row = query.fetch_optional(&self.pool).await?;
        Ok(row.map(User::from))
    }
}

#[async_trait]
impl CredentialStore for PgStore {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let sql = format!("SELECT {} FROM users WHERE email = $1", USER_COLUMNS);
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(User::from))
    }

    async fn find_user_by_id(&self, id: i32) -> Result<Option<User>, StoreError> {
        let sql = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(User::from))
    }

    async fn find_user_by_verification_token(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<User>, StoreError> {
        let sql = format!(
            "SELECT {} FROM users \
             WHERE verification_token = $1 AND verification_token_expires > $2",
            USER_COLUMNS
        );
        self.user_by_token(&sql, token, now, None).await
    }

    async fn find_user_by_reset_token(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<User>, StoreError> {
        let sql = format!(
            "SELECT {} FROM users WHERE reset_token = $1 AND reset_token_expires > $2",
            USER_COLUMNS
        );
        self.user_by_token(&sql, token, now, None).await
    }

    async fn consume_verification_token(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<User>, StoreError> {
        let sql = format!(
            "UPDATE users SET email_verified = TRUE, \
                 verification_token = NULL, verification_token_expires = NULL \
             WHERE verification_token = $1 AND verification_token_expires > $2 \
             RETURNING {}",
            USER_COLUMNS
        );
        self.user_by_token(&sql, token, now, None).await
    }

    async fn consume_reset_token(
        &self,
        token: &str,
        password_hash: String,
        now: DateTime<Utc>,
    ) -> Result<Option<User>, StoreError> {
        let sql = format!(
            "UPDATE users SET password_hash = $3, \
                 reset_token = NULL, reset_token_expires = NULL \
             WHERE reset_token = $1 AND reset_token_expires > $2 \
             RETURNING {}",
            USER_COLUMNS
        );
        self.user_by_token(&sql, token, now, Some(password_hash)).await
    }

    async fn insert_user(&self, user: NewUser) -> Result<User, StoreError> {
        let (_, verification_token, verification_expires) =
            token_columns(Some(user.verification));
        let sql = format!(
            "INSERT INTO users (email, password_hash, name, avatar_color, \
             verification_token, verification_token_expires) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {}",
            USER_COLUMNS
        );

        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(&user.name)
            .bind(&user.avatar_color)
            .bind(verification_token)
            .bind(verification_expires)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(db) if db.is_unique_violation() => {
                    StoreError::DuplicateEmail
                }
                other => StoreError::Database(other),
            })?;
        Ok(row.into())
    }

    async fn update_user(&self, id: i32, patch: UserPatch) -> Result<Option<User>, StoreError> {
        let (set_verification, verification_token, verification_expires) =
            token_columns(patch.verification);
        let (set_reset, reset_token, reset_expires) = token_columns(patch.reset);

        // One statement; each column keeps its value unless its patch field
        // is present.
        let sql = format!(
            "UPDATE users SET \
                 name = COALESCE($2, name), \
                 avatar_color = COALESCE($3, avatar_color), \
                 password_hash = COALESCE($4, password_hash), \
                 email_verified = COALESCE($5, email_verified), \
                 verification_token = CASE WHEN $6 THEN $7 ELSE verification_token END, \
                 verification_token_expires = CASE WHEN $6 THEN $8 ELSE verification_token_expires END, \
                 reset_token = CASE WHEN $9 THEN $10 ELSE reset_token END, \
                 reset_token_expires = CASE WHEN $9 THEN $11 ELSE reset_token_expires END \
             WHERE id = $1 RETURNING {}",
            USER_COLUMNS
        );

        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .bind(patch.name)
            .bind(patch.avatar_color)
            .bind(patch.password_hash)
            .bind(patch.email_verified)
            .bind(set_verification)
            .bind(verification_token)
            .bind(verification_expires)
            .bind(set_reset)
            .bind(reset_token)
            .bind(reset_expires)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(User::from))
    }
}

#[async_trait]
impl TaskStore for PgStore {
    async fn list_tasks(&self, owner: i32, query: &TaskQuery) -> Result<Vec<Task>, StoreError> {
        let mut sql = format!("SELECT {} FROM tasks WHERE user_id = $1", TASK_COLUMNS);
        let mut param_count = 2;

        if query.status.is_some() {
            sql.push_str(&format!(" AND status = ${}", param_count));
            param_count += 1;
        }
        if query.category.is_some() {
            sql.push_str(&format!(" AND category = ${}", param_count));
            param_count += 1;
        }
        if query.search.is_some() {
            sql.push_str(&format!(
                " AND (title ILIKE ${0} OR description ILIKE ${0})",
                param_count
            ));
        }
        sql.push_str(" ORDER BY created_at DESC");

        let mut query_builder = sqlx::query_as::<_, Task>(&sql).bind(owner);
        if let Some(status) = query.status {
            query_builder = query_builder.bind(status);
        }
        if let Some(category) = &query.category {
            query_builder = query_builder.bind(category);
        }
        if let Some(search) = &query.search {
            query_builder = query_builder.bind(like_pattern(search));
        }

        Ok(query_builder.fetch_all(&self.pool).await?)
    }

    async fn insert_task(&self, task: Task) -> Result<Task, StoreError> {
        let sql = format!(
            "INSERT INTO tasks ({0}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING {0}",
            TASK_COLUMNS
        );
        let task = sqlx::query_as::<_, Task>(&sql)
            .bind(task.id)
            .bind(task.user_id)
            .bind(task.title)
            .bind(task.description)
            .bind(task.status)
            .bind(task.category)
            .bind(task.due_date)
            .bind(task.created_at)
            .bind(task.updated_at)
            .fetch_one(&self.pool)
            .await?;
        Ok(task)
    }

    async fn update_task(
        &self,
        owner: i32,
        id: Uuid,
        patch: &TaskPatch,
    ) -> Result<Option<Task>, StoreError> {
        let sql = format!(
            "UPDATE tasks SET \
                 status = COALESCE($3, status), \
                 title = COALESCE($4, title), \
                 description = CASE WHEN $5 THEN $6 ELSE description END, \
                 category = CASE WHEN $7 THEN $8 ELSE category END, \
                 due_date = CASE WHEN $9 THEN $10 ELSE due_date END, \
                 updated_at = NOW() \
             WHERE id = $1 AND user_id = $2 RETURNING {}",
            TASK_COLUMNS
        );

        let task = sqlx::query_as::<_, Task>(&sql)
            .bind(id)
            .bind(owner)
            .bind(patch.status)
            .bind(&patch.title)
            .bind(patch.description.is_some())
            .bind(patch.description.clone().flatten())
            .bind(patch.category.is_some())
            .bind(patch.category.clone().flatten())
            .bind(patch.due_date.is_some())
            .bind(patch.due_date.flatten())
            .fetch_optional(&self.pool)
            .await?;
        Ok(task)
    }

    async fn delete_task(&self, owner: i32, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(owner)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn count_by_status(&self, owner: i32) -> Result<TaskSummary, StoreError> {
        let rows = sqlx::query_as::<_, (TaskStatus, i64)>(
            "SELECT status, COUNT(*) FROM tasks WHERE user_id = $1 GROUP BY status",
        )
        .bind(owner)
        .fetch_all(&self.pool)
        .await?;

        let mut summary = TaskSummary::default();
        for (status, count) in rows {
            summary.record(status, count);
        }
        Ok(summary)
    }

    async fn list_categories(&self, owner: i32) -> Result<Vec<String>, StoreError> {
        let categories = sqlx::query_scalar::<_, String>(
            "SELECT DISTINCT category FROM tasks \
             WHERE user_id = $1 AND category IS NOT NULL ORDER BY category",
        )
        .bind(owner)
        .fetch_all(&self.pool)
        .await?;
        Ok(categories)
    }
}
