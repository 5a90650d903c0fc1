use std::collections::BTreeSet;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{NewUser, Task, TaskPatch, TaskQuery, TaskSummary, User, UserPatch};
use crate::store::{CredentialStore, StoreError, TaskStore};

#[derive(Debug, Default)]
struct Tables {
    next_user_id: i32,
    users: Vec<User>,
    tasks: Vec<Task>,
}

/// Process-local store with the same observable behaviour as `PgStore`.
/// Data lives only as long as the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        // A panic while holding the lock cannot leave a row half-written.
        self.tables.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self.tables().users.iter().find(|u| u.email == email).cloned())
    }

    async fn find_user_by_id(&self, id: i32) -> Result<Option<User>, StoreError> {
        Ok(self.tables().users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_user_by_verification_token(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<User>, StoreError> {
        Ok(self
            .tables()
            .users
            .iter()
            .find(|u| u.verification.as_ref().is_some_and(|t| t.accepts(token, now)))
            .cloned())
    }

    async fn find_user_by_reset_token(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<User>, StoreError> {
        Ok(self
            .tables()
            .users
            .iter()
            .find(|u| u.reset.as_ref().is_some_and(|t| t.accepts(token, now)))
            .cloned())
    }

    async fn consume_verification_token(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<User>, StoreError> {
        let mut tables = self.tables();
        Ok(tables
            .users
            .iter_mut()
            .find(|u| u.verification.as_ref().is_some_and(|t| t.accepts(token, now)))
            .map(|user| {
                UserPatch::verify_email().apply_to(user);
                user.clone()
            }))
    }

    async fn consume_reset_token(
        &self,
        token: &str,
        password_hash: String,
        now: DateTime<Utc>,
    ) -> Result<Option<User>, StoreError> {
        let mut tables = self.tables();
        Ok(tables
            .users
            .iter_mut()
            .find(|u| u.reset.as_ref().is_some_and(|t| t.accepts(token, now)))
            .map(|user| {
                UserPatch::reset_password(password_hash).apply_to(user);
                user.clone()
            }))
    }

    async fn insert_user(&self, user: NewUser) -> Result<User, StoreError> {
        let mut tables = self.tables();
        if tables.users.iter().any(|u| u.email == user.email) {
            return Err(StoreError::DuplicateEmail);
        }

        tables.next_user_id += 1;
        let user = User {
            id: tables.next_user_id,
            email: user.email,
            password_hash: user.password_hash,
            name: user.name,
            avatar_color: user.avatar_color,
            email_verified: false,
            verification: user.verification,
            reset: None,
            created_at: Utc::now(),
        };
        tables.users.push(user.clone());
        Ok(user)
    }

    async fn update_user(&self, id: i32, patch: UserPatch) -> Result<Option<User>, StoreError> {
        let mut tables = self.tables();
        Ok(tables.users.iter_mut().find(|u| u.id == id).map(|user| {
            patch.apply_to(user);
            user.clone()
        }))
    }
}

#[async_trait]
impl TaskStore for MemoryStore {
    async fn list_tasks(&self, owner: i32, query: &TaskQuery) -> Result<Vec<Task>, StoreError> {
        let mut tasks: Vec<Task> = self
            .tables()
            .tasks
            .iter()
            .filter(|t| t.user_id == owner)
            .filter(|t| query.status.map_or(true, |s| t.status == s))
            .filter(|t| {
                query
                    .category
                    .as_ref()
                    .map_or(true, |c| t.category.as_ref() == Some(c))
            })
            .filter(|t| query.search.as_ref().map_or(true, |s| t.matches_search(s)))
            .cloned()
            .collect();
        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(tasks)
    }

    async fn insert_task(&self, task: Task) -> Result<Task, StoreError> {
        self.tables().tasks.push(task.clone());
        Ok(task)
    }

    async fn update_task(
        &self,
        owner: i32,
        id: Uuid,
        patch: &TaskPatch,
    ) -> Result<Option<Task>, StoreError> {
        let mut tables = self.tables();
        Ok(tables
            .tasks
            .iter_mut()
            .find(|t| t.id == id && t.user_id == owner)
            .map(|task| {
                patch.apply_to(task);
                task.clone()
            }))
    }

    async fn delete_task(&self, owner: i32, id: Uuid) -> Result<bool, StoreError> {
        let mut tables = self.tables();
        let before = tables.tasks.len();
        tables.tasks.retain(|t| !(t.id == id && t.user_id == owner));
        Ok(tables.tasks.len() != before)
    }

    async fn count_by_status(&self, owner: i32) -> Result<TaskSummary, StoreError> {
        let mut summary = TaskSummary::default();
        for task in self.tables().tasks.iter().filter(|t| t.user_id == owner) {
            summary.record(task.status, 1);
        }
        Ok(summary)
    }

    async fn list_categories(&self, owner: i32) -> Result<Vec<String>, StoreError> {
        let categories: BTreeSet<String> = self
            .tables()
            .tasks
            .iter()
            .filter(|t| t.user_id == owner)
            .filter_map(|t| t.category.clone())
            .collect();
        Ok(categories.into_iter().collect())
    }
}
