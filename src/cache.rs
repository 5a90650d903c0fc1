//! Short-lived memo of task listings, per user.
//!
//! The cache sits behind the [`TaskCache`] trait so a shared cache can
//! replace [`InMemoryTaskCache`] without touching callers. Entries are keyed
//! by user and filter values, go stale after a fixed window, and are evicted
//! for a user whenever one of that user's tasks changes.
//!
//! Each slot is replaced wholesale under a lock, but a read followed by a
//! write is not atomic: two concurrent misses for the same user may both
//! hit the store. That race only costs a redundant query.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::models::{Task, TaskQuery};

/// Default freshness window of a cached listing.
pub const DEFAULT_TTL: Duration = Duration::from_secs(30);

/// Identifies one cached listing.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub user_id: i32,
    pub filters: TaskQuery,
}

impl CacheKey {
    pub fn new(user_id: i32, filters: TaskQuery) -> Self {
        Self { user_id, filters }
    }

    /// Key of the plain "all my tasks" listing.
    pub fn unfiltered(user_id: i32) -> Self {
        Self::new(user_id, TaskQuery::default())
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    tasks: Vec<Task>,
    stored_at: Instant,
}

#[async_trait]
pub trait TaskCache: Send + Sync {
    /// The stored listing if it is still within the freshness window.
    async fn get(&self, key: &CacheKey) -> Option<Vec<Task>>;

    /// Stores `tasks`, replacing any previous entry for `key`.
    async fn put(&self, key: CacheKey, tasks: Vec<Task>);

    /// Drops every entry belonging to `user_id`.
    async fn invalidate(&self, user_id: i32);

    /// Drops stale entries; returns how many were removed.
    async fn purge_expired(&self) -> usize;
}

/// Process-local [`TaskCache`].
#[derive(Debug)]
pub struct InMemoryTaskCache {
    ttl: Duration,
    entries: RwLock<HashMap<CacheKey, CacheEntry>>,
}

impl Default for InMemoryTaskCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

impl InMemoryTaskCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    fn is_fresh(&self, entry: &CacheEntry, now: Instant) -> bool {
        now.duration_since(entry.stored_at) < self.ttl
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<CacheKey, CacheEntry>> {
        self.entries.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<CacheKey, CacheEntry>> {
        self.entries.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl TaskCache for InMemoryTaskCache {
    async fn get(&self, key: &CacheKey) -> Option<Vec<Task>> {
        let now = Instant::now();
        self.read()
            .get(key)
            .filter(|entry| self.is_fresh(entry, now))
            .map(|entry| entry.tasks.clone())
    }

    async fn put(&self, key: CacheKey, tasks: Vec<Task>) {
        let entry = CacheEntry {
            tasks,
            stored_at: Instant::now(),
        };
        self.write().insert(key, entry);
    }

    async fn invalidate(&self, user_id: i32) {
        self.write().retain(|key, _| key.user_id != user_id);
    }

    async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.write();
        let before = entries.len();
        entries.retain(|_, entry| self.is_fresh(entry, now));
        before - entries.len()
    }
}
