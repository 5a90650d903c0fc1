//! Task operations shared by the HTTP handlers.
//!
//! Listing reads through the [`TaskCache`] for the unfiltered case only;
//! every successful mutation evicts the owner's cached listings, so a list
//! after a change always reflects it, even inside the freshness window.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::cache::{CacheKey, TaskCache};
use crate::error::AppError;
use crate::models::{Task, TaskInput, TaskPatch, TaskQuery};
use crate::store::TaskStore;

/// A task listing and whether it was served from the cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskListing {
    pub tasks: Vec<Task>,
    pub cached: bool,
}

/// Lists `owner`'s tasks. Only requests with no filter at all consult or
/// populate the cache; filtered requests always go to the store.
pub async fn list_tasks(
    store: &dyn TaskStore,
    cache: &dyn TaskCache,
    owner: i32,
    query: TaskQuery,
) -> Result<TaskListing, AppError> {
    if !query.is_unfiltered() {
        let tasks = store.list_tasks(owner, &query).await?;
        return Ok(TaskListing {
            tasks,
            cached: false,
        });
    }

    let key = CacheKey::new(owner, query);
    if let Some(tasks) = cache.get(&key).await {
        log::debug!("[CACHE HIT] returning cached tasks for user {}", owner);
        return Ok(TaskListing {
            tasks,
            cached: true,
        });
    }

    log::debug!("[CACHE MISS] fetching tasks from store for user {}", owner);
    let tasks = store.list_tasks(owner, &key.filters).await?;
    cache.put(key, tasks.clone()).await;
    Ok(TaskListing {
        tasks,
        cached: false,
    })
}

pub async fn create_task(
    store: &dyn TaskStore,
    cache: &dyn TaskCache,
    owner: i32,
    input: TaskInput,
) -> Result<Task, AppError> {
    let task = store.insert_task(Task::new(input, owner)).await?;
    cache.invalidate(owner).await;
    Ok(task)
}

/// Applies `patch`; a task owned by someone else reads as not found.
pub async fn update_task(
    store: &dyn TaskStore,
    cache: &dyn TaskCache,
    owner: i32,
    id: Uuid,
    patch: &TaskPatch,
) -> Result<Task, AppError> {
    let task = store
        .update_task(owner, id, patch)
        .await?
        .ok_or_else(|| AppError::NotFound("Task not found".into()))?;
    cache.invalidate(owner).await;
    Ok(task)
}

pub async fn delete_task(
    store: &dyn TaskStore,
    cache: &dyn TaskCache,
    owner: i32,
    id: Uuid,
) -> Result<(), AppError> {
    if !store.delete_task(owner, id).await? {
        return Err(AppError::NotFound("Task not found".into()));
    }
    cache.invalidate(owner).await;
    Ok(())
}
