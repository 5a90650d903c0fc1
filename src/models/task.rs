use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

/// Represents the status of a task.
/// Corresponds to the `task_status` SQL enum.
#[derive(Debug, Default, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(type_name = "task_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    /// Task is yet to be started.
    #[default]
    Todo,
    /// Task is currently being worked on.
    InProgress,
    /// Task is completed.
    Done,
}

/// Input structure for creating a task.
/// New tasks always start as `TODO`.
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct TaskInput {
    /// The title of the task.
    /// Must be between 1 and 200 characters.
    #[validate(length(min = 1, max = 200))]
    pub title: String,

    /// An optional description for the task.
    /// Maximum length of 1000 characters if provided. `""` is stored as no
    /// description.
    #[serde(default, deserialize_with = "blank_as_none")]
    #[validate(length(max = 1000))]
    pub description: Option<String>,

    /// Free-form grouping label; `""` means uncategorised.
    #[serde(default, deserialize_with = "blank_as_none")]
    #[validate(length(max = 50))]
    pub category: Option<String>,

    /// Optional due date for the task (`YYYY-MM-DD`).
    pub due_date: Option<NaiveDate>,
}

/// Partial update of a task. Absent fields are left untouched; for nullable
/// columns an explicit JSON `null` clears the value.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct TaskPatch {
    pub status: Option<TaskStatus>,

    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,

    #[serde(default, deserialize_with = "present_text")]
    #[validate(length(max = 1000))]
    pub description: Option<Option<String>>,

    #[serde(default, deserialize_with = "present_text")]
    #[validate(length(max = 50))]
    pub category: Option<Option<String>>,

    #[serde(default, deserialize_with = "present")]
    pub due_date: Option<Option<NaiveDate>>,
}

impl TaskPatch {
    pub fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.title.is_none()
            && self.description.is_none()
            && self.category.is_none()
            && self.due_date.is_none()
    }

    /// Applies the present fields to `task` and bumps `updated_at`.
    pub fn apply_to(&self, task: &mut Task) {
        if let Some(status) = self.status {
            task.status = status;
        }
        if let Some(title) = &self.title {
            task.title = title.clone();
        }
        if let Some(description) = &self.description {
            task.description = description.clone();
        }
        if let Some(category) = &self.category {
            task.category = category.clone();
        }
        if let Some(due_date) = self.due_date {
            task.due_date = due_date;
        }
        task.updated_at = Utc::now();
    }
}

/// Maps a field that is present in the payload (even as `null`) to `Some`.
fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Like [`present`], but an empty string clears the field the same way
/// `null` does.
fn present_text<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(|text| Some(text.filter(|t| !t.is_empty())))
}

/// The web client sends `""` for optional text it leaves empty.
fn blank_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(|text| text.filter(|t| !t.is_empty()))
}

/// Represents a task entity as stored in the database and returned by the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Task {
    /// Unique identifier for the task (UUID v4).
    pub id: Uuid,
    /// Identifier of the user who owns the task.
    pub user_id: i32,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub category: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Creates a new `TODO` task owned by `user_id`.
    pub fn new(input: TaskInput, user_id: i32) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            title: input.title,
            description: input.description,
            status: TaskStatus::default(),
            category: input.category,
            due_date: input.due_date,
            created_at: now,
            updated_at: now,
        }
    }

    /// Case-insensitive substring match over title and description.
    pub fn matches_search(&self, needle: &str) -> bool {
        let needle = needle.to_lowercase();
        self.title.to_lowercase().contains(&needle)
            || self
                .description
                .as_deref()
                .is_some_and(|d| d.to_lowercase().contains(&needle))
    }
}

/// Query parameters for filtering the task listing.
///
/// Each filter is an explicit `Option`: an empty string is a real filter
/// value, not an absent one.
#[derive(Debug, Default, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskQuery {
    pub status: Option<TaskStatus>,
    pub category: Option<String>,
    pub search: Option<String>,
}

impl TaskQuery {
    pub fn is_unfiltered(&self) -> bool {
        self.status.is_none() && self.category.is_none() && self.search.is_none()
    }
}

/// Task counts per status for one owner.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSummary {
    #[serde(rename = "TODO")]
    pub todo: i64,
    #[serde(rename = "IN_PROGRESS")]
    pub in_progress: i64,
    #[serde(rename = "DONE")]
    pub done: i64,
}

impl TaskSummary {
    pub fn record(&mut self, status: TaskStatus, count: i64) {
        match status {
            TaskStatus::Todo => self.todo += count,
            TaskStatus::InProgress => self.in_progress += count,
            TaskStatus::Done => self.done += count,
        }
    }

    pub fn total(&self) -> i64 {
        self.todo + self.in_progress + self.done
    }
}

/// Task statistics shown on the profile page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskStats {
    pub total: i64,
    pub completed: i64,
    pub pending: i64,
    pub in_progress: i64,
}

impl From<TaskSummary> for TaskStats {
    fn from(summary: TaskSummary) -> Self {
        Self {
            total: summary.total(),
            completed: summary.done,
            pending: summary.todo,
            in_progress: summary.in_progress,
        }
    }
}
