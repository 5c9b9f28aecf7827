/// Task model and ownership-scoped repository
///
/// This module provides the Task model, the [`TaskStore`] storage trait, and
/// the [`TaskRepository`] that applies validation and server-side timestamps
/// on top of a store.
///
/// # Ownership
///
/// Every store method takes an [`OwnerId`]. An `OwnerId` can only be obtained
/// from a validated session (see `auth::middleware::AuthenticatedContext`), so
/// no code path can query tasks without naming the authenticated owner. Rows
/// owned by someone else are indistinguishable from missing rows.
///
/// # Schema
///
/// ```sql
/// CREATE TYPE task_status AS ENUM ('pending', 'in_progress', 'done');
///
/// CREATE TABLE tasks (
///     id BIGSERIAL PRIMARY KEY,
///     owner_id BIGINT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     title VARCHAR(200) NOT NULL,
///     content TEXT,
///     status task_status NOT NULL DEFAULT 'pending',
///     priority INTEGER NOT NULL DEFAULT 0,
///     created_at TIMESTAMPTZ NOT NULL,
///     updated_at TIMESTAMPTZ NOT NULL
/// );
/// ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

use crate::clock::SharedClock;
use crate::error::{CoreError, CoreResult, StoreError};

/// Maximum title length in characters
pub const TITLE_MAX_LEN: usize = 200;

/// Maximum content length in characters
pub const CONTENT_MAX_LEN: usize = 10_000;

/// Task progress status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "task_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Not started yet
    #[default]
    Pending,

    /// Being worked on
    InProgress,

    /// Finished
    Done,
}

impl TaskStatus {
    /// Converts status to its storage string
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Done => "done",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TaskStatus::Pending),
            "in_progress" => Ok(TaskStatus::InProgress),
            "done" => Ok(TaskStatus::Done),
            other => Err(CoreError::validation(
                "status",
                format!("unknown status '{}'", other),
            )),
        }
    }
}

/// ID of the user a task operation is scoped to
///
/// Only constructible inside this crate, from a validated session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OwnerId(i64);

impl OwnerId {
    pub(crate) fn new(id: i64) -> Self {
        Self(id)
    }

    /// Raw user ID
    pub fn get(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Task model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Task {
    /// Unique task ID
    pub id: i64,

    /// Owning user
    pub owner_id: i64,

    /// Task title (never empty)
    pub title: String,

    /// Optional free-form notes
    pub content: Option<String>,

    /// Progress status
    pub status: TaskStatus,

    /// Sort priority, higher means more important
    pub priority: i32,

    /// When the task was created
    pub created_at: DateTime<Utc>,

    /// When the task was last modified
    pub updated_at: DateTime<Utc>,
}

/// Caller-supplied fields for a save
///
/// `id` absent or `0` creates a task; any other value updates the caller's
/// task with that id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskInput {
    /// Existing task to update
    #[serde(default)]
    pub id: Option<i64>,

    /// Title (required)
    pub title: String,

    /// Optional notes
    #[serde(default)]
    pub content: Option<String>,

    /// Status; defaults to pending on create, unchanged on update
    #[serde(default)]
    pub status: Option<TaskStatus>,

    /// Priority; defaults to 0 on create, unchanged on update
    #[serde(default)]
    pub priority: Option<i32>,
}

/// Validated, normalized task fields handed to a [`TaskStore`]
#[derive(Debug, Clone, PartialEq)]
pub struct TaskFields {
    /// Trimmed, non-empty title
    pub title: String,

    /// Trimmed content, `None` when blank
    pub content: Option<String>,

    /// Requested status
    pub status: Option<TaskStatus>,

    /// Requested priority
    pub priority: Option<i32>,
}

impl TaskFields {
    /// Validates input fields
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Validation` if the title is empty or whitespace, or
    /// if title or content exceed their length limits.
    pub fn validate(input: &TaskInput) -> CoreResult<Self> {
        let title = input.title.trim();
        if title.is_empty() {
            return Err(CoreError::validation("title", "must not be empty"));
        }
        if title.chars().count() > TITLE_MAX_LEN {
            return Err(CoreError::validation(
                "title",
                format!("must be at most {} characters", TITLE_MAX_LEN),
            ));
        }

        let content = input
            .content
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty());
        if let Some(c) = content {
            if c.chars().count() > CONTENT_MAX_LEN {
                return Err(CoreError::validation(
                    "content",
                    format!("must be at most {} characters", CONTENT_MAX_LEN),
                ));
            }
        }

        Ok(Self {
            title: title.to_string(),
            content: content.map(str::to_string),
            status: input.status,
            priority: input.priority,
        })
    }
}

/// Storage backend for tasks
///
/// Every method is scoped to `owner`; implementations must include the owner
/// in the same statement that reads or writes the row.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// All tasks of `owner`, newest first (ties broken by id, descending)
    async fn list(&self, owner: OwnerId) -> Result<Vec<Task>, StoreError>;

    /// The task with `id` if `owner` owns it
    async fn find(&self, owner: OwnerId, id: i64) -> Result<Option<Task>, StoreError>;

    /// Inserts a task; missing status/priority take their defaults
    async fn insert(&self, owner: OwnerId, fields: &TaskFields, now: DateTime<Utc>) -> Result<Task, StoreError>;

    /// Updates the task with `id` if `owner` owns it
    ///
    /// Title and content are replaced; missing status/priority keep their
    /// stored values. Returns `None` when no owned row matched.
    async fn update(
        &self,
        owner: OwnerId,
        id: i64,
        fields: &TaskFields,
        now: DateTime<Utc>,
    ) -> Result<Option<Task>, StoreError>;

    /// Deletes the task with `id` if `owner` owns it; returns whether a row went away
    async fn delete(&self, owner: OwnerId, id: i64) -> Result<bool, StoreError>;
}

/// Ownership-scoped task operations
///
/// Wraps a [`TaskStore`], validating input before storage is touched and
/// stamping every write with the injected clock.
#[derive(Clone)]
pub struct TaskRepository {
    store: Arc<dyn TaskStore>,
    clock: SharedClock,
}

impl TaskRepository {
    /// Creates a repository over `store`
    pub fn new(store: Arc<dyn TaskStore>, clock: SharedClock) -> Self {
        Self { store, clock }
    }

    /// Lists the owner's tasks, newest first
    pub async fn list(&self, owner: OwnerId) -> CoreResult<Vec<Task>> {
        Ok(self.store.list(owner).await?)
    }

    /// Fetches one of the owner's tasks
    ///
    /// # Errors
    ///
    /// `CoreError::NotFoundOrForbidden` when the task is missing or not owned.
    pub async fn find(&self, owner: OwnerId, id: i64) -> CoreResult<Task> {
        self.store
            .find(owner, id)
            .await?
            .ok_or(CoreError::NotFoundOrForbidden)
    }

    /// Creates or updates a task
    ///
    /// # Errors
    ///
    /// - `CoreError::Validation` for a blank or oversized title/content (no write happens)
    /// - `CoreError::NotFoundOrForbidden` when updating a task the owner does not have
    pub async fn save(&self, owner: OwnerId, input: &TaskInput) -> CoreResult<Task> {
        let fields = TaskFields::validate(input)?;
        let now = self.clock.now();

        match input.id.filter(|id| *id != 0) {
            None => {
                let task = self.store.insert(owner, &fields, now).await?;
                debug!(owner_id = %owner, task_id = task.id, "Task created");
                Ok(task)
            }
            Some(id) => {
                let task = self
                    .store
                    .update(owner, id, &fields, now)
                    .await?
                    .ok_or(CoreError::NotFoundOrForbidden)?;
                debug!(owner_id = %owner, task_id = task.id, "Task updated");
                Ok(task)
            }
        }
    }

    /// Deletes a task; missing or foreign tasks are a silent no-op
    pub async fn delete(&self, owner: OwnerId, id: i64) -> CoreResult<()> {
        let deleted = self.store.delete(owner, id).await?;
        debug!(owner_id = %owner, task_id = id, deleted, "Task delete requested");
        Ok(())
    }
}
