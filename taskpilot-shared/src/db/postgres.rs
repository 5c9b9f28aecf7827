/// PostgreSQL storage backends
///
/// Every task statement filters on `owner_id` in the same query that reads or
/// writes the row, so ownership is enforced by the database rather than by a
/// check-then-act sequence in application code.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use taskpilot_shared::db::postgres::{PgCredentialStore, PgTaskStore};
/// use sqlx::PgPool;
///
/// # fn example(pool: PgPool) {
/// let credentials = Arc::new(PgCredentialStore::new(pool.clone()));
/// let tasks = Arc::new(PgTaskStore::new(pool));
/// # }
/// ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::error::StoreError;
use crate::models::task::{OwnerId, Task, TaskFields, TaskStore};
use crate::models::user::{normalize_email, CredentialStore, NewUser, User};

const USER_COLUMNS: &str = "id, username, email, password_hash, created_at";
const TASK_COLUMNS: &str = "id, owner_id, title, content, status, priority, created_at, updated_at";

/// Credential store over the `users` table
#[derive(Clone)]
pub struct PgCredentialStore {
    pool: PgPool,
}

impl PgCredentialStore {
    /// Creates a store over `pool`
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn find_by_username_or_email(&self, identifier: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE username = $1 OR email = $2 ORDER BY id LIMIT 1",
            USER_COLUMNS
        ))
        .bind(identifier)
        .bind(normalize_email(identifier))
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn exists_by_username_or_email(&self, username: &str, email: &str) -> Result<bool, StoreError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM users WHERE username = $1 OR email = $2)",
        )
        .bind(username)
        .bind(email)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn insert(&self, user: NewUser, created_at: DateTime<Utc>) -> Result<User, StoreError> {
        // No conflict target: either unique constraint suppresses the row
        let inserted = sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (username, email, password_hash, created_at)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT DO NOTHING
             RETURNING {}",
            USER_COLUMNS
        ))
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(created_at)
        .fetch_optional(&self.pool)
        .await?;

        inserted.ok_or(StoreError::Conflict)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE id = $1",
            USER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }
}

/// Task store over the `tasks` table
#[derive(Clone)]
pub struct PgTaskStore {
    pool: PgPool,
}

impl PgTaskStore {
    /// Creates a store over `pool`
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TaskStore for PgTaskStore {
    async fn list(&self, owner: OwnerId) -> Result<Vec<Task>, StoreError> {
        let tasks = sqlx::query_as::<_, Task>(&format!(
            "SELECT {} FROM tasks WHERE owner_id = $1 ORDER BY created_at DESC, id DESC",
            TASK_COLUMNS
        ))
        .bind(owner.get())
        .fetch_all(&self.pool)
        .await?;

        Ok(tasks)
    }

    async fn find(&self, owner: OwnerId, id: i64) -> Result<Option<Task>, StoreError> {
        let task = sqlx::query_as::<_, Task>(&format!(
            "SELECT {} FROM tasks WHERE id = $1 AND owner_id = $2",
            TASK_COLUMNS
        ))
        .bind(id)
        .bind(owner.get())
        .fetch_optional(&self.pool)
        .await?;

        Ok(task)
    }

    async fn insert(&self, owner: OwnerId, fields: &TaskFields, now: DateTime<Utc>) -> Result<Task, StoreError> {
        let task = sqlx::query_as::<_, Task>(&format!(
            "INSERT INTO tasks (owner_id, title, content, status, priority, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $6)
             RETURNING {}",
            TASK_COLUMNS
        ))
        .bind(owner.get())
        .bind(&fields.title)
        .bind(&fields.content)
        .bind(fields.status.unwrap_or_default())
        .bind(fields.priority.unwrap_or(0))
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(task)
    }

    async fn update(
        &self,
        owner: OwnerId,
        id: i64,
        fields: &TaskFields,
        now: DateTime<Utc>,
    ) -> Result<Option<Task>, StoreError> {
        let task = sqlx::query_as::<_, Task>(&format!(
            "UPDATE tasks
             SET title = $3,
                 content = $4,
                 status = COALESCE($5, status),
                 priority = COALESCE($6, priority),
                 updated_at = $7
             WHERE id = $1 AND owner_id = $2
             RETURNING {}",
            TASK_COLUMNS
        ))
        .bind(id)
        .bind(owner.get())
        .bind(&fields.title)
        .bind(&fields.content)
        .bind(fields.status)
        .bind(fields.priority)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        Ok(task)
    }

    async fn delete(&self, owner: OwnerId, id: i64) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = $1 AND owner_id = $2")
            .bind(id)
            .bind(owner.get())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
