/// In-memory storage backends
///
/// Process-local implementations of [`CredentialStore`] and [`TaskStore`].
/// They keep the same guarantees as the Postgres backends (atomic uniqueness
/// on insert, owner filtering on every access) and back
/// [`TaskPilot::in_memory`](crate::service::TaskPilot::in_memory), which the
/// test suites use.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use tokio::sync::RwLock;

use crate::error::StoreError;
use crate::models::task::{OwnerId, Task, TaskFields, TaskStore};
use crate::models::user::{normalize_email, CredentialStore, NewUser, User};

struct Table<T> {
    next_id: i64,
    rows: BTreeMap<i64, T>,
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Self {
            next_id: 0,
            rows: BTreeMap::new(),
        }
    }
}

impl<T> Table<T> {
    fn allocate_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// Credential store backed by a map
#[derive(Default)]
pub struct MemoryCredentialStore {
    users: RwLock<Table<User>>,
}

impl MemoryCredentialStore {
    /// Creates an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered users
    pub async fn len(&self) -> usize {
        self.users.read().await.rows.len()
    }

    /// Whether no user is registered
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn find_by_username_or_email(&self, identifier: &str) -> Result<Option<User>, StoreError> {
        let email = normalize_email(identifier);
        let users = self.users.read().await;

        // BTreeMap iterates in id order, so the lowest id wins
        Ok(users
            .rows
            .values()
            .find(|u| u.username == identifier || u.email == email)
            .cloned())
    }

    async fn exists_by_username_or_email(&self, username: &str, email: &str) -> Result<bool, StoreError> {
        let users = self.users.read().await;
        Ok(users
            .rows
            .values()
            .any(|u| u.username == username || u.email == email))
    }

    async fn insert(&self, user: NewUser, created_at: DateTime<Utc>) -> Result<User, StoreError> {
        // Check and insert under one write lock
        let mut users = self.users.write().await;

        if users
            .rows
            .values()
            .any(|u| u.username == user.username || u.email == user.email)
        {
            return Err(StoreError::Conflict);
        }

        let id = users.allocate_id();
        let row = User {
            id,
            username: user.username,
            email: user.email,
            password_hash: user.password_hash,
            created_at,
        };
        users.rows.insert(id, row.clone());

        Ok(row)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<User>, StoreError> {
        Ok(self.users.read().await.rows.get(&id).cloned())
    }
}

/// Task store backed by a map
#[derive(Default)]
pub struct MemoryTaskStore {
    tasks: RwLock<Table<Task>>,
}

impl MemoryTaskStore {
    /// Creates an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of tasks across all owners
    pub async fn len(&self) -> usize {
        self.tasks.read().await.rows.len()
    }

    /// Whether the store holds no tasks
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl TaskStore for MemoryTaskStore {
    async fn list(&self, owner: OwnerId) -> Result<Vec<Task>, StoreError> {
        let tasks = self.tasks.read().await;

        let mut owned: Vec<Task> = tasks
            .rows
            .values()
            .filter(|t| t.owner_id == owner.get())
            .cloned()
            .collect();
        owned.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        Ok(owned)
    }

    async fn find(&self, owner: OwnerId, id: i64) -> Result<Option<Task>, StoreError> {
        let tasks = self.tasks.read().await;
        Ok(tasks
            .rows
            .get(&id)
            .filter(|t| t.owner_id == owner.get())
            .cloned())
    }

    async fn insert(&self, owner: OwnerId, fields: &TaskFields, now: DateTime<Utc>) -> Result<Task, StoreError> {
        let mut tasks = self.tasks.write().await;

        let id = tasks.allocate_id();
        let task = Task {
            id,
            owner_id: owner.get(),
            title: fields.title.clone(),
            content: fields.content.clone(),
            status: fields.status.unwrap_or_default(),
            priority: fields.priority.unwrap_or(0),
            created_at: now,
            updated_at: now,
        };
        tasks.rows.insert(id, task.clone());

        Ok(task)
    }

    async fn update(
        &self,
        owner: OwnerId,
        id: i64,
        fields: &TaskFields,
        now: DateTime<Utc>,
    ) -> Result<Option<Task>, StoreError> {
        let mut tasks = self.tasks.write().await;

        let Some(task) = tasks
            .rows
            .get_mut(&id)
            .filter(|t| t.owner_id == owner.get())
        else {
            return Ok(None);
        };

        task.title = fields.title.clone();
        task.content = fields.content.clone();
        if let Some(status) = fields.status {
            task.status = status;
        }
        if let Some(priority) = fields.priority {
            task.priority = priority;
        }
        task.updated_at = now;

        Ok(Some(task.clone()))
    }

    async fn delete(&self, owner: OwnerId, id: i64) -> Result<bool, StoreError> {
        let mut tasks = self.tasks.write().await;

        let owned = tasks
            .rows
            .get(&id)
            .is_some_and(|t| t.owner_id == owner.get());
        if owned {
            tasks.rows.remove(&id);
        }

        Ok(owned)
    }
}
