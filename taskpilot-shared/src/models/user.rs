/// User model and credential store
///
/// This module provides the User model and the [`CredentialStore`] trait that
/// persists account identities together with their password hashes.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE users (
///     id BIGSERIAL PRIMARY KEY,
///     username VARCHAR(50) NOT NULL UNIQUE,
///     email VARCHAR(255) NOT NULL UNIQUE,
///     password_hash VARCHAR(255) NOT NULL,
///     created_at TIMESTAMPTZ NOT NULL
/// );
/// ```
///
/// # Normalization
///
/// Usernames are trimmed and compared case-sensitively. Emails are trimmed and
/// lowercased before they are stored or looked up, so `Alice@X.com` and
/// `alice@x.com` are the same account.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::ValidateEmail;

use crate::error::{CoreError, StoreError};

/// Maximum username length in characters
pub const USERNAME_MAX_LEN: usize = 50;

/// Minimum username length in characters
pub const USERNAME_MIN_LEN: usize = 3;

/// Maximum email length in characters
pub const EMAIL_MAX_LEN: usize = 255;

/// User model representing a registered account
///
/// The password hash is never serialized.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    /// Unique user ID
    pub id: i64,

    /// Unique login name
    pub username: String,

    /// Unique email address (lowercase)
    pub email: String,

    /// Argon2id password hash (PHC string)
    #[serde(skip_serializing, default)]
    pub password_hash: String,

    /// When the account was created
    pub created_at: DateTime<Utc>,
}

/// Input for creating a new user
///
/// Built through [`NewUser::validated`], which applies normalization and
/// rejects malformed input before storage is touched.
#[derive(Debug, Clone)]
pub struct NewUser {
    /// Normalized username
    pub username: String,

    /// Normalized email
    pub email: String,

    /// Argon2id password hash (NOT plaintext password!)
    pub password_hash: String,
}

impl NewUser {
    /// Validates and normalizes registration fields
    ///
    /// The hash is attached afterwards with [`NewUser::with_hash`], so no
    /// hashing work is spent on input that would be rejected anyway.
    pub fn validated(username: &str, email: &str) -> Result<Self, CoreError> {
        let username = normalize_username(username);
        let email = normalize_email(email);

        let length = username.chars().count();
        if length < USERNAME_MIN_LEN || length > USERNAME_MAX_LEN {
            return Err(CoreError::validation(
                "username",
                format!(
                    "must be between {} and {} characters",
                    USERNAME_MIN_LEN, USERNAME_MAX_LEN
                ),
            ));
        }

        if !username
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'))
        {
            return Err(CoreError::validation(
                "username",
                "may only contain letters, digits, '_', '-' and '.'",
            ));
        }

        if email.chars().count() > EMAIL_MAX_LEN || !email.validate_email() {
            return Err(CoreError::validation("email", "must be a valid email address"));
        }

        Ok(Self {
            username,
            email,
            password_hash: String::new(),
        })
    }

    /// Attaches the password hash
    pub fn with_hash(mut self, password_hash: String) -> Self {
        self.password_hash = password_hash;
        self
    }
}

/// Trims surrounding whitespace from a username
pub fn normalize_username(username: &str) -> String {
    username.trim().to_string()
}

/// Trims and lowercases an email address
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Persistent store for user identities and password hashes
///
/// Implementations must make [`CredentialStore::insert`] atomic with respect
/// to the uniqueness of both username and email: two concurrent inserts with
/// the same identifier must never both succeed.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Finds a user whose username equals `identifier` or whose email equals
    /// the normalized `identifier`
    ///
    /// When both a username and an email match different users, the user with
    /// the lowest id wins.
    async fn find_by_username_or_email(&self, identifier: &str) -> Result<Option<User>, StoreError>;

    /// Checks whether the username or the email is already registered
    async fn exists_by_username_or_email(&self, username: &str, email: &str) -> Result<bool, StoreError>;

    /// Inserts a new user
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Conflict` if the username or email is taken.
    async fn insert(&self, user: NewUser, created_at: DateTime<Utc>) -> Result<User, StoreError>;

    /// Finds a user by ID
    async fn find_by_id(&self, id: i64) -> Result<Option<User>, StoreError>;
}
