//! Error types for the TaskPilot core
//!
//! Every expected, user-caused outcome is a [`CoreError`] variant returned to
//! the caller. Only [`CoreError::Storage`] and [`CoreError::Internal`] indicate
//! infrastructure problems; the HTTP layer reports those without details.
//!
//! Ownership mismatches and missing rows share the single
//! [`CoreError::NotFoundOrForbidden`] variant so callers cannot tell them apart.

/// Errors surfaced by the storage backends
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A uniqueness constraint rejected the write
    #[error("Unique constraint violated")]
    Conflict,

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Errors returned by the core operations
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// Unknown identifier, wrong password, or corrupt stored hash
    #[error("Invalid username or password")]
    InvalidCredentials,

    /// Username or email already registered
    #[error("Username or email is already in use")]
    Conflict,

    /// Input rejected before reaching storage
    #[error("Invalid {field}: {message}")]
    Validation {
        /// Offending input field
        field: &'static str,

        /// Human-readable reason
        message: String,
    },

    /// Missing, malformed, tampered, or expired session
    #[error("Authentication required")]
    Unauthenticated,

    /// Task does not exist or belongs to another user
    #[error("Not found")]
    NotFoundOrForbidden,

    /// Storage backend failure
    #[error("Storage failure: {0}")]
    Storage(String),

    /// Unexpected internal failure (hashing, token encoding, task join)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Shorthand for a validation failure on `field`
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        CoreError::Validation {
            field,
            message: message.into(),
        }
    }
}

impl From<StoreError> for CoreError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict => CoreError::Conflict,
            StoreError::Database(e) => CoreError::Storage(e.to_string()),
        }
    }
}

/// Result alias for core operations
pub type CoreResult<T> = Result<T, CoreError>;
