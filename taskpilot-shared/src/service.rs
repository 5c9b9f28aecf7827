//! TaskPilot core facade
//!
//! [`TaskPilot`] wires the credential store, authenticator, session issuer and
//! validator, and task repository together behind the operations the HTTP
//! layer calls. It holds no per-request state; one instance is shared by all
//! requests behind an `Arc`.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use chrono::Duration;
//! use taskpilot_shared::auth::jwt::SessionConfig;
//! use taskpilot_shared::auth::password::{HashParams, PasswordHasher};
//! use taskpilot_shared::clock::SystemClock;
//! use taskpilot_shared::models::task::TaskInput;
//! use taskpilot_shared::service::TaskPilot;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let session = SessionConfig::new("an-example-secret-of-at-least-32-bytes", Duration::hours(1));
//! let hasher = PasswordHasher::new(HashParams { memory_kib: 1024, iterations: 1, parallelism: 1 });
//! let core = TaskPilot::in_memory(hasher, &session, Arc::new(SystemClock));
//!
//! core.register("alice", "a@x.com", "pw1").await?;
//! let login = core.login("alice", "pw1").await?;
//! let ctx = core.current_user(&login.session.token)?;
//!
//! let task = core
//!     .save_task(&ctx, &TaskInput { title: "Buy milk".into(), priority: Some(1), ..Default::default() })
//!     .await?;
//! core.delete_task(&ctx, task.id).await?;
//! assert!(core.list_tasks(&ctx).await?.is_empty());
//! # Ok(())
//! # }
//! ```

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::auth::authenticator::{AuthenticatedUser, Authenticator};
use crate::auth::jwt::{IssuedSession, JwtError, SessionConfig, SessionIssuer, SessionValidator};
use crate::auth::middleware::AuthenticatedContext;
use crate::auth::password::PasswordHasher;
use crate::clock::SharedClock;
use crate::db::memory::{MemoryCredentialStore, MemoryTaskStore};
use crate::error::{CoreError, CoreResult};
use crate::models::task::{Task, TaskInput, TaskRepository, TaskStore};
use crate::models::user::{CredentialStore, NewUser, User};

/// Result of a successful login
#[derive(Debug, Clone, Serialize)]
pub struct LoginOutcome {
    /// Signed session
    pub session: IssuedSession,

    /// Identity the session was issued for
    pub user: AuthenticatedUser,
}

/// The task tracker core
pub struct TaskPilot {
    credentials: Arc<dyn CredentialStore>,
    authenticator: Authenticator,
    issuer: SessionIssuer,
    validator: SessionValidator,
    tasks: TaskRepository,
    clock: SharedClock,
    secure_cookies: bool,
}

impl TaskPilot {
    /// Assembles the core from its storage backends and configuration
    pub fn new(
        credentials: Arc<dyn CredentialStore>,
        tasks: Arc<dyn TaskStore>,
        hasher: PasswordHasher,
        session: &SessionConfig,
        clock: SharedClock,
    ) -> Self {
        Self {
            authenticator: Authenticator::new(credentials.clone(), hasher),
            credentials,
            issuer: SessionIssuer::new(session, clock.clone()),
            validator: SessionValidator::new(session, clock.clone()),
            tasks: TaskRepository::new(tasks, clock.clone()),
            clock,
            secure_cookies: session.secure_cookie(),
        }
    }

    /// Core over fresh in-memory stores
    pub fn in_memory(hasher: PasswordHasher, session: &SessionConfig, clock: SharedClock) -> Self {
        Self::new(
            Arc::new(MemoryCredentialStore::new()),
            Arc::new(MemoryTaskStore::new()),
            hasher,
            session,
            clock,
        )
    }

    /// Registers a new account and returns its id
    ///
    /// # Errors
    ///
    /// - `CoreError::Validation` for a malformed username, email, or empty password
    /// - `CoreError::Conflict` if the username or email is already registered
    pub async fn register(&self, username: &str, email: &str, password: &str) -> CoreResult<i64> {
        let new_user = NewUser::validated(username, email)?;
        if password.is_empty() {
            return Err(CoreError::validation("password", "must not be empty"));
        }

        // Early answer for the common case; the insert below is authoritative
        if self
            .credentials
            .exists_by_username_or_email(&new_user.username, &new_user.email)
            .await?
        {
            info!(username = %new_user.username, "Registration rejected: identity in use");
            return Err(CoreError::Conflict);
        }

        let hash = self.authenticator.hash(password.to_string()).await?;
        let user = self
            .credentials
            .insert(new_user.with_hash(hash), self.clock.now())
            .await
            .map_err(|e| {
                let err = CoreError::from(e);
                if matches!(err, CoreError::Conflict) {
                    info!("Registration lost a uniqueness race");
                }
                err
            })?;

        info!(user_id = user.id, username = %user.username, "User registered");
        Ok(user.id)
    }

    /// Verifies credentials and issues a session
    ///
    /// # Errors
    ///
    /// `CoreError::InvalidCredentials` for any authentication failure.
    pub async fn login(&self, identifier: &str, password: &str) -> CoreResult<LoginOutcome> {
        let user = self
            .authenticator
            .authenticate(identifier, password)
            .await
            .inspect_err(|e| {
                if matches!(e, CoreError::InvalidCredentials) {
                    info!("Login failed");
                }
            })?;

        let session = self
            .issuer
            .issue(&user)
            .map_err(|e| CoreError::Internal(e.to_string()))?;

        info!(user_id = user.id, "User logged in");
        Ok(LoginOutcome { session, user })
    }

    /// Resolves a session token to the caller's identity
    ///
    /// # Errors
    ///
    /// `CoreError::Unauthenticated` for any token defect.
    pub fn current_user(&self, token: &str) -> CoreResult<AuthenticatedContext> {
        self.validator.validate(token).map_err(|e| {
            match e {
                JwtError::Expired => info!("Rejected expired session"),
                other => warn!(reason = %other, "Rejected session token"),
            }
            CoreError::Unauthenticated
        })
    }

    /// Fresh session when sliding expiry calls for one
    pub fn renew_session(&self, ctx: &AuthenticatedContext) -> Option<IssuedSession> {
        match self.issuer.renew_if_due(ctx) {
            Ok(renewed) => renewed,
            Err(e) => {
                warn!(user_id = ctx.user_id(), error = %e, "Session renewal failed");
                None
            }
        }
    }

    /// Stored profile of the caller
    ///
    /// # Errors
    ///
    /// `CoreError::Unauthenticated` if the account no longer exists.
    pub async fn profile(&self, ctx: &AuthenticatedContext) -> CoreResult<User> {
        self.credentials
            .find_by_id(ctx.user_id())
            .await?
            .ok_or(CoreError::Unauthenticated)
    }

    /// The caller's tasks, newest first
    pub async fn list_tasks(&self, ctx: &AuthenticatedContext) -> CoreResult<Vec<Task>> {
        self.tasks.list(ctx.owner()).await
    }

    /// One of the caller's tasks
    pub async fn get_task(&self, ctx: &AuthenticatedContext, id: i64) -> CoreResult<Task> {
        self.tasks.find(ctx.owner(), id).await
    }

    /// Creates or updates one of the caller's tasks
    pub async fn save_task(&self, ctx: &AuthenticatedContext, input: &TaskInput) -> CoreResult<Task> {
        self.tasks.save(ctx.owner(), input).await
    }

    /// Deletes one of the caller's tasks; a no-op for anything else
    pub async fn delete_task(&self, ctx: &AuthenticatedContext, id: i64) -> CoreResult<()> {
        self.tasks.delete(ctx.owner(), id).await
    }

    /// Current time from the injected clock
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Whether session cookies carry the `Secure` attribute
    pub fn secure_cookies(&self) -> bool {
        self.secure_cookies
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::password::HashParams;
    use crate::clock::{Clock, ManualClock};
    use chrono::{Duration, TimeZone};

    const SECRET: &str = "unit-test-secret-that-is-32-bytes!!";

    fn core_with_clock(sliding: bool) -> (Arc<ManualClock>, TaskPilot) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 5, 1, 12, 0, 0).unwrap(),
        ));
        let hasher = PasswordHasher::new(HashParams {
            memory_kib: 1024,
            iterations: 1,
            parallelism: 1,
        });
        let session = SessionConfig::new(SECRET, Duration::minutes(60)).with_sliding(sliding);
        let core = TaskPilot::in_memory(hasher, &session, clock.clone());
        (clock, core)
    }

    #[tokio::test]
    async fn test_register_and_login() {
        let (_clock, core) = core_with_clock(false);

        let id = core.register("alice", "a@x.com", "pw1").await.unwrap();
        let login = core.login("alice", "pw1").await.unwrap();
        assert_eq!(login.user.id, id);

        let ctx = core.current_user(&login.session.token).unwrap();
        assert_eq!(ctx.user_id(), id);

        let profile = core.profile(&ctx).await.unwrap();
        assert_eq!(profile.email, "a@x.com");
    }

    #[tokio::test]
    async fn test_register_rejects_duplicates() {
        let (_clock, core) = core_with_clock(false);
        core.register("alice", "a@x.com", "pw1").await.unwrap();

        assert!(matches!(
            core.register("alice", "other@x.com", "pw").await,
            Err(CoreError::Conflict)
        ));
        assert!(matches!(
            core.register("alice2", "A@x.com", "pw").await,
            Err(CoreError::Conflict)
        ));
    }

    #[tokio::test]
    async fn test_register_rejects_empty_password() {
        let (_clock, core) = core_with_clock(false);
        let err = core.register("alice", "a@x.com", "").await.unwrap_err();
        assert!(matches!(err, CoreError::Validation { field: "password", .. }));
    }

    #[tokio::test]
    async fn test_expired_session_is_unauthenticated() {
        let (clock, core) = core_with_clock(false);
        core.register("alice", "a@x.com", "pw1").await.unwrap();
        let login = core.login("alice", "pw1").await.unwrap();

        clock.advance(Duration::minutes(61));
        assert!(matches!(
            core.current_user(&login.session.token),
            Err(CoreError::Unauthenticated)
        ));
    }

    #[tokio::test]
    async fn test_renew_session_only_when_sliding_and_due() {
        let (clock, core) = core_with_clock(true);
        core.register("alice", "a@x.com", "pw1").await.unwrap();
        let login = core.login("alice", "pw1").await.unwrap();

        let ctx = core.current_user(&login.session.token).unwrap();
        assert!(core.renew_session(&ctx).is_none());

        clock.advance(Duration::minutes(40));
        let ctx = core.current_user(&login.session.token).unwrap();
        let renewed = core.renew_session(&ctx).unwrap();
        assert_eq!(renewed.expires_at, clock.now() + Duration::minutes(60));

        let (_clock, fixed) = core_with_clock(false);
        fixed.register("bob", "b@x.com", "pw").await.unwrap();
        let login = fixed.login("bob", "pw").await.unwrap();
        let ctx = fixed.current_user(&login.session.token).unwrap();
        assert!(fixed.renew_session(&ctx).is_none());
    }

    #[tokio::test]
    async fn test_get_task_is_owner_scoped() {
        let (_clock, core) = core_with_clock(false);
        core.register("alice", "a@x.com", "pw1").await.unwrap();
        core.register("bob", "b@x.com", "pw2").await.unwrap();
        let alice = core
            .current_user(&core.login("alice", "pw1").await.unwrap().session.token)
            .unwrap();
        let bob = core
            .current_user(&core.login("bob", "pw2").await.unwrap().session.token)
            .unwrap();

        let task = core
            .save_task(
                &alice,
                &TaskInput {
                    title: "Buy milk".to_string(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(core.get_task(&alice, task.id).await.unwrap(), task);
        assert!(matches!(
            core.get_task(&bob, task.id).await,
            Err(CoreError::NotFoundOrForbidden)
        ));
        assert!(matches!(
            core.get_task(&alice, task.id + 1).await,
            Err(CoreError::NotFoundOrForbidden)
        ));
    }
}
