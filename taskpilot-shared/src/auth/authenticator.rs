/// Login verification
///
/// The [`Authenticator`] checks a login attempt against the credential store
/// and produces the identity that goes into a session. Every failure, whether
/// the identifier is unknown, the password is wrong, or the stored hash is
/// corrupt, comes back as the same [`CoreError::InvalidCredentials`].

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use super::password::{PasswordHasher, PasswordVerification};
use crate::error::{CoreError, CoreResult};
use crate::models::user::CredentialStore;

/// Identity established by a successful login
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    /// User ID
    pub id: i64,

    /// Username
    pub username: String,

    /// Email address
    pub email: String,
}

/// Verifies identifier + password pairs
#[derive(Clone)]
pub struct Authenticator {
    store: Arc<dyn CredentialStore>,
    hasher: PasswordHasher,
    dummy_hash: Arc<OnceCell<String>>,
}

impl Authenticator {
    /// Creates an authenticator over `store`
    pub fn new(store: Arc<dyn CredentialStore>, hasher: PasswordHasher) -> Self {
        Self {
            store,
            hasher,
            dummy_hash: Arc::new(OnceCell::new()),
        }
    }

    /// Authenticates a login attempt
    ///
    /// # Errors
    ///
    /// - `CoreError::InvalidCredentials` for an unknown identifier, a wrong
    ///   password, or a malformed stored hash
    /// - `CoreError::Storage` if the credential lookup fails
    pub async fn authenticate(&self, identifier: &str, password: &str) -> CoreResult<AuthenticatedUser> {
        let user = self.store.find_by_username_or_email(identifier.trim()).await?;

        let Some(user) = user else {
            // Burn the same work as a real verification so timing does not
            // reveal whether the account exists
            let dummy = self.dummy_hash().await?;
            let _ = self.verify(dummy, password.to_string()).await?;
            debug!("Login rejected: unknown identifier");
            return Err(CoreError::InvalidCredentials);
        };

        match self.verify(user.password_hash.clone(), password.to_string()).await? {
            PasswordVerification::Match => {
                debug!(user_id = user.id, "Login accepted");
                Ok(AuthenticatedUser {
                    id: user.id,
                    username: user.username,
                    email: user.email,
                })
            }
            PasswordVerification::Mismatch => {
                debug!(user_id = user.id, "Login rejected: wrong password");
                Err(CoreError::InvalidCredentials)
            }
            PasswordVerification::MalformedHash => {
                warn!(user_id = user.id, "Stored password hash is malformed");
                Err(CoreError::InvalidCredentials)
            }
        }
    }

    /// Hashes a password on the blocking pool
    pub async fn hash(&self, password: String) -> CoreResult<String> {
        let hasher = self.hasher;
        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| CoreError::Internal(format!("Hashing task failed: {}", e)))?
            .map_err(|e| CoreError::Internal(e.to_string()))
    }

    async fn verify(&self, hash: String, password: String) -> CoreResult<PasswordVerification> {
        let hasher = self.hasher;
        tokio::task::spawn_blocking(move || hasher.verify(&hash, &password))
            .await
            .map_err(|e| CoreError::Internal(format!("Verification task failed: {}", e)))
    }

    async fn dummy_hash(&self) -> CoreResult<String> {
        self.dummy_hash
            .get_or_try_init(|| self.hash("taskpilot-dummy-password".to_string()))
            .await
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::password::HashParams;
    use crate::db::memory::MemoryCredentialStore;
    use crate::models::user::NewUser;
    use chrono::Utc;

    fn hasher() -> PasswordHasher {
        PasswordHasher::new(HashParams {
            memory_kib: 1024,
            iterations: 1,
            parallelism: 1,
        })
    }

    async fn setup() -> (Arc<MemoryCredentialStore>, Authenticator, i64) {
        let store = Arc::new(MemoryCredentialStore::new());
        let authenticator = Authenticator::new(store.clone(), hasher());

        let hash = authenticator.hash("pw1".to_string()).await.unwrap();
        let user = store
            .insert(
                NewUser::validated("alice", "a@x.com").unwrap().with_hash(hash),
                Utc::now(),
            )
            .await
            .unwrap();

        (store, authenticator, user.id)
    }

    #[tokio::test]
    async fn test_authenticate_by_username_and_email() {
        let (_store, authenticator, id) = setup().await;

        let by_name = authenticator.authenticate("alice", "pw1").await.unwrap();
        assert_eq!(by_name.id, id);
        assert_eq!(by_name.username, "alice");
        assert_eq!(by_name.email, "a@x.com");

        let by_email = authenticator.authenticate("A@X.com", "pw1").await.unwrap();
        assert_eq!(by_email, by_name);
    }

    #[tokio::test]
    async fn test_wrong_password_and_unknown_user_look_the_same() {
        let (_store, authenticator, _id) = setup().await;

        let wrong_password = authenticator.authenticate("alice", "pw2").await.unwrap_err();
        let unknown_user = authenticator.authenticate("bob", "pw1").await.unwrap_err();

        assert!(matches!(wrong_password, CoreError::InvalidCredentials));
        assert!(matches!(unknown_user, CoreError::InvalidCredentials));
        assert_eq!(wrong_password.to_string(), unknown_user.to_string());
    }

    #[tokio::test]
    async fn test_malformed_hash_is_invalid_credentials() {
        let store = Arc::new(MemoryCredentialStore::new());
        store
            .insert(
                NewUser::validated("carol", "c@x.com")
                    .unwrap()
                    .with_hash("corrupted".to_string()),
                Utc::now(),
            )
            .await
            .unwrap();

        let authenticator = Authenticator::new(store, hasher());
        let err = authenticator.authenticate("carol", "anything").await.unwrap_err();
        assert!(matches!(err, CoreError::InvalidCredentials));
    }
}
