/// Authentication and session handling
///
/// # Modules
///
/// - [`password`]: Argon2id password hashing and verification
/// - [`authenticator`]: Login verification against the credential store
/// - [`jwt`]: Session token issuance and validation
/// - [`middleware`]: Axum session guard and the authenticated context
///
/// # Security Features
///
/// - **Password Hashing**: Argon2id with 64 MB memory, 3 iterations by default
/// - **Uniform Failures**: unknown users and wrong passwords produce the same error
/// - **Session Tokens**: HS256 signing with configurable, optionally sliding expiry
/// - **Fail Closed**: any defect in a session token means "not authenticated"
///
/// # Example
///
/// ```no_run
/// use taskpilot_shared::auth::password::{PasswordHasher, PasswordVerification};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let hasher = PasswordHasher::default();
/// let hash = hasher.hash("user_password")?;
/// assert_eq!(hasher.verify(&hash, "user_password"), PasswordVerification::Match);
/// # Ok(())
/// # }
/// ```

pub mod authenticator;
pub mod jwt;
pub mod middleware;
pub mod password;
