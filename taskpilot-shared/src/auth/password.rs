/// Password hashing module using Argon2id
///
/// This module provides the one-way hash and verification used for account
/// credentials. Hashes are PHC strings, so the algorithm, cost parameters and
/// the per-call random salt travel with the stored value.
///
/// # Security
///
/// - **Algorithm**: Argon2id (hybrid of Argon2i and Argon2d)
/// - **Memory**: 64 MB (65536 KB) by default
/// - **Iterations**: 3 passes by default
/// - **Parallelism**: 4 lanes by default
/// - **Output**: 32-byte hash
/// - **Salt**: 16 random bytes per call, so equal passwords never hash alike
///
/// Verification never fails on attacker-controlled input: a corrupt stored
/// hash is reported as [`PasswordVerification::MalformedHash`].
///
/// # Example
///
/// ```
/// use taskpilot_shared::auth::password::{HashParams, PasswordHasher, PasswordVerification};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let hasher = PasswordHasher::new(HashParams::default());
/// let hash = hasher.hash("super_secret_password_123")?;
///
/// assert_eq!(hasher.verify(&hash, "super_secret_password_123"), PasswordVerification::Match);
/// assert_eq!(hasher.verify(&hash, "wrong_password"), PasswordVerification::Mismatch);
/// # Ok(())
/// # }
/// ```

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, ParamsBuilder, Version,
};

/// Error type for password hashing operations
#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    /// Cost parameters rejected by Argon2
    #[error("Invalid hashing parameters: {0}")]
    InvalidParams(String),

    /// Failed to hash password
    #[error("Failed to hash password: {0}")]
    HashError(String),
}

/// Outcome of checking a password against a stored hash
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordVerification {
    /// Password matches the hash
    Match,

    /// Hash is well-formed but the password is wrong
    Mismatch,

    /// Stored value is not a usable PHC hash
    MalformedHash,
}

/// Argon2id cost parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashParams {
    /// Memory cost in KiB
    pub memory_kib: u32,

    /// Number of passes
    pub iterations: u32,

    /// Degree of parallelism (lanes)
    pub parallelism: u32,
}

impl Default for HashParams {
    fn default() -> Self {
        Self {
            memory_kib: 65536, // 64 MB
            iterations: 3,
            parallelism: 4,
        }
    }
}

impl HashParams {
    /// Checks the costs against Argon2's limits
    ///
    /// # Errors
    ///
    /// Returns `PasswordError::InvalidParams` if Argon2 would refuse them, for
    /// example zero lanes or less than 8 KiB of memory per lane.
    pub fn validate(&self) -> Result<(), PasswordError> {
        self.argon2_params().map(|_| ())
    }

    fn argon2_params(&self) -> Result<Params, PasswordError> {
        ParamsBuilder::new()
            .m_cost(self.memory_kib)
            .t_cost(self.iterations)
            .p_cost(self.parallelism)
            .output_len(32)
            .build()
            .map_err(|e| PasswordError::InvalidParams(e.to_string()))
    }
}

/// Argon2id password hasher
///
/// Cheap to clone; holds only the cost parameters used for new hashes.
#[derive(Debug, Clone, Copy, Default)]
pub struct PasswordHasher {
    params: HashParams,
}

impl PasswordHasher {
    /// Creates a hasher producing hashes with the given cost parameters
    pub fn new(params: HashParams) -> Self {
        Self { params }
    }

    /// Cost parameters used for new hashes
    pub fn params(&self) -> HashParams {
        self.params
    }

    /// Hashes a password using Argon2id with a fresh random salt
    ///
    /// # Returns
    ///
    /// PHC string format hash (includes algorithm, parameters, salt, and hash)
    ///
    /// Example output:
    /// ```text
    /// $argon2id$v=19$m=65536,t=3,p=4$c2FsdHNhbHRzYWx0$hash...
    /// ```
    ///
    /// # Errors
    ///
    /// Returns `PasswordError::InvalidParams` if the configured costs are out of
    /// range, `PasswordError::HashError` if hashing itself fails.
    pub fn hash(&self, password: &str) -> Result<String, PasswordError> {
        let salt = SaltString::generate(&mut OsRng);

        let params = self.params.argon2_params()?;

        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

        let password_hash = argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| PasswordError::HashError(format!("Hash generation failed: {}", e)))?;

        Ok(password_hash.to_string())
    }

    /// Verifies a password against a stored hash
    ///
    /// Parameters are read from the stored hash, not from `self`, so hashes
    /// created under older cost settings keep verifying. The comparison is
    /// constant-time.
    pub fn verify(&self, hash: &str, password: &str) -> PasswordVerification {
        let parsed_hash = match PasswordHash::new(hash) {
            Ok(parsed) => parsed,
            Err(_) => return PasswordVerification::MalformedHash,
        };

        match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
            Ok(()) => PasswordVerification::Match,
            Err(argon2::password_hash::Error::Password) => PasswordVerification::Mismatch,
            Err(_) => PasswordVerification::MalformedHash,
        }
    }
}
