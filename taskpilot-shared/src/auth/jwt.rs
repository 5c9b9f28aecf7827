/// Session token issuance and validation
///
/// Sessions are stateless HS256 JWTs. The token carries the user's identity
/// claims, so validating a request never touches the credential store; the
/// signature and the expiry are the only things checked. Rotating the signing
/// secret invalidates every outstanding session.
///
/// # Security
///
/// - **Algorithm**: HS256 (HMAC with SHA-256), no other algorithm accepted
/// - **Expiration**: configurable TTL, optionally sliding
/// - **Validation**: signature, issuer, `nbf` and `exp` against the injected clock
/// - **Secret Management**: secrets should be at least 32 bytes (256 bits)
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use chrono::Duration;
/// use taskpilot_shared::auth::authenticator::AuthenticatedUser;
/// use taskpilot_shared::auth::jwt::{SessionConfig, SessionIssuer, SessionValidator};
/// use taskpilot_shared::clock::SystemClock;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = SessionConfig::new("your-secret-key-at-least-32-bytes", Duration::hours(1));
/// let issuer = SessionIssuer::new(&config, Arc::new(SystemClock));
/// let validator = SessionValidator::new(&config, Arc::new(SystemClock));
///
/// let user = AuthenticatedUser { id: 1, username: "alice".into(), email: "a@x.com".into() };
/// let session = issuer.issue(&user)?;
///
/// let context = validator.validate(&session.token)?;
/// assert_eq!(context.user_id(), 1);
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use super::authenticator::AuthenticatedUser;
use super::middleware::AuthenticatedContext;
use crate::clock::SharedClock;

/// Issuer claim stamped on every session token
pub const ISSUER: &str = "taskpilot";

/// Error type for session token operations
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    /// Failed to create token
    #[error("Failed to create token: {0}")]
    CreateError(String),

    /// Signature, issuer, or structure rejected
    #[error("Failed to validate token: {0}")]
    ValidationError(String),

    /// Token has expired
    #[error("Token has expired")]
    Expired,

    /// Token used before its `nbf` time
    #[error("Token is not valid yet")]
    NotYetValid,

    /// Identity claims are missing or malformed
    #[error("Invalid token claims: {0}")]
    InvalidClaims(String),
}

/// Session token claims
///
/// # Standard Claims
///
/// - `sub`: Subject (user ID, decimal string)
/// - `iss`: Issuer (always "taskpilot")
/// - `iat`: Issued at timestamp
/// - `exp`: Expiration timestamp
/// - `nbf`: Not before timestamp
/// - `jti`: Unique token ID
///
/// # Custom Claims
///
/// - `username`, `email`: identity at issuance time, not re-fetched per request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject - User ID
    pub sub: String,

    /// Issuer - Always "taskpilot"
    pub iss: String,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration time (Unix timestamp)
    pub exp: i64,

    /// Not before (Unix timestamp)
    pub nbf: i64,

    /// Token ID
    pub jti: Uuid,

    /// Username at login time
    pub username: String,

    /// Email at login time
    pub email: String,
}

impl Claims {
    /// Builds claims for `user`, valid from `now` for `ttl`
    ///
    /// # Errors
    ///
    /// Returns `JwtError::CreateError` if `now + ttl` is out of range
    pub fn for_user(user: &AuthenticatedUser, now: DateTime<Utc>, ttl: Duration) -> Result<Self, JwtError> {
        let expires_at = now
            .checked_add_signed(ttl)
            .ok_or_else(|| JwtError::CreateError("Session lifetime is out of range".to_string()))?;

        Ok(Self {
            sub: user.id.to_string(),
            iss: ISSUER.to_string(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            nbf: now.timestamp(),
            jti: Uuid::new_v4(),
            username: user.username.clone(),
            email: user.email.clone(),
        })
    }

    /// Checks if the claims have expired at `now`
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now.timestamp() >= self.exp
    }

    /// Parses the subject into a user ID
    ///
    /// Fails closed: anything other than a positive integer is rejected.
    pub fn user_id(&self) -> Result<i64, JwtError> {
        match self.sub.parse::<i64>() {
            Ok(id) if id > 0 => Ok(id),
            _ => Err(JwtError::InvalidClaims("subject is not a user id".to_string())),
        }
    }
}

/// Session settings loaded once at startup
#[derive(Clone)]
pub struct SessionConfig {
    secret: String,
    ttl: Duration,
    sliding: bool,
    secure_cookie: bool,
}

impl SessionConfig {
    /// Creates a fixed-expiry configuration
    pub fn new(secret: impl Into<String>, ttl: Duration) -> Self {
        Self {
            secret: secret.into(),
            ttl,
            sliding: false,
            secure_cookie: false,
        }
    }

    /// Enables or disables sliding expiry
    pub fn with_sliding(mut self, sliding: bool) -> Self {
        self.sliding = sliding;
        self
    }

    /// Marks the session cookie `Secure` (HTTPS deployments)
    pub fn with_secure_cookie(mut self, secure: bool) -> Self {
        self.secure_cookie = secure;
        self
    }

    /// Session lifetime
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Whether sessions are renewed as they are used
    pub fn sliding(&self) -> bool {
        self.sliding
    }

    /// Whether the session cookie carries the `Secure` attribute
    pub fn secure_cookie(&self) -> bool {
        self.secure_cookie
    }
}

impl std::fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionConfig")
            .field("secret", &"<redacted>")
            .field("ttl", &self.ttl)
            .field("sliding", &self.sliding)
            .field("secure_cookie", &self.secure_cookie)
            .finish()
    }
}

/// A freshly signed session
#[derive(Debug, Clone, Serialize)]
pub struct IssuedSession {
    /// Signed token handed to the client
    pub token: String,

    /// When the token stops being accepted
    pub expires_at: DateTime<Utc>,
}

/// Signs session tokens
#[derive(Clone)]
pub struct SessionIssuer {
    key: EncodingKey,
    ttl: Duration,
    sliding: bool,
    clock: SharedClock,
}

impl SessionIssuer {
    /// Creates an issuer from the process-wide session configuration
    pub fn new(config: &SessionConfig, clock: SharedClock) -> Self {
        Self {
            key: EncodingKey::from_secret(config.secret.as_bytes()),
            ttl: config.ttl,
            sliding: config.sliding,
            clock,
        }
    }

    /// Issues a session token for an authenticated user
    ///
    /// # Errors
    ///
    /// Returns `JwtError::CreateError` if the expiry is out of range or token
    /// encoding fails
    pub fn issue(&self, user: &AuthenticatedUser) -> Result<IssuedSession, JwtError> {
        let claims = Claims::for_user(user, self.clock.now(), self.ttl)?;

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.key)
            .map_err(|e| JwtError::CreateError(format!("Token encoding failed: {}", e)))?;

        Ok(IssuedSession {
            token,
            expires_at: DateTime::from_timestamp(claims.exp, 0).unwrap_or_default(),
        })
    }

    /// Re-issues the session when sliding expiry is on and less than half of
    /// the lifetime remains
    pub fn renew_if_due(&self, context: &AuthenticatedContext) -> Result<Option<IssuedSession>, JwtError> {
        if !self.sliding {
            return Ok(None);
        }

        let remaining = context.expires_at() - self.clock.now();
        if remaining >= self.ttl / 2 {
            return Ok(None);
        }

        debug!(user_id = context.user_id(), "Renewing sliding session");
        self.issue(&context.to_user()).map(Some)
    }
}

/// Verifies session tokens
#[derive(Clone)]
pub struct SessionValidator {
    key: DecodingKey,
    validation: Validation,
    clock: SharedClock,
}

impl SessionValidator {
    /// Creates a validator from the process-wide session configuration
    pub fn new(config: &SessionConfig, clock: SharedClock) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[ISSUER]);
        // Time-based checks run against the injected clock below
        validation.validate_exp = false;
        validation.validate_nbf = false;

        Self {
            key: DecodingKey::from_secret(config.secret.as_bytes()),
            validation,
            clock,
        }
    }

    /// Decodes the token and checks signature, issuer, and time window
    ///
    /// # Errors
    ///
    /// - `JwtError::ValidationError` for bad signatures, wrong issuer, or garbage input
    /// - `JwtError::Expired` / `JwtError::NotYetValid` outside the validity window
    /// - `JwtError::InvalidClaims` for a malformed subject or blank identity claims
    pub fn validate_claims(&self, token: &str) -> Result<Claims, JwtError> {
        let claims = decode::<Claims>(token, &self.key, &self.validation)
            .map_err(|e| JwtError::ValidationError(format!("Token validation failed: {}", e)))?
            .claims;

        let now = self.clock.now();
        if claims.is_expired_at(now) {
            return Err(JwtError::Expired);
        }
        if now.timestamp() < claims.nbf {
            return Err(JwtError::NotYetValid);
        }

        Ok(claims)
    }

    /// Validates a token and produces the authenticated context
    pub fn validate(&self, token: &str) -> Result<AuthenticatedContext, JwtError> {
        let claims = self.validate_claims(token)?;
        let user_id = claims.user_id()?;

        if claims.username.trim().is_empty() || claims.email.trim().is_empty() {
            return Err(JwtError::InvalidClaims("identity claims are empty".to_string()));
        }

        let expires_at = DateTime::from_timestamp(claims.exp, 0)
            .ok_or_else(|| JwtError::InvalidClaims("expiry out of range".to_string()))?;

        Ok(AuthenticatedContext::new(
            user_id,
            claims.username,
            claims.email,
            expires_at,
        ))
    }
}
