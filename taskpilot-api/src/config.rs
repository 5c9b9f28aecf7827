/// Configuration management for the API server
///
/// Configuration is read once at startup from environment variables (a `.env`
/// file is honoured in development) and layered over built-in defaults with
/// the `config` crate.
///
/// # Environment Variables
///
/// - `DATABASE_URL`: PostgreSQL connection string (required)
/// - `DATABASE_MAX_CONNECTIONS`: Pool size (default: 10)
/// - `API_HOST`: Host to bind to (default: 0.0.0.0)
/// - `API_PORT`: Port to bind to (default: 8080)
/// - `CORS_ORIGINS`: Comma-separated allowed origins (default: `*`)
/// - `PRODUCTION`: Enables HSTS and `Secure` cookies (default: false)
/// - `SESSION_SECRET`: Session signing key, at least 32 characters (required)
/// - `SESSION_TTL_MINUTES`: Session lifetime, at most ten years (default: 60)
/// - `SESSION_SLIDING`: Renew sessions as they are used (default: true)
/// - `PASSWORD_MEMORY_KIB`, `PASSWORD_ITERATIONS`, `PASSWORD_PARALLELISM`:
///   Argon2id cost, checked against Argon2 limits (defaults: 65536, 3, 4)
/// - `LOG_FORMAT`: `pretty` or `json` (default: pretty)
/// - `RUST_LOG`: Log filter
///
/// # Example
///
/// ```no_run
/// use taskpilot_api::config::Config;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// println!("Server will listen on {}", config.bind_address());
/// # Ok(())
/// # }
/// ```

use anyhow::Context;
use chrono::Duration;
use serde::Deserialize;
use taskpilot_shared::auth::jwt::SessionConfig;
use taskpilot_shared::auth::password::HashParams;
use taskpilot_shared::db::pool::DatabaseConfig;

/// Minimum session secret length in characters
pub const MIN_SECRET_LEN: usize = 32;

/// Longest accepted session lifetime in minutes (ten years)
pub const MAX_SESSION_TTL_MINUTES: i64 = 525_600 * 10;

/// Complete application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// API server configuration
    pub api: ApiConfig,

    /// Database configuration
    pub database: DatabaseSettings,

    /// Session configuration
    pub session: SessionSettings,

    /// Password hashing cost
    pub password: HashParams,

    /// Log output format
    pub log_format: LogFormat,
}

/// API server configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Host to bind to
    pub host: String,

    /// Port to bind to
    pub port: u16,

    /// Allowed CORS origins (`*` for any)
    pub cors_origins: Vec<String>,

    /// Production mode (HSTS, `Secure` cookies)
    pub production: bool,
}

/// Database configuration
#[derive(Clone)]
pub struct DatabaseSettings {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in pool
    pub max_connections: u32,
}

/// Session configuration
#[derive(Clone)]
pub struct SessionSettings {
    /// Signing secret
    ///
    /// Generate with: `openssl rand -hex 32`
    pub secret: String,

    /// Session lifetime in minutes
    pub ttl_minutes: i64,

    /// Sliding expiry
    pub sliding: bool,
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines
    #[default]
    Pretty,

    /// One JSON object per event
    Json,
}

impl std::fmt::Debug for DatabaseSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseSettings")
            .field("url", &"<redacted>")
            .field("max_connections", &self.max_connections)
            .finish()
    }
}

impl std::fmt::Debug for SessionSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionSettings")
            .field("secret", &"<redacted>")
            .field("ttl_minutes", &self.ttl_minutes)
            .field("sliding", &self.sliding)
            .finish()
    }
}

/// Flat view of the environment, one field per variable
#[derive(Deserialize)]
struct RawSettings {
    database_url: Option<String>,
    database_max_connections: u32,
    api_host: String,
    api_port: u16,
    cors_origins: String,
    production: bool,
    session_secret: Option<String>,
    session_ttl_minutes: i64,
    session_sliding: bool,
    password_memory_kib: u32,
    password_iterations: u32,
    password_parallelism: u32,
    log_format: LogFormat,
}

impl Config {
    /// Loads configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Required environment variables are missing
    /// - Environment variables have invalid values
    pub fn from_env() -> anyhow::Result<Self> {
        // Load .env file if present (for development)
        dotenvy::dotenv().ok();

        Self::from_source(config::Environment::default())
    }

    /// Loads configuration from an explicit set of variables
    pub fn from_vars<I, K, V>(vars: I) -> anyhow::Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let map: config::Map<String, String> = vars
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();

        Self::from_source(config::Environment::default().source(Some(map)))
    }

    fn from_source(environment: config::Environment) -> anyhow::Result<Self> {
        let raw: RawSettings = config::Config::builder()
            .set_default("database_max_connections", 10)?
            .set_default("api_host", "0.0.0.0")?
            .set_default("api_port", 8080)?
            .set_default("cors_origins", "*")?
            .set_default("production", false)?
            .set_default("session_ttl_minutes", 60)?
            .set_default("session_sliding", true)?
            .set_default("password_memory_kib", 65536)?
            .set_default("password_iterations", 3)?
            .set_default("password_parallelism", 4)?
            .set_default("log_format", "pretty")?
            .add_source(environment.try_parsing(true))
            .build()?
            .try_deserialize()
            .context("Invalid configuration value")?;

        let database_url = raw
            .database_url
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| anyhow::anyhow!("DATABASE_URL environment variable is required"))?;

        let session_secret = raw
            .session_secret
            .ok_or_else(|| anyhow::anyhow!("SESSION_SECRET environment variable is required"))?;

        if session_secret.chars().count() < MIN_SECRET_LEN {
            anyhow::bail!("SESSION_SECRET must be at least {} characters long", MIN_SECRET_LEN);
        }

        if raw.session_ttl_minutes <= 0 {
            anyhow::bail!("SESSION_TTL_MINUTES must be positive");
        }

        if raw.session_ttl_minutes > MAX_SESSION_TTL_MINUTES {
            anyhow::bail!(
                "SESSION_TTL_MINUTES must be at most {}",
                MAX_SESSION_TTL_MINUTES
            );
        }

        let password = HashParams {
            memory_kib: raw.password_memory_kib,
            iterations: raw.password_iterations,
            parallelism: raw.password_parallelism,
        };
        password
            .validate()
            .context("Invalid PASSWORD_MEMORY_KIB, PASSWORD_ITERATIONS or PASSWORD_PARALLELISM")?;

        let cors_origins = raw
            .cors_origins
            .split(',')
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .map(str::to_string)
            .collect();

        Ok(Self {
            api: ApiConfig {
                host: raw.api_host,
                port: raw.api_port,
                cors_origins,
                production: raw.production,
            },
            database: DatabaseSettings {
                url: database_url,
                max_connections: raw.database_max_connections,
            },
            session: SessionSettings {
                secret: session_secret,
                ttl_minutes: raw.session_ttl_minutes,
                sliding: raw.session_sliding,
            },
            password,
            log_format: raw.log_format,
        })
    }

    /// Returns the server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }

    /// Session settings for the core
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig::new(
            self.session.secret.clone(),
            Duration::minutes(self.session.ttl_minutes),
        )
        .with_sliding(self.session.sliding)
        .with_secure_cookie(self.api.production)
    }

    /// Connection pool settings
    pub fn database_config(&self) -> DatabaseConfig {
        DatabaseConfig {
            url: self.database.url.clone(),
            max_connections: self.database.max_connections,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret-key-at-least-32-bytes-long";

    fn required() -> Vec<(&'static str, &'static str)> {
        vec![
            ("DATABASE_URL", "postgresql://localhost/test"),
            ("SESSION_SECRET", SECRET),
        ]
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_vars(required()).unwrap();

        assert_eq!(config.bind_address(), "0.0.0.0:8080");
        assert_eq!(config.api.cors_origins, vec!["*"]);
        assert!(!config.api.production);
        assert_eq!(config.database.max_connections, 10);
        assert_eq!(config.session.ttl_minutes, 60);
        assert!(config.session.sliding);
        assert_eq!(config.password.memory_kib, 65536);
        assert_eq!(config.password.iterations, 3);
        assert_eq!(config.password.parallelism, 4);
        assert_eq!(config.log_format, LogFormat::Pretty);
    }

    #[test]
    fn test_overrides() {
        let mut vars = required();
        vars.extend([
            ("API_HOST", "127.0.0.1"),
            ("API_PORT", "3000"),
            ("CORS_ORIGINS", "https://a.example, https://b.example"),
            ("PRODUCTION", "true"),
            ("SESSION_TTL_MINUTES", "15"),
            ("SESSION_SLIDING", "false"),
            ("LOG_FORMAT", "json"),
        ]);

        let config = Config::from_vars(vars).unwrap();
        assert_eq!(config.bind_address(), "127.0.0.1:3000");
        assert_eq!(
            config.api.cors_origins,
            vec!["https://a.example", "https://b.example"]
        );
        assert!(config.api.production);
        assert_eq!(config.log_format, LogFormat::Json);

        let session = config.session_config();
        assert_eq!(session.ttl(), Duration::minutes(15));
        assert!(!session.sliding());
        assert!(session.secure_cookie());
    }

    #[test]
    fn test_missing_required_values() {
        let err = Config::from_vars([("SESSION_SECRET", SECRET)]).unwrap_err();
        assert!(err.to_string().contains("DATABASE_URL"));

        let err = Config::from_vars([("DATABASE_URL", "postgresql://localhost/test")]).unwrap_err();
        assert!(err.to_string().contains("SESSION_SECRET"));
    }

    #[test]
    fn test_short_secret_rejected() {
        let err = Config::from_vars([
            ("DATABASE_URL", "postgresql://localhost/test"),
            ("SESSION_SECRET", "too-short"),
        ])
        .unwrap_err();

        assert!(err.to_string().contains("at least 32"));
    }

    #[test]
    fn test_session_ttl_bounds() {
        for ttl in ["0", "-5", "5256001", "100000000000000"] {
            let mut vars = required();
            vars.push(("SESSION_TTL_MINUTES", ttl));

            let err = Config::from_vars(vars).unwrap_err();
            assert!(err.to_string().contains("SESSION_TTL_MINUTES"), "ttl {}", ttl);
        }

        let mut vars = required();
        vars.push(("SESSION_TTL_MINUTES", "5256000"));
        let config = Config::from_vars(vars).unwrap();
        assert_eq!(config.session_config().ttl(), Duration::minutes(MAX_SESSION_TTL_MINUTES));
    }

    #[test]
    fn test_unusable_password_costs_rejected() {
        let cases: [&[(&str, &str)]; 3] = [
            &[("PASSWORD_PARALLELISM", "0")],
            &[("PASSWORD_ITERATIONS", "0")],
            &[("PASSWORD_MEMORY_KIB", "16"), ("PASSWORD_PARALLELISM", "4")],
        ];

        for extra in cases {
            let mut vars = required();
            vars.extend_from_slice(extra);

            let err = Config::from_vars(vars).unwrap_err();
            assert!(err.to_string().contains("PASSWORD_"), "{:?}", extra);
        }
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = Config::from_vars(required()).unwrap();
        let debug = format!("{:?}", config);

        assert!(!debug.contains(SECRET));
        assert!(!debug.contains("postgresql://"));
    }
}
