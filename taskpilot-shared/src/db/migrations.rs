/// Schema migrations
///
/// Migrations live in `taskpilot-shared/migrations/` and are embedded into the
/// binary at compile time by `sqlx::migrate!`. They run at API startup before
/// the server binds its port.
///
/// # Example
///
/// ```no_run
/// use taskpilot_shared::db::pool::{create_pool, DatabaseConfig};
/// use taskpilot_shared::db::migrations::run_migrations;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = DatabaseConfig {
///     url: std::env::var("DATABASE_URL")?,
///     ..Default::default()
/// };
/// let pool = create_pool(&config).await?;
/// run_migrations(&pool).await?;
/// # Ok(())
/// # }
/// ```

use sqlx::{migrate::MigrateDatabase, postgres::PgPool, Postgres};
use tracing::{debug, info, warn};

/// Applies all pending migrations
///
/// # Errors
///
/// Returns an error if a migration fails or was modified after it was applied.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    info!("Running database migrations");

    sqlx::migrate!("./migrations").run(pool).await.map_err(|e| {
        warn!(error = %e, "Migration failed");
        e
    })?;

    info!("Database schema is up to date");
    Ok(())
}

/// Number of successfully applied migrations
pub async fn applied_migrations(pool: &PgPool) -> Result<i64, sqlx::Error> {
    let table_exists: bool = sqlx::query_scalar(
        "SELECT EXISTS (
            SELECT FROM information_schema.tables
            WHERE table_schema = 'public' AND table_name = '_sqlx_migrations'
        )",
    )
    .fetch_one(pool)
    .await?;

    if !table_exists {
        return Ok(0);
    }

    sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations WHERE success = true")
        .fetch_one(pool)
        .await
}

/// Creates the database named in `database_url` when it is missing
///
/// Meant for development and test setups.
pub async fn ensure_database_exists(database_url: &str) -> Result<(), sqlx::Error> {
    if Postgres::database_exists(database_url).await? {
        debug!("Database already exists");
    } else {
        info!("Database does not exist, creating it");
        Postgres::create_database(database_url).await?;
    }

    Ok(())
}
