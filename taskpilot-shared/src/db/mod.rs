/// Storage layer for TaskPilot
///
/// # Modules
///
/// - `pool`: PostgreSQL connection pool with health checks
/// - `migrations`: Embedded schema migrations
/// - `postgres`: Postgres-backed credential and task stores
/// - `memory`: In-process credential and task stores
///
/// The store traits themselves live next to their models in `models`.
///
/// # Example
///
/// ```no_run
/// use taskpilot_shared::db::pool::{create_pool, DatabaseConfig};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = DatabaseConfig {
///         url: std::env::var("DATABASE_URL")?,
///         ..Default::default()
///     };
///
///     let pool = create_pool(&config).await?;
///     Ok(())
/// }
/// ```

pub mod memory;
pub mod migrations;
pub mod pool;
pub mod postgres;
