//! # TaskPilot API Server
//!
//! Personal task tracker: account registration, login with signed sessions,
//! and per-user task lists over a JSON API.
//!
//! ## Startup
//!
//! 1. Load configuration from the environment (and `.env`)
//! 2. Install the tracing subscriber
//! 3. Connect to PostgreSQL and apply migrations
//! 4. Serve until Ctrl+C or SIGTERM
//!
//! ## Usage
//!
//! ```bash
//! cargo run -p taskpilot-api
//! ```

use anyhow::Context;
use std::sync::Arc;
use taskpilot_api::{
    app::{build_router, AppState},
    config::{Config, LogFormat},
};
use taskpilot_shared::auth::password::PasswordHasher;
use taskpilot_shared::clock::SystemClock;
use taskpilot_shared::db::{
    migrations::run_migrations,
    pool::{close_pool, create_pool},
    postgres::{PgCredentialStore, PgTaskStore},
};
use taskpilot_shared::service::TaskPilot;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env().context("Failed to load configuration")?;

    init_tracing(config.log_format);

    tracing::info!(
        "TaskPilot API Server v{} starting...",
        env!("CARGO_PKG_VERSION")
    );

    let pool = create_pool(&config.database_config())
        .await
        .context("Failed to connect to database")?;
    run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;

    let hasher = PasswordHasher::new(config.password);
    let core = TaskPilot::new(
        Arc::new(PgCredentialStore::new(pool.clone())),
        Arc::new(PgTaskStore::new(pool.clone())),
        hasher,
        &config.session_config(),
        Arc::new(SystemClock),
    );

    let address = config.bind_address();
    let app = build_router(AppState::new(core, config, Some(pool.clone())));

    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {}", address))?;
    tracing::info!("Server listening on http://{}", address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    close_pool(pool).await;
    tracing::info!("Shutdown complete");

    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "taskpilot_api=debug,taskpilot_shared=debug,tower_http=debug".into());

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, draining connections...");
}
