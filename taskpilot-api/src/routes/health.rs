/// Health check endpoint
///
/// Reports that the server is running and, when a database is attached,
/// whether it answers.
///
/// # Endpoint
///
/// ```text
/// GET /health
/// ```
///
/// # Response
///
/// ```json
/// {
///   "status": "healthy",
///   "version": "0.1.0",
///   "database": "connected"
/// }
/// ```

use crate::app::AppState;
use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use taskpilot_shared::db::pool::health_check as database_health_check;

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,

    /// Application version
    pub version: String,

    /// Database status: `connected`, `disconnected`, or `memory`
    pub database: String,
}

/// Health check handler
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let database_status = match &state.db {
        Some(pool) => match database_health_check(pool).await {
            Ok(()) => "connected",
            Err(e) => {
                tracing::warn!(error = %e, "Database health check failed");
                "disconnected"
            }
        },
        None => "memory",
    };

    Json(HealthResponse {
        status: if database_status == "disconnected" {
            "degraded".to_string()
        } else {
            "healthy".to_string()
        },
        version: env!("CARGO_PKG_VERSION").to_string(),
        database: database_status.to_string(),
    })
}
