/// Application state and router builder
///
/// This module defines the shared application state and provides
/// a function to build the Axum router with all routes and middleware.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use taskpilot_api::{app::{build_router, AppState}, config::Config};
/// use taskpilot_shared::auth::password::PasswordHasher;
/// use taskpilot_shared::clock::SystemClock;
/// use taskpilot_shared::service::TaskPilot;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let core = TaskPilot::in_memory(
///     PasswordHasher::new(config.password),
///     &config.session_config(),
///     Arc::new(SystemClock),
/// );
/// let app = build_router(AppState::new(core, config, None));
/// # Ok(())
/// # }
/// ```

use crate::{config::Config, middleware::security::SecurityHeadersLayer, routes};
use axum::{
    http::{header, HeaderName, HeaderValue, Method},
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use sqlx::PgPool;
use std::sync::Arc;
use taskpilot_shared::auth::middleware::{require_session, SESSION_TOKEN_HEADER};
use taskpilot_shared::service::TaskPilot;
use tower_http::{
    compression::CompressionLayer,
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Shared application state
///
/// Cloned for each request handler via Axum's `State` extractor; every field
/// is reference-counted.
#[derive(Clone)]
pub struct AppState {
    /// Task tracker core
    pub core: Arc<TaskPilot>,

    /// Application configuration
    pub config: Arc<Config>,

    /// Database pool, absent when running on in-memory stores
    pub db: Option<PgPool>,
}

impl AppState {
    /// Creates new application state
    pub fn new(core: TaskPilot, config: Config, db: Option<PgPool>) -> Self {
        Self {
            core: Arc::new(core),
            config: Arc::new(config),
            db,
        }
    }
}

/// Builds the complete Axum router with all routes and middleware
///
/// # Architecture
///
/// ```text
/// /
/// ├── GET /health               # Health check (public)
/// └── /v1/
///     ├── /auth/
///     │   ├── POST /register    # public
///     │   ├── POST /login       # public
///     │   ├── POST /logout      # public
///     │   └── GET  /me          # session required
///     └── /tasks                # session required
///         ├── GET    /
///         ├── POST   /
///         ├── GET    /:id
///         ├── PUT    /:id
///         └── DELETE /:id
/// ```
///
/// # Middleware Stack
///
/// Outermost first:
/// 1. Security headers
/// 2. CORS
/// 3. Compression
/// 4. Request tracing (tower-http TraceLayer)
/// 5. Session guard (protected routes only)
pub fn build_router(state: AppState) -> Router {
    let health_routes = Router::new().route("/health", get(routes::health::health_check));

    let public_routes = Router::new()
        .route("/auth/register", post(routes::auth::register))
        .route("/auth/login", post(routes::auth::login))
        .route("/auth/logout", post(routes::auth::logout));

    // route_layer keeps unknown paths at 404 instead of 401
    let protected_routes = Router::new()
        .route("/auth/me", get(routes::auth::me))
        .route(
            "/tasks",
            get(routes::tasks::list_tasks).post(routes::tasks::create_task),
        )
        .route(
            "/tasks/:id",
            get(routes::tasks::get_task)
                .put(routes::tasks::update_task)
                .delete(routes::tasks::delete_task),
        )
        .route_layer(from_fn_with_state(state.core.clone(), require_session));

    let v1_routes = public_routes.merge(protected_routes);

    Router::new()
        .merge(health_routes)
        .nest("/v1", v1_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(CompressionLayer::new())
        .layer(cors_layer(&state.config))
        .layer(SecurityHeadersLayer::new(state.config.api.production))
        .with_state(state)
}

fn cors_layer(config: &Config) -> CorsLayer {
    let session_header = HeaderName::from_static(SESSION_TOKEN_HEADER);

    if config.api.cors_origins.iter().any(|o| o == "*") {
        // Development mode: permissive CORS
        return CorsLayer::permissive().expose_headers([session_header]);
    }

    let origins: Vec<HeaderValue> = config
        .api
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .expose_headers([session_header])
        .allow_credentials(true)
        .max_age(std::time::Duration::from_secs(3600))
}
