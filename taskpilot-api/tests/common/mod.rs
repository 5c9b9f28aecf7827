/// Common test utilities for integration tests
///
/// This module provides shared infrastructure for the HTTP tests:
/// - An app wired to in-memory stores and a manual clock
/// - A request helper that returns status, headers, and the JSON body
/// - Account setup shortcuts

use axum::body::Body;
use axum::http::{header, HeaderMap, Method, Request, StatusCode};
use chrono::{TimeZone, Utc};
use serde_json::Value;
use std::sync::Arc;
use taskpilot_api::app::{build_router, AppState};
use taskpilot_api::config::Config;
use taskpilot_shared::auth::password::PasswordHasher;
use taskpilot_shared::clock::ManualClock;
use taskpilot_shared::service::TaskPilot;
use tower::ServiceExt;

/// Response pieces the tests look at
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

/// Test context containing all necessary resources
pub struct TestContext {
    pub app: axum::Router,
    pub clock: Arc<ManualClock>,
}

impl TestContext {
    /// Creates a fresh app with fixed-expiry sessions
    pub fn new() -> Self {
        Self::with_vars(&[])
    }

    /// Creates a fresh app with extra configuration variables
    pub fn with_vars(extra: &[(&str, &str)]) -> Self {
        let mut vars = vec![
            ("DATABASE_URL", "postgresql://unused/in-memory"),
            ("SESSION_SECRET", "http-test-secret-at-least-32-bytes-long"),
            ("SESSION_SLIDING", "false"),
            ("PASSWORD_MEMORY_KIB", "1024"),
            ("PASSWORD_ITERATIONS", "1"),
            ("PASSWORD_PARALLELISM", "1"),
        ];
        vars.extend_from_slice(extra);
        let config = Config::from_vars(vars).expect("test configuration");

        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap(),
        ));
        let core = TaskPilot::in_memory(
            PasswordHasher::new(config.password),
            &config.session_config(),
            clock.clone(),
        );

        let app = build_router(AppState::new(core, config, None));

        TestContext { app, clock }
    }

    /// Sends a request through the router
    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }

        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        self.send_request(request).await
    }

    /// Sends a prepared request through the router
    pub async fn send_request(&self, request: Request<Body>) -> TestResponse {
        let response = self.app.clone().oneshot(request).await.unwrap();

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };

        TestResponse {
            status,
            headers,
            body,
        }
    }

    /// Registers an account and returns its id
    pub async fn register(&self, username: &str, email: &str, password: &str) -> i64 {
        let response = self
            .send(
                Method::POST,
                "/v1/auth/register",
                None,
                Some(serde_json::json!({
                    "username": username,
                    "email": email,
                    "password": password,
                })),
            )
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "{}", response.body);

        response.body["user_id"].as_i64().unwrap()
    }

    /// Logs in and returns the session token
    pub async fn login(&self, identifier: &str, password: &str) -> String {
        let response = self
            .send(
                Method::POST,
                "/v1/auth/login",
                None,
                Some(serde_json::json!({
                    "identifier": identifier,
                    "password": password,
                })),
            )
            .await;
        assert_eq!(response.status, StatusCode::OK, "{}", response.body);

        response.body["token"].as_str().unwrap().to_string()
    }

    /// Registers and logs in, returning the session token
    pub async fn signed_in(&self, username: &str, email: &str, password: &str) -> String {
        self.register(username, email, password).await;
        self.login(username, password).await
    }
}
