/// Authorization guard for Axum
///
/// Every protected route sits behind [`require_session`]. The middleware pulls
/// the session token from the request, validates it, and adds the resulting
/// [`AuthenticatedContext`] to request extensions. Requests without a valid
/// session are answered with `401 Unauthorized` before any handler runs.
///
/// # Token Transport
///
/// - `Authorization: Bearer <token>` header (checked first)
/// - `taskpilot_session` cookie
///
/// # Sliding Sessions
///
/// When sliding expiry is enabled and a session is past half its lifetime, the
/// response carries a fresh token in both a `Set-Cookie` header and the
/// `x-session-token` header.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use axum::{middleware, routing::get, Router};
/// use taskpilot_shared::auth::middleware::{require_session, AuthenticatedContext};
/// use taskpilot_shared::service::TaskPilot;
///
/// async fn whoami(ctx: AuthenticatedContext) -> String {
///     format!("Hello, {}!", ctx.username())
/// }
///
/// fn routes(core: Arc<TaskPilot>) -> Router {
///     Router::new()
///         .route("/me", get(whoami))
///         .layer(middleware::from_fn_with_state(core, require_session))
/// }
/// ```

use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, warn};

use super::authenticator::AuthenticatedUser;
use super::jwt::IssuedSession;
use crate::models::task::OwnerId;
use crate::service::TaskPilot;

/// Name of the session cookie
pub const SESSION_COOKIE: &str = "taskpilot_session";

/// Response header carrying a renewed session token
pub const SESSION_TOKEN_HEADER: &str = "x-session-token";

/// Identity of the caller, established from a validated session
///
/// Only the session validator can construct this type; task operations
/// require it, so they cannot run on behalf of an unauthenticated caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthenticatedContext {
    user_id: i64,
    username: String,
    email: String,
    expires_at: DateTime<Utc>,
}

impl AuthenticatedContext {
    pub(crate) fn new(user_id: i64, username: String, email: String, expires_at: DateTime<Utc>) -> Self {
        Self {
            user_id,
            username,
            email,
            expires_at,
        }
    }

    /// Authenticated user ID
    pub fn user_id(&self) -> i64 {
        self.user_id
    }

    /// Owner scope for task operations
    pub fn owner(&self) -> OwnerId {
        OwnerId::new(self.user_id)
    }

    /// Username claim
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Email claim
    pub fn email(&self) -> &str {
        &self.email
    }

    /// When the session expires
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Identity claims as an authenticated user
    pub fn to_user(&self) -> AuthenticatedUser {
        AuthenticatedUser {
            id: self.user_id,
            username: self.username.clone(),
            email: self.email.clone(),
        }
    }
}

/// Error type for the authorization guard
#[derive(Debug)]
pub enum AuthError {
    /// No session token on the request
    MissingCredentials,

    /// Session token failed validation
    InvalidToken,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        // Same body for both cases; the reason is only logged
        let body = Json(json!({
            "error": "unauthorized",
            "message": "Authentication required",
        }));
        (StatusCode::UNAUTHORIZED, body).into_response()
    }
}

/// Handlers take the context as an argument; extraction fails closed when
/// the guard did not run for the route
#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedContext
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedContext>()
            .cloned()
            .ok_or(AuthError::MissingCredentials)
    }
}

/// Extracts the session token from the request headers
///
/// The bearer header wins over the cookie when both are present.
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());

    if let Some(token) = bearer {
        return Some(token.to_string());
    }

    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == SESSION_COOKIE && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

/// Builds the `Set-Cookie` value for a session
pub fn session_cookie(session: &IssuedSession, now: DateTime<Utc>, secure: bool) -> String {
    let max_age = (session.expires_at - now).num_seconds().max(0);
    format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}{}",
        SESSION_COOKIE,
        session.token,
        max_age,
        if secure { "; Secure" } else { "" }
    )
}

/// Builds the `Set-Cookie` value that removes the session cookie
pub fn clear_session_cookie(secure: bool) -> String {
    format!(
        "{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0{}",
        SESSION_COOKIE,
        if secure { "; Secure" } else { "" }
    )
}

/// Session guard middleware
///
/// # Errors
///
/// Returns 401 Unauthorized if the token is missing, malformed, tampered
/// with, or expired.
pub async fn require_session(
    State(core): State<Arc<TaskPilot>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let token = session_token(req.headers()).ok_or_else(|| {
        debug!(path = %req.uri().path(), "Request without session token");
        AuthError::MissingCredentials
    })?;

    let context = core.current_user(&token).map_err(|_| AuthError::InvalidToken)?;

    let renewed = core.renew_session(&context);

    req.extensions_mut().insert(context);
    let mut response = next.run(req).await;

    if let Some(session) = renewed {
        let cookie = session_cookie(&session, core.now(), core.secure_cookies());
        match (
            HeaderValue::from_str(&cookie),
            HeaderValue::from_str(&session.token),
        ) {
            (Ok(cookie), Ok(token)) => {
                let headers = response.headers_mut();
                headers.append(header::SET_COOKIE, cookie);
                headers.insert(SESSION_TOKEN_HEADER, token);
            }
            _ => warn!("Renewed session token is not a valid header value"),
        }
    }

    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::SessionConfig;
    use crate::auth::password::{HashParams, PasswordHasher};
    use crate::clock::ManualClock;
    use axum::{body::Body, middleware, routing::get, Router};
    use chrono::{Duration, TimeZone};
    use tower::ServiceExt;

    async fn whoami(ctx: AuthenticatedContext) -> String {
        ctx.username().to_string()
    }

    async fn guarded_app(sliding: bool) -> (Router, Arc<ManualClock>, String) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap(),
        ));
        let session = SessionConfig::new("guard-test-secret-at-least-32-bytes", Duration::minutes(60))
            .with_sliding(sliding);
        let hasher = PasswordHasher::new(HashParams {
            memory_kib: 1024,
            iterations: 1,
            parallelism: 1,
        });
        let core = Arc::new(TaskPilot::in_memory(hasher, &session, clock.clone()));

        core.register("alice", "a@x.com", "pw1").await.unwrap();
        let token = core.login("alice", "pw1").await.unwrap().session.token;

        let app = Router::new()
            .route("/me", get(whoami))
            .layer(middleware::from_fn_with_state(core, require_session));

        (app, clock, token)
    }

    fn get_me(auth: Option<(header::HeaderName, String)>) -> Request {
        let mut builder = axum::http::Request::builder().uri("/me");
        if let Some((name, value)) = auth {
            builder = builder.header(name, value);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[test]
    fn test_context_accessors() {
        let expires = Utc.with_ymd_and_hms(2025, 6, 1, 10, 0, 0).unwrap();
        let ctx = AuthenticatedContext::new(5, "alice".into(), "a@x.com".into(), expires);

        assert_eq!(ctx.user_id(), 5);
        assert_eq!(ctx.owner().get(), 5);
        assert_eq!(ctx.username(), "alice");
        assert_eq!(ctx.email(), "a@x.com");
        assert_eq!(ctx.expires_at(), expires);
        assert_eq!(ctx.to_user().id, 5);
    }

    #[test]
    fn test_session_token_from_bearer() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, "Bearer abc.def.ghi".parse().unwrap());
        headers.insert(header::COOKIE, "taskpilot_session=cookie-token".parse().unwrap());

        assert_eq!(session_token(&headers).as_deref(), Some("abc.def.ghi"));
    }

    #[test]
    fn test_session_token_from_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            "theme=dark; taskpilot_session=abc.def.ghi; lang=en".parse().unwrap(),
        );

        assert_eq!(session_token(&headers).as_deref(), Some("abc.def.ghi"));
    }

    #[test]
    fn test_session_token_missing_or_malformed() {
        let headers = HeaderMap::new();
        assert!(session_token(&headers).is_none());

        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, "Basic dXNlcjpwdw==".parse().unwrap());
        assert!(session_token(&headers).is_none());

        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, "taskpilot_session=".parse().unwrap());
        assert!(session_token(&headers).is_none());
    }

    #[test]
    fn test_session_cookie_attributes() {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap();
        let session = IssuedSession {
            token: "tok".to_string(),
            expires_at: now + Duration::minutes(60),
        };

        let cookie = session_cookie(&session, now, true);
        assert!(cookie.starts_with("taskpilot_session=tok;"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("Max-Age=3600"));
        assert!(cookie.ends_with("; Secure"));

        let cleared = clear_session_cookie(false);
        assert!(cleared.contains("Max-Age=0"));
        assert!(!cleared.contains("Secure"));
    }

    #[test]
    fn test_auth_error_into_response() {
        assert_eq!(
            AuthError::MissingCredentials.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AuthError::InvalidToken.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[tokio::test]
    async fn test_guard_accepts_bearer_and_cookie() {
        let (app, _clock, token) = guarded_app(false).await;

        let bearer = app
            .clone()
            .oneshot(get_me(Some((header::AUTHORIZATION, format!("Bearer {}", token)))))
            .await
            .unwrap();
        assert_eq!(bearer.status(), StatusCode::OK);

        let cookie = app
            .oneshot(get_me(Some((header::COOKIE, format!("{}={}", SESSION_COOKIE, token)))))
            .await
            .unwrap();
        assert_eq!(cookie.status(), StatusCode::OK);
        assert!(cookie.headers().get(SESSION_TOKEN_HEADER).is_none());
    }

    #[tokio::test]
    async fn test_guard_rejects_missing_and_expired() {
        let (app, clock, token) = guarded_app(false).await;

        let missing = app.clone().oneshot(get_me(None)).await.unwrap();
        assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);

        clock.advance(Duration::minutes(61));
        let expired = app
            .oneshot(get_me(Some((header::AUTHORIZATION, format!("Bearer {}", token)))))
            .await
            .unwrap();
        assert_eq!(expired.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_guard_renews_sliding_session() {
        let (app, clock, token) = guarded_app(true).await;

        clock.advance(Duration::minutes(40));
        let response = app
            .oneshot(get_me(Some((header::AUTHORIZATION, format!("Bearer {}", token)))))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let renewed = response.headers().get(SESSION_TOKEN_HEADER).unwrap();
        assert_ne!(renewed.to_str().unwrap(), token);
        let cookie = response.headers().get(header::SET_COOKIE).unwrap();
        assert!(cookie.to_str().unwrap().contains("Max-Age=3600"));
    }
}
