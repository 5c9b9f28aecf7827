/// Authentication endpoints
///
/// This module provides account and session endpoints:
/// - Registration
/// - Login
/// - Logout
/// - Current user profile
///
/// # Endpoints
///
/// - `POST /v1/auth/register` - Register new user
/// - `POST /v1/auth/login` - Login and get a session
/// - `POST /v1/auth/logout` - Clear the session cookie
/// - `GET /v1/auth/me` - Profile of the signed-in user

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, HeaderValue, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use taskpilot_shared::auth::authenticator::AuthenticatedUser;
use taskpilot_shared::auth::middleware::{clear_session_cookie, session_cookie, AuthenticatedContext};
use taskpilot_shared::models::user::{normalize_email, normalize_username};
use validator::Validate;

/// Register request
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    /// Login name
    #[validate(length(min = 3, max = 50, message = "Username must be between 3 and 50 characters"))]
    pub username: String,

    /// Email address
    #[validate(
        email(message = "Invalid email format"),
        length(max = 255, message = "Email is too long")
    )]
    pub email: String,

    /// Password
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// Register response
#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterResponse {
    /// New user ID
    pub user_id: i64,
}

/// Login request
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    /// Username or email address
    #[serde(alias = "username", alias = "email")]
    #[validate(length(min = 1, message = "Username or email is required"))]
    pub identifier: String,

    /// Password
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// Login response
#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    /// Session token, also set as the session cookie
    pub token: String,

    /// When the session expires
    pub expires_at: DateTime<Utc>,

    /// Signed-in user
    pub user: AuthenticatedUser,
}

/// Profile response
#[derive(Debug, Serialize, Deserialize)]
pub struct ProfileResponse {
    /// User ID
    pub id: i64,

    /// Username
    pub username: String,

    /// Email address
    pub email: String,

    /// When the account was created
    pub created_at: DateTime<Utc>,

    /// When the current session expires
    pub session_expires_at: DateTime<Utc>,
}

/// Register a new user
///
/// # Endpoint
///
/// ```text
/// POST /v1/auth/register
/// Content-Type: application/json
///
/// {
///   "username": "alice",
///   "email": "a@x.com",
///   "password": "pw1"
/// }
/// ```
///
/// # Response
///
/// `201 Created` with `{ "user_id": 1 }`
///
/// # Errors
///
/// - `400 Bad Request`: Malformed JSON
/// - `409 Conflict`: Username or email already in use
/// - `422 Unprocessable Entity`: Validation failed
pub async fn register(
    State(state): State<AppState>,
    body: Result<Json<RegisterRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(mut req) = body?;
    req.username = normalize_username(&req.username);
    req.email = normalize_email(&req.email);
    req.validate()?;

    let user_id = state
        .core
        .register(&req.username, &req.email, &req.password)
        .await?;

    Ok((StatusCode::CREATED, Json(RegisterResponse { user_id })))
}

/// Login endpoint
///
/// Accepts a username or an email address as the identifier. On success the
/// session is returned in the body and set as an HttpOnly cookie.
///
/// # Endpoint
///
/// ```text
/// POST /v1/auth/login
/// Content-Type: application/json
///
/// {
///   "identifier": "alice",
///   "password": "pw1"
/// }
/// ```
///
/// # Errors
///
/// - `401 Unauthorized`: Invalid credentials (same message for every cause)
/// - `422 Unprocessable Entity`: Missing identifier or password
pub async fn login(
    State(state): State<AppState>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(req) = body?;
    req.validate()?;

    let outcome = state.core.login(&req.identifier, &req.password).await?;

    let cookie = session_cookie(&outcome.session, state.core.now(), state.core.secure_cookies());
    let cookie = HeaderValue::from_str(&cookie)
        .map_err(|e| ApiError::InternalError(format!("Invalid session cookie: {}", e)))?;

    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(LoginResponse {
            token: outcome.session.token,
            expires_at: outcome.session.expires_at,
            user: outcome.user,
        }),
    ))
}

/// Logout endpoint
///
/// Sessions are stateless, so logging out clears the cookie; a bearer token
/// held elsewhere stays valid until it expires.
pub async fn logout(State(state): State<AppState>) -> impl IntoResponse {
    let cookie = clear_session_cookie(state.core.secure_cookies());

    match HeaderValue::from_str(&cookie) {
        Ok(value) => (StatusCode::NO_CONTENT, [(header::SET_COOKIE, value)]).into_response(),
        Err(_) => StatusCode::NO_CONTENT.into_response(),
    }
}

/// Current user profile
///
/// # Errors
///
/// - `401 Unauthorized`: No valid session, or the account no longer exists
pub async fn me(
    State(state): State<AppState>,
    ctx: AuthenticatedContext,
) -> ApiResult<Json<ProfileResponse>> {
    let user = state.core.profile(&ctx).await?;

    Ok(Json(ProfileResponse {
        id: user.id,
        username: user.username,
        email: user.email,
        created_at: user.created_at,
        session_expires_at: ctx.expires_at(),
    }))
}
