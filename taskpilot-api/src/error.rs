/// Error handling for the API server
///
/// This module provides a unified error type that maps to HTTP responses.
/// Handlers return `Result<T, ApiError>`; core errors convert through
/// `From<CoreError>` so `?` does the mapping.
///
/// # Example
///
/// ```
/// use taskpilot_api::error::ApiResult;
/// use axum::Json;
/// use serde_json::json;
///
/// async fn handler() -> ApiResult<Json<serde_json::Value>> {
///     Ok(Json(json!({ "ok": true })))
/// }
/// ```

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use taskpilot_shared::error::CoreError;

/// API result type alias
pub type ApiResult<T> = Result<T, ApiError>;

/// Unified API error type
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Bad request (400), e.g. malformed JSON
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Unauthorized (401)
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Not found (404)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Conflict (409), e.g. username taken
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Unprocessable entity (422) - validation errors
    #[error("Validation failed: {} errors", .0.len())]
    ValidationError(Vec<ValidationErrorDetail>),

    /// Internal server error (500)
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Validation error detail
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationErrorDetail {
    /// Field that failed validation
    pub field: String,

    /// Error message
    pub message: String,
}

/// Error response format
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code (e.g., "bad_request", "unauthorized")
    pub error: String,

    /// Human-readable error message
    pub message: String,

    /// Optional validation errors
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<ValidationErrorDetail>>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message, details) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg, None),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg, None),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg, None),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg, None),
            ApiError::ValidationError(errors) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "validation_error",
                "Request validation failed".to_string(),
                Some(errors),
            ),
            ApiError::InternalError(msg) => {
                // Log internal errors but don't expose details to clients
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                    None,
                )
            }
        };

        let body = Json(ErrorResponse {
            error: error_code.to_string(),
            message,
            details,
        });

        (status, body).into_response()
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InvalidCredentials => {
                ApiError::Unauthorized("Invalid username or password".to_string())
            }
            CoreError::Unauthenticated => {
                ApiError::Unauthorized("Authentication required".to_string())
            }
            CoreError::Conflict => {
                ApiError::Conflict("Username or email is already in use".to_string())
            }
            CoreError::Validation { field, message } => {
                ApiError::ValidationError(vec![ValidationErrorDetail {
                    field: field.to_string(),
                    message,
                }])
            }
            CoreError::NotFoundOrForbidden => ApiError::NotFound("Task not found".to_string()),
            CoreError::Storage(msg) => ApiError::InternalError(format!("Storage failure: {}", msg)),
            CoreError::Internal(msg) => ApiError::InternalError(msg),
        }
    }
}

/// Convert `validator` derive failures to a 422 with one entry per problem
impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut details: Vec<ValidationErrorDetail> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| ValidationErrorDetail {
                    field: field.to_string(),
                    message: e
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| e.code.to_string()),
                })
            })
            .collect();
        details.sort_by(|a, b| a.field.cmp(&b.field));

        ApiError::ValidationError(details)
    }
}

/// Malformed or missing JSON bodies
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}
