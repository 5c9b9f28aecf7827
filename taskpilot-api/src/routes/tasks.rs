/// Task endpoints
///
/// Every handler runs behind the session guard and acts only on the caller's
/// own tasks. A task that belongs to someone else answers exactly like a task
/// that does not exist.
///
/// # Endpoints
///
/// - `GET /v1/tasks` - List tasks, newest first
/// - `POST /v1/tasks` - Create a task
/// - `GET /v1/tasks/:id` - Fetch one task
/// - `PUT /v1/tasks/:id` - Update a task
/// - `DELETE /v1/tasks/:id` - Delete a task (always 204)

use crate::{app::AppState, error::ApiResult};
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use taskpilot_shared::auth::middleware::AuthenticatedContext;
use taskpilot_shared::models::task::{Task, TaskInput, TaskStatus};

/// Create/update request body
///
/// On update, omitted `status` and `priority` keep their stored values while
/// `title` and `content` are always replaced.
#[derive(Debug, Deserialize)]
pub struct TaskRequest {
    /// Title (required, non-blank)
    pub title: String,

    /// Optional notes
    #[serde(default)]
    pub content: Option<String>,

    /// `pending`, `in_progress`, or `done`
    #[serde(default)]
    pub status: Option<TaskStatus>,

    /// Priority, higher means more important
    #[serde(default)]
    pub priority: Option<i32>,
}

impl TaskRequest {
    fn into_input(self, id: Option<i64>) -> TaskInput {
        TaskInput {
            id,
            title: self.title,
            content: self.content,
            status: self.status,
            priority: self.priority,
        }
    }
}

/// List the caller's tasks
pub async fn list_tasks(
    State(state): State<AppState>,
    ctx: AuthenticatedContext,
) -> ApiResult<Json<Vec<Task>>> {
    Ok(Json(state.core.list_tasks(&ctx).await?))
}

/// Create a task
///
/// # Errors
///
/// - `400 Bad Request`: Malformed JSON
/// - `422 Unprocessable Entity`: Blank or oversized title/content
pub async fn create_task(
    State(state): State<AppState>,
    ctx: AuthenticatedContext,
    body: Result<Json<TaskRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(req) = body?;
    let task = state.core.save_task(&ctx, &req.into_input(None)).await?;

    Ok((StatusCode::CREATED, Json(task)))
}

/// Fetch one task
///
/// # Errors
///
/// - `404 Not Found`: Missing or not owned by the caller
pub async fn get_task(
    State(state): State<AppState>,
    ctx: AuthenticatedContext,
    Path(id): Path<i64>,
) -> ApiResult<Json<Task>> {
    Ok(Json(state.core.get_task(&ctx, id).await?))
}

/// Update a task
///
/// # Errors
///
/// - `404 Not Found`: Missing or not owned by the caller
/// - `422 Unprocessable Entity`: Blank or oversized title/content
pub async fn update_task(
    State(state): State<AppState>,
    ctx: AuthenticatedContext,
    Path(id): Path<i64>,
    body: Result<Json<TaskRequest>, JsonRejection>,
) -> ApiResult<Json<Task>> {
    let Json(req) = body?;

    // id 0 would mean "create"; on this route it can only name a missing task
    if id == 0 {
        return Err(taskpilot_shared::error::CoreError::NotFoundOrForbidden.into());
    }

    Ok(Json(state.core.save_task(&ctx, &req.into_input(Some(id))).await?))
}

/// Delete a task
///
/// Idempotent: deleting a missing or foreign task still answers 204.
pub async fn delete_task(
    State(state): State<AppState>,
    ctx: AuthenticatedContext,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    state.core.delete_task(&ctx, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
