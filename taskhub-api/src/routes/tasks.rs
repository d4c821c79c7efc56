/// Task endpoints
///
/// Admin:
/// - `GET    /api/admin/tasks`: every task
/// - `POST   /api/admin/tasks`: create and assign a task
/// - `PUT    /api/admin/tasks`: edit a task's description
/// - `DELETE /api/admin/tasks`: delete a task and its comments
///
/// User:
/// - `GET /api/user/tasks`: tasks assigned to the caller
/// - `PUT /api/user/tasks`: change the status of one of them

use axum::{extract::State, Extension, Json};
use serde::{Deserialize, Serialize};
use taskhub_shared::auth::guard::{authorize, require, Action, Denial, Resource};
use taskhub_shared::auth::session::Session;
use taskhub_shared::error::CoreError;
use taskhub_shared::models::task::{parse_deadline, TaskStatus, TaskView};
use taskhub_shared::repository::NewTask;
use validator::Validate;

use crate::app::AppState;
use crate::error::{ApiError, ApiResult};
use crate::middleware::session::CurrentSession;
use crate::routes::SuccessResponse;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateTaskRequest {
    #[validate(length(min = 1, max = 255, message = "Title must be 1 to 255 characters"))]
    pub title: String,

    #[serde(default)]
    pub description: String,

    pub assigned_to: i64,

    /// RFC 3339 timestamp or `YYYY-MM-DD`; blank for none
    #[serde(default)]
    pub deadline: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateDescriptionRequest {
    pub id: i64,
    pub description: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub id: i64,
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct DeleteTaskRequest {
    pub id: i64,
}

#[derive(Debug, Serialize)]
pub struct TaskListResponse {
    pub tasks: Vec<TaskView>,
}

#[derive(Debug, Serialize)]
pub struct CreateTaskResponse {
    pub success: bool,
    pub task_id: i64,
}

#[derive(Debug, Serialize)]
pub struct StatusUpdateResponse {
    pub success: bool,
    pub status: TaskStatus,
    /// False when the task already had this status
    pub changed: bool,
}

/// Loads a task and checks `action` against its assignee.
///
/// A user asking about a task that does not exist is refused exactly like a
/// user asking about someone else's task; only administrators see 404.
pub(crate) async fn authorize_task<'a>(
    state: &AppState,
    session: Option<&'a Session>,
    action: Action,
    task_id: i64,
) -> ApiResult<(&'a Session, TaskView)> {
    let Some(session) = session else {
        return Err(Denial::Unauthenticated.into());
    };

    match state.tasks.find(task_id).await? {
        Some(task) => {
            let resource = Resource::Task {
                assigned_to: task.task.assigned_to,
            };
            authorize(Some(session), action, resource)?;
            Ok((session, task))
        }
        None if session.is_admin() => Err(CoreError::NotFound("Task").into()),
        None => {
            tracing::warn!(user_id = session.user_id, task_id, action = ?action, "Access denied");
            Err(ApiError::Forbidden(
                "You do not have permission to perform this action".to_string(),
            ))
        }
    }
}

pub async fn list_all_tasks(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentSession>,
) -> ApiResult<Json<TaskListResponse>> {
    require(current.get(), Action::ListAllTasks, Resource::None)?;

    let tasks = state.tasks.list_all().await?;
    Ok(Json(TaskListResponse { tasks }))
}

/// # Errors
///
/// - `422`: blank title, unknown assignee or unreadable deadline
pub async fn create_task(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentSession>,
    Json(req): Json<CreateTaskRequest>,
) -> ApiResult<Json<CreateTaskResponse>> {
    let admin = require(current.get(), Action::CreateTask, Resource::None)?;
    req.validate()?;

    let deadline = parse_deadline(req.deadline.as_deref().unwrap_or_default())
        .map_err(|message| CoreError::validation("deadline", message))?;

    let task_id = state
        .tasks
        .create(NewTask {
            title: req.title,
            description: req.description,
            assigned_to: req.assigned_to,
            assigned_by: admin.user_id,
            deadline,
        })
        .await?;

    Ok(Json(CreateTaskResponse {
        success: true,
        task_id,
    }))
}

pub async fn update_task_description(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentSession>,
    Json(req): Json<UpdateDescriptionRequest>,
) -> ApiResult<Json<SuccessResponse>> {
    require(current.get(), Action::EditTask, Resource::None)?;

    state.tasks.update_description(req.id, &req.description).await?;
    Ok(Json(SuccessResponse::ok()))
}

pub async fn delete_task(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentSession>,
    Json(req): Json<DeleteTaskRequest>,
) -> ApiResult<Json<SuccessResponse>> {
    require(current.get(), Action::DeleteTask, Resource::None)?;

    state.tasks.delete(req.id).await?;
    Ok(Json(SuccessResponse::ok()))
}

pub async fn list_own_tasks(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentSession>,
) -> ApiResult<Json<TaskListResponse>> {
    let session = require(current.get(), Action::ListOwnTasks, Resource::None)?;

    let tasks = state.tasks.list_for_user(session.user_id).await?;
    Ok(Json(TaskListResponse { tasks }))
}

/// # Errors
///
/// - `403`: the task is not assigned to the caller
/// - `422`: not one of `Pending`, `In Progress`, `Completed`
pub async fn update_task_status(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentSession>,
    Json(req): Json<UpdateStatusRequest>,
) -> ApiResult<Json<StatusUpdateResponse>> {
    let (session, _task) = authorize_task(&state, current.get(), Action::UpdateTaskStatus, req.id).await?;

    let change = state.tasks.update_status(req.id, &req.status).await?;
    tracing::debug!(
        user_id = session.user_id,
        task_id = req.id,
        changed = change.changed(),
        "Status update handled"
    );

    Ok(Json(StatusUpdateResponse {
        success: true,
        status: change.current,
        changed: change.changed(),
    }))
}
