/// Task comment endpoints
///
/// - `GET|POST /api/admin/task_comments?task_id=`: any task, admin only
/// - `GET|POST /api/user/task_comments?task_id=`: the caller's own tasks
///
/// `POST` bodies are `{"task_id": 1, "comment": "..."}`. The author's role at
/// posting time is stored with the comment.

use axum::{
    extract::{Query, State},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use taskhub_shared::auth::guard::{require, Action, Resource};
use taskhub_shared::auth::session::Session;
use taskhub_shared::models::comment::CommentView;
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiResult;
use crate::middleware::session::CurrentSession;
use crate::routes::tasks::authorize_task;

#[derive(Debug, Deserialize)]
pub struct TaskQuery {
    pub task_id: i64,
}

#[derive(Debug, Deserialize, Validate)]
pub struct PostCommentRequest {
    pub task_id: i64,

    #[validate(length(min = 1, message = "Comment is required"))]
    pub comment: String,
}

#[derive(Debug, Serialize)]
pub struct CommentListResponse {
    pub comments: Vec<CommentView>,
}

#[derive(Debug, Serialize)]
pub struct PostCommentResponse {
    pub success: bool,
    pub comment_id: i64,
}

async fn post(state: &AppState, session: &Session, req: PostCommentRequest) -> ApiResult<Json<PostCommentResponse>> {
    req.validate()?;

    let comment_id = state
        .comments
        .add(req.task_id, session.user_id, &req.comment, session.is_admin())
        .await?;

    Ok(Json(PostCommentResponse {
        success: true,
        comment_id,
    }))
}

// Admin routes pass no resource: the action is not scoped to an owned
// task, so only administrators are allowed.

pub async fn admin_list_comments(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentSession>,
    Query(query): Query<TaskQuery>,
) -> ApiResult<Json<CommentListResponse>> {
    require(current.get(), Action::ViewComments, Resource::None)?;

    let comments = state.comments.list_for_task(query.task_id).await?;
    Ok(Json(CommentListResponse { comments }))
}

pub async fn admin_post_comment(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentSession>,
    Json(req): Json<PostCommentRequest>,
) -> ApiResult<Json<PostCommentResponse>> {
    let session = require(current.get(), Action::PostComment, Resource::None)?;
    post(&state, session, req).await
}

pub async fn user_list_comments(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentSession>,
    Query(query): Query<TaskQuery>,
) -> ApiResult<Json<CommentListResponse>> {
    authorize_task(&state, current.get(), Action::ViewComments, query.task_id).await?;

    let comments = state.comments.list_for_task(query.task_id).await?;
    Ok(Json(CommentListResponse { comments }))
}

pub async fn user_post_comment(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentSession>,
    Json(req): Json<PostCommentRequest>,
) -> ApiResult<Json<PostCommentResponse>> {
    let (session, _task) = authorize_task(&state, current.get(), Action::PostComment, req.task_id).await?;
    post(&state, session, req).await
}
