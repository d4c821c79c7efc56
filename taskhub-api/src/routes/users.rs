/// Account administration (admin only)
///
/// - `GET    /api/admin/users`: list accounts
/// - `POST   /api/admin/users`: create an account
/// - `PUT    /api/admin/users`: edit an account, optionally resetting its password
/// - `DELETE /api/admin/users`: delete an account
///
/// Edits that change a role or password end the user's open sessions, so the
/// old privileges do not outlive the edit.

use axum::{extract::State, Extension, Json};
use serde::{Deserialize, Serialize};
use taskhub_shared::auth::guard::{require, Action, Resource};
use taskhub_shared::error::CoreError;
use taskhub_shared::models::user::{Role, User};
use taskhub_shared::repository::{EditUser, NewUser};
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiResult;
use crate::middleware::session::CurrentSession;
use crate::routes::SuccessResponse;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateUserRequest {
    #[validate(length(min = 1, max = 50, message = "Username must be 1 to 50 characters"))]
    pub username: String,

    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,

    pub role: Role,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateUserRequest {
    pub id: i64,

    #[validate(length(min = 1, max = 50, message = "Username must be 1 to 50 characters"))]
    pub username: String,

    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    pub role: Role,

    /// Blank or absent keeps the current password
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DeleteUserRequest {
    pub id: i64,
}

#[derive(Debug, Serialize)]
pub struct UserListResponse {
    pub users: Vec<User>,
}

#[derive(Debug, Serialize)]
pub struct CreateUserResponse {
    pub success: bool,
    pub user_id: i64,
}

pub async fn list_users(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentSession>,
) -> ApiResult<Json<UserListResponse>> {
    require(current.get(), Action::ManageUsers, Resource::None)?;

    let users = state.users.list().await?;
    Ok(Json(UserListResponse { users }))
}

/// # Errors
///
/// - `422`: invalid username, email or password
/// - `409`: username or email taken
pub async fn create_user(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentSession>,
    Json(req): Json<CreateUserRequest>,
) -> ApiResult<Json<CreateUserResponse>> {
    let admin = require(current.get(), Action::ManageUsers, Resource::None)?;
    req.validate()?;

    let user = state
        .users
        .create(NewUser {
            username: req.username,
            email: req.email,
            password: req.password,
            role: req.role,
        })
        .await?;

    tracing::info!(user_id = user.id, created_by = admin.user_id, "Account created by admin");
    Ok(Json(CreateUserResponse {
        success: true,
        user_id: user.id,
    }))
}

/// # Errors
///
/// - `422`, `409`, `404`: nothing was changed
/// - `502`: the edit was saved but the user could not be emailed
pub async fn update_user(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentSession>,
    Json(req): Json<UpdateUserRequest>,
) -> ApiResult<Json<SuccessResponse>> {
    require(current.get(), Action::ManageUsers, Resource::None)?;
    req.validate()?;

    let before = state.users.get(req.id).await?;
    let password_changed = req.password.as_deref().map_or(false, |p| !p.is_empty());
    let role_changed = before.role != req.role;

    let result = state
        .users
        .update(
            req.id,
            EditUser {
                username: req.username,
                email: req.email,
                role: req.role,
                password: req.password,
            },
        )
        .await;

    let committed = matches!(result, Ok(_) | Err(CoreError::Notification(_)));
    if committed && (password_changed || role_changed) {
        let ended = state.sessions.destroy_for_user(req.id).await;
        if ended > 0 {
            tracing::info!(user_id = req.id, ended, "Sessions ended after credential change");
        }
    }

    result?;
    Ok(Json(SuccessResponse::ok()))
}

/// # Errors
///
/// - `403`: an admin deleting their own account
/// - `409`: the user still has tasks or comments
/// - `404`: no such user
pub async fn delete_user(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentSession>,
    Json(req): Json<DeleteUserRequest>,
) -> ApiResult<Json<SuccessResponse>> {
    let admin = require(current.get(), Action::ManageUsers, Resource::None)?;

    state.users.delete(req.id, admin.user_id).await?;
    state.sessions.destroy_for_user(req.id).await;

    Ok(Json(SuccessResponse::ok()))
}
