/// Authentication endpoints
///
/// - `POST /api/auth/login`: exchange credentials for a session cookie
/// - `POST /api/auth/logout`: end the session
/// - `GET|POST /api/auth/check`: who am I
///
/// Login answers with the session's CSRF token; clients send it back in
/// `X-CSRF-Token` on every mutating request.

use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use taskhub_shared::auth::guard::{authorize, require, Action, Resource};
use taskhub_shared::auth::session::Session;
use taskhub_shared::auth::token::log_prefix;
use taskhub_shared::models::user::Role;
use validator::Validate;

use crate::app::AppState;
use crate::error::{ApiError, ApiResult};
use crate::middleware::session::{clear_cookie, session_cookie, CurrentSession};
use crate::routes::SuccessResponse;

/// Login request
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    /// Username or email
    #[validate(length(min = 1, message = "Username or email is required"))]
    pub username: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// The signed-in user as clients see it
#[derive(Debug, Serialize)]
pub struct SessionUser {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub role: Role,
}

impl From<&Session> for SessionUser {
    fn from(session: &Session) -> Self {
        Self {
            id: session.user_id,
            username: session.username.clone(),
            email: session.email.clone(),
            role: session.role,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub success: bool,
    pub user: SessionUser,
    pub csrf_token: String,
}

#[derive(Debug, Serialize)]
pub struct CheckResponse {
    pub user: SessionUser,
    pub csrf_token: String,
}

/// Login endpoint
///
/// # Errors
///
/// - `422 Unprocessable Entity`: empty username or password
/// - `401 Unauthorized`: unknown account or wrong password (same message)
pub async fn login(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentSession>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Response> {
    authorize(current.get(), Action::Login, Resource::None)?;
    req.validate()?;

    let user = match state.users.authenticate(&req.username, &req.password).await {
        Ok(user) => user,
        Err(e) => {
            tracing::warn!(identifier = %req.username, "Login failed");
            return Err(e.into());
        }
    };

    // A session presented with the login is never carried over
    if let Some(previous) = current.get() {
        state.sessions.destroy(&previous.id).await;
    }

    let session = state.sessions.create(&user).await;
    tracing::info!(
        user_id = user.id,
        role = %user.role,
        session = log_prefix(&session.id),
        "User logged in"
    );

    let cookie = session_cookie(&session.id, state.config.api.production);
    let body = LoginResponse {
        success: true,
        user: SessionUser::from(&session),
        csrf_token: session.csrf_token.clone(),
    };

    Ok(([(header::SET_COOKIE, cookie)], Json(body)).into_response())
}

/// Logout endpoint
///
/// # Errors
///
/// - `401 Unauthorized`: no session
pub async fn logout(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentSession>,
) -> ApiResult<Response> {
    let session = require(current.get(), Action::Logout, Resource::None)?;

    state.sessions.destroy(&session.id).await;
    tracing::info!(user_id = session.user_id, "User logged out");

    let cookie = clear_cookie(state.config.api.production);
    Ok(([(header::SET_COOKIE, cookie)], Json(SuccessResponse::ok())).into_response())
}

/// Session check endpoint
///
/// # Errors
///
/// - `401 Unauthorized`: no session, or it expired
pub async fn check(Extension(current): Extension<CurrentSession>) -> ApiResult<Json<CheckResponse>> {
    authorize(current.get(), Action::CheckSession, Resource::None)?;

    let session = current
        .get()
        .ok_or_else(|| ApiError::Unauthorized("Not authenticated".to_string()))?;

    Ok(Json(CheckResponse {
        user: SessionUser::from(session),
        csrf_token: session.csrf_token.clone(),
    }))
}
