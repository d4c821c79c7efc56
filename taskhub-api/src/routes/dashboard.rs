/// Task statistics
///
/// - `GET /api/admin/dashboard`: every task (admin only)
/// - `GET /api/user/dashboard`: tasks assigned to the caller
/// - `GET /api/dashboard`: global for admins, own for users
///
/// All three answer `{"stats": {"total", "pending", "in_progress", "completed"}}`.

use axum::{extract::State, Extension, Json};
use serde::Serialize;
use taskhub_shared::auth::guard::{require, Action, Resource};
use taskhub_shared::models::task::{StatsScope, TaskStats};

use crate::app::AppState;
use crate::error::ApiResult;
use crate::middleware::session::CurrentSession;

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub stats: TaskStats,
}

async fn stats(state: &AppState, scope: StatsScope) -> ApiResult<Json<StatsResponse>> {
    let stats = state.tasks.stats(scope).await?;
    Ok(Json(StatsResponse { stats }))
}

pub async fn admin_dashboard(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentSession>,
) -> ApiResult<Json<StatsResponse>> {
    require(current.get(), Action::ViewGlobalStats, Resource::None)?;
    stats(&state, StatsScope::Global).await
}

pub async fn user_dashboard(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentSession>,
) -> ApiResult<Json<StatsResponse>> {
    let session = require(current.get(), Action::ViewOwnStats, Resource::None)?;
    stats(&state, StatsScope::Assignee(session.user_id)).await
}

pub async fn dashboard(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentSession>,
) -> ApiResult<Json<StatsResponse>> {
    let session = require(current.get(), Action::ViewOwnStats, Resource::None)?;

    let scope = if session.is_admin() {
        StatsScope::Global
    } else {
        StatsScope::Assignee(session.user_id)
    };
    stats(&state, scope).await
}
