/// Access-control guard
///
/// Every request handler asks the guard before touching a repository. The
/// decision depends only on the session (or its absence), the [`Action`] and
/// the [`Resource`] it targets:
///
/// 1. No session: only `Login` and `CheckSession` pass; everything else is
///    [`Denial::Unauthenticated`] (401)
/// 2. Admin: every action passes
/// 3. User: only actions on their own tasks, their own aggregate and their
///    own feeds pass; everything else is [`Denial::Forbidden`] (403)
///
/// The rule table is an exhaustive match, so adding an [`Action`] does not
/// compile until its rule is written down.
///
/// # Example
///
/// ```
/// use taskhub_shared::auth::guard::{authorize, Action, Denial, Resource};
///
/// assert_eq!(
///     authorize(None, Action::ListAllTasks, Resource::None),
///     Err(Denial::Unauthenticated)
/// );
/// assert!(authorize(None, Action::Login, Resource::None).is_ok());
/// ```

use super::session::Session;
use crate::models::user::Role;

/// Everything a client can ask the service to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Login,
    CheckSession,
    Logout,

    // Administration
    ManageUsers,
    ListAllTasks,
    CreateTask,
    EditTask,
    DeleteTask,
    ViewGlobalStats,

    // Own work
    ListOwnTasks,
    ViewOwnStats,
    SubscribeOwnTasks,

    // Task-scoped
    UpdateTaskStatus,
    ViewComments,
    PostComment,
    SubscribeComments,
}

/// What an action targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    None,
    /// A task, identified for the guard by its assignee
    Task { assigned_to: i64 },
}

/// Why a request was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Denial {
    #[error("Authentication required")]
    Unauthenticated,

    #[error("You do not have permission to perform this action")]
    Forbidden,
}

/// Decides whether `session` may perform `action` on `resource`.
pub fn authorize(session: Option<&Session>, action: Action, resource: Resource) -> Result<(), Denial> {
    let Some(session) = session else {
        return match action {
            Action::Login | Action::CheckSession => Ok(()),
            _ => Err(Denial::Unauthenticated),
        };
    };

    let owns = |resource: Resource| match resource {
        Resource::Task { assigned_to } => assigned_to == session.user_id,
        Resource::None => false,
    };

    let allowed = match (session.role, action) {
        (Role::Admin, _) => true,

        (Role::User, Action::Login | Action::CheckSession | Action::Logout) => true,
        (Role::User, Action::ListOwnTasks | Action::ViewOwnStats | Action::SubscribeOwnTasks) => true,
        (
            Role::User,
            Action::UpdateTaskStatus | Action::ViewComments | Action::PostComment | Action::SubscribeComments,
        ) => owns(resource),
        (
            Role::User,
            Action::ManageUsers
            | Action::ListAllTasks
            | Action::CreateTask
            | Action::EditTask
            | Action::DeleteTask
            | Action::ViewGlobalStats,
        ) => false,
    };

    if allowed {
        Ok(())
    } else {
        tracing::warn!(
            user_id = session.user_id,
            role = %session.role,
            action = ?action,
            "Access denied"
        );
        Err(Denial::Forbidden)
    }
}

/// Like [`authorize`], but hands back the session on success.
///
/// For handlers of actions that always need a session.
pub fn require(session: Option<&Session>, action: Action, resource: Resource) -> Result<&Session, Denial> {
    authorize(session, action, resource)?;
    session.ok_or(Denial::Unauthenticated)
}
