/// API route handlers
///
/// This module contains all route handlers organized by resource:
///
/// - `health`: Health check endpoint
/// - `auth`: Login, logout, session check
/// - `users`: Account administration
/// - `tasks`: Task administration and status updates
/// - `comments`: Task comments
/// - `dashboard`: Task statistics
/// - `feed`: Server-sent change feeds

pub mod auth;
pub mod comments;
pub mod dashboard;
pub mod feed;
pub mod health;
pub mod tasks;
pub mod users;

use serde::Serialize;

/// Body of a successful mutation without further data
#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

impl SuccessResponse {
    pub fn ok() -> Self {
        Self { success: true }
    }
}
