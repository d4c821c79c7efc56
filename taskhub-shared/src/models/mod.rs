/// Database models for TaskHub
///
/// Each model owns its row type, its input types and the PostgreSQL queries
/// that read and write it. The [`crate::store`] layer wraps these queries
/// behind traits so that repositories also run against the in-memory store.
///
/// # Models
///
/// - `user`: accounts and roles
/// - `task`: tasks, status, deadlines and per-status aggregates
/// - `comment`: append-only task comments

pub mod comment;
pub mod task;
pub mod user;
