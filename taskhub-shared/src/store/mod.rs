/// Storage traits
///
/// Repositories talk to storage only through these traits. Two backends
/// implement them:
///
/// - [`postgres::PgStore`]: the production backend, delegating to the
///   queries on the model types
/// - [`memory::MemoryStore`]: a `tokio::sync::RwLock` over in-process maps,
///   used in development without `DATABASE_URL` and throughout the tests
///
/// Both backends enforce the same constraints: unique usernames and emails,
/// tasks and comments keep the users they reference alive, and deleting a
/// task deletes its comments.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::comment::{Comment, CommentView, CreateComment};
use crate::models::task::{CreateTask, DueTask, StatsScope, Task, TaskStats, TaskStatus, TaskView};
use crate::models::user::{CreateUser, UpdateUser, User};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Error type for storage operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A unique column already holds this value
    #[error("Duplicate value for {field}")]
    Duplicate { field: String },

    /// A row is referenced by, or references, a row that blocks the write
    #[error("Foreign key constraint violated: {constraint}")]
    ForeignKey { constraint: String },

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn insert_user(&self, data: CreateUser) -> StoreResult<User>;

    async fn find_user(&self, id: i64) -> StoreResult<Option<User>>;

    /// Exact match on username or email, username preferred
    async fn find_user_by_login(&self, identifier: &str) -> StoreResult<Option<User>>;

    async fn list_users(&self) -> StoreResult<Vec<User>>;

    async fn update_user(&self, id: i64, data: UpdateUser) -> StoreResult<Option<User>>;

    /// Fails with `ForeignKey` while tasks or comments reference the user
    async fn delete_user(&self, id: i64) -> StoreResult<bool>;
}

#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn insert_task(&self, data: CreateTask) -> StoreResult<Task>;

    async fn find_task(&self, id: i64) -> StoreResult<Option<TaskView>>;

    /// Newest first; all tasks when `assignee` is `None`
    async fn list_tasks(&self, assignee: Option<i64>) -> StoreResult<Vec<TaskView>>;

    async fn set_description(&self, id: i64, description: &str) -> StoreResult<bool>;

    /// Returns the status held before the write, `None` if the task is gone
    async fn set_status(&self, id: i64, status: TaskStatus) -> StoreResult<Option<TaskStatus>>;

    async fn delete_task(&self, id: i64) -> StoreResult<bool>;

    async fn task_stats(&self, scope: StatsScope) -> StoreResult<TaskStats>;

    async fn list_due(&self, from: DateTime<Utc>, until: DateTime<Utc>) -> StoreResult<Vec<DueTask>>;

    async fn mark_reminder_sent(&self, id: i64) -> StoreResult<bool>;
}

#[async_trait]
pub trait CommentStore: Send + Sync {
    async fn insert_comment(&self, data: CreateComment) -> StoreResult<Comment>;

    /// Oldest first
    async fn list_comments(&self, task_id: i64) -> StoreResult<Vec<CommentView>>;
}

/// A complete storage backend
#[async_trait]
pub trait Store: UserStore + TaskStore + CommentStore {
    /// Cheap round trip used by the health endpoint
    async fn ping(&self) -> StoreResult<()>;

    fn backend(&self) -> &'static str;
}
