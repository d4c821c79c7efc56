/// PostgreSQL storage backend
///
/// A thin adapter from the store traits to the queries on the model types.
/// Constraint violations are translated into [`StoreError`] variants so that
/// repositories never inspect database error codes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::{CommentStore, Store, StoreError, StoreResult, TaskStore, UserStore};
use crate::db::pool::health_check;
use crate::models::comment::{Comment, CommentView, CreateComment};
use crate::models::task::{CreateTask, DueTask, StatsScope, Task, TaskStats, TaskStatus, TaskView};
use crate::models::user::{CreateUser, UpdateUser, User};

/// Store backed by a PostgreSQL pool
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Translates constraint violations; everything else stays a database error.
fn translate(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        let constraint = db_err.constraint().unwrap_or_default().to_string();

        if db_err.is_unique_violation() {
            let field = if constraint.contains("email") {
                "email"
            } else if constraint.contains("username") {
                "username"
            } else {
                constraint.as_str()
            };
            return StoreError::Duplicate { field: field.to_string() };
        }

        if db_err.is_foreign_key_violation() {
            return StoreError::ForeignKey { constraint };
        }
    }

    StoreError::Database(err)
}

#[async_trait]
impl UserStore for PgStore {
    async fn insert_user(&self, data: CreateUser) -> StoreResult<User> {
        User::create(&self.pool, data).await.map_err(translate)
    }

    async fn find_user(&self, id: i64) -> StoreResult<Option<User>> {
        User::find_by_id(&self.pool, id).await.map_err(translate)
    }

    async fn find_user_by_login(&self, identifier: &str) -> StoreResult<Option<User>> {
        User::find_by_login(&self.pool, identifier).await.map_err(translate)
    }

    async fn list_users(&self) -> StoreResult<Vec<User>> {
        User::list(&self.pool).await.map_err(translate)
    }

    async fn update_user(&self, id: i64, data: UpdateUser) -> StoreResult<Option<User>> {
        User::update(&self.pool, id, data).await.map_err(translate)
    }

    async fn delete_user(&self, id: i64) -> StoreResult<bool> {
        User::delete(&self.pool, id).await.map_err(translate)
    }
}

#[async_trait]
impl TaskStore for PgStore {
    async fn insert_task(&self, data: CreateTask) -> StoreResult<Task> {
        Task::create(&self.pool, data).await.map_err(translate)
    }

    async fn find_task(&self, id: i64) -> StoreResult<Option<TaskView>> {
        Task::find_view(&self.pool, id).await.map_err(translate)
    }

    async fn list_tasks(&self, assignee: Option<i64>) -> StoreResult<Vec<TaskView>> {
        Task::list_views(&self.pool, assignee).await.map_err(translate)
    }

    async fn set_description(&self, id: i64, description: &str) -> StoreResult<bool> {
        Task::set_description(&self.pool, id, description).await.map_err(translate)
    }

    async fn set_status(&self, id: i64, status: TaskStatus) -> StoreResult<Option<TaskStatus>> {
        Task::set_status(&self.pool, id, status).await.map_err(translate)
    }

    async fn delete_task(&self, id: i64) -> StoreResult<bool> {
        Task::delete(&self.pool, id).await.map_err(translate)
    }

    async fn task_stats(&self, scope: StatsScope) -> StoreResult<TaskStats> {
        Task::stats(&self.pool, scope).await.map_err(translate)
    }

    async fn list_due(&self, from: DateTime<Utc>, until: DateTime<Utc>) -> StoreResult<Vec<DueTask>> {
        Task::list_due(&self.pool, from, until).await.map_err(translate)
    }

    async fn mark_reminder_sent(&self, id: i64) -> StoreResult<bool> {
        Task::mark_reminder_sent(&self.pool, id).await.map_err(translate)
    }
}

#[async_trait]
impl CommentStore for PgStore {
    async fn insert_comment(&self, data: CreateComment) -> StoreResult<Comment> {
        Comment::create(&self.pool, data).await.map_err(translate)
    }

    async fn list_comments(&self, task_id: i64) -> StoreResult<Vec<CommentView>> {
        Comment::list_for_task(&self.pool, task_id).await.map_err(translate)
    }
}

#[async_trait]
impl Store for PgStore {
    async fn ping(&self) -> StoreResult<()> {
        health_check(&self.pool).await.map_err(StoreError::Database)
    }

    fn backend(&self) -> &'static str {
        "postgres"
    }
}
