/// Task comments
///
/// Comments are append-only. `is_admin` records the author's role at the
/// moment of posting; `CommentView::role` is the author's current role.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE task_comments (
///     id BIGSERIAL PRIMARY KEY,
///     task_id BIGINT NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
///     user_id BIGINT NOT NULL REFERENCES users(id) ON DELETE RESTRICT,
///     comment TEXT NOT NULL,
///     is_admin BOOLEAN NOT NULL DEFAULT FALSE,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use super::user::Role;

/// Longest accepted comment, in characters as stored
pub const MAX_COMMENT_LENGTH: usize = 2000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Comment {
    pub id: i64,
    pub task_id: i64,
    pub user_id: i64,
    pub comment: String,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
}

/// Comment with its author's username and role
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct CommentView {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub comment: Comment,
    pub username: String,
    pub role: Role,
}

#[derive(Debug, Clone)]
pub struct CreateComment {
    pub task_id: i64,
    pub user_id: i64,
    pub comment: String,
    pub is_admin: bool,
}

impl Comment {
    pub async fn create(pool: &PgPool, data: CreateComment) -> Result<Self, sqlx::Error> {
        let comment = sqlx::query_as::<_, Comment>(
            r#"
            INSERT INTO task_comments (task_id, user_id, comment, is_admin)
            VALUES ($1, $2, $3, $4)
            RETURNING id, task_id, user_id, comment, is_admin, created_at
            "#,
        )
        .bind(data.task_id)
        .bind(data.user_id)
        .bind(data.comment)
        .bind(data.is_admin)
        .fetch_one(pool)
        .await?;

        Ok(comment)
    }

    /// Lists a task's comments oldest first.
    pub async fn list_for_task(pool: &PgPool, task_id: i64) -> Result<Vec<CommentView>, sqlx::Error> {
        let comments = sqlx::query_as::<_, CommentView>(
            r#"
            SELECT c.id, c.task_id, c.user_id, c.comment, c.is_admin, c.created_at,
                   u.username, u.role
            FROM task_comments c
            JOIN users u ON u.id = c.user_id
            WHERE c.task_id = $1
            ORDER BY c.created_at ASC, c.id ASC
            "#,
        )
        .bind(task_id)
        .fetch_all(pool)
        .await?;

        Ok(comments)
    }
}
