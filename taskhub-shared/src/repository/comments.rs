/// Comment repository
///
/// Comments are append-only and stored exactly as written. Trimming only
/// decides whether a comment is empty; the length limit applies to the
/// stored text.

use std::sync::Arc;

use crate::error::{CoreError, CoreResult};
use crate::models::comment::{CommentView, CreateComment, MAX_COMMENT_LENGTH};
use crate::store::{Store, StoreError};

#[derive(Clone)]
pub struct CommentRepository {
    store: Arc<dyn Store>,
}

impl CommentRepository {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Appends a comment to a task.
    ///
    /// `is_admin` records the author's role at posting time.
    ///
    /// # Errors
    ///
    /// - `CoreError::Validation` if the text is blank or too long
    /// - `CoreError::NotFound` if the task does not exist
    pub async fn add(&self, task_id: i64, user_id: i64, text: &str, is_admin: bool) -> CoreResult<i64> {
        if text.trim().is_empty() {
            return Err(CoreError::validation("comment", "Comment cannot be empty"));
        }
        if text.chars().count() > MAX_COMMENT_LENGTH {
            return Err(CoreError::validation(
                "comment",
                format!("Comment must be at most {} characters", MAX_COMMENT_LENGTH),
            ));
        }

        if self.store.find_task(task_id).await?.is_none() {
            return Err(CoreError::NotFound("Task"));
        }

        let comment = self
            .store
            .insert_comment(CreateComment {
                task_id,
                user_id,
                comment: text.to_string(),
                is_admin,
            })
            .await
            .map_err(|e| match e {
                // Task deleted between the check and the insert
                StoreError::ForeignKey { .. } => CoreError::NotFound("Task"),
                other => CoreError::Storage(other),
            })?;

        tracing::info!(task_id, user_id, comment_id = comment.id, is_admin, "Comment added");
        Ok(comment.id)
    }

    /// A task's comments, oldest first.
    pub async fn list_for_task(&self, task_id: i64) -> CoreResult<Vec<CommentView>> {
        if self.store.find_task(task_id).await?.is_none() {
            return Err(CoreError::NotFound("Task"));
        }
        Ok(self.store.list_comments(task_id).await?)
    }
}
