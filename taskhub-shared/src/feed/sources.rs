use async_trait::async_trait;
use sha2::Sha256;

use super::{write_field, Fingerprint, SnapshotSource};
use crate::error::CoreResult;
use crate::models::comment::CommentView;
use crate::models::task::TaskView;
use crate::repository::{CommentRepository, TaskRepository};

// Usernames are display fields and stay out of the fingerprint.
impl Fingerprint for TaskView {
    fn write_fingerprint(&self, hasher: &mut Sha256) {
        let task = &self.task;
        write_field(hasher, &task.id.to_le_bytes());
        write_field(hasher, task.status.as_str().as_bytes());
        write_field(hasher, task.title.as_bytes());
        write_field(hasher, task.description.as_bytes());
        let deadline = task.deadline.map(|d| d.timestamp_micros()).unwrap_or(i64::MIN);
        write_field(hasher, &deadline.to_le_bytes());
        write_field(hasher, &task.updated_at.timestamp_micros().to_le_bytes());
    }
}

impl Fingerprint for CommentView {
    fn write_fingerprint(&self, hasher: &mut Sha256) {
        let comment = &self.comment;
        write_field(hasher, &comment.id.to_le_bytes());
        write_field(hasher, comment.comment.as_bytes());
        write_field(hasher, &comment.created_at.timestamp_micros().to_le_bytes());
    }
}

/// "My tasks": everything assigned to one user
#[derive(Clone)]
pub struct TaskFeed {
    tasks: TaskRepository,
    user_id: i64,
}

impl TaskFeed {
    pub fn new(tasks: TaskRepository, user_id: i64) -> Self {
        Self { tasks, user_id }
    }
}

#[async_trait]
impl SnapshotSource for TaskFeed {
    type Item = TaskView;

    fn name(&self) -> &'static str {
        "tasks"
    }

    async fn snapshot(&self) -> CoreResult<Vec<TaskView>> {
        self.tasks.list_for_user(self.user_id).await
    }
}

/// All comments on one task
#[derive(Clone)]
pub struct CommentFeed {
    comments: CommentRepository,
    task_id: i64,
}

impl CommentFeed {
    pub fn new(comments: CommentRepository, task_id: i64) -> Self {
        Self { comments, task_id }
    }
}

#[async_trait]
impl SnapshotSource for CommentFeed {
    type Item = CommentView;

    fn name(&self) -> &'static str {
        "comments"
    }

    async fn snapshot(&self) -> CoreResult<Vec<CommentView>> {
        self.comments.list_for_task(self.task_id).await
    }
}
