/// Task repository
///
/// Business rules for tasks on top of a [`Store`]: input validation,
/// not-found reporting, and the notifications that follow a write. A failed
/// notification is logged and never undoes the write that caused it.
///
/// Concurrent writes to the same field are last-write-wins; there is no
/// version column.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::error::{CoreError, CoreResult, ValidationErrors};
use crate::models::task::{
    due_window, CreateTask, DueTask, StatsScope, TaskStats, TaskStatus, TaskView,
};
use crate::notify::{Notification, Notifier};
use crate::store::{Store, StoreError};

/// Longest accepted task title, in characters
pub const MAX_TITLE_LENGTH: usize = 255;

/// Input for creating a task
#[derive(Debug, Clone)]
pub struct NewTask {
    pub title: String,
    pub description: String,
    pub assigned_to: i64,
    pub assigned_by: i64,
    pub deadline: Option<DateTime<Utc>>,
}

/// Outcome of a status update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusChange {
    pub previous: TaskStatus,
    pub current: TaskStatus,
}

impl StatusChange {
    pub fn changed(&self) -> bool {
        self.previous != self.current
    }
}

#[derive(Clone)]
pub struct TaskRepository {
    store: Arc<dyn Store>,
    notifier: Arc<dyn Notifier>,
}

impl TaskRepository {
    pub fn new(store: Arc<dyn Store>, notifier: Arc<dyn Notifier>) -> Self {
        Self { store, notifier }
    }

    /// All tasks, newest first.
    pub async fn list_all(&self) -> CoreResult<Vec<TaskView>> {
        Ok(self.store.list_tasks(None).await?)
    }

    /// Tasks assigned to one user, newest first.
    pub async fn list_for_user(&self, user_id: i64) -> CoreResult<Vec<TaskView>> {
        Ok(self.store.list_tasks(Some(user_id)).await?)
    }

    pub async fn find(&self, id: i64) -> CoreResult<Option<TaskView>> {
        Ok(self.store.find_task(id).await?)
    }

    pub async fn get(&self, id: i64) -> CoreResult<TaskView> {
        self.find(id).await?.ok_or(CoreError::NotFound("Task"))
    }

    /// Creates a task and tells the assignee about it.
    ///
    /// # Errors
    ///
    /// `CoreError::Validation` if the title is blank or too long, or the
    /// assignee does not exist.
    pub async fn create(&self, input: NewTask) -> CoreResult<i64> {
        let mut errors = ValidationErrors::new();
        let title_length = input.title.trim().chars().count();
        if title_length == 0 {
            errors.add("title", "Title is required");
        } else if title_length > MAX_TITLE_LENGTH {
            errors.add("title", format!("Title must be at most {} characters", MAX_TITLE_LENGTH));
        }

        let assignee = self.store.find_user(input.assigned_to).await?;
        if assignee.is_none() {
            errors.add("assigned_to", "Assigned user does not exist");
        }
        errors.into_result()?;

        let task = self
            .store
            .insert_task(CreateTask {
                title: input.title.trim().to_string(),
                description: input.description,
                assigned_to: input.assigned_to,
                assigned_by: input.assigned_by,
                deadline: input.deadline,
            })
            .await
            .map_err(|e| match e {
                StoreError::ForeignKey { .. } => {
                    CoreError::validation("assigned_to", "Assigned user does not exist")
                }
                other => CoreError::Storage(other),
            })?;

        tracing::info!(
            task_id = task.id,
            assigned_to = task.assigned_to,
            assigned_by = task.assigned_by,
            "Task created"
        );

        if let Some(assignee) = assignee {
            self.notify_best_effort(task.id, |view| Notification::TaskAssigned {
                email: assignee.email.clone(),
                task: view,
            })
            .await;
        }

        Ok(task.id)
    }

    /// Replaces a task's description.
    pub async fn update_description(&self, id: i64, description: &str) -> CoreResult<()> {
        if !self.store.set_description(id, description).await? {
            return Err(CoreError::NotFound("Task"));
        }

        tracing::info!(task_id = id, "Task description updated");
        Ok(())
    }

    /// Sets a task's status.
    ///
    /// Setting the status it already has succeeds without side effects.
    /// An actual change notifies the administrator who assigned the task.
    pub async fn update_status(&self, id: i64, status: &str) -> CoreResult<StatusChange> {
        let status: TaskStatus = status
            .parse()
            .map_err(|message: String| CoreError::validation("status", message))?;

        let previous = self
            .store
            .set_status(id, status)
            .await?
            .ok_or(CoreError::NotFound("Task"))?;
        let change = StatusChange { previous, current: status };

        if change.changed() {
            tracing::info!(
                task_id = id,
                from = %previous,
                to = %status,
                "Task status changed"
            );
            self.notify_assigner(id, previous).await;
        }

        Ok(change)
    }

    /// Deletes a task together with its comments.
    pub async fn delete(&self, id: i64) -> CoreResult<()> {
        if !self.store.delete_task(id).await? {
            return Err(CoreError::NotFound("Task"));
        }

        tracing::info!(task_id = id, "Task deleted");
        Ok(())
    }

    /// Per-status counts, globally or for one assignee.
    pub async fn stats(&self, scope: StatsScope) -> CoreResult<TaskStats> {
        Ok(self.store.task_stats(scope).await?)
    }

    /// Open tasks due within the next `window_hours` whose reminder is unsent.
    pub async fn list_due_soon(&self, window_hours: u32) -> CoreResult<Vec<DueTask>> {
        self.list_due_soon_at(Utc::now(), window_hours).await
    }

    pub async fn list_due_soon_at(&self, now: DateTime<Utc>, window_hours: u32) -> CoreResult<Vec<DueTask>> {
        let (from, until) = due_window(now, window_hours);
        Ok(self.store.list_due(from, until).await?)
    }

    /// Flags a task's reminder as sent. True only if this call flipped it.
    pub async fn mark_reminder_sent(&self, id: i64) -> CoreResult<bool> {
        Ok(self.store.mark_reminder_sent(id).await?)
    }

    async fn notify_assigner(&self, id: i64, previous: TaskStatus) {
        let assigner = match self.store.find_task(id).await {
            Ok(Some(view)) => self.store.find_user(view.task.assigned_by).await,
            Ok(None) => return,
            Err(e) => Err(e),
        };

        match assigner {
            Ok(Some(assigner)) => {
                self.notify_best_effort(id, |view| Notification::StatusChanged {
                    email: assigner.email.clone(),
                    task: view,
                    previous,
                })
                .await
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(task_id = id, error = %e, "Could not load assigner for notification"),
        }
    }

    async fn notify_best_effort<F>(&self, task_id: i64, build: F)
    where
        F: FnOnce(TaskView) -> Notification,
    {
        let view = match self.store.find_task(task_id).await {
            Ok(Some(view)) => view,
            Ok(None) => return,
            Err(e) => {
                tracing::warn!(task_id, error = %e, "Could not load task for notification");
                return;
            }
        };

        if let Err(e) = self.notifier.notify(build(view)).await {
            tracing::warn!(task_id, error = %e, "Task notification not delivered");
        }
    }
}
