/// Notification dispatcher
///
/// Repositories describe *what happened* as a [`Notification`] and hand it
/// to a [`Notifier`]. The [`Dispatcher`] renders the event into a
/// [`Message`] for the right template and passes it to a [`Mailer`].
///
/// Delivery is best-effort: failures come back as [`NotifyError`] and the
/// caller decides whether they matter. Only a credential change surfaces a
/// failed send to the administrator who made it.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use taskhub_shared::notify::{Dispatcher, Notification, Notifier};
/// use taskhub_shared::notify::mailer::MemoryMailer;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let mailer = Arc::new(MemoryMailer::new());
/// let dispatcher = Dispatcher::new(mailer.clone(), "http://localhost:8080");
///
/// dispatcher.notify(Notification::AccountCreated {
///     email: "bob@example.com".to_string(),
///     username: "bob".to_string(),
/// }).await?;
///
/// assert_eq!(mailer.sent().await.len(), 1);
/// # Ok(())
/// # }
/// ```

pub mod mailer;

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use crate::models::task::{TaskStatus, TaskView};

pub use mailer::{HttpMailer, LogMailer, Mailer, MemoryMailer, Message};

/// Error type for notification delivery
#[derive(Debug, Clone, thiserror::Error)]
pub enum NotifyError {
    /// Could not reach the transport
    #[error("Mail transport failed: {0}")]
    Transport(String),

    /// Transport did not answer in time
    #[error("Mail transport timed out after {0}ms")]
    Timeout(u64),

    /// Transport answered but refused the message
    #[error("Mail transport rejected message: {0}")]
    Rejected(String),
}

/// Template a message is rendered with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Template {
    TaskAssigned,
    TaskStatusChanged,
    CredentialsChanged,
    AccountCreated,
    DeadlineReminder,
}

impl Template {
    pub fn as_str(&self) -> &'static str {
        match self {
            Template::TaskAssigned => "task_assigned",
            Template::TaskStatusChanged => "task_status_changed",
            Template::CredentialsChanged => "credentials_changed",
            Template::AccountCreated => "account_created",
            Template::DeadlineReminder => "deadline_reminder",
        }
    }
}

/// Something a user should hear about
#[derive(Debug, Clone)]
pub enum Notification {
    /// To the assignee, after a task is created
    TaskAssigned { email: String, task: TaskView },

    /// To the assigner, after the assignee moves the task
    StatusChanged { email: String, task: TaskView, previous: TaskStatus },

    /// To the affected user, after an administrator edits the account
    CredentialsChanged { email: String, username: String, password_changed: bool },

    /// To a new user
    AccountCreated { email: String, username: String },

    /// To the assignee, when the deadline is close
    DeadlineReminder { email: String, task: TaskView },
}

impl Notification {
    pub fn template(&self) -> Template {
        match self {
            Notification::TaskAssigned { .. } => Template::TaskAssigned,
            Notification::StatusChanged { .. } => Template::TaskStatusChanged,
            Notification::CredentialsChanged { .. } => Template::CredentialsChanged,
            Notification::AccountCreated { .. } => Template::AccountCreated,
            Notification::DeadlineReminder { .. } => Template::DeadlineReminder,
        }
    }

    pub fn recipient(&self) -> &str {
        match self {
            Notification::TaskAssigned { email, .. }
            | Notification::StatusChanged { email, .. }
            | Notification::CredentialsChanged { email, .. }
            | Notification::AccountCreated { email, .. }
            | Notification::DeadlineReminder { email, .. } => email,
        }
    }
}

/// Receives notifications from the repositories
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: Notification) -> Result<(), NotifyError>;
}

fn deadline_line(task: &TaskView) -> String {
    match task.task.deadline {
        Some(deadline) => format!("Deadline: {}", deadline.format("%Y-%m-%d %H:%M UTC")),
        None => "Deadline: none".to_string(),
    }
}

/// Renders notifications and sends them through a [`Mailer`]
#[derive(Clone)]
pub struct Dispatcher {
    mailer: Arc<dyn Mailer>,
    app_url: String,
}

impl Dispatcher {
    pub fn new(mailer: Arc<dyn Mailer>, app_url: impl Into<String>) -> Self {
        Self {
            mailer,
            app_url: app_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn render(&self, notification: &Notification) -> Message {
        let (subject, body) = match notification {
            Notification::TaskAssigned { task, .. } => (
                format!("New task assigned: {}", task.task.title),
                format!(
                    "{} assigned you a new task.\n\nTitle: {}\n{}\n\n{}\n\nView it at {}/user/tasks",
                    task.assigned_by_name.as_deref().unwrap_or("An administrator"),
                    task.task.title,
                    deadline_line(task),
                    task.task.description,
                    self.app_url
                ),
            ),
            Notification::StatusChanged { task, previous, .. } => (
                format!("Task status updated: {}", task.task.title),
                format!(
                    "{} moved \"{}\" from {} to {}.\n\nView it at {}/admin/tasks",
                    task.assigned_to_name.as_deref().unwrap_or("The assignee"),
                    task.task.title,
                    previous,
                    task.task.status,
                    self.app_url
                ),
            ),
            Notification::CredentialsChanged { username, password_changed, .. } => (
                "Your account details were updated".to_string(),
                format!(
                    "Hello {},\n\nAn administrator updated your account.{}\n\nSign in at {}/login",
                    username,
                    if *password_changed {
                        " Your password was changed; ask your administrator for the new one."
                    } else {
                        ""
                    },
                    self.app_url
                ),
            ),
            Notification::AccountCreated { username, .. } => (
                "Welcome to TaskHub".to_string(),
                format!(
                    "Hello {},\n\nAn account was created for you. Your administrator will give you your password.\n\nSign in at {}/login",
                    username, self.app_url
                ),
            ),
            Notification::DeadlineReminder { task, .. } => (
                format!("Reminder: \"{}\" is due soon", task.task.title),
                format!(
                    "Your task \"{}\" is still {}.\n{}\n\nView it at {}/user/tasks",
                    task.task.title,
                    task.task.status,
                    deadline_line(task),
                    self.app_url
                ),
            ),
        };

        Message {
            to: notification.recipient().to_string(),
            template: notification.template(),
            subject,
            body,
        }
    }
}

#[async_trait]
impl Notifier for Dispatcher {
    async fn notify(&self, notification: Notification) -> Result<(), NotifyError> {
        let message = self.render(&notification);

        match self.mailer.send(&message).await {
            Ok(()) => {
                tracing::debug!(
                    to = %message.to,
                    template = message.template.as_str(),
                    mailer = self.mailer.name(),
                    "Notification sent"
                );
                Ok(())
            }
            Err(e) => {
                tracing::warn!(
                    to = %message.to,
                    template = message.template.as_str(),
                    mailer = self.mailer.name(),
                    error = %e,
                    "Notification failed"
                );
                Err(e)
            }
        }
    }
}
