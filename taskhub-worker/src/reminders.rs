/// Deadline reminder sweep
///
/// Periodically finds open tasks whose deadline falls within the reminder
/// window and emails their assignees.
///
/// # Loop
///
/// ```text
/// ReminderSweep::run
///   ├─> TaskRepository: list due tasks with no reminder sent
///   ├─> Notifier: one DeadlineReminder per task
///   ├─> TaskRepository: mark reminder sent (successful sends only)
///   └─> sleep(interval) or shutdown
/// ```
///
/// A failed send leaves the task unmarked, so the next sweep retries it.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use std::time::Duration;
/// use taskhub_shared::notify::{Dispatcher, LogMailer};
/// use taskhub_shared::repository::TaskRepository;
/// use taskhub_shared::store::MemoryStore;
/// use taskhub_worker::reminders::ReminderSweep;
/// use tokio_util::sync::CancellationToken;
///
/// # async fn example() {
/// let notifier = Arc::new(Dispatcher::new(Arc::new(LogMailer), "http://localhost:8080"));
/// let tasks = TaskRepository::new(Arc::new(MemoryStore::new()), notifier.clone());
///
/// let sweep = ReminderSweep::new(tasks, notifier, 24, Duration::from_secs(3600));
/// sweep.run(CancellationToken::new()).await;
/// # }
/// ```

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use taskhub_shared::error::CoreResult;
use taskhub_shared::notify::{Notification, Notifier};
use taskhub_shared::repository::TaskRepository;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

/// Outcome of one sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Tasks found inside the window
    pub due: usize,
    pub sent: usize,
    pub failed: usize,
}

pub struct ReminderSweep {
    tasks: TaskRepository,
    notifier: Arc<dyn Notifier>,
    window_hours: u32,
    interval: Duration,
}

impl ReminderSweep {
    pub fn new(tasks: TaskRepository, notifier: Arc<dyn Notifier>, window_hours: u32, interval: Duration) -> Self {
        Self {
            tasks,
            notifier,
            window_hours,
            interval,
        }
    }

    pub async fn run_once(&self) -> CoreResult<SweepReport> {
        self.run_once_at(Utc::now()).await
    }

    /// Sends reminders for tasks due between `now` and the end of the window.
    ///
    /// # Errors
    ///
    /// Storage errors abort the sweep. Delivery errors do not; they are
    /// counted in [`SweepReport::failed`].
    pub async fn run_once_at(&self, now: DateTime<Utc>) -> CoreResult<SweepReport> {
        let due = self.tasks.list_due_soon_at(now, self.window_hours).await?;
        let mut report = SweepReport {
            due: due.len(),
            ..SweepReport::default()
        };

        for task in due {
            let task_id = task.view.task.id;
            let reminder = Notification::DeadlineReminder {
                email: task.assigned_to_email,
                task: task.view,
            };

            match self.notifier.notify(reminder).await {
                Ok(()) => {
                    if !self.tasks.mark_reminder_sent(task_id).await? {
                        tracing::debug!(task_id, "Reminder already marked by another sweep");
                    }
                    report.sent += 1;
                }
                Err(e) => {
                    tracing::warn!(task_id, error = %e, "Reminder not delivered; will retry");
                    report.failed += 1;
                }
            }
        }

        Ok(report)
    }

    /// Sweeps immediately, then once per interval, until `shutdown` fires.
    pub async fn run(&self, shutdown: CancellationToken) {
        tracing::info!(
            window_hours = self.window_hours,
            interval_secs = self.interval.as_secs(),
            "Reminder sweep starting"
        );

        loop {
            match self.run_once().await {
                Ok(report) if report.due > 0 => {
                    tracing::info!(due = report.due, sent = report.sent, failed = report.failed, "Reminder sweep finished");
                }
                Ok(_) => tracing::debug!("No reminders due"),
                Err(e) => tracing::error!(error = %e, "Reminder sweep failed"),
            }

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = sleep(self.interval) => {}
            }
        }

        tracing::info!("Reminder sweep stopped");
    }
}
