/// Task model and database operations
///
/// A task is created by an administrator and assigned to exactly one user.
/// Status moves freely between the three [`TaskStatus`] values; after
/// creation only the description may be edited.
///
/// # Schema
///
/// ```sql
/// CREATE TYPE task_status AS ENUM ('Pending', 'In Progress', 'Completed');
///
/// CREATE TABLE tasks (
///     id BIGSERIAL PRIMARY KEY,
///     title VARCHAR(255) NOT NULL,
///     description TEXT NOT NULL DEFAULT '',
///     assigned_to BIGINT NOT NULL REFERENCES users(id) ON DELETE RESTRICT,
///     assigned_by BIGINT NOT NULL REFERENCES users(id) ON DELETE RESTRICT,
///     deadline TIMESTAMPTZ,
///     status task_status NOT NULL DEFAULT 'Pending',
///     reminder_sent BOOLEAN NOT NULL DEFAULT FALSE,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```
///
/// # Example
///
/// ```no_run
/// use taskhub_shared::models::task::{CreateTask, Task, TaskStatus};
/// use taskhub_shared::db::pool::{create_pool, DatabaseConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig::default()).await?;
///
/// let task = Task::create(&pool, CreateTask {
///     title: "Prepare release notes".to_string(),
///     description: String::new(),
///     assigned_to: 2,
///     assigned_by: 1,
///     deadline: None,
/// }).await?;
///
/// let previous = Task::set_status(&pool, task.id, TaskStatus::InProgress).await?;
/// assert_eq!(previous, Some(TaskStatus::Pending));
/// # Ok(())
/// # }
/// ```

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

/// Task status
///
/// The wire and database spellings are the human-readable labels, including
/// the space in `In Progress`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "task_status")]
pub enum TaskStatus {
    #[serde(rename = "Pending")]
    #[sqlx(rename = "Pending")]
    Pending,

    #[serde(rename = "In Progress")]
    #[sqlx(rename = "In Progress")]
    InProgress,

    #[serde(rename = "Completed")]
    #[sqlx(rename = "Completed")]
    Completed,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 3] = [TaskStatus::Pending, TaskStatus::InProgress, TaskStatus::Completed];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "Pending",
            TaskStatus::InProgress => "In Progress",
            TaskStatus::Completed => "Completed",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TaskStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("Status must be one of: Pending, In Progress, Completed (got '{}')", s))
    }
}

/// Task row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Task {
    pub id: i64,
    pub title: String,
    pub description: String,
    /// Assignee
    pub assigned_to: i64,
    /// Administrator who created the task
    pub assigned_by: i64,
    pub deadline: Option<DateTime<Utc>>,
    pub status: TaskStatus,
    pub reminder_sent: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Task joined with the usernames of its assignee and assigner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct TaskView {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub task: Task,
    pub assigned_to_name: Option<String>,
    pub assigned_by_name: Option<String>,
}

/// Task that is due soon, with the address its reminder goes to
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct DueTask {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub view: TaskView,
    pub assigned_to_email: String,
}

/// Input for creating a task
#[derive(Debug, Clone)]
pub struct CreateTask {
    pub title: String,
    pub description: String,
    pub assigned_to: i64,
    pub assigned_by: i64,
    pub deadline: Option<DateTime<Utc>>,
}

/// Per-status task counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct TaskStats {
    pub total: i64,
    pub pending: i64,
    pub in_progress: i64,
    pub completed: i64,
}

/// Which tasks an aggregate covers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatsScope {
    Global,
    Assignee(i64),
}

/// Parses a client-supplied deadline.
///
/// Accepts an RFC 3339 timestamp, or a plain `YYYY-MM-DD` date meaning the
/// last second of that day in UTC. Blank input means no deadline.
///
/// # Example
///
/// ```
/// use taskhub_shared::models::task::parse_deadline;
///
/// let end_of_day = parse_deadline("2024-03-01").unwrap().unwrap();
/// assert_eq!(end_of_day.to_rfc3339(), "2024-03-01T23:59:59+00:00");
/// assert!(parse_deadline("").unwrap().is_none());
/// assert!(parse_deadline("next tuesday").is_err());
/// ```
pub fn parse_deadline(raw: &str) -> Result<Option<DateTime<Utc>>, String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }

    if let Ok(timestamp) = DateTime::parse_from_rfc3339(raw) {
        return Ok(Some(timestamp.with_timezone(&Utc)));
    }

    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| "Deadline must be an RFC 3339 timestamp or a YYYY-MM-DD date".to_string())?;
    let end_of_day = NaiveTime::from_hms_opt(23, 59, 59)
        .ok_or_else(|| "Invalid end-of-day time".to_string())?;

    Ok(Some(Utc.from_utc_datetime(&date.and_time(end_of_day))))
}

const VIEW_SELECT: &str = r#"
    SELECT t.id, t.title, t.description, t.assigned_to, t.assigned_by, t.deadline,
           t.status, t.reminder_sent, t.created_at, t.updated_at,
           assignee.username AS assigned_to_name,
           assigner.username AS assigned_by_name
    FROM tasks t
    LEFT JOIN users assignee ON assignee.id = t.assigned_to
    LEFT JOIN users assigner ON assigner.id = t.assigned_by
"#;

impl Task {
    /// Inserts a task in `Pending` state.
    ///
    /// # Errors
    ///
    /// Fails with a foreign key violation if either user id is unknown.
    pub async fn create(pool: &PgPool, data: CreateTask) -> Result<Self, sqlx::Error> {
        let task = sqlx::query_as::<_, Task>(
            r#"
            INSERT INTO tasks (title, description, assigned_to, assigned_by, deadline)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, title, description, assigned_to, assigned_by, deadline,
                      status, reminder_sent, created_at, updated_at
            "#,
        )
        .bind(data.title)
        .bind(data.description)
        .bind(data.assigned_to)
        .bind(data.assigned_by)
        .bind(data.deadline)
        .fetch_one(pool)
        .await?;

        Ok(task)
    }

    pub async fn find_view(pool: &PgPool, id: i64) -> Result<Option<TaskView>, sqlx::Error> {
        let view = sqlx::query_as::<_, TaskView>(&format!("{VIEW_SELECT} WHERE t.id = $1"))
            .bind(id)
            .fetch_optional(pool)
            .await?;

        Ok(view)
    }

    /// Lists tasks newest first, optionally only those assigned to one user.
    pub async fn list_views(pool: &PgPool, assignee: Option<i64>) -> Result<Vec<TaskView>, sqlx::Error> {
        let views = sqlx::query_as::<_, TaskView>(&format!(
            r#"
            {VIEW_SELECT}
            WHERE ($1::BIGINT IS NULL OR t.assigned_to = $1)
            ORDER BY t.created_at DESC, t.id DESC
            "#
        ))
        .bind(assignee)
        .fetch_all(pool)
        .await?;

        Ok(views)
    }

    /// Replaces the description. Returns false if the task does not exist.
    pub async fn set_description(pool: &PgPool, id: i64, description: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE tasks SET description = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(description)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Sets the status and returns the previous one.
    ///
    /// Returns `None` if the task does not exist. `updated_at` only moves
    /// when the status actually changes.
    pub async fn set_status(pool: &PgPool, id: i64, status: TaskStatus) -> Result<Option<TaskStatus>, sqlx::Error> {
        let previous = sqlx::query_scalar::<_, TaskStatus>(
            r#"
            WITH prev AS (
                SELECT id, status FROM tasks WHERE id = $1 FOR UPDATE
            )
            UPDATE tasks t
            SET status = $2,
                updated_at = CASE WHEN prev.status = $2 THEN t.updated_at ELSE NOW() END
            FROM prev
            WHERE t.id = prev.id
            RETURNING prev.status
            "#,
        )
        .bind(id)
        .bind(status)
        .fetch_optional(pool)
        .await?;

        Ok(previous)
    }

    /// Deletes a task; its comments go with it via `ON DELETE CASCADE`.
    pub async fn delete(pool: &PgPool, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Counts tasks per status in a single aggregate query.
    pub async fn stats(pool: &PgPool, scope: StatsScope) -> Result<TaskStats, sqlx::Error> {
        let assignee = match scope {
            StatsScope::Global => None,
            StatsScope::Assignee(user_id) => Some(user_id),
        };

        let stats = sqlx::query_as::<_, TaskStats>(
            r#"
            SELECT COUNT(*) AS total,
                   COUNT(*) FILTER (WHERE status = 'Pending') AS pending,
                   COUNT(*) FILTER (WHERE status = 'In Progress') AS in_progress,
                   COUNT(*) FILTER (WHERE status = 'Completed') AS completed
            FROM tasks
            WHERE ($1::BIGINT IS NULL OR assigned_to = $1)
            "#,
        )
        .bind(assignee)
        .fetch_one(pool)
        .await?;

        Ok(stats)
    }

    /// Lists open tasks whose deadline falls in `[from, until]` and whose
    /// reminder has not been sent, soonest first.
    pub async fn list_due(
        pool: &PgPool,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<DueTask>, sqlx::Error> {
        let due = sqlx::query_as::<_, DueTask>(&format!(
            r#"
            SELECT sub.*, u.email AS assigned_to_email
            FROM ({VIEW_SELECT}) sub
            JOIN users u ON u.id = sub.assigned_to
            WHERE sub.status <> 'Completed'
              AND sub.reminder_sent = FALSE
              AND sub.deadline BETWEEN $1 AND $2
            ORDER BY sub.deadline ASC, sub.id ASC
            "#
        ))
        .bind(from)
        .bind(until)
        .fetch_all(pool)
        .await?;

        Ok(due)
    }

    /// Flags the reminder as sent. Returns true only for the call that
    /// flipped the flag.
    pub async fn mark_reminder_sent(pool: &PgPool, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE tasks SET reminder_sent = TRUE WHERE id = $1 AND reminder_sent = FALSE",
        )
        .bind(id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

/// Window used by `list_due_soon`; the end saturates at the latest
/// representable time.
pub fn due_window(now: DateTime<Utc>, window_hours: u32) -> (DateTime<Utc>, DateTime<Utc>) {
    let until = now
        .checked_add_signed(Duration::hours(i64::from(window_hours)))
        .unwrap_or(DateTime::<Utc>::MAX_UTC);
    (now, until)
}
