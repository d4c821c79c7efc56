/// In-memory storage backend
///
/// Holds every table in one `tokio::sync::RwLock`, so each trait call is
/// atomic with respect to the others. Ids are assigned from per-table
/// counters starting at 1, like `BIGSERIAL`.
///
/// # Example
///
/// ```
/// use taskhub_shared::models::user::{CreateUser, Role};
/// use taskhub_shared::store::{MemoryStore, UserStore};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = MemoryStore::new();
/// let user = store.insert_user(CreateUser {
///     username: "alice".to_string(),
///     email: "alice@example.com".to_string(),
///     password_hash: "$argon2id$...".to_string(),
///     role: Role::User,
/// }).await?;
/// assert_eq!(user.id, 1);
/// # Ok(())
/// # }
/// ```

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::{CommentStore, Store, StoreError, StoreResult, TaskStore, UserStore};
use crate::models::comment::{Comment, CommentView, CreateComment};
use crate::models::task::{CreateTask, DueTask, StatsScope, Task, TaskStats, TaskStatus, TaskView};
use crate::models::user::{CreateUser, UpdateUser, User};

#[derive(Debug, Default)]
struct Tables {
    users: BTreeMap<i64, User>,
    tasks: BTreeMap<i64, Task>,
    comments: BTreeMap<i64, Comment>,
    next_user_id: i64,
    next_task_id: i64,
    next_comment_id: i64,
}

fn next_id(counter: &mut i64) -> i64 {
    *counter += 1;
    *counter
}

impl Tables {
    fn check_unique(&self, username: &str, email: &str, except: Option<i64>) -> StoreResult<()> {
        for user in self.users.values().filter(|u| Some(u.id) != except) {
            if user.username == username {
                return Err(StoreError::Duplicate { field: "username".to_string() });
            }
            if user.email == email {
                return Err(StoreError::Duplicate { field: "email".to_string() });
            }
        }
        Ok(())
    }

    fn username(&self, id: i64) -> Option<String> {
        self.users.get(&id).map(|u| u.username.clone())
    }

    fn view(&self, task: &Task) -> TaskView {
        TaskView {
            task: task.clone(),
            assigned_to_name: self.username(task.assigned_to),
            assigned_by_name: self.username(task.assigned_by),
        }
    }
}

/// Store that keeps everything in process memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn insert_user(&self, data: CreateUser) -> StoreResult<User> {
        let mut tables = self.tables.write().await;
        tables.check_unique(&data.username, &data.email, None)?;

        let now = Utc::now();
        let user = User {
            id: next_id(&mut tables.next_user_id),
            username: data.username,
            email: data.email,
            password_hash: data.password_hash,
            role: data.role,
            created_at: now,
            updated_at: now,
        };
        tables.users.insert(user.id, user.clone());

        Ok(user)
    }

    async fn find_user(&self, id: i64) -> StoreResult<Option<User>> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn find_user_by_login(&self, identifier: &str) -> StoreResult<Option<User>> {
        let tables = self.tables.read().await;
        let by_username = tables.users.values().find(|u| u.username == identifier);
        let found = by_username.or_else(|| tables.users.values().find(|u| u.email == identifier));

        Ok(found.cloned())
    }

    async fn list_users(&self) -> StoreResult<Vec<User>> {
        let tables = self.tables.read().await;
        let mut users: Vec<User> = tables.users.values().cloned().collect();
        users.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        Ok(users)
    }

    async fn update_user(&self, id: i64, data: UpdateUser) -> StoreResult<Option<User>> {
        let mut tables = self.tables.write().await;
        if !tables.users.contains_key(&id) {
            return Ok(None);
        }
        tables.check_unique(&data.username, &data.email, Some(id))?;

        let Some(user) = tables.users.get_mut(&id) else {
            return Ok(None);
        };
        user.username = data.username;
        user.email = data.email;
        user.role = data.role;
        if let Some(hash) = data.password_hash {
            user.password_hash = hash;
        }
        user.updated_at = Utc::now();

        Ok(Some(user.clone()))
    }

    async fn delete_user(&self, id: i64) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;

        if tables.tasks.values().any(|t| t.assigned_to == id) {
            return Err(StoreError::ForeignKey { constraint: "tasks_assigned_to_fkey".to_string() });
        }
        if tables.tasks.values().any(|t| t.assigned_by == id) {
            return Err(StoreError::ForeignKey { constraint: "tasks_assigned_by_fkey".to_string() });
        }
        if tables.comments.values().any(|c| c.user_id == id) {
            return Err(StoreError::ForeignKey { constraint: "task_comments_user_id_fkey".to_string() });
        }

        Ok(tables.users.remove(&id).is_some())
    }
}

#[async_trait]
impl TaskStore for MemoryStore {
    async fn insert_task(&self, data: CreateTask) -> StoreResult<Task> {
        let mut tables = self.tables.write().await;

        if !tables.users.contains_key(&data.assigned_to) {
            return Err(StoreError::ForeignKey { constraint: "tasks_assigned_to_fkey".to_string() });
        }
        if !tables.users.contains_key(&data.assigned_by) {
            return Err(StoreError::ForeignKey { constraint: "tasks_assigned_by_fkey".to_string() });
        }

        let now = Utc::now();
        let task = Task {
            id: next_id(&mut tables.next_task_id),
            title: data.title,
            description: data.description,
            assigned_to: data.assigned_to,
            assigned_by: data.assigned_by,
            deadline: data.deadline,
            status: TaskStatus::Pending,
            reminder_sent: false,
            created_at: now,
            updated_at: now,
        };
        tables.tasks.insert(task.id, task.clone());

        Ok(task)
    }

    async fn find_task(&self, id: i64) -> StoreResult<Option<TaskView>> {
        let tables = self.tables.read().await;
        Ok(tables.tasks.get(&id).map(|t| tables.view(t)))
    }

    async fn list_tasks(&self, assignee: Option<i64>) -> StoreResult<Vec<TaskView>> {
        let tables = self.tables.read().await;
        let mut views: Vec<TaskView> = tables
            .tasks
            .values()
            .filter(|t| assignee.map_or(true, |user_id| t.assigned_to == user_id))
            .map(|t| tables.view(t))
            .collect();
        views.sort_by(|a, b| {
            b.task
                .created_at
                .cmp(&a.task.created_at)
                .then(b.task.id.cmp(&a.task.id))
        });

        Ok(views)
    }

    async fn set_description(&self, id: i64, description: &str) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        match tables.tasks.get_mut(&id) {
            Some(task) => {
                task.description = description.to_string();
                task.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn set_status(&self, id: i64, status: TaskStatus) -> StoreResult<Option<TaskStatus>> {
        let mut tables = self.tables.write().await;
        let Some(task) = tables.tasks.get_mut(&id) else {
            return Ok(None);
        };

        let previous = task.status;
        if previous != status {
            task.status = status;
            task.updated_at = Utc::now();
        }

        Ok(Some(previous))
    }

    async fn delete_task(&self, id: i64) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        let removed = tables.tasks.remove(&id).is_some();
        if removed {
            tables.comments.retain(|_, c| c.task_id != id);
        }

        Ok(removed)
    }

    async fn task_stats(&self, scope: StatsScope) -> StoreResult<TaskStats> {
        let tables = self.tables.read().await;
        let mut stats = TaskStats::default();

        let in_scope = tables.tasks.values().filter(|t| match scope {
            StatsScope::Global => true,
            StatsScope::Assignee(user_id) => t.assigned_to == user_id,
        });
        for task in in_scope {
            stats.total += 1;
            match task.status {
                TaskStatus::Pending => stats.pending += 1,
                TaskStatus::InProgress => stats.in_progress += 1,
                TaskStatus::Completed => stats.completed += 1,
            }
        }

        Ok(stats)
    }

    async fn list_due(&self, from: DateTime<Utc>, until: DateTime<Utc>) -> StoreResult<Vec<DueTask>> {
        let tables = self.tables.read().await;
        let mut due: Vec<DueTask> = tables
            .tasks
            .values()
            .filter(|t| t.status != TaskStatus::Completed && !t.reminder_sent)
            .filter(|t| t.deadline.map_or(false, |d| d >= from && d <= until))
            .filter_map(|t| {
                let email = tables.users.get(&t.assigned_to)?.email.clone();
                Some(DueTask { view: tables.view(t), assigned_to_email: email })
            })
            .collect();
        due.sort_by(|a, b| {
            a.view
                .task
                .deadline
                .cmp(&b.view.task.deadline)
                .then(a.view.task.id.cmp(&b.view.task.id))
        });

        Ok(due)
    }

    async fn mark_reminder_sent(&self, id: i64) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        match tables.tasks.get_mut(&id) {
            Some(task) if !task.reminder_sent => {
                task.reminder_sent = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[async_trait]
impl CommentStore for MemoryStore {
    async fn insert_comment(&self, data: CreateComment) -> StoreResult<Comment> {
        let mut tables = self.tables.write().await;

        if !tables.tasks.contains_key(&data.task_id) {
            return Err(StoreError::ForeignKey { constraint: "task_comments_task_id_fkey".to_string() });
        }
        if !tables.users.contains_key(&data.user_id) {
            return Err(StoreError::ForeignKey { constraint: "task_comments_user_id_fkey".to_string() });
        }

        let comment = Comment {
            id: next_id(&mut tables.next_comment_id),
            task_id: data.task_id,
            user_id: data.user_id,
            comment: data.comment,
            is_admin: data.is_admin,
            created_at: Utc::now(),
        };
        tables.comments.insert(comment.id, comment.clone());

        Ok(comment)
    }

    async fn list_comments(&self, task_id: i64) -> StoreResult<Vec<CommentView>> {
        let tables = self.tables.read().await;
        let mut comments: Vec<CommentView> = tables
            .comments
            .values()
            .filter(|c| c.task_id == task_id)
            .filter_map(|c| {
                let author = tables.users.get(&c.user_id)?;
                Some(CommentView {
                    comment: c.clone(),
                    username: author.username.clone(),
                    role: author.role,
                })
            })
            .collect();
        comments.sort_by(|a, b| {
            a.comment
                .created_at
                .cmp(&b.comment.created_at)
                .then(a.comment.id.cmp(&b.comment.id))
        });

        Ok(comments)
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
