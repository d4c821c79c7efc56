/// Repositories
///
/// The business rules of TaskHub. Each repository wraps a shared
/// [`Store`](crate::store::Store) and, where writes have consequences, a
/// [`Notifier`](crate::notify::Notifier). Repositories do not know who is
/// calling; access decisions are made by the guard before a repository is
/// reached.

pub mod comments;
pub mod tasks;
pub mod users;

pub use comments::CommentRepository;
pub use tasks::{NewTask, StatusChange, TaskRepository};
pub use users::{EditUser, NewUser, UserRepository};
