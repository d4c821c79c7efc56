/// Authentication and authorization
///
/// # Modules
///
/// - [`password`]: Argon2id password hashing and strength rules
/// - [`token`]: random session and CSRF tokens, constant-time comparison
/// - [`session`]: the server-side session store with idle expiry and id rotation
/// - [`guard`]: the role and ownership rules every request is checked against
///
/// # Example
///
/// ```no_run
/// use taskhub_shared::auth::guard::{require, Action, Resource};
/// use taskhub_shared::auth::session::{SessionConfig, SessionStore};
///
/// # async fn example(session_id: &str) -> Result<(), Box<dyn std::error::Error>> {
/// let sessions = SessionStore::new(SessionConfig::default());
///
/// let touched = sessions.touch(session_id).await?;
/// let session = require(Some(&touched.session), Action::ListOwnTasks, Resource::None)?;
/// println!("{} is listing their tasks", session.username);
/// # Ok(())
/// # }
/// ```

pub mod guard;
pub mod password;
pub mod session;
pub mod token;
