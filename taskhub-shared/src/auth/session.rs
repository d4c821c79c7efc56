/// Server-side session store
///
/// Sessions live in a `tokio::sync::RwLock<HashMap>` keyed by the session id
/// that the client holds in its cookie.
///
/// # Lifecycle
///
/// - **Create**: on login, with a fresh id and a CSRF token that stays the
///   same for the life of the session
/// - **Touch**: on every request; a session idle longer than the idle
///   timeout is removed and reported as expired
/// - **Rotate**: when the id is older than the rotation interval, touch moves
///   the session to a new id. The old id keeps resolving to the session for
///   a short grace period so that requests already in flight still succeed
/// - **Destroy**: on logout, or for all of a user's sessions when an
///   administrator edits or deletes the account
///
/// Every session also carries a `handle` that survives rotation, so a
/// long-running subscriber can ask whether "its" session is still alive.
///
/// # Example
///
/// ```
/// use taskhub_shared::auth::session::{SessionConfig, SessionStore};
/// # use taskhub_shared::models::user::User;
///
/// # async fn example(user: User) -> Result<(), Box<dyn std::error::Error>> {
/// let sessions = SessionStore::new(SessionConfig::default());
/// let session = sessions.create(&user).await;
///
/// let touched = sessions.touch(&session.id).await?;
/// assert_eq!(touched.session.user_id, user.id);
/// # Ok(())
/// # }
/// ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;

use super::token::{constant_time_compare, generate_token, is_well_formed, log_prefix};
use crate::models::user::{Role, User};

/// Idle time after which a session is invalid (30 minutes)
pub const DEFAULT_IDLE_TIMEOUT_SECS: i64 = 1800;

/// Age after which a session id is replaced (5 minutes)
pub const DEFAULT_ROTATION_SECS: i64 = 300;

/// How long a replaced id still resolves to its session
pub const ROTATION_GRACE_SECS: i64 = 30;

#[derive(Debug, Clone, Copy)]
pub struct SessionConfig {
    pub idle_timeout: Duration,
    pub rotation_interval: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::seconds(DEFAULT_IDLE_TIMEOUT_SECS),
            rotation_interval: Duration::seconds(DEFAULT_ROTATION_SECS),
        }
    }
}

/// An authenticated user's server-side state
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    /// Current id, as held in the client's cookie
    pub id: String,
    /// Stable across rotations
    pub handle: u64,
    pub user_id: i64,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub csrf_token: String,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub last_regeneration: DateTime<Utc>,
}

impl Session {
    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }

    /// Compares a client-supplied CSRF token in constant time.
    pub fn verify_csrf(&self, candidate: &str) -> bool {
        constant_time_compare(&self.csrf_token, candidate)
    }

    fn is_idle(&self, now: DateTime<Utc>, config: &SessionConfig) -> bool {
        now - self.last_activity > config.idle_timeout
    }
}

/// Error type for session lookups
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// No session under this id
    #[error("Unknown session")]
    Unknown,

    /// The session existed but was idle too long and has been removed
    #[error("Session expired")]
    Expired,
}

/// Result of touching a session
#[derive(Debug, Clone)]
pub struct Touched {
    pub session: Session,
    /// True when the client's id is not the current one and it needs a new
    /// cookie, either because touch rotated it or because the client sent a
    /// replaced id
    pub rotated: bool,
}

/// A replaced id and where it now points
#[derive(Debug, Clone)]
struct Retired {
    current: String,
    until: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Sessions {
    live: HashMap<String, Session>,
    retired: HashMap<String, Retired>,
}

impl Sessions {
    /// Current id for `id`, following a rotation still inside its grace period
    fn resolve(&self, id: &str, now: DateTime<Utc>) -> Option<String> {
        if self.live.contains_key(id) {
            return Some(id.to_string());
        }
        self.retired
            .get(id)
            .filter(|r| now <= r.until && self.live.contains_key(&r.current))
            .map(|r| r.current.clone())
    }

    fn prune_retired(&mut self, now: DateTime<Utc>) {
        let live = &self.live;
        self.retired
            .retain(|_, r| now <= r.until && live.contains_key(&r.current));
    }
}

/// Shared session store
///
/// Cloning is cheap; clones share the same sessions.
#[derive(Debug, Clone)]
pub struct SessionStore {
    sessions: Arc<RwLock<Sessions>>,
    next_handle: Arc<AtomicU64>,
    config: SessionConfig,
}

impl SessionStore {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(Sessions::default())),
            next_handle: Arc::new(AtomicU64::new(1)),
            config,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Creates a session for a freshly authenticated user.
    pub async fn create(&self, user: &User) -> Session {
        self.create_at(user, Utc::now()).await
    }

    pub async fn create_at(&self, user: &User, now: DateTime<Utc>) -> Session {
        let session = Session {
            id: generate_token(),
            handle: self.next_handle.fetch_add(1, Ordering::Relaxed),
            user_id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            role: user.role,
            csrf_token: generate_token(),
            created_at: now,
            last_activity: now,
            last_regeneration: now,
        };

        self.sessions
            .write()
            .await
            .live
            .insert(session.id.clone(), session.clone());

        tracing::debug!(
            user_id = user.id,
            session = log_prefix(&session.id),
            "Session created"
        );

        session
    }

    /// Records activity on a session, expiring or rotating it as needed.
    ///
    /// # Errors
    ///
    /// - `SessionError::Unknown` if no such session exists, or `id` was
    ///   replaced longer ago than the grace period
    /// - `SessionError::Expired` if it was idle too long (it is removed)
    ///
    /// A request with a recently replaced id is served by the current
    /// session and reported as `rotated`, so the client receives the
    /// current id again.
    pub async fn touch(&self, id: &str) -> Result<Touched, SessionError> {
        self.touch_at(id, Utc::now()).await
    }

    pub async fn touch_at(&self, id: &str, now: DateTime<Utc>) -> Result<Touched, SessionError> {
        if !is_well_formed(id) {
            return Err(SessionError::Unknown);
        }

        let mut sessions = self.sessions.write().await;
        let current = sessions.resolve(id, now).ok_or(SessionError::Unknown)?;
        let stale = current != id;
        let mut session = sessions.live.remove(&current).ok_or(SessionError::Unknown)?;

        if session.is_idle(now, &self.config) {
            tracing::debug!(
                user_id = session.user_id,
                session = log_prefix(id),
                "Session expired after idle timeout"
            );
            sessions.prune_retired(now);
            return Err(SessionError::Expired);
        }

        session.last_activity = now;

        let due = !stale && now - session.last_regeneration >= self.config.rotation_interval;
        if due {
            let previous = std::mem::replace(&mut session.id, generate_token());
            session.last_regeneration = now;

            let until = now + Duration::seconds(ROTATION_GRACE_SECS);
            for retired in sessions.retired.values_mut() {
                if retired.current == previous {
                    retired.current = session.id.clone();
                }
            }
            sessions.retired.insert(
                previous,
                Retired {
                    current: session.id.clone(),
                    until,
                },
            );
            tracing::debug!(
                user_id = session.user_id,
                session = log_prefix(&session.id),
                "Session id rotated"
            );
        }

        sessions.live.insert(session.id.clone(), session.clone());
        sessions.prune_retired(now);

        Ok(Touched {
            session,
            rotated: due || stale,
        })
    }

    /// Removes a session, by its current id or one still in its grace
    /// period. Returns false if it did not exist.
    pub async fn destroy(&self, id: &str) -> bool {
        let now = Utc::now();
        let mut sessions = self.sessions.write().await;
        let removed = match sessions.resolve(id, now) {
            Some(current) => sessions.live.remove(&current).is_some(),
            None => false,
        };
        sessions.prune_retired(now);
        removed
    }

    /// Removes every session belonging to a user.
    pub async fn destroy_for_user(&self, user_id: i64) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.live.len();
        sessions.live.retain(|_, s| s.user_id != user_id);
        let removed = before - sessions.live.len();
        sessions.prune_retired(Utc::now());
        removed
    }

    /// Whether the session with this handle still exists and is not idle.
    ///
    /// Does not count as activity.
    pub async fn is_live(&self, handle: u64) -> bool {
        self.is_live_at(handle, Utc::now()).await
    }

    pub async fn is_live_at(&self, handle: u64, now: DateTime<Utc>) -> bool {
        self.sessions
            .read()
            .await
            .live
            .values()
            .any(|s| s.handle == handle && !s.is_idle(now, &self.config))
    }

    /// Removes all idle sessions. Returns how many were removed.
    pub async fn sweep_expired(&self) -> usize {
        self.sweep_expired_at(Utc::now()).await
    }

    pub async fn sweep_expired_at(&self, now: DateTime<Utc>) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.live.len();
        let config = self.config;
        sessions.live.retain(|_, s| !s.is_idle(now, &config));
        let removed = before - sessions.live.len();
        sessions.prune_retired(now);
        removed
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.live.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
