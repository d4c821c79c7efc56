/// Change feed
///
/// A feed keeps one subscriber up to date without client polling. On every
/// tick the poller takes a fresh snapshot from its [`SnapshotSource`],
/// fingerprints it and sends either the whole snapshot (fingerprint changed,
/// or first tick) or a keep-alive.
///
/// # Lifecycle
///
/// ```text
/// subscribe ──> tick ──> snapshot ──> changed? ──yes──> Snapshot frame
///                ^                       │
///                │                       no──> KeepAlive frame
///                └──── sleep(interval) <─┘
/// ```
///
/// The poller stops when the receiver is dropped, when its cancellation
/// token fires, when the watched session is gone or when the watched
/// resource no longer exists. It never holds a lock while sleeping.
///
/// # Example
///
/// ```no_run
/// use std::time::Duration;
/// use taskhub_shared::feed::{FeedFrame, FeedPoller, TaskFeed};
/// # use taskhub_shared::repository::TaskRepository;
///
/// # async fn example(tasks: TaskRepository) {
/// let poller = FeedPoller::new(TaskFeed::new(tasks, 7), Duration::from_secs(10));
/// let (mut frames, _handle) = poller.spawn();
///
/// while let Some(frame) = frames.recv().await {
///     match frame {
///         FeedFrame::Snapshot { fingerprint, items } => println!("{} tasks ({})", items.len(), fingerprint),
///         FeedFrame::KeepAlive => {}
///     }
/// }
/// # }
/// ```

mod sources;

use std::time::Duration;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::auth::session::SessionStore;
use crate::error::{CoreError, CoreResult};

pub use sources::{CommentFeed, TaskFeed};

/// Default time between ticks
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(10);

/// Frames buffered between poller and subscriber
const CHANNEL_CAPACITY: usize = 4;

/// Content that identifies a snapshot item for change detection
///
/// Implementors feed only the fields whose change should reach the client,
/// never display-only fields.
pub trait Fingerprint {
    fn write_fingerprint(&self, hasher: &mut Sha256);
}

/// Writes a length-prefixed field so adjacent fields cannot run together.
pub fn write_field(hasher: &mut Sha256, bytes: &[u8]) {
    hasher.update((bytes.len() as u64).to_le_bytes());
    hasher.update(bytes);
}

/// Hex SHA-256 over the items, in order.
pub fn fingerprint<T: Fingerprint>(items: &[T]) -> String {
    let mut hasher = Sha256::new();
    hasher.update((items.len() as u64).to_le_bytes());
    for item in items {
        item.write_fingerprint(&mut hasher);
    }
    hex::encode(hasher.finalize())
}

/// One message to a subscriber
#[derive(Debug, Clone, PartialEq)]
pub enum FeedFrame<T> {
    Snapshot { fingerprint: String, items: Vec<T> },
    KeepAlive,
}

/// Remembers the last fingerprint sent
#[derive(Debug, Default)]
pub struct ChangeDetector {
    last: Option<String>,
}

impl ChangeDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Turns a snapshot into the frame to send.
    pub fn observe<T: Fingerprint>(&mut self, items: Vec<T>) -> FeedFrame<T> {
        let current = fingerprint(&items);
        if self.last.as_deref() == Some(current.as_str()) {
            return FeedFrame::KeepAlive;
        }
        self.last = Some(current.clone());
        FeedFrame::Snapshot { fingerprint: current, items }
    }
}

/// Produces the current snapshot of a feed
#[async_trait]
pub trait SnapshotSource: Send + Sync + 'static {
    type Item: Fingerprint + Send + 'static;

    /// Name for logs
    fn name(&self) -> &'static str;

    async fn snapshot(&self) -> CoreResult<Vec<Self::Item>>;
}

/// Why a poller stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedExit {
    /// The subscriber went away
    ClientGone,
    /// The session the feed was opened with no longer exists
    SessionEnded,
    /// Shut down from outside
    Cancelled,
    /// The resource behind the feed was deleted
    SourceGone,
}

#[derive(Debug, Clone)]
struct SessionWatch {
    sessions: SessionStore,
    handle: u64,
}

/// Per-subscriber polling task
pub struct FeedPoller<S> {
    source: S,
    interval: Duration,
    cancel: CancellationToken,
    session: Option<SessionWatch>,
}

impl<S: SnapshotSource> FeedPoller<S> {
    pub fn new(source: S, interval: Duration) -> Self {
        Self {
            source,
            interval,
            cancel: CancellationToken::new(),
            session: None,
        }
    }

    /// Ends the feed once the session with this handle is gone.
    pub fn watch_session(mut self, sessions: SessionStore, handle: u64) -> Self {
        self.session = Some(SessionWatch { sessions, handle });
        self
    }

    /// Uses an external token, e.g. a child of the server's shutdown token.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Starts the poller on its own task.
    pub fn spawn(self) -> (mpsc::Receiver<FeedFrame<S::Item>>, JoinHandle<FeedExit>) {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let handle = tokio::spawn(self.run(tx));
        (rx, handle)
    }

    /// Polls until the subscriber leaves, the session ends, the source is
    /// deleted or the token fires. The first tick always sends a snapshot.
    /// Other snapshot errors are treated as transient and answered with a
    /// keep-alive.
    pub async fn run(self, tx: mpsc::Sender<FeedFrame<S::Item>>) -> FeedExit {
        let mut detector = ChangeDetector::new();
        let feed = self.source.name();
        tracing::debug!(feed, interval_secs = self.interval.as_secs(), "Feed started");

        let exit = loop {
            if self.cancel.is_cancelled() {
                break FeedExit::Cancelled;
            }

            if let Some(watch) = &self.session {
                if !watch.sessions.is_live(watch.handle).await {
                    break FeedExit::SessionEnded;
                }
            }

            let frame = match self.source.snapshot().await {
                Ok(items) => detector.observe(items),
                Err(CoreError::NotFound(what)) => {
                    tracing::debug!(feed, resource = what, "Feed source is gone");
                    break FeedExit::SourceGone;
                }
                Err(e) => {
                    tracing::warn!(feed, error = %e, "Feed snapshot failed; sending keep-alive");
                    FeedFrame::KeepAlive
                }
            };

            if tx.send(frame).await.is_err() {
                break FeedExit::ClientGone;
            }

            tokio::select! {
                _ = self.cancel.cancelled() => break FeedExit::Cancelled,
                _ = tx.closed() => break FeedExit::ClientGone,
                _ = tokio::time::sleep(self.interval) => {}
            }
        };

        tracing::debug!(feed, exit = ?exit, "Feed stopped");
        exit
    }
}
