/// Change feeds (SSE)
///
/// - `GET /api/user/tasks/stream`: the caller's tasks
/// - `GET /api/user/task_comments/stream?task_id=`: one task's comments
///
/// Access is decided once, when the stream opens. Each subscriber gets its
/// own poller; the poller stops when the client disconnects, the session
/// ends or the server shuts down.
///
/// # SSE Event Format
///
/// ```text
/// event: tasks
/// id: 9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08
/// data: {"tasks":[{"id":1,"title":"Ship it","status":"In Progress",...}]}
///
/// event: keepalive
/// data: {"alive":true}
/// ```
///
/// A snapshot is sent on the first poll and whenever its fingerprint (the
/// event id) changes; every other poll sends a keep-alive.

use std::convert::Infallible;

use axum::{
    extract::{Query, State},
    response::sse::{Event, Sse},
    Extension,
};
use futures::stream::Stream;
use serde::Serialize;
use taskhub_shared::auth::guard::{require, Action, Resource};
use taskhub_shared::auth::session::Session;
use taskhub_shared::feed::{CommentFeed, FeedFrame, FeedPoller, SnapshotSource, TaskFeed};
use tokio_stream::{wrappers::ReceiverStream, StreamExt as _};

use crate::app::AppState;
use crate::error::ApiResult;
use crate::middleware::session::CurrentSession;
use crate::routes::comments::TaskQuery;
use crate::routes::tasks::authorize_task;

pub const KEEPALIVE_EVENT: &str = "keepalive";

fn keepalive_event() -> Event {
    Event::default().event(KEEPALIVE_EVENT).data(r#"{"alive":true}"#)
}

/// Turns a poller frame into an SSE event named after the feed.
pub fn frame_event<T: Serialize>(feed: &'static str, frame: FeedFrame<T>) -> Event {
    match frame {
        FeedFrame::Snapshot { fingerprint, items } => match serde_json::to_value(&items) {
            Ok(items) => {
                let mut body = serde_json::Map::new();
                body.insert(feed.to_string(), items);
                Event::default()
                    .event(feed)
                    .id(fingerprint)
                    .data(serde_json::Value::Object(body).to_string())
            }
            Err(e) => {
                tracing::error!(feed, error = %e, "Could not encode feed snapshot");
                keepalive_event()
            }
        },
        FeedFrame::KeepAlive => keepalive_event(),
    }
}

fn open_feed<S>(state: &AppState, session: &Session, source: S) -> Sse<impl Stream<Item = Result<Event, Infallible>>>
where
    S: SnapshotSource,
    S::Item: Serialize,
{
    let feed = source.name();
    tracing::info!(user_id = session.user_id, feed, "Feed subscribed");

    let (frames, _poller) = FeedPoller::new(source, state.config.feed_interval)
        .watch_session(state.sessions.clone(), session.handle)
        .with_cancellation(state.shutdown.child_token())
        .spawn();

    Sse::new(ReceiverStream::new(frames).map(move |frame| Ok(frame_event(feed, frame))))
}

pub async fn stream_own_tasks(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentSession>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let session = require(current.get(), Action::SubscribeOwnTasks, Resource::None)?;

    let source = TaskFeed::new(state.tasks.clone(), session.user_id);
    Ok(open_feed(&state, session, source))
}

/// # Errors
///
/// - `401`: no session
/// - `403`: a user subscribing to a task that is not theirs
/// - `404`: an admin subscribing to a task that does not exist
pub async fn stream_task_comments(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentSession>,
    Query(query): Query<TaskQuery>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let (session, _task) =
        authorize_task(&state, current.get(), Action::SubscribeComments, query.task_id).await?;

    let source = CommentFeed::new(state.comments.clone(), query.task_id);
    Ok(open_feed(&state, session, source))
}
