/// Change feed tests over SSE.

mod common;

use std::time::Duration;

use axum::body::{Body, BodyDataStream};
use axum::http::{header, StatusCode};
use common::{json_request, request, TestContext};
use futures::StreamExt;
use serde_json::json;
use taskhub_api::config::Config;

const WAIT: Duration = Duration::from_secs(5);

async fn fast_context() -> TestContext {
    let mut config = Config::default();
    config.feed_interval = Duration::from_millis(20);
    TestContext::with_config(config).await
}

fn events(body: Body) -> BodyDataStream {
    body.into_data_stream()
}

/// Next chunk of the stream as text; `None` once the stream has ended.
async fn next_chunk(stream: &mut BodyDataStream) -> Option<String> {
    let chunk = tokio::time::timeout(WAIT, stream.next())
        .await
        .expect("feed produced nothing in time")?;
    Some(String::from_utf8(chunk.unwrap().to_vec()).unwrap())
}

/// Skips keep-alives until a chunk for `event` arrives.
async fn next_event(stream: &mut BodyDataStream, event: &str) -> String {
    let marker = format!("event: {}", event);
    loop {
        let chunk = next_chunk(stream).await.expect("feed ended early");
        if chunk.contains(&marker) {
            return chunk;
        }
        assert!(chunk.contains("event: keepalive"), "unexpected chunk: {}", chunk);
    }
}

#[tokio::test]
async fn test_task_feed_requires_session() {
    let ctx = TestContext::new().await;

    let response = ctx.send(request("GET", "/api/user/tasks/stream", None)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_task_feed_sends_snapshot_first() {
    let ctx = TestContext::new().await;
    ctx.create_task("Write release notes", ctx.alice.id).await;
    ctx.create_task("Someone else's", ctx.bob.id).await;
    let alice = ctx.login("alice").await;

    let response = ctx.send(request("GET", "/api/user/tasks/stream", Some(&alice))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response
        .headers()
        .get(header::CONTENT_TYPE)
        .unwrap()
        .to_str()
        .unwrap()
        .starts_with("text/event-stream"));

    let mut stream = events(response.into_body());
    let first = next_chunk(&mut stream).await.unwrap();
    assert!(first.contains("event: tasks"), "{}", first);
    assert!(first.contains("id: "));
    assert!(first.contains("Write release notes"));
    assert!(!first.contains("Someone else's"));
}

#[tokio::test]
async fn test_task_feed_pushes_only_on_change() {
    let ctx = fast_context().await;
    let task_id = ctx.create_task("Migrate database", ctx.alice.id).await;
    let alice = ctx.login("alice").await;

    let response = ctx.send(request("GET", "/api/user/tasks/stream", Some(&alice))).await;
    let mut stream = events(response.into_body());

    let first = next_chunk(&mut stream).await.unwrap();
    assert!(first.contains("\"status\":\"Pending\""), "{}", first);

    // Nothing changed: keep-alive only
    let second = next_chunk(&mut stream).await.unwrap();
    assert!(second.contains("event: keepalive"), "{}", second);
    assert!(second.contains(r#"{"alive":true}"#));

    ctx.state.tasks.update_status(task_id, "Completed").await.unwrap();

    let update = next_event(&mut stream, "tasks").await;
    assert!(update.contains("\"status\":\"Completed\""), "{}", update);
}

#[tokio::test]
async fn test_comment_feed_follows_thread() {
    let ctx = fast_context().await;
    let task_id = ctx.create_task("Pick a venue", ctx.alice.id).await;
    let alice = ctx.login("alice").await;

    let uri = format!("/api/user/task_comments/stream?task_id={}", task_id);
    let response = ctx.send(request("GET", &uri, Some(&alice))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let mut stream = events(response.into_body());

    let first = next_chunk(&mut stream).await.unwrap();
    assert!(first.contains("event: comments"), "{}", first);
    assert!(first.contains(r#"{"comments":[]}"#), "{}", first);

    ctx.state
        .comments
        .add(task_id, ctx.admin.id, "The hall on 5th is free", true)
        .await
        .unwrap();

    let update = next_event(&mut stream, "comments").await;
    assert!(update.contains("The hall on 5th is free"), "{}", update);
}

#[tokio::test]
async fn test_comment_feed_access() {
    let ctx = TestContext::new().await;
    let bobs = ctx.create_task("Bob's", ctx.bob.id).await;
    let alice = ctx.login("alice").await;
    let admin = ctx.login("admin").await;

    let uri = format!("/api/user/task_comments/stream?task_id={}", bobs);
    let response = ctx.send(request("GET", &uri, Some(&alice))).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = ctx.send(request("GET", &uri, Some(&admin))).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = ctx
        .send(request("GET", "/api/user/task_comments/stream?task_id=9999", Some(&admin)))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_feed_ends_with_session() {
    let ctx = fast_context().await;
    ctx.create_task("Tidy up", ctx.alice.id).await;
    let alice = ctx.login("alice").await;

    let response = ctx.send(request("GET", "/api/user/tasks/stream", Some(&alice))).await;
    let mut stream = events(response.into_body());
    next_event(&mut stream, "tasks").await;

    let response = ctx.send(json_request("POST", "/api/auth/logout", Some(&alice), json!({}))).await;
    assert_eq!(response.status(), StatusCode::OK);

    while let Some(chunk) = next_chunk(&mut stream).await {
        assert!(chunk.contains("event: keepalive"), "{}", chunk);
    }
}

#[tokio::test]
async fn test_feed_ends_on_shutdown() {
    let ctx = fast_context().await;
    let alice = ctx.login("alice").await;

    let response = ctx.send(request("GET", "/api/user/tasks/stream", Some(&alice))).await;
    let mut stream = events(response.into_body());
    next_event(&mut stream, "tasks").await;

    ctx.state.shutdown.cancel();

    while let Some(chunk) = next_chunk(&mut stream).await {
        assert!(chunk.contains("event: keepalive"), "{}", chunk);
    }
}

#[tokio::test]
async fn test_comment_feed_ends_when_task_deleted() {
    let ctx = fast_context().await;
    let task_id = ctx.create_task("Cancelled launch", ctx.alice.id).await;
    let alice = ctx.login("alice").await;

    let uri = format!("/api/user/task_comments/stream?task_id={}", task_id);
    let response = ctx.send(request("GET", &uri, Some(&alice))).await;
    let mut stream = events(response.into_body());
    next_event(&mut stream, "comments").await;

    ctx.state.tasks.delete(task_id).await.unwrap();

    while let Some(chunk) = next_chunk(&mut stream).await {
        assert!(chunk.contains("event: keepalive"), "{}", chunk);
    }
}
