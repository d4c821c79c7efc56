/// Assignee workflows: own tasks, status changes and comments.

mod common;

use axum::http::StatusCode;
use common::{body_json, json_request, request, TestContext};
use serde_json::json;
use taskhub_shared::notify::Template;

#[tokio::test]
async fn test_user_sees_only_own_tasks() {
    let ctx = TestContext::new().await;
    let mine = ctx.create_task("Mine", ctx.alice.id).await;
    ctx.create_task("Not mine", ctx.bob.id).await;

    let alice = ctx.login("alice").await;
    let response = ctx.send(request("GET", "/api/user/tasks", Some(&alice))).await;
    assert_eq!(response.status(), StatusCode::OK);

    let tasks = body_json(response).await["tasks"].as_array().unwrap().clone();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0]["id"], mine);
    assert_eq!(tasks[0]["title"], "Mine");
}

#[tokio::test]
async fn test_status_change_notifies_assigner() {
    let ctx = TestContext::new().await;
    let task_id = ctx.create_task("Deploy", ctx.alice.id).await;
    ctx.mailer.clear().await;

    let alice = ctx.login("alice").await;
    let response = ctx
        .send(json_request(
            "PUT",
            "/api/user/tasks",
            Some(&alice),
            json!({ "id": task_id, "status": "In Progress" }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        json!({ "success": true, "status": "In Progress", "changed": true })
    );

    let sent = ctx.mailer.sent_to("admin@example.com").await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].template, Template::TaskStatusChanged);
    assert!(sent[0].body.contains("Pending"));

    // Same status again: accepted, nothing sent
    let response = ctx
        .send(json_request(
            "PUT",
            "/api/user/tasks",
            Some(&alice),
            json!({ "id": task_id, "status": "In Progress" }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["changed"], false);
    assert_eq!(ctx.mailer.sent().await.len(), 1);
}

#[tokio::test]
async fn test_status_change_survives_mail_failure() {
    let ctx = TestContext::new().await;
    let task_id = ctx.create_task("Deploy", ctx.alice.id).await;
    ctx.mailer.set_failing(true);

    let alice = ctx.login("alice").await;
    let response = ctx
        .send(json_request(
            "PUT",
            "/api/user/tasks",
            Some(&alice),
            json!({ "id": task_id, "status": "Completed" }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let task = ctx.state.tasks.get(task_id).await.unwrap();
    assert_eq!(task.task.status.as_str(), "Completed");
}

#[tokio::test]
async fn test_invalid_status_is_rejected() {
    let ctx = TestContext::new().await;
    let task_id = ctx.create_task("Deploy", ctx.alice.id).await;

    let alice = ctx.login("alice").await;
    let response = ctx
        .send(json_request(
            "PUT",
            "/api/user/tasks",
            Some(&alice),
            json!({ "id": task_id, "status": "Done-ish" }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let body = body_json(response).await;
    assert_eq!(body["details"][0]["field"], "status");
}

#[tokio::test]
async fn test_foreign_and_missing_tasks_are_forbidden() {
    let ctx = TestContext::new().await;
    let bobs = ctx.create_task("Bob's", ctx.bob.id).await;
    let alice = ctx.login("alice").await;

    for id in [bobs, 9999] {
        let response = ctx
            .send(json_request(
                "PUT",
                "/api/user/tasks",
                Some(&alice),
                json!({ "id": id, "status": "Completed" }),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN, "task {}", id);

        let uri = format!("/api/user/task_comments?task_id={}", id);
        let response = ctx.send(request("GET", &uri, Some(&alice))).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN, "task {}", id);
    }

    let task = ctx.state.tasks.get(bobs).await.unwrap();
    assert_eq!(task.task.status.as_str(), "Pending");
}

#[tokio::test]
async fn test_comment_thread_in_order() {
    let ctx = TestContext::new().await;
    let task_id = ctx.create_task("Design review", ctx.alice.id).await;
    let alice = ctx.login("alice").await;
    let admin = ctx.login("admin").await;

    for (client, text, uri) in [
        (&alice, "First draft is up", "/api/user/task_comments"),
        (&admin, "Looks good, one nit", "/api/admin/task_comments"),
        (&alice, "Fixed", "/api/user/task_comments"),
    ] {
        let response = ctx
            .send(json_request(
                "POST",
                uri,
                Some(client),
                json!({ "task_id": task_id, "comment": text }),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::OK, "{}", text);
        assert!(body_json(response).await["comment_id"].as_i64().is_some());
    }

    let uri = format!("/api/user/task_comments?task_id={}", task_id);
    let response = ctx.send(request("GET", &uri, Some(&alice))).await;
    assert_eq!(response.status(), StatusCode::OK);

    let comments = body_json(response).await["comments"].as_array().unwrap().clone();
    let texts: Vec<&str> = comments.iter().map(|c| c["comment"].as_str().unwrap()).collect();
    assert_eq!(texts, ["First draft is up", "Looks good, one nit", "Fixed"]);

    let flags: Vec<bool> = comments.iter().map(|c| c["is_admin"].as_bool().unwrap()).collect();
    assert_eq!(flags, [false, true, false]);
}

#[tokio::test]
async fn test_user_comment_rules() {
    let ctx = TestContext::new().await;
    let mine = ctx.create_task("Mine", ctx.alice.id).await;
    let bobs = ctx.create_task("Bob's", ctx.bob.id).await;
    let alice = ctx.login("alice").await;

    let response = ctx
        .send(json_request(
            "POST",
            "/api/user/task_comments",
            Some(&alice),
            json!({ "task_id": bobs, "comment": "Sneaky" }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = ctx
        .send(json_request(
            "POST",
            "/api/user/task_comments",
            Some(&alice),
            json!({ "task_id": mine, "comment": "" }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    // The admin endpoints stay closed even for the user's own task
    let response = ctx
        .send(json_request(
            "POST",
            "/api/admin/task_comments",
            Some(&alice),
            json!({ "task_id": mine, "comment": "Via the back door" }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    assert!(ctx.state.comments.list_for_task(mine).await.unwrap().is_empty());
    assert!(ctx.state.comments.list_for_task(bobs).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_admin_sees_not_found_where_user_sees_forbidden() {
    let ctx = TestContext::new().await;
    let admin = ctx.login("admin").await;

    let response = ctx
        .send(request("GET", "/api/user/task_comments?task_id=9999", Some(&admin)))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
