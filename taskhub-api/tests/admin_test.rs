/// Administrator workflows: accounts, tasks, comments and the dashboard.

mod common;

use axum::http::StatusCode;
use common::{body_json, json_request, request, TestContext, PASSWORD};
use serde_json::json;
use taskhub_shared::error::CoreError;
use taskhub_shared::notify::Template;
use taskhub_shared::store::CommentStore;

#[tokio::test]
async fn test_create_and_list_users() {
    let ctx = TestContext::new().await;
    let admin = ctx.login("admin").await;

    let response = ctx
        .send(json_request(
            "POST",
            "/api/admin/users",
            Some(&admin),
            json!({
                "username": "carol",
                "email": "carol@example.com",
                "password": "long-enough-secret",
                "role": "user"
            }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    let carol_id = body["user_id"].as_i64().unwrap();

    let welcome = ctx.mailer.sent_to("carol@example.com").await;
    assert_eq!(welcome.len(), 1);
    assert_eq!(welcome[0].template, Template::AccountCreated);
    assert!(!welcome[0].body.contains("long-enough-secret"));

    let response = ctx.send(request("GET", "/api/admin/users", Some(&admin))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let users = body_json(response).await["users"].as_array().unwrap().clone();
    assert_eq!(users.len(), 4);
    assert!(users.iter().any(|u| u["id"] == carol_id && u["role"] == "user"));
    assert!(users.iter().all(|u| u.get("password_hash").is_none()));
}

#[tokio::test]
async fn test_create_user_rejects_duplicates_and_bad_input() {
    let ctx = TestContext::new().await;
    let admin = ctx.login("admin").await;

    let response = ctx
        .send(json_request(
            "POST",
            "/api/admin/users",
            Some(&admin),
            json!({
                "username": "alice",
                "email": "someone-else@example.com",
                "password": "long-enough-secret",
                "role": "user"
            }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = ctx
        .send(json_request(
            "POST",
            "/api/admin/users",
            Some(&admin),
            json!({
                "username": "dave",
                "email": "not-an-email",
                "password": "short",
                "role": "user"
            }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let body = body_json(response).await;
    let fields: Vec<&str> = body["details"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["field"].as_str().unwrap())
        .collect();
    assert!(fields.contains(&"email"));
    assert!(fields.contains(&"password"));
}

#[tokio::test]
async fn test_update_user_role_ends_their_sessions() {
    let ctx = TestContext::new().await;
    let admin = ctx.login("admin").await;
    let alice = ctx.login("alice").await;

    let response = ctx
        .send(json_request(
            "PUT",
            "/api/admin/users",
            Some(&admin),
            json!({
                "id": ctx.alice.id,
                "username": "alice",
                "email": "alice@example.com",
                "role": "admin"
            }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = ctx.send(request("GET", "/api/auth/check", Some(&alice))).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // Signing in again picks up the new role; the password was kept
    let alice = ctx.login("alice").await;
    let response = ctx.send(request("GET", "/api/admin/users", Some(&alice))).await;
    assert_eq!(response.status(), StatusCode::OK);

    let notices = ctx.mailer.sent_to("alice@example.com").await;
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].template, Template::CredentialsChanged);
}

#[tokio::test]
async fn test_update_user_password() {
    let ctx = TestContext::new().await;
    let admin = ctx.login("admin").await;

    let response = ctx
        .send(json_request(
            "PUT",
            "/api/admin/users",
            Some(&admin),
            json!({
                "id": ctx.bob.id,
                "username": "bob",
                "email": "bob@example.com",
                "role": "user",
                "password": "a-brand-new-password"
            }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = ctx
        .send(json_request(
            "POST",
            "/api/auth/login",
            None,
            json!({ "username": "bob", "password": PASSWORD }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = ctx
        .send(json_request(
            "POST",
            "/api/auth/login",
            None,
            json!({ "username": "bob", "password": "a-brand-new-password" }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let notices = ctx.mailer.sent_to("bob@example.com").await;
    assert_eq!(notices.len(), 1);
    assert!(!notices[0].body.contains("a-brand-new-password"));
}

#[tokio::test]
async fn test_update_user_mail_failure_is_bad_gateway_after_commit() {
    let ctx = TestContext::new().await;
    let admin = ctx.login("admin").await;
    ctx.mailer.set_failing(true);

    let response = ctx
        .send(json_request(
            "PUT",
            "/api/admin/users",
            Some(&admin),
            json!({
                "id": ctx.bob.id,
                "username": "robert",
                "email": "bob@example.com",
                "role": "user"
            }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(body_json(response).await["error"], "notification_failed");

    let bob = ctx.state.users.get(ctx.bob.id).await.unwrap();
    assert_eq!(bob.username, "robert");
}

#[tokio::test]
async fn test_delete_user_rules() {
    let ctx = TestContext::new().await;
    let admin = ctx.login("admin").await;
    ctx.create_task("Inventory", ctx.alice.id).await;

    // Still assigned a task
    let response = ctx
        .send(json_request("DELETE", "/api/admin/users", Some(&admin), json!({ "id": ctx.alice.id })))
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    // Not themselves
    let response = ctx
        .send(json_request("DELETE", "/api/admin/users", Some(&admin), json!({ "id": ctx.admin.id })))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let bob = ctx.login("bob").await;
    let response = ctx
        .send(json_request("DELETE", "/api/admin/users", Some(&admin), json!({ "id": ctx.bob.id })))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = ctx.send(request("GET", "/api/auth/check", Some(&bob))).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = ctx
        .send(json_request("DELETE", "/api/admin/users", Some(&admin), json!({ "id": ctx.bob.id })))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_task_lifecycle() {
    let ctx = TestContext::new().await;
    let admin = ctx.login("admin").await;

    let response = ctx
        .send(json_request(
            "POST",
            "/api/admin/tasks",
            Some(&admin),
            json!({
                "title": "Quarterly report",
                "description": "Numbers for Q3",
                "assigned_to": ctx.alice.id,
                "deadline": "2030-01-15"
            }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let task_id = body_json(response).await["task_id"].as_i64().unwrap();

    let assigned = ctx.mailer.sent_to("alice@example.com").await;
    assert_eq!(assigned.len(), 1);
    assert_eq!(assigned[0].template, Template::TaskAssigned);

    let response = ctx.send(request("GET", "/api/admin/tasks", Some(&admin))).await;
    let tasks = body_json(response).await["tasks"].as_array().unwrap().clone();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0]["id"], task_id);
    assert_eq!(tasks[0]["status"], "Pending");
    assert_eq!(tasks[0]["assigned_to_name"], "alice");
    assert_eq!(tasks[0]["assigned_by_name"], "admin");

    let response = ctx
        .send(json_request(
            "PUT",
            "/api/admin/tasks",
            Some(&admin),
            json!({ "id": task_id, "description": "Numbers for Q3 and Q4" }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let task = ctx.state.tasks.get(task_id).await.unwrap();
    assert_eq!(task.task.description, "Numbers for Q3 and Q4");

    ctx.state
        .comments
        .add(task_id, ctx.alice.id, "On it", false)
        .await
        .unwrap();

    let response = ctx
        .send(json_request("DELETE", "/api/admin/tasks", Some(&admin), json!({ "id": task_id })))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(matches!(
        ctx.state.comments.list_for_task(task_id).await,
        Err(CoreError::NotFound("Task"))
    ));
    assert!(ctx.state.store.list_comments(task_id).await.unwrap().is_empty());

    let response = ctx
        .send(json_request("DELETE", "/api/admin/tasks", Some(&admin), json!({ "id": task_id })))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_create_task_validation() {
    let ctx = TestContext::new().await;
    let admin = ctx.login("admin").await;

    let cases = [
        json!({ "title": "", "assigned_to": ctx.alice.id }),
        json!({ "title": "Ghost", "assigned_to": 9999 }),
        json!({ "title": "Someday", "assigned_to": ctx.alice.id, "deadline": "next tuesday" }),
    ];

    for body in cases {
        let response = ctx
            .send(json_request("POST", "/api/admin/tasks", Some(&admin), body.clone()))
            .await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY, "{}", body);
    }
    assert!(ctx.state.tasks.list_all().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_admin_comments_on_any_task() {
    let ctx = TestContext::new().await;
    let admin = ctx.login("admin").await;
    let task_id = ctx.create_task("Review", ctx.bob.id).await;

    let response = ctx
        .send(json_request(
            "POST",
            "/api/admin/task_comments",
            Some(&admin),
            json!({ "task_id": task_id, "comment": "Please prioritise" }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let uri = format!("/api/admin/task_comments?task_id={}", task_id);
    let response = ctx.send(request("GET", &uri, Some(&admin))).await;
    assert_eq!(response.status(), StatusCode::OK);

    let comments = body_json(response).await["comments"].as_array().unwrap().clone();
    assert_eq!(comments.len(), 1);
    assert_eq!(comments[0]["comment"], "Please prioritise");
    assert_eq!(comments[0]["is_admin"], true);
    assert_eq!(comments[0]["username"], "admin");

    let response = ctx
        .send(json_request(
            "POST",
            "/api/admin/task_comments",
            Some(&admin),
            json!({ "task_id": 9999, "comment": "Anyone there?" }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_dashboard_counts() {
    let ctx = TestContext::new().await;
    let admin = ctx.login("admin").await;

    let first = ctx.create_task("One", ctx.alice.id).await;
    let second = ctx.create_task("Two", ctx.alice.id).await;
    ctx.create_task("Three", ctx.bob.id).await;
    ctx.state.tasks.update_status(first, "In Progress").await.unwrap();
    ctx.state.tasks.update_status(second, "Completed").await.unwrap();

    for uri in ["/api/admin/dashboard", "/api/dashboard"] {
        let response = ctx.send(request("GET", uri, Some(&admin))).await;
        assert_eq!(response.status(), StatusCode::OK, "{}", uri);
        assert_eq!(
            body_json(response).await["stats"],
            json!({ "total": 3, "pending": 1, "in_progress": 1, "completed": 1 }),
            "{}",
            uri
        );
    }

    let alice = ctx.login("alice").await;
    for uri in ["/api/user/dashboard", "/api/dashboard"] {
        let response = ctx.send(request("GET", uri, Some(&alice))).await;
        assert_eq!(response.status(), StatusCode::OK, "{}", uri);
        assert_eq!(
            body_json(response).await["stats"],
            json!({ "total": 2, "pending": 0, "in_progress": 1, "completed": 1 }),
            "{}",
            uri
        );
    }
}
