/// Session lifecycle tests: login, check, logout, CSRF, rotation and the
/// 401/403 split.

mod common;

use axum::http::{header, StatusCode};
use common::{body_json, json_request, request, set_cookie, Client, TestContext, PASSWORD};
use serde_json::json;
use taskhub_api::config::Config;

#[tokio::test]
async fn test_login_sets_cookie_and_returns_user() {
    let ctx = TestContext::new().await;

    let response = ctx
        .send(json_request(
            "POST",
            "/api/auth/login",
            None,
            json!({ "username": "alice", "password": PASSWORD }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let raw_cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(raw_cookie.starts_with("TASK_SESSION="));
    assert!(raw_cookie.contains("HttpOnly"));
    assert!(raw_cookie.contains("SameSite=Strict"));

    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["user"]["username"], "alice");
    assert_eq!(body["user"]["role"], "user");
    assert!(body["user"].get("password_hash").is_none());
    assert!(!body["csrf_token"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn test_login_by_email() {
    let ctx = TestContext::new().await;

    let response = ctx
        .send(json_request(
            "POST",
            "/api/auth/login",
            None,
            json!({ "username": "bob@example.com", "password": PASSWORD }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["user"]["id"], ctx.bob.id);
}

#[tokio::test]
async fn test_wrong_password_and_unknown_user_look_the_same() {
    let ctx = TestContext::new().await;

    let wrong = ctx
        .send(json_request(
            "POST",
            "/api/auth/login",
            None,
            json!({ "username": "alice", "password": "not-her-password" }),
        ))
        .await;
    let unknown = ctx
        .send(json_request(
            "POST",
            "/api/auth/login",
            None,
            json!({ "username": "mallory", "password": PASSWORD }),
        ))
        .await;

    assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(unknown.status(), StatusCode::UNAUTHORIZED);
    assert!(wrong.headers().get(header::SET_COOKIE).is_none());
    assert_eq!(body_json(wrong).await, body_json(unknown).await);
}

#[tokio::test]
async fn test_empty_credentials_are_a_validation_error() {
    let ctx = TestContext::new().await;

    let response = ctx
        .send(json_request(
            "POST",
            "/api/auth/login",
            None,
            json!({ "username": "", "password": "" }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let body = body_json(response).await;
    assert_eq!(body["error"], "validation_error");
    assert!(body["details"].is_array());
}

#[tokio::test]
async fn test_check_reports_session() {
    let ctx = TestContext::new().await;

    let response = ctx.send(request("GET", "/api/auth/check", None)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let admin = ctx.login("admin").await;
    let response = ctx.send(request("GET", "/api/auth/check", Some(&admin))).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["user"]["role"], "admin");
    assert_eq!(body["csrf_token"], admin.csrf_token.as_str());
}

#[tokio::test]
async fn test_logout_ends_session() {
    let ctx = TestContext::new().await;
    let alice = ctx.login("alice").await;

    let response = ctx.send(request("POST", "/api/auth/logout", Some(&alice))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(set_cookie(&response).as_deref(), Some("TASK_SESSION="));

    let response = ctx.send(request("GET", "/api/auth/check", Some(&alice))).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    // The stale cookie is cleared
    assert_eq!(set_cookie(&response).as_deref(), Some("TASK_SESSION="));

    let response = ctx.send(request("POST", "/api/auth/logout", None)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_login_replaces_presented_session() {
    let ctx = TestContext::new().await;
    let first = ctx.login("alice").await;

    let response = ctx
        .send(json_request(
            "POST",
            "/api/auth/login",
            Some(&first),
            json!({ "username": "alice", "password": PASSWORD }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let second = set_cookie(&response).unwrap();
    assert_ne!(second, first.cookie);

    let response = ctx.send(request("GET", "/api/auth/check", Some(&first))).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_unauthenticated_and_forbidden_are_distinct() {
    let ctx = TestContext::new().await;
    let alice = ctx.login("alice").await;

    for uri in ["/api/admin/users", "/api/admin/tasks", "/api/admin/dashboard", "/api/user/tasks"] {
        let response = ctx.send(request("GET", uri, None)).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{}", uri);
        assert_eq!(body_json(response).await["error"], "unauthorized");
    }

    for uri in ["/api/admin/users", "/api/admin/tasks", "/api/admin/dashboard"] {
        let response = ctx.send(request("GET", uri, Some(&alice))).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN, "{}", uri);
        assert_eq!(body_json(response).await["error"], "forbidden");
    }
}

#[tokio::test]
async fn test_mutation_without_csrf_token_is_refused() {
    let ctx = TestContext::new().await;
    let admin = ctx.login("admin").await;

    let no_token = Client {
        cookie: admin.cookie.clone(),
        csrf_token: String::new(),
    };
    let body = json!({ "title": "Audit", "assigned_to": ctx.alice.id });

    let response = ctx
        .send(json_request("POST", "/api/admin/tasks", Some(&no_token), body.clone()))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let wrong_token = Client {
        cookie: admin.cookie.clone(),
        csrf_token: "0".repeat(64),
    };
    let response = ctx
        .send(json_request("POST", "/api/admin/tasks", Some(&wrong_token), body.clone()))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(ctx.state.tasks.list_all().await.unwrap().is_empty());

    let response = ctx
        .send(json_request("POST", "/api/admin/tasks", Some(&admin), body))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_reads_do_not_need_csrf_token() {
    let ctx = TestContext::new().await;
    let alice = ctx.login("alice").await;
    let cookie_only = Client {
        cookie: alice.cookie,
        csrf_token: String::new(),
    };

    let response = ctx.send(request("GET", "/api/user/tasks", Some(&cookie_only))).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_session_id_rotates() {
    let mut config = Config::default();
    config.session.rotation_interval = chrono::Duration::zero();
    let ctx = TestContext::with_config(config).await;
    let alice = ctx.login("alice").await;

    let response = ctx.send(request("GET", "/api/auth/check", Some(&alice))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let rotated = set_cookie(&response).expect("rotation sets a new cookie");
    assert!(rotated.starts_with("TASK_SESSION="));
    assert_ne!(rotated, alice.cookie);

    // The CSRF token survives rotation
    let renewed = Client {
        cookie: rotated,
        csrf_token: alice.csrf_token.clone(),
    };
    let response = ctx.send(request("GET", "/api/auth/check", Some(&renewed))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let current = set_cookie(&response).expect("rotation sets a new cookie");
    assert_eq!(body_json(response).await["csrf_token"], alice.csrf_token.as_str());

    // A request still carrying the first id is served and handed the current one
    let response = ctx.send(request("GET", "/api/auth/check", Some(&alice))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(set_cookie(&response).as_deref(), Some(current.as_str()));

    // Logging out with the current id ends the replaced ids as well
    let latest = Client {
        cookie: current,
        csrf_token: alice.csrf_token.clone(),
    };
    let response = ctx.send(json_request("POST", "/api/auth/logout", Some(&latest), json!({}))).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = ctx.send(request("GET", "/api/auth/check", Some(&alice))).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_rate_limit_applies_to_api() {
    let mut config = Config::default();
    config.rate_limit.max_requests = 2;
    let ctx = TestContext::with_config(config).await;

    for _ in 0..2 {
        let response = ctx.send(request("GET", "/api/auth/check", None)).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().contains_key("x-ratelimit-remaining"));
    }

    let response = ctx.send(request("GET", "/api/auth/check", None)).await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(response.headers().contains_key(header::RETRY_AFTER));
    assert_eq!(body_json(response).await["error"], "rate_limit_exceeded");

    // Health is outside the limiter
    let response = ctx.send(request("GET", "/health", None)).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_security_headers_present() {
    let ctx = TestContext::new().await;

    let response = ctx.send(request("GET", "/health", None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get("x-content-type-options").unwrap(), "nosniff");
    assert_eq!(response.headers().get("x-frame-options").unwrap(), "DENY");

    let body = body_json(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["storage"], "memory");
}
