//! Common test utilities for integration tests
//!
//! Every test gets its own in-memory store and a recording mailer, so tests
//! run without PostgreSQL or a mail relay:
//! - one administrator (`admin`) and two users (`alice`, `bob`)
//! - login helper returning the session cookie and CSRF token
//! - request and body helpers

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, Response, StatusCode};
use serde_json::Value;
use taskhub_api::app::{build_router, AppState};
use taskhub_api::config::Config;
use taskhub_shared::models::user::{Role, User};
use taskhub_shared::notify::MemoryMailer;
use taskhub_shared::repository::NewUser;
use taskhub_shared::store::MemoryStore;
use tower::ServiceExt;

pub const PASSWORD: &str = "correct-horse";

/// Test context containing all necessary resources
pub struct TestContext {
    pub app: axum::Router,
    pub state: AppState,
    pub mailer: Arc<MemoryMailer>,
    pub admin: User,
    pub alice: User,
    pub bob: User,
}

/// A signed-in client
#[derive(Debug, Clone)]
pub struct Client {
    /// `TASK_SESSION=<id>`, ready for a `Cookie` header
    pub cookie: String,
    pub csrf_token: String,
}

impl TestContext {
    pub async fn new() -> Self {
        Self::with_config(Config::default()).await
    }

    pub async fn with_config(config: Config) -> Self {
        let mailer = Arc::new(MemoryMailer::new());
        let state = AppState::new(Arc::new(MemoryStore::new()), mailer.clone(), config);

        let admin = create_user(&state, "admin", Role::Admin).await;
        let alice = create_user(&state, "alice", Role::User).await;
        let bob = create_user(&state, "bob", Role::User).await;
        mailer.clear().await;

        Self {
            app: build_router(state.clone()),
            state,
            mailer,
            admin,
            alice,
            bob,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.app.clone().oneshot(request).await.unwrap()
    }

    /// Logs in and returns the session cookie and CSRF token.
    pub async fn login(&self, username: &str) -> Client {
        let response = self
            .send(json_request(
                "POST",
                "/api/auth/login",
                None,
                serde_json::json!({ "username": username, "password": PASSWORD }),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::OK, "login as {}", username);

        let cookie = set_cookie(&response).expect("login sets a cookie");
        let body = body_json(response).await;
        let csrf_token = body["csrf_token"].as_str().unwrap().to_string();

        Client { cookie, csrf_token }
    }

    /// Creates a task through the repository, bypassing HTTP.
    pub async fn create_task(&self, title: &str, assigned_to: i64) -> i64 {
        self.state
            .tasks
            .create(taskhub_shared::repository::NewTask {
                title: title.to_string(),
                description: format!("{} description", title),
                assigned_to,
                assigned_by: self.admin.id,
                deadline: None,
            })
            .await
            .unwrap()
    }
}

async fn create_user(state: &AppState, username: &str, role: Role) -> User {
    state
        .users
        .create(NewUser {
            username: username.to_string(),
            email: format!("{}@example.com", username),
            password: PASSWORD.to_string(),
            role,
        })
        .await
        .unwrap()
}

/// The `name=value` part of the response's `Set-Cookie` header
pub fn set_cookie(response: &Response<Body>) -> Option<String> {
    response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .map(|pair| pair.trim().to_string())
}

/// Builds a request, attaching the client's cookie and CSRF token when given.
pub fn request(method: &str, uri: &str, client: Option<&Client>) -> Request<Body> {
    builder(method, uri, client).body(Body::empty()).unwrap()
}

pub fn json_request(method: &str, uri: &str, client: Option<&Client>, body: Value) -> Request<Body> {
    builder(method, uri, client)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn builder(method: &str, uri: &str, client: Option<&Client>) -> axum::http::request::Builder {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(client) = client {
        builder = builder
            .header(header::COOKIE, client.cookie.as_str())
            .header("x-csrf-token", client.csrf_token.as_str());
    }
    builder
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap_or_else(|e| {
        panic!("body is not JSON ({}): {}", e, String::from_utf8_lossy(&bytes))
    })
}
