/// Application state and router builder
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use taskhub_api::{app::{build_router, AppState}, config::Config};
/// use taskhub_shared::notify::LogMailer;
/// use taskhub_shared::store::MemoryStore;
///
/// # async fn example() -> anyhow::Result<()> {
/// let state = AppState::new(Arc::new(MemoryStore::new()), Arc::new(LogMailer), Config::default());
/// let app = build_router(state);
///
/// let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
/// axum::serve(listener, app).await?;
/// # Ok(())
/// # }
/// ```

use std::sync::Arc;
use std::time::Duration;

use axum::{
    http::{header, HeaderName, HeaderValue, Method},
    routing::get,
    Router,
};
use taskhub_shared::auth::session::SessionStore;
use taskhub_shared::notify::{Dispatcher, Mailer};
use taskhub_shared::repository::{CommentRepository, TaskRepository, UserRepository};
use taskhub_shared::store::Store;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::config::Config;
use crate::middleware::{
    rate_limit::{rate_limit_layer, RateLimiter},
    security::SecurityHeadersLayer,
    session::{session_layer, CSRF_HEADER},
};

/// How often abandoned sessions are swept
const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Shared application state
///
/// Cloned for each request handler via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,

    pub users: UserRepository,

    pub tasks: TaskRepository,

    pub comments: CommentRepository,

    pub sessions: SessionStore,

    pub limiter: RateLimiter,

    /// Fires on server shutdown; feeds stop with it
    pub shutdown: CancellationToken,

    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, mailer: Arc<dyn Mailer>, config: Config) -> Self {
        crate::error::set_expose_internal(config.api.debug);

        let notifier = Arc::new(Dispatcher::new(mailer, config.api.app_url.clone()));

        Self {
            users: UserRepository::new(store.clone(), notifier.clone()),
            tasks: TaskRepository::new(store.clone(), notifier),
            comments: CommentRepository::new(store.clone()),
            sessions: SessionStore::new(config.session),
            limiter: RateLimiter::new(config.rate_limit),
            shutdown: CancellationToken::new(),
            store,
            config: Arc::new(config),
        }
    }
}

/// Builds the complete Axum router with all routes and middleware
///
/// # Architecture
///
/// ```text
/// /
/// ├── /health                           # liveness + storage (public)
/// └── /api/
///     ├── auth/login | logout | check
///     ├── admin/users                   # GET POST PUT DELETE
///     ├── admin/tasks                   # GET POST PUT DELETE
///     ├── admin/task_comments           # GET POST ?task_id=
///     ├── admin/dashboard
///     ├── user/tasks                    # GET PUT
///     ├── user/tasks/stream             # SSE
///     ├── user/task_comments            # GET POST ?task_id=
///     ├── user/task_comments/stream     # SSE ?task_id=
///     ├── user/dashboard
///     └── dashboard
/// ```
///
/// # Middleware Stack
///
/// Outermost first:
/// 1. Security headers
/// 2. CORS
/// 3. Logging (tower-http TraceLayer)
/// 4. Rate limiting (`/api` only)
/// 5. Session resolution and CSRF (`/api` only)
pub fn build_router(state: AppState) -> Router {
    use crate::routes;

    let api_routes = Router::new()
        .route("/api/auth/login", axum::routing::post(routes::auth::login))
        .route("/api/auth/logout", axum::routing::post(routes::auth::logout))
        .route(
            "/api/auth/check",
            get(routes::auth::check).post(routes::auth::check),
        )
        .route(
            "/api/admin/users",
            get(routes::users::list_users)
                .post(routes::users::create_user)
                .put(routes::users::update_user)
                .delete(routes::users::delete_user),
        )
        .route(
            "/api/admin/tasks",
            get(routes::tasks::list_all_tasks)
                .post(routes::tasks::create_task)
                .put(routes::tasks::update_task_description)
                .delete(routes::tasks::delete_task),
        )
        .route(
            "/api/admin/task_comments",
            get(routes::comments::admin_list_comments).post(routes::comments::admin_post_comment),
        )
        .route("/api/admin/dashboard", get(routes::dashboard::admin_dashboard))
        .route(
            "/api/user/tasks",
            get(routes::tasks::list_own_tasks).put(routes::tasks::update_task_status),
        )
        .route("/api/user/tasks/stream", get(routes::feed::stream_own_tasks))
        .route(
            "/api/user/task_comments",
            get(routes::comments::user_list_comments).post(routes::comments::user_post_comment),
        )
        .route(
            "/api/user/task_comments/stream",
            get(routes::feed::stream_task_comments),
        )
        .route("/api/user/dashboard", get(routes::dashboard::user_dashboard))
        .route("/api/dashboard", get(routes::dashboard::dashboard))
        .layer(axum::middleware::from_fn_with_state(state.clone(), session_layer))
        .layer(axum::middleware::from_fn_with_state(state.clone(), rate_limit_layer));

    let health_routes = Router::new().route("/health", get(routes::health::health_check));

    // Configure CORS based on environment
    let cors = if state.config.api.cors_origins.iter().any(|origin| origin == "*") {
        // Development mode: permissive CORS
        CorsLayer::permissive()
    } else {
        let origins: Vec<HeaderValue> = state
            .config
            .api
            .cors_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([header::CONTENT_TYPE, HeaderName::from_static(CSRF_HEADER)])
            .allow_credentials(true)
            .max_age(Duration::from_secs(3600))
    };

    Router::new()
        .merge(health_routes)
        .merge(api_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors)
        .layer(SecurityHeadersLayer::new(state.config.api.production))
        .with_state(state)
}

/// Removes idle sessions every minute until `shutdown` fires.
///
/// Expiry on access stays in force; this only bounds memory held by
/// abandoned sessions.
pub fn spawn_session_sweeper(sessions: SessionStore, shutdown: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(SESSION_SWEEP_INTERVAL) => {
                    let removed = sessions.sweep_expired().await;
                    if removed > 0 {
                        tracing::debug!(removed, "Swept expired sessions");
                    }
                }
            }
        }
    })
}
