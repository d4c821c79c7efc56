//! # TaskHub API Server
//!
//! Serves the TaskHub JSON API and change feeds.
//!
//! ## Start-up
//!
//! 1. Load configuration from the environment (and `.env`)
//! 2. Open PostgreSQL and apply migrations, or fall back to the in-memory
//!    store when `DATABASE_URL` is unset
//! 3. Create the bootstrap administrator if configured
//! 4. Serve until Ctrl-C or SIGTERM, then stop feeds and close the pool
//!
//! ## Usage
//!
//! ```bash
//! cargo run -p taskhub-api
//! ```

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use taskhub_api::app::{build_router, spawn_session_sweeper, AppState};
use taskhub_api::config::Config;
use taskhub_shared::db::migrations::{ensure_database_exists, run_migrations};
use taskhub_shared::db::pool::{close_pool, create_pool};
use taskhub_shared::notify::{HttpMailer, LogMailer, Mailer};
use taskhub_shared::store::{MemoryStore, PgStore, Store};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const MAIL_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "taskhub_api=debug,taskhub_shared=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("TaskHub API Server v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env()?;

    let (store, pool): (Arc<dyn Store>, _) = match &config.database {
        Some(database) => {
            ensure_database_exists(&database.url).await?;
            let pool = create_pool(database.clone()).await?;
            run_migrations(&pool).await?;
            (Arc::new(PgStore::new(pool.clone())), Some(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL is not set; using the in-memory store, data is lost on exit");
            (Arc::new(MemoryStore::new()), None)
        }
    };

    let mailer: Arc<dyn Mailer> = match &config.mail {
        Some(mail) => Arc::new(HttpMailer::new(&mail.relay_url, &mail.from, MAIL_TIMEOUT)),
        None => {
            tracing::info!("MAIL_RELAY_URL is not set; notifications are logged, not sent");
            Arc::new(LogMailer)
        }
    };

    let bind_address = config.bind_address();
    let admin = config.admin.clone();
    let state = AppState::new(store, mailer, config);

    if let Some(admin) = admin {
        match state
            .users
            .ensure_admin(&admin.username, &admin.email, &admin.password)
            .await
        {
            Ok(true) => tracing::info!(username = %admin.username, "Bootstrap administrator created"),
            Ok(false) => tracing::debug!(username = %admin.username, "Bootstrap administrator already exists"),
            Err(e) => tracing::error!(error = %e, "Could not create bootstrap administrator"),
        }
    }

    let sweeper = spawn_session_sweeper(state.sessions.clone(), state.shutdown.clone());

    let app = build_router(state.clone());
    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    tracing::info!("Server listening on http://{}", bind_address);

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal(state.shutdown.clone()))
        .await?;

    sweeper.await.ok();
    if let Some(pool) = pool {
        close_pool(pool).await;
    }

    tracing::info!("Server stopped");
    Ok(())
}

/// Waits for Ctrl-C or SIGTERM, then cancels `shutdown` so open feeds end
/// and the server can drain.
async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, exiting...");
    shutdown.cancel();
}
