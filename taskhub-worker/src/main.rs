//! # TaskHub Worker
//!
//! Runs the deadline reminder sweep against the API server's database.
//!
//! ## Usage
//!
//! ```bash
//! DATABASE_URL=postgresql://localhost/taskhub cargo run -p taskhub-worker
//! ```

use std::sync::Arc;
use std::time::Duration;

use taskhub_shared::db::migrations::migration_status;
use taskhub_shared::db::pool::{close_pool, create_pool};
use taskhub_shared::notify::{Dispatcher, HttpMailer, LogMailer, Mailer};
use taskhub_shared::repository::TaskRepository;
use taskhub_shared::store::PgStore;
use taskhub_worker::config::WorkerConfig;
use taskhub_worker::reminders::ReminderSweep;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const MAIL_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "taskhub_worker=debug,taskhub_shared=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("TaskHub Worker v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = WorkerConfig::from_env()?;
    let pool = create_pool(config.database.clone()).await?;

    // The API server owns migrations
    let status = migration_status(&pool).await?;
    if status.applied == 0 {
        tracing::warn!("No migrations applied yet; start the API server first");
    }

    let mailer: Arc<dyn Mailer> = match &config.mail {
        Some((relay_url, from)) => Arc::new(HttpMailer::new(relay_url, from, MAIL_TIMEOUT)),
        None => Arc::new(LogMailer),
    };
    let notifier = Arc::new(Dispatcher::new(mailer, config.app_url.clone()));
    let tasks = TaskRepository::new(Arc::new(PgStore::new(pool.clone())), notifier.clone());
    let sweep = ReminderSweep::new(tasks, notifier, config.window_hours, config.interval);

    let shutdown = CancellationToken::new();
    let sweeper = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move { sweep.run(shutdown).await })
    };

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received, exiting...");
    shutdown.cancel();

    sweeper.await?;
    close_pool(pool).await;

    Ok(())
}
