/// Schema migrations
///
/// Migrations live in `migrations/` at the workspace root and are embedded
/// at compile time with `sqlx::migrate!`. The API applies them on start-up
/// before serving; the worker only reports the status it finds.
///
/// # Example
///
/// ```no_run
/// use taskhub_shared::db::migrations::{ensure_database_exists, run_migrations};
/// use taskhub_shared::db::pool::{create_pool, DatabaseConfig};
///
/// # async fn example(url: &str) -> Result<(), Box<dyn std::error::Error>> {
/// ensure_database_exists(url).await?;
/// let pool = create_pool(DatabaseConfig::new(url, 5)).await?;
/// run_migrations(&pool).await?;
/// # Ok(())
/// # }
/// ```

use sqlx::{migrate::MigrateDatabase, postgres::PgPool, Postgres};
use tracing::{debug, info, warn};

/// Applied-migration summary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationStatus {
    pub applied: usize,
    pub latest_version: Option<i64>,
}

/// Applies all pending migrations.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    info!("Applying database migrations");

    match sqlx::migrate!("../migrations").run(pool).await {
        Ok(()) => {
            info!("Database schema is up to date");
            Ok(())
        }
        Err(e) => {
            warn!(error = %e, "Migration failed");
            Err(e)
        }
    }
}

/// Reads the applied migrations from `_sqlx_migrations`.
///
/// A database that has never been migrated reports zero applied.
pub async fn migration_status(pool: &PgPool) -> Result<MigrationStatus, sqlx::Error> {
    let table_exists: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS (
            SELECT FROM information_schema.tables
            WHERE table_schema = 'public' AND table_name = '_sqlx_migrations'
        )
        "#,
    )
    .fetch_one(pool)
    .await?;

    if !table_exists {
        debug!("No migrations table yet");
        return Ok(MigrationStatus { applied: 0, latest_version: None });
    }

    let (count, latest_version): (i64, Option<i64>) = sqlx::query_as(
        "SELECT COUNT(*), MAX(version) FROM _sqlx_migrations WHERE success = true",
    )
    .fetch_one(pool)
    .await?;

    Ok(MigrationStatus {
        applied: count as usize,
        latest_version,
    })
}

/// Creates the database named in the URL if it does not exist.
pub async fn ensure_database_exists(database_url: &str) -> Result<(), sqlx::Error> {
    if Postgres::database_exists(database_url).await? {
        debug!("Database already exists");
    } else {
        info!("Database does not exist, creating it");
        Postgres::create_database(database_url).await?;
    }

    Ok(())
}
