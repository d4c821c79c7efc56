/// Database layer
///
/// # Modules
///
/// - `pool`: PostgreSQL connection pool with health checks
/// - `migrations`: embedded schema migrations
///
/// Queries live on the model types in [`crate::models`] and are reached
/// through [`crate::store::PgStore`].

pub mod migrations;
pub mod pool;
