//! PostgreSQL event store shared by the trip and payment services.
//!
//! Each service owns its own database; the schema is identical.

pub mod pg_event_repository;

use sqlx::PgPool;
use sqlx::migrate::MigrateError;

/// Applies the bundled migrations to `pool`.
///
/// # Errors
///
/// Returns `MigrateError` if a migration fails to apply.
pub async fn run_migrations(pool: &PgPool) -> Result<(), MigrateError> {
    sqlx::migrate!("../../migrations").run(pool).await
}
