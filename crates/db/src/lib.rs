//! PostgreSQL job store.
//!
//! Repositories are stateless structs with associated async functions taking
//! a `&PgPool`; [`PgJobStore`] wraps a pool and exposes them through the
//! [`JobStore`](fleetline_core::ports::JobStore) trait.

pub mod models;
pub mod repositories;
pub mod store;

use std::time::Duration;

use sqlx::postgres::PgPoolOptions;

pub use store::PgJobStore;

pub type DbPool = sqlx::PgPool;

/// Upper bound on pooled connections. Dispatch passes and reconciliation
/// share the pool concurrently.
const MAX_CONNECTIONS: u32 = 20;

/// How long to wait for a free connection before failing the operation.
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(30);

/// Create a connection pool from a database URL.
pub async fn create_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(MAX_CONNECTIONS)
        .acquire_timeout(ACQUIRE_TIMEOUT)
        .connect(database_url)
        .await
}

/// Round-trip a trivial query to prove the pool is usable.
pub async fn health_check(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Apply the embedded migrations from `db/migrations`.
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("../../db/migrations").run(pool).await
}
