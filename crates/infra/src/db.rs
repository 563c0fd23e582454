//! Postgres connection and schema setup.

use std::time::Duration;

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::info;

use crate::queue::StoreError;
use crate::queue::postgres::map_sqlx_error;

const SCHEMA: &str = include_str!("../migrations/0001_pin_queue.sql");

/// Open a connection pool for `database_url`.
pub async fn connect(database_url: &str, max_connections: u32) -> Result<PgPool, StoreError> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(5))
        .connect(database_url)
        .await
        .map_err(|e| map_sqlx_error("connect", e))
}

/// Create the queue and credential tables if they are missing.
///
/// Every statement is idempotent, so this is safe to run at each startup.
pub async fn run_migrations(pool: &PgPool) -> Result<(), StoreError> {
    sqlx::raw_sql(SCHEMA)
        .execute(pool)
        .await
        .map_err(|e| map_sqlx_error("run_migrations", e))?;
    info!("pin queue schema is up to date");
    Ok(())
}
