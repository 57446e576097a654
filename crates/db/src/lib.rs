//! PostgreSQL backend for advertising suggestions.
//!
//! The pool is created and owned by the caller: build it once at start-up
//! with [`connect`] (or [`create_pool`]), hand clones to
//! [`AdvSuggestRepo::new`](repositories::AdvSuggestRepo::new), and call
//! `pool.close().await` at shutdown.

use std::time::Duration;

use sqlx::postgres::PgPoolOptions;

pub mod config;
pub mod error;
pub mod models;
pub mod repositories;

pub use config::DbConfig;
pub use repositories::AdvSuggestRepo;

pub type DbPool = sqlx::PgPool;

/// Default pool size when none is configured.
pub const DEFAULT_MAX_CONNECTIONS: u32 = 20;

/// Create a connection pool from a database URL.
pub async fn create_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(DEFAULT_MAX_CONNECTIONS)
        .connect(database_url)
        .await
}

/// Create a connection pool sized and timed from `config`.
pub async fn connect(config: &DbConfig) -> Result<DbPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .connect(&config.database_url)
        .await?;
    tracing::info!(
        max_connections = config.max_connections,
        "Database connection pool created"
    );
    Ok(pool)
}

/// Round-trip a trivial query to confirm the database is reachable.
pub async fn health_check(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Apply the embedded migrations under `db/migrations`.
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("../../db/migrations").run(pool).await
}
