//! Database connection pool, migrations and store selection.
//!
//! This module provides utilities for:
//! - Creating and managing a PostgreSQL connection pool
//! - Running database migrations automatically
//! - Picking the key store backend from configuration

use crate::config::Config;
use crate::store::{InMemoryApiKeyStore, PgApiKeyStore, SharedStore};
use sqlx::{Pool, Postgres};
use std::sync::Arc;

/// Type alias for PostgreSQL connection pool.
pub type DbPool = Pool<Postgres>;

/// Create a new PostgreSQL connection pool.
///
/// # Arguments
///
/// * `database_url` - PostgreSQL connection string
/// * `max_connections` - Upper bound on pooled connections
///
/// # Errors
///
/// Returns an error if:
/// - Database connection string is invalid
/// - Cannot connect to PostgreSQL server
/// - Database authentication fails
pub async fn create_pool(
    database_url: &str,
    max_connections: u32,
) -> Result<DbPool, sqlx::Error> {
    sqlx::postgres::PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
}

/// Run database migrations from the `migrations/` directory.
///
/// Migrations are tracked in the `_sqlx_migrations` table, so each one runs only once.
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    // The macro reads migrations at compile time from ./migrations directory
    sqlx::migrate!("./migrations").run(pool).await
}

/// Build the key store described by `config`.
///
/// With a `DATABASE_URL` the PostgreSQL store is used after migrating the
/// schema. Without one, keys are kept in process memory and lost on restart.
pub async fn connect_store(config: &Config) -> anyhow::Result<SharedStore> {
    let Some(database_url) = config.database_url.as_deref() else {
        tracing::warn!("DATABASE_URL not set, keys are kept in memory only");
        return Ok(Arc::new(InMemoryApiKeyStore::new()));
    };

    let pool = create_pool(database_url, config.database_max_connections).await?;
    tracing::info!(
        max_connections = config.database_max_connections,
        "Database pool created"
    );

    run_migrations(&pool).await?;
    tracing::info!("Database migrations complete");

    Ok(Arc::new(PgApiKeyStore::new(pool)))
}
