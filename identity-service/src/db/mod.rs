//! PostgreSQL pool and schema setup.

use service_core::error::AppError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;

use crate::config::DatabaseConfig;
use crate::services::Database;

pub async fn create_pool(config: &DatabaseConfig) -> Result<PgPool, AppError> {
    tracing::info!(
        max_connections = config.max_connections,
        min_connections = config.min_connections,
        "Connecting to PostgreSQL"
    );

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(30))
        .idle_timeout(Duration::from_secs(600))
        .connect(&config.url)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to connect: {}", e)))?;

    tracing::info!("PostgreSQL connection pool established");
    Ok(pool)
}

/// Apply the embedded migrations under `migrations/`.
pub async fn run_migrations(pool: &PgPool) -> Result<(), AppError> {
    tracing::info!("Running database migrations");
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Migration failed: {}", e)))?;
    tracing::info!("Database migrations completed");
    Ok(())
}

/// Connect, migrate and wrap the pool as a store.
pub async fn connect(config: &DatabaseConfig) -> Result<Database, AppError> {
    let pool = create_pool(config).await?;
    run_migrations(&pool).await?;
    Ok(Database::new(pool))
}
