use std::time::Duration;

use shared_error::AppError;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

/// Initialize database connection pool
pub async fn init_pool(database_url: &str, max_connections: u32) -> Result<PgPool, AppError> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to connect to database: {}", e)))?;

    tracing::info!(max_connections, "database pool initialized");
    Ok(pool)
}

/// Verify the pool is usable before the engine accepts work
pub async fn ping(pool: &PgPool) -> Result<(), AppError> {
    sqlx::query("SELECT 1")
        .execute(pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Database ping failed: {}", e)))?;
    Ok(())
}
