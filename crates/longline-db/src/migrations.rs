//! Database migration management.
//!
//! Embeds SQL migrations and provides functions to apply them automatically
//! using `SQLx`'s built-in migration support.

use crate::error::{DatabaseError, Result};
use sqlx::PgPool;

/// Run all pending database migrations.
///
/// Applies every migration in the `migrations/` directory that hasn't been
/// applied yet; applied versions are tracked in `_sqlx_migrations`.
///
/// # Errors
/// Returns `DatabaseError::Migration` if any migration fails to execute.
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    tracing::info!("running database migrations");

    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| DatabaseError::Migration(format!("migration execution failed: {e}")))?;

    tracing::info!("database migrations completed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[ignore = "requires a running PostgreSQL"]
    async fn test_migrations_idempotent() {
        let url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "postgres://postgres@localhost:5432/longline_test".to_string());
        let pool = PgPool::connect(&url).await.expect("connect to test db");

        run_migrations(&pool).await.expect("first migration run");
        run_migrations(&pool)
            .await
            .expect("second migration run should be idempotent");

        let tables: Vec<String> = sqlx::query_scalar(
            "SELECT tablename FROM pg_tables WHERE schemaname = 'public'
             AND tablename != '_sqlx_migrations' ORDER BY tablename",
        )
        .fetch_all(&pool)
        .await
        .expect("query tables");

        assert_eq!(
            tables,
            vec!["job_products", "outbox_event", "products", "scraper_jobs"]
        );
    }
}
