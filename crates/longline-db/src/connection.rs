//! Database connection management.
//!
//! Provides the `Database` wrapper around a `SQLx` Postgres pool together
//! with a generic transaction combinator. The wrapper is the single owner of
//! the pool; components that only read hand around `&PgPool`.

use crate::error::{DatabaseError, Result};
use futures::future::BoxFuture;
use longline_core::config::DatabaseConfig;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use sqlx::{Postgres, Transaction};

/// Postgres connection pool wrapper.
#[derive(Debug, Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Connect to Postgres using the configured host, credentials and pool
    /// size, and verify the connection with a ping.
    pub async fn connect(cfg: &DatabaseConfig) -> Result<Self> {
        let options = PgConnectOptions::new()
            .host(&cfg.host)
            .port(cfg.port)
            .username(&cfg.user)
            .password(&cfg.password)
            .database(&cfg.name);

        let pool = PgPoolOptions::new()
            .max_connections(cfg.max_conns)
            .connect_with(options)
            .await
            .map_err(|e| DatabaseError::Connect(e.to_string()))?;

        sqlx::query("SELECT 1")
            .execute(&pool)
            .await
            .map_err(|e| DatabaseError::Connect(format!("ping failed: {e}")))?;

        tracing::info!(host = %cfg.host, database = %cfg.name, "connected to Postgres");

        Ok(Self { pool })
    }

    /// Wrap an existing pool. Used by tests that manage their own pool.
    #[must_use]
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get a reference to the underlying pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run all pending migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        crate::migrations::run_migrations(&self.pool).await
    }

    /// Execute `f` inside a transaction.
    ///
    /// Commits when `f` returns `Ok`, rolls back otherwise. The closure
    /// receives a mutable transaction handle usable as a `PgExecutor` via
    /// `&mut **tx`.
    pub async fn transaction<R, F>(&self, f: F) -> Result<R>
    where
        F: for<'t> FnOnce(&'t mut Transaction<'static, Postgres>) -> BoxFuture<'t, Result<R>>,
    {
        let mut tx = self.pool.begin().await?;
        match f(&mut tx).await {
            Ok(value) => {
                tx.commit().await?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    tracing::error!(error = %rollback_err, "transaction rollback failed");
                }
                Err(err)
            }
        }
    }

    /// Close the connection pool gracefully.
    pub async fn close(&self) {
        self.pool.close().await;
        tracing::info!("database pool closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_database() -> Database {
        let url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "postgres://postgres@localhost:5432/longline_test".to_string());
        let pool = PgPool::connect(&url).await.expect("connect to test db");
        let db = Database::from_pool(pool);
        db.run_migrations().await.expect("run migrations");
        db
    }

    #[tokio::test]
    #[ignore = "requires a running PostgreSQL"]
    async fn test_transaction_commits_on_ok() {
        let db = test_database().await;

        let result: crate::Result<i64> = db
            .transaction(|tx| {
                Box::pin(async move {
                    let row: (i64,) = sqlx::query_as("SELECT CAST(41 + 1 AS BIGINT)")
                        .fetch_one(&mut **tx)
                        .await?;
                    Ok(row.0)
                })
            })
            .await;

        assert_eq!(result.expect("transaction succeeds"), 42);
    }

    #[tokio::test]
    #[ignore = "requires a running PostgreSQL"]
    async fn test_transaction_rolls_back_on_error() {
        let db = test_database().await;

        let result: crate::Result<()> = db
            .transaction(|tx| {
                Box::pin(async move {
                    sqlx::query(
                        "INSERT INTO products (pid, detail_page_url) VALUES ($1, $2)",
                    )
                    .bind("TXROLL0001")
                    .bind("https://example.com/dp/TXROLL0001")
                    .execute(&mut **tx)
                    .await?;
                    Err(DatabaseError::NotFound("forced rollback".to_string()))
                })
            })
            .await;
        assert!(result.is_err());

        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM products WHERE pid = $1")
            .bind("TXROLL0001")
            .fetch_one(db.pool())
            .await
            .expect("count query");
        assert_eq!(count.0, 0, "insert must have been rolled back");
    }
}
