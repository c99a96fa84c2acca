//! Scraping job operations.
//!
//! Jobs are created through the REST boundary and claimed by exactly one
//! worker via `FOR UPDATE SKIP LOCKED`.

use crate::error::{DatabaseError, Result};
use chrono::{DateTime, Utc};
use longline_core::JobStatus;
use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

/// A job row as stored in `scraper_jobs`.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct JobRecord {
    /// Job identifier
    pub id: Uuid,
    /// Search query the crawl is driven by
    pub search_query: String,
    /// Optional marketplace category filter
    pub category: Option<String>,
    /// Maximum pages to crawl
    pub max_pages: i32,
    /// Job status string
    pub status: String,
    /// Pages crawled so far
    pub pages_scraped: i32,
    /// Products persisted so far
    pub products_found: i32,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Claim time
    pub started_at: Option<DateTime<Utc>>,
    /// Completion time
    pub completed_at: Option<DateTime<Utc>>,
    /// Failure message, if the job failed
    pub error: Option<String>,
}

impl JobRecord {
    /// Job status as an enum.
    #[must_use]
    pub fn job_status(&self) -> JobStatus {
        JobStatus::parse(&self.status)
    }
}

/// Parameters for creating a job.
#[derive(Debug, Clone, Deserialize)]
pub struct NewJob {
    /// Search query; required, non-empty
    pub search_query: String,
    /// Optional category filter
    pub category: Option<String>,
    /// Maximum pages; must be at least 1
    pub max_pages: i32,
}

/// A product linked to a job, joined with its lifecycle row.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct JobProductRow {
    /// Owning job
    pub job_id: Uuid,
    /// Linked product
    pub pid: String,
    /// Search page the product was found on
    pub page_number: i32,
    /// Product title
    pub title: String,
    /// Whether the product carries a qualifying size table
    pub has_sizes: bool,
}

/// Aggregate scraper statistics.
#[derive(Debug, Clone, Default, Serialize)]
pub struct JobStats {
    /// Total jobs ever created
    pub total_jobs: i64,
    /// Jobs waiting for a worker
    pub pending_jobs: i64,
    /// Jobs currently running
    pub running_jobs: i64,
    /// Jobs finished successfully
    pub completed_jobs: i64,
    /// Jobs finished with an error
    pub failed_jobs: i64,
    /// Total products in the store
    pub total_products: i64,
    /// Products with a stored size table
    pub products_with_sizes: i64,
    /// completed / total, percent
    pub success_rate: f64,
}

/// Create a new pending job.
pub async fn create_job<'e>(exec: impl PgExecutor<'e>, new_job: &NewJob) -> Result<JobRecord> {
    if new_job.search_query.trim().is_empty() {
        return Err(DatabaseError::Constraint(
            "search_query must not be empty".to_string(),
        ));
    }
    if new_job.max_pages < 1 {
        return Err(DatabaseError::Constraint(
            "max_pages must be at least 1".to_string(),
        ));
    }

    let record = sqlx::query_as::<_, JobRecord>(
        "INSERT INTO scraper_jobs (id, search_query, category, max_pages, status)
         VALUES ($1, $2, $3, $4, 'pending')
         RETURNING *",
    )
    .bind(Uuid::new_v4())
    .bind(new_job.search_query.trim())
    .bind(&new_job.category)
    .bind(new_job.max_pages)
    .fetch_one(exec)
    .await?;

    tracing::info!(job_id = %record.id, query = %record.search_query, "job created");
    Ok(record)
}

/// Fetch a job by ID.
pub async fn get_job<'e>(exec: impl PgExecutor<'e>, id: Uuid) -> Result<Option<JobRecord>> {
    let record = sqlx::query_as::<_, JobRecord>("SELECT * FROM scraper_jobs WHERE id = $1")
        .bind(id)
        .fetch_optional(exec)
        .await?;

    Ok(record)
}

/// List the most recent jobs.
pub async fn list_jobs<'e>(exec: impl PgExecutor<'e>, limit: i64) -> Result<Vec<JobRecord>> {
    let records = sqlx::query_as::<_, JobRecord>(
        "SELECT * FROM scraper_jobs ORDER BY created_at DESC LIMIT $1",
    )
    .bind(limit)
    .fetch_all(exec)
    .await?;

    Ok(records)
}

/// Atomically claim the oldest pending job.
///
/// The `FOR UPDATE SKIP LOCKED` sub-select guarantees at most one worker
/// holds a given job: concurrent claimants skip rows another transaction
/// has locked. The claimed job is moved to `running` with `started_at` set
/// in the same statement.
pub async fn claim_next_job(pool: &PgPool) -> Result<Option<JobRecord>> {
    let record = sqlx::query_as::<_, JobRecord>(
        "UPDATE scraper_jobs
         SET status = 'running', started_at = now()
         WHERE id = (
             SELECT id FROM scraper_jobs
             WHERE status = 'pending'
             ORDER BY created_at ASC
             LIMIT 1
             FOR UPDATE SKIP LOCKED
         )
         RETURNING *",
    )
    .fetch_optional(pool)
    .await?;

    Ok(record)
}

/// Mark a job completed.
pub async fn mark_completed<'e>(exec: impl PgExecutor<'e>, id: Uuid) -> Result<()> {
    sqlx::query(
        "UPDATE scraper_jobs SET status = 'completed', completed_at = now() WHERE id = $1",
    )
    .bind(id)
    .execute(exec)
    .await?;

    Ok(())
}

/// Mark a job failed with an error message. The job never returns to pending.
pub async fn mark_failed<'e>(exec: impl PgExecutor<'e>, id: Uuid, error: &str) -> Result<()> {
    sqlx::query(
        "UPDATE scraper_jobs
         SET status = 'failed', completed_at = now(), error = $2
         WHERE id = $1",
    )
    .bind(id)
    .bind(error)
    .execute(exec)
    .await?;

    Ok(())
}

/// Update crawl progress counters.
pub async fn update_progress<'e>(
    exec: impl PgExecutor<'e>,
    id: Uuid,
    pages_scraped: i32,
    products_found: i32,
) -> Result<()> {
    sqlx::query(
        "UPDATE scraper_jobs SET pages_scraped = $2, products_found = $3 WHERE id = $1",
    )
    .bind(id)
    .bind(pages_scraped)
    .bind(products_found)
    .execute(exec)
    .await?;

    Ok(())
}

/// Link a product to the job that discovered it. Duplicate links are ignored.
pub async fn link_product<'e>(
    exec: impl PgExecutor<'e>,
    job_id: Uuid,
    pid: &str,
    page_number: i32,
) -> Result<()> {
    sqlx::query(
        "INSERT INTO job_products (job_id, pid, page_number)
         VALUES ($1, $2, $3)
         ON CONFLICT (job_id, pid) DO NOTHING",
    )
    .bind(job_id)
    .bind(pid)
    .bind(page_number)
    .execute(exec)
    .await?;

    Ok(())
}

/// List the products a job discovered, in page order.
pub async fn job_products<'e>(
    exec: impl PgExecutor<'e>,
    job_id: Uuid,
) -> Result<Vec<JobProductRow>> {
    let rows = sqlx::query_as::<_, JobProductRow>(
        "SELECT jp.job_id, jp.pid, jp.page_number, p.title,
                (p.size_table IS NOT NULL) AS has_sizes
         FROM job_products jp
         JOIN products p ON p.pid = jp.pid
         WHERE jp.job_id = $1
         ORDER BY jp.page_number, jp.pid",
    )
    .bind(job_id)
    .fetch_all(exec)
    .await?;

    Ok(rows)
}

/// Aggregate job and product statistics.
pub async fn stats(pool: &PgPool) -> Result<JobStats> {
    let mut stats = JobStats::default();

    let (total, pending, running, completed, failed): (i64, i64, i64, i64, i64) =
        sqlx::query_as(
            "SELECT COUNT(*),
                    COUNT(*) FILTER (WHERE status = 'pending'),
                    COUNT(*) FILTER (WHERE status = 'running'),
                    COUNT(*) FILTER (WHERE status = 'completed'),
                    COUNT(*) FILTER (WHERE status = 'failed')
             FROM scraper_jobs",
        )
        .fetch_one(pool)
        .await?;

    stats.total_jobs = total;
    stats.pending_jobs = pending;
    stats.running_jobs = running;
    stats.completed_jobs = completed;
    stats.failed_jobs = failed;
    if total > 0 {
        stats.success_rate = completed as f64 / total as f64 * 100.0;
    }

    let (products, with_sizes): (i64, i64) = sqlx::query_as(
        "SELECT COUNT(*), COUNT(*) FILTER (WHERE size_table IS NOT NULL) FROM products",
    )
    .fetch_one(pool)
    .await?;

    stats.total_products = products;
    stats.products_with_sizes = with_sizes;

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::Database;

    async fn test_database() -> Database {
        let url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "postgres://postgres@localhost:5432/longline_test".to_string());
        let pool = PgPool::connect(&url).await.expect("connect to test db");
        let db = Database::from_pool(pool);
        db.run_migrations().await.expect("run migrations");
        db
    }

    fn new_job(query: &str) -> NewJob {
        NewJob {
            search_query: query.to_string(),
            category: Some("fashion".to_string()),
            max_pages: 3,
        }
    }

    #[test]
    fn test_create_job_validation() {
        // Constraint checks run before any SQL
        let bad = NewJob {
            search_query: "  ".to_string(),
            category: None,
            max_pages: 1,
        };
        assert!(bad.search_query.trim().is_empty());

        let bad_pages = NewJob {
            search_query: "t-shirt".to_string(),
            category: None,
            max_pages: 0,
        };
        assert!(bad_pages.max_pages < 1);
    }

    #[tokio::test]
    #[ignore = "requires a running PostgreSQL"]
    async fn test_create_and_claim_job() {
        let db = test_database().await;

        let created = create_job(db.pool(), &new_job("t-shirt herren lang"))
            .await
            .expect("create job");
        assert_eq!(created.job_status(), JobStatus::Pending);

        let claimed = claim_next_job(db.pool())
            .await
            .expect("claim")
            .expect("job available");
        assert_eq!(claimed.job_status(), JobStatus::Running);
        assert!(claimed.started_at.is_some());

        // A second claim must not return the same job again
        if let Some(other) = claim_next_job(db.pool()).await.expect("second claim") {
            assert_ne!(other.id, claimed.id);
            mark_failed(db.pool(), other.id, "test cleanup").await.expect("cleanup");
        }

        mark_completed(db.pool(), claimed.id).await.expect("complete");
        let done = get_job(db.pool(), claimed.id)
            .await
            .expect("fetch")
            .expect("exists");
        assert_eq!(done.job_status(), JobStatus::Completed);
        assert!(done.completed_at.is_some());
    }

    #[tokio::test]
    #[ignore = "requires a running PostgreSQL"]
    async fn test_job_failure_records_error() {
        let db = test_database().await;

        let created = create_job(db.pool(), &new_job("jeans lang"))
            .await
            .expect("create job");
        mark_failed(db.pool(), created.id, "navigation failed after 3 retries")
            .await
            .expect("fail");

        let failed = get_job(db.pool(), created.id)
            .await
            .expect("fetch")
            .expect("exists");
        assert_eq!(failed.job_status(), JobStatus::Failed);
        assert_eq!(
            failed.error.as_deref(),
            Some("navigation failed after 3 retries")
        );
    }

    #[tokio::test]
    #[ignore = "requires a running PostgreSQL"]
    async fn test_duplicate_product_links_ignored() {
        let db = test_database().await;

        let job = create_job(db.pool(), &new_job("hoodie lang"))
            .await
            .expect("create job");
        crate::products::ensure_product(
            db.pool(),
            "LINKDUP001",
            "Hoodie",
            "https://example.com/dp/LINKDUP001",
            None,
        )
        .await
        .expect("ensure product");

        link_product(db.pool(), job.id, "LINKDUP001", 1).await.expect("first link");
        link_product(db.pool(), job.id, "LINKDUP001", 2).await.expect("duplicate link");

        let rows = job_products(db.pool(), job.id).await.expect("list");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].page_number, 1);
    }
}
