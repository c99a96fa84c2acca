//! Job management for the REST boundary.

use crate::error::Result;
use longline_db::{jobs, Database, JobProductRow, JobRecord, JobStats, NewJob};
use uuid::Uuid;

/// Default page budget when a job request omits `max_pages`.
pub const DEFAULT_MAX_PAGES: i32 = 10;

/// Thin service over the job tables, consumed by the HTTP handlers.
#[derive(Clone)]
pub struct JobManager {
    db: Database,
}

impl JobManager {
    #[must_use]
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Create a pending job. `max_pages` falls back to
    /// [`DEFAULT_MAX_PAGES`] when unset or non-positive.
    pub async fn create_job(
        &self,
        search_query: String,
        category: Option<String>,
        max_pages: Option<i32>,
    ) -> Result<JobRecord> {
        let max_pages = match max_pages {
            Some(pages) if pages >= 1 => pages,
            _ => DEFAULT_MAX_PAGES,
        };

        let job = jobs::create_job(
            self.db.pool(),
            &NewJob {
                search_query,
                category,
                max_pages,
            },
        )
        .await?;

        Ok(job)
    }

    /// Fetch a job by id.
    pub async fn get_job(&self, id: Uuid) -> Result<Option<JobRecord>> {
        Ok(jobs::get_job(self.db.pool(), id).await?)
    }

    /// List the most recent jobs.
    pub async fn list_jobs(&self) -> Result<Vec<JobRecord>> {
        Ok(jobs::list_jobs(self.db.pool(), 100).await?)
    }

    /// List the products a job discovered.
    pub async fn job_products(&self, id: Uuid) -> Result<Vec<JobProductRow>> {
        Ok(jobs::job_products(self.db.pool(), id).await?)
    }

    /// Aggregate scraper statistics.
    pub async fn stats(&self) -> Result<JobStats> {
        Ok(jobs::stats(self.db.pool()).await?)
    }
}
