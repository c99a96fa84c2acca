//! The scrape worker loop.

use crate::error::Result;
use longline_core::ProductStatus;
use longline_db::{jobs, products, Database, JobRecord, NewProduct};
use longline_events::publisher;
use longline_events::types::{NewProductDetectedPayload, Price};
use longline_scraper::{CategoryCrawler, CompleteProduct, ProductExtractor};
use longline_browser::SessionPool;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Worker pacing configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Poll interval for pending jobs
    pub job_poll: Duration,
    /// Sleep between product extractions
    pub product_interval: Duration,
    /// Sleep between crawled pages
    pub page_interval: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            job_poll: Duration::from_secs(10),
            product_interval: Duration::from_secs(2),
            page_interval: Duration::from_secs(3),
        }
    }
}

/// Claims pending jobs and drives the crawl/extract pipeline for each.
///
/// One worker loop runs per process; the `FOR UPDATE SKIP LOCKED` claim
/// keeps concurrent processes from sharing a job.
pub struct JobWorker {
    db: Database,
    sessions: Arc<SessionPool>,
    crawler: CategoryCrawler,
    extractor: ProductExtractor,
    config: WorkerConfig,
}

impl JobWorker {
    #[must_use]
    pub fn new(
        db: Database,
        sessions: Arc<SessionPool>,
        crawler: CategoryCrawler,
        extractor: ProductExtractor,
        config: WorkerConfig,
    ) -> Self {
        Self {
            db,
            sessions,
            crawler,
            extractor,
            config,
        }
    }

    /// Run until cancelled. The loop survives errors in any single job.
    pub async fn run(&self, cancel: CancellationToken) {
        tracing::info!(poll_s = self.config.job_poll.as_secs(), "job worker started");

        let mut ticker = tokio::time::interval(self.config.job_poll);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    tracing::info!("job worker stopping");
                    return;
                }
                _ = ticker.tick() => {
                    if let Err(err) = self.process_next_job(&cancel).await {
                        tracing::error!(error = %err, "job processing failed");
                    }
                }
            }
        }
    }

    /// Claim and run the next pending job, if any.
    pub async fn process_next_job(&self, cancel: &CancellationToken) -> Result<()> {
        let Some(job) = jobs::claim_next_job(self.db.pool()).await? else {
            return Ok(());
        };

        tracing::info!(job_id = %job.id, query = %job.search_query, "processing job");

        match self.run_job(&job, cancel).await {
            Ok(products_found) => {
                jobs::mark_completed(self.db.pool(), job.id).await?;
                tracing::info!(job_id = %job.id, products = products_found, "job completed");
            }
            Err(err) => {
                tracing::error!(job_id = %job.id, error = %err, "job failed");
                jobs::mark_failed(self.db.pool(), job.id, &err.to_string()).await?;
            }
        }

        Ok(())
    }

    async fn run_job(&self, job: &JobRecord, cancel: &CancellationToken) -> Result<i32> {
        let search_url = self
            .crawler
            .search_url(&job.search_query, job.category.as_deref());

        let session = self.sessions.acquire_page().await?;
        let result = self.crawl_job_pages(job, &search_url, &session, cancel).await;
        self.sessions.release_page(session).await;
        result
    }

    async fn crawl_job_pages(
        &self,
        job: &JobRecord,
        search_url: &str,
        session: &longline_browser::PageSession,
        cancel: &CancellationToken,
    ) -> Result<i32> {
        let mut total_products = 0;

        for page_number in 1..=job.max_pages.max(1) as u32 {
            if cancel.is_cancelled() {
                tracing::info!(job_id = %job.id, page = page_number, "shutdown requested, stopping job");
                break;
            }

            let (summaries, has_next) = match self
                .crawler
                .crawl_page(session.page(), search_url, page_number)
                .await
            {
                Ok(result) => result,
                Err(err) => {
                    // One bad page never fails the job
                    tracing::error!(job_id = %job.id, page = page_number, error = %err, "failed to crawl page");
                    continue;
                }
            };

            for summary in summaries {
                if cancel.is_cancelled() {
                    break;
                }

                match self
                    .extractor
                    .extract_complete(session.page(), &summary.pid, Some(summary.url.as_str()))
                    .await
                {
                    Ok(product) => {
                        if let Err(err) =
                            self.persist_product(job.id, &product, page_number as i32).await
                        {
                            tracing::error!(pid = %summary.pid, error = %err, "failed to save product");
                        } else {
                            total_products += 1;
                        }
                    }
                    Err(err) => {
                        tracing::warn!(pid = %summary.pid, reason = %err, "skipping product");
                    }
                }

                tokio::time::sleep(self.config.product_interval).await;
            }

            if let Err(err) =
                jobs::update_progress(self.db.pool(), job.id, page_number as i32, total_products)
                    .await
            {
                tracing::error!(job_id = %job.id, error = %err, "failed to update progress");
            }

            if !has_next {
                tracing::info!(job_id = %job.id, last_page = page_number, "no more pages");
                break;
            }

            tokio::time::sleep(self.config.page_interval).await;
        }

        Ok(total_products)
    }

    /// Persist a complete product atomically: the product row, the
    /// job-product link and the `NEW_PRODUCT_DETECTED` outbox event commit
    /// or roll back together.
    async fn persist_product(
        &self,
        job_id: uuid::Uuid,
        product: &CompleteProduct,
        page_number: i32,
    ) -> Result<()> {
        let record = to_new_product(product);
        let payload = to_detected_payload(product);

        let mut tx = self.db.pool().begin().await?;
        products::upsert_product(&mut *tx, &record).await?;
        jobs::link_product(&mut *tx, job_id, product.pid.as_str(), page_number).await?;
        publisher::publish_new_product_detected(&mut *tx, payload).await?;
        tx.commit().await?;

        Ok(())
    }
}

/// Convert an extracted product into its store record, entering the
/// lifecycle as SCRAPED.
#[must_use]
pub fn to_new_product(product: &CompleteProduct) -> NewProduct {
    NewProduct {
        pid: product.pid.as_str().to_string(),
        title: product.title.clone(),
        brand: product.brand.clone(),
        detail_page_url: product.detail_page_url.clone(),
        category: product.category.clone(),
        image_urls: product.image_urls.clone(),
        features: product.features.clone(),
        current_price: product.current_price,
        currency: product.currency.clone(),
        rating: product.rating,
        review_count: product.review_count,
        available_sizes: product.available_sizes.clone(),
        size_table: Some(product.size_table.clone()),
        status: ProductStatus::Scraped,
    }
}

/// Build the full detection payload so consumers never re-scrape.
#[must_use]
pub fn to_detected_payload(product: &CompleteProduct) -> NewProductDetectedPayload {
    NewProductDetectedPayload {
        pid: product.pid.as_str().to_string(),
        title: product.title.clone(),
        brand: product.brand.clone(),
        detail_page_url: product.detail_page_url.clone(),
        category: product.category.clone(),
        price: match (product.current_price, product.currency.as_ref()) {
            (Some(amount), Some(currency)) => Some(Price {
                amount,
                currency: currency.clone(),
            }),
            _ => None,
        },
        rating: product.rating,
        review_count: product.review_count,
        images: product.image_urls.clone(),
        features: product.features.clone(),
        available_sizes: product.available_sizes.clone(),
        size_table: Some(product.size_table.clone()),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use longline_core::{ProductId, SizeTable};
    use std::collections::BTreeMap;

    fn complete_product() -> CompleteProduct {
        let mut measurements = BTreeMap::new();
        measurements.insert(
            "M".to_string(),
            BTreeMap::from([("length".to_string(), 72.0), ("chest".to_string(), 100.0)]),
        );

        CompleteProduct {
            pid: ProductId::new("B0000000AA").expect("valid pid"),
            title: "Longline T-Shirt".to_string(),
            brand: Some("Tallmark".to_string()),
            detail_page_url: "https://www.example.de/dp/B0000000AA".to_string(),
            category: Some("T-Shirts".to_string()),
            image_urls: vec!["https://img.example.com/1.jpg".to_string()],
            features: vec!["Extra lang".to_string()],
            current_price: Some(24.99),
            currency: Some("EUR".to_string()),
            rating: Some(4.4),
            review_count: Some(123),
            available_sizes: vec!["M".to_string()],
            size_table: SizeTable {
                sizes: vec!["M".to_string()],
                measurements,
                unit: "cm".to_string(),
            },
        }
    }

    #[test]
    fn test_new_product_enters_as_scraped() {
        let record = to_new_product(&complete_product());
        assert_eq!(record.status, ProductStatus::Scraped);
        assert_eq!(record.pid, "B0000000AA");
        assert!(record.size_table.expect("table").is_qualifying());
    }

    #[test]
    fn test_detected_payload_carries_full_product() {
        let payload = to_detected_payload(&complete_product());

        assert_eq!(payload.pid, "B0000000AA");
        assert_eq!(payload.title, "Longline T-Shirt");
        let price = payload.price.clone().expect("price present");
        assert_eq!(price.amount, 24.99);
        assert_eq!(price.currency, "EUR");
        assert_eq!(payload.images.len(), 1);
        assert!(payload.has_qualifying_table());

        // Defaults are applied at publish time
        let with_defaults = payload.with_defaults();
        assert_eq!(with_defaults.source, "scraper");
        assert!(with_defaults.event_id.is_some());
    }

    #[test]
    fn test_payload_price_requires_both_parts() {
        let mut product = complete_product();
        product.currency = None;
        let payload = to_detected_payload(&product);
        assert!(payload.price.is_none());
    }
}
