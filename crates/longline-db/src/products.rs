//! Product row operations.
//!
//! The worker upserts complete products at scrape time; the lifecycle
//! consumer creates placeholder rows for unknown PIDs and later commits the
//! enrichment result. All functions take a `PgExecutor` so they run equally
//! against the pool or inside an open transaction.

use crate::error::{DatabaseError, Result};
use chrono::{DateTime, Utc};
use longline_core::{ProductStatus, SizeTable};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::PgExecutor;

/// A product row as stored in the `products` table.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ProductRecord {
    /// Marketplace product identifier (primary key)
    pub pid: String,
    /// Product title
    pub title: String,
    /// Brand, if known
    pub brand: Option<String>,
    /// Detail page URL
    pub detail_page_url: String,
    /// Deepest breadcrumb category
    pub category: Option<String>,
    /// Ordered image URLs (JSON array)
    pub image_urls: Option<JsonValue>,
    /// Ordered feature strings (JSON array)
    pub features: Option<JsonValue>,
    /// Current price in `currency`
    pub current_price: Option<f64>,
    /// ISO currency code
    pub currency: Option<String>,
    /// Numeric rating
    pub rating: Option<f64>,
    /// Review count
    pub review_count: Option<i32>,
    /// Available size labels (JSON array)
    pub available_sizes: Option<JsonValue>,
    /// Normalized size table (JSON object)
    pub size_table: Option<JsonValue>,
    /// Lifecycle status string
    pub status: String,
    /// Row creation time
    pub created_at: DateTime<Utc>,
    /// Last mutation time
    pub updated_at: DateTime<Utc>,
    /// Last successful scrape/enrichment time
    pub scraped_at: Option<DateTime<Utc>>,
}

impl ProductRecord {
    /// Lifecycle status as an enum.
    #[must_use]
    pub fn product_status(&self) -> ProductStatus {
        ProductStatus::parse(&self.status)
    }

    /// Decode the stored size table, if any.
    pub fn parsed_size_table(&self) -> Result<Option<SizeTable>> {
        match &self.size_table {
            Some(json) => Ok(Some(serde_json::from_value(json.clone())?)),
            None => Ok(None),
        }
    }
}

/// A complete product as produced by the extractor, ready for upsert.
#[derive(Debug, Clone)]
pub struct NewProduct {
    /// Marketplace product identifier
    pub pid: String,
    /// Product title
    pub title: String,
    /// Brand, if found
    pub brand: Option<String>,
    /// Detail page URL
    pub detail_page_url: String,
    /// Deepest breadcrumb category
    pub category: Option<String>,
    /// Ordered image URLs
    pub image_urls: Vec<String>,
    /// Ordered feature strings
    pub features: Vec<String>,
    /// Current price
    pub current_price: Option<f64>,
    /// ISO currency code
    pub currency: Option<String>,
    /// Numeric rating
    pub rating: Option<f64>,
    /// Review count
    pub review_count: Option<i32>,
    /// Available size labels
    pub available_sizes: Vec<String>,
    /// Normalized size table
    pub size_table: Option<SizeTable>,
    /// Status to persist with
    pub status: ProductStatus,
}

/// Upsert a complete product keyed on PID.
///
/// Existing rows are fully refreshed; `created_at` is preserved and
/// `updated_at`/`scraped_at` advance to now.
pub async fn upsert_product<'e>(exec: impl PgExecutor<'e>, product: &NewProduct) -> Result<()> {
    let size_table = product
        .size_table
        .as_ref()
        .map(serde_json::to_value)
        .transpose()?;

    sqlx::query(
        "INSERT INTO products (
            pid, title, brand, detail_page_url, category,
            image_urls, features, current_price, currency,
            rating, review_count, available_sizes, size_table,
            status, scraped_at
         ) VALUES (
            $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, now()
         )
         ON CONFLICT (pid) DO UPDATE SET
            title = EXCLUDED.title,
            brand = EXCLUDED.brand,
            detail_page_url = EXCLUDED.detail_page_url,
            category = EXCLUDED.category,
            image_urls = EXCLUDED.image_urls,
            features = EXCLUDED.features,
            current_price = EXCLUDED.current_price,
            currency = EXCLUDED.currency,
            rating = EXCLUDED.rating,
            review_count = EXCLUDED.review_count,
            available_sizes = EXCLUDED.available_sizes,
            size_table = EXCLUDED.size_table,
            status = EXCLUDED.status,
            scraped_at = now(),
            updated_at = now()",
    )
    .bind(&product.pid)
    .bind(&product.title)
    .bind(&product.brand)
    .bind(&product.detail_page_url)
    .bind(&product.category)
    .bind(serde_json::to_value(&product.image_urls)?)
    .bind(serde_json::to_value(&product.features)?)
    .bind(product.current_price)
    .bind(&product.currency)
    .bind(product.rating)
    .bind(product.review_count)
    .bind(serde_json::to_value(&product.available_sizes)?)
    .bind(size_table)
    .bind(product.status.as_str())
    .execute(exec)
    .await?;

    Ok(())
}

/// Ensure a row exists for `pid`, inserting a PENDING placeholder if absent.
///
/// Never overwrites an existing row.
pub async fn ensure_product<'e>(
    exec: impl PgExecutor<'e>,
    pid: &str,
    title: &str,
    detail_page_url: &str,
    brand: Option<&str>,
) -> Result<()> {
    sqlx::query(
        "INSERT INTO products (pid, title, detail_page_url, brand, status)
         VALUES ($1, $2, $3, $4, 'PENDING')
         ON CONFLICT (pid) DO NOTHING",
    )
    .bind(pid)
    .bind(title)
    .bind(detail_page_url)
    .bind(brand)
    .execute(exec)
    .await?;

    Ok(())
}

/// Fetch a product by PID.
pub async fn get_product<'e>(exec: impl PgExecutor<'e>, pid: &str) -> Result<Option<ProductRecord>> {
    let record = sqlx::query_as::<_, ProductRecord>("SELECT * FROM products WHERE pid = $1")
        .bind(pid)
        .fetch_optional(exec)
        .await?;

    Ok(record)
}

/// Fetch just the lifecycle status of a product.
pub async fn get_status<'e>(exec: impl PgExecutor<'e>, pid: &str) -> Result<Option<ProductStatus>> {
    let status: Option<String> = sqlx::query_scalar("SELECT status FROM products WHERE pid = $1")
        .bind(pid)
        .fetch_optional(exec)
        .await?;

    Ok(status.map(|s| ProductStatus::parse(&s)))
}

/// Update lifecycle status only.
pub async fn update_status<'e>(
    exec: impl PgExecutor<'e>,
    pid: &str,
    status: ProductStatus,
) -> Result<()> {
    let result = sqlx::query(
        "UPDATE products SET status = $2, updated_at = now() WHERE pid = $1",
    )
    .bind(pid)
    .bind(status.as_str())
    .execute(exec)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::NotFound(format!("product {pid}")));
    }
    Ok(())
}

/// Commit an enrichment result: size table, status and scrape timestamp.
///
/// This is the consumer's commit point.
pub async fn update_size_table_status<'e>(
    exec: impl PgExecutor<'e>,
    pid: &str,
    size_table: Option<&SizeTable>,
    status: ProductStatus,
) -> Result<()> {
    let size_table = size_table.map(serde_json::to_value).transpose()?;

    let result = sqlx::query(
        "UPDATE products
         SET size_table = $2, status = $3, scraped_at = now(), updated_at = now()
         WHERE pid = $1",
    )
    .bind(pid)
    .bind(size_table)
    .bind(status.as_str())
    .execute(exec)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::NotFound(format!("product {pid}")));
    }
    Ok(())
}

/// List products in PENDING state, oldest first.
pub async fn list_pending<'e>(exec: impl PgExecutor<'e>, limit: i64) -> Result<Vec<ProductRecord>> {
    let records = sqlx::query_as::<_, ProductRecord>(
        "SELECT * FROM products WHERE status = 'PENDING' ORDER BY created_at ASC LIMIT $1",
    )
    .bind(limit)
    .fetch_all(exec)
    .await?;

    Ok(records)
}

/// Count products grouped by lifecycle status.
pub async fn count_by_status<'e>(exec: impl PgExecutor<'e>) -> Result<Vec<(String, i64)>> {
    let rows = sqlx::query_as::<_, (String, i64)>(
        "SELECT status, COUNT(*) FROM products GROUP BY status ORDER BY status",
    )
    .fetch_all(exec)
    .await?;

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::Database;
    use sqlx::PgPool;
    use std::collections::BTreeMap;

    async fn test_database() -> Database {
        let url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "postgres://postgres@localhost:5432/longline_test".to_string());
        let pool = PgPool::connect(&url).await.expect("connect to test db");
        let db = Database::from_pool(pool);
        db.run_migrations().await.expect("run migrations");
        db
    }

    fn sample_table() -> SizeTable {
        let mut measurements = BTreeMap::new();
        measurements.insert(
            "M".to_string(),
            BTreeMap::from([("length".to_string(), 72.0), ("chest".to_string(), 100.0)]),
        );
        SizeTable {
            sizes: vec!["M".to_string()],
            measurements,
            unit: "cm".to_string(),
        }
    }

    fn sample_product(pid: &str) -> NewProduct {
        NewProduct {
            pid: pid.to_string(),
            title: "Longline T-Shirt".to_string(),
            brand: Some("Tallmark".to_string()),
            detail_page_url: format!("https://example.com/dp/{pid}"),
            category: Some("T-Shirts".to_string()),
            image_urls: vec!["https://example.com/img/1.jpg".to_string()],
            features: vec!["Extra lang geschnitten".to_string()],
            current_price: Some(29.99),
            currency: Some("EUR".to_string()),
            rating: Some(4.4),
            review_count: Some(123),
            available_sizes: vec!["M".to_string(), "L".to_string()],
            size_table: Some(sample_table()),
            status: ProductStatus::Scraped,
        }
    }

    #[tokio::test]
    #[ignore = "requires a running PostgreSQL"]
    async fn test_upsert_is_idempotent_on_pid() {
        let db = test_database().await;
        let product = sample_product("PRDUPSRT01");

        upsert_product(db.pool(), &product).await.expect("first upsert");
        upsert_product(db.pool(), &product).await.expect("second upsert");

        let record = get_product(db.pool(), "PRDUPSRT01")
            .await
            .expect("fetch")
            .expect("row exists");
        assert_eq!(record.product_status(), ProductStatus::Scraped);
        assert_eq!(record.title, "Longline T-Shirt");

        let table = record
            .parsed_size_table()
            .expect("decode size table")
            .expect("table present");
        assert!(table.is_qualifying());
    }

    #[tokio::test]
    #[ignore = "requires a running PostgreSQL"]
    async fn test_ensure_product_never_overwrites() {
        let db = test_database().await;
        upsert_product(db.pool(), &sample_product("PRDENSUR01"))
            .await
            .expect("upsert");

        ensure_product(
            db.pool(),
            "PRDENSUR01",
            "Some Other Title",
            "https://example.com/other",
            None,
        )
        .await
        .expect("ensure");

        let record = get_product(db.pool(), "PRDENSUR01")
            .await
            .expect("fetch")
            .expect("row exists");
        assert_eq!(record.title, "Longline T-Shirt");
        assert_eq!(record.product_status(), ProductStatus::Scraped);
    }

    #[tokio::test]
    #[ignore = "requires a running PostgreSQL"]
    async fn test_enrichment_commit_point() {
        let db = test_database().await;
        ensure_product(
            db.pool(),
            "PRDENRCH01",
            "Pending Product",
            "https://example.com/dp/PRDENRCH01",
            None,
        )
        .await
        .expect("ensure");

        let table = sample_table();
        update_size_table_status(db.pool(), "PRDENRCH01", Some(&table), ProductStatus::Active)
            .await
            .expect("commit enrichment");

        let record = get_product(db.pool(), "PRDENRCH01")
            .await
            .expect("fetch")
            .expect("row exists");
        assert_eq!(record.product_status(), ProductStatus::Active);
        assert!(record.scraped_at.is_some());
    }

    #[tokio::test]
    #[ignore = "requires a running PostgreSQL"]
    async fn test_update_status_missing_product() {
        let db = test_database().await;
        let err = update_status(db.pool(), "NOSUCHPID0", ProductStatus::Failed)
            .await
            .expect_err("missing product must error");
        assert!(matches!(err, DatabaseError::NotFound(_)));
    }
}
