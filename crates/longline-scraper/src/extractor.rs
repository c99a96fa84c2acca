//! Product extractor.
//!
//! Drives a product page end to end: navigation, humanization, field
//! extraction from the page HTML, and the size-chart modal flow that
//! produces the normalized size table. A missing or non-qualifying table
//! fails the extraction; missing non-critical fields are simply absent.

use crate::error::{Result, ScrapeError};
use crate::fields::{parse_product_fields, ProductFields};
use longline_browser::{Navigator, PageHandle};
use longline_core::{ProductId, SizeTable};
use longline_parser::{parse_table, TablePayload};
use std::time::Duration;

/// Visible-text terms that identify the size-chart trigger element.
const SIZE_CHART_TERMS: [&str; 3] = ["Größentabelle", "Size Chart", "Größenratgeber"];

/// Grace period for the modal to render after the trigger click.
const MODAL_GRACE: Duration = Duration::from_secs(3);

/// Reads the first table under the modal/popover container into the
/// layout-agnostic `{headers, rows}` payload.
const TABLE_PAYLOAD_JS: &str = r"(() => {
    const tables = document.querySelectorAll(
        '.a-popover-content table, .a-modal-content table, [id*=popover] table');
    if (tables.length === 0) return null;

    const table = tables[0];
    const data = { headers: [], rows: [] };
    for (let i = 0; i < table.rows.length; i++) {
        const row = table.rows[i];
        const cells = [];
        for (let j = 0; j < row.cells.length; j++) {
            cells.push(row.cells[j].textContent.trim());
        }
        if (i === 0) {
            data.headers = cells;
        } else {
            data.rows.push(cells);
        }
    }
    return data;
})()";

/// A product with all extracted data, ready for persistence.
#[derive(Debug, Clone)]
pub struct CompleteProduct {
    pub pid: ProductId,
    pub title: String,
    pub brand: Option<String>,
    pub detail_page_url: String,
    pub category: Option<String>,
    pub image_urls: Vec<String>,
    pub features: Vec<String>,
    pub current_price: Option<f64>,
    pub currency: Option<String>,
    pub rating: Option<f64>,
    pub review_count: Option<i32>,
    pub available_sizes: Vec<String>,
    pub size_table: SizeTable,
}

/// Extracts complete product data from product pages.
pub struct ProductExtractor {
    navigator: Navigator,
    base_url: String,
    nav_retries: u32,
}

impl ProductExtractor {
    #[must_use]
    pub fn new(navigator: Navigator, base_url: impl Into<String>, nav_retries: u32) -> Self {
        Self {
            navigator,
            base_url: base_url.into(),
            nav_retries,
        }
    }

    /// Detail-page URL for a PID.
    #[must_use]
    pub fn product_url(&self, pid: &ProductId) -> String {
        format!("{}/dp/{}", self.base_url, pid.as_str())
    }

    /// Extract a complete product including its qualifying size table.
    ///
    /// Fails with [`ScrapeError::NoSizeTable`] when the size-chart modal
    /// cannot be opened and [`ScrapeError::NoQualifyingTable`] when the
    /// parsed table lacks the required length/chest pair.
    pub async fn extract_complete(
        &self,
        page: &dyn PageHandle,
        pid: &ProductId,
        url: Option<&str>,
    ) -> Result<CompleteProduct> {
        let url = url
            .map(ToString::to_string)
            .unwrap_or_else(|| self.product_url(pid));

        tracing::info!(pid = %pid, url = %url, "extracting complete product");

        self.navigator
            .navigate(page, &url, self.nav_retries)
            .await?;
        self.navigator.humanize(page).await;

        let content = page.content().await.map_err(ScrapeError::from)?;
        let fields = parse_product_fields(&content);

        let Some(payload) = self.open_size_table(page).await? else {
            return Err(ScrapeError::NoSizeTable(pid.to_string()));
        };

        let size_table = parse_table(&payload);
        if !size_table.is_qualifying() {
            return Err(ScrapeError::NoQualifyingTable(pid.to_string()));
        }

        tracing::info!(
            pid = %pid,
            sizes = size_table.sizes.len(),
            has_images = !fields.image_urls.is_empty(),
            has_price = fields.current_price.is_some(),
            "extracted complete product"
        );

        Ok(assemble(pid.clone(), url, fields, size_table))
    }

    /// One-shot size-chart extraction for the boundary API.
    ///
    /// Returns `Ok(None)` when the page has no size-chart modal; the parsed
    /// table is returned even when it is not qualifying, callers decide.
    pub async fn extract_size_chart(
        &self,
        page: &dyn PageHandle,
        pid: Option<&ProductId>,
        url: Option<&str>,
    ) -> Result<Option<SizeTable>> {
        let url = match (url, pid) {
            (Some(url), _) => url.to_string(),
            (None, Some(pid)) => self.product_url(pid),
            (None, None) => {
                return Err(ScrapeError::Parse(
                    "either a PID or a URL is required".to_string(),
                ))
            }
        };

        self.navigator
            .navigate(page, &url, self.nav_retries)
            .await?;
        self.navigator.humanize(page).await;

        let Some(payload) = self.open_size_table(page).await? else {
            return Ok(None);
        };

        let table = parse_table(&payload);
        if table.is_empty() {
            return Ok(None);
        }
        Ok(Some(table))
    }

    /// Open the size-table modal and interrogate it for the table payload.
    ///
    /// Locates a clickable element by its visible size-chart text, clicks
    /// it, waits the grace period, then reads the first table under the
    /// modal container. Returns `None` when no trigger or no table exists.
    async fn open_size_table(&self, page: &dyn PageHandle) -> Result<Option<TablePayload>> {
        let clicked = page
            .click_text(&SIZE_CHART_TERMS)
            .await
            .map_err(ScrapeError::from)?;
        if !clicked {
            tracing::debug!("size chart trigger not found");
            return Ok(None);
        }

        tokio::time::sleep(MODAL_GRACE).await;

        let value = page
            .eval_json(TABLE_PAYLOAD_JS)
            .await
            .map_err(ScrapeError::from)?;
        if value.is_null() {
            tracing::debug!("modal opened but no table found");
            return Ok(None);
        }

        let payload: TablePayload = serde_json::from_value(value)
            .map_err(|e| ScrapeError::Parse(format!("table payload: {e}")))?;
        Ok(Some(payload))
    }
}

fn assemble(
    pid: ProductId,
    url: String,
    fields: ProductFields,
    size_table: SizeTable,
) -> CompleteProduct {
    CompleteProduct {
        pid,
        title: fields.title.unwrap_or_default(),
        brand: fields.brand,
        detail_page_url: url,
        category: fields.category,
        image_urls: fields.image_urls,
        features: fields.features,
        current_price: fields.current_price,
        currency: fields.currency,
        rating: fields.rating,
        review_count: fields.review_count,
        available_sizes: fields.available_sizes,
        size_table,
    }
}
