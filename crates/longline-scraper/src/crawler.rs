//! Category crawler.
//!
//! Walks search-result pagination page by page and emits product
//! identities in DOM order. Duplicates within a crawl are permitted; the
//! store's unique constraints deduplicate.

use crate::error::{Result, ScrapeError};
use longline_browser::{Navigator, PageHandle};
use longline_core::ProductId;
use scraper::{Html, Selector};
use std::sync::OnceLock;

/// A product identity found on a search-result page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductSummary {
    pub pid: ProductId,
    pub title: String,
    pub brand: Option<String>,
    pub url: String,
}

/// Crawls one search-result page at a time.
pub struct CategoryCrawler {
    navigator: Navigator,
    base_url: String,
    nav_retries: u32,
}

impl CategoryCrawler {
    #[must_use]
    pub fn new(navigator: Navigator, base_url: impl Into<String>, nav_retries: u32) -> Self {
        Self {
            navigator,
            base_url: base_url.into(),
            nav_retries,
        }
    }

    /// Build the search URL for a query with an optional category filter.
    #[must_use]
    pub fn search_url(&self, query: &str, category: Option<&str>) -> String {
        let mut url = format!("{}/s?k={}", self.base_url, urlencode(query));
        if let Some(category) = category {
            url.push_str("&i=");
            url.push_str(&urlencode(category));
        }
        url
    }

    /// Crawl a single page of search results.
    ///
    /// Returns the products found plus whether a next page exists. Page 1
    /// first warms up on the site root so the bot wall is absorbed before
    /// the search URL.
    pub async fn crawl_page(
        &self,
        page: &dyn PageHandle,
        search_url: &str,
        page_number: u32,
    ) -> Result<(Vec<ProductSummary>, bool)> {
        let url = if page_number > 1 {
            with_page_param(search_url, page_number)?
        } else {
            search_url.to_string()
        };

        tracing::info!(url = %url, page = page_number, "crawling page");

        if page_number == 1 {
            if let Err(err) = self.navigator.navigate(page, &self.base_url, 1).await {
                tracing::warn!(error = %err, "warm-up navigation failed");
            }
        }

        self.navigator
            .navigate(page, &url, self.nav_retries)
            .await?;

        let content = page.content().await.map_err(ScrapeError::from)?;
        let products = parse_product_cards(&content, &self.base_url);
        let has_next = has_next_page(&content);

        tracing::info!(
            count = products.len(),
            has_next,
            page = page_number,
            "extracted products"
        );

        Ok((products, has_next))
    }
}

fn urlencode(s: &str) -> String {
    url::form_urlencoded::byte_serialize(s.as_bytes()).collect()
}

/// Append or replace the `page` query parameter from page 2 onward.
pub fn with_page_param(search_url: &str, page_number: u32) -> Result<String> {
    let mut url = url::Url::parse(search_url)
        .map_err(|e| ScrapeError::Parse(format!("invalid search URL: {e}")))?;

    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(name, _)| name != "page")
        .map(|(name, value)| (name.into_owned(), value.into_owned()))
        .collect();

    {
        let mut pairs = url.query_pairs_mut();
        pairs.clear();
        for (name, value) in &kept {
            pairs.append_pair(name, value);
        }
        pairs.append_pair("page", &page_number.to_string());
    }

    Ok(url.to_string())
}

/// Enumerate search-result cards in DOM order.
///
/// Cards without a PID attribute are skipped; PIDs failing validation are
/// logged and skipped.
#[must_use]
pub fn parse_product_cards(html: &str, base_url: &str) -> Vec<ProductSummary> {
    static CARD: OnceLock<Selector> = OnceLock::new();
    static TITLE: OnceLock<Selector> = OnceLock::new();
    static BRAND: OnceLock<Selector> = OnceLock::new();

    let card_selector = CARD.get_or_init(|| {
        Selector::parse(r#"[data-component-type="s-search-result"]"#).expect("valid selector")
    });
    let title_selector =
        TITLE.get_or_init(|| Selector::parse("h2 a span, h2 span").expect("valid selector"));
    let brand_selector = BRAND
        .get_or_init(|| Selector::parse("span.s-size-override-12").expect("valid selector"));

    let document = Html::parse_document(html);
    let mut products = Vec::new();

    for card in document.select(card_selector) {
        let Some(raw_pid) = card.value().attr("data-asin") else {
            continue;
        };
        let pid = match ProductId::new(raw_pid) {
            Ok(pid) => pid,
            Err(err) => {
                tracing::debug!(pid = raw_pid, error = %err, "skipping card with invalid PID");
                continue;
            }
        };

        let title = card
            .select(title_selector)
            .next()
            .map(|el| el.text().collect::<String>().trim().to_string())
            .unwrap_or_default();
        if title.is_empty() {
            continue;
        }

        let brand = card
            .select(brand_selector)
            .next()
            .map(|el| el.text().collect::<String>().trim().to_string())
            .filter(|s| !s.is_empty());

        let url = format!("{}/dp/{}", base_url, pid.as_str());
        products.push(ProductSummary {
            pid,
            title,
            brand,
            url,
        });
    }

    products
}

/// True if a pagination-next element is present and not marked disabled.
#[must_use]
pub fn has_next_page(html: &str) -> bool {
    static NEXT: OnceLock<Selector> = OnceLock::new();
    let selector = NEXT.get_or_init(|| {
        Selector::parse(".s-pagination-next:not(.s-pagination-disabled)").expect("valid selector")
    });

    Html::parse_document(html).select(selector).next().is_some()
}
