//! Review extraction.
//!
//! Best-effort: reviews feed fit-scoring heuristics downstream but never
//! gate product status.

use crate::error::{Result, ScrapeError};
use longline_browser::{Navigator, PageHandle};
use longline_core::ProductId;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Reads up to ten reviews plus summary figures from the reviews section.
const REVIEWS_JS: &str = r#"(() => {
    const reviews = [];
    document.querySelectorAll('[data-hook="review"]').forEach(review => {
        const rating = review.querySelector('[data-hook="review-star-rating"]');
        const title = review.querySelector('[data-hook="review-title"]');
        const body = review.querySelector('[data-hook="review-body"]');
        const verified = review.querySelector('[data-hook="avp-badge"]');
        const date = review.querySelector('[data-hook="review-date"]');

        if (rating && body) {
            const text = body.textContent.trim();
            const lower = text.toLowerCase();
            reviews.push({
                rating: parseInt(rating.textContent.match(/\d/)?.[0] || '0'),
                title: title ? title.textContent.trim() : '',
                text: text,
                verified_buyer: !!verified,
                date: date ? date.textContent.trim() : '',
                mentions_size: lower.includes('größe') || lower.includes('size'),
                mentions_length: lower.includes('länge') || lower.includes('length')
            });
        }
    });

    const avg = document.querySelector('[data-hook="rating-out-of-text"]');
    const total = document.querySelector('[data-hook="cr-filter-info-review-rating-count"]');

    return {
        reviews: reviews.slice(0, 10),
        average_rating: avg
            ? parseFloat(avg.textContent.match(/[\d,]+/)?.[0].replace(',', '.') || '0')
            : 0,
        total_reviews: total ? parseInt(total.textContent.match(/\d+/)?.[0] || '0') : 0
    };
})()"#;

/// A single extracted review.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewInfo {
    pub rating: i32,
    pub title: String,
    pub text: String,
    pub verified_buyer: bool,
    pub date: String,
    pub mentions_size: bool,
    pub mentions_length: bool,
}

/// Extracted reviews plus summary figures.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReviewData {
    #[serde(default)]
    pub reviews: Vec<ReviewInfo>,
    #[serde(default)]
    pub average_rating: f64,
    #[serde(default)]
    pub total_reviews: i32,
}

/// Extract reviews from a product page.
pub async fn extract_reviews(
    navigator: &Navigator,
    page: &dyn PageHandle,
    pid: Option<&ProductId>,
    url: Option<&str>,
    base_url: &str,
    nav_retries: u32,
) -> Result<ReviewData> {
    let url = match (url, pid) {
        (Some(url), _) => url.to_string(),
        (None, Some(pid)) => format!("{base_url}/dp/{}", pid.as_str()),
        (None, None) => {
            return Err(ScrapeError::Parse(
                "either a PID or a URL is required".to_string(),
            ))
        }
    };

    navigator.navigate(page, &url, nav_retries).await?;

    // Jump to the full reviews list when the link exists
    if page
        .click_selector(r#"a[data-hook="see-all-reviews-link-foot"]"#)
        .await
        .unwrap_or(false)
    {
        tokio::time::sleep(Duration::from_secs(2)).await;
    }

    let value = page.eval_json(REVIEWS_JS).await.map_err(ScrapeError::from)?;
    let data: ReviewData = serde_json::from_value(value)
        .map_err(|e| ScrapeError::Parse(format!("review payload: {e}")))?;

    tracing::info!(
        url = %url,
        count = data.reviews.len(),
        avg_rating = data.average_rating,
        total = data.total_reviews,
        "extracted reviews"
    );

    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_review_payload_deserializes() {
        let value = serde_json::json!({
            "reviews": [{
                "rating": 5,
                "title": "Endlich lang genug",
                "text": "Die Länge ist perfekt für 2m Körpergröße.",
                "verified_buyer": true,
                "date": "am 3. Mai 2025",
                "mentions_size": false,
                "mentions_length": true
            }],
            "average_rating": 4.6,
            "total_reviews": 211
        });

        let data: ReviewData = serde_json::from_value(value).expect("deserialize");
        assert_eq!(data.reviews.len(), 1);
        assert!(data.reviews[0].mentions_length);
        assert_eq!(data.average_rating, 4.6);
        assert_eq!(data.total_reviews, 211);
    }

    #[test]
    fn test_empty_review_payload() {
        let data: ReviewData = serde_json::from_value(serde_json::json!({})).expect("deserialize");
        assert!(data.reviews.is_empty());
        assert_eq!(data.total_reviews, 0);
    }
}
