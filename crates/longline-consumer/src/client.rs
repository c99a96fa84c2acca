//! Size-chart extraction API client.

use crate::error::{ConsumerError, Result};
use longline_core::SizeTable;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Response of the size-chart extraction endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SizeChartResponse {
    pub size_chart_found: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_table: Option<SizeTable>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Serialize)]
struct SizeChartRequest<'a> {
    pid: &'a str,
}

/// Client for `POST /api/v1/scraper/size-chart` with linear-backoff retry.
#[derive(Clone)]
pub struct SizeChartClient {
    http: reqwest::Client,
    base_url: String,
    retries: u32,
}

impl SizeChartClient {
    /// Build a client against the scraper's base URL.
    pub fn new(base_url: impl Into<String>, retries: u32) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.into(),
            retries: retries.max(1),
        })
    }

    /// Fetch the size chart for a PID.
    ///
    /// Retries up to the configured attempt count with linear backoff
    /// (1 s after the first failure, 2 s after the second).
    pub async fn fetch(&self, pid: &str) -> Result<SizeChartResponse> {
        let url = format!("{}/api/v1/scraper/size-chart", self.base_url);
        let mut last_error = ConsumerError::SizeChartApi("no attempts made".to_string());

        for attempt in 0..self.retries {
            if attempt > 0 {
                tokio::time::sleep(Duration::from_secs(u64::from(attempt))).await;
            }

            let response = match self
                .http
                .post(&url)
                .json(&SizeChartRequest { pid })
                .send()
                .await
            {
                Ok(response) => response,
                Err(err) => {
                    tracing::warn!(pid, attempt = attempt + 1, error = %err, "size chart request failed");
                    last_error = ConsumerError::Http(err);
                    continue;
                }
            };

            if !response.status().is_success() {
                let status = response.status();
                tracing::warn!(pid, attempt = attempt + 1, %status, "size chart API returned error status");
                last_error =
                    ConsumerError::SizeChartApi(format!("API returned status {status}"));
                continue;
            }

            let parsed: SizeChartResponse = response.json().await?;
            tracing::info!(
                pid,
                found = parsed.size_chart_found,
                sizes = parsed.size_table.as_ref().map_or(0, |t| t.sizes.len()),
                "extracted dimensions"
            );
            return Ok(parsed);
        }

        Err(last_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_deserializes_with_table() {
        let json = r#"{
            "size_chart_found": true,
            "size_table": {
                "sizes": ["M"],
                "measurements": {"M": {"length": 72.0, "chest": 100.0}},
                "unit": "cm"
            }
        }"#;

        let response: SizeChartResponse = serde_json::from_str(json).expect("deserialize");
        assert!(response.size_chart_found);
        let table = response.size_table.expect("table present");
        assert!(table.has_length());
    }

    #[test]
    fn test_response_without_table() {
        let json = r#"{"size_chart_found": false, "error": "no size table found"}"#;
        let response: SizeChartResponse = serde_json::from_str(json).expect("deserialize");
        assert!(!response.size_chart_found);
        assert!(response.size_table.is_none());
        assert_eq!(response.error.as_deref(), Some("no size table found"));
    }
}
