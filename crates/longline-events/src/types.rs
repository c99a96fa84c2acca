//! Event types, payloads and the stream envelope.

use chrono::{DateTime, Utc};
use longline_core::SizeTable;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

/// Published by the worker when a product with a qualifying size table is
/// persisted.
pub const EVENT_NEW_PRODUCT_DETECTED: &str = "NEW_PRODUCT_DETECTED";
/// Legacy synonym for [`EVENT_NEW_PRODUCT_DETECTED`] still present on old
/// stream entries.
pub const EVENT_PRODUCT_DETECTED_V1: &str = "01_PRODUCT_DETECTED";
/// Legacy validated-product event consumed by earlier pipeline generations.
pub const EVENT_PRODUCT_VALIDATED: &str = "02A_PRODUCT_VALIDATED";
/// Published by the lifecycle consumer once a product has length data.
pub const EVENT_PRODUCT_CREATED: &str = "PRODUCT_CREATED";

/// True if `event_type` announces a detected product the lifecycle consumer
/// should enrich. The legacy names are accepted so old streams replay
/// cleanly; new producers emit only [`EVENT_NEW_PRODUCT_DETECTED`].
#[must_use]
pub fn is_product_detection_event(event_type: &str) -> bool {
    matches!(
        event_type,
        EVENT_NEW_PRODUCT_DETECTED | EVENT_PRODUCT_DETECTED_V1 | EVENT_PRODUCT_VALIDATED
    )
}

/// Product pricing information.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Price {
    pub amount: f64,
    pub currency: String,
}

/// Payload of a `NEW_PRODUCT_DETECTED` event.
///
/// Carries the complete scrape result so downstream consumers never need to
/// re-scrape for enrichment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewProductDetectedPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    pub pid: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    pub detail_page_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<Price>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review_count: Option<i32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub features: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub available_sizes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_table: Option<SizeTable>,
    /// Producing system, `"scraper"` for this pipeline
    #[serde(default)]
    pub source: String,
}

impl NewProductDetectedPayload {
    /// Fill event metadata defaults: id, type, timestamp and source.
    pub fn with_defaults(mut self) -> Self {
        if self.event_id.is_none() {
            self.event_id = Some(Uuid::new_v4().to_string());
        }
        if self.event_type.is_none() {
            self.event_type = Some(EVENT_NEW_PRODUCT_DETECTED.to_string());
        }
        if self.timestamp.is_none() {
            self.timestamp = Some(Utc::now());
        }
        if self.source.is_empty() {
            self.source = "scraper".to_string();
        }
        self
    }

    /// True if the payload carries a qualifying size table.
    #[must_use]
    pub fn has_qualifying_table(&self) -> bool {
        self.size_table.as_ref().is_some_and(SizeTable::is_qualifying)
    }
}

/// Payload of a `PRODUCT_CREATED` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductCreatedPayload {
    pub event_id: String,
    pub event_type: String,
    pub timestamp: DateTime<Utc>,
    pub pid: String,
    pub title: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_table: Option<SizeTable>,
    /// Simple fit score; 3.0 when length data is present
    pub quality_score: f64,
}

/// Delivery metadata attached to every stream entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventMetadata {
    /// Producing system
    pub source: String,
    /// Outbox row the entry was relayed from
    pub outbox_id: String,
    /// Delivery attempts at publish time
    pub retry_count: i32,
    /// Stream the event was addressed to
    pub target_stream: String,
}

/// The full event envelope carried in a stream entry's `data` field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Outbox event id; doubles as the stream entry's `original_id`
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub aggregate_type: String,
    pub aggregate_id: String,
    pub timestamp: DateTime<Utc>,
    pub payload: JsonValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<EventMetadata>,
}
