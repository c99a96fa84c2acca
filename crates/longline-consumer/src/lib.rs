//! Product lifecycle consumer.
//!
//! Reads detection events from the stream bus in a consumer-group
//! discipline, drives the size-chart extraction API, commits the
//! enrichment result to the product store and republishes a
//! `PRODUCT_CREATED` event through the outbox. Idempotent on PID: only
//! products still in a pre-active state (PENDING or SCRAPED) are enriched;
//! anything already ACTIVE, REJECTED or FAILED is skipped, so redeliveries
//! are harmless.

pub mod client;
pub mod consumer;
pub mod error;

pub use client::{SizeChartClient, SizeChartResponse};
pub use consumer::{is_enrichable, ConsumerConfig, LifecycleConsumer};
pub use error::{ConsumerError, Result};
