//! Outbox relay.
//!
//! Drains eligible outbox rows onto the stream bus. Each stream entry
//! carries the full JSON envelope in its `data` field plus duplicated
//! scalar fields for consumer-side indexing. Per-event failures never
//! abort the batch; outcomes are recorded on the row so retry state
//! survives crashes.

use crate::error::Result;
use crate::stream::StreamBus;
use crate::types::{EventEnvelope, EventMetadata};
use longline_db::{outbox, Database, OutboxEventRecord};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Relay configuration.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Poll interval between batches
    pub poll_interval: Duration,
    /// Maximum events fetched per tick
    pub batch_size: i64,
    /// Retries before an event moves to dead letter
    pub max_retries: i32,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            batch_size: 100,
            max_retries: 5,
        }
    }
}

/// Background task that publishes outbox events to the stream bus.
pub struct Relay {
    db: Database,
    bus: StreamBus,
    config: RelayConfig,
}

impl Relay {
    /// Create a new relay.
    #[must_use]
    pub fn new(db: Database, bus: StreamBus, config: RelayConfig) -> Self {
        Self { db, bus, config }
    }

    /// Run until cancelled. Processes one batch immediately, then on every
    /// tick. Errors are logged; the loop never exits on its own.
    pub async fn run(&self, cancel: CancellationToken) {
        tracing::info!(
            interval_s = self.config.poll_interval.as_secs(),
            batch_size = self.config.batch_size,
            "relay started"
        );

        if let Err(err) = self.process_batch().await {
            tracing::error!(error = %err, "relay startup batch failed");
        }

        let mut ticker = tokio::time::interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // The first tick completes immediately; consume it so the startup
        // batch is not doubled.
        ticker.tick().await;

        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    tracing::info!("relay stopped");
                    return;
                }
                _ = ticker.tick() => {
                    if let Err(err) = self.process_batch().await {
                        tracing::error!(error = %err, "relay batch failed");
                    }
                }
            }
        }
    }

    /// Fetch and publish one batch of eligible events.
    pub async fn process_batch(&self) -> Result<usize> {
        let events = outbox::get_pending(self.db.pool(), self.config.batch_size).await?;
        if events.is_empty() {
            return Ok(0);
        }

        tracing::debug!(count = events.len(), "processing outbox batch");

        let mut delivered = 0;
        for event in events {
            match self.publish_event(&event).await {
                Ok(()) => {
                    outbox::mark_processed(self.db.pool(), event.id).await?;
                    delivered += 1;
                    tracing::info!(
                        event_id = %event.id,
                        event_type = %event.event_type,
                        aggregate_id = %event.aggregate_id,
                        target_stream = %event.target_stream,
                        "event delivered"
                    );
                }
                Err(err) => {
                    let status = outbox::mark_failed(
                        self.db.pool(),
                        event.id,
                        &err.to_string(),
                        self.config.max_retries,
                    )
                    .await?;
                    tracing::warn!(
                        event_id = %event.id,
                        aggregate_id = %event.aggregate_id,
                        status = %status,
                        error = %err,
                        "event delivery failed"
                    );
                }
            }
        }

        Ok(delivered)
    }

    async fn publish_event(&self, event: &OutboxEventRecord) -> Result<()> {
        let fields = build_stream_entry(event)?;
        self.bus.publish(&event.target_stream, &fields).await?;
        Ok(())
    }

    /// Events awaiting delivery, for health reporting.
    pub async fn pending_count(&self) -> Result<i64> {
        Ok(outbox::pending_count(self.db.pool()).await?)
    }

    /// Events parked in dead letter, for health reporting.
    pub async fn dead_letter_count(&self) -> Result<i64> {
        Ok(outbox::dead_letter_count(self.db.pool()).await?)
    }
}

/// Compose the stream entry for an outbox event.
///
/// The `data` field holds the JSON envelope; `type`, `timestamp` (ns),
/// `original_id`, `aggregate_id`, `aggregate_type` and `event_type` are
/// duplicated as plain fields so consumers can filter without decoding.
pub fn build_stream_entry(event: &OutboxEventRecord) -> Result<Vec<(String, String)>> {
    let envelope = EventEnvelope {
        id: event.id.to_string(),
        event_type: event.event_type.clone(),
        aggregate_type: event.aggregate_type.clone(),
        aggregate_id: event.aggregate_id.clone(),
        timestamp: event.created_at,
        payload: event.payload.clone(),
        metadata: Some(EventMetadata {
            source: "scraper".to_string(),
            outbox_id: event.id.to_string(),
            retry_count: event.retry_count,
            target_stream: event.target_stream.clone(),
        }),
    };

    let data = serde_json::to_string(&envelope)?;
    let timestamp_ns = event
        .created_at
        .timestamp_nanos_opt()
        .unwrap_or_default()
        .to_string();

    Ok(vec![
        ("data".to_string(), data),
        ("type".to_string(), event.event_type.clone()),
        ("timestamp".to_string(), timestamp_ns),
        ("original_id".to_string(), event.id.to_string()),
        ("aggregate_id".to_string(), event.aggregate_id.clone()),
        ("aggregate_type".to_string(), event.aggregate_type.clone()),
        ("event_type".to_string(), event.event_type.clone()),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn sample_record() -> OutboxEventRecord {
        OutboxEventRecord {
            id: Uuid::new_v4(),
            aggregate_type: "product".to_string(),
            aggregate_id: "B0000000AA".to_string(),
            event_type: "NEW_PRODUCT_DETECTED".to_string(),
            payload: serde_json::json!({"pid": "B0000000AA", "title": "Longline T-Shirt"}),
            target_stream: "stream:product_lifecycle".to_string(),
            status: "pending".to_string(),
            retry_count: 2,
            error_message: None,
            created_at: Utc::now(),
            processed_at: None,
            next_retry_at: Utc::now(),
        }
    }

    #[test]
    fn test_stream_entry_composition() {
        let record = sample_record();
        let fields = build_stream_entry(&record).expect("build entry");

        let get = |name: &str| {
            fields
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.as_str())
                .expect("field present")
        };

        assert_eq!(get("type"), "NEW_PRODUCT_DETECTED");
        assert_eq!(get("event_type"), "NEW_PRODUCT_DETECTED");
        assert_eq!(get("original_id"), record.id.to_string());
        assert_eq!(get("aggregate_id"), "B0000000AA");
        assert_eq!(get("aggregate_type"), "product");
        assert!(get("timestamp").parse::<i64>().expect("ns timestamp") > 0);
    }

    #[test]
    fn test_stream_entry_data_parses_back() {
        let record = sample_record();
        let fields = build_stream_entry(&record).expect("build entry");
        let data = fields
            .iter()
            .find(|(k, _)| k == "data")
            .map(|(_, v)| v.as_str())
            .expect("data field");

        let envelope: EventEnvelope = serde_json::from_str(data).expect("envelope parses");
        assert_eq!(envelope.id, record.id.to_string());
        assert_eq!(envelope.event_type, record.event_type);
        assert_eq!(envelope.aggregate_id, record.aggregate_id);
        assert_eq!(envelope.payload["title"], "Longline T-Shirt");

        let metadata = envelope.metadata.expect("metadata present");
        assert_eq!(metadata.source, "scraper");
        assert_eq!(metadata.outbox_id, record.id.to_string());
        assert_eq!(metadata.retry_count, 2);
        assert_eq!(metadata.target_stream, record.target_stream);
    }
}
