//! The lifecycle consumer loop.

use crate::client::SizeChartClient;
use crate::error::{ConsumerError, Result};
use chrono::Utc;
use longline_core::{ProductStatus, SizeTable};
use longline_db::{products, Database};
use longline_events::publisher;
use longline_events::types::{
    is_product_detection_event, EventEnvelope, NewProductDetectedPayload, ProductCreatedPayload,
    EVENT_PRODUCT_CREATED,
};
use longline_events::{StreamBus, StreamMessage};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Consumer configuration.
#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    /// Stream to consume
    pub stream: String,
    /// Consumer group name
    pub group: String,
    /// This consumer's name within the group
    pub consumer_name: String,
    /// Block timeout for stream reads
    pub block: Duration,
    /// Marketplace root, for detail-URL fallbacks
    pub base_url: String,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            stream: "stream:product_lifecycle".to_string(),
            group: "lifecycle-consumer-group".to_string(),
            consumer_name: "consumer-1".to_string(),
            block: Duration::from_secs(5),
            base_url: "https://www.amazon.de".to_string(),
        }
    }
}

/// Outcome of handling one message.
enum Handled {
    /// Processed or intentionally skipped; acknowledge
    Ack,
    /// Leave in the pending-entries list for redelivery
    Retry,
}

/// Consumer-group reader that enriches detected products.
pub struct LifecycleConsumer {
    db: Database,
    bus: StreamBus,
    client: SizeChartClient,
    config: ConsumerConfig,
}

impl LifecycleConsumer {
    #[must_use]
    pub fn new(
        db: Database,
        bus: StreamBus,
        client: SizeChartClient,
        config: ConsumerConfig,
    ) -> Self {
        Self {
            db,
            bus,
            client,
            config,
        }
    }

    /// Run until cancelled. Creates the consumer group on startup
    /// (idempotent), then block-reads one message at a time. A message is
    /// acknowledged only after its commit point; failures leave it in the
    /// pending-entries list for redelivery.
    pub async fn run(&self, cancel: CancellationToken) -> Result<()> {
        self.bus
            .ensure_group(&self.config.stream, &self.config.group)
            .await?;

        tracing::info!(
            stream = %self.config.stream,
            group = %self.config.group,
            consumer = %self.config.consumer_name,
            "lifecycle consumer started"
        );

        loop {
            if cancel.is_cancelled() {
                tracing::info!("lifecycle consumer stopping");
                return Ok(());
            }

            let messages = match self
                .bus
                .read_group(
                    &self.config.stream,
                    &self.config.group,
                    &self.config.consumer_name,
                    1,
                    self.config.block.as_millis() as usize,
                )
                .await
            {
                Ok(messages) => messages,
                Err(err) => {
                    tracing::error!(error = %err, "failed to read from stream");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                    continue;
                }
            };

            for message in messages {
                match self.process_message(&message).await {
                    Ok(Handled::Ack) => {
                        if let Err(err) = self
                            .bus
                            .ack(&self.config.stream, &self.config.group, &message.id)
                            .await
                        {
                            tracing::error!(message_id = %message.id, error = %err, "failed to acknowledge message");
                        }
                    }
                    Ok(Handled::Retry) => {
                        tracing::warn!(message_id = %message.id, "message left for redelivery");
                    }
                    Err(err) => {
                        tracing::error!(message_id = %message.id, error = %err, "failed to process message");
                    }
                }
            }
        }
    }

    async fn process_message(&self, message: &StreamMessage) -> Result<Handled> {
        let envelope = decode_message(message)?;

        if !is_product_detection_event(&envelope.event_type) {
            tracing::debug!(
                event_type = %envelope.event_type,
                aggregate_id = %envelope.aggregate_id,
                "skipping non-detection event"
            );
            return Ok(Handled::Ack);
        }

        let payload: NewProductDetectedPayload =
            serde_json::from_value(envelope.payload.clone()).unwrap_or_default();

        // The PID is the aggregate id; the payload is the fallback
        let pid = if envelope.aggregate_id.is_empty() {
            payload.pid.clone()
        } else {
            envelope.aggregate_id.clone()
        };
        if pid.is_empty() {
            return Err(ConsumerError::Malformed(
                "missing PID in aggregate_id and payload".to_string(),
            ));
        }

        tracing::info!(
            message_id = %message.id,
            event_type = %envelope.event_type,
            pid = %pid,
            "processing detected product"
        );

        // Ensure a row exists, then gate on its current status
        let detail_url = if payload.detail_page_url.is_empty() {
            format!("{}/dp/{}", self.config.base_url, pid)
        } else {
            payload.detail_page_url.clone()
        };
        let title = if payload.title.is_empty() {
            "Unknown Product".to_string()
        } else {
            payload.title.clone()
        };

        products::ensure_product(
            self.db.pool(),
            &pid,
            &title,
            &detail_url,
            payload.brand.as_deref(),
        )
        .await?;

        let status = products::get_status(self.db.pool(), &pid)
            .await?
            .unwrap_or(ProductStatus::Pending);
        if !is_enrichable(status) {
            tracing::info!(pid = %pid, status = %status, "skipping already-enriched product");
            return Ok(Handled::Ack);
        }

        // Drive the size-chart API; exhausted retries leave the message
        // unacked so the group redelivers it
        let response = match self.client.fetch(&pid).await {
            Ok(response) => response,
            Err(err) => {
                tracing::error!(pid = %pid, error = %err, "size chart extraction failed");
                return Ok(Handled::Retry);
            }
        };

        let size_table = response.size_table;
        let has_length = size_table.as_ref().is_some_and(SizeTable::has_length);
        let new_status = if has_length {
            ProductStatus::Active
        } else {
            ProductStatus::Rejected
        };

        // Commit point
        products::update_size_table_status(self.db.pool(), &pid, size_table.as_ref(), new_status)
            .await?;
        tracing::info!(pid = %pid, status = %new_status, has_length, "updated product");

        if has_length {
            if let Err(err) = self.publish_product_created(&pid, size_table).await {
                tracing::error!(pid = %pid, error = %err, "failed to publish PRODUCT_CREATED");
            }
        }

        Ok(Handled::Ack)
    }

    /// Append a `PRODUCT_CREATED` event to the outbox; the relay delivers.
    async fn publish_product_created(
        &self,
        pid: &str,
        size_table: Option<SizeTable>,
    ) -> Result<()> {
        let record = products::get_product(self.db.pool(), pid)
            .await?
            .ok_or_else(|| ConsumerError::Malformed(format!("product {pid} vanished")))?;

        let payload = ProductCreatedPayload {
            event_id: Uuid::new_v4().to_string(),
            event_type: EVENT_PRODUCT_CREATED.to_string(),
            timestamp: Utc::now(),
            pid: pid.to_string(),
            title: record.title,
            url: record.detail_page_url,
            brand: record.brand,
            size_table,
            quality_score: 3.0,
        };

        publisher::publish_product_created(self.db.pool(), &payload).await?;
        tracing::info!(pid, "published PRODUCT_CREATED");
        Ok(())
    }
}

/// True if a product in `status` is still waiting for enrichment.
///
/// PENDING and SCRAPED are the pre-active states: the worker writes
/// SCRAPED before its detection event is even relayed. Anything past them
/// means the PID was already enriched, so redeliveries are no-ops and
/// never append a second `PRODUCT_CREATED`.
#[must_use]
pub fn is_enrichable(status: ProductStatus) -> bool {
    matches!(status, ProductStatus::Pending | ProductStatus::Scraped)
}

/// Decode a stream message into an event envelope.
///
/// The `data` field carries the full JSON envelope; entries from older
/// producers are reassembled from the duplicated scalar fields.
pub fn decode_message(message: &StreamMessage) -> Result<EventEnvelope> {
    if let Some(data) = message.field("data") {
        if let Ok(envelope) = serde_json::from_str::<EventEnvelope>(data) {
            return Ok(envelope);
        }
    }

    let event_type = message
        .field("event_type")
        .or_else(|| message.field("type"))
        .unwrap_or_default()
        .to_string();
    if event_type.is_empty() {
        return Err(ConsumerError::Malformed(
            "no data envelope and no event type field".to_string(),
        ));
    }

    let payload = message
        .field("payload")
        .and_then(|raw| serde_json::from_str(raw).ok())
        .unwrap_or(serde_json::Value::Null);

    Ok(EventEnvelope {
        id: message
            .field("original_id")
            .unwrap_or_default()
            .to_string(),
        event_type,
        aggregate_type: message
            .field("aggregate_type")
            .unwrap_or_default()
            .to_string(),
        aggregate_id: message
            .field("aggregate_id")
            .unwrap_or_default()
            .to_string(),
        timestamp: message
            .field("timestamp")
            .and_then(|raw| raw.parse::<i64>().ok())
            .map(chrono::DateTime::from_timestamp_nanos)
            .unwrap_or_else(Utc::now),
        payload,
        metadata: None,
    })
}
