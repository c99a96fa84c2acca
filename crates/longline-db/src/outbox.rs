//! Transactional outbox operations.
//!
//! Events are appended in the same transaction as the domain write that
//! produced them, drained by the relay in `created_at` order, and retried
//! with capped exponential backoff. The retry counter lives on the row, so
//! retry state survives crashes.

use crate::error::{DatabaseError, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::PgExecutor;
use uuid::Uuid;

/// Stream that events are routed to when none is specified.
pub const DEFAULT_TARGET_STREAM: &str = "stream:product_lifecycle";

/// Delivery status of an outbox event.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OutboxStatus {
    /// Waiting for first delivery
    Pending,
    /// Delivered to the stream bus; terminal
    Processed,
    /// Delivery failed; eligible again at `next_retry_at`
    Failed,
    /// Retries exhausted; requires operator intervention
    DeadLetter,
}

impl OutboxStatus {
    /// Canonical string stored in the database.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processed => "processed",
            Self::Failed => "failed",
            Self::DeadLetter => "dead_letter",
        }
    }

    /// Parse from a stored string. Unknown values map to `Pending`.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s {
            "processed" => Self::Processed,
            "failed" => Self::Failed,
            "dead_letter" => Self::DeadLetter,
            _ => Self::Pending,
        }
    }
}

impl std::fmt::Display for OutboxStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An outbox row.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct OutboxEventRecord {
    /// Event identifier; becomes `original_id` on the stream
    pub id: Uuid,
    /// Aggregate kind, e.g. `product`
    pub aggregate_type: String,
    /// Aggregate identifier, e.g. the PID
    pub aggregate_id: String,
    /// Event type, e.g. `NEW_PRODUCT_DETECTED`
    pub event_type: String,
    /// JSON event payload
    pub payload: JsonValue,
    /// Stream the event is addressed to
    pub target_stream: String,
    /// Delivery status string
    pub status: String,
    /// Delivery attempts so far
    pub retry_count: i32,
    /// Last delivery error
    pub error_message: Option<String>,
    /// Append time; relay drains in this order
    pub created_at: DateTime<Utc>,
    /// Successful delivery time
    pub processed_at: Option<DateTime<Utc>>,
    /// Earliest next delivery attempt
    pub next_retry_at: DateTime<Utc>,
}

impl OutboxEventRecord {
    /// Delivery status as an enum.
    #[must_use]
    pub fn outbox_status(&self) -> OutboxStatus {
        OutboxStatus::parse(&self.status)
    }
}

/// A new event to append to the outbox.
#[derive(Debug, Clone)]
pub struct NewOutboxEvent {
    /// Aggregate kind; required
    pub aggregate_type: String,
    /// Aggregate identifier; required
    pub aggregate_id: String,
    /// Event type; required
    pub event_type: String,
    /// JSON payload; must not be null
    pub payload: JsonValue,
    /// Target stream; defaults to [`DEFAULT_TARGET_STREAM`]
    pub target_stream: Option<String>,
}

/// Backoff before the delivery attempt after `retry_count` failures:
/// `min(300, 2^retry_count)` seconds.
#[must_use]
pub fn backoff_seconds(retry_count: i32) -> i64 {
    let shift = retry_count.clamp(0, 30) as u32;
    (1i64 << shift).min(300)
}

/// Append an event to the outbox.
///
/// Pass the executor of an open transaction to bind the append to a domain
/// write. Defaults are applied here: fresh UUID, `pending` status,
/// `next_retry_at = now`, default target stream.
pub async fn insert_event<'e>(
    exec: impl PgExecutor<'e>,
    event: NewOutboxEvent,
) -> Result<Uuid> {
    if event.aggregate_type.is_empty()
        || event.aggregate_id.is_empty()
        || event.event_type.is_empty()
    {
        return Err(DatabaseError::Constraint(
            "outbox event requires aggregate_type, aggregate_id and event_type".to_string(),
        ));
    }
    if event.payload.is_null() {
        return Err(DatabaseError::Constraint(
            "outbox event payload must not be null".to_string(),
        ));
    }

    let id = Uuid::new_v4();
    let target_stream = event
        .target_stream
        .unwrap_or_else(|| DEFAULT_TARGET_STREAM.to_string());

    sqlx::query(
        "INSERT INTO outbox_event (
            id, aggregate_type, aggregate_id, event_type,
            payload, target_stream, status, retry_count, next_retry_at
         ) VALUES ($1, $2, $3, $4, $5, $6, 'pending', 0, now())",
    )
    .bind(id)
    .bind(&event.aggregate_type)
    .bind(&event.aggregate_id)
    .bind(&event.event_type)
    .bind(&event.payload)
    .bind(&target_stream)
    .execute(exec)
    .await?;

    Ok(id)
}

/// Fetch events ready for delivery, oldest first.
///
/// Eligible rows are `pending` or `failed` with `next_retry_at` in the past.
pub async fn get_pending<'e>(
    exec: impl PgExecutor<'e>,
    limit: i64,
) -> Result<Vec<OutboxEventRecord>> {
    let records = sqlx::query_as::<_, OutboxEventRecord>(
        "SELECT * FROM outbox_event
         WHERE status IN ('pending', 'failed') AND next_retry_at <= now()
         ORDER BY created_at ASC
         LIMIT $1",
    )
    .bind(limit)
    .fetch_all(exec)
    .await?;

    Ok(records)
}

/// Mark an event successfully delivered.
pub async fn mark_processed<'e>(exec: impl PgExecutor<'e>, id: Uuid) -> Result<()> {
    let result = sqlx::query(
        "UPDATE outbox_event SET status = 'processed', processed_at = now() WHERE id = $1",
    )
    .bind(id)
    .execute(exec)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::NotFound(format!("outbox event {id}")));
    }
    Ok(())
}

/// Record a delivery failure and schedule the retry.
///
/// Increments the row's retry counter; once it reaches `max_retries` the
/// event moves to `dead_letter`, otherwise back to `failed` with
/// `next_retry_at = now + backoff(previous retry count)`, giving the
/// 1 s, 2 s, 4 s, … progression.
pub async fn mark_failed(
    pool: &sqlx::PgPool,
    id: Uuid,
    error: &str,
    max_retries: i32,
) -> Result<OutboxStatus> {
    let previous: i32 = sqlx::query_scalar("SELECT retry_count FROM outbox_event WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| DatabaseError::NotFound(format!("outbox event {id}")))?;

    let retry_count = previous + 1;
    let status = if retry_count >= max_retries {
        OutboxStatus::DeadLetter
    } else {
        OutboxStatus::Failed
    };
    let next_retry_at = Utc::now() + Duration::seconds(backoff_seconds(previous));

    sqlx::query(
        "UPDATE outbox_event
         SET status = $2, retry_count = $3, error_message = $4, next_retry_at = $5
         WHERE id = $1",
    )
    .bind(id)
    .bind(status.as_str())
    .bind(retry_count)
    .bind(error)
    .bind(next_retry_at)
    .execute(pool)
    .await?;

    Ok(status)
}

/// Number of events awaiting delivery (`pending` or `failed`).
pub async fn pending_count<'e>(exec: impl PgExecutor<'e>) -> Result<i64> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM outbox_event WHERE status IN ('pending', 'failed')")
            .fetch_one(exec)
            .await?;
    Ok(count)
}

/// Number of events parked in dead letter.
pub async fn dead_letter_count<'e>(exec: impl PgExecutor<'e>) -> Result<i64> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM outbox_event WHERE status = 'dead_letter'")
            .fetch_one(exec)
            .await?;
    Ok(count)
}
