//! Transactional event publishing.
//!
//! Events are never written to the stream bus directly; they are appended
//! to the outbox inside the caller's transaction and delivered by the
//! relay. Pass the executor of an open transaction to bind the event to
//! the domain write that produced it.

use crate::error::Result;
use crate::types::{NewProductDetectedPayload, ProductCreatedPayload};
use longline_db::{outbox, NewOutboxEvent};
use sqlx::PgExecutor;
use uuid::Uuid;

/// Append a `NEW_PRODUCT_DETECTED` event to the outbox.
///
/// Metadata defaults (event id, type, timestamp, source) are filled in
/// before serialization. Returns the outbox row id.
pub async fn publish_new_product_detected<'e>(
    exec: impl PgExecutor<'e>,
    payload: NewProductDetectedPayload,
) -> Result<Uuid> {
    let payload = payload.with_defaults();
    let pid = payload.pid.clone();
    let event_type = payload
        .event_type
        .clone()
        .unwrap_or_else(|| crate::types::EVENT_NEW_PRODUCT_DETECTED.to_string());

    let event = NewOutboxEvent {
        aggregate_type: "product".to_string(),
        aggregate_id: pid.clone(),
        event_type: event_type.clone(),
        payload: serde_json::to_value(&payload)?,
        target_stream: None,
    };

    let outbox_id = outbox::insert_event(exec, event).await?;

    tracing::info!(
        event_type = %event_type,
        pid = %pid,
        outbox_id = %outbox_id,
        "event published to outbox"
    );

    Ok(outbox_id)
}

/// Append a `PRODUCT_CREATED` event to the outbox.
pub async fn publish_product_created<'e>(
    exec: impl PgExecutor<'e>,
    payload: &ProductCreatedPayload,
) -> Result<Uuid> {
    let event = NewOutboxEvent {
        aggregate_type: "product".to_string(),
        aggregate_id: payload.pid.clone(),
        event_type: payload.event_type.clone(),
        payload: serde_json::to_value(payload)?,
        target_stream: None,
    };

    let outbox_id = outbox::insert_event(exec, event).await?;

    tracing::info!(
        event_type = %payload.event_type,
        pid = %payload.pid,
        outbox_id = %outbox_id,
        "event published to outbox"
    );

    Ok(outbox_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use longline_db::Database;
    use sqlx::PgPool;

    async fn test_database() -> Database {
        let url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "postgres://postgres@localhost:5432/longline_test".to_string());
        let pool = PgPool::connect(&url).await.expect("connect to test db");
        let db = Database::from_pool(pool);
        db.run_migrations().await.expect("run migrations");
        db
    }

    fn sample_payload(pid: &str) -> NewProductDetectedPayload {
        NewProductDetectedPayload {
            pid: pid.to_string(),
            title: "Longline T-Shirt".to_string(),
            detail_page_url: format!("https://example.com/dp/{pid}"),
            ..Default::default()
        }
    }

    #[tokio::test]
    #[ignore = "requires a running PostgreSQL"]
    async fn test_publish_lands_in_outbox() {
        let db = test_database().await;

        let outbox_id = publish_new_product_detected(db.pool(), sample_payload("EVTPUBL001"))
            .await
            .expect("publish");

        let pending = outbox::get_pending(db.pool(), 1000).await.expect("pending");
        let event = pending
            .iter()
            .find(|e| e.id == outbox_id)
            .expect("event is pending");
        assert_eq!(event.aggregate_id, "EVTPUBL001");
        assert_eq!(event.event_type, crate::types::EVENT_NEW_PRODUCT_DETECTED);
        assert_eq!(event.payload["pid"], "EVTPUBL001");
        assert_eq!(event.payload["source"], "scraper");
    }

    #[tokio::test]
    #[ignore = "requires a running PostgreSQL"]
    async fn test_publish_rolls_back_with_transaction() {
        let db = test_database().await;

        let result: longline_db::Result<()> = db
            .transaction(|tx| {
                Box::pin(async move {
                    publish_new_product_detected(&mut **tx, sample_payload("EVTROLL001"))
                        .await
                        .map_err(|e| {
                            longline_db::DatabaseError::Constraint(e.to_string())
                        })?;
                    Err(longline_db::DatabaseError::Constraint(
                        "forced rollback".to_string(),
                    ))
                })
            })
            .await;
        assert!(result.is_err());

        let pending = outbox::get_pending(db.pool(), 1000).await.expect("pending");
        assert!(
            pending.iter().all(|e| e.aggregate_id != "EVTROLL001"),
            "event appended in a rolled-back transaction must not survive"
        );
    }
}
