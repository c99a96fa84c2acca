//! Thin client over Redis streams.
//!
//! Wraps the handful of stream operations the pipeline needs: appending
//! entries, idempotent consumer-group creation, group reads and acks.

use crate::error::{EventError, Result};
use longline_core::config::BusConfig;
use redis::streams::{StreamReadOptions, StreamReadReply};
use redis::AsyncCommands;
use std::collections::HashMap;

/// A message read from a stream.
#[derive(Debug, Clone)]
pub struct StreamMessage {
    /// Stream entry id (`<ms>-<seq>`)
    pub id: String,
    /// Entry field/value pairs
    pub fields: HashMap<String, String>,
}

impl StreamMessage {
    /// Get a field value by name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }
}

/// Stream bus client backed by a Redis connection manager.
///
/// The manager reconnects transparently; clones share one multiplexed
/// connection.
#[derive(Clone)]
pub struct StreamBus {
    conn: redis::aio::ConnectionManager,
}

impl StreamBus {
    /// Connect to the configured Redis instance and verify with a ping.
    pub async fn connect(cfg: &BusConfig) -> Result<Self> {
        let url = if cfg.password.is_empty() {
            format!("redis://{}/{}", cfg.addr, cfg.db)
        } else {
            format!("redis://:{}@{}/{}", cfg.password, cfg.addr, cfg.db)
        };

        let client = redis::Client::open(url)?;
        let mut conn = client.get_connection_manager().await?;

        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        tracing::info!(addr = %cfg.addr, db = cfg.db, "connected to stream bus");

        Ok(Self { conn })
    }

    /// Append an entry to a stream, returning the generated entry id.
    pub async fn publish(&self, stream: &str, fields: &[(String, String)]) -> Result<String> {
        let mut conn = self.conn.clone();
        let id: String = conn.xadd(stream, "*", fields).await?;
        Ok(id)
    }

    /// Create a consumer group on a stream, creating the stream if needed.
    ///
    /// Creation of a preexisting group is not an error.
    pub async fn ensure_group(&self, stream: &str, group: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let result: redis::RedisResult<()> = conn.xgroup_create_mkstream(stream, group, "0").await;

        match result {
            Ok(()) => {
                tracing::info!(stream, group, "consumer group created");
                Ok(())
            }
            Err(err) if err.code() == Some("BUSYGROUP") => Ok(()),
            Err(err) => Err(EventError::Bus(err)),
        }
    }

    /// Block-read new messages for a consumer group.
    ///
    /// Messages are not acknowledged on read; they stay in the group's
    /// pending-entries list until [`StreamBus::ack`] is called.
    pub async fn read_group(
        &self,
        stream: &str,
        group: &str,
        consumer: &str,
        count: usize,
        block_ms: usize,
    ) -> Result<Vec<StreamMessage>> {
        let mut conn = self.conn.clone();
        let options = StreamReadOptions::default()
            .group(group, consumer)
            .count(count)
            .block(block_ms);

        // A blocked read that times out yields nil, not an empty reply
        let reply: Option<StreamReadReply> =
            conn.xread_options(&[stream], &[">"], &options).await?;
        let Some(reply) = reply else {
            return Ok(Vec::new());
        };

        let mut messages = Vec::new();
        for key in reply.keys {
            for entry in key.ids {
                let fields = entry
                    .map
                    .iter()
                    .filter_map(|(name, value)| {
                        redis::from_redis_value::<String>(value)
                            .ok()
                            .map(|v| (name.clone(), v))
                    })
                    .collect();
                messages.push(StreamMessage {
                    id: entry.id.clone(),
                    fields,
                });
            }
        }

        Ok(messages)
    }

    /// Acknowledge a processed message.
    pub async fn ack(&self, stream: &str, group: &str, id: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: i64 = conn.xack(stream, group, &[id]).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_bus_config() -> BusConfig {
        BusConfig {
            addr: std::env::var("REDIS_ADDR").unwrap_or_else(|_| "localhost:6379".to_string()),
            password: String::new(),
            db: 15,
        }
    }

    #[tokio::test]
    #[ignore = "requires a running Redis"]
    async fn test_publish_and_group_read() {
        let bus = StreamBus::connect(&test_bus_config()).await.expect("connect");
        let stream = format!("stream:test:{}", uuid::Uuid::new_v4());

        bus.ensure_group(&stream, "test-group").await.expect("create group");
        // Idempotent: creating the same group again is not an error
        bus.ensure_group(&stream, "test-group").await.expect("recreate group");

        bus.publish(
            &stream,
            &[
                ("event_type".to_string(), "NEW_PRODUCT_DETECTED".to_string()),
                ("aggregate_id".to_string(), "B0000000AA".to_string()),
            ],
        )
        .await
        .expect("publish");

        let messages = bus
            .read_group(&stream, "test-group", "consumer-1", 1, 1000)
            .await
            .expect("read");
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].field("aggregate_id"), Some("B0000000AA"));

        bus.ack(&stream, "test-group", &messages[0].id).await.expect("ack");
    }
}
