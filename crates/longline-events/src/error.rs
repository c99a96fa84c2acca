use thiserror::Error;

pub type Result<T> = std::result::Result<T, EventError>;

#[derive(Debug, Error)]
pub enum EventError {
    #[error("stream bus error: {0}")]
    Bus(#[from] redis::RedisError),

    #[error("outbox error: {0}")]
    Outbox(#[from] longline_db::DatabaseError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("malformed event: {0}")]
    Malformed(String),
}
