use thiserror::Error;

pub type Result<T> = std::result::Result<T, ConsumerError>;

#[derive(Debug, Error)]
pub enum ConsumerError {
    #[error("stream bus error: {0}")]
    Bus(#[from] longline_events::EventError),

    #[error("database error: {0}")]
    Database(#[from] longline_db::DatabaseError),

    #[error("size chart API error: {0}")]
    SizeChartApi(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("malformed message: {0}")]
    Malformed(String),
}
