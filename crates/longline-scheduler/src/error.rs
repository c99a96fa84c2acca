use thiserror::Error;

pub type Result<T> = std::result::Result<T, SchedulerError>;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("database error: {0}")]
    Database(#[from] longline_db::DatabaseError),

    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("browser error: {0}")]
    Browser(#[from] longline_browser::BrowserError),

    #[error("scrape error: {0}")]
    Scrape(#[from] longline_scraper::ScrapeError),

    #[error("event error: {0}")]
    Event(#[from] longline_events::EventError),
}
