use longline_browser::BrowserError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ScrapeError>;

/// Extraction failure taxonomy.
///
/// `NoSizeTable`, `NoQualifyingTable` and `Parse` are never retried: the
/// product is skipped and logged. Navigation failures surface after the
/// browser pool has exhausted its retries.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("navigation failed: {0}")]
    NavigationFailed(String),

    #[error("bot wall not bypassed: {0}")]
    Walled(String),

    #[error("no size table found for {0}")]
    NoSizeTable(String),

    #[error("size table not qualifying for {0}")]
    NoQualifyingTable(String),

    #[error("parse error: {0}")]
    Parse(String),
}

impl From<BrowserError> for ScrapeError {
    fn from(err: BrowserError) -> Self {
        match err {
            BrowserError::Walled(url) => Self::Walled(url),
            other => Self::NavigationFailed(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_walled_maps_through() {
        let err: ScrapeError = BrowserError::Walled("https://example.com".to_string()).into();
        assert!(matches!(err, ScrapeError::Walled(_)));
    }

    #[test]
    fn test_other_browser_errors_map_to_navigation() {
        let err: ScrapeError = BrowserError::Timeout("goto".to_string()).into();
        assert!(matches!(err, ScrapeError::NavigationFailed(_)));
    }
}
