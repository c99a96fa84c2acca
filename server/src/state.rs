//! Shared application state for the HTTP handlers.

use longline_browser::SessionPool;
use longline_db::Database;
use longline_scheduler::JobManager;
use longline_scraper::ProductExtractor;
use std::sync::Arc;

/// State shared across all request handlers.
///
/// The session pool and extractor are shared with the worker loop; the
/// pool's permit count keeps concurrent browser use bounded regardless of
/// who acquires pages.
pub struct AppState {
    pub db: Database,
    pub manager: JobManager,
    pub sessions: Arc<SessionPool>,
    pub extractor: Arc<ProductExtractor>,
    pub base_url: String,
    pub nav_retries: u32,
}
