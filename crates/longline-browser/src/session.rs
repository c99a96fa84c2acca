//! Bounded browser session pool and the navigation protocol.
//!
//! Sessions are bounded by the configured worker count. Each navigation
//! runs the full protocol: DOM-content-loaded barrier with timeout, bot-wall
//! signature check with one bypass attempt, soft-error-page detection, and
//! linear retry sleeps. A minimum inter-operation spacing is enforced per
//! page before control returns to the caller.

use crate::actions::PageHandle;
use crate::engine::{BrowserEngine, CdpPage};
use crate::error::{BrowserError, Result};
use longline_core::config::BrowserSettings;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Locale-specific prompt sentence shown on the bot wall.
const WALL_PROMPT: &str = "Klicke auf die Schaltfläche unten";
/// Label of the wall's confirm button.
const WALL_CONTINUE: &str = "Weiter shoppen";
/// Title substring of the marketplace's soft error page.
const SOFT_ERROR_TITLE: &str = "Tut uns Leid";

/// CSS fallbacks for the wall's confirm button, in priority order. Tried
/// after the text-based click.
const BYPASS_SELECTORS: [&str; 3] = [
    "input[type='submit'][value*='Weiter']",
    ".a-button-primary",
    "button.a-button-text",
];

/// True if the page content carries the bot-wall signature.
#[must_use]
pub fn is_walled(content: &str) -> bool {
    content.contains(WALL_PROMPT) || content.contains(WALL_CONTINUE)
}

/// Implements the navigation protocol over any [`PageHandle`].
///
/// Holds only timing configuration, so the protocol is testable without a
/// live browser.
#[derive(Debug, Clone)]
pub struct Navigator {
    page_interval: Duration,
    wall_grace: Duration,
}

impl Navigator {
    /// Build from browser settings.
    #[must_use]
    pub fn new(settings: &BrowserSettings) -> Self {
        Self {
            page_interval: Duration::from_secs(settings.page_interval_s),
            wall_grace: Duration::from_secs(3),
        }
    }

    /// Navigate with the full protocol, retrying up to `max_retries` times.
    ///
    /// Attempt `i` (zero-based) sleeps `i` seconds first. A persistent bot
    /// wall fails the attempt like a navigation error; the soft error page
    /// fails the navigation outright, without retry. After a successful
    /// attempt the per-page minimum spacing is slept before control
    /// returns.
    pub async fn navigate(
        &self,
        page: &dyn PageHandle,
        url: &str,
        max_retries: u32,
    ) -> Result<()> {
        let mut last_error = BrowserError::NavigationError(format!("no attempts made for {url}"));

        for attempt in 0..max_retries.max(1) {
            if attempt > 0 {
                tracing::info!(url, attempt = attempt + 1, "retrying navigation");
                tokio::time::sleep(Duration::from_secs(u64::from(attempt))).await;
            }

            match self.navigate_once(page, url).await {
                Ok(()) => {
                    tokio::time::sleep(self.page_interval).await;
                    return Ok(());
                }
                Err(err @ BrowserError::ErrorPage(_)) => {
                    tracing::warn!(url, error = %err, "error page served, not retrying");
                    return Err(err);
                }
                Err(err) => {
                    tracing::warn!(
                        url,
                        attempt = attempt + 1,
                        error = %err,
                        "navigation attempt failed"
                    );
                    last_error = err;
                }
            }
        }

        Err(last_error)
    }

    async fn navigate_once(&self, page: &dyn PageHandle, url: &str) -> Result<()> {
        page.goto(url).await?;

        // Soft error page: known title substring, not worth a bypass
        if let Some(title) = page.title().await? {
            if title.contains(SOFT_ERROR_TITLE) {
                return Err(BrowserError::ErrorPage(title));
            }
        }

        let content = page.content().await?;
        if is_walled(&content) {
            tracing::info!(url, "bot wall detected, attempting bypass");
            self.bypass_wall(page, url).await?;
        }

        Ok(())
    }

    /// One bypass attempt: click the confirm button (text first, then CSS
    /// fallbacks), wait the grace period, re-inspect.
    async fn bypass_wall(&self, page: &dyn PageHandle, url: &str) -> Result<()> {
        let mut clicked = page.click_text(&[WALL_CONTINUE]).await.unwrap_or(false);

        if !clicked {
            for selector in BYPASS_SELECTORS {
                if page.click_selector(selector).await.unwrap_or(false) {
                    clicked = true;
                    break;
                }
            }
        }

        if !clicked {
            return Err(BrowserError::Walled(url.to_string()));
        }

        tokio::time::sleep(self.wall_grace).await;

        let content = page.content().await?;
        if is_walled(&content) {
            return Err(BrowserError::Walled(url.to_string()));
        }

        tracing::info!(url, "bot wall bypassed");
        Ok(())
    }

    /// Best-effort humanization: a few mouse moves to varied coordinates
    /// with short jittered pauses, then one short scroll. Failures are
    /// logged and swallowed.
    pub async fn humanize(&self, page: &dyn PageHandle) {
        let pauses: Vec<u64> = {
            let mut rng = rand::thread_rng();
            (0..3).map(|_| rng.gen_range(200..500u64)).collect()
        };

        for (i, pause_ms) in pauses.into_iter().enumerate() {
            let x = 100.0 + i as f64 * 200.0;
            let y = 100.0 + i as f64 * 150.0;
            if let Err(err) = page.mouse_move(x, y).await {
                tracing::debug!(error = %err, "humanization mouse move failed");
                return;
            }
            tokio::time::sleep(Duration::from_millis(pause_ms)).await;
        }

        if let Err(err) = page
            .eval_json("(() => { window.scrollBy(0, Math.floor(Math.random() * 300)); return true; })()")
            .await
        {
            tracing::debug!(error = %err, "humanization scroll failed");
        }
        tokio::time::sleep(Duration::from_secs(1)).await;
    }
}

/// A pool of isolated browser sessions.
///
/// Sizing comes from the `workers` configuration scalar; acquisition blocks
/// once all sessions are in use. The browser itself is long-lived, pages
/// are minted per acquisition.
pub struct SessionPool {
    engine: Arc<BrowserEngine>,
    permits: Arc<Semaphore>,
    navigator: Navigator,
}

/// An acquired page plus its pool permit.
///
/// The permit returns to the pool when the session is released or dropped.
pub struct PageSession {
    page: CdpPage,
    _permit: OwnedSemaphorePermit,
}

impl PageSession {
    /// The page handle for this session.
    #[must_use]
    pub fn page(&self) -> &CdpPage {
        &self.page
    }
}

impl SessionPool {
    /// Create a pool on top of a launched engine.
    #[must_use]
    pub fn new(engine: Arc<BrowserEngine>, settings: &BrowserSettings) -> Self {
        Self {
            engine,
            permits: Arc::new(Semaphore::new(settings.workers.max(1) as usize)),
            navigator: Navigator::new(settings),
        }
    }

    /// The pool's navigation protocol.
    #[must_use]
    pub fn navigator(&self) -> &Navigator {
        &self.navigator
    }

    /// Acquire an isolated page, waiting for a free slot if necessary.
    pub async fn acquire_page(&self) -> Result<PageSession> {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| BrowserError::ChromiumError("session pool closed".to_string()))?;

        let page = self.engine.new_page().await?;
        Ok(PageSession {
            page,
            _permit: permit,
        })
    }

    /// Release a session, closing its page.
    pub async fn release_page(&self, session: PageSession) {
        if let Err(err) = session.page.close().await {
            tracing::debug!(error = %err, "failed to close released page");
        }
    }

    /// Navigate an acquired session with the full protocol.
    pub async fn navigate(&self, session: &PageSession, url: &str, max_retries: u32) -> Result<()> {
        self.navigator.navigate(session.page(), url, max_retries).await
    }

    /// Humanize interaction on an acquired session.
    pub async fn humanize(&self, session: &PageSession) {
        self.navigator.humanize(session.page()).await;
    }
}
