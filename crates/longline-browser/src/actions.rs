use crate::error::{BrowserError, Result};

/// Capability surface of a browsing context.
///
/// The session pool, crawler and extractor all operate against this trait
/// rather than a concrete CDP page, so their protocols can be exercised in
/// tests without a live browser.
#[async_trait::async_trait]
pub trait PageHandle: Send + Sync {
    /// Navigate to a URL with a DOM-content-loaded barrier and the
    /// configured absolute timeout. One attempt, no wall handling.
    async fn goto(&self, url: &str) -> Result<()>;

    /// Current page HTML.
    async fn content(&self) -> Result<String>;

    /// Current page title, if any.
    async fn title(&self) -> Result<Option<String>>;

    /// Click the first element matching a CSS selector, scrolling it into
    /// view first. Returns false if no element matches.
    async fn click_selector(&self, selector: &str) -> Result<bool>;

    /// Click the first clickable element whose visible text contains one of
    /// `terms`. Returns false if none is found.
    async fn click_text(&self, terms: &[&str]) -> Result<bool>;

    /// Evaluate a JavaScript expression and deserialize its JSON result.
    async fn eval_json(&self, script: &str) -> Result<serde_json::Value>;

    /// Move the mouse cursor to viewport coordinates.
    async fn mouse_move(&self, x: f64, y: f64) -> Result<()>;
}

/// Helper to extract domain from URL
pub fn extract_domain(url: &str) -> Result<String> {
    let url = url::Url::parse(url)
        .map_err(|e| BrowserError::NavigationError(format!("Invalid URL: {e}")))?;

    url.host_str()
        .ok_or_else(|| BrowserError::NavigationError("No host in URL".to_string()))
        .map(ToString::to_string)
}
