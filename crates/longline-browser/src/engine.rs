use crate::actions::PageHandle;
use crate::error::{BrowserError, Result};
use crate::fingerprint::FingerprintConfig;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::input::{
    DispatchMouseEventParams, DispatchMouseEventType,
};
use chromiumoxide::Page;
use futures::StreamExt;
use longline_core::config::BrowserSettings;
use std::time::Duration;

/// Browser automation engine.
///
/// Owns the Chromium process; pages are minted per task and carry their own
/// randomized fingerprint.
pub struct BrowserEngine {
    browser: Browser,
    nav_timeout: Duration,
}

impl BrowserEngine {
    /// Launch Chromium with the configured headless mode and the flag set
    /// that keeps the marketplace's automation checks quiet.
    pub async fn launch(settings: &BrowserSettings) -> Result<Self> {
        let fingerprint = FingerprintConfig::randomized();

        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .window_size(fingerprint.viewport_width, fingerprint.viewport_height)
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-setuid-sandbox")
            .arg(format!("--lang={}", fingerprint.accept_language));

        if !settings.headless {
            builder = builder.with_head();
        }

        let config = builder
            .build()
            .map_err(BrowserError::ChromiumError)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| BrowserError::ChromiumError(e.to_string()))?;

        // Drive the CDP event loop for the lifetime of the browser
        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                let _ = event;
            }
        });

        tracing::info!(headless = settings.headless, "browser engine launched");

        Ok(Self {
            browser,
            nav_timeout: Duration::from_secs(settings.nav_timeout_s),
        })
    }

    /// Mint a fresh page with its own randomized fingerprint.
    ///
    /// Pages are owned exclusively by the task that acquired them until
    /// release; no two tasks ever drive the same page.
    pub async fn new_page(&self) -> Result<CdpPage> {
        let fingerprint = FingerprintConfig::randomized();

        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| BrowserError::ChromiumError(e.to_string()))?;

        page.set_user_agent(&fingerprint.user_agent)
            .await
            .map_err(|e| BrowserError::ChromiumError(e.to_string()))?;

        Ok(CdpPage {
            page,
            nav_timeout: self.nav_timeout,
        })
    }

    /// Close the browser process.
    pub async fn close(mut self) -> Result<()> {
        self.browser
            .close()
            .await
            .map_err(|e| BrowserError::ChromiumError(e.to_string()))?;
        Ok(())
    }
}

/// A CDP-backed page implementing [`PageHandle`].
pub struct CdpPage {
    page: Page,
    nav_timeout: Duration,
}

impl CdpPage {
    /// Close the underlying page.
    pub async fn close(self) -> Result<()> {
        self.page
            .close()
            .await
            .map_err(|e| BrowserError::ChromiumError(e.to_string()))?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl PageHandle for CdpPage {
    async fn goto(&self, url: &str) -> Result<()> {
        let navigation = async {
            self.page
                .goto(url)
                .await
                .map_err(|e| BrowserError::NavigationError(e.to_string()))?;
            self.page
                .wait_for_navigation()
                .await
                .map_err(|e| BrowserError::NavigationError(e.to_string()))?;
            Ok::<(), BrowserError>(())
        };

        tokio::time::timeout(self.nav_timeout, navigation)
            .await
            .map_err(|_| BrowserError::Timeout(format!("navigation to {url}")))?
    }

    async fn content(&self) -> Result<String> {
        self.page
            .content()
            .await
            .map_err(|e| BrowserError::ChromiumError(e.to_string()))
    }

    async fn title(&self) -> Result<Option<String>> {
        self.page
            .get_title()
            .await
            .map_err(|e| BrowserError::ChromiumError(e.to_string()))
    }

    async fn click_selector(&self, selector: &str) -> Result<bool> {
        let Ok(element) = self.page.find_element(selector).await else {
            return Ok(false);
        };

        element
            .scroll_into_view()
            .await
            .map_err(|e| BrowserError::ChromiumError(e.to_string()))?;
        element
            .click()
            .await
            .map_err(|e| BrowserError::ChromiumError(e.to_string()))?;
        Ok(true)
    }

    async fn click_text(&self, terms: &[&str]) -> Result<bool> {
        let needle = serde_json::to_string(terms)
            .map_err(|e| BrowserError::ChromiumError(e.to_string()))?;
        let script = format!(
            r"(() => {{
                const terms = {needle};
                const candidates = document.querySelectorAll('a, span, button');
                for (const el of candidates) {{
                    const text = el.textContent || '';
                    if (terms.some(t => text.includes(t))) {{
                        el.scrollIntoView();
                        el.click();
                        return true;
                    }}
                }}
                return false;
            }})()"
        );

        let value = self.eval_json(&script).await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    async fn eval_json(&self, script: &str) -> Result<serde_json::Value> {
        let result = self
            .page
            .evaluate(script)
            .await
            .map_err(|e| BrowserError::ChromiumError(e.to_string()))?;

        result
            .into_value()
            .map_err(|e| BrowserError::ChromiumError(format!("evaluate result: {e}")))
    }

    async fn mouse_move(&self, x: f64, y: f64) -> Result<()> {
        let params = DispatchMouseEventParams::builder()
            .r#type(DispatchMouseEventType::MouseMoved)
            .x(x)
            .y(y)
            .build()
            .map_err(BrowserError::ChromiumError)?;

        self.page
            .execute(params)
            .await
            .map_err(|e| BrowserError::ChromiumError(e.to_string()))?;
        Ok(())
    }
}
