//! Chromium-backed [`PageContext`] using chromiumoxide.

use super::{BrowserError, PageContext, WaitOutcome, script};
use crate::config::Settings;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::handler::viewport::Viewport;
use chromiumoxide::page::{Page, ScreenshotParams};
use futures::StreamExt;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep, timeout};
use tracing::{debug, info, instrument, warn};

const VISIBILITY_POLL: Duration = Duration::from_millis(100);

/// A launched Chromium process and its CDP event loop.
pub struct ChromiumBrowser {
    browser: Browser,
    handler: JoinHandle<()>,
}

impl ChromiumBrowser {
    /// Launch Chromium with the viewport and head mode from `settings`.
    #[instrument(level = "info", skip_all, fields(headless = settings.headless))]
    pub async fn launch(settings: &Settings) -> Result<Self, BrowserError> {
        let mut builder = BrowserConfig::builder()
            .window_size(settings.viewport_width, settings.viewport_height)
            .viewport(Viewport {
                width: settings.viewport_width,
                height: settings.viewport_height,
                device_scale_factor: None,
                emulating_mobile: false,
                is_landscape: true,
                has_touch: false,
            })
            .arg("--mute-audio");
        if !settings.headless {
            builder = builder.with_head();
        }
        if let Some(path) = &settings.chrome_executable {
            builder = builder.chrome_executable(path);
        }
        let config = builder.build().map_err(BrowserError::Launch)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| BrowserError::Launch(e.to_string()))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!(error = %e, "CDP handler event error");
                }
            }
        });

        info!("Chromium launched");
        Ok(Self { browser, handler })
    }

    /// Open a blank tab.
    pub async fn new_page(&self, settings: &Settings) -> Result<ChromiumPage, BrowserError> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| BrowserError::Launch(format!("failed to open page: {e}")))?;
        Ok(ChromiumPage {
            page,
            navigation_timeout: settings.navigation_timeout(),
        })
    }

    /// Close the browser and stop the event loop. Errors are logged, not returned.
    #[instrument(level = "info", skip_all)]
    pub async fn shutdown(mut self) {
        info!("Closing browser");
        if let Err(e) = self.browser.close().await {
            warn!(error = %e, "Browser close failed");
        }
        if let Err(e) = self.browser.wait().await {
            warn!(error = %e, "Waiting for browser exit failed");
        }
        self.handler.abort();
    }
}

/// A single Chromium tab.
pub struct ChromiumPage {
    page: Page,
    navigation_timeout: Duration,
}

impl PageContext for ChromiumPage {
    async fn navigate(&self, url: &str) -> Result<(), BrowserError> {
        match timeout(self.navigation_timeout, self.page.goto(url)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(BrowserError::Navigation {
                url: url.to_string(),
                reason: e.to_string(),
            }),
            Err(_) => Err(BrowserError::NavigationTimeout {
                url: url.to_string(),
                timeout: self.navigation_timeout,
            }),
        }
    }

    async fn current_url(&self) -> Result<String, BrowserError> {
        let url = self
            .page
            .url()
            .await
            .map_err(|e| BrowserError::Script(format!("failed to read url: {e}")))?;
        Ok(url.map(|u| u.to_string()).unwrap_or_default())
    }

    async fn content(&self) -> Result<String, BrowserError> {
        self.page
            .content()
            .await
            .map_err(|e| BrowserError::Capture(format!("failed to read html: {e}")))
    }

    async fn evaluate(&self, script: &str) -> Result<serde_json::Value, BrowserError> {
        let result = self
            .page
            .evaluate(script)
            .await
            .map_err(|e| BrowserError::Script(e.to_string()))?;
        Ok(result.value().cloned().unwrap_or(serde_json::Value::Null))
    }

    async fn click(&self, selector: &str) -> Result<bool, BrowserError> {
        let present = self.evaluate(&script::exists(selector)).await?;
        if !present.as_bool().unwrap_or(false) {
            return Ok(false);
        }
        let element = self
            .page
            .find_element(selector)
            .await
            .map_err(|e| BrowserError::Click {
                selector: selector.to_string(),
                reason: e.to_string(),
            })?;
        element.click().await.map_err(|e| BrowserError::Click {
            selector: selector.to_string(),
            reason: e.to_string(),
        })?;
        Ok(true)
    }

    async fn wait_for_selector(&self, selector: &str, limit: Duration) -> WaitOutcome {
        let deadline = Instant::now() + limit;
        let check = script::is_visible(selector);
        loop {
            match self.evaluate(&check).await {
                Ok(value) if value.as_bool() == Some(true) => return WaitOutcome::Ready,
                Ok(_) => {}
                Err(e) => debug!(%selector, error = %e, "Visibility check failed"),
            }
            if Instant::now() >= deadline {
                debug!(%selector, ?limit, "Selector did not become visible");
                return WaitOutcome::SoftTimeout;
            }
            sleep(VISIBILITY_POLL).await;
        }
    }

    async fn wait_for_navigation(&self, limit: Duration) -> WaitOutcome {
        match timeout(limit, self.page.wait_for_navigation()).await {
            Ok(Ok(_)) => WaitOutcome::Ready,
            Ok(Err(e)) => {
                debug!(error = %e, "Navigation wait failed");
                WaitOutcome::SoftTimeout
            }
            Err(_) => WaitOutcome::SoftTimeout,
        }
    }

    async fn screenshot(&self) -> Result<Vec<u8>, BrowserError> {
        let params = ScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .full_page(false)
            .build();
        self.page
            .screenshot(params)
            .await
            .map_err(|e| BrowserError::Capture(e.to_string()))
    }
}
