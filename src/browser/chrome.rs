//! Chromium session driven over the DevTools protocol.

use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser as CdpBrowser, BrowserConfig as CdpConfig};
use chromiumoxide::element::Element;
use chromiumoxide::Page;
use futures::StreamExt;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::browser::Browser;
use crate::error::{AppError, Result};
use crate::models::BrowserConfig;

/// One Chromium process with a single tab.
///
/// Call [`Browser::close`] when done. Dropping the session without closing
/// stops the event handler and lets chromiumoxide kill the child process.
pub struct ChromeBrowser {
    browser: Mutex<CdpBrowser>,
    page: Page,
    handler: JoinHandle<()>,
    poll_interval: Duration,
}

impl ChromeBrowser {
    /// Launch Chromium and open the working tab.
    pub async fn launch(config: &BrowserConfig) -> Result<Self> {
        let mut builder = CdpConfig::builder()
            .window_size(config.window_width, config.window_height)
            .arg("--no-sandbox")
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage");

        if !config.headless {
            builder = builder.with_head();
        }

        let cdp_config = builder
            .build()
            .map_err(|e| AppError::browser(format!("Failed to build browser config: {e}")))?;

        let (browser, mut handler) = CdpBrowser::launch(cdp_config).await.map_err(|e| {
            AppError::browser(format!(
                "Failed to launch browser: {e}. Is Chrome or Chromium installed and in PATH?"
            ))
        })?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    log::debug!("Browser handler event error: {}", e);
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| AppError::browser(format!("Failed to create page: {e}")))?;

        if let Some(ref ua) = config.user_agent {
            page.set_user_agent(ua)
                .await
                .map_err(|e| AppError::browser(format!("Failed to set user agent: {e}")))?;
        }

        log::info!(
            "Browser session started ({}x{}, headless: {})",
            config.window_width,
            config.window_height,
            config.headless
        );

        Ok(Self {
            browser: Mutex::new(browser),
            page,
            handler,
            poll_interval: config.poll_interval(),
        })
    }
}

#[async_trait]
impl Browser for ChromeBrowser {
    type Element = Element;

    async fn navigate(&self, url: &str) -> Result<()> {
        self.page
            .goto(url)
            .await
            .map_err(|e| AppError::browser(format!("Navigation to {url} failed: {e}")))?;
        self.page
            .wait_for_navigation()
            .await
            .map_err(|e| AppError::browser(format!("Navigation to {url} failed: {e}")))?;
        Ok(())
    }

    async fn current_url(&self) -> Option<String> {
        self.page.url().await.ok().flatten()
    }

    async fn find(&self, locator: &str) -> Result<Option<Element>> {
        // CDP reports a missing node as an error; treat it as absence.
        match self.page.find_element(locator).await {
            Ok(element) => Ok(Some(element)),
            Err(e) => {
                log::trace!("No element for '{}': {}", locator, e);
                Ok(None)
            }
        }
    }

    async fn find_all(&self, locator: &str) -> Result<Vec<Element>> {
        self.page
            .find_elements(locator)
            .await
            .map_err(|e| AppError::browser(format!("Query '{locator}' failed: {e}")))
    }

    async fn find_in(&self, parent: &Element, locator: &str) -> Result<Option<Element>> {
        match parent.find_element(locator).await {
            Ok(element) => Ok(Some(element)),
            Err(e) => {
                log::trace!("No element for '{}' under parent: {}", locator, e);
                Ok(None)
            }
        }
    }

    async fn read_text(&self, element: &Element) -> Result<String> {
        let text = element
            .inner_text()
            .await
            .map_err(|e| AppError::browser(format!("Failed to read text: {e}")))?;
        Ok(text.unwrap_or_default().trim().to_string())
    }

    async fn read_attribute(&self, element: &Element, name: &str) -> Result<Option<String>> {
        element
            .attribute(name)
            .await
            .map_err(|e| AppError::browser(format!("Failed to read attribute '{name}': {e}")))
    }

    async fn click(&self, element: &Element) -> Result<()> {
        element
            .click()
            .await
            .map_err(|e| AppError::browser(format!("Click failed: {e}")))?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        let mut browser = self.browser.lock().await;
        browser
            .close()
            .await
            .map_err(|e| AppError::browser(format!("Failed to close browser: {e}")))?;
        browser.wait().await?;
        self.handler.abort();
        log::info!("Browser session closed");
        Ok(())
    }

    fn poll_interval(&self) -> Duration {
        self.poll_interval
    }
}

impl Drop for ChromeBrowser {
    fn drop(&mut self) {
        self.handler.abort();
    }
}
