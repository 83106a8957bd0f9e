//! Browser automation collaborator.
//!
//! The crawler never talks to a browser engine directly. Every stage goes
//! through [`Browser`], which exposes the handful of primitives the pipeline
//! needs: navigate, find, read text or attributes, click, and a bounded wait
//! for an element to appear.
//!
//! - [`chrome::ChromeBrowser`] drives a real Chromium session (feature `chrome`)
//! - [`fixture::FixtureBrowser`] serves static HTML documents, for tests

#[cfg(feature = "chrome")]
pub mod chrome;
pub mod fixture;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::{AppError, Result};

#[cfg(feature = "chrome")]
pub use chrome::ChromeBrowser;
pub use fixture::FixtureBrowser;

/// A single shared browser session.
///
/// Locators are CSS selectors. Methods that look an element up return
/// `Ok(None)` when nothing matches; only [`Browser::wait_until_present`]
/// turns absence into an error.
#[async_trait]
pub trait Browser: Send + Sync {
    /// Handle to an element on the current page.
    type Element: Send + Sync;

    /// Load `url` in the session, replacing the current page.
    async fn navigate(&self, url: &str) -> Result<()>;

    /// URL of the page currently loaded, if any.
    async fn current_url(&self) -> Option<String>;

    async fn find(&self, locator: &str) -> Result<Option<Self::Element>>;

    async fn find_all(&self, locator: &str) -> Result<Vec<Self::Element>>;

    /// First element under `parent` matching `locator`.
    async fn find_in(&self, parent: &Self::Element, locator: &str) -> Result<Option<Self::Element>>;

    /// Rendered text of an element, trimmed.
    async fn read_text(&self, element: &Self::Element) -> Result<String>;

    async fn read_attribute(&self, element: &Self::Element, name: &str) -> Result<Option<String>>;

    async fn click(&self, element: &Self::Element) -> Result<()>;

    /// Release the session. Further calls may fail.
    async fn close(&self) -> Result<()> {
        Ok(())
    }

    /// Delay between two lookups while waiting for an element.
    fn poll_interval(&self) -> Duration {
        Duration::from_millis(250)
    }

    /// Wait until `locator` matches, for at most `timeout`.
    ///
    /// Fails with [`AppError::PageLoadTimeout`] once the deadline passes.
    async fn wait_until_present(&self, locator: &str, timeout: Duration) -> Result<Self::Element> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if let Some(element) = self.find(locator).await? {
                return Ok(element);
            }

            let now = tokio::time::Instant::now();
            if now >= deadline {
                let url = self.current_url().await.unwrap_or_default();
                return Err(AppError::timeout(locator, url, timeout));
            }
            tokio::time::sleep(self.poll_interval().min(deadline - now)).await;
        }
    }
}
