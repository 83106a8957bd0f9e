// src/pipeline/scrape.rs

//! Scraping run: listing pages, then each film on them.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};

use crate::browser::Browser;
use crate::error::{AppError, Result};
use crate::models::Config;
use crate::services::{FieldExtractor, LinkCollector, accept_cookies, normalize};
use crate::storage::{PersistReport, StorageRouter};
use crate::utils::identifier_from_url;

/// What happened to one detail link.
#[derive(Debug)]
pub enum LinkOutcome {
    /// Extracted, normalized and handed to the sinks
    Scraped(PersistReport),
    /// Already stored, or already seen earlier in this run
    Duplicate,
    Failed(AppError),
}

/// A link that could not be scraped.
#[derive(Debug, Clone, PartialEq)]
pub struct FailedLink {
    pub url: String,
    /// [`AppError::kind`] label
    pub kind: &'static str,
    pub message: String,
}

/// Totals for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub pages_read: u32,
    pub links_seen: usize,
    pub scraped: usize,
    pub duplicates: usize,
    /// Scraped records where at least one sink did not succeed
    pub incomplete: usize,
    pub failed: Vec<FailedLink>,
    /// Set when a listing page failed and the collection stopped early
    pub listing_error: Option<String>,
}

impl RunSummary {
    fn start() -> Self {
        let now = Utc::now();
        Self {
            started_at: now,
            finished_at: now,
            pages_read: 0,
            links_seen: 0,
            scraped: 0,
            duplicates: 0,
            incomplete: 0,
            failed: Vec::new(),
            listing_error: None,
        }
    }

    fn record(&mut self, url: &str, outcome: &LinkOutcome) {
        match outcome {
            LinkOutcome::Scraped(report) => {
                self.scraped += 1;
                if !report.is_complete() {
                    self.incomplete += 1;
                }
            }
            LinkOutcome::Duplicate => self.duplicates += 1,
            LinkOutcome::Failed(e) => self.failed.push(FailedLink {
                url: url.to_string(),
                kind: e.kind(),
                message: e.to_string(),
            }),
        }
    }

    /// Failed links counted per error kind.
    pub fn failures_by_kind(&self) -> BTreeMap<&'static str, usize> {
        let mut counts = BTreeMap::new();
        for failure in &self.failed {
            *counts.entry(failure.kind).or_insert(0) += 1;
        }
        counts
    }

    pub fn log(&self) {
        let elapsed = self.finished_at - self.started_at;
        log::info!(
            "Run finished in {}s: {} pages, {} links, {} scraped, {} duplicates, {} failed",
            elapsed.num_seconds(),
            self.pages_read,
            self.links_seen,
            self.scraped,
            self.duplicates,
            self.failed.len()
        );
        if self.incomplete > 0 {
            log::warn!("{} records missed at least one sink", self.incomplete);
        }
        for (kind, count) in self.failures_by_kind() {
            log::warn!("  {}: {}", kind, count);
        }
        if let Some(error) = &self.listing_error {
            log::error!("Listing stopped early: {}", error);
        }
    }
}

/// Extract, normalize and persist one detail page.
pub async fn scrape_film<B: Browser>(
    extractor: &FieldExtractor<'_, B>,
    router: &StorageRouter,
    url: &str,
) -> Result<PersistReport> {
    let raw = extractor.extract(url).await?;
    let record = normalize(&raw)?;
    Ok(router.persist(&record).await)
}

async fn process_link<B: Browser>(
    extractor: &FieldExtractor<'_, B>,
    router: &StorageRouter,
    seen: &mut HashSet<String>,
    url: &str,
) -> LinkOutcome {
    let identifier = match identifier_from_url(url) {
        Ok(identifier) => identifier,
        Err(e) => return LinkOutcome::Failed(e),
    };
    if !seen.insert(identifier.clone()) {
        log::debug!("{} already handled in this run", identifier);
        return LinkOutcome::Duplicate;
    }

    match router.is_duplicate(&identifier).await {
        Ok(true) => {
            log::info!("{} already stored, skipping", identifier);
            return LinkOutcome::Duplicate;
        }
        Ok(false) => {}
        Err(e) => return LinkOutcome::Failed(e),
    }

    match scrape_film(extractor, router, url).await {
        Ok(report) => LinkOutcome::Scraped(report),
        Err(e) => LinkOutcome::Failed(e),
    }
}

/// Scrape every film on the configured listing pages.
///
/// A failing link is recorded and the run moves on. A failing listing page
/// stops the collection; links already read are still processed.
pub async fn run_scraper<B: Browser>(
    config: &Config,
    browser: &B,
    router: &StorageRouter,
) -> Result<RunSummary> {
    let mut summary = RunSummary::start();
    let catalogue = &config.catalogue;
    let page_delay = config.browser.page_delay();

    log::info!(
        "Scraping {} listing page(s) from page {}",
        catalogue.page_count,
        catalogue.start_page
    );

    if config.browser.accept_cookies {
        browser.navigate(&catalogue.listing_url(catalogue.start_page)).await?;
        accept_cookies(
            browser,
            &config.selectors.cookie_consent,
            config.browser.wait_timeout(),
        )
        .await?;
    }

    let collector = LinkCollector::new(browser, config)?;
    let extractor = FieldExtractor::new(browser, config);
    let mut seen = HashSet::new();
    let mut pages = collector.pages(catalogue.start_page, catalogue.page_count);

    while let Some(page) = pages.next().await {
        let (page_number, links) = match page {
            Ok(page) => page,
            Err(e) => {
                log::error!("Listing page failed, stopping collection: {}", e);
                summary.listing_error = Some(e.to_string());
                break;
            }
        };
        summary.pages_read += 1;

        let total = links.len();
        for (index, url) in links.iter().enumerate() {
            summary.links_seen += 1;
            log::info!("[page {} {}/{}] {}", page_number, index + 1, total, url);

            let outcome = process_link(&extractor, router, &mut seen, url).await;
            match &outcome {
                LinkOutcome::Scraped(report) if report.is_complete() => {
                    log::info!("Stored {}", report.identifier)
                }
                LinkOutcome::Scraped(report) => log::warn!(
                    "Stored {} with {} sink failure(s)",
                    report.identifier,
                    report.failures().count()
                ),
                LinkOutcome::Duplicate => {}
                LinkOutcome::Failed(e) => log::warn!("Failed {} [{}]: {}", url, e.kind(), e),
            }
            let visited = matches!(outcome, LinkOutcome::Scraped(_) | LinkOutcome::Failed(_));
            summary.record(url, &outcome);

            if visited && !page_delay.is_zero() {
                tokio::time::sleep(page_delay).await;
            }
        }
    }

    summary.finished_at = Utc::now();
    Ok(summary)
}

/// Run the scraper and release the browser and the sinks on every exit path.
pub async fn run_session<B: Browser>(
    config: &Config,
    browser: B,
    router: StorageRouter,
) -> Result<RunSummary> {
    let result = run_scraper(config, &browser, &router).await;

    let browser_closed = browser.close().await;
    let router_closed = router.close();

    match result {
        Ok(summary) => {
            browser_closed?;
            router_closed?;
            Ok(summary)
        }
        Err(e) => {
            if let Err(close_error) = browser_closed {
                log::warn!("Closing browser after failure: {}", close_error);
            }
            if let Err(close_error) = router_closed {
                log::warn!("Closing storage after failure: {}", close_error);
            }
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use tempfile::TempDir;

    use super::*;
    use crate::browser::FixtureBrowser;
    use crate::browser::fixture::FixtureElement;
    use crate::models::SinkSet;
    use crate::storage::LocalStorage;
    use crate::utils::http::PosterSource;

    /// Fixture browser that counts `close` calls.
    struct TrackedBrowser {
        inner: FixtureBrowser,
        closed: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Browser for TrackedBrowser {
        type Element = FixtureElement;

        async fn navigate(&self, url: &str) -> Result<()> {
            self.inner.navigate(url).await
        }

        async fn current_url(&self) -> Option<String> {
            self.inner.current_url().await
        }

        async fn find(&self, locator: &str) -> Result<Option<FixtureElement>> {
            self.inner.find(locator).await
        }

        async fn find_all(&self, locator: &str) -> Result<Vec<FixtureElement>> {
            self.inner.find_all(locator).await
        }

        async fn find_in(&self, parent: &FixtureElement, locator: &str) -> Result<Option<FixtureElement>> {
            self.inner.find_in(parent, locator).await
        }

        async fn read_text(&self, element: &FixtureElement) -> Result<String> {
            self.inner.read_text(element).await
        }

        async fn read_attribute(&self, element: &FixtureElement, name: &str) -> Result<Option<String>> {
            self.inner.read_attribute(element, name).await
        }

        async fn click(&self, element: &FixtureElement) -> Result<()> {
            self.inner.click(element).await
        }

        async fn close(&self) -> Result<()> {
            self.closed.fetch_add(1, Ordering::SeqCst);
            self.inner.close().await
        }

        fn poll_interval(&self) -> Duration {
            self.inner.poll_interval()
        }
    }

    struct NoPosters;

    #[async_trait]
    impl PosterSource for NoPosters {
        async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
            Err(AppError::validation(format!("unexpected poster fetch: {url}")))
        }
    }

    fn session_config(tmp: &TempDir) -> Config {
        let mut config = Config::default();
        config.browser.wait_timeout_secs = 1;
        config.browser.page_delay_ms = 0;
        config.storage.raw_data_dir = tmp.path().join("raw_data");
        config
    }

    fn router(config: &Config) -> StorageRouter {
        StorageRouter::new(
            SinkSet::default(),
            LocalStorage::new(&config.storage.raw_data_dir),
            Box::new(NoPosters),
        )
    }

    #[tokio::test]
    async fn test_session_closes_browser_when_run_fails() {
        let tmp = TempDir::new().unwrap();
        let mut config = session_config(&tmp);
        config.browser.accept_cookies = true;

        let closed = Arc::new(AtomicUsize::new(0));
        let browser = TrackedBrowser {
            inner: FixtureBrowser::new(),
            closed: closed.clone(),
        };

        let err = run_session(&config, browser, router(&config)).await.unwrap_err();
        assert_eq!(err.kind(), "browser");
        assert_eq!(closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_session_closes_browser_after_success() {
        let tmp = TempDir::new().unwrap();
        let mut config = session_config(&tmp);
        config.browser.accept_cookies = false;

        let closed = Arc::new(AtomicUsize::new(0));
        let browser = TrackedBrowser {
            inner: FixtureBrowser::new().with_page(
                config.catalogue.listing_url(1),
                r#"<html><body><ul class="poster-list"></ul></body></html>"#,
            ),
            closed: closed.clone(),
        };

        let summary = run_session(&config, browser, router(&config)).await.unwrap();
        assert_eq!(summary.pages_read, 1);
        assert_eq!(summary.links_seen, 0);
        assert_eq!(closed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_summary_counts_failures_by_kind() {
        let mut summary = RunSummary::start();
        summary.record("https://letterboxd.com/film/a/", &LinkOutcome::Duplicate);
        summary.record(
            "https://letterboxd.com/film/b/",
            &LinkOutcome::Failed(AppError::malformed("year", "soon")),
        );
        summary.record(
            "https://letterboxd.com/film/c/",
            &LinkOutcome::Failed(AppError::malformed("rating", "")),
        );

        assert_eq!(summary.duplicates, 1);
        assert_eq!(summary.failed.len(), 2);
        assert_eq!(summary.failures_by_kind().get("malformed_field"), Some(&2));
        assert_eq!(summary.failed[0].url, "https://letterboxd.com/film/b/");
    }
}
