// src/services/extractor.rs

//! Detail-page field extraction.
//!
//! Reads one film's detail page through the [`Browser`] collaborator and
//! returns the untyped [`RawFilmRecord`]. Every mandatory field goes through
//! a bounded wait before it is read. The whole page is reloaded, under the
//! configured [`RetryPolicy`], when the description comes back empty or an
//! element never shows up.

use std::time::Duration;

use chrono::Utc;
use uuid::Uuid;

use crate::browser::Browser;
use crate::error::{AppError, Result};
use crate::models::{Config, ExtractionConfig, FilmSelectors, RawFilmRecord};
use crate::pipeline::retry::RetryPolicy;
use crate::services::normalizer::{head_segment, numeric_token};
use crate::utils::identifier_from_url;

/// Extracts raw film records from detail pages.
pub struct FieldExtractor<'a, B: Browser> {
    browser: &'a B,
    selectors: FilmSelectors,
    rules: ExtractionConfig,
    wait_timeout: Duration,
    retry: RetryPolicy,
}

impl<'a, B: Browser> FieldExtractor<'a, B> {
    pub fn new(browser: &'a B, config: &Config) -> Self {
        Self {
            browser,
            selectors: config.selectors.clone(),
            rules: config.extraction.clone(),
            wait_timeout: config.browser.wait_timeout(),
            retry: RetryPolicy::from_config(&config.extraction),
        }
    }

    /// Replace the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Extract one detail page, reloading it on transient failures.
    pub async fn extract(&self, url: &str) -> Result<RawFilmRecord> {
        let identifier = identifier_from_url(url)?;
        self.retry
            .run(|attempt| self.extract_once(url, &identifier, attempt))
            .await
    }

    async fn extract_once(&self, url: &str, identifier: &str, attempt: u32) -> Result<RawFilmRecord> {
        log::debug!("Loading {} (attempt {})", url, attempt);
        self.browser.navigate(url).await?;
        let s = &self.selectors;

        let title = self.text_field(&s.title).await?;
        let year = self.text_field(&s.year).await?;
        let runtime = self.text_field(&s.runtime).await?;
        let rating = self.text_field(&s.rating).await?;

        let watch_count = self.stat_field(&s.watches).await?;
        let list_count = self.stat_field(&s.lists).await?;
        let like_count = self.stat_field(&s.likes).await?;

        let directors = self.directors().await?;
        let rank = self.rank().await?;

        let description = self.description().await?;
        if description.is_empty() {
            return Err(AppError::TransientExtractionFailure {
                url: url.to_string(),
                attempts: attempt,
            });
        }

        let poster_url = self.poster_url().await?;

        Ok(RawFilmRecord {
            identifier: identifier.to_string(),
            external_id: Uuid::new_v4().to_string(),
            title,
            year,
            runtime,
            rating,
            watch_count,
            list_count,
            like_count,
            directors,
            rank,
            description,
            poster_url,
            retrieved_at: Utc::now(),
        })
    }

    /// Visible text up to the first double space.
    async fn text_field(&self, locator: &str) -> Result<String> {
        let element = self.browser.wait_until_present(locator, self.wait_timeout).await?;
        let text = self.browser.read_text(&element).await?;
        Ok(head_segment(&text).to_string())
    }

    /// Exact count from the tooltip attribute; the visible text is abbreviated.
    async fn stat_field(&self, locator: &str) -> Result<String> {
        let element = self.browser.wait_until_present(locator, self.wait_timeout).await?;
        let tooltip = self
            .browser
            .read_attribute(&element, &self.selectors.stat_attr)
            .await?
            .unwrap_or_default();
        // Unparseable tooltips are passed through so the normalizer can name them.
        Ok(numeric_token(&tooltip)
            .map(str::to_string)
            .unwrap_or(tooltip))
    }

    async fn directors(&self) -> Result<Vec<String>> {
        let locator = &self.selectors.director;
        self.browser.wait_until_present(locator, self.wait_timeout).await?;

        let mut names: Vec<String> = Vec::new();
        for element in self.browser.find_all(locator).await? {
            let name = self.browser.read_text(&element).await?;
            if !name.is_empty() && !names.contains(&name) {
                names.push(name);
            }
        }

        if names.len() > self.rules.max_directors {
            log::debug!(
                "Keeping {} of {} directors: dropping {:?}",
                self.rules.max_directors,
                names.len(),
                &names[self.rules.max_directors..]
            );
            names.truncate(self.rules.max_directors);
        }
        Ok(names)
    }

    /// Ranking badge text, `None` when the film has no badge.
    async fn rank(&self) -> Result<Option<String>> {
        match self.browser.find(&self.selectors.rank).await? {
            Some(element) => {
                let text = self.browser.read_text(&element).await?;
                Ok(Some(text).filter(|t| !t.is_empty()))
            }
            None => Ok(None),
        }
    }

    /// Full synopsis, expanding the collapsed text when a "more" control exists.
    async fn description(&self) -> Result<String> {
        let s = &self.selectors;
        self.browser
            .wait_until_present(&s.description_container, self.wait_timeout)
            .await?;

        if let Some(more) = self.browser.find(&s.description_more).await? {
            match self.expanded_description(&more).await {
                Ok(Some(text)) => return Ok(text),
                Ok(None) => log::debug!("Expanded description not found, using paragraph"),
                Err(e) => log::debug!("Expanding description failed ({}), using paragraph", e),
            }
        }

        match self.browser.find(&s.description_paragraph).await? {
            Some(paragraph) => Ok(self.browser.read_text(&paragraph).await?.trim().to_string()),
            None => Ok(String::new()),
        }
    }

    async fn expanded_description(&self, more: &B::Element) -> Result<Option<String>> {
        self.browser.click(more).await?;
        let Some(expanded) = self.browser.find(&self.selectors.description_expanded).await? else {
            return Ok(None);
        };
        let text = self.browser.read_text(&expanded).await?;
        let before_marker = text
            .split(self.rules.truncation_marker.as_str())
            .next()
            .unwrap_or_default()
            .trim();
        Ok(Some(before_marker.to_string()))
    }

    async fn poster_url(&self) -> Result<String> {
        let element = self
            .browser
            .wait_until_present(&self.selectors.poster, self.wait_timeout)
            .await?;
        let src = self
            .browser
            .read_attribute(&element, &self.selectors.poster_attr)
            .await?
            .unwrap_or_default();
        if src.trim().is_empty() {
            return Err(AppError::malformed("poster_link", src));
        }
        Ok(src.trim().to_string())
    }
}
