// src/services/links.rs

//! Listing-page link collection.

use std::time::Duration;

use url::Url;

use crate::browser::Browser;
use crate::error::Result;
use crate::models::{CatalogueConfig, Config, FilmSelectors};
use crate::utils::resolve_url;

/// Reads detail-page links from paginated listing pages.
pub struct LinkCollector<'a, B: Browser> {
    browser: &'a B,
    catalogue: CatalogueConfig,
    selectors: FilmSelectors,
    base: Url,
    wait_timeout: Duration,
    page_delay: Duration,
}

impl<'a, B: Browser> LinkCollector<'a, B> {
    pub fn new(browser: &'a B, config: &Config) -> Result<Self> {
        Ok(Self {
            browser,
            base: Url::parse(&config.catalogue.base_url)?,
            catalogue: config.catalogue.clone(),
            selectors: config.selectors.clone(),
            wait_timeout: config.browser.wait_timeout(),
            page_delay: config.browser.page_delay(),
        })
    }

    /// Absolute detail URLs on one listing page, in page order.
    ///
    /// One URL per listed film: the first link inside each item. Fails with
    /// `PageLoadTimeout` when the listing container never appears.
    pub async fn links_on_page(&self, page: u32) -> Result<Vec<String>> {
        let url = self.catalogue.listing_url(page);
        log::info!("Reading listing page {} ({})", page, url);
        self.browser.navigate(&url).await?;
        self.browser
            .wait_until_present(&self.selectors.listing_container, self.wait_timeout)
            .await?;

        let mut links = Vec::new();
        for item in self.browser.find_all(&self.selectors.listing_item).await? {
            let Some(anchor) = self.browser.find_in(&item, &self.selectors.listing_link).await? else {
                log::debug!("Listing item without a link on page {}", page);
                continue;
            };
            match self
                .browser
                .read_attribute(&anchor, &self.selectors.listing_link_attr)
                .await?
            {
                Some(href) if !href.trim().is_empty() => {
                    links.push(resolve_url(&self.base, href.trim()));
                }
                _ => log::debug!("Listing item with an empty link on page {}", page),
            }
        }

        log::info!("Found {} links on page {}", links.len(), page);
        Ok(links)
    }

    /// Lazy walk over `count` listing pages starting at `start`.
    pub fn pages(&self, start: u32, count: u32) -> ListingPages<'_, 'a, B> {
        ListingPages {
            collector: self,
            next_page: start,
            end: start.saturating_add(count),
            visited: 0,
            failed: false,
        }
    }

    /// Links from `count` pages starting at `start`, page order then in-page order.
    ///
    /// Stops at the first page that fails.
    pub async fn collect_links(&self, start: u32, count: u32) -> Result<Vec<String>> {
        let mut pages = self.pages(start, count);
        let mut links = Vec::new();
        while let Some(result) = pages.next().await {
            let (_, page_links) = result?;
            links.extend(page_links);
        }
        Ok(links)
    }
}

/// Listing pages visited one at a time.
///
/// Each call to [`ListingPages::next`] navigates, so the walk cannot be
/// restarted. It ends after the last page or after the first error.
pub struct ListingPages<'c, 'a, B: Browser> {
    collector: &'c LinkCollector<'a, B>,
    next_page: u32,
    end: u32,
    visited: u32,
    failed: bool,
}

impl<B: Browser> ListingPages<'_, '_, B> {
    /// Next page number and its links.
    pub async fn next(&mut self) -> Option<Result<(u32, Vec<String>)>> {
        if self.failed || self.next_page >= self.end {
            return None;
        }

        let delay = self.collector.page_delay;
        if self.visited > 0 && !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let page = self.next_page;
        self.next_page += 1;
        self.visited += 1;

        match self.collector.links_on_page(page).await {
            Ok(links) => Some(Ok((page, links))),
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }

    /// Pages left to visit.
    pub fn remaining(&self) -> u32 {
        if self.failed {
            0
        } else {
            self.end.saturating_sub(self.next_page)
        }
    }
}
