//! Static-document browser.
//!
//! Serves pre-recorded HTML per URL and answers lookups with `scraper`.
//! Scripts never run, so clicks are recorded but change nothing; pages that
//! need an expanded state should contain it already.
//!
//! A URL may be registered with several documents. Each navigation consumes
//! the next one and the last stays in place, which is how reload behaviour
//! is exercised.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use scraper::{ElementRef, Html};

use crate::browser::Browser;
use crate::error::{AppError, Result};
use crate::models::parse_selector;

/// Snapshot of an element taken when it was looked up.
#[derive(Debug, Clone, PartialEq)]
pub struct FixtureElement {
    pub locator: String,
    pub index: usize,
    text: String,
    html: String,
    attributes: HashMap<String, String>,
}

#[derive(Default)]
struct State {
    pages: HashMap<String, VecDeque<String>>,
    current: Option<(String, String)>,
    navigations: Vec<String>,
    clicks: Vec<String>,
}

/// Browser over static HTML documents.
#[derive(Default)]
pub struct FixtureBrowser {
    state: Mutex<State>,
}

impl FixtureBrowser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the document served for `url`.
    pub fn with_page(self, url: impl Into<String>, html: impl Into<String>) -> Self {
        self.with_pages(url, [html.into()])
    }

    /// Register successive documents served for `url`, one per navigation.
    pub fn with_pages<I, S>(self, url: impl Into<String>, documents: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if let Ok(mut state) = self.state.lock() {
            state
                .pages
                .insert(url.into(), documents.into_iter().map(Into::into).collect());
        }
        self
    }

    /// URLs navigated to so far, in order.
    pub fn navigations(&self) -> Vec<String> {
        self.state
            .lock()
            .map(|s| s.navigations.clone())
            .unwrap_or_default()
    }

    /// Locators of clicked elements, in order.
    pub fn clicks(&self) -> Vec<String> {
        self.state
            .lock()
            .map(|s| s.clicks.clone())
            .unwrap_or_default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|e| AppError::browser(format!("fixture state poisoned: {e}")))
    }

    fn current_document(&self) -> Result<String> {
        self.lock()?
            .current
            .as_ref()
            .map(|(_, html)| html.clone())
            .ok_or_else(|| AppError::browser("no page loaded"))
    }

    fn select(&self, locator: &str) -> Result<Vec<FixtureElement>> {
        let selector = parse_selector(locator)?;
        let html = self.current_document()?;
        let document = Html::parse_document(&html);

        let elements = document
            .select(&selector)
            .enumerate()
            .map(|(index, el)| snapshot(locator, index, el))
            .collect();
        Ok(elements)
    }

    fn select_in(&self, parent: &FixtureElement, locator: &str) -> Result<Option<FixtureElement>> {
        let selector = parse_selector(locator)?;
        let fragment = Html::parse_fragment(&parent.html);
        Ok(fragment
            .select(&selector)
            .next()
            .map(|el| snapshot(locator, 0, el)))
    }
}

fn snapshot(locator: &str, index: usize, el: ElementRef<'_>) -> FixtureElement {
    FixtureElement {
        locator: locator.to_string(),
        index,
        text: el.text().collect::<String>().trim().to_string(),
        html: el.html(),
        attributes: el
            .value()
            .attrs()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
    }
}

#[async_trait]
impl Browser for FixtureBrowser {
    type Element = FixtureElement;

    async fn navigate(&self, url: &str) -> Result<()> {
        let mut state = self.lock()?;
        state.navigations.push(url.to_string());

        let queue = state
            .pages
            .get_mut(url)
            .ok_or_else(|| AppError::browser(format!("no fixture registered for {url}")))?;
        let html = if queue.len() > 1 {
            queue.pop_front().unwrap_or_default()
        } else {
            queue.front().cloned().unwrap_or_default()
        };
        state.current = Some((url.to_string(), html));
        Ok(())
    }

    async fn current_url(&self) -> Option<String> {
        self.state
            .lock()
            .ok()
            .and_then(|s| s.current.as_ref().map(|(url, _)| url.clone()))
    }

    async fn find(&self, locator: &str) -> Result<Option<FixtureElement>> {
        Ok(self.select(locator)?.into_iter().next())
    }

    async fn find_all(&self, locator: &str) -> Result<Vec<FixtureElement>> {
        self.select(locator)
    }

    async fn find_in(&self, parent: &FixtureElement, locator: &str) -> Result<Option<FixtureElement>> {
        self.select_in(parent, locator)
    }

    async fn read_text(&self, element: &FixtureElement) -> Result<String> {
        Ok(element.text.clone())
    }

    async fn read_attribute(&self, element: &FixtureElement, name: &str) -> Result<Option<String>> {
        Ok(element.attributes.get(name).cloned())
    }

    async fn click(&self, element: &FixtureElement) -> Result<()> {
        self.lock()?.clicks.push(element.locator.clone());
        Ok(())
    }

    fn poll_interval(&self) -> Duration {
        Duration::from_millis(5)
    }
}
