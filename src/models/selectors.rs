// src/models/selectors.rs

//! CSS locators for the catalogue's listing and detail pages.

use scraper::Selector;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// CSS locators for every element the crawler reads or clicks.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilmSelectors {
    /// Cookie consent button shown on first visit
    pub cookie_consent: String,

    /// Poster grid on a listing page
    pub listing_container: String,

    /// One listed film on a listing page
    pub listing_item: String,

    /// Link to the detail page, looked up inside each listed film
    pub listing_link: String,

    /// Attribute holding the detail-page URL
    pub listing_link_attr: String,

    pub title: String,
    pub year: String,
    pub runtime: String,
    pub rating: String,

    pub watches: String,
    pub lists: String,
    pub likes: String,

    /// Tooltip attribute carrying the exact stat count
    pub stat_attr: String,

    /// Director links, in page order
    pub director: String,

    /// Optional "Top 250" badge
    pub rank: String,

    /// Container that must be present before the description is read
    pub description_container: String,

    /// "More" control that expands a condensed description
    pub description_more: String,

    /// Fully expanded description
    pub description_expanded: String,

    /// Collapsed description paragraph
    pub description_paragraph: String,

    pub poster: String,
    pub poster_attr: String,
}

impl Default for FilmSelectors {
    fn default() -> Self {
        Self {
            cookie_consent: "button.fc-cta-consent".to_string(),
            listing_container: "ul.poster-list".to_string(),
            listing_item: "ul.poster-list > li".to_string(),
            listing_link: "a".to_string(),
            listing_link_attr: "href".to_string(),
            title: "h1.headline-1".to_string(),
            year: "a[href^='/films/year/']".to_string(),
            runtime: "p.text-link.text-footer".to_string(),
            rating: "a.display-rating".to_string(),
            watches: "a.icon-watched".to_string(),
            lists: "a.icon-list".to_string(),
            likes: "a.icon-liked".to_string(),
            stat_attr: "data-original-title".to_string(),
            director: "a[href^='/director/']".to_string(),
            rank: "a.icon-top250".to_string(),
            description_container: "div.review.body-text".to_string(),
            description_more: "span.condense_control_more".to_string(),
            description_expanded: "div.truncate.condenseable".to_string(),
            description_paragraph: "div.review.body-text p".to_string(),
            poster: "div.react-component.poster img".to_string(),
            poster_attr: "src".to_string(),
        }
    }
}

impl FilmSelectors {
    /// All locators, labelled by their config key.
    fn locators(&self) -> [(&'static str, &str); 18] {
        [
            ("cookie_consent", self.cookie_consent.as_str()),
            ("listing_container", self.listing_container.as_str()),
            ("listing_item", self.listing_item.as_str()),
            ("listing_link", self.listing_link.as_str()),
            ("title", self.title.as_str()),
            ("year", self.year.as_str()),
            ("runtime", self.runtime.as_str()),
            ("rating", self.rating.as_str()),
            ("watches", self.watches.as_str()),
            ("lists", self.lists.as_str()),
            ("likes", self.likes.as_str()),
            ("director", self.director.as_str()),
            ("rank", self.rank.as_str()),
            ("description_container", self.description_container.as_str()),
            ("description_more", self.description_more.as_str()),
            ("description_expanded", self.description_expanded.as_str()),
            ("description_paragraph", self.description_paragraph.as_str()),
            ("poster", self.poster.as_str()),
        ]
    }

    /// Check that every locator parses as a CSS selector.
    pub fn validate(&self) -> Result<()> {
        for (key, locator) in self.locators() {
            parse_selector(locator).map_err(|e| {
                AppError::validation(format!("selectors.{key}: {e}"))
            })?;
        }
        let attrs = [&self.listing_link_attr, &self.stat_attr, &self.poster_attr];
        if attrs.iter().any(|a| a.trim().is_empty()) {
            return Err(AppError::validation("selector attribute names must be set"));
        }
        Ok(())
    }
}

/// Parse a CSS selector, mapping failures into [`AppError::Selector`].
pub fn parse_selector(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
}
