//! Utility functions and helpers.

pub mod http;

use url::Url;

use crate::error::{AppError, Result};

/// Resolve a potentially relative URL against a base URL.
pub fn resolve_url(base: &Url, href: &str) -> String {
    base.join(href)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| href.to_string())
}

/// Film slug from a detail URL such as `https://letterboxd.com/film/ratatouille/`.
///
/// This is the fourth `/`-separated segment of the URL string, i.e. the path
/// segment after `film`.
pub fn identifier_from_url(url: &str) -> Result<String> {
    let parsed = Url::parse(url)?;
    parsed
        .path_segments()
        .and_then(|mut segments| segments.nth(1))
        .filter(|slug| !slug.is_empty())
        .map(str::to_string)
        .ok_or_else(|| AppError::validation(format!("No film identifier in URL: {url}")))
}
