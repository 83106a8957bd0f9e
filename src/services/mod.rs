//! Service layer for the crawler application.
//!
//! This module contains the scraping stages:
//! - Listing traversal (`LinkCollector`)
//! - Detail-page reading (`FieldExtractor`)
//! - Type coercion (`normalize`)
//! - Cookie dialog handling (`accept_cookies`)

mod consent;
mod extractor;
mod links;
pub mod normalizer;

pub use consent::accept_cookies;
pub use extractor::FieldExtractor;
pub use links::{LinkCollector, ListingPages};
pub use normalizer::normalize;
