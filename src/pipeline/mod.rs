//! Pipeline entry points for crawler operations.
//!
//! - `run_scraper`: Listing pages → detail pages → sinks
//! - `run_session`: `run_scraper` with guaranteed release of the browser and sinks
//! - `RetryPolicy`: Bounded reload-and-retry for detail pages

pub mod retry;
pub mod scrape;

pub use retry::{RetryDecision, RetryPolicy};
pub use scrape::{FailedLink, LinkOutcome, RunSummary, run_scraper, run_session, scrape_film};
