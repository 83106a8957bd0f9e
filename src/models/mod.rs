// src/models/mod.rs

//! Domain models for the crawler application.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod config;
mod film;
mod selectors;
mod sinks;

// Re-export all public types
pub use config::{
    BrowserConfig, CatalogueConfig, Config, ExtractionConfig, LoggingConfig, StorageConfig,
};
pub use film::{NormalizedFilmRecord, RawFilmRecord, data_key, poster_key};
pub use selectors::{FilmSelectors, parse_selector};
pub use sinks::{Sink, SinkSet};
