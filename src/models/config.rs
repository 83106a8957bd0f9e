//! Application configuration structures.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::{FilmSelectors, Sink, SinkSet};

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Where the listing pages live
    #[serde(default)]
    pub catalogue: CatalogueConfig,

    /// Browser session settings
    #[serde(default)]
    pub browser: BrowserConfig,

    /// Detail-page extraction rules
    #[serde(default)]
    pub extraction: ExtractionConfig,

    /// CSS locators
    #[serde(default)]
    pub selectors: FilmSelectors,

    /// Storage destinations
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.catalogue.base_url.trim().is_empty() {
            return Err(AppError::validation("catalogue.base_url is empty"));
        }
        url::Url::parse(&self.catalogue.base_url)?;
        if !self.catalogue.listing_path.contains("{page}") {
            return Err(AppError::validation(
                "catalogue.listing_path must contain a {page} placeholder",
            ));
        }
        if self.catalogue.start_page == 0 {
            return Err(AppError::validation("catalogue.start_page must be > 0"));
        }
        if self.catalogue.page_count == 0 {
            return Err(AppError::validation("catalogue.page_count must be > 0"));
        }
        if self.browser.wait_timeout_secs == 0 {
            return Err(AppError::validation("browser.wait_timeout_secs must be > 0"));
        }
        if self.extraction.max_attempts == 0 {
            return Err(AppError::validation("extraction.max_attempts must be >= 1"));
        }
        if self.extraction.max_directors == 0 {
            return Err(AppError::validation("extraction.max_directors must be >= 1"));
        }
        if self.extraction.truncation_marker.is_empty() {
            return Err(AppError::validation(
                "extraction.truncation_marker must not be empty",
            ));
        }
        let factor = self.extraction.backoff_factor;
        if !factor.is_finite() || factor < 1.0 {
            return Err(AppError::validation(
                "extraction.backoff_factor must be a finite number >= 1.0",
            ));
        }
        if self.storage.sinks.contains(Sink::ObjectStore) && self.storage.bucket.trim().is_empty()
        {
            return Err(AppError::validation(
                "storage.bucket is required when the object_store sink is enabled",
            ));
        }
        self.selectors.validate()
    }
}

/// Listing-page location and paging.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogueConfig {
    /// Site root, also used to resolve relative detail links
    pub base_url: String,

    /// Listing path with a `{page}` placeholder
    pub listing_path: String,

    /// First listing page to read (1-based)
    pub start_page: u32,

    /// Number of consecutive listing pages
    pub page_count: u32,
}

impl Default for CatalogueConfig {
    fn default() -> Self {
        Self {
            base_url: "https://letterboxd.com".to_string(),
            listing_path: "/films/popular/size/small/page/{page}/".to_string(),
            start_page: 1,
            page_count: 1,
        }
    }
}

impl CatalogueConfig {
    /// Absolute URL of a listing page.
    pub fn listing_url(&self, page: u32) -> String {
        let path = self.listing_path.replace("{page}", &page.to_string());
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}

/// Browser session settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    pub headless: bool,
    pub window_width: u32,
    pub window_height: u32,

    /// User agent override
    pub user_agent: Option<String>,

    /// Bounded wait for an element to appear, in seconds
    pub wait_timeout_secs: u64,

    /// How often a pending wait re-queries the page
    pub poll_interval_ms: u64,

    /// Dismiss the cookie consent dialog before reading listings
    pub accept_cookies: bool,

    /// Pause between page visits
    pub page_delay_ms: u64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            window_width: 1920,
            window_height: 1080,
            user_agent: None,
            wait_timeout_secs: 10,
            poll_interval_ms: 250,
            accept_cookies: true,
            page_delay_ms: 1000,
        }
    }
}

impl BrowserConfig {
    pub fn wait_timeout(&self) -> Duration {
        Duration::from_secs(self.wait_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn page_delay(&self) -> Duration {
        Duration::from_millis(self.page_delay_ms)
    }
}

/// Detail-page extraction rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Page loads per film before giving up
    pub max_attempts: u32,

    /// Delay before the first reload
    pub backoff_ms: u64,

    /// Multiplier applied to the delay after each reload
    pub backoff_factor: f64,

    /// Director names kept per film
    pub max_directors: usize,

    /// Anything after this character in an expanded description is dropped
    pub truncation_marker: String,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_ms: 1000,
            backoff_factor: 2.0,
            max_directors: 2,
            truncation_marker: "×".to_string(),
        }
    }
}

/// Storage destinations and their locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Enabled sinks
    pub sinks: SinkSet,

    /// Root of the per-film artifact directories
    pub raw_data_dir: PathBuf,

    pub csv_path: PathBuf,
    pub database_path: PathBuf,

    /// Bucket for the object store sink
    pub bucket: String,

    /// Key prefix in the bucket; artifacts land under `{prefix}/<id>/...`
    pub prefix: String,

    pub poster_timeout_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            sinks: SinkSet::default(),
            raw_data_dir: PathBuf::from("raw_data"),
            csv_path: PathBuf::from("film_data.csv"),
            database_path: PathBuf::from("film_data.db"),
            bucket: String::new(),
            prefix: "raw_data".to_string(),
            poster_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_default_config_ok() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_attempts() {
        let mut config = Config::default();
        config.extraction.max_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_non_finite_backoff_factor() {
        for factor in [f64::INFINITY, f64::NAN, 0.5] {
            let mut config = Config::default();
            config.extraction.backoff_factor = factor;
            assert!(config.validate().is_err(), "factor {factor} accepted");
        }

        let mut config = Config::default();
        config.extraction.backoff_factor = 1.5;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_requires_bucket_for_object_store() {
        let mut config = Config::default();
        config.storage.sinks = SinkSet::empty().with(Sink::ObjectStore);
        assert!(config.validate().is_err());

        config.storage.bucket = "film-data-bucket".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_listing_path_without_placeholder() {
        let mut config = Config::default();
        config.catalogue.listing_path = "/films/popular/".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_listing_url_substitutes_page() {
        let catalogue = CatalogueConfig::default();
        assert_eq!(
            catalogue.listing_url(3),
            "https://letterboxd.com/films/popular/size/small/page/3/"
        );
    }

    #[test]
    fn test_partial_file_falls_back_to_defaults() {
        let config: Config = toml::from_str(
            r#"
            [catalogue]
            page_count = 4

            [storage]
            sinks = ["flat_file"]
            "#,
        )
        .unwrap();
        assert_eq!(config.catalogue.page_count, 4);
        assert_eq!(config.catalogue.start_page, 1);
        assert_eq!(config.browser.wait_timeout_secs, 10);
        assert!(config.storage.sinks.contains(Sink::FlatFile));
        assert_eq!(config.extraction.max_directors, 2);
    }
}
