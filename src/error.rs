// src/error.rs

//! Unified error handling for the crawler application.

use std::fmt;

use thiserror::Error;

/// Result type alias for crawler operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// A required element did not appear within the bounded wait.
    #[error("Timed out after {timeout_secs:.1}s waiting for '{locator}' on {url}")]
    PageLoadTimeout {
        locator: String,
        url: String,
        timeout_secs: f64,
    },

    /// A scraped value could not be coerced to its expected type.
    #[error("Malformed field '{field}': {value:?}")]
    MalformedField { field: String, value: String },

    /// A mandatory field stayed empty after every reload attempt.
    #[error("Extraction of {url} still incomplete after {attempts} attempt(s)")]
    TransientExtractionFailure { url: String, attempts: u32 },

    /// Browser automation failed
    #[error("Browser error: {0}")]
    Browser(String),

    /// AWS S3 error
    #[error("S3 error: {0}")]
    S3(String),

    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// SQLite operation failed
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Schema migration failed
    #[error("Migration error: {0}")]
    Migration(#[from] rusqlite_migration::Error),

    /// CSV writing failed
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// CSS selector parsing failed
    #[error("Invalid selector '{selector}': {message}")]
    Selector { selector: String, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),
}

impl AppError {
    /// Create a page load timeout error.
    pub fn timeout(
        locator: impl Into<String>,
        url: impl Into<String>,
        timeout: std::time::Duration,
    ) -> Self {
        Self::PageLoadTimeout {
            locator: locator.into(),
            url: url.into(),
            timeout_secs: timeout.as_secs_f64(),
        }
    }

    /// Create a malformed field error.
    pub fn malformed(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::MalformedField {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Create a browser error.
    pub fn browser(message: impl fmt::Display) -> Self {
        Self::Browser(message.to_string())
    }

    /// Create an S3 error.
    pub fn s3(message: impl fmt::Display) -> Self {
        Self::S3(message.to_string())
    }

    /// Create a selector parsing error.
    pub fn selector(selector: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Selector {
            selector: selector.into(),
            message: message.to_string(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Short, stable label used in run reports.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::PageLoadTimeout { .. } => "page_load_timeout",
            Self::MalformedField { .. } => "malformed_field",
            Self::TransientExtractionFailure { .. } => "transient_extraction_failure",
            Self::Browser(_) => "browser",
            Self::S3(_) => "s3",
            Self::Io(_) => "io",
            Self::Http(_) => "http",
            Self::Json(_) => "json",
            Self::Toml(_) => "toml",
            Self::Url(_) => "url",
            Self::Database(_) | Self::Migration(_) => "database",
            Self::Csv(_) => "csv",
            Self::Selector { .. } => "selector",
            Self::Config(_) => "config",
            Self::Validation(_) => "validation",
        }
    }

    /// Whether a fresh page load may clear this error.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::PageLoadTimeout { .. } | Self::TransientExtractionFailure { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_kind_labels() {
        let err = AppError::timeout("div.review", "https://example.com/film/x/", Duration::from_secs(10));
        assert_eq!(err.kind(), "page_load_timeout");
        assert!(err.is_transient());

        let err = AppError::malformed("year", "19x8");
        assert_eq!(err.kind(), "malformed_field");
        assert!(!err.is_transient());
    }

    #[test]
    fn test_malformed_message_names_field() {
        let err = AppError::malformed("rating", "four");
        assert!(err.to_string().contains("rating"));
        assert!(err.to_string().contains("four"));
    }
}
