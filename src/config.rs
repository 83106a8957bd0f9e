// src/config.rs

//! Configuration loading utilities.
//!
//! Reads the TOML file, applies environment overrides and validates the
//! result before any browser or sink is opened.

use std::path::Path;

use crate::error::Result;
use crate::models::Config;

/// Environment variable overriding `storage.bucket`.
pub const BUCKET_ENV: &str = "S3_BUCKET";

/// Load configuration from a TOML file.
///
/// A missing file falls back to defaults. A file that exists but does not
/// parse is an error.
pub fn load_config(path: &Path) -> Result<Config> {
    let mut config = if path.exists() {
        let config = Config::load(path)?;
        log::info!("Loaded configuration from {}", path.display());
        config
    } else {
        log::warn!(
            "Config file {} not found, using default configuration",
            path.display()
        );
        Config::default()
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    config.validate()?;
    Ok(config)
}

/// Apply overrides read through `lookup`.
pub fn apply_env_overrides(config: &mut Config, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(bucket) = lookup(BUCKET_ENV).filter(|b| !b.trim().is_empty()) {
        log::debug!("Bucket overridden by {}", BUCKET_ENV);
        config.storage.bucket = bucket.trim().to_string();
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;
    use crate::models::Sink;

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = load_config(Path::new("/nonexistent/crawler.toml")).unwrap();
        assert_eq!(config.catalogue.page_count, 1);
        assert_eq!(config.extraction.max_directors, 2);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[catalogue]
start_page = 4
page_count = 2

[storage]
sinks = ["local_raw_files", "flat_file"]
csv_path = "out/film_data.csv"
"#
        )
        .unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.catalogue.start_page, 4);
        assert_eq!(config.catalogue.base_url, "https://letterboxd.com");
        assert!(config.storage.sinks.contains(Sink::FlatFile));
        assert!(!config.storage.sinks.contains(Sink::ObjectStore));
        assert_eq!(config.browser.wait_timeout_secs, 10);
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[extraction]\nmax_attempts = 0").unwrap();
        assert!(load_config(file.path()).is_err());

        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[storage]\nsinks = [\"ftp\"]").unwrap();
        assert!(load_config(file.path()).is_err());
    }

    #[test]
    fn test_bucket_env_override() {
        let mut config = Config::default();
        apply_env_overrides(&mut config, |key| {
            (key == BUCKET_ENV).then(|| "film-data-bucket".to_string())
        });
        assert_eq!(config.storage.bucket, "film-data-bucket");

        apply_env_overrides(&mut config, |_| Some("  ".to_string()));
        assert_eq!(config.storage.bucket, "film-data-bucket");
    }
}
