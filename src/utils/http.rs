// src/utils/http.rs

//! HTTP client utilities.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::{AppError, Result};
use crate::models::{BrowserConfig, StorageConfig};

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (compatible; film-crawler/0.1)";

/// Create a configured asynchronous HTTP client.
pub fn create_async_client(browser: &BrowserConfig, storage: &StorageConfig) -> Result<reqwest::Client> {
    let user_agent = browser.user_agent.as_deref().unwrap_or(DEFAULT_USER_AGENT);
    let client = reqwest::Client::builder()
        .user_agent(user_agent)
        .timeout(Duration::from_secs(storage.poster_timeout_secs))
        .build()?;
    Ok(client)
}

/// Where poster images come from.
#[async_trait]
pub trait PosterSource: Send + Sync {
    /// Raw image bytes for `url`.
    async fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

/// Downloads posters over HTTP.
pub struct HttpPosterSource {
    client: reqwest::Client,
}

impl HttpPosterSource {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PosterSource for HttpPosterSource {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        if url.trim().is_empty() {
            return Err(AppError::validation("Poster URL is empty"));
        }
        let response = self.client.get(url).send().await?.error_for_status()?;
        let bytes = response.bytes().await?;
        log::debug!("Fetched poster {} ({} bytes)", url, bytes.len());
        Ok(bytes.to_vec())
    }
}
