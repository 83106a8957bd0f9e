//! AWS S3 storage implementation.
//!
//! Uploads the staged per-film artifacts under `{prefix}/<identifier>/...`.
//! Every object carries its SHA-256 digest as `sha256` metadata; an upload is
//! skipped when the stored object already has the same digest.

use std::path::Path;

use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::primitives::ByteStream;

use crate::error::{AppError, Result};
use crate::models::StorageConfig;
use crate::storage::{ObjectStore, UploadOutcome, content_digest};

const DIGEST_METADATA_KEY: &str = "sha256";

/// S3-backed object store.
pub struct S3Storage {
    client: Client,
    bucket: String,
    prefix: String,
}

impl S3Storage {
    /// Create a new S3 storage instance.
    pub fn new(client: Client, bucket: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            prefix: prefix.into(),
        }
    }

    /// Create S3 storage using the default AWS credential chain.
    pub async fn from_config(config: &StorageConfig) -> Result<Self> {
        if config.bucket.trim().is_empty() {
            return Err(AppError::config("storage.bucket is not set"));
        }
        let aws = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        let client = Client::new(&aws);
        log::info!(
            "Object store: s3://{}/{}",
            config.bucket,
            config.prefix.trim_matches('/')
        );
        Ok(Self::new(client, config.bucket.clone(), config.prefix.clone()))
    }

    /// Full object key for a key relative to the prefix.
    fn object_key(&self, key: &str) -> String {
        let prefix = self.prefix.trim_matches('/');
        if prefix.is_empty() {
            key.to_string()
        } else {
            format!("{}/{}", prefix, key)
        }
    }

    /// Digest stored on an existing object, if the object exists.
    async fn stored_digest(&self, key: &str) -> Option<String> {
        let output = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .ok()?;
        output
            .metadata()
            .and_then(|m| m.get(DIGEST_METADATA_KEY))
            .cloned()
    }
}

fn content_type(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("json") => "application/json",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        _ => "application/octet-stream",
    }
}

#[async_trait]
impl ObjectStore for S3Storage {
    async fn upload_file(&self, key: &str, path: &Path) -> Result<UploadOutcome> {
        let bytes = tokio::fs::read(path).await?;
        let digest = content_digest(&bytes);
        let object_key = self.object_key(key);

        if self.stored_digest(&object_key).await.as_deref() == Some(digest.as_str()) {
            log::debug!("s3://{}/{} unchanged, skipping upload", self.bucket, object_key);
            return Ok(UploadOutcome::Unchanged);
        }

        let size = bytes.len();
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&object_key)
            .body(ByteStream::from(bytes))
            .content_type(content_type(path))
            .metadata(DIGEST_METADATA_KEY, digest)
            .send()
            .await
            .map_err(|e| AppError::s3(format!("put s3://{}/{} failed: {}", self.bucket, object_key, e)))?;

        log::info!("Uploaded {} bytes to s3://{}/{}", size, self.bucket, object_key);
        Ok(UploadOutcome::Uploaded)
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let object_key = self.object_key(key);
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(&object_key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(err) => {
                let service_err = err.into_service_error();
                if service_err.is_not_found() {
                    Ok(false)
                } else {
                    Err(AppError::s3(format!(
                        "head s3://{}/{} failed: {}",
                        self.bucket, object_key, service_err
                    )))
                }
            }
        }
    }

    fn describe(&self) -> String {
        format!("s3://{}/{}", self.bucket, self.prefix.trim_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type_by_extension() {
        assert_eq!(content_type(Path::new("raw_data/heat/data.json")), "application/json");
        assert_eq!(
            content_type(Path::new("raw_data/heat/images/heat_poster.jpg")),
            "image/jpeg"
        );
        assert_eq!(content_type(Path::new("notes")), "application/octet-stream");
    }
}
