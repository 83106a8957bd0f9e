//! Local filesystem storage.
//!
//! Per-film artifacts live in their own directory so a film can be staged,
//! uploaded and removed as a unit.
//!
//! ## Storage Layout
//!
//! ```text
//! {root}/
//! └── <identifier>/
//!     ├── data.json                     # Normalized record
//!     └── images/
//!         └── <identifier>_poster.jpg   # Poster bytes
//! ```

use std::path::{Path, PathBuf};

use serde::{Serialize, de::DeserializeOwned};
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::models::{NormalizedFilmRecord, data_key};

/// Local filesystem storage backend.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root_dir: PathBuf,
}

impl LocalStorage {
    /// Create a new LocalStorage rooted at the given directory.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root_dir
    }

    /// Get the full path for a relative key.
    pub fn path(&self, key: &str) -> PathBuf {
        self.root_dir.join(key)
    }

    /// Ensure parent directory exists.
    async fn ensure_dir(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path(key);
        self.ensure_dir(&path).await?;

        let tmp = path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    /// Write JSON data.
    async fn write_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(value)?;
        self.write_bytes(key, &bytes).await
    }

    /// Read bytes, returning None if file doesn't exist.
    async fn read_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path(key);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    /// Read JSON data.
    async fn read_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.read_bytes(key).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Write the JSON document and the poster for one film.
    pub async fn write_record(&self, record: &NormalizedFilmRecord, poster: &[u8]) -> Result<()> {
        self.write_json(&record.data_key(), record).await?;
        self.write_bytes(&record.poster_key(), poster).await?;
        log::debug!(
            "Wrote {} artifacts under {}",
            record.identifier,
            self.path(&record.identifier).display()
        );
        Ok(())
    }

    /// Whether a JSON document exists for this identifier.
    pub async fn contains(&self, identifier: &str) -> Result<bool> {
        Ok(tokio::fs::try_exists(self.path(&data_key(identifier))).await?)
    }

    pub async fn load_record(&self, identifier: &str) -> Result<Option<NormalizedFilmRecord>> {
        self.read_json(&data_key(identifier)).await
    }

    /// Delete the per-film directory. Returns whether anything was removed.
    pub async fn remove_record(&self, identifier: &str) -> Result<bool> {
        if identifier.is_empty() || identifier.contains(['/', '\\']) || identifier == ".." {
            return Err(AppError::validation(format!(
                "Refusing to remove local artifacts for identifier {identifier:?}"
            )));
        }
        match tokio::fs::remove_dir_all(self.path(identifier)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(AppError::Io(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    use super::*;

    fn record() -> NormalizedFilmRecord {
        NormalizedFilmRecord {
            identifier: "ratatouille".to_string(),
            external_id: "0b6f7c1e-5d1a-4bb4-9a53-2f1d2b0d8f11".to_string(),
            title: "Ratatouille".to_string(),
            year: 2007,
            runtime: 111,
            rating: 4.0,
            watch_count: 4_012_345,
            list_count: 512_001,
            like_count: 1_203_344,
            director: "Brad Bird, Jan Pinkava".to_string(),
            rank: None,
            description: "A rat who can cook makes an unusual alliance.".to_string(),
            poster_url: "https://a.ltrbxd.com/ratatouille.jpg".to_string(),
            retrieved_at: Utc.with_ymd_and_hms(2026, 10, 18, 9, 30, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_write_and_read() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());

        storage.write_bytes("test.txt", b"hello").await.unwrap();
        let data = storage.read_bytes("test.txt").await.unwrap();
        assert_eq!(data, Some(b"hello".to_vec()));
    }

    #[tokio::test]
    async fn test_read_nonexistent() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());

        let data = storage.read_bytes("nope.txt").await.unwrap();
        assert!(data.is_none());
        assert!(!storage.contains("nope").await.unwrap());
    }

    #[tokio::test]
    async fn test_record_layout() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path().join("raw_data"));

        storage.write_record(&record(), b"\xFF\xD8poster").await.unwrap();

        let root = tmp.path().join("raw_data").join("ratatouille");
        assert!(root.join("data.json").is_file());
        assert_eq!(
            std::fs::read(root.join("images").join("ratatouille_poster.jpg")).unwrap(),
            b"\xFF\xD8poster"
        );
        assert!(storage.contains("ratatouille").await.unwrap());
        assert_eq!(storage.load_record("ratatouille").await.unwrap(), Some(record()));
    }

    #[tokio::test]
    async fn test_remove_record_only_touches_one_film() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());
        storage.write_record(&record(), b"a").await.unwrap();
        let mut other = record();
        other.identifier = "heat".to_string();
        storage.write_record(&other, b"b").await.unwrap();

        assert!(storage.remove_record("ratatouille").await.unwrap());
        assert!(!storage.remove_record("ratatouille").await.unwrap());
        assert!(storage.contains("heat").await.unwrap());
        assert!(storage.remove_record("../etc").await.is_err());
    }
}
