//! Storage router and sink backends.
//!
//! A normalized record is fanned out to every enabled [`Sink`], once, in the
//! order the sinks are declared:
//!
//! 1. `local_raw_files`: JSON document and poster under `raw_data/<id>/`
//! 2. `object_store`: upload of those two local files
//! 3. `relational_table`: one row in `film_data`
//! 4. `flat_file`: one row appended to `film_data.csv`
//! 5. `local_cleanup`: removal of `raw_data/<id>/`
//!
//! Sinks are isolated: a failure is recorded in the [`PersistReport`] and the
//! remaining sinks still run. Cleanup is skipped when the upload it depends
//! on did not succeed.

pub mod flat_file;
pub mod local;
#[cfg(feature = "s3")]
pub mod s3;
pub mod sqlite;

use std::fmt;
use std::path::Path;

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::error::{AppError, Result};
use crate::models::{NormalizedFilmRecord, StorageConfig, data_key};
use crate::utils::http::PosterSource;

pub use crate::models::{Sink, SinkSet};
pub use flat_file::FlatFile;
pub use local::LocalStorage;
#[cfg(feature = "s3")]
pub use s3::S3Storage;
pub use sqlite::FilmTable;

/// Result of a single object upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadOutcome {
    Uploaded,
    /// An object with identical content was already stored
    Unchanged,
}

/// Remote store that receives copies of the local artifacts.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Upload the file at `path` under `key`, relative to the store's prefix.
    async fn upload_file(&self, key: &str, path: &Path) -> Result<UploadOutcome>;

    /// Whether an object is stored under `key`, relative to the store's prefix.
    async fn exists(&self, key: &str) -> Result<bool>;

    /// Human-readable location, for logs.
    fn describe(&self) -> String;
}

/// Hex SHA-256 of `bytes`.
pub fn content_digest(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Outcome of one sink for one record.
#[derive(Debug)]
pub enum SinkStatus {
    Written,
    /// Nothing to do: the sink already held this record
    Unchanged,
    /// Not attempted
    Skipped(String),
    Failed(AppError),
}

impl SinkStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, SinkStatus::Written | SinkStatus::Unchanged)
    }
}

impl fmt::Display for SinkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SinkStatus::Written => f.write_str("written"),
            SinkStatus::Unchanged => f.write_str("unchanged"),
            SinkStatus::Skipped(reason) => write!(f, "skipped ({reason})"),
            SinkStatus::Failed(e) => write!(f, "failed ({e})"),
        }
    }
}

/// Per-sink outcomes for one record.
#[derive(Debug)]
pub struct PersistReport {
    pub identifier: String,
    pub results: Vec<(Sink, SinkStatus)>,
}

impl PersistReport {
    fn new(identifier: &str) -> Self {
        Self {
            identifier: identifier.to_string(),
            results: Vec::new(),
        }
    }

    fn push(&mut self, sink: Sink, status: SinkStatus) {
        match &status {
            SinkStatus::Failed(e) => {
                log::warn!("{}: {} failed: {}", self.identifier, sink, e)
            }
            SinkStatus::Skipped(reason) => {
                log::warn!("{}: {} skipped: {}", self.identifier, sink, reason)
            }
            other => log::debug!("{}: {} {}", self.identifier, sink, other),
        }
        self.results.push((sink, status));
    }

    pub fn status(&self, sink: Sink) -> Option<&SinkStatus> {
        self.results
            .iter()
            .find(|(s, _)| *s == sink)
            .map(|(_, status)| status)
    }

    /// Sinks that ran and failed.
    pub fn failures(&self) -> impl Iterator<Item = (Sink, &AppError)> + '_ {
        self.results.iter().filter_map(|(sink, status)| match status {
            SinkStatus::Failed(e) => Some((*sink, e)),
            _ => None,
        })
    }

    /// Every enabled sink succeeded.
    pub fn is_complete(&self) -> bool {
        self.results.iter().all(|(_, status)| status.is_success())
    }
}

/// Routes normalized records to the enabled sinks.
pub struct StorageRouter {
    sinks: SinkSet,
    local: LocalStorage,
    posters: Box<dyn PosterSource>,
    object_store: Option<Box<dyn ObjectStore>>,
    table: Option<FilmTable>,
    flat_file: Option<FlatFile>,
}

impl StorageRouter {
    pub fn new(sinks: SinkSet, local: LocalStorage, posters: Box<dyn PosterSource>) -> Self {
        Self {
            sinks,
            local,
            posters,
            object_store: None,
            table: None,
            flat_file: None,
        }
    }

    pub fn with_object_store(mut self, store: Box<dyn ObjectStore>) -> Self {
        self.object_store = Some(store);
        self
    }

    pub fn with_table(mut self, table: FilmTable) -> Self {
        self.table = Some(table);
        self
    }

    pub fn with_flat_file(mut self, flat_file: FlatFile) -> Self {
        self.flat_file = Some(flat_file);
        self
    }

    /// Open the backends of every enabled sink.
    pub async fn from_config(config: &StorageConfig, posters: Box<dyn PosterSource>) -> Result<Self> {
        let sinks = config.sinks.clone();
        let mut router = Self::new(
            sinks.clone(),
            LocalStorage::new(&config.raw_data_dir),
            posters,
        );

        if sinks.contains(Sink::ObjectStore) {
            router = router.with_object_store(open_object_store(config).await?);
        }
        if sinks.contains(Sink::RelationalTable) {
            router = router.with_table(FilmTable::open(&config.database_path)?);
        }
        if sinks.contains(Sink::FlatFile) {
            router = router.with_flat_file(FlatFile::new(&config.csv_path));
        }

        log::info!("Storage sinks: {}", sinks);
        Ok(router)
    }

    pub fn sinks(&self) -> &SinkSet {
        &self.sinks
    }

    pub fn local(&self) -> &LocalStorage {
        &self.local
    }

    pub fn table(&self) -> Option<&FilmTable> {
        self.table.as_ref()
    }

    /// Whether this film is already stored.
    ///
    /// Checks the relational table when it is enabled. Otherwise the local
    /// raw files, unless cleanup removes them after upload, in which case the
    /// object store is asked. The flat file comes last. With none of those
    /// enabled nothing is ever a duplicate.
    pub async fn is_duplicate(&self, identifier: &str) -> Result<bool> {
        if self.sinks.contains(Sink::RelationalTable) {
            if let Some(table) = &self.table {
                return table.contains(identifier);
            }
        }
        let keeps_local = self.sinks.contains(Sink::LocalRawFiles)
            && !self.sinks.contains(Sink::LocalCleanup);
        if keeps_local {
            return self.local.contains(identifier).await;
        }
        if self.sinks.contains(Sink::ObjectStore) {
            if let Some(store) = &self.object_store {
                return store.exists(&data_key(identifier)).await;
            }
        }
        if self.sinks.contains(Sink::FlatFile) {
            if let Some(flat_file) = &self.flat_file {
                return flat_file.contains(identifier);
            }
        }
        if self.sinks.contains(Sink::LocalRawFiles) {
            return self.local.contains(identifier).await;
        }
        Ok(false)
    }

    /// Write `record` to every enabled sink.
    pub async fn persist(&self, record: &NormalizedFilmRecord) -> PersistReport {
        let mut report = PersistReport::new(&record.identifier);

        let mut staged = if self.sinks.needs_local_artifacts() {
            Some(self.stage_locally(record).await)
        } else {
            None
        };
        let staging_error = match &staged {
            Some(Err(e)) => Some(e.to_string()),
            _ => None,
        };

        for sink in self.sinks.iter() {
            let status = match sink {
                Sink::LocalRawFiles => match staged.take() {
                    Some(Ok(())) => SinkStatus::Written,
                    Some(Err(e)) => SinkStatus::Failed(e),
                    None => SinkStatus::Skipped("not staged".to_string()),
                },
                Sink::ObjectStore => match &staging_error {
                    Some(e) => SinkStatus::Skipped(format!("local artifacts unavailable: {e}")),
                    None => self.upload(record).await,
                },
                Sink::RelationalTable => self.insert_row(record),
                Sink::FlatFile => self.append_row(record),
                Sink::LocalCleanup => self.cleanup(record, &report).await,
            };
            report.push(sink, status);
        }

        report
    }

    /// Fetch the poster and write both artifacts under the local root.
    async fn stage_locally(&self, record: &NormalizedFilmRecord) -> Result<()> {
        let poster = self.posters.fetch(&record.poster_url).await?;
        self.local.write_record(record, &poster).await
    }

    async fn upload(&self, record: &NormalizedFilmRecord) -> SinkStatus {
        let Some(store) = &self.object_store else {
            return SinkStatus::Failed(AppError::config("object store is not configured"));
        };

        let mut uploaded = false;
        for key in [record.data_key(), record.poster_key()] {
            match store.upload_file(&key, &self.local.path(&key)).await {
                Ok(UploadOutcome::Uploaded) => uploaded = true,
                Ok(UploadOutcome::Unchanged) => {}
                Err(e) => return SinkStatus::Failed(e),
            }
        }
        if uploaded {
            SinkStatus::Written
        } else {
            SinkStatus::Unchanged
        }
    }

    fn insert_row(&self, record: &NormalizedFilmRecord) -> SinkStatus {
        let Some(table) = &self.table else {
            return SinkStatus::Failed(AppError::config("relational table is not configured"));
        };
        match table.insert(record) {
            Ok(true) => SinkStatus::Written,
            Ok(false) => SinkStatus::Unchanged,
            Err(e) => SinkStatus::Failed(e),
        }
    }

    fn append_row(&self, record: &NormalizedFilmRecord) -> SinkStatus {
        let Some(flat_file) = &self.flat_file else {
            return SinkStatus::Failed(AppError::config("flat file is not configured"));
        };
        match flat_file.append(record) {
            Ok(()) => SinkStatus::Written,
            Err(e) => SinkStatus::Failed(e),
        }
    }

    /// Local artifacts are removed only once a remote copy exists.
    async fn cleanup(&self, record: &NormalizedFilmRecord, report: &PersistReport) -> SinkStatus {
        match report.status(Sink::ObjectStore) {
            Some(status) if status.is_success() => {}
            Some(_) => {
                return SinkStatus::Skipped("object store upload did not succeed".to_string());
            }
            None => return SinkStatus::Skipped("no remote copy".to_string()),
        }
        match self.local.remove_record(&record.identifier).await {
            Ok(true) => SinkStatus::Written,
            Ok(false) => SinkStatus::Unchanged,
            Err(e) => SinkStatus::Failed(e),
        }
    }

    /// Release the backends, reporting errors from the database.
    pub fn close(self) -> Result<()> {
        if let Some(table) = self.table {
            table.close()?;
        }
        Ok(())
    }
}

#[cfg(feature = "s3")]
async fn open_object_store(config: &StorageConfig) -> Result<Box<dyn ObjectStore>> {
    Ok(Box::new(S3Storage::from_config(config).await?))
}

#[cfg(not(feature = "s3"))]
async fn open_object_store(_config: &StorageConfig) -> Result<Box<dyn ObjectStore>> {
    Err(AppError::config(
        "the object_store sink needs the crate built with the `s3` feature",
    ))
}
