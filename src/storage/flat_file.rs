//! Cumulative CSV sink.
//!
//! Rows are appended; the header row is written only when the file is new
//! or empty. Columns follow the persisted field names of
//! [`NormalizedFilmRecord`].

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use csv::{Reader, WriterBuilder};

use crate::error::Result;
use crate::models::NormalizedFilmRecord;

#[derive(Debug, Clone)]
pub struct FlatFile {
    path: PathBuf,
}

impl FlatFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn is_new(&self) -> bool {
        fs::metadata(&self.path).map(|m| m.len() == 0).unwrap_or(true)
    }

    /// Append one row.
    pub fn append(&self, record: &NormalizedFilmRecord) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let write_header = self.is_new();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let mut writer = WriterBuilder::new()
            .has_headers(write_header)
            .from_writer(file);
        writer.serialize(record)?;
        writer.flush()?;

        log::debug!("Appended {} to {}", record.identifier, self.path.display());
        Ok(())
    }

    /// Whether a row with this identifier was already appended.
    pub fn contains(&self, identifier: &str) -> Result<bool> {
        if self.is_new() {
            return Ok(false);
        }
        let mut reader = Reader::from_reader(File::open(&self.path)?);
        let Some(column) = reader.headers()?.iter().position(|h| h == "friendly_id") else {
            return Ok(false);
        };
        for row in reader.records() {
            if row?.get(column) == Some(identifier) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Data rows in the file, header excluded.
    pub fn count_rows(&self) -> Result<usize> {
        if self.is_new() {
            return Ok(0);
        }
        let mut reader = Reader::from_reader(File::open(&self.path)?);
        let mut count = 0;
        for row in reader.records() {
            row?;
            count += 1;
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    use super::*;

    fn record(identifier: &str) -> NormalizedFilmRecord {
        NormalizedFilmRecord {
            identifier: identifier.to_string(),
            external_id: "0c7e1f52-98a3-4b0b-b9c1-4f5e6d7a8b90".to_string(),
            title: "Heat".to_string(),
            year: 1995,
            runtime: 170,
            rating: 4.2,
            watch_count: 1_100_000,
            list_count: 220_000,
            like_count: 410_000,
            director: "Michael Mann".to_string(),
            rank: None,
            description: "A group of high-end professional thieves, \"one last score\".".to_string(),
            poster_url: "https://a.ltrbxd.com/heat.jpg".to_string(),
            retrieved_at: Utc.with_ymd_and_hms(2026, 10, 18, 10, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_header_written_once() {
        let tmp = TempDir::new().unwrap();
        let sink = FlatFile::new(tmp.path().join("film_data.csv"));

        sink.append(&record("heat")).unwrap();
        sink.append(&record("collateral")).unwrap();

        let content = fs::read_to_string(sink.path()).unwrap();
        assert_eq!(content.matches("friendly_id").count(), 1);
        assert!(content.starts_with("friendly_id,uuid,title,year,runtime,rating,watches,lists,likes,director,top_250_position,"));
        assert_eq!(sink.count_rows().unwrap(), 2);
    }

    #[test]
    fn test_contains_by_identifier() {
        let tmp = TempDir::new().unwrap();
        let sink = FlatFile::new(tmp.path().join("out").join("film_data.csv"));
        assert!(!sink.contains("heat").unwrap());

        sink.append(&record("heat")).unwrap();
        assert!(sink.contains("heat").unwrap());
        assert!(!sink.contains("unknown-film").unwrap());
    }
}
