//! Relational sink backed by SQLite.
//!
//! One row per film in `film_data`, keyed by `friendly_id`. Re-inserting an
//! identifier is a no-op enforced by the primary key.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, params};
use rusqlite_migration::{M, Migrations};

use crate::error::{AppError, Result};
use crate::models::NormalizedFilmRecord;

pub struct FilmTable {
    conn: Mutex<Connection>,
}

impl FilmTable {
    /// Open (or create) the database file and bring the schema up to date.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let table = Self {
            conn: Mutex::new(Connection::open(path)?),
        };
        table.run_migrations()?;
        log::debug!("Opened film table at {}", path.display());
        Ok(table)
    }

    pub fn in_memory() -> Result<Self> {
        let table = Self {
            conn: Mutex::new(Connection::open_in_memory()?),
        };
        table.run_migrations()?;
        Ok(table)
    }

    fn run_migrations(&self) -> Result<()> {
        let migrations = Migrations::new(vec![M::up(include_str!(
            "../../migrations/001-film-data/up.sql"
        ))]);
        let mut conn = self.lock()?;
        migrations.to_latest(&mut conn)?;
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| {
            AppError::Database(rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error::new(1),
                Some(e.to_string()),
            ))
        })
    }

    /// Whether a row with this identifier exists.
    pub fn contains(&self, identifier: &str) -> Result<bool> {
        let conn = self.lock()?;
        let found = conn
            .query_row(
                "SELECT friendly_id FROM film_data WHERE friendly_id = ?1",
                params![identifier],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Insert a record. Returns `false` when the identifier was already stored.
    pub fn insert(&self, record: &NormalizedFilmRecord) -> Result<bool> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "INSERT OR IGNORE INTO film_data (
                friendly_id, uuid, title, year, runtime, rating, watches, lists, likes,
                director, top_250_position, description, poster_link, data_obtained_time
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            params![
                record.identifier,
                record.external_id,
                record.title,
                record.year,
                record.runtime,
                record.rating,
                to_sql_int("watches", record.watch_count)?,
                to_sql_int("lists", record.list_count)?,
                to_sql_int("likes", record.like_count)?,
                record.director,
                record.rank,
                record.description,
                record.poster_url,
                record.retrieved_at.to_rfc3339(),
            ],
        )?;
        Ok(changed > 0)
    }

    /// Stored record for an identifier.
    pub fn get(&self, identifier: &str) -> Result<Option<NormalizedFilmRecord>> {
        let conn = self.lock()?;
        let record = conn
            .query_row(
                "SELECT friendly_id, uuid, title, year, runtime, rating, watches, lists, likes,
                        director, top_250_position, description, poster_link, data_obtained_time
                 FROM film_data WHERE friendly_id = ?1",
                params![identifier],
                record_from_row,
            )
            .optional()?;
        Ok(record)
    }

    /// Number of stored films.
    pub fn count(&self) -> Result<u64> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM film_data", [], |row| row.get(0))?;
        from_sql_int("count", count)
    }

    /// Close the connection, reporting any error from SQLite.
    pub fn close(self) -> Result<()> {
        let conn = self.conn.into_inner().map_err(|e| {
            AppError::Database(rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error::new(1),
                Some(e.to_string()),
            ))
        })?;
        conn.close().map_err(|(_, e)| AppError::Database(e))
    }
}

fn to_sql_int(field: &str, value: u64) -> Result<i64> {
    i64::try_from(value).map_err(|_| AppError::malformed(field, value.to_string()))
}

fn from_sql_int(field: &str, value: i64) -> Result<u64> {
    u64::try_from(value).map_err(|_| AppError::malformed(field, value.to_string()))
}

fn conversion_failure(
    index: usize,
    kind: Type,
    error: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(index, kind, Box::new(error))
}

fn count_column(row: &Row<'_>, index: usize) -> rusqlite::Result<u64> {
    let value: i64 = row.get(index)?;
    u64::try_from(value).map_err(|e| conversion_failure(index, Type::Integer, e))
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<NormalizedFilmRecord> {
    let obtained: String = row.get(13)?;
    let retrieved_at = DateTime::parse_from_rfc3339(&obtained)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_failure(13, Type::Text, e))?;

    Ok(NormalizedFilmRecord {
        identifier: row.get(0)?,
        external_id: row.get(1)?,
        title: row.get(2)?,
        year: row.get(3)?,
        runtime: row.get(4)?,
        rating: row.get(5)?,
        watch_count: count_column(row, 6)?,
        list_count: count_column(row, 7)?,
        like_count: count_column(row, 8)?,
        director: row.get(9)?,
        rank: row.get(10)?,
        description: row.get(11)?,
        poster_url: row.get(12)?,
        retrieved_at,
    })
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn record(identifier: &str, rank: Option<u32>) -> NormalizedFilmRecord {
        NormalizedFilmRecord {
            identifier: identifier.to_string(),
            external_id: "6f1c2a9e-3b7d-4d8e-9a41-1e0b5c7d2f30".to_string(),
            title: "Parasite".to_string(),
            year: 2019,
            runtime: 133,
            rating: 4.57,
            watch_count: 3_456_789,
            list_count: 654_321,
            like_count: 1_987_654,
            director: "Bong Joon-ho".to_string(),
            rank,
            description: "Greed and class discrimination.".to_string(),
            poster_url: "https://a.ltrbxd.com/parasite.jpg".to_string(),
            retrieved_at: Utc.with_ymd_and_hms(2026, 10, 18, 8, 15, 0).unwrap(),
        }
    }

    #[test]
    fn test_duplicate_check() {
        let table = FilmTable::in_memory().unwrap();
        table.insert(&record("parasite-2019", Some(3))).unwrap();

        assert!(table.contains("parasite-2019").unwrap());
        assert!(!table.contains("unknown-film").unwrap());
    }

    #[test]
    fn test_insert_is_idempotent_per_identifier() {
        let table = FilmTable::in_memory().unwrap();
        assert!(table.insert(&record("parasite-2019", Some(3))).unwrap());
        assert!(!table.insert(&record("parasite-2019", Some(3))).unwrap());
        assert_eq!(table.count().unwrap(), 1);
    }

    #[test]
    fn test_row_keeps_values_and_null_rank() {
        let table = FilmTable::in_memory().unwrap();
        let original = record("ratatouille", None);
        table.insert(&original).unwrap();

        let stored = table.get("ratatouille").unwrap().unwrap();
        assert_eq!(stored, original);
        assert!(table.get("heat").unwrap().is_none());
        table.close().unwrap();
    }
}
