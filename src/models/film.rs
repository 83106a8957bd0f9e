//! Film record shapes.
//!
//! A [`RawFilmRecord`] holds exactly what was read from a detail page, as
//! strings. [`NormalizedFilmRecord`] is the typed, canonical form produced by
//! the normalizer and handed to every sink. Type coercion happens only at the
//! boundary between the two.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Untyped values read from one detail-page visit.
#[derive(Debug, Clone, PartialEq)]
pub struct RawFilmRecord {
    /// Slug taken from the detail URL (`/film/<identifier>/`)
    pub identifier: String,

    /// Fresh token generated for this scrape attempt
    pub external_id: String,

    pub title: String,
    pub year: String,

    /// Runtime text as displayed, e.g. `"142 mins"`
    pub runtime: String,

    pub rating: String,

    /// Numeric tokens read from the stat tooltips, e.g. `"1,234,567"`
    pub watch_count: String,
    pub list_count: String,
    pub like_count: String,

    /// Director names in page order. Never empty, capped by configuration.
    pub directors: Vec<String>,

    /// Ranking badge text. `None` when the film carries no badge.
    pub rank: Option<String>,

    pub description: String,
    pub poster_url: String,

    /// When the page was read
    pub retrieved_at: DateTime<Utc>,
}

/// Typed record, immutable once produced.
///
/// Serialized field names follow the persisted layout shared by the JSON
/// document, the relational table and the flat file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedFilmRecord {
    #[serde(rename = "friendly_id")]
    pub identifier: String,

    #[serde(rename = "uuid")]
    pub external_id: String,

    pub title: String,
    pub year: i32,

    /// Minutes
    pub runtime: u32,

    pub rating: f64,

    #[serde(rename = "watches")]
    pub watch_count: u64,

    #[serde(rename = "lists")]
    pub list_count: u64,

    #[serde(rename = "likes")]
    pub like_count: u64,

    /// Director names joined with `", "`
    pub director: String,

    #[serde(rename = "top_250_position")]
    pub rank: Option<u32>,

    pub description: String,

    #[serde(rename = "poster_link")]
    pub poster_url: String,

    #[serde(rename = "data_obtained_time")]
    pub retrieved_at: DateTime<Utc>,
}

impl NormalizedFilmRecord {
    /// Relative key of the JSON document for this film.
    pub fn data_key(&self) -> String {
        data_key(&self.identifier)
    }

    /// Relative key of the poster image for this film.
    pub fn poster_key(&self) -> String {
        poster_key(&self.identifier)
    }
}

/// `<identifier>/data.json`
pub fn data_key(identifier: &str) -> String {
    format!("{identifier}/data.json")
}

/// `<identifier>/images/<identifier>_poster.jpg`
pub fn poster_key(identifier: &str) -> String {
    format!("{identifier}/images/{identifier}_poster.jpg")
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn sample() -> NormalizedFilmRecord {
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
            poster_url: "https://a.ltrbxd.com/resized/film-poster/ratatouille.jpg".to_string(),
            retrieved_at: Utc.with_ymd_and_hms(2026, 10, 18, 9, 30, 0).unwrap(),
        }
    }

    #[test]
    fn test_artifact_keys() {
        let record = sample();
        assert_eq!(record.data_key(), "ratatouille/data.json");
        assert_eq!(record.poster_key(), "ratatouille/images/ratatouille_poster.jpg");
    }

    #[test]
    fn test_serialized_document_is_flat_with_fourteen_keys() {
        let value = serde_json::to_value(sample()).unwrap();
        let object = value.as_object().unwrap();

        assert_eq!(object.len(), 14);
        assert_eq!(object["friendly_id"], "ratatouille");
        assert_eq!(object["watches"], 4_012_345);
        assert!(object["top_250_position"].is_null());
        assert_eq!(object["data_obtained_time"], "2026-10-18T09:30:00Z");
    }
}
