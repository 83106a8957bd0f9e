// src/services/normalizer.rs

//! Raw-to-typed record conversion.
//!
//! Pure functions only. A mandatory numeric field that does not parse fails
//! the whole record with [`AppError::MalformedField`]; the rank badge is
//! best-effort and simply drops out when it is not a number.

use std::sync::OnceLock;

use regex::Regex;

use crate::error::{AppError, Result};
use crate::models::{NormalizedFilmRecord, RawFilmRecord};

/// First number in a string, thousands separators included.
///
/// `"Watched by 1,234,567 members"` gives `"1,234,567"`.
pub fn numeric_token(text: &str) -> Option<&str> {
    static NUMBER: OnceLock<Option<Regex>> = OnceLock::new();
    let re = NUMBER
        .get_or_init(|| Regex::new(r"\d[\d,]*(?:\.\d+)?").ok())
        .as_ref()?;
    re.find(text).map(|m| m.as_str())
}

/// Text before the first double space, trimmed.
///
/// Detail-page elements often carry trailing link text separated by
/// padding; only the leading part is the value.
pub fn head_segment(text: &str) -> &str {
    text.trim().split("  ").next().unwrap_or("").trim()
}

fn strip_separators(s: &str) -> String {
    s.chars().filter(|c| *c != ',').collect()
}

fn parse_count(field: &str, value: &str) -> Result<u64> {
    let token = numeric_token(value).ok_or_else(|| AppError::malformed(field, value))?;
    strip_separators(token)
        .parse()
        .map_err(|_| AppError::malformed(field, value))
}

fn parse_year(value: &str) -> Result<i32> {
    value
        .trim()
        .parse()
        .map_err(|_| AppError::malformed("year", value))
}

/// `"142 mins"` gives 142; `"1,020 mins"` gives 1020.
fn parse_runtime(value: &str) -> Result<u32> {
    let token = value
        .split_whitespace()
        .next()
        .ok_or_else(|| AppError::malformed("runtime", value))?;
    strip_separators(token)
        .parse()
        .map_err(|_| AppError::malformed("runtime", value))
}

fn parse_rating(value: &str) -> Result<f64> {
    let rating: f64 = value
        .trim()
        .parse()
        .map_err(|_| AppError::malformed("rating", value))?;
    if !rating.is_finite() {
        return Err(AppError::malformed("rating", value));
    }
    Ok(rating)
}

fn parse_rank(value: Option<&str>) -> Option<u32> {
    let text = value?;
    match strip_separators(text.trim()).parse() {
        Ok(rank) => Some(rank),
        Err(_) => {
            log::debug!("Rank badge {:?} is not a number, leaving it out", text);
            None
        }
    }
}

/// Join director names: one passes through, several become `"A, B"`.
pub fn join_directors(directors: &[String]) -> String {
    directors.join(", ")
}

/// Convert a raw record into its typed form.
pub fn normalize(raw: &RawFilmRecord) -> Result<NormalizedFilmRecord> {
    if raw.directors.is_empty() {
        return Err(AppError::malformed("director", ""));
    }

    Ok(NormalizedFilmRecord {
        identifier: raw.identifier.clone(),
        external_id: raw.external_id.clone(),
        title: raw.title.trim().to_string(),
        year: parse_year(&raw.year)?,
        runtime: parse_runtime(&raw.runtime)?,
        rating: parse_rating(&raw.rating)?,
        watch_count: parse_count("watches", &raw.watch_count)?,
        list_count: parse_count("lists", &raw.list_count)?,
        like_count: parse_count("likes", &raw.like_count)?,
        director: join_directors(&raw.directors),
        rank: parse_rank(raw.rank.as_deref()),
        description: raw.description.trim().to_string(),
        poster_url: raw.poster_url.clone(),
        retrieved_at: raw.retrieved_at,
    })
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    fn raw() -> RawFilmRecord {
        RawFilmRecord {
            identifier: "parasite-2019".to_string(),
            external_id: "5e0c8f55-4a8e-4d1e-8b0e-0d9f6c1f4e2a".to_string(),
            title: "Parasite".to_string(),
            year: "2019".to_string(),
            runtime: "133 mins".to_string(),
            rating: "4.57".to_string(),
            watch_count: "3,456,789".to_string(),
            list_count: "654,321".to_string(),
            like_count: "1,987,654".to_string(),
            directors: vec!["Bong Joon-ho".to_string()],
            rank: Some("3".to_string()),
            description: "All unemployed, Ki-taek's family takes peculiar interest in the wealthy Parks.".to_string(),
            poster_url: "https://a.ltrbxd.com/resized/film-poster/parasite.jpg".to_string(),
            retrieved_at: Utc.with_ymd_and_hms(2026, 10, 18, 12, 0, 0).unwrap(),
        }
    }

    /// Raw form of an already-normalized record.
    fn to_raw(record: &NormalizedFilmRecord) -> RawFilmRecord {
        RawFilmRecord {
            identifier: record.identifier.clone(),
            external_id: record.external_id.clone(),
            title: record.title.clone(),
            year: record.year.to_string(),
            runtime: format!("{} mins", record.runtime),
            rating: record.rating.to_string(),
            watch_count: record.watch_count.to_string(),
            list_count: record.list_count.to_string(),
            like_count: record.like_count.to_string(),
            directors: vec![record.director.clone()],
            rank: record.rank.map(|r| r.to_string()),
            description: record.description.clone(),
            poster_url: record.poster_url.clone(),
            retrieved_at: record.retrieved_at,
        }
    }

    #[test]
    fn test_normalize_types() {
        let record = normalize(&raw()).unwrap();
        assert_eq!(record.year, 2019);
        assert_eq!(record.runtime, 133);
        assert_eq!(record.rating, 4.57);
        assert_eq!(record.watch_count, 3_456_789);
        assert_eq!(record.list_count, 654_321);
        assert_eq!(record.like_count, 1_987_654);
        assert_eq!(record.director, "Bong Joon-ho");
        assert_eq!(record.rank, Some(3));
    }

    #[test]
    fn test_runtime_rating_and_counts() {
        assert_eq!(parse_runtime("142 mins").unwrap(), 142);
        assert_eq!(parse_runtime("1,020 mins").unwrap(), 1020);
        assert_eq!(parse_rating("4.1").unwrap(), 4.1);
        assert_eq!(parse_count("watches", "1,234,567 watches").unwrap(), 1_234_567);
        assert_eq!(parse_count("watches", "Watched by 1,234,567 members").unwrap(), 1_234_567);
    }

    #[test]
    fn test_director_join() {
        assert_eq!(join_directors(&["A".to_string()]), "A");
        assert_eq!(join_directors(&["A".to_string(), "B".to_string()]), "A, B");
        assert_eq!(
            join_directors(&["A".to_string(), "B".to_string(), "C".to_string()]),
            "A, B, C"
        );
    }

    #[test]
    fn test_missing_or_odd_rank_is_not_an_error() {
        let mut unranked = raw();
        unranked.rank = None;
        assert_eq!(normalize(&unranked).unwrap().rank, None);

        let mut odd = raw();
        odd.rank = Some("№ 3".to_string());
        assert_eq!(normalize(&odd).unwrap().rank, None);
    }

    #[test]
    fn test_malformed_numeric_field_fails_record() {
        let mut bad = raw();
        bad.rating = "n/a".to_string();
        match normalize(&bad).unwrap_err() {
            AppError::MalformedField { field, value } => {
                assert_eq!(field, "rating");
                assert_eq!(value, "n/a");
            }
            other => panic!("unexpected error: {other}"),
        }

        let mut bad = raw();
        bad.like_count = "lots".to_string();
        assert!(matches!(
            normalize(&bad),
            Err(AppError::MalformedField { ref field, .. }) if field == "likes"
        ));

        let mut bad = raw();
        bad.runtime = String::new();
        assert!(normalize(&bad).is_err());
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let first = normalize(&raw()).unwrap();
        let again = normalize(&raw()).unwrap();
        assert_eq!(first, again);

        let mut two_directors = raw();
        two_directors.directors = vec!["Joel Coen".to_string(), "Ethan Coen".to_string()];
        let once = normalize(&two_directors).unwrap();
        let twice = normalize(&to_raw(&once)).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_text_helpers() {
        assert_eq!(numeric_token("4.1"), Some("4.1"));
        assert_eq!(numeric_token("no digits"), None);
        assert_eq!(head_segment("142 mins  More at IMDb TMDb"), "142 mins");
        assert_eq!(head_segment("  Ratatouille "), "Ratatouille");
    }
}
