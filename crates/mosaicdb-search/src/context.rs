//! Ranking context helpers (C14): query-term extraction, tolerant metadata
//! decoding, distance-to-similarity mapping, and date parsing.

use std::collections::HashSet;

use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value as JsonValue;

/// Lowercases `text`, splits on non-word characters, and discards tokens of
/// length `<= 2`.
#[must_use]
pub fn extract_terms(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    let mut terms = Vec::new();
    let mut current = String::new();
    for ch in lower.chars() {
        if ch.is_alphanumeric() || ch == '_' {
            current.push(ch);
        } else if !current.is_empty() {
            if current.len() > 2 {
                terms.push(std::mem::take(&mut current));
            } else {
                current.clear();
            }
        }
    }
    if current.len() > 2 {
        terms.push(current);
    }
    terms
}

/// Extracts the unique set of terms, preserving [`extract_terms`]'s
/// tokenization rules.
#[must_use]
pub fn extract_term_set(text: &str) -> HashSet<String> {
    extract_terms(text).into_iter().collect()
}

/// Tolerantly decodes a JSON metadata blob, returning an empty map on any
/// parse failure rather than propagating an error — metadata is
/// best-effort context, never load-bearing for correctness.
#[must_use]
pub fn decode_metadata(blob: &[u8]) -> serde_json::Map<String, JsonValue> {
    match serde_json::from_slice::<JsonValue>(blob) {
        Ok(JsonValue::Object(map)) => map,
        _ => serde_json::Map::new(),
    }
}

/// Maps a vector-distance value to a bounded similarity score:
/// `1 / (1 + distance)`, clamped to `0.0` for a missing (`None`) distance.
#[must_use]
pub fn distance_to_similarity(distance: Option<f64>) -> f64 {
    match distance {
        Some(d) if d.is_finite() => 1.0 / (1.0 + d.max(0.0)),
        _ => 0.0,
    }
}

/// Parses an ISO-8601 timestamp, falling back to a bare `YYYY-MM-DD` date.
/// Returns `None` on any other input rather than erroring, since callers
/// treat a missing date as ranking-neutral.
#[must_use]
pub fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(DateTime::from_naive_utc_and_offset(date.and_hms_opt(0, 0, 0)?, Utc));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_terms_lowercases_and_splits() {
        let terms = extract_terms("Mosaic DB, databases!");
        assert_eq!(terms, vec!["mosaic", "databases"]);
    }

    #[test]
    fn extract_terms_discards_short_tokens() {
        let terms = extract_terms("a an the cat is on it");
        assert_eq!(terms, vec!["cat"]);
    }

    #[test]
    fn decode_metadata_returns_empty_on_malformed_input() {
        let map = decode_metadata(b"not json {{{");
        assert!(map.is_empty());
    }

    #[test]
    fn decode_metadata_parses_object() {
        let map = decode_metadata(br#"{"category":"books"}"#);
        assert_eq!(map.get("category").unwrap().as_str().unwrap(), "books");
    }

    #[test]
    fn distance_to_similarity_of_zero_is_one() {
        assert!((distance_to_similarity(Some(0.0)) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn distance_to_similarity_clamps_missing_to_zero() {
        assert_eq!(distance_to_similarity(None), 0.0);
    }

    #[test]
    fn parse_datetime_accepts_rfc3339() {
        assert!(parse_datetime("2024-01-15T00:00:00Z").is_some());
    }

    #[test]
    fn parse_datetime_accepts_bare_date() {
        assert!(parse_datetime("2024-01-15").is_some());
    }

    #[test]
    fn parse_datetime_rejects_garbage() {
        assert!(parse_datetime("not a date").is_none());
    }
}
