//! Extraction of track metadata from a Shazam recognition response (as
//! printed by `songrec`).
//!
//! Album and year are best-effort: Shazam only sometimes includes them in
//! the `sections[].metadata[]` list.

use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

use crate::candidate::{Candidate, PROVIDER_SHAZAM};

const YEAR_TITLES: &[&str] = &["released", "release date", "year"];

fn year_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(19|20)\d{2}").expect("year pattern is valid"))
}

fn str_field<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value.get(key).and_then(|v| v.as_str()).filter(|s| !s.is_empty())
}

/// Reduce a free-form release date ("Aug 17, 1959", "1959-08-17") to a year.
pub fn normalize_year(raw: &str) -> String {
    match year_re().find(raw) {
        Some(m) => m.as_str().to_string(),
        None => raw.trim().to_string(),
    }
}

/// Build a candidate from a raw Shazam response.
///
/// Returns `None` when the response has no `track` or the track has neither
/// title nor artist (i.e. no match).
pub fn extract_candidate(raw: &Value) -> Option<Candidate> {
    let track = raw.get("track").filter(|t| t.is_object())?;

    let title = str_field(track, "title").unwrap_or("");
    let artist = str_field(track, "subtitle").unwrap_or("");
    if title.is_empty() && artist.is_empty() {
        return None;
    }

    let cover_url = track
        .get("images")
        .and_then(|images| {
            str_field(images, "coverarthq")
                .or_else(|| str_field(images, "coverart"))
                .or_else(|| str_field(images, "background"))
        })
        .unwrap_or("");

    let mut album: Option<&str> = None;
    let mut year: Option<&str> = None;
    let sections = track.get("sections").and_then(|s| s.as_array());
    for section in sections.into_iter().flatten() {
        let Some(metadata) = section.get("metadata").and_then(|m| m.as_array()) else {
            continue;
        };
        for item in metadata {
            let key = item
                .get("title")
                .and_then(|t| t.as_str())
                .unwrap_or("")
                .trim()
                .to_lowercase();
            let text = item
                .get("text")
                .and_then(|t| t.as_str())
                .filter(|t| !t.is_empty());
            if key == "album" && album.is_none() {
                album = text;
            }
            if YEAR_TITLES.contains(&key.as_str()) && year.is_none() {
                year = text;
            }
        }
        if album.is_some() && year.is_some() {
            break;
        }
    }

    let year = year
        .filter(|y| !y.is_empty())
        .or_else(|| str_field(track, "release_date"))
        .or_else(|| str_field(track, "released"))
        .map(normalize_year)
        .unwrap_or_default();

    Some(Candidate {
        title: title.to_string(),
        artist: artist.to_string(),
        album: album.unwrap_or("").to_string(),
        year,
        cover_url: cover_url.to_string(),
        provider: PROVIDER_SHAZAM.to_string(),
    })
}
