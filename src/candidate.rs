//! A single recognition result and the text normalization used to compare
//! results against each other.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Provider name for results coming from the Shazam service.
pub const PROVIDER_SHAZAM: &str = "shazam";

/// One candidate release for a recognized track.
///
/// Unknown fields are empty strings, never missing, so that every
/// comparison between candidates is total.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Candidate {
    pub title: String,
    pub artist: String,
    pub album: String,
    pub year: String,
    pub cover_url: String,
    pub provider: String,
}

impl Candidate {
    pub fn new(
        title: &str,
        artist: &str,
        album: &str,
        year: &str,
        cover_url: &str,
        provider: &str,
    ) -> Self {
        Candidate {
            title: title.to_string(),
            artist: artist.to_string(),
            album: album.to_string(),
            year: year.to_string(),
            cover_url: cover_url.to_string(),
            provider: provider.to_string(),
        }
    }

    /// Build a candidate from optional fields, mapping `None` to "".
    pub fn from_parts(
        title: Option<String>,
        artist: Option<String>,
        album: Option<String>,
        year: Option<String>,
        cover_url: Option<String>,
        provider: &str,
    ) -> Self {
        Candidate {
            title: title.unwrap_or_default(),
            artist: artist.unwrap_or_default(),
            album: album.unwrap_or_default(),
            year: year.unwrap_or_default(),
            cover_url: cover_url.unwrap_or_default(),
            provider: provider.to_string(),
        }
    }

    /// True if every field is empty (the result of choosing from nothing).
    pub fn is_empty(&self) -> bool {
        self.title.is_empty()
            && self.artist.is_empty()
            && self.album.is_empty()
            && self.year.is_empty()
            && self.cover_url.is_empty()
            && self.provider.is_empty()
    }

    /// Cache / session key for this candidate's (artist, title).
    pub fn key(&self) -> String {
        make_key(&self.artist, &self.title)
    }
}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.artist.is_empty(), self.title.is_empty()) {
            (false, false) => write!(f, "{} - {}", self.artist, self.title)?,
            (true, false) => write!(f, "{}", self.title)?,
            (false, true) => write!(f, "{}", self.artist)?,
            (true, true) => write!(f, "(unknown)")?,
        }
        if !self.album.is_empty() {
            write!(f, " [{}]", self.album)?;
        }
        Ok(())
    }
}

/// Lower-case `text`, collapse every run of non-alphanumeric characters to a
/// single space and trim the result.
///
/// Only ASCII letters and digits survive; anything else (punctuation,
/// accented letters, symbols) acts as a separator.
pub fn normalize_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_space = false;
    for c in text.chars().flat_map(char::to_lowercase) {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            if pending_space && !out.is_empty() {
                out.push(' ');
            }
            pending_space = false;
            out.push(c);
        } else {
            pending_space = true;
        }
    }
    out
}

/// Key used for both the canonical cache and the recognizer session.
pub fn make_key(artist: &str, title: &str) -> String {
    format!("{}::{}", normalize_text(artist), normalize_text(title))
}
