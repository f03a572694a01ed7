//! Disk-persisted cache of resolved releases.
//!
//! Maps the normalized `(artist, title)` key to the candidate that won a
//! previous resolution, so repeated recognitions of the same track keep
//! showing the same release. The cache lives in a single JSON file:
//!
//! ```json
//! {
//!   "version": 1,
//!   "entries": {
//!     "miles davis::so what": {
//!       "timestamp": 1760000000.0,
//!       "candidate": { "title": "So What", "artist": "Miles Davis", "album": "Kind of Blue", ... }
//!     }
//!   }
//! }
//! ```
//!
//! Expired entries are dropped lazily when looked up. A missing, empty or
//! malformed file is an empty cache.

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::candidate::{make_key, Candidate};
use crate::clock::Clock;

pub const CACHE_FILE_NAME: &str = "canonical_release_cache.json";
pub const CACHE_VERSION: u32 = 1;
/// 14 days.
pub const DEFAULT_TTL_SECS: f64 = 14.0 * 24.0 * 60.0 * 60.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub timestamp: f64,
    pub candidate: Candidate,
}

#[derive(Debug, Clone, Serialize)]
struct CacheFile {
    version: u32,
    entries: BTreeMap<String, CacheEntry>,
}

impl Default for CacheFile {
    fn default() -> Self {
        CacheFile {
            version: CACHE_VERSION,
            entries: BTreeMap::new(),
        }
    }
}

pub struct CanonicalCache {
    path: PathBuf,
    ttl_secs: f64,
    clock: Arc<dyn Clock>,
    data: CacheFile,
}

impl CanonicalCache {
    /// Open (or start) the cache stored at `path`.
    pub fn open(path: impl Into<PathBuf>, ttl_secs: f64, clock: Arc<dyn Clock>) -> Self {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                warn!("Could not create cache directory {}: {}", parent.display(), e);
            }
        }
        let data = load_cache_file(&path);
        debug!("Loaded canonical cache with {} entries from {}", data.entries.len(), path.display());
        CanonicalCache {
            path,
            ttl_secs,
            clock,
            data,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.data.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.entries.is_empty()
    }

    /// Look up the release cached for `(artist, title)`.
    ///
    /// An entry older than the TTL is removed (and the removal persisted).
    pub fn get(&mut self, artist: &str, title: &str) -> Option<Candidate> {
        let key = make_key(artist, title);
        let entry = self.data.entries.get(&key)?;

        if self.clock.now() - entry.timestamp > self.ttl_secs {
            debug!("Canonical cache entry for {} expired", key);
            self.data.entries.remove(&key);
            self.save();
            return None;
        }

        info!("Using cached canonical release for {}", key);
        Some(entry.candidate.clone())
    }

    /// Store `candidate` as the resolved release for `(artist, title)`.
    pub fn set(&mut self, artist: &str, title: &str, candidate: &Candidate) {
        let key = make_key(artist, title);
        self.data.entries.insert(
            key,
            CacheEntry {
                timestamp: self.clock.now(),
                candidate: candidate.clone(),
            },
        );
        self.save();
    }

    /// Rewrite the whole file. Failures are logged, never returned.
    fn save(&self) {
        if let Err(e) = write_cache_file(&self.path, &self.data) {
            warn!("Failed to write canonical cache to {}: {}", self.path.display(), e);
        }
    }
}

fn load_cache_file(path: &Path) -> CacheFile {
    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(_) => return CacheFile::default(),
    };
    let root: serde_json::Value = match serde_json::from_str(&content) {
        Ok(v) => v,
        Err(e) => {
            warn!("Ignoring unreadable canonical cache {}: {}", path.display(), e);
            return CacheFile::default();
        }
    };
    let Some(root) = root.as_object() else {
        return CacheFile::default();
    };

    let version = root
        .get("version")
        .and_then(|v| v.as_u64())
        .and_then(|v| u32::try_from(v).ok())
        .unwrap_or(CACHE_VERSION);

    let mut entries = BTreeMap::new();
    if let Some(map) = root.get("entries").and_then(|e| e.as_object()) {
        for (key, value) in map {
            match serde_json::from_value::<CacheEntry>(value.clone()) {
                Ok(entry) => {
                    entries.insert(key.clone(), entry);
                }
                Err(e) => debug!("Dropping malformed cache entry {}: {}", key, e),
            }
        }
    }

    CacheFile { version, entries }
}

fn write_cache_file(path: &Path, data: &CacheFile) -> crate::error::Result<()> {
    let json = serde_json::to_string_pretty(data)?;
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(json.as_bytes())?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use tempfile::TempDir;

    const T0: f64 = 1_700_000_000.0;

    fn kind_of_blue() -> Candidate {
        Candidate::new("So What", "Miles Davis", "Kind of Blue", "1959", "http://x/c.jpg", "shazam")
    }

    fn open(dir: &TempDir, clock: &ManualClock) -> CanonicalCache {
        CanonicalCache::open(dir.path().join(CACHE_FILE_NAME), DEFAULT_TTL_SECS, Arc::new(clock.clone()))
    }

    #[test]
    fn test_set_then_get() {
        let dir = TempDir::new().unwrap();
        let clock = ManualClock::new(T0);
        let mut cache = open(&dir, &clock);

        assert!(cache.get("Miles Davis", "So What").is_none());
        cache.set("Miles Davis", "So What", &kind_of_blue());
        assert_eq!(cache.get("miles davis", "SO WHAT!"), Some(kind_of_blue()));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_ttl_boundary() {
        let dir = TempDir::new().unwrap();
        let clock = ManualClock::new(T0);
        let mut cache = open(&dir, &clock);
        cache.set("Miles Davis", "So What", &kind_of_blue());

        clock.set(T0 + DEFAULT_TTL_SECS - 1.0);
        assert!(cache.get("Miles Davis", "So What").is_some());

        clock.set(T0 + DEFAULT_TTL_SECS + 1.0);
        assert!(cache.get("Miles Davis", "So What").is_none());
        assert!(cache.is_empty());

        // Eviction was persisted
        let reopened = open(&dir, &clock);
        assert!(reopened.is_empty());
    }

    #[test]
    fn test_round_trip_through_file() {
        let dir = TempDir::new().unwrap();
        let clock = ManualClock::new(T0);
        {
            let mut cache = open(&dir, &clock);
            cache.set("Miles Davis", "So What", &kind_of_blue());
            cache.set("John Coltrane", "Naima", &Candidate::new("Naima", "John Coltrane", "Giant Steps", "", "", "shazam"));
        }
        clock.advance(60.0);
        let mut reopened = open(&dir, &clock);
        assert_eq!(reopened.len(), 2);
        assert_eq!(reopened.get("Miles Davis", "So What"), Some(kind_of_blue()));
        assert_eq!(reopened.get("John Coltrane", "Naima").unwrap().album, "Giant Steps");

        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(reopened.path()).unwrap()).unwrap();
        assert_eq!(raw["version"], 1);
        assert_eq!(raw["entries"]["miles davis::so what"]["timestamp"], T0);
    }

    #[test]
    fn test_file_layout_follows_field_order() {
        let dir = TempDir::new().unwrap();
        let clock = ManualClock::new(T0);
        let mut cache = open(&dir, &clock);
        cache.set("Miles Davis", "So What", &kind_of_blue());

        let text = fs::read_to_string(cache.path()).unwrap();
        let at = |needle: &str| text.find(needle).unwrap();
        assert!(at("\"version\"") < at("\"entries\""));
        assert!(at("\"timestamp\"") < at("\"candidate\""));
        assert!(at("\"title\"") < at("\"artist\""));
        assert!(at("\"artist\"") < at("\"album\""));
    }

    #[test]
    fn test_missing_empty_and_garbage_files_are_empty_caches() {
        let dir = TempDir::new().unwrap();
        let clock = ManualClock::new(T0);
        let path = dir.path().join(CACHE_FILE_NAME);

        assert!(open(&dir, &clock).is_empty());

        for content in ["", "not json at all {", "[1, 2, 3]", "42", r#"{"version": 1, "entries": []}"#] {
            fs::write(&path, content).unwrap();
            let mut cache = open(&dir, &clock);
            assert!(cache.is_empty(), "content {:?}", content);
            // Still usable afterwards
            cache.set("Miles Davis", "So What", &kind_of_blue());
            assert!(cache.get("Miles Davis", "So What").is_some());
        }
    }

    #[test]
    fn test_malformed_entries_dropped_valid_kept() {
        let dir = TempDir::new().unwrap();
        let clock = ManualClock::new(T0);
        let path = dir.path().join(CACHE_FILE_NAME);
        let content = serde_json::json!({
            "entries": {
                "miles davis::so what": {
                    "timestamp": T0,
                    "candidate": {"title": "So What", "artist": "Miles Davis", "album": "Kind of Blue"}
                },
                "broken::entry": {"timestamp": "yesterday"},
                "also::broken": 7
            }
        });
        fs::write(&path, content.to_string()).unwrap();

        let mut cache = open(&dir, &clock);
        assert_eq!(cache.len(), 1);
        let cached = cache.get("Miles Davis", "So What").unwrap();
        assert_eq!(cached.album, "Kind of Blue");
        // Fields missing from the file come back empty
        assert_eq!(cached.year, "");
        assert_eq!(cached.provider, "");
    }

    #[test]
    fn test_creates_parent_directory() {
        let dir = TempDir::new().unwrap();
        let clock = ManualClock::new(T0);
        let path = dir.path().join("nested").join("deeper").join(CACHE_FILE_NAME);
        let mut cache = CanonicalCache::open(&path, DEFAULT_TTL_SECS, Arc::new(clock));
        cache.set("a", "b", &kind_of_blue());
        assert!(path.exists());
    }
}
