use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::canonical_cache::{CACHE_FILE_NAME, DEFAULT_TTL_SECS};
use crate::error::{CoverframeError, Result};
use crate::recognition::SongrecSettings;
use crate::recognizer::RecognizerSettings;

pub const COVER_FILE_NAME: &str = "cover.jpg";
pub const SNIPPET_FILE_NAME: &str = "snippet.wav";

/// Configuration defaults that can be saved to a file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub record_seconds: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub poll_interval: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_timeout: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub idle_to_slideshow: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub stale_track_to_slideshow: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub upgrade_window: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_ttl: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub slideshow_dir: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub slideshow_interval: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub fps: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub alt_metadata_lookup: Option<bool>,
}

impl Config {
    /// Create a new empty config
    pub fn new() -> Self {
        Self::default()
    }

    /// Built-in defaults; every field set.
    pub fn builtin_defaults() -> Self {
        let home = home_dir().unwrap_or_else(|_| PathBuf::from("."));
        Config {
            device: Some("default".to_string()),
            rate: Some(44100),
            record_seconds: Some(5.0),
            poll_interval: Some(7.0),
            network_timeout: Some(6.0),
            idle_to_slideshow: Some(12.0),
            stale_track_to_slideshow: Some(90.0),
            upgrade_window: Some(30.0),
            cache_ttl: Some(DEFAULT_TTL_SECS),
            cache_dir: Some(home.join(".cache").join("coverframe").to_string_lossy().into_owned()),
            slideshow_dir: Some(
                home.join(".local")
                    .join("share")
                    .join("coverframe")
                    .join("slideshow")
                    .to_string_lossy()
                    .into_owned(),
            ),
            slideshow_interval: Some(60.0),
            fps: Some(10),
            alt_metadata_lookup: Some(false),
        }
    }

    /// Get the config file path (~/.state/coverframe/defaults.toml)
    pub fn get_config_path() -> Result<PathBuf> {
        Ok(home_dir()?.join(".state").join("coverframe").join("defaults.toml"))
    }

    /// Load config from the default location
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::get_config_path()?)
    }

    /// Load config from `path`; a missing file is an empty config
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Config::new());
        }
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Save config to the default location
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::get_config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let toml_string = toml::to_string_pretty(self)?;
        fs::write(path, toml_string)?;
        Ok(())
    }

    /// Merge this config with another, preferring values from other
    pub fn merge(&mut self, other: &Config) {
        fn take<T: Clone>(dst: &mut Option<T>, src: &Option<T>) {
            if src.is_some() {
                *dst = src.clone();
            }
        }
        take(&mut self.device, &other.device);
        take(&mut self.rate, &other.rate);
        take(&mut self.record_seconds, &other.record_seconds);
        take(&mut self.poll_interval, &other.poll_interval);
        take(&mut self.network_timeout, &other.network_timeout);
        take(&mut self.idle_to_slideshow, &other.idle_to_slideshow);
        take(&mut self.stale_track_to_slideshow, &other.stale_track_to_slideshow);
        take(&mut self.upgrade_window, &other.upgrade_window);
        take(&mut self.cache_ttl, &other.cache_ttl);
        take(&mut self.cache_dir, &other.cache_dir);
        take(&mut self.slideshow_dir, &other.slideshow_dir);
        take(&mut self.slideshow_interval, &other.slideshow_interval);
        take(&mut self.fps, &other.fps);
        take(&mut self.alt_metadata_lookup, &other.alt_metadata_lookup);
    }

    /// Print the config in a human-readable format
    pub fn print(&self, title: &str) {
        println!("{}:", title);

        if let Some(device) = &self.device {
            println!("  Capture device:       {}", device);
        }
        if let Some(rate) = self.rate {
            println!("  Sample rate:          {} Hz", rate);
        }
        if let Some(v) = self.record_seconds {
            println!("  Snippet length:       {} seconds", v);
        }
        if let Some(v) = self.poll_interval {
            println!("  Poll interval:        {} seconds", v);
        }
        if let Some(v) = self.network_timeout {
            println!("  Network timeout:      {} seconds", v);
        }
        if let Some(v) = self.idle_to_slideshow {
            println!("  Idle to slideshow:    {} seconds", v);
        }
        if let Some(v) = self.stale_track_to_slideshow {
            println!("  Stale track timeout:  {} seconds", v);
        }
        if let Some(v) = self.upgrade_window {
            println!("  Upgrade window:       {} seconds", v);
        }
        if let Some(v) = self.cache_ttl {
            println!("  Cache TTL:            {} seconds", v);
        }
        if let Some(dir) = &self.cache_dir {
            println!("  Cache directory:      {}", dir);
        }
        if let Some(dir) = &self.slideshow_dir {
            println!("  Slideshow directory:  {}", dir);
        }
        if let Some(v) = self.slideshow_interval {
            println!("  Slide interval:       {} seconds", v);
        }
        if let Some(fps) = self.fps {
            println!("  Frame rate:           {} fps", fps);
        }
        if let Some(alt) = self.alt_metadata_lookup {
            println!("  Alternate lookup:     {}", if alt { "enabled" } else { "disabled" });
        }
    }
}

fn home_dir() -> Result<PathBuf> {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .ok_or(CoverframeError::NoHome)
}

/// Fully resolved settings derived from a [`Config`] layered over the
/// built-in defaults.
#[derive(Debug, Clone)]
pub struct Settings {
    pub device: String,
    pub rate: u32,
    pub record_seconds: f64,
    pub poll_interval: f64,
    pub network_timeout: f64,
    pub idle_to_slideshow: f64,
    pub stale_track_to_slideshow: f64,
    pub upgrade_window: f64,
    pub cache_ttl: f64,
    pub cache_dir: PathBuf,
    pub slideshow_dir: PathBuf,
    pub slideshow_interval: f64,
    pub fps: u32,
    pub alt_metadata_lookup: bool,
}

impl Settings {
    pub fn from_config(config: &Config) -> Self {
        let mut effective = Config::builtin_defaults();
        effective.merge(config);
        let defaults = Config::builtin_defaults();

        // `effective` has every field set; fall back to the defaults anyway.
        fn or<T: Clone>(value: &Option<T>, fallback: &Option<T>, last: T) -> T {
            value.clone().or_else(|| fallback.clone()).unwrap_or(last)
        }

        Settings {
            device: or(&effective.device, &defaults.device, "default".to_string()),
            rate: or(&effective.rate, &defaults.rate, 44100),
            record_seconds: or(&effective.record_seconds, &defaults.record_seconds, 5.0),
            poll_interval: or(&effective.poll_interval, &defaults.poll_interval, 7.0),
            network_timeout: or(&effective.network_timeout, &defaults.network_timeout, 6.0),
            idle_to_slideshow: or(&effective.idle_to_slideshow, &defaults.idle_to_slideshow, 12.0),
            stale_track_to_slideshow: or(
                &effective.stale_track_to_slideshow,
                &defaults.stale_track_to_slideshow,
                90.0,
            ),
            upgrade_window: or(&effective.upgrade_window, &defaults.upgrade_window, 30.0),
            cache_ttl: or(&effective.cache_ttl, &defaults.cache_ttl, DEFAULT_TTL_SECS),
            cache_dir: PathBuf::from(or(&effective.cache_dir, &defaults.cache_dir, ".".to_string())),
            slideshow_dir: PathBuf::from(or(&effective.slideshow_dir, &defaults.slideshow_dir, ".".to_string())),
            slideshow_interval: or(&effective.slideshow_interval, &defaults.slideshow_interval, 60.0),
            fps: or(&effective.fps, &defaults.fps, 10).max(1),
            alt_metadata_lookup: or(&effective.alt_metadata_lookup, &defaults.alt_metadata_lookup, false),
        }
    }

    pub fn cover_path(&self) -> PathBuf {
        self.cache_dir.join(COVER_FILE_NAME)
    }

    pub fn cache_path(&self) -> PathBuf {
        self.cache_dir.join(CACHE_FILE_NAME)
    }

    pub fn network_timeout_duration(&self) -> Duration {
        Duration::from_secs_f64(self.network_timeout.max(0.1))
    }

    pub fn recognizer_settings(&self) -> RecognizerSettings {
        RecognizerSettings {
            poll_interval: self.poll_interval,
            idle_to_slideshow: self.idle_to_slideshow,
            stale_track_to_slideshow: self.stale_track_to_slideshow,
            upgrade_window: self.upgrade_window,
            alt_metadata_lookup: self.alt_metadata_lookup,
            cover_path: self.cover_path(),
        }
    }

    pub fn songrec_settings(&self) -> SongrecSettings {
        SongrecSettings {
            device: self.device.clone(),
            rate: self.rate,
            record_seconds: self.record_seconds,
            network_timeout: self.network_timeout_duration(),
            snippet_path: self.cache_dir.join(SNIPPET_FILE_NAME),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_merge_prefers_other() {
        let mut base = Config::builtin_defaults();
        let overrides = Config {
            poll_interval: Some(10.0),
            device: Some("hw:1,0".to_string()),
            ..Config::new()
        };
        base.merge(&overrides);
        assert_eq!(base.poll_interval, Some(10.0));
        assert_eq!(base.device.as_deref(), Some("hw:1,0"));
        assert_eq!(base.idle_to_slideshow, Some(12.0));
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state").join("defaults.toml");
        let config = Config {
            upgrade_window: Some(45.0),
            alt_metadata_lookup: Some(true),
            ..Config::new()
        };
        config.save_to(&path).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("upgrade_window = 45.0"));
        assert!(!content.contains("device"));

        assert_eq!(Config::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        assert_eq!(Config::load_from(&dir.path().join("nope.toml")).unwrap(), Config::new());
    }

    #[test]
    fn test_load_invalid_toml_is_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.toml");
        fs::write(&path, "poll_interval = \"soon\"").unwrap();
        assert!(matches!(Config::load_from(&path), Err(CoverframeError::TomlDe(_))));
    }

    #[test]
    fn test_settings_from_config() {
        let config = Config {
            cache_dir: Some("/var/cache/frame".to_string()),
            stale_track_to_slideshow: Some(120.0),
            fps: Some(0),
            ..Config::new()
        };
        let settings = Settings::from_config(&config);
        assert_eq!(settings.stale_track_to_slideshow, 120.0);
        assert_eq!(settings.idle_to_slideshow, 12.0);
        assert_eq!(settings.cache_ttl, 14.0 * 24.0 * 3600.0);
        assert_eq!(settings.fps, 1);
        assert_eq!(settings.cover_path(), PathBuf::from("/var/cache/frame/cover.jpg"));
        assert_eq!(
            settings.cache_path(),
            PathBuf::from("/var/cache/frame/canonical_release_cache.json")
        );
        let recognizer = settings.recognizer_settings();
        assert_eq!(recognizer.upgrade_window, 30.0);
        assert_eq!(recognizer.cover_path, settings.cover_path());
        assert_eq!(settings.songrec_settings().snippet_path, PathBuf::from("/var/cache/frame/snippet.wav"));
    }
}
