//! Slideshow image rotation for idle periods.

use rand::seq::SliceRandom;
use rand::Rng;
use std::fs;
use std::path::{Path, PathBuf};

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "bmp", "gif"];

/// Image files directly inside `dir`, sorted by path. A missing or
/// unreadable directory yields an empty list.
pub fn list_slideshow_images(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut images: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .filter(|p| {
            p.extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
                .unwrap_or(false)
        })
        .collect();
    images.sort();
    images
}

/// Pick a random image, avoiding `last` whenever there is another choice.
pub fn pick_random_image<'a, R: Rng + ?Sized>(
    images: &'a [PathBuf],
    last: Option<&Path>,
    rng: &mut R,
) -> Option<&'a PathBuf> {
    if images.len() > 1 {
        if let Some(last) = last {
            let others: Vec<&PathBuf> = images.iter().filter(|p| p.as_path() != last).collect();
            if !others.is_empty() {
                return others.choose(rng).copied();
            }
        }
    }
    images.choose(rng)
}

/// Tracks which slide is showing and when to advance.
#[derive(Debug, Default)]
pub struct Slideshow {
    dir: PathBuf,
    interval: f64,
    images: Vec<PathBuf>,
    current: Option<PathBuf>,
    next_slide_at: f64,
}

impl Slideshow {
    pub fn new(dir: impl Into<PathBuf>, interval: f64) -> Self {
        Slideshow {
            dir: dir.into(),
            interval,
            images: Vec::new(),
            current: None,
            next_slide_at: 0.0,
        }
    }

    pub fn current(&self) -> Option<&Path> {
        self.current.as_deref()
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    /// Re-scan the slideshow directory.
    pub fn refresh(&mut self) {
        self.images = list_slideshow_images(&self.dir);
    }

    /// Advance to a new slide if the interval has elapsed. Returns true
    /// when the slide changed.
    pub fn tick<R: Rng + ?Sized>(&mut self, now: f64, rng: &mut R) -> bool {
        if now < self.next_slide_at {
            return false;
        }
        self.next_slide_at = now + self.interval;
        let next = pick_random_image(&self.images, self.current.as_deref(), rng).cloned();
        let changed = next != self.current;
        self.current = next;
        changed
    }
}
