//! Display state shared between the recognizer worker and the renderer.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Listening,
    NowPlaying,
    Slideshow,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Listening => "listening",
            Mode::NowPlaying => "nowplaying",
            Mode::Slideshow => "slideshow",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the screen should show. Only mutated while holding the
/// [`SharedState`] lock.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayState {
    /// When false no audio is recorded and nothing is sent over the network.
    pub listening_enabled: bool,
    pub mode: Mode,

    pub title: String,
    pub artist: String,
    pub album: String,
    pub year: String,
    pub cover_url: String,
    pub cover_path: String,

    /// Bumped whenever displayed content or mode changes.
    pub last_update_ts: f64,
    pub last_match_ts: f64,
}

impl DisplayState {
    pub fn new(cover_path: &str) -> Self {
        DisplayState {
            listening_enabled: true,
            mode: Mode::Listening,
            title: String::new(),
            artist: String::new(),
            album: String::new(),
            year: String::new(),
            cover_url: String::new(),
            cover_path: cover_path.to_string(),
            last_update_ts: 0.0,
            last_match_ts: 0.0,
        }
    }

    pub fn has_known_track(&self) -> bool {
        !self.title.is_empty() || !self.artist.is_empty()
    }

    /// Switch mode, bumping `last_update_ts` only on an actual change.
    pub fn set_mode(&mut self, mode: Mode, now: f64) {
        if self.mode != mode {
            self.mode = mode;
            self.last_update_ts = now;
        }
    }
}

pub type SharedState = Arc<Mutex<DisplayState>>;

pub fn new_shared_state(cover_path: &str) -> SharedState {
    Arc::new(Mutex::new(DisplayState::new(cover_path)))
}

/// Lock the state. The state is plain data, so a poisoned lock is still
/// safe to use.
pub fn lock_state(state: &SharedState) -> MutexGuard<'_, DisplayState> {
    state.lock().unwrap_or_else(|e| e.into_inner())
}

/// Copy of the state taken under the lock.
pub fn snapshot(state: &SharedState) -> DisplayState {
    lock_state(state).clone()
}

/// Flip `listening_enabled` and apply the matching mode right away.
///
/// Disabling shows the slideshow. Enabling returns to listening and resets
/// the match timer so the idle countdown starts fresh. Returns the new
/// value of `listening_enabled`.
pub fn toggle_listening(state: &SharedState, now: f64) -> bool {
    let mut s = lock_state(state);
    s.listening_enabled = !s.listening_enabled;
    if s.listening_enabled {
        s.mode = Mode::Listening;
        s.last_match_ts = 0.0;
    } else {
        s.mode = Mode::Slideshow;
    }
    s.last_update_ts = now;
    s.listening_enabled
}
