//! Recognizer worker. Periodically identifies the ambient track, resolves
//! the release to show and drives the display mode.
//!
//! # Modes
//!
//! * `Listening`: polling, nothing confirmed yet.
//! * `NowPlaying`: a track is confirmed and shown. Short gaps in
//!   recognition keep it on screen until the stale-track timeout.
//! * `Slideshow`: listening is off, or nothing matched for long enough.
//!
//! # Release stabilization
//!
//! Each newly detected track (by resolved artist/title) opens a session.
//! The first resolution is accepted right away; after that exactly one
//! strictly better resolution may replace it, and only within the upgrade
//! window. Anything else keeps the displayed release.

use log::{debug, error, info, warn};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::artwork::FetchArtwork;
use crate::candidate::{make_key, Candidate};
use crate::canonical_cache::CanonicalCache;
use crate::clock::Clock;
use crate::error::{CoverframeError, Result};
use crate::recognition::{RecognitionOutcome, Recognize};
use crate::resolver::{gather_alternates, resolve_canonical_release, AlternateSource};
use crate::state::{lock_state, snapshot, Mode, SharedState};

/// Granularity of every sleep in the worker loop; bounds stop latency.
pub const SLEEP_SLICE: Duration = Duration::from_millis(100);
/// Retry delay while listening is disabled.
pub const DISABLED_RETRY: Duration = Duration::from_millis(200);
/// Shortest pause between two recognition attempts.
pub const MIN_CYCLE_SLEEP_SECS: f64 = 1.0;

#[derive(Debug, Clone)]
pub struct RecognizerSettings {
    /// Target time between recognition attempts (seconds).
    pub poll_interval: f64,
    /// No match for this long with no known track → slideshow.
    pub idle_to_slideshow: f64,
    /// No match for this long while a track is displayed → slideshow.
    pub stale_track_to_slideshow: f64,
    /// How long after acceptance one better release may replace it.
    pub upgrade_window: f64,
    pub alt_metadata_lookup: bool,
    /// Where downloaded cover art is stored.
    pub cover_path: PathBuf,
}

#[derive(Debug, Clone, Default, PartialEq)]
struct ResolutionSession {
    key: String,
    score: Option<f64>,
    accepted_ts: f64,
    upgraded: bool,
}

impl ResolutionSession {
    fn start(key: String, now: f64) -> Self {
        ResolutionSession {
            key,
            score: None,
            accepted_ts: now,
            upgraded: false,
        }
    }
}

/// Fields that end up on screen for an accepted (or retained) match.
#[derive(Debug, Clone, PartialEq)]
struct Shown {
    title: String,
    artist: String,
    album: String,
    year: String,
    cover_url: String,
}

fn pick(resolved: &str, fallback: &str) -> String {
    if resolved.is_empty() {
        fallback.to_string()
    } else {
        resolved.to_string()
    }
}

/// Single-threaded recognizer logic. [`RecognizerWorker`] runs it in a loop.
pub struct RecognizerCore {
    state: SharedState,
    recognizer: Box<dyn Recognize>,
    fetcher: Box<dyn FetchArtwork>,
    cache: Option<CanonicalCache>,
    alternates: Vec<Box<dyn AlternateSource>>,
    settings: RecognizerSettings,
    clock: Arc<dyn Clock>,
    session: ResolutionSession,
}

impl RecognizerCore {
    pub fn new(
        state: SharedState,
        recognizer: Box<dyn Recognize>,
        fetcher: Box<dyn FetchArtwork>,
        cache: Option<CanonicalCache>,
        settings: RecognizerSettings,
        clock: Arc<dyn Clock>,
    ) -> Self {
        RecognizerCore {
            state,
            recognizer,
            fetcher,
            cache,
            alternates: Vec::new(),
            settings,
            clock,
            session: ResolutionSession::default(),
        }
    }

    pub fn with_alternate_source(mut self, source: Box<dyn AlternateSource>) -> Self {
        self.alternates.push(source);
        self
    }

    pub fn settings(&self) -> &RecognizerSettings {
        &self.settings
    }

    /// Run one poll cycle. Returns false (and does nothing) while listening
    /// is disabled.
    pub fn poll_once(&mut self) -> bool {
        if !lock_state(&self.state).listening_enabled {
            return false;
        }

        let now = self.clock.now();
        let recognizer = &mut self.recognizer;
        let outcome = catch_unwind(AssertUnwindSafe(|| recognizer.recognize()))
            .unwrap_or_else(|_| RecognitionOutcome::Failed("recognizer panicked".to_string()));

        match outcome {
            RecognitionOutcome::Recognized(primary) => {
                let handled = catch_unwind(AssertUnwindSafe(|| self.handle_match(&primary, now)));
                if handled.is_err() {
                    error!("Unexpected fault while handling match for {}", primary);
                    self.handle_miss(now);
                }
            }
            RecognitionOutcome::NoMatch => {
                debug!("No match");
                self.handle_miss(now);
            }
            RecognitionOutcome::Failed(reason) => {
                warn!("Recognition failed, treating as no match: {}", reason);
                self.handle_miss(now);
            }
        }
        true
    }

    /// Decide whether the resolved release replaces what the session holds.
    fn accept(&mut self, key: String, score: f64, now: f64) -> bool {
        if key != self.session.key {
            debug!("New track {}, resetting resolution session", key);
            self.session = ResolutionSession::start(key, now);
        }

        let accepted = match self.session.score {
            None => true,
            Some(previous) => {
                let is_better = score > previous;
                let within_window = now - self.session.accepted_ts <= self.settings.upgrade_window;
                if is_better && within_window && !self.session.upgraded {
                    info!(
                        "Upgrading release for {} (score {:.2} -> {:.2})",
                        self.session.key, previous, score
                    );
                    self.session.upgraded = true;
                    true
                } else {
                    false
                }
            }
        };

        if accepted {
            self.session.score = Some(score);
            self.session.accepted_ts = now;
        }
        accepted
    }

    fn handle_match(&mut self, primary: &Candidate, now: f64) {
        let alternates = gather_alternates(self.settings.alt_metadata_lookup, &self.alternates, primary);
        let (best, score) = resolve_canonical_release(primary, &alternates, self.cache.as_mut());

        let key = make_key(&pick(&best.artist, &primary.artist), &pick(&best.title, &primary.title));
        let previous_session = self.session.clone();
        let accepted = self.accept(key, score, now);

        let prev = snapshot(&self.state);
        let shown = if accepted {
            Shown {
                title: pick(&best.title, &primary.title),
                artist: pick(&best.artist, &primary.artist),
                album: pick(&best.album, &primary.album),
                year: pick(&best.year, &primary.year),
                cover_url: pick(&best.cover_url, &primary.cover_url),
            }
        } else {
            Shown {
                title: prev.title.clone(),
                artist: prev.artist.clone(),
                album: prev.album.clone(),
                year: prev.year.clone(),
                cover_url: prev.cover_url.clone(),
            }
        };

        if shown.title.is_empty() && shown.artist.is_empty() {
            self.handle_miss(now);
            return;
        }

        // Network I/O happens without the lock.
        let art_ok = if !shown.cover_url.is_empty() && shown.cover_url != prev.cover_url {
            self.fetcher.fetch(&shown.cover_url, &self.settings.cover_path)
        } else {
            false
        };

        let mut s = lock_state(&self.state);
        if !s.listening_enabled {
            debug!("Listening disabled during recognition, dropping result");
            // Nothing was shown, so the session must not count it as accepted
            self.session = previous_session;
            return;
        }

        let content_changed = s.title != shown.title
            || s.artist != shown.artist
            || s.album != shown.album
            || s.year != shown.year
            || s.cover_url != shown.cover_url;

        if content_changed || s.mode != Mode::NowPlaying {
            if content_changed {
                info!("Now playing: {} - {} [{}]", shown.artist, shown.title, shown.album);
            }
            s.title = shown.title;
            s.artist = shown.artist;
            s.album = shown.album;
            s.year = shown.year;
            s.cover_url = shown.cover_url;
            if art_ok {
                s.cover_path = self.settings.cover_path.to_string_lossy().into_owned();
            }
            s.mode = Mode::NowPlaying;
            s.last_update_ts = now;
        }
        s.last_match_ts = now;
    }

    fn handle_miss(&mut self, now: f64) {
        let mut s = lock_state(&self.state);
        if !s.listening_enabled {
            return;
        }

        let has_known_track = s.has_known_track();
        if s.last_match_ts == 0.0 {
            s.last_match_ts = now;
        }

        let idle_limit = if has_known_track {
            self.settings.stale_track_to_slideshow
        } else {
            self.settings.idle_to_slideshow
        };

        let next = if now - s.last_match_ts >= idle_limit {
            Mode::Slideshow
        } else if has_known_track {
            Mode::NowPlaying
        } else {
            Mode::Listening
        };
        if s.mode != next {
            info!("Mode {} -> {}", s.mode, next);
        }
        s.set_mode(next, now);
    }
}

/// Sleep up to `total`, waking every [`SLEEP_SLICE`] to check `stop`.
fn sleep_unless_stopped(stop: &AtomicBool, total: Duration) {
    let deadline = Instant::now() + total;
    while !stop.load(Ordering::SeqCst) {
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        thread::sleep(SLEEP_SLICE.min(deadline - now));
    }
}

/// Background thread running [`RecognizerCore::poll_once`] on a cadence.
pub struct RecognizerWorker;

impl RecognizerWorker {
    pub fn spawn(mut core: RecognizerCore) -> Result<RecognizerHandle> {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);

        let handle = thread::Builder::new()
            .name("recognizer".to_string())
            .spawn(move || {
                info!("Recognizer started");
                let poll_interval = core.settings().poll_interval;
                while !stop_flag.load(Ordering::SeqCst) {
                    let started = Instant::now();
                    if !core.poll_once() {
                        sleep_unless_stopped(&stop_flag, DISABLED_RETRY);
                        continue;
                    }
                    let elapsed = started.elapsed().as_secs_f64();
                    let sleep_for = (poll_interval - elapsed).max(MIN_CYCLE_SLEEP_SECS);
                    sleep_unless_stopped(&stop_flag, Duration::from_secs_f64(sleep_for));
                }
                info!("Recognizer stopped");
            })?;

        Ok(RecognizerHandle {
            stop,
            handle: Some(handle),
        })
    }
}

pub struct RecognizerHandle {
    stop: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl RecognizerHandle {
    /// Ask the worker to finish. Safe to call more than once.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    pub fn is_stopping(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    /// Stop the worker and wait for it. `Ok` means an orderly shutdown.
    pub fn join(mut self) -> Result<()> {
        self.stop();
        match self.handle.take() {
            Some(handle) => handle.join().map_err(|_| CoverframeError::WorkerPanicked),
            None => Ok(()),
        }
    }
}

impl Drop for RecognizerHandle {
    fn drop(&mut self) {
        self.stop();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
