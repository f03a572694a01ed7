pub mod artwork;
pub mod candidate;
pub mod canonical_cache;
pub mod clock;
pub mod config;
pub mod display;
pub mod error;
pub mod recognition;
pub mod recognizer;
pub mod resolver;
pub mod scorer;
pub mod shazam;
pub mod slideshow;
pub mod state;

pub use artwork::{FetchArtwork, HttpArtworkFetcher};
pub use candidate::{make_key, normalize_text, Candidate};
pub use canonical_cache::{CacheEntry, CanonicalCache, DEFAULT_TTL_SECS};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{Config, Settings};
pub use error::{CoverframeError, Result};
pub use recognition::{RecognitionOutcome, Recognize, SongrecRecognizer, SongrecSettings};
pub use recognizer::{RecognizerCore, RecognizerHandle, RecognizerSettings, RecognizerWorker};
pub use resolver::{gather_alternates, resolve_canonical_release, AlternateSource, CACHE_BONUS};
pub use scorer::{choose_best_release, has_suspicious_tokens, score_release, suspicious_tokens};
pub use slideshow::Slideshow;
pub use state::{lock_state, new_shared_state, snapshot, toggle_listening, DisplayState, Mode, SharedState};
