//! Error type shared by the collaborators (config, recognition, artwork).
//!
//! The resolution core never fails; these errors only exist at the I/O
//! edges and are folded into "no match" / "keep old artwork" before they
//! reach the state machine.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoverframeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to parse config: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("Failed to write config: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("HTTP error: {0}")]
    Http(String),

    /// External command exited unsuccessfully
    #[error("{program} failed: {message}")]
    Command { program: String, message: String },

    #[error("{0} timed out after {1:.1}s")]
    Timeout(String, f64),

    #[error("HOME environment variable not set")]
    NoHome,

    #[error("Recognizer worker panicked")]
    WorkerPanicked,
}

impl From<ureq::Error> for CoverframeError {
    fn from(err: ureq::Error) -> Self {
        CoverframeError::Http(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CoverframeError>;
