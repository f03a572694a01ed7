//! Recognition collaborator: record a short snippet and ask Shazam what it
//! is.
//!
//! The shipped implementation shells out to `arecord` for capture and to
//! `songrec audio-file-to-recognized-song` for fingerprinting and the
//! Shazam request. Both child processes run under a deadline and are
//! killed when it passes, so a hung service costs one cycle at most.

use log::{debug, warn};
use std::io::Read;
use std::path::PathBuf;
use std::process::{Command, Output, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use crate::candidate::Candidate;
use crate::error::{CoverframeError, Result};
use crate::shazam::extract_candidate;

/// Result of one recognition attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum RecognitionOutcome {
    Recognized(Candidate),
    NoMatch,
    /// Network, provider or capture failure. Handled like `NoMatch`.
    Failed(String),
}

pub trait Recognize: Send {
    fn recognize(&mut self) -> RecognitionOutcome;
}

/// Capture and recognition settings for [`SongrecRecognizer`].
#[derive(Debug, Clone)]
pub struct SongrecSettings {
    /// ALSA capture device passed to `arecord -D`.
    pub device: String,
    pub rate: u32,
    pub record_seconds: f64,
    pub network_timeout: Duration,
    /// Where the captured snippet is written.
    pub snippet_path: PathBuf,
}

pub struct SongrecRecognizer {
    settings: SongrecSettings,
}

impl SongrecRecognizer {
    pub fn new(settings: SongrecSettings) -> Self {
        SongrecRecognizer { settings }
    }

    fn record_snippet(&self) -> Result<()> {
        let s = &self.settings;
        if let Some(parent) = s.snippet_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let seconds = s.record_seconds.ceil().max(1.0) as u32;
        let mut cmd = Command::new("arecord");
        cmd.arg("-q")
            .arg("-D")
            .arg(&s.device)
            .arg("-f")
            .arg("S16_LE")
            .arg("-c")
            .arg("1")
            .arg("-r")
            .arg(s.rate.to_string())
            .arg("-d")
            .arg(seconds.to_string())
            .arg(&s.snippet_path);

        let deadline = Duration::from_secs(seconds as u64) + s.network_timeout;
        let output = run_with_timeout("arecord", &mut cmd, deadline)?;
        check_status("arecord", &output)
    }

    fn run_songrec(&self) -> Result<RecognitionOutcome> {
        let mut cmd = Command::new("songrec");
        cmd.arg("audio-file-to-recognized-song")
            .arg(&self.settings.snippet_path);
        let output = run_with_timeout("songrec", &mut cmd, self.settings.network_timeout)?;
        check_status("songrec", &output)?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let json: serde_json::Value = serde_json::from_str(stdout.trim())?;
        Ok(match extract_candidate(&json) {
            Some(candidate) => RecognitionOutcome::Recognized(candidate),
            None => RecognitionOutcome::NoMatch,
        })
    }
}

impl Recognize for SongrecRecognizer {
    fn recognize(&mut self) -> RecognitionOutcome {
        let started = Instant::now();
        let result = self.record_snippet().and_then(|_| self.run_songrec());
        debug!("Recognition took {:.1}s", started.elapsed().as_secs_f64());
        match result {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("Recognition failed: {}", e);
                RecognitionOutcome::Failed(e.to_string())
            }
        }
    }
}

fn check_status(program: &str, output: &Output) -> Result<()> {
    if output.status.success() {
        return Ok(());
    }
    Err(CoverframeError::Command {
        program: program.to_string(),
        message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
    })
}

/// Run `cmd` to completion, killing it if it outlives `timeout`.
///
/// stdout and stderr are drained on helper threads so a chatty child
/// cannot block on a full pipe.
pub fn run_with_timeout(program: &str, cmd: &mut Command, timeout: Duration) -> Result<Output> {
    let mut child = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    let stdout_reader = thread::spawn(move || drain(stdout));
    let stderr_reader = thread::spawn(move || drain(stderr));

    let deadline = Instant::now() + timeout;
    let status = loop {
        if let Some(status) = child.try_wait()? {
            break status;
        }
        if Instant::now() >= deadline {
            let _ = child.kill();
            let _ = child.wait();
            return Err(CoverframeError::Timeout(program.to_string(), timeout.as_secs_f64()));
        }
        thread::sleep(Duration::from_millis(50));
    };

    Ok(Output {
        status,
        stdout: stdout_reader.join().unwrap_or_default(),
        stderr: stderr_reader.join().unwrap_or_default(),
    })
}

fn drain<R: Read>(pipe: Option<R>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        let _ = pipe.read_to_end(&mut buf);
    }
    buf
}
