//! Cover art download.

use log::{debug, warn};
use std::io::{Read, Write};
use std::path::Path;
use std::time::Duration;

use crate::error::{CoverframeError, Result};

/// Refuse anything larger than this; cover art is a few hundred KB.
const MAX_ARTWORK_BYTES: u64 = 20 * 1024 * 1024;

pub trait FetchArtwork: Send {
    /// Download `url` into `dest`. On failure `dest` is left untouched.
    fn fetch(&self, url: &str, dest: &Path) -> bool;
}

pub struct HttpArtworkFetcher {
    agent: ureq::Agent,
}

impl HttpArtworkFetcher {
    pub fn new(timeout: Duration) -> Self {
        HttpArtworkFetcher {
            agent: ureq::AgentBuilder::new().timeout(timeout).build(),
        }
    }

    fn download(&self, url: &str, dest: &Path) -> Result<usize> {
        let response = self.agent.get(url).call()?;
        let body = read_capped(response.into_reader(), MAX_ARTWORK_BYTES)?;
        write_atomically(dest, &body)?;
        Ok(body.len())
    }
}

/// Read all of `reader`, failing if it yields more than `limit` bytes.
pub fn read_capped<R: Read>(reader: R, limit: u64) -> Result<Vec<u8>> {
    let mut body = Vec::new();
    reader.take(limit + 1).read_to_end(&mut body)?;
    if body.len() as u64 > limit {
        return Err(CoverframeError::Http(format!(
            "artwork larger than {} bytes",
            limit
        )));
    }
    Ok(body)
}

impl FetchArtwork for HttpArtworkFetcher {
    fn fetch(&self, url: &str, dest: &Path) -> bool {
        match self.download(url, dest) {
            Ok(bytes) => {
                debug!("Downloaded {} bytes of artwork to {}", bytes, dest.display());
                true
            }
            Err(e) => {
                warn!("Artwork download from {} failed: {}", url, e);
                false
            }
        }
    }
}

/// Replace `dest` with `data` via a temp file in the same directory, so a
/// reader never sees a half-written image.
pub fn write_atomically(dest: &Path, data: &[u8]) -> Result<()> {
    let dir = match dest.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(data)?;
    tmp.flush()?;
    tmp.persist(dest).map_err(|e| e.error)?;
    Ok(())
}
