//! Turns a fresh recognition (plus optional alternates) into one resolved
//! release, consulting and populating the canonical cache.

use log::info;

use crate::candidate::Candidate;
use crate::canonical_cache::CanonicalCache;
use crate::scorer::{choose_best_release, has_suspicious_tokens, score_release};

/// Added to a clean cached release so a single fresh recognition cannot
/// displace it.
pub const CACHE_BONUS: f64 = 200.0;

/// A source of additional candidate releases for a recognized track.
pub trait AlternateSource: Send {
    fn name(&self) -> &str;
    fn alternates(&self, primary: &Candidate) -> Vec<Candidate>;
}

/// Gather alternates for `primary` from every configured source.
pub fn gather_alternates(
    enabled: bool,
    sources: &[Box<dyn AlternateSource>],
    primary: &Candidate,
) -> Vec<Candidate> {
    if !enabled {
        return Vec::new();
    }
    if sources.is_empty() {
        info!("Alternate metadata lookup is enabled, but no providers are configured.");
        return Vec::new();
    }
    sources
        .iter()
        .flat_map(|source| {
            let found = source.alternates(primary);
            info!("{} offered {} alternate release(s)", source.name(), found.len());
            found
        })
        .collect()
}

/// Resolve the release to display for `primary`.
///
/// A clean cached release for the same `(artist, title)` short-circuits
/// scoring entirely and carries [`CACHE_BONUS`]. Otherwise the primary and
/// alternates are scored and a clean winner is written to the cache.
pub fn resolve_canonical_release(
    primary: &Candidate,
    alternates: &[Candidate],
    cache: Option<&mut CanonicalCache>,
) -> (Candidate, f64) {
    let use_cache = !primary.artist.is_empty() || !primary.title.is_empty();
    let mut cache = if use_cache { cache } else { None };

    if let Some(cache) = cache.as_deref_mut() {
        if let Some(cached) = cache.get(&primary.artist, &primary.title) {
            if !has_suspicious_tokens(&cached.album) {
                let score = score_release(&cached, primary, true) + CACHE_BONUS;
                return (cached, score);
            }
        }
    }

    let mut candidates = Vec::with_capacity(1 + alternates.len());
    candidates.push(primary.clone());
    candidates.extend(alternates.iter().filter(|c| !c.is_empty()).cloned());

    let (best, best_score) = choose_best_release(&candidates, Some(primary));
    if let Some(cache) = cache {
        if !has_suspicious_tokens(&best.album) {
            cache.set(&primary.artist, &primary.title, &best);
        }
    }
    (best, best_score)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canonical_cache::{CACHE_FILE_NAME, DEFAULT_TTL_SECS};
    use crate::clock::ManualClock;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn song(album: &str) -> Candidate {
        Candidate::new("Naima", "John Coltrane", album, "1960", "", "shazam")
    }

    fn cache_in(dir: &TempDir) -> CanonicalCache {
        CanonicalCache::open(
            dir.path().join(CACHE_FILE_NAME),
            DEFAULT_TTL_SECS,
            Arc::new(ManualClock::new(1_700_000_000.0)),
        )
    }

    struct FixedSource(Vec<Candidate>);

    impl AlternateSource for FixedSource {
        fn name(&self) -> &str {
            "fixed"
        }
        fn alternates(&self, _primary: &Candidate) -> Vec<Candidate> {
            self.0.clone()
        }
    }

    #[test]
    fn test_resolve_without_cache_scores_alternates() {
        let primary = song("Jazz Ballads Collection");
        let alternate = song("Giant Steps");
        let (best, score) = resolve_canonical_release(&primary, &[alternate.clone()], None);
        assert_eq!(best, alternate);
        assert_eq!(score, score_release(&alternate, &primary, true));
    }

    #[test]
    fn test_clean_winner_is_cached() {
        let dir = TempDir::new().unwrap();
        let mut cache = cache_in(&dir);
        let primary = song("Giant Steps");
        let (best, _) = resolve_canonical_release(&primary, &[], Some(&mut cache));
        assert_eq!(best, primary);
        assert_eq!(cache.get("John Coltrane", "Naima"), Some(primary));
    }

    #[test]
    fn test_suspicious_winner_is_not_cached() {
        let dir = TempDir::new().unwrap();
        let mut cache = cache_in(&dir);
        let primary = song("Jazz Karaoke Hits");
        let (best, _) = resolve_canonical_release(&primary, &[], Some(&mut cache));
        assert_eq!(best, primary);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_cache_short_circuit_beats_worse_primary() {
        let dir = TempDir::new().unwrap();
        let mut cache = cache_in(&dir);
        let clean = song("Giant Steps");
        resolve_canonical_release(&clean, &[], Some(&mut cache));

        let worse = song("Relaxing Jazz for Study and Sleep");
        let better_alternate = song("GS");
        let (best, score) = resolve_canonical_release(&worse, &[better_alternate], Some(&mut cache));
        assert_eq!(best, clean);
        assert_eq!(score, score_release(&clean, &worse, true) + CACHE_BONUS);
    }

    #[test]
    fn test_suspicious_cache_entry_is_ignored() {
        let dir = TempDir::new().unwrap();
        let mut cache = cache_in(&dir);
        cache.set("John Coltrane", "Naima", &song("Tribute to Coltrane"));

        let primary = song("Giant Steps");
        let (best, score) = resolve_canonical_release(&primary, &[], Some(&mut cache));
        assert_eq!(best, primary);
        assert!(score < CACHE_BONUS);
        // Clean result replaced the suspicious entry
        assert_eq!(cache.get("John Coltrane", "Naima"), Some(primary));
    }

    #[test]
    fn test_unknown_track_skips_cache() {
        let dir = TempDir::new().unwrap();
        let mut cache = cache_in(&dir);
        let primary = Candidate::new("", "", "Some Album", "", "", "shazam");
        resolve_canonical_release(&primary, &[], Some(&mut cache));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_gather_alternates() {
        let primary = song("Giant Steps");
        let sources: Vec<Box<dyn AlternateSource>> = vec![Box::new(FixedSource(vec![song("A"), song("B")]))];
        assert!(gather_alternates(false, &sources, &primary).is_empty());
        assert!(gather_alternates(true, &[], &primary).is_empty());
        assert_eq!(gather_alternates(true, &sources, &primary).len(), 2);
    }
}
