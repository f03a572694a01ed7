//! Release scoring.
//!
//! Recognition services often return the same recording attached to a
//! compilation, a karaoke reissue or a "best of" instead of the original
//! album. Every candidate release gets a desirability score from a fixed
//! table of additive rules and the highest one wins.
//!
//! # Rules
//!
//! | rule | contribution |
//! |---|---|
//! | missing album | −30 |
//! | suspicious token in album | −40 each |
//! | album ends in a year (`- 1959`, `(1959)`) | −12 |
//! | EP/single while a full album is on offer | −15 |
//! | album length | −min(len, 80)/20 + max(0, 40 − len)/10 |
//! | artist agrees with preferred | +20 (−10 if both known and different) |
//! | official provider | +10 |
//! | curated allow-list album | +120 |

use log::info;
use regex::Regex;
use std::sync::OnceLock;

use crate::candidate::{normalize_text, Candidate};

/// Album substrings that mark compilations, covers and filler releases.
pub const SUSPICIOUS_TOKENS: &[&str] = &[
    "presents",
    "best of",
    "greatest",
    "hits",
    "collection",
    "compilation",
    "karaoke",
    "tribute",
    "cover",
    "made famous by",
    "originally performed by",
    "various artists",
    "soundtrack",
    "theme",
    "instrumental",
    "relaxing",
    "study",
    "sleep",
    "background",
    "music presents",
    "bd music",
];

/// Providers whose metadata is trusted a little more than the rest.
pub const OFFICIAL_PROVIDERS: &[&str] = &["shazam"];

const EP_SINGLE_TOKENS: &[&str] = &["ep", "single"];

/// Curated (artist, track) pairs whose canonical album is known.
/// Artist and track are stored normalized.
#[derive(Debug, Clone, Copy)]
pub struct AllowlistEntry {
    pub artist: &'static str,
    pub track: &'static str,
    pub album: &'static str,
}

pub const ALLOWLIST_OVERRIDES: &[AllowlistEntry] = &[AllowlistEntry {
    artist: "miles davis",
    track: "so what",
    album: "Kind of Blue",
}];

const ALLOWLIST_BONUS: f64 = 120.0;

fn year_suffix_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\s*[-(]\s*(19|20)\d{2}\s*\)?\s*$").expect("year suffix pattern is valid")
    })
}

// ── Token helpers ───────────────────────────────────────────────────────────

/// Suspicious tokens found in `album`, in table order.
pub fn suspicious_tokens(album: &str) -> Vec<&'static str> {
    let album_norm = normalize_text(album);
    SUSPICIOUS_TOKENS
        .iter()
        .copied()
        .filter(|token| album_norm.contains(token))
        .collect()
}

pub fn has_suspicious_tokens(album: &str) -> bool {
    !suspicious_tokens(album).is_empty()
}

/// True if the album carries an `ep` or `single` word.
pub fn has_ep_or_single(album: &str) -> bool {
    let album_norm = normalize_text(album);
    album_norm
        .split(' ')
        .any(|word| EP_SINGLE_TOKENS.contains(&word))
}

pub fn is_official(provider: &str) -> bool {
    let provider = provider.to_lowercase();
    OFFICIAL_PROVIDERS.contains(&provider.as_str())
}

fn allowlist_entry_for(preferred: &Candidate) -> Option<&'static AllowlistEntry> {
    let artist = normalize_text(&preferred.artist);
    let track = normalize_text(&preferred.title);
    ALLOWLIST_OVERRIDES
        .iter()
        .find(|entry| entry.artist == artist && entry.track == track)
}

// ── Rule table ──────────────────────────────────────────────────────────────

/// Everything a rule may look at while scoring one candidate.
pub struct ScoreInput<'a> {
    pub candidate: &'a Candidate,
    pub preferred: &'a Candidate,
    pub has_non_ep_alternative: bool,
}

/// One named, additive scoring rule.
pub struct Rule {
    pub name: &'static str,
    pub apply: fn(&ScoreInput) -> f64,
}

fn rule_missing_album(input: &ScoreInput) -> f64 {
    if input.candidate.album.is_empty() {
        -30.0
    } else {
        0.0
    }
}

fn rule_suspicious_tokens(input: &ScoreInput) -> f64 {
    let tokens = suspicious_tokens(&input.candidate.album);
    if tokens.is_empty() {
        return 0.0;
    }
    info!(
        "Rejecting suspicious tokens {:?} in album '{}'",
        tokens, input.candidate.album
    );
    -40.0 * tokens.len() as f64
}

fn rule_year_suffix(input: &ScoreInput) -> f64 {
    if year_suffix_re().is_match(&input.candidate.album) {
        -12.0
    } else {
        0.0
    }
}

fn rule_ep_single(input: &ScoreInput) -> f64 {
    if input.has_non_ep_alternative && has_ep_or_single(&input.candidate.album) {
        -15.0
    } else {
        0.0
    }
}

// Both terms depend on length; short canonical titles win twice.
fn rule_album_length(input: &ScoreInput) -> f64 {
    let len = input.candidate.album.chars().count() as f64;
    -(len.min(80.0) / 20.0) + (40.0 - len).max(0.0) / 10.0
}

fn rule_artist_agreement(input: &ScoreInput) -> f64 {
    let preferred = normalize_text(&input.preferred.artist);
    let candidate = normalize_text(&input.candidate.artist);
    if preferred.is_empty() || candidate.is_empty() {
        0.0
    } else if preferred == candidate {
        20.0
    } else {
        -10.0
    }
}

fn rule_official_provider(input: &ScoreInput) -> f64 {
    if is_official(&input.candidate.provider) {
        10.0
    } else {
        0.0
    }
}

fn rule_allowlist(input: &ScoreInput) -> f64 {
    let album_norm = normalize_text(&input.candidate.album);
    match allowlist_entry_for(input.preferred) {
        Some(entry) if normalize_text(entry.album) == album_norm => ALLOWLIST_BONUS,
        _ => 0.0,
    }
}

/// Scoring rules, applied in order and summed.
pub const RULES: &[Rule] = &[
    Rule { name: "missing_album", apply: rule_missing_album },
    Rule { name: "suspicious_tokens", apply: rule_suspicious_tokens },
    Rule { name: "year_suffix", apply: rule_year_suffix },
    Rule { name: "ep_single", apply: rule_ep_single },
    Rule { name: "album_length", apply: rule_album_length },
    Rule { name: "artist_agreement", apply: rule_artist_agreement },
    Rule { name: "official_provider", apply: rule_official_provider },
    Rule { name: "allowlist", apply: rule_allowlist },
];

// ── Public API ──────────────────────────────────────────────────────────────

/// Score a single candidate against the preferred reference.
pub fn score_release(candidate: &Candidate, preferred: &Candidate, has_non_ep_alternative: bool) -> f64 {
    let input = ScoreInput {
        candidate,
        preferred,
        has_non_ep_alternative,
    };
    RULES.iter().map(|rule| (rule.apply)(&input)).sum()
}

/// If `preferred` is an allow-listed track and the candidate's album merely
/// contains the canonical album name (e.g. a reissue title wrapping it),
/// replace the album with the canonical one.
pub fn apply_allowlist_override(candidate: &Candidate, preferred: &Candidate) -> Candidate {
    if preferred.artist.trim().is_empty() || preferred.title.trim().is_empty() {
        return candidate.clone();
    }
    let Some(entry) = allowlist_entry_for(preferred) else {
        return candidate.clone();
    };

    let album_norm = normalize_text(&candidate.album);
    let canonical_norm = normalize_text(entry.album);
    if album_norm != canonical_norm && album_norm.contains(&canonical_norm) {
        info!(
            "Allowlist override: forcing album '{}' for '{}' - '{}'",
            entry.album, candidate.artist, candidate.title
        );
        let mut updated = candidate.clone();
        updated.album = entry.album.to_string();
        return updated;
    }
    candidate.clone()
}

/// Pick the best release among `candidates`.
///
/// `preferred` defaults to the first candidate. Empty candidates are
/// ignored; with nothing left the result is `(Candidate::default(), 0.0)`.
/// On equal scores the earlier candidate wins.
pub fn choose_best_release(candidates: &[Candidate], preferred: Option<&Candidate>) -> (Candidate, f64) {
    let present: Vec<&Candidate> = candidates.iter().filter(|c| !c.is_empty()).collect();
    let Some(&first) = present.first() else {
        return (Candidate::default(), 0.0);
    };

    let preferred = preferred.unwrap_or(first);
    let rewritten: Vec<Candidate> = present
        .iter()
        .map(|c| apply_allowlist_override(c, preferred))
        .collect();
    let has_non_ep = rewritten.iter().any(|c| !has_ep_or_single(&c.album));

    let mut best_index = 0;
    let mut best_score = f64::NEG_INFINITY;
    for (i, candidate) in rewritten.iter().enumerate() {
        let score = score_release(candidate, preferred, has_non_ep);
        info!("Candidate album '{}' score={:.2}", candidate.album, score);
        if score > best_score {
            best_index = i;
            best_score = score;
        }
    }

    (rewritten[best_index].clone(), best_score)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn release(album: &str) -> Candidate {
        Candidate::new("So What", "Miles Davis", album, "1959", "", "shazam")
    }

    fn apply_rule(name: &str, input: &ScoreInput) -> f64 {
        let rule = RULES.iter().find(|r| r.name == name).unwrap();
        (rule.apply)(input)
    }

    #[test]
    fn test_rule_missing_album() {
        let c = Candidate::new("t", "a", "", "", "", "other");
        let input = ScoreInput { candidate: &c, preferred: &c, has_non_ep_alternative: false };
        assert_eq!(apply_rule("missing_album", &input), -30.0);
        // Empty album: no length penalty, full short-title reward
        assert_eq!(apply_rule("album_length", &input), 4.0);
    }

    #[test]
    fn test_rule_suspicious_tokens_counts_each_token() {
        let c = release("Greatest Hits Collection");
        let input = ScoreInput { candidate: &c, preferred: &c, has_non_ep_alternative: false };
        assert_eq!(apply_rule("suspicious_tokens", &input), -120.0);
        assert_eq!(
            suspicious_tokens("BD Music Presents Kind of Blue - 1959"),
            vec!["presents", "music presents", "bd music"]
        );
    }

    #[test]
    fn test_rule_year_suffix() {
        for album in ["Kind of Blue - 1959", "Kind of Blue (1959)", "Kind of Blue -2001 ", "Kind of Blue(1999)"] {
            let c = release(album);
            let input = ScoreInput { candidate: &c, preferred: &c, has_non_ep_alternative: false };
            assert_eq!(apply_rule("year_suffix", &input), -12.0, "{}", album);
        }
        for album in ["Kind of Blue", "1959", "Kind of Blue 1959", "Kind of Blue - 1859"] {
            let c = release(album);
            let input = ScoreInput { candidate: &c, preferred: &c, has_non_ep_alternative: false };
            assert_eq!(apply_rule("year_suffix", &input), 0.0, "{}", album);
        }
    }

    #[test]
    fn test_rule_ep_single_needs_alternative() {
        let c = release("So What - Single");
        let with_alt = ScoreInput { candidate: &c, preferred: &c, has_non_ep_alternative: true };
        let without_alt = ScoreInput { candidate: &c, preferred: &c, has_non_ep_alternative: false };
        assert_eq!(apply_rule("ep_single", &with_alt), -15.0);
        assert_eq!(apply_rule("ep_single", &without_alt), 0.0);
        assert!(has_ep_or_single("Live EP"));
        assert!(!has_ep_or_single("Deeper Sleep"));
    }

    #[test]
    fn test_rule_album_length() {
        let short = release("Kind of Blue"); // 12 chars
        let input = ScoreInput { candidate: &short, preferred: &short, has_non_ep_alternative: false };
        assert!((apply_rule("album_length", &input) - (-0.6 + 2.8)).abs() < 1e-9);

        let long = release(&"x".repeat(100));
        let input = ScoreInput { candidate: &long, preferred: &long, has_non_ep_alternative: false };
        assert_eq!(apply_rule("album_length", &input), -4.0);
    }

    #[test]
    fn test_rule_artist_agreement() {
        let preferred = release("Kind of Blue");
        let same = Candidate::new("So What", "MILES DAVIS!", "", "", "", "");
        let other = Candidate::new("So What", "Miles Davis Quintet", "", "", "", "");
        let unknown = Candidate::new("So What", "", "", "", "", "");
        let score = |c: &Candidate| {
            let input = ScoreInput { candidate: c, preferred: &preferred, has_non_ep_alternative: false };
            apply_rule("artist_agreement", &input)
        };
        assert_eq!(score(&same), 20.0);
        assert_eq!(score(&other), -10.0);
        assert_eq!(score(&unknown), 0.0);
    }

    #[test]
    fn test_rule_official_provider() {
        assert!(is_official("Shazam"));
        assert!(!is_official("musicbrainz"));
        assert!(!is_official(""));
    }

    #[test]
    fn test_rule_allowlist_bonus() {
        let preferred = release("whatever");
        let canonical = release("kind of BLUE");
        let input = ScoreInput { candidate: &canonical, preferred: &preferred, has_non_ep_alternative: false };
        assert_eq!(apply_rule("allowlist", &input), 120.0);

        let other_track = Candidate::new("Blue in Green", "Miles Davis", "Kind of Blue", "", "", "shazam");
        let input = ScoreInput { candidate: &other_track, preferred: &other_track, has_non_ep_alternative: false };
        assert_eq!(apply_rule("allowlist", &input), 0.0);
    }

    #[test]
    fn test_allowlist_override_rewrites_superset_album() {
        let preferred = release("BD Music Presents Kind of Blue - 1959");
        let rewritten = apply_allowlist_override(&preferred, &preferred);
        assert_eq!(rewritten.album, "Kind of Blue");
        assert_eq!(rewritten.title, "So What");

        // Unrelated album is left alone
        let unrelated = release("Milestones");
        assert_eq!(apply_allowlist_override(&unrelated, &preferred).album, "Milestones");

        // Needs both preferred artist and title
        let no_title = Candidate::new("", "Miles Davis", "", "", "", "");
        assert_eq!(apply_allowlist_override(&preferred, &no_title), preferred);
    }

    #[test]
    fn test_suspicious_token_monotonicity() {
        let preferred = release("Kind of Blue");
        let clean = score_release(&release("Sketches"), &preferred, true);
        let one = score_release(&release("Sketches Karaoke"), &preferred, true);
        let two = score_release(&release("Sketches Karaoke Tribute"), &preferred, true);
        assert!(one < clean);
        assert!(two < one);
    }

    #[test]
    fn test_miles_davis_end_to_end() {
        let reissue = release("BD Music Presents Kind of Blue - 1959");
        let original = release("Kind of Blue");

        // Unrewritten reissue is heavily penalized
        let reissue_score = score_release(&reissue, &reissue, true);
        let original_score = score_release(&original, &reissue, true);
        assert!(original_score > reissue_score + 100.0);

        let (best, score) = choose_best_release(&[reissue.clone(), original], Some(&reissue));
        assert_eq!(best.album, "Kind of Blue");
        assert_eq!(best.artist, "Miles Davis");
        // 12 chars: -0.6 + 2.8, artist +20, provider +10, allow-list +120
        assert!((score - 152.2).abs() < 1e-9);
    }

    #[test]
    fn test_choose_best_prefers_clean_album() {
        let compilation = Candidate::new("Hey Jude", "The Beatles", "The Beatles 1967-1970 Greatest Hits", "", "", "shazam");
        let original = Candidate::new("Hey Jude", "The Beatles", "Hey Jude", "", "", "shazam");
        let (best, _) = choose_best_release(&[compilation.clone(), original.clone()], Some(&compilation));
        assert_eq!(best, original);
    }

    #[test]
    fn test_choose_best_tie_keeps_first() {
        let a = Candidate::new("Song", "Artist", "Album A", "", "", "shazam");
        let b = Candidate::new("Song", "Artist", "Album B", "", "", "shazam");
        let (best, _) = choose_best_release(&[a.clone(), b.clone()], None);
        assert_eq!(best, a);
        let (best, _) = choose_best_release(&[b.clone(), a], None);
        assert_eq!(best, b);
    }

    #[test]
    fn test_choose_best_is_deterministic() {
        let set = vec![
            release("So What Karaoke"),
            release("Milestones (1958)"),
            release("The Essential Miles Davis Collection"),
        ];
        let first = choose_best_release(&set, Some(&set[0]));
        for _ in 0..10 {
            assert_eq!(choose_best_release(&set, Some(&set[0])), first);
        }
    }

    #[test]
    fn test_choose_best_empty_set() {
        assert_eq!(choose_best_release(&[], None), (Candidate::default(), 0.0));
        assert_eq!(
            choose_best_release(&[Candidate::default()], None),
            (Candidate::default(), 0.0)
        );
    }

    #[test]
    fn test_ep_penalty_only_when_full_album_offered() {
        let ep = Candidate::new("Song", "Artist", "Song EP", "", "", "shazam");
        let album = Candidate::new("Song", "Artist", "Long Player", "", "", "shazam");
        let (best, _) = choose_best_release(&[ep.clone(), album.clone()], None);
        assert_eq!(best, album);

        // Alone, the EP is not penalized for being an EP
        let (_, alone) = choose_best_release(&[ep.clone()], None);
        assert_eq!(alone, score_release(&ep, &ep, false));
    }
}
