use coverframe::{
    choose_best_release, resolve_canonical_release, suspicious_tokens, Candidate, CanonicalCache,
    SystemClock, DEFAULT_TTL_SECS,
};
use std::env;
use std::fs;
use std::process;
use std::sync::Arc;

fn print_usage() {
    println!("Choose Release - Pick the canonical album for a track from candidate releases");
    println!();
    println!("Usage: choose_release <CANDIDATES_JSON> [OPTIONS]");
    println!();
    println!("Arguments:");
    println!("  CANDIDATES_JSON          JSON array of candidates, each with title, artist,");
    println!("                           album, year, cover_url and provider");
    println!();
    println!("Options:");
    println!("  --preferred <N>          Index of the preferred (primary) candidate (default: 0)");
    println!("  --cache <FILE>           Resolve through a canonical release cache file");
    println!("  --help, -h               Show this help message");
    println!();
    println!("Examples:");
    println!("  choose_release so_what.json");
    println!("  choose_release so_what.json --preferred 2");
    println!("  choose_release so_what.json --cache ~/.cache/coverframe/canonical_release_cache.json");
}

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        eprintln!("Error: No candidates file specified");
        println!();
        print_usage();
        process::exit(1);
    }

    let mut input_file = String::new();
    let mut preferred_index = 0usize;
    let mut cache_file: Option<String> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_usage();
                process::exit(0);
            }
            "--preferred" => {
                if i + 1 < args.len() {
                    preferred_index = match args[i + 1].parse() {
                        Ok(n) => n,
                        Err(_) => {
                            eprintln!("Error: Invalid index for --preferred: {}", args[i + 1]);
                            process::exit(1);
                        }
                    };
                    i += 1;
                } else {
                    eprintln!("Error: --preferred requires an argument");
                    process::exit(1);
                }
            }
            "--cache" => {
                if i + 1 < args.len() {
                    cache_file = Some(args[i + 1].clone());
                    i += 1;
                } else {
                    eprintln!("Error: --cache requires an argument");
                    process::exit(1);
                }
            }
            arg if !arg.starts_with('-') => {
                if input_file.is_empty() {
                    input_file = arg.to_string();
                } else {
                    eprintln!("Error: Multiple input files specified");
                    process::exit(1);
                }
            }
            _ => {
                eprintln!("Error: Unknown option: {}", args[i]);
                print_usage();
                process::exit(1);
            }
        }
        i += 1;
    }

    if input_file.is_empty() {
        eprintln!("Error: No candidates file specified");
        process::exit(1);
    }

    let candidates = match load_candidates(&input_file) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: Failed to read {}: {}", input_file, e);
            process::exit(1);
        }
    };

    if candidates.is_empty() {
        println!("No candidates in {}", input_file);
        process::exit(0);
    }

    if preferred_index >= candidates.len() {
        eprintln!(
            "Error: --preferred {} is out of range ({} candidates)",
            preferred_index,
            candidates.len()
        );
        process::exit(1);
    }

    println!("Candidates:");
    for (n, candidate) in candidates.iter().enumerate() {
        let marker = if n == preferred_index { "*" } else { " " };
        let tokens = suspicious_tokens(&candidate.album);
        if tokens.is_empty() {
            println!("  {} [{}] {} ({})", marker, n, candidate, candidate.provider);
        } else {
            println!(
                "  {} [{}] {} ({}) suspicious: {}",
                marker,
                n,
                candidate,
                candidate.provider,
                tokens.join(", ")
            );
        }
    }
    println!();

    let primary = &candidates[preferred_index];
    let alternates: Vec<Candidate> = candidates
        .iter()
        .enumerate()
        .filter(|(n, _)| *n != preferred_index)
        .map(|(_, c)| c.clone())
        .collect();

    let (best, score) = match &cache_file {
        Some(path) => {
            let mut cache = CanonicalCache::open(path, DEFAULT_TTL_SECS, Arc::new(SystemClock));
            resolve_canonical_release(primary, &alternates, Some(&mut cache))
        }
        None => {
            let mut all = vec![primary.clone()];
            all.extend(alternates);
            choose_best_release(&all, Some(primary))
        }
    };

    println!("Best release:");
    println!("  Title:    {}", best.title);
    println!("  Artist:   {}", best.artist);
    println!("  Album:    {}", if best.album.is_empty() { "(none)" } else { &best.album });
    println!("  Year:     {}", if best.year.is_empty() { "(unknown)" } else { &best.year });
    println!("  Provider: {}", best.provider);
    println!("  Score:    {:.2}", score);
}

fn load_candidates(path: &str) -> Result<Vec<Candidate>, Box<dyn std::error::Error>> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}
