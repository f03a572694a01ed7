use coverframe::{
    display, new_shared_state, snapshot, toggle_listening, CanonicalCache, Clock, Config,
    HttpArtworkFetcher, Mode, RecognizerCore, RecognizerWorker, Settings, Slideshow,
    SongrecRecognizer, SystemClock,
};
use log::{error, info, warn};
use std::env;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Duration;
use crossterm::{
    event::{poll, read, Event, KeyCode, KeyEvent},
    terminal::{disable_raw_mode, enable_raw_mode},
};

/// Seconds the listening toggle label stays up after a key press.
const OVERLAY_SECS: f64 = 5.0;
/// Seconds between slideshow directory rescans.
const SLIDESHOW_RESCAN_SECS: f64 = 15.0;

fn print_usage() {
    println!("Now-playing kiosk: recognizes the music in the room and shows the album");
    println!();
    println!("Usage: coverframe [OPTIONS]");
    println!();
    println!("Options:");
    println!("  --show-defaults              Show default configuration values and exit");
    println!("  --show-saved-defaults        Show saved default configuration from file and exit");
    println!("  --save-defaults              Save current command-line options as defaults");
    println!("  --device <DEVICE>            ALSA capture device for arecord (default: default)");
    println!("  --rate <RATE>                Capture sample rate (default: 44100)");
    println!("  --record-seconds <SEC>       Length of each recorded snippet (default: 5)");
    println!("  --poll-interval <SEC>        Seconds between recognition attempts (default: 7)");
    println!("  --network-timeout <SEC>      Timeout for recognition and artwork (default: 6)");
    println!("  --idle-to-slideshow <SEC>    No-match time before leaving the listening screen (default: 12)");
    println!("  --stale-track <SEC>          No-match time before leaving a track (default: 90)");
    println!("  --upgrade-window <SEC>       Window for better releases of the same track (default: 30)");
    println!("  --cache-ttl <SEC>            Canonical release cache TTL (default: 1209600)");
    println!("  --cache-dir <DIR>            Cache directory (default: ~/.cache/coverframe)");
    println!("  --slideshow-dir <DIR>        Slideshow images (default: ~/.local/share/coverframe/slideshow)");
    println!("  --slide-interval <SEC>       Seconds per slide (default: 60)");
    println!("  --fps <FPS>                  Screen refresh rate (default: 10)");
    println!("  --alt-lookup                 Enable alternate metadata lookup");
    println!("  --no-alt-lookup              Disable alternate metadata lookup");
    println!("  --verbose, -v                Log debug output");
    println!("  --help, -h                   Show this help message");
    println!();
    println!("Keys:");
    println!("  l, space                     Start/stop listening");
    println!("  q, Esc                       Quit");
    println!();
    println!("Configuration:");
    println!("  Defaults can be saved to ~/.state/coverframe/defaults.toml using --save-defaults.");
    println!("  Saved defaults override built-in defaults, and command-line options override both.");
}

fn parse_value<T: std::str::FromStr>(args: &[String], i: usize, flag: &str) -> T {
    match args.get(i + 1).map(|v| v.parse::<T>()) {
        Some(Ok(value)) => value,
        Some(Err(_)) => {
            eprintln!("Error: invalid value for {}: {}", flag, args[i + 1]);
            process::exit(1);
        }
        None => {
            eprintln!("Error: {} requires an argument", flag);
            process::exit(1);
        }
    }
}

fn init_logging(verbose: bool) {
    let mut clog = colog::default_builder();
    clog.filter(
        None,
        if verbose { log::LevelFilter::Debug } else { log::LevelFilter::Warn },
    );
    clog.init();

    std::panic::set_hook(Box::new(|panic_info| {
        let current_thread = std::thread::current();
        let thread_name = current_thread.name().unwrap_or("unnamed");
        log::error!("panic in thread '{}': {}", thread_name, panic_info);
    }));
}

fn main() {
    let args: Vec<String> = env::args().collect();

    let saved_config = Config::load().unwrap_or_else(|e| {
        eprintln!("Warning: could not load saved defaults: {}", e);
        Config::new()
    });

    let mut cmdline_config = Config::new();
    let mut save_defaults = false;
    let mut verbose = false;

    let mut i = 1;
    while i < args.len() {
        let flag = args[i].as_str();
        match flag {
            "--show-defaults" => {
                Config::builtin_defaults().print("Built-in default settings");
                process::exit(0);
            }
            "--show-saved-defaults" => {
                match Config::get_config_path() {
                    Ok(config_path) if config_path.exists() => {
                        println!("Saved defaults from {:?}:", config_path);
                        println!();
                        saved_config.print("Configuration");
                    }
                    Ok(config_path) => {
                        println!("No saved defaults file found at {:?}", config_path);
                        println!("Use --save-defaults to create one.");
                    }
                    Err(e) => println!("Could not determine config file path: {}", e),
                }
                process::exit(0);
            }
            "--save-defaults" => save_defaults = true,
            "--device" => {
                cmdline_config.device = Some(parse_value(&args, i, flag));
                i += 1;
            }
            "--rate" => {
                cmdline_config.rate = Some(parse_value(&args, i, flag));
                i += 1;
            }
            "--record-seconds" => {
                cmdline_config.record_seconds = Some(parse_value(&args, i, flag));
                i += 1;
            }
            "--poll-interval" => {
                cmdline_config.poll_interval = Some(parse_value(&args, i, flag));
                i += 1;
            }
            "--network-timeout" => {
                cmdline_config.network_timeout = Some(parse_value(&args, i, flag));
                i += 1;
            }
            "--idle-to-slideshow" => {
                cmdline_config.idle_to_slideshow = Some(parse_value(&args, i, flag));
                i += 1;
            }
            "--stale-track" => {
                cmdline_config.stale_track_to_slideshow = Some(parse_value(&args, i, flag));
                i += 1;
            }
            "--upgrade-window" => {
                cmdline_config.upgrade_window = Some(parse_value(&args, i, flag));
                i += 1;
            }
            "--cache-ttl" => {
                cmdline_config.cache_ttl = Some(parse_value(&args, i, flag));
                i += 1;
            }
            "--cache-dir" => {
                cmdline_config.cache_dir = Some(parse_value(&args, i, flag));
                i += 1;
            }
            "--slideshow-dir" => {
                cmdline_config.slideshow_dir = Some(parse_value(&args, i, flag));
                i += 1;
            }
            "--slide-interval" => {
                cmdline_config.slideshow_interval = Some(parse_value(&args, i, flag));
                i += 1;
            }
            "--fps" => {
                cmdline_config.fps = Some(parse_value(&args, i, flag));
                i += 1;
            }
            "--alt-lookup" => cmdline_config.alt_metadata_lookup = Some(true),
            "--no-alt-lookup" => cmdline_config.alt_metadata_lookup = Some(false),
            "--verbose" | "-v" => verbose = true,
            "--help" | "-h" => {
                print_usage();
                process::exit(0);
            }
            other => {
                eprintln!("Error: unknown option {}", other);
                println!();
                print_usage();
                process::exit(1);
            }
        }
        i += 1;
    }

    if save_defaults {
        let mut to_save = saved_config.clone();
        to_save.merge(&cmdline_config);
        match to_save.save() {
            Ok(()) => {
                if let Ok(path) = Config::get_config_path() {
                    println!("Saved defaults to {:?}", path);
                }
            }
            Err(e) => {
                eprintln!("Error: failed to save defaults: {}", e);
                process::exit(1);
            }
        }
    }

    let mut effective_config = saved_config;
    effective_config.merge(&cmdline_config);
    let settings = Settings::from_config(&effective_config);

    init_logging(verbose);

    if let Err(e) = run(settings) {
        disable_raw_mode().ok();
        error!("{}", e);
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run(settings: Settings) -> Result<(), Box<dyn std::error::Error>> {
    std::fs::create_dir_all(&settings.cache_dir)?;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let cover_path = settings.cover_path();
    let state = new_shared_state(&cover_path.to_string_lossy());
    let cache = CanonicalCache::open(settings.cache_path(), settings.cache_ttl, Arc::clone(&clock));
    info!("Canonical cache at {} ({} entries)", cache.path().display(), cache.len());

    let core = RecognizerCore::new(
        Arc::clone(&state),
        Box::new(SongrecRecognizer::new(settings.songrec_settings())),
        Box::new(HttpArtworkFetcher::new(settings.network_timeout_duration())),
        Some(cache),
        settings.recognizer_settings(),
        Arc::clone(&clock),
    );
    let worker = RecognizerWorker::spawn(core)?;

    let mut slideshow = Slideshow::new(settings.slideshow_dir.clone(), settings.slideshow_interval);
    slideshow.refresh();
    if slideshow.image_count() == 0 {
        warn!("No slideshow images in {}", settings.slideshow_dir.display());
    }

    let frame = Duration::from_secs_f64(1.0 / settings.fps as f64);
    let mut rng = rand::thread_rng();
    let mut last_rescan = clock.now();
    let mut overlay_until = 0.0;
    let mut drawn: Option<(f64, Option<PathBuf>, bool, usize)> = None;

    enable_raw_mode().ok();

    loop {
        let now = clock.now();

        if poll(frame)? {
            if let Event::Key(KeyEvent { code, .. }) = read()? {
                match code {
                    KeyCode::Esc | KeyCode::Char('q') | KeyCode::Char('Q') => break,
                    KeyCode::Char('l') | KeyCode::Char('L') | KeyCode::Char(' ') => {
                        let enabled = toggle_listening(&state, now);
                        info!("Listening {}", if enabled { "enabled" } else { "disabled" });
                        overlay_until = now + OVERLAY_SECS;
                    }
                    _ => overlay_until = now + OVERLAY_SECS,
                }
            }
        }

        if now - last_rescan >= SLIDESHOW_RESCAN_SECS {
            slideshow.refresh();
            last_rescan = now;
        }

        let current = snapshot(&state);
        if current.mode == Mode::Slideshow {
            slideshow.tick(now, &mut rng);
        }

        let slide = slideshow.current().map(|p| p.to_path_buf());
        let show_overlay = now < overlay_until;
        let width = display::terminal_width();
        let key = (current.last_update_ts, slide.clone(), show_overlay, width);
        if drawn.as_ref() != Some(&key) {
            let lines = display::render_lines(&current, slide.as_deref(), show_overlay, width);
            display::draw_frame(&lines)?;
            drawn = Some(key);
        }
    }

    disable_raw_mode().ok();
    println!();
    info!("Stopping recognizer");
    worker.join()?;
    Ok(())
}
