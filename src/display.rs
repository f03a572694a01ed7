use std::io::{self, Write};
use std::path::Path;
use crossterm::{
    cursor,
    execute,
    style::{Color, Print, ResetColor, SetForegroundColor},
    terminal::{self, Clear, ClearType},
};

use crate::state::{DisplayState, Mode};

/// One line of the frame with its color.
#[derive(Debug, Clone, PartialEq)]
pub struct Line {
    pub text: String,
    pub color: Color,
}

impl Line {
    fn new(text: impl Into<String>, color: Color) -> Self {
        Line { text: text.into(), color }
    }
}

/// Shorten `text` to at most `max_chars` characters, ending in "…" when cut.
pub fn ellipsize(text: &str, max_chars: usize) -> String {
    let count = text.chars().count();
    if count <= max_chars {
        return text.to_string();
    }
    if max_chars == 0 {
        return String::new();
    }
    let mut out: String = text.chars().take(max_chars - 1).collect();
    out.push('…');
    out
}

/// Lay out the frame for a state snapshot.
///
/// * now playing: title, artist, album · year, cover file
/// * listening: a single hint line
/// * slideshow: the current slide (or a note that there are none)
///
/// The overlay label, when `show_overlay` is set, goes on the first line.
pub fn render_lines(state: &DisplayState, slide: Option<&Path>, show_overlay: bool, width: usize) -> Vec<Line> {
    let width = width.max(20);
    let mut lines = Vec::new();

    if show_overlay {
        let label = if state.listening_enabled {
            "[ Stop Listening ]"
        } else {
            "[ Start Listening ]"
        };
        lines.push(Line::new(format!("{:>width$}", label, width = width), Color::White));
    }

    match state.mode {
        Mode::NowPlaying => {
            lines.push(Line::new("", Color::Reset));
            lines.push(Line::new(ellipsize(&state.title, width), Color::White));
            lines.push(Line::new(ellipsize(&state.artist, width), Color::Grey));

            let album_line = match (state.album.is_empty(), state.year.is_empty()) {
                (false, false) => format!("{} · {}", state.album, state.year),
                (false, true) => state.album.clone(),
                (true, false) => state.year.clone(),
                (true, true) => String::new(),
            };
            lines.push(Line::new(ellipsize(&album_line, width), Color::DarkGrey));

            if !state.cover_path.is_empty() && Path::new(&state.cover_path).exists() {
                lines.push(Line::new("", Color::Reset));
                lines.push(Line::new(
                    ellipsize(&format!("♫ cover: {}", state.cover_path), width),
                    Color::DarkGrey,
                ));
            }
        }
        Mode::Listening => {
            lines.push(Line::new(format!("{:>width$}", "Listening…", width = width), Color::Grey));
        }
        Mode::Slideshow => {
            let text = match slide {
                Some(path) => format!(
                    "▣ {}",
                    path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default()
                ),
                None => "▣ (no slideshow images)".to_string(),
            };
            lines.push(Line::new(ellipsize(&text, width), Color::DarkGrey));
        }
    }

    lines
}

/// Clear the terminal and draw `lines` from the top-left corner.
pub fn draw_frame(lines: &[Line]) -> Result<(), io::Error> {
    let mut stdout = io::stdout();
    execute!(stdout, cursor::MoveTo(0, 0), Clear(ClearType::All))?;
    for line in lines {
        execute!(stdout, SetForegroundColor(line.color), Print(&line.text), ResetColor)?;
        print!("\r\n");
    }
    stdout.flush()?;
    Ok(())
}

/// Terminal width, never below 40 columns.
pub fn terminal_width() -> usize {
    let (width, _height) = terminal::size().unwrap_or((80, 24));
    (width as usize).max(40)
}
