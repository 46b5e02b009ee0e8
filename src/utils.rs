use std::io::{self, Write};

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

use crate::config::PositionMode;
use crate::player::NowPlaying;
use crate::sync::StatusSink;

const PLAY_ICON: &str = "\u{f04b}";
const PAUSE_ICON: &str = "\u{f04c}";
const BAR_FILLED: char = '━';
const BAR_EMPTY: char = '─';

static DURATION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:(\d{1,4}):([0-5]\d):([0-5]\d)|(\d{1,6}):([0-5]?\d))$").unwrap()
});

/// Parses `M:SS`, `MM:SS` or `H:MM:SS` into seconds. Anything else is zero.
pub fn time_to_seconds(text: &str) -> u32 {
    let Some(caps) = DURATION_RE.captures(text.trim()) else {
        return 0;
    };
    let field = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<u32>().ok());
    match (field(1), field(2), field(3)) {
        (Some(h), Some(m), Some(s)) => h * 3600 + m * 60 + s,
        _ => match (field(4), field(5)) {
            (Some(m), Some(s)) => m * 60 + s,
            _ => 0,
        },
    }
}

/// Formats seconds as `M:SS`. Negative or non-finite input shows as `0:00`.
pub fn format_time(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds.floor() as u64
    } else {
        0
    };
    format!("{}:{:02}", total / 60, total % 60)
}

/// Text progress bar `width` cells wide.
pub fn progress_bar(fraction: f64, width: usize) -> String {
    let filled = ((fraction.clamp(0.0, 1.0) * width as f64).round() as usize).min(width);
    let mut bar = String::with_capacity(width * 3);
    bar.extend(std::iter::repeat_n(BAR_FILLED, filled));
    bar.extend(std::iter::repeat_n(BAR_EMPTY, width - filled));
    bar
}

/// Options that shape the status line.
#[derive(Debug, Clone)]
pub struct RenderOptions {
    pub format: String,
    pub tooltip_format: String,
    pub position_mode: PositionMode,
    pub bar_width: usize,
    pub no_icon: bool,
}

fn toggle_icon(playing: bool) -> &'static str {
    if playing { PAUSE_ICON } else { PLAY_ICON }
}

/// Fill a user format string with song and progress placeholders.
pub fn format_metadata(format: &str, view: &NowPlaying<'_>, options: &RenderOptions) -> String {
    let song = view.song;
    let estimate = view.estimate;
    let position = match options.position_mode {
        PositionMode::Increasing => format_time(estimate.elapsed_seconds),
        PositionMode::Remaining => {
            format!("-{}", format_time(estimate.total_seconds - estimate.elapsed_seconds))
        }
    };
    let icon = if options.no_icon {
        ""
    } else {
        toggle_icon(estimate.is_playing)
    };
    format
        .replace("{title}", song.title.trim())
        .replace("{artist}", song.artist.trim())
        .replace("{album}", song.album.trim())
        .replace("{year}", song.year.trim())
        .replace("{genre}", song.genre.trim())
        .replace("{cover}", song.cover.trim())
        .replace("{duration}", song.duration.trim())
        .replace("{elapsed}", &format_time(estimate.elapsed_seconds))
        .replace("{position}", &position)
        .replace("{percent}", &percentage(estimate.progress_fraction).to_string())
        .replace("{bar}", &progress_bar(estimate.progress_fraction, options.bar_width))
        .replace("{icon}", icon)
        .trim()
        .to_string()
}

fn percentage(fraction: f64) -> u8 {
    (fraction.clamp(0.0, 1.0) * 100.0).round() as u8
}

/// Build the JSON status line for the current view.
pub fn render_status(view: Option<&NowPlaying<'_>>, options: &RenderOptions) -> String {
    let Some(view) = view else {
        return serde_json::json!({
            "text": "",
            "alt": "stopped",
            "class": "stopped",
            "tooltip": "",
            "percentage": 0,
        })
        .to_string();
    };

    let class = if view.estimate.is_playing { "playing" } else { "paused" };
    serde_json::json!({
        "text": format_metadata(&options.format, view, options),
        "alt": class,
        "class": class,
        "tooltip": format_metadata(&options.tooltip_format, view, options),
        "percentage": percentage(view.estimate.progress_fraction),
    })
    .to_string()
}

/// Writes status lines, skipping a line identical to the previous one.
pub struct StatusPrinter<W: Write = io::Stdout> {
    options: RenderOptions,
    out: W,
    last_output: String,
}

impl StatusPrinter {
    pub fn stdout(options: RenderOptions) -> Self {
        Self::new(options, io::stdout())
    }
}

impl<W: Write> StatusPrinter<W> {
    pub fn new(options: RenderOptions, out: W) -> Self {
        Self {
            options,
            out,
            last_output: String::new(),
        }
    }

    fn emit(&mut self, line: String) -> io::Result<()> {
        if line == self.last_output {
            return Ok(());
        }
        writeln!(self.out, "{line}")?;
        self.out.flush()?;
        self.last_output = line;
        Ok(())
    }
}

impl<W: Write> StatusSink for StatusPrinter<W> {
    fn render(&mut self, view: Option<NowPlaying<'_>>) {
        let line = render_status(view.as_ref(), &self.options);
        if let Err(err) = self.emit(line) {
            warn!(%err, "failed to write status line");
        }
    }
}
