use std::time::Duration;

use clap::Parser;

use crate::player::TrackChangePolicy;
use crate::sync::Timing;
use crate::utils::RenderOptions;

/// Position display mode for track time.
#[derive(Debug, Clone, Copy, PartialEq, clap::ValueEnum)]
pub enum PositionMode {
    /// Show increasing time (elapsed)
    Increasing,
    /// Show remaining time
    Remaining,
}

/// Configuration parsed from command-line arguments.
#[derive(Debug, Parser, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Base URL of the player-control service
    #[arg(short = 'u', long = "url", default_value = "http://localhost:5000")]
    pub url: String,
    /// Local clock tick period in milliseconds
    #[arg(long = "tick-ms", default_value_t = 1000)]
    pub tick_ms: u64,
    /// Server sync period in milliseconds
    #[arg(long = "sync-ms", default_value_t = 3000)]
    pub sync_ms: u64,
    /// Staleness watchdog period in milliseconds
    #[arg(long = "watchdog-ms", default_value_t = 5000)]
    pub watchdog_ms: u64,
    /// Force a sync when the last one is older than this (milliseconds)
    #[arg(long = "stale-after-ms", default_value_t = 10_000)]
    pub stale_after_ms: u64,
    /// HTTP request timeout in milliseconds
    #[arg(long = "timeout-ms", default_value_t = 2000)]
    pub timeout_ms: u64,
    /// Status text format
    #[arg(long = "format", default_value = "{icon} {title} - {artist} {position}/{duration}")]
    pub format: String,
    /// Tooltip format
    #[arg(long = "tooltip-format", default_value = "{title}\n{artist} - {album} ({year})\n{genre}\n{bar}")]
    pub tooltip_format: String,
    /// Width of the {bar} progress bar in cells
    #[arg(long = "bar-width", default_value_t = 20)]
    pub bar_width: usize,
    /// Position style: "increasing" or "remaining"
    #[arg(long = "position-mode", value_enum, default_value_t = PositionMode::Increasing)]
    pub position_mode: PositionMode,
    /// Elapsed time used when the track changes: "restart" or "trust-server"
    #[arg(long = "track-change", value_enum, default_value_t = TrackChangePolicy::Restart)]
    pub track_change: TrackChangePolicy,
    /// Read control commands (play, pause, next, previous, ...) from stdin
    #[arg(long = "stdin-controls", default_value_t = false, action = clap::ArgAction::SetTrue)]
    pub stdin_controls: bool,
    /// Fetch and print the current state once, then exit
    #[arg(long = "once", default_value_t = false, action = clap::ArgAction::SetTrue)]
    pub once: bool,
    /// Send one control action, print the resulting state, then exit
    #[arg(long = "control", conflicts_with = "once")]
    pub control: Option<String>,
    /// Action name sent for "previous" (some backends expect "prev")
    #[arg(long = "previous-action", default_value = "previous")]
    pub previous_action: String,
    /// Disable the play/pause icon
    #[arg(long = "no-icon", default_value_t = false, action = clap::ArgAction::SetTrue)]
    pub no_icon: bool,
    /// Derived timer periods
    #[arg(skip)]
    pub timing: Timing,
}

impl Config {
    /// Parse arguments and compute derived fields.
    pub fn parse() -> Self {
        <Self as Parser>::parse().with_derived()
    }

    fn with_derived(mut self) -> Self {
        // Zero periods would make tokio intervals panic.
        let period = |ms: u64| Duration::from_millis(ms.max(1));
        self.timing = Timing {
            tick: period(self.tick_ms),
            sync: period(self.sync_ms),
            watchdog: period(self.watchdog_ms),
            stale_after: Duration::from_millis(self.stale_after_ms),
        };
        self.url = self.url.trim().to_string();
        self
    }

    pub fn render_options(&self) -> RenderOptions {
        RenderOptions {
            format: self.format.clone(),
            tooltip_format: self.tooltip_format.clone(),
            position_mode: self.position_mode,
            bar_width: self.bar_width,
            no_icon: self.no_icon,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Config {
        let mut argv = vec!["nowsync"];
        argv.extend_from_slice(args);
        Config::try_parse_from(argv).unwrap().with_derived()
    }

    #[test]
    fn defaults_match_the_polling_cadence() {
        let config = parse(&[]);
        assert_eq!(config.url, "http://localhost:5000");
        assert_eq!(config.timing.tick, Duration::from_secs(1));
        assert_eq!(config.timing.sync, Duration::from_secs(3));
        assert_eq!(config.timing.watchdog, Duration::from_secs(5));
        assert_eq!(config.timing.stale_after, Duration::from_secs(10));
        assert_eq!(config.track_change, TrackChangePolicy::Restart);
        assert!(!config.stdin_controls);
    }

    #[test]
    fn flags_override_defaults() {
        let config = parse(&[
            "--url", " http://player:8080/ ",
            "--sync-ms", "0",
            "--track-change", "trust-server",
            "--position-mode", "remaining",
            "--control", "next",
            "--previous-action", "prev",
        ]);
        assert_eq!(config.url, "http://player:8080/");
        assert_eq!(config.timing.sync, Duration::from_millis(1));
        assert_eq!(config.track_change, TrackChangePolicy::TrustServer);
        assert_eq!(config.position_mode, PositionMode::Remaining);
        assert_eq!(config.control.as_deref(), Some("next"));
        assert_eq!(config.previous_action, "prev");
    }

    #[test]
    fn once_and_control_conflict() {
        assert!(Config::try_parse_from(["nowsync", "--once", "--control", "play"]).is_err());
    }
}
