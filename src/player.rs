// Local playback clock: advances between server syncs and snaps back to server truth.

use tokio::time::Instant;
use tracing::{debug, info};

use crate::api::{PlaybackSnapshot, SongMetadata};

/// What to do with the server's elapsed time when a new track shows up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum TrackChangePolicy {
    /// Start the new track at 0:00 whatever the server says.
    #[default]
    Restart,
    /// Take the server's elapsed time for the new track as-is.
    TrustServer,
}

/// Read-only view of the estimate at one instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Estimate {
    pub elapsed_seconds: f64,
    pub total_seconds: f64,
    pub progress_fraction: f64,
    pub is_playing: bool,
}

/// The held song plus its estimate, handed to renderers.
#[derive(Debug, Clone, Copy)]
pub struct NowPlaying<'a> {
    pub song: &'a SongMetadata,
    pub estimate: Estimate,
}

#[derive(Debug)]
pub struct Estimator {
    last_snapshot: Option<PlaybackSnapshot>,
    elapsed: f64,
    playing: bool,
    last_sync: Instant,
    policy: TrackChangePolicy,
}

impl Estimator {
    pub fn new(policy: TrackChangePolicy) -> Self {
        Self {
            last_snapshot: None,
            elapsed: 0.0,
            playing: false,
            last_sync: Instant::now(),
            policy,
        }
    }

    /// Replace local state with a fresh server snapshot.
    pub fn apply_snapshot(&mut self, snapshot: PlaybackSnapshot) {
        let track_changed = self
            .last_snapshot
            .as_ref()
            .is_some_and(|held| !held.song.same_track(&snapshot.song));

        let total = f64::from(snapshot.song.total_seconds());
        let elapsed = if track_changed && self.policy == TrackChangePolicy::Restart {
            0.0
        } else {
            snapshot.server_elapsed_seconds
        };

        if track_changed {
            info!(title = %snapshot.song.title, artist = %snapshot.song.artist, "track changed");
        }
        debug!(
            elapsed,
            server_elapsed = snapshot.server_elapsed_seconds,
            playing = snapshot.is_playing,
            age_ms = snapshot.captured_at.elapsed().as_millis() as u64,
            "applied snapshot"
        );

        self.elapsed = clamp_elapsed(elapsed, total);
        self.playing = snapshot.is_playing;
        self.last_snapshot = Some(snapshot);
        self.last_sync = Instant::now();
    }

    /// Advance the local clock by one second while playing.
    pub fn tick(&mut self) {
        if !self.playing {
            return;
        }
        let Some(snapshot) = &self.last_snapshot else {
            return;
        };
        let total = f64::from(snapshot.song.total_seconds());
        self.elapsed = clamp_elapsed(self.elapsed + 1.0, total);
        if self.elapsed >= total {
            // Local inference only; the server is not told.
            self.playing = false;
            debug!("reached end of track locally");
        }
    }

    pub fn current_estimate(&self) -> Estimate {
        let total_seconds = self
            .last_snapshot
            .as_ref()
            .map_or(0.0, |s| f64::from(s.song.total_seconds()));
        Estimate {
            elapsed_seconds: self.elapsed,
            total_seconds,
            progress_fraction: progress_fraction(self.elapsed, total_seconds),
            is_playing: self.playing,
        }
    }

    pub fn now_playing(&self) -> Option<NowPlaying<'_>> {
        self.last_snapshot.as_ref().map(|snapshot| NowPlaying {
            song: &snapshot.song,
            estimate: self.current_estimate(),
        })
    }

    pub fn seconds_since_last_sync(&self) -> f64 {
        self.last_sync.elapsed().as_secs_f64()
    }
}

fn clamp_elapsed(elapsed: f64, total: f64) -> f64 {
    if elapsed.is_finite() {
        elapsed.clamp(0.0, total.max(0.0))
    } else {
        0.0
    }
}

/// `elapsed / total` capped to `[0, 1]`; zero when the total is unknown.
pub fn progress_fraction(elapsed: f64, total: f64) -> f64 {
    if total > 0.0 && elapsed.is_finite() {
        (elapsed / total).clamp(0.0, 1.0)
    } else {
        0.0
    }
}
