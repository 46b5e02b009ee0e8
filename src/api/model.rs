//! Wire types for the player-control service and the snapshot built from them.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer};
use tokio::time::Instant;

use crate::utils::time_to_seconds;

/// Song metadata as reported by `/api/current_song`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct SongMetadata {
    #[serde(deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(deserialize_with = "null_as_default")]
    pub artist: String,
    #[serde(deserialize_with = "null_as_default")]
    pub album: String,
    #[serde(deserialize_with = "string_or_number")]
    pub year: String,
    #[serde(deserialize_with = "null_as_default")]
    pub genre: String,
    #[serde(deserialize_with = "null_as_default")]
    pub cover: String,
    /// Track length as `MM:SS`.
    #[serde(deserialize_with = "null_as_default")]
    pub duration: String,
}

impl SongMetadata {
    /// Total length in seconds, derived from `duration`. Unparseable durations count as zero.
    pub fn total_seconds(&self) -> u32 {
        time_to_seconds(&self.duration)
    }

    /// Identity used to detect track changes between snapshots.
    pub fn same_track(&self, other: &SongMetadata) -> bool {
        self.title == other.title && self.artist == other.artist && self.album == other.album
    }
}

/// Treat an explicit `null` like a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Some backends store the year as a number, others as a string.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(serde_json::Number),
        Nothing(()),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(s) => s,
        Raw::Number(n) => n.to_string(),
        Raw::Nothing(()) => String::new(),
    })
}

/// Body of `GET /api/current_song`.
#[derive(Debug, Clone, Deserialize)]
pub struct CurrentSongResponse {
    pub song: SongMetadata,
    #[serde(default, deserialize_with = "null_as_default")]
    pub current_time: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_playing: bool,
}

/// Body of `GET /api/control/{action}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ControlResponse {
    pub status: Option<String>,
    pub error: Option<String>,
}

/// Authoritative playback state at the moment a fetch completed.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackSnapshot {
    pub song: SongMetadata,
    pub server_elapsed_seconds: f64,
    pub is_playing: bool,
    pub captured_at: Instant,
}

impl From<CurrentSongResponse> for PlaybackSnapshot {
    fn from(response: CurrentSongResponse) -> Self {
        Self {
            song: response.song,
            server_elapsed_seconds: response.current_time,
            is_playing: response.is_playing,
            captured_at: Instant::now(),
        }
    }
}

/// A transport request forwarded to the remote player.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ControlAction {
    Play,
    Pause,
    PlayPause,
    Next,
    /// Sent as `previous`. Backends that only know `prev` need
    /// `--previous-action prev`.
    Previous,
    /// Any other action name the backend understands, e.g. `prev`.
    Custom(String),
}

impl ControlAction {
    /// Path segment used in `/api/control/{action}`.
    pub fn as_path(&self) -> &str {
        match self {
            ControlAction::Play => "play",
            ControlAction::Pause => "pause",
            ControlAction::PlayPause => "play_pause",
            ControlAction::Next => "next",
            ControlAction::Previous => "previous",
            ControlAction::Custom(name) => name,
        }
    }
}

impl fmt::Display for ControlAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_path())
    }
}

#[derive(thiserror::Error, Debug, PartialEq)]
#[error("invalid control action: {0:?}")]
pub struct InvalidAction(pub String);

impl FromStr for ControlAction {
    type Err = InvalidAction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_lowercase();
        let action = match name.as_str() {
            "play" => ControlAction::Play,
            "pause" => ControlAction::Pause,
            "play_pause" | "toggle" => ControlAction::PlayPause,
            "next" => ControlAction::Next,
            "previous" => ControlAction::Previous,
            _ if !name.is_empty()
                && name
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') =>
            {
                ControlAction::Custom(name)
            }
            _ => return Err(InvalidAction(s.to_string())),
        };
        Ok(action)
    }
}
