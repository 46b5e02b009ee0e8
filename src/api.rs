//! Remote state fetcher: wire model and HTTP client for the player-control service.

pub mod client;
pub mod model;

pub use client::{ControlError, FetchError, HttpApi, PlayerApi};
pub use model::{ControlAction, PlaybackSnapshot, SongMetadata};
