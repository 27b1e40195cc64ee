//! Episode playback controller for an anime streaming client.
//!
//! anime-player coordinates a media element and an adaptive-bitrate streaming
//! backend across a playlist of episodes: quality selection, transport
//! controls, progress tracking, and advancing to the next episode when one
//! finishes.
//!
//! # Features
//!
//! - Playback state machine with generation-tagged backend attachments
//! - Automatic and pinned quality levels
//! - Persisted autoplay, quality and last-episode preferences
//! - Cached REST episode-list fetching
//! - Playback through an external player (mpv) from the command line
//!
//! # Usage
//!
//! ```bash
//! # List the episodes of an anime
//! cargo run -- list 42
//!
//! # Play from the third episode at 720p
//! cargo run -- -q 720 play 42 -e 2
//! ```

pub mod api;
pub mod backend;
pub mod cache;
pub mod config;
pub mod error;
pub mod events;
pub mod external;
pub mod player;
pub mod preferences;
pub mod types;

pub use error::{PlayerError, Result};
pub use player::{ControllerOptions, PlaybackController, PlaybackState, TransportState};
