//! Error types for anime-player.
//!
//! Failures that happen while reacting to media or backend events are contained
//! inside the controller; only caller-facing operations return these errors.

use std::error::Error;
use std::fmt;
use std::io;

/// Application error types.
#[derive(Debug)]
pub enum PlayerError {
    /// Network/HTTP errors
    Network(String),
    /// API response parsing errors
    Parse(String),
    /// Configuration errors
    Config(String),
    /// File I/O errors
    Io(io::Error),
    /// No results found
    NotFound(String),
    /// Invalid input from the caller
    InvalidInput(String),
    /// Media element failed (playback rejected, player not found)
    Player(String),
    /// Adaptive streaming backend failed to attach
    Backend(String),
    /// Preference store read/write failure
    Preferences(String),
    /// Episode index outside the loaded playlist
    EpisodeOutOfRange { index: usize, len: usize },
}

impl fmt::Display for PlayerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlayerError::Network(msg) => write!(f, "Network error: {}", msg),
            PlayerError::Parse(msg) => write!(f, "Parse error: {}", msg),
            PlayerError::Config(msg) => write!(f, "Config error: {}", msg),
            PlayerError::Io(err) => write!(f, "I/O error: {}", err),
            PlayerError::NotFound(msg) => write!(f, "Not found: {}", msg),
            PlayerError::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
            PlayerError::Player(msg) => write!(f, "Player error: {}", msg),
            PlayerError::Backend(msg) => write!(f, "Backend error: {}", msg),
            PlayerError::Preferences(msg) => write!(f, "Preferences error: {}", msg),
            PlayerError::EpisodeOutOfRange { index, len } => write!(
                f,
                "Episode index {} out of range (playlist has {} episodes)",
                index, len
            ),
        }
    }
}

impl Error for PlayerError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            PlayerError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for PlayerError {
    fn from(err: io::Error) -> Self {
        PlayerError::Io(err)
    }
}

impl From<reqwest::Error> for PlayerError {
    fn from(err: reqwest::Error) -> Self {
        PlayerError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for PlayerError {
    fn from(err: serde_json::Error) -> Self {
        PlayerError::Parse(err.to_string())
    }
}

impl From<toml::de::Error> for PlayerError {
    fn from(err: toml::de::Error) -> Self {
        PlayerError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for PlayerError {
    fn from(err: toml::ser::Error) -> Self {
        PlayerError::Config(err.to_string())
    }
}

/// Result type alias using PlayerError.
pub type Result<T> = std::result::Result<T, PlayerError>;
