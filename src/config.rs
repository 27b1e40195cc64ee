//! Configuration file support for anime-player.
//!
//! This module provides functionality for loading and saving user settings
//! from a TOML configuration file.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::Result;
use crate::player::ControllerOptions;
use crate::types::QualitySelection;

/// User configuration settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the REST API serving episode lists
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Quality used until the user picks one: "auto" or a height like "720"
    #[serde(default = "default_quality")]
    pub quality: String,

    /// Seconds an episode list stays cached
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,

    /// Start playing as soon as a selected episode is ready
    #[serde(default = "default_autoplay_on_select")]
    pub autoplay_on_select: bool,

    /// Video player command (defaults to mpv)
    #[serde(default)]
    pub player: Option<String>,

    /// Additional arguments to pass to the video player
    #[serde(default)]
    pub player_args: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

fn default_api_url() -> String {
    "http://localhost:5000/api".to_string()
}

fn default_quality() -> String {
    "auto".to_string()
}

fn default_cache_ttl_secs() -> u64 {
    300
}

fn default_autoplay_on_select() -> bool {
    true
}

impl Config {
    /// Create a new config with default values.
    pub fn new() -> Self {
        Self {
            api_url: default_api_url(),
            quality: default_quality(),
            cache_ttl_secs: default_cache_ttl_secs(),
            autoplay_on_select: default_autoplay_on_select(),
            player: None,
            player_args: Vec::new(),
        }
    }

    /// Get the path to the config file.
    ///
    /// Returns ~/.config/anime-player/config.toml on Linux,
    /// or a platform-appropriate location on other systems.
    pub fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| {
                io::Error::new(io::ErrorKind::NotFound, "Could not find config directory")
            })?
            .join("anime-player");

        Ok(config_dir.join("config.toml"))
    }

    /// Load config from disk.
    ///
    /// Returns default config if the file doesn't exist.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::get_config_path()?)
    }

    /// Load config from `path`, or defaults if it doesn't exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }

        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save config to disk.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::get_config_path()?)
    }

    /// Save config to `path`.
    ///
    /// Creates the parent directory if it doesn't exist.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Create parent directories if they don't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Create a default config file if one doesn't exist.
    ///
    /// Returns the path to the config file.
    pub fn create_default_if_missing() -> Result<PathBuf> {
        let path = Self::get_config_path()?;
        Self::create_default_at(&path)?;
        Ok(path)
    }

    /// Write a default config to `path` unless a file is already there.
    /// Returns whether one was written.
    fn create_default_at(path: &Path) -> Result<bool> {
        if path.exists() {
            return Ok(false);
        }
        Self::new().save_to(path)?;
        Ok(true)
    }

    /// The configured default quality. Unrecognized values mean auto.
    pub fn default_quality(&self) -> QualitySelection {
        self.quality.parse().unwrap_or_default()
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn controller_options(&self) -> ControllerOptions {
        ControllerOptions {
            default_quality: self.default_quality(),
            autoplay_on_select: self.autoplay_on_select,
        }
    }
}
