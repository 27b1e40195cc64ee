//! Persisted user preferences for anime-player.
//!
//! Preferences are a flat string key/value map: the autoplay flag, the last
//! selected quality, and the last episode played. The controller reads them
//! once at construction and writes on every change.

use log::debug;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::{PlayerError, Result};

/// "true"/"false": advance to the next episode on end of stream.
pub const AUTO_PLAY_NEXT_KEY: &str = "autoPlayNext";
/// "auto" or a height such as "720p".
pub const SELECTED_QUALITY_KEY: &str = "selectedQuality";
/// Identifier of the last episode that was loaded.
pub const LAST_EPISODE_KEY: &str = "lastEpisodeId";

/// A key/value preference store.
pub trait PreferenceStore {
    fn get(&self, key: &str) -> Option<String>;

    fn set(&mut self, key: &str, value: &str) -> Result<()>;

    /// Read a "true"/"false" flag, falling back to `default` when missing or
    /// unparseable.
    fn get_bool(&self, key: &str, default: bool) -> bool {
        match self.get(key).as_deref() {
            Some("true") => true,
            Some("false") => false,
            _ => default,
        }
    }
}

/// Preferences held in memory only.
#[derive(Debug, Clone, Default)]
pub struct MemoryPreferences {
    values: HashMap<String, String>,
}

impl MemoryPreferences {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PreferenceStore for MemoryPreferences {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Preferences persisted as a JSON object on disk.
///
/// Every `set` rewrites the whole file; the last writer wins.
#[derive(Debug, Clone)]
pub struct FilePreferences {
    path: PathBuf,
    values: HashMap<String, String>,
}

impl FilePreferences {
    /// Get the default preferences path.
    ///
    /// Returns ~/.local/share/anime-player/preferences.json on Linux,
    /// or a platform-appropriate location on other systems.
    pub fn default_path() -> Result<PathBuf> {
        let data_dir = dirs::data_local_dir()
            .ok_or_else(|| {
                io::Error::new(io::ErrorKind::NotFound, "Could not find data directory")
            })?
            .join("anime-player");

        Ok(data_dir.join("preferences.json"))
    }

    /// Load preferences from the default location.
    pub fn load() -> Result<Self> {
        Self::open(Self::default_path()?)
    }

    /// Load preferences from `path`.
    ///
    /// A missing file yields an empty store; the file is created on first write.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        if !path.exists() {
            debug!("No preferences at {}, starting empty", path.display());
            return Ok(Self {
                path,
                values: HashMap::new(),
            });
        }

        let content = fs::read_to_string(&path)?;
        let values: HashMap<String, String> = serde_json::from_str(&content)
            .map_err(|e| PlayerError::Preferences(format!("{}: {}", path.display(), e)))?;
        Ok(Self { path, values })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn save(&self) -> Result<()> {
        // Create parent directories if they don't exist
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(&self.values)?;
        fs::write(&self.path, content)?;
        Ok(())
    }
}

impl PreferenceStore for FilePreferences {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.values.insert(key.to_string(), value.to_string());
        self.save()
    }
}
