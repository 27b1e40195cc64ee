//! Type definitions for the anime-player application.
//!
//! This module contains the core data structures shared by the API client and
//! the playback controller: episodes, their stream sources, and quality tiers.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::PlayerError;

static HLS_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\.m3u8(?:[?#].*)?$").expect("HLS pattern is valid")
});

/// Check whether a URL points at a segmented (HLS) stream manifest.
///
/// # Examples
///
/// ```
/// use anime_player::types::is_hls_url;
///
/// assert!(is_hls_url("https://cdn.example.com/ep1/master.m3u8"));
/// assert!(is_hls_url("https://cdn.example.com/ep1/index.M3U8?token=abc"));
/// assert!(!is_hls_url("https://cdn.example.com/ep1.mp4"));
/// ```
pub fn is_hls_url(url: &str) -> bool {
    HLS_URL.is_match(url)
}

/// A streaming source for an episode.
#[derive(Clone, Debug, PartialEq)]
pub struct StreamSource {
    /// Vertical resolution (e.g., 1080, 720, 480). 0 indicates unknown quality,
    /// typically a master manifest whose levels the backend discovers.
    pub quality: u32,

    /// URL to the video stream or manifest.
    pub url: String,
}

impl StreamSource {
    /// Format the stream source for display in selection menus.
    ///
    /// # Examples
    ///
    /// ```
    /// use anime_player::types::StreamSource;
    ///
    /// let source = StreamSource {
    ///     quality: 1080,
    ///     url: "https://example.com/1080.m3u8".to_string(),
    /// };
    /// assert_eq!(source.to_display(), "1080p");
    ///
    /// let master = StreamSource {
    ///     quality: 0,
    ///     url: "https://example.com/master.m3u8".to_string(),
    /// };
    /// assert_eq!(master.to_display(), "Adaptive");
    /// ```
    pub fn to_display(&self) -> String {
        if self.quality == 0 {
            "Adaptive".to_string()
        } else {
            format!("{}p", self.quality)
        }
    }

    /// Whether this source must go through the adaptive streaming backend.
    pub fn is_hls(&self) -> bool {
        is_hls_url(&self.url)
    }
}

/// One playable unit of a playlist.
///
/// Episodes are immutable once fetched; the controller replaces its whole list
/// when a new playlist loads.
#[derive(Clone, Debug, PartialEq)]
pub struct Episode {
    /// Unique identifier for the episode.
    pub id: String,

    /// Human-readable title.
    pub title: String,

    /// Episode number, when the API provides one.
    pub number: Option<i64>,

    /// Sources sorted by descending quality.
    pub sources: Vec<StreamSource>,
}

impl Episode {
    /// Format the episode for display in the playlist.
    ///
    /// # Examples
    ///
    /// ```
    /// use anime_player::types::Episode;
    ///
    /// let ep = Episode {
    ///     id: "ep1".to_string(),
    ///     title: "The Beginning".to_string(),
    ///     number: Some(1),
    ///     sources: Vec::new(),
    /// };
    /// assert_eq!(ep.to_display(), "Ep 1 - The Beginning");
    /// ```
    pub fn to_display(&self) -> String {
        match self.number {
            Some(n) => format!("Ep {} - {}", n, self.title),
            None => self.title.clone(),
        }
    }

    /// Comma-separated list of the qualities this episode offers.
    pub fn qualities_display(&self) -> String {
        self.sources
            .iter()
            .map(StreamSource::to_display)
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Resolve the source to load for a quality selection.
    ///
    /// A fixed tier matches exactly, falling back to an adaptive master
    /// manifest that may contain that tier as a level. Auto prefers the master
    /// manifest, then the highest known quality. Returns `None` when nothing
    /// playable exists for the selection.
    pub fn source_for(&self, selection: &QualitySelection) -> Option<&StreamSource> {
        match selection {
            QualitySelection::Fixed(height) => self
                .sources
                .iter()
                .find(|s| s.quality == *height)
                .or_else(|| self.master_source()),
            QualitySelection::Auto { .. } => self.master_source().or_else(|| {
                self.sources
                    .iter()
                    .filter(|s| s.quality > 0)
                    .max_by_key(|s| s.quality)
            }),
        }
    }

    fn master_source(&self) -> Option<&StreamSource> {
        self.sources.iter().find(|s| s.quality == 0)
    }
}

/// A quality level reported by the adaptive streaming backend.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QualityLevel {
    /// Backend-assigned level index.
    pub index: usize,
    /// Vertical resolution in pixels.
    pub height: u32,
    /// Advertised bitrate in bits per second.
    pub bitrate: u64,
}

/// The user's quality choice.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QualitySelection {
    /// The backend picks; `current` is the height it last switched to.
    Auto { current: Option<u32> },
    /// Pinned to a vertical resolution.
    Fixed(u32),
}

impl QualitySelection {
    /// Auto mode with no level reported yet.
    pub const AUTO: QualitySelection = QualitySelection::Auto { current: None };

    pub fn is_auto(&self) -> bool {
        matches!(self, QualitySelection::Auto { .. })
    }

    /// The height currently in effect, if known.
    pub fn height(&self) -> Option<u32> {
        match self {
            QualitySelection::Auto { current } => *current,
            QualitySelection::Fixed(height) => Some(*height),
        }
    }
}

impl Default for QualitySelection {
    fn default() -> Self {
        Self::AUTO
    }
}

impl fmt::Display for QualitySelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QualitySelection::Auto { .. } => write!(f, "auto"),
            QualitySelection::Fixed(height) => write!(f, "{}p", height),
        }
    }
}

impl FromStr for QualitySelection {
    type Err = PlayerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("auto") {
            return Ok(Self::AUTO);
        }
        let digits = trimmed.trim_end_matches(['p', 'P']);
        match digits.parse::<u32>() {
            Ok(height) if height > 0 => Ok(QualitySelection::Fixed(height)),
            _ => Err(PlayerError::InvalidInput(format!(
                "unknown quality '{}'",
                s
            ))),
        }
    }
}
