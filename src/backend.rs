//! Seams between the playback controller and the things it drives.
//!
//! [`MediaElement`] is the video surface (transport, volume, fullscreen).
//! [`StreamBackend`] is the adaptive-bitrate streaming library; each call to
//! [`StreamBackend::attach`] yields a [`StreamAttachment`] that the controller
//! owns exclusively and destroys exactly once.

use crate::error::Result;
use crate::events::{EventSender, Generation};

/// A media element the controller plays through.
pub trait MediaElement {
    /// Assign a source URL directly (native playback path).
    fn set_source(&mut self, url: &str);

    /// Drop the current source, if any.
    fn clear_source(&mut self);

    /// Request playback. An `Err` is an autoplay/policy rejection or a failure
    /// to start; the controller swallows it.
    fn play(&mut self) -> Result<()>;

    fn pause(&mut self);

    fn is_paused(&self) -> bool;

    /// Volume in `[0, 1]`.
    fn set_volume(&mut self, volume: f64);

    /// Seek to a position in seconds.
    fn seek(&mut self, seconds: f64);

    fn is_fullscreen(&self) -> bool;

    fn request_fullscreen(&mut self) -> Result<()>;

    fn exit_fullscreen(&mut self) -> Result<()>;
}

/// Everything a backend needs to start streaming one source.
#[derive(Clone, Debug)]
pub struct AttachRequest {
    /// Manifest URL.
    pub url: String,
    /// Tag the backend must put on every event it posts for this attachment.
    pub generation: Generation,
    /// Where lifecycle events go.
    pub events: EventSender,
}

/// Factory for adaptive streaming attachments.
pub trait StreamBackend {
    /// Whether the backend can run in this environment at all. When false the
    /// controller falls back to native playback.
    fn is_supported(&self) -> bool {
        true
    }

    /// Start loading a manifest and feeding the media element.
    ///
    /// Lifecycle events (`ManifestParsed`, `LevelSwitched`, `Error`) are posted
    /// asynchronously through `request.events`.
    fn attach(&mut self, request: AttachRequest) -> Result<Box<dyn StreamAttachment>>;
}

/// One live backend attachment.
pub trait StreamAttachment {
    fn generation(&self) -> Generation;

    /// Resume automatic level selection.
    fn set_auto_level(&mut self);

    /// Pin playback to the level with this backend index.
    fn set_level(&mut self, index: usize);

    /// Release network connections and timers. Called exactly once.
    fn destroy(self: Box<Self>);
}
