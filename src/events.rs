//! Events that drive the playback controller.
//!
//! Media element notifications and adaptive backend lifecycle notifications
//! are funnelled through one unbounded channel so the controller handles them
//! serially, in arrival order.

use tokio::sync::mpsc;

use crate::types::QualityLevel;

/// Tag identifying one backend attachment attempt.
///
/// Bumped every time the controller attaches a source; backend events carrying
/// an older generation belong to a torn-down attachment and are dropped.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Generation(pub u64);

impl Generation {
    pub fn next(self) -> Self {
        Generation(self.0 + 1)
    }
}

/// Notifications from the media element.
#[derive(Clone, Debug, PartialEq)]
pub enum MediaEvent {
    /// Enough data is available to start playback.
    CanPlay,
    /// Playback started or resumed.
    Playing,
    /// Playback paused.
    Pause,
    /// Playback stalled waiting for data.
    Waiting,
    /// Periodic position update. Times are in seconds.
    TimeUpdate {
        current_time: f64,
        duration: Option<f64>,
        buffered_end: Option<f64>,
    },
    /// End of stream reached.
    Ended,
    /// The element failed to load or decode the source.
    Error { message: String },
}

/// Lifecycle notifications from the adaptive streaming backend.
#[derive(Clone, Debug, PartialEq)]
pub enum BackendEvent {
    /// Manifest loaded and quality levels discovered.
    ManifestParsed { levels: Vec<QualityLevel> },
    /// The backend switched to the level with this index.
    LevelSwitched { level: usize },
    /// The backend hit an error. Fatal errors end the attachment.
    Error { message: String, fatal: bool },
}

/// Everything the controller reacts to.
#[derive(Clone, Debug, PartialEq)]
pub enum PlayerEvent {
    Media(MediaEvent),
    Backend {
        generation: Generation,
        event: BackendEvent,
    },
}

/// Cloneable handle for posting events to a controller.
#[derive(Clone, Debug)]
pub struct EventSender {
    tx: mpsc::UnboundedSender<PlayerEvent>,
}

impl EventSender {
    /// Post a media element event. Returns false if the controller is gone.
    pub fn media(&self, event: MediaEvent) -> bool {
        self.tx.send(PlayerEvent::Media(event)).is_ok()
    }

    /// Post a backend event tagged with its attachment's generation.
    pub fn backend(&self, generation: Generation, event: BackendEvent) -> bool {
        self.tx
            .send(PlayerEvent::Backend { generation, event })
            .is_ok()
    }
}

/// Receiving side owned by the controller.
#[derive(Debug)]
pub struct EventReceiver {
    rx: mpsc::UnboundedReceiver<PlayerEvent>,
}

impl EventReceiver {
    /// Wait for the next event.
    pub async fn recv(&mut self) -> Option<PlayerEvent> {
        self.rx.recv().await
    }

    /// Take an already-queued event without waiting.
    pub fn try_recv(&mut self) -> Option<PlayerEvent> {
        self.rx.try_recv().ok()
    }
}

/// Create a connected sender/receiver pair.
pub fn channel() -> (EventSender, EventReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (EventSender { tx }, EventReceiver { rx })
}
