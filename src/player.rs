//! Playback session controller.
//!
//! [`PlaybackController`] owns the playback state for a playlist of episodes.
//! It attaches the adaptive streaming backend (or falls back to native
//! playback) for the current episode, reacts to media and backend events, and
//! advances to the next episode on end of stream when autoplay is enabled.
//!
//! Every attachment is tagged with a [`Generation`]; backend events from an
//! attachment that has since been replaced are ignored, so rapid episode
//! switching never lets a stale manifest drive the state.

use log::{debug, info, warn};

use crate::backend::{AttachRequest, MediaElement, StreamAttachment, StreamBackend};
use crate::error::{PlayerError, Result};
use crate::events::{
    self, BackendEvent, EventReceiver, EventSender, Generation, MediaEvent, PlayerEvent,
};
use crate::preferences::{
    AUTO_PLAY_NEXT_KEY, LAST_EPISODE_KEY, PreferenceStore, SELECTED_QUALITY_KEY,
};
use crate::types::{Episode, QualityLevel, QualitySelection, is_hls_url};

/// Transport state of the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    /// No playlist loaded.
    Idle,
    /// A source is being attached.
    Loading,
    /// The source can play but has not started.
    Ready,
    Playing,
    Paused,
    /// End of stream reached without advancing.
    Ended,
}

/// Read-only view of the playback state.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackState {
    pub transport: TransportState,
    /// Index into the playlist. Valid whenever the playlist is non-empty.
    pub current_index: usize,
    pub is_playing: bool,
    pub is_buffering: bool,
    pub was_ended: bool,
    /// Volume in `[0, 1]`.
    pub volume: f64,
    /// Playback position as a percentage of the duration.
    pub progress: f64,
    /// Buffered range end as a percentage of the duration.
    pub buffered: f64,
    /// Position in seconds.
    pub current_time: f64,
    /// Duration in seconds, once known.
    pub duration: Option<f64>,
    pub selected_quality: QualitySelection,
    pub auto_play_next: bool,
    pub is_fullscreen: bool,
}

impl PlaybackState {
    fn new(selected_quality: QualitySelection, auto_play_next: bool) -> Self {
        Self {
            transport: TransportState::Idle,
            current_index: 0,
            is_playing: false,
            is_buffering: false,
            was_ended: false,
            volume: 1.0,
            progress: 0.0,
            buffered: 0.0,
            current_time: 0.0,
            duration: None,
            selected_quality,
            auto_play_next,
            is_fullscreen: false,
        }
    }

    fn reset_position(&mut self) {
        self.progress = 0.0;
        self.buffered = 0.0;
        self.current_time = 0.0;
        self.duration = None;
    }
}

/// Tunables for a controller.
#[derive(Debug, Clone)]
pub struct ControllerOptions {
    /// Quality used when no preference has been persisted.
    pub default_quality: QualitySelection,
    /// Start playing once a user-selected episode is ready.
    pub autoplay_on_select: bool,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            default_quality: QualitySelection::AUTO,
            autoplay_on_select: true,
        }
    }
}

/// Coordinates a media element and an adaptive streaming backend across a
/// playlist.
pub struct PlaybackController {
    media: Box<dyn MediaElement>,
    backend: Option<Box<dyn StreamBackend>>,
    preferences: Box<dyn PreferenceStore>,
    options: ControllerOptions,
    events_tx: EventSender,
    events_rx: EventReceiver,
    episodes: Vec<Episode>,
    state: PlaybackState,
    generation: Generation,
    attachment: Option<Box<dyn StreamAttachment>>,
    levels: Vec<QualityLevel>,
    active_source: Option<String>,
    play_when_ready: bool,
    resume_at: Option<f64>,
}

impl PlaybackController {
    /// Create a controller with its own event channel.
    pub fn new(
        media: Box<dyn MediaElement>,
        preferences: Box<dyn PreferenceStore>,
        options: ControllerOptions,
    ) -> Self {
        let (tx, rx) = events::channel();
        Self::with_channel(media, preferences, options, tx, rx)
    }

    /// Create a controller around an existing channel, for media elements that
    /// need the sender before the controller exists.
    pub fn with_channel(
        media: Box<dyn MediaElement>,
        preferences: Box<dyn PreferenceStore>,
        options: ControllerOptions,
        events_tx: EventSender,
        events_rx: EventReceiver,
    ) -> Self {
        let auto_play_next = preferences.get_bool(AUTO_PLAY_NEXT_KEY, true);
        let selected_quality = preferences
            .get(SELECTED_QUALITY_KEY)
            .and_then(|value| value.parse().ok())
            .unwrap_or(options.default_quality);

        debug!(
            "Controller created (autoplay next: {}, quality: {})",
            auto_play_next, selected_quality
        );

        Self {
            media,
            backend: None,
            preferences,
            options,
            events_tx,
            events_rx,
            episodes: Vec::new(),
            state: PlaybackState::new(selected_quality, auto_play_next),
            generation: Generation::default(),
            attachment: None,
            levels: Vec::new(),
            active_source: None,
            play_when_ready: false,
            resume_at: None,
        }
    }

    /// Use an adaptive streaming backend for HLS sources.
    pub fn with_backend(mut self, backend: Box<dyn StreamBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn state(&self) -> &PlaybackState {
        &self.state
    }

    pub fn transport(&self) -> TransportState {
        self.state.transport
    }

    pub fn episodes(&self) -> &[Episode] {
        &self.episodes
    }

    pub fn current_episode(&self) -> Option<&Episode> {
        self.episodes.get(self.state.current_index)
    }

    /// Levels reported by the current attachment's manifest.
    pub fn levels(&self) -> &[QualityLevel] {
        &self.levels
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn has_attachment(&self) -> bool {
        self.attachment.is_some()
    }

    /// Handle for posting media or backend events to this controller.
    pub fn event_sender(&self) -> EventSender {
        self.events_tx.clone()
    }

    /// Replace the playlist.
    ///
    /// Starts at the last played episode if it is in the new list, else at
    /// the first one. An empty list returns the controller to `Idle`.
    pub fn load_episodes(&mut self, episodes: Vec<Episode>) {
        self.teardown();
        self.episodes = episodes;
        info!("Loaded playlist with {} episodes", self.episodes.len());

        if self.episodes.is_empty() {
            self.media.clear_source();
            self.discard_pending_events();
            self.active_source = None;
            self.play_when_ready = false;
            self.resume_at = None;
            self.state.current_index = 0;
            self.state.is_playing = false;
            self.state.is_buffering = false;
            self.state.was_ended = false;
            self.state.reset_position();
            self.set_transport(TransportState::Idle);
            return;
        }

        let start = self
            .preferences
            .get(LAST_EPISODE_KEY)
            .and_then(|id| self.episodes.iter().position(|e| e.id == id))
            .unwrap_or(0);
        self.begin_episode(start, self.options.autoplay_on_select);
    }

    /// Switch to the episode at `index`.
    ///
    /// Out-of-range indices are rejected without touching the state.
    pub fn change_episode(&mut self, index: usize) -> Result<()> {
        if index >= self.episodes.len() {
            return Err(PlayerError::EpisodeOutOfRange {
                index,
                len: self.episodes.len(),
            });
        }
        self.begin_episode(index, self.options.autoplay_on_select);
        Ok(())
    }

    pub fn next_episode(&mut self) -> Result<()> {
        self.change_episode(self.state.current_index + 1)
    }

    pub fn previous_episode(&mut self) -> Result<()> {
        match self.state.current_index.checked_sub(1) {
            Some(index) => self.change_episode(index),
            None => Err(PlayerError::EpisodeOutOfRange {
                index: 0,
                len: self.episodes.len(),
            }),
        }
    }

    /// Play if paused, pause if playing.
    ///
    /// Ignored while nothing playable is loaded. While a stream is still being
    /// attached, this only flips whether it starts once ready.
    pub fn toggle_play(&mut self) {
        if self.active_source.is_none() {
            debug!("Nothing to play in {:?}", self.state.transport);
            return;
        }
        if self.state.transport == TransportState::Loading && self.attachment.is_some() {
            self.play_when_ready = !self.play_when_ready;
            debug!("Play when ready: {}", self.play_when_ready);
            return;
        }

        if self.media.is_paused() {
            self.start_playback();
        } else {
            self.media.pause();
            self.state.is_playing = false;
            if self.state.transport == TransportState::Playing {
                self.set_transport(TransportState::Paused);
            }
        }
    }

    /// Set the volume, clamped to `[0, 1]`. NaN is ignored.
    pub fn set_volume(&mut self, volume: f64) {
        if volume.is_nan() {
            debug!("Ignoring NaN volume");
            return;
        }
        let volume = volume.clamp(0.0, 1.0);
        self.state.volume = volume;
        self.media.set_volume(volume);
    }

    /// Seek to `seconds`, clamped to `[0, duration]`. No-op until the
    /// duration is known.
    pub fn seek(&mut self, seconds: f64) {
        let Some(duration) = self.known_duration() else {
            debug!("Ignoring seek before duration is known");
            return;
        };
        if seconds.is_nan() {
            return;
        }
        let target = seconds.clamp(0.0, duration);
        self.media.seek(target);
        self.state.current_time = target;
        self.state.progress = target / duration * 100.0;
    }

    /// Seek to a percentage of the duration, as from a progress bar.
    pub fn seek_percent(&mut self, percent: f64) {
        if let Some(duration) = self.known_duration() {
            self.seek(percent.clamp(0.0, 100.0) / 100.0 * duration);
        }
    }

    /// Change the quality.
    ///
    /// `Auto` hands level selection back to the backend. A fixed tier pins the
    /// backend level with that height, or switches to the episode's source for
    /// that tier. When neither exists the request is ignored.
    pub fn set_quality(&mut self, selection: QualitySelection) {
        match selection {
            QualitySelection::Auto { .. } => {
                if let Some(attachment) = self.attachment.as_mut() {
                    attachment.set_auto_level();
                } else if let Some(url) = self.alternate_source(&QualitySelection::AUTO) {
                    self.switch_source(url);
                }
                self.state.selected_quality = QualitySelection::AUTO;
            }
            QualitySelection::Fixed(height) => {
                let level = self.levels.iter().find(|l| l.height == height).map(|l| l.index);
                if let (Some(index), Some(attachment)) = (level, self.attachment.as_mut()) {
                    attachment.set_level(index);
                } else if let Some(url) = self.alternate_source(&selection) {
                    self.switch_source(url);
                } else {
                    debug!("No {}p level or source available, ignoring", height);
                    return;
                }
                self.state.selected_quality = selection;
            }
        }
        let value = self.state.selected_quality.to_string();
        info!("Quality set to {}", value);
        self.persist(SELECTED_QUALITY_KEY, &value);
    }

    pub fn toggle_fullscreen(&mut self) {
        let result = if self.media.is_fullscreen() {
            self.media.exit_fullscreen()
        } else {
            self.media.request_fullscreen()
        };
        match result {
            Ok(()) => self.state.is_fullscreen = self.media.is_fullscreen(),
            Err(e) => warn!("Fullscreen change failed: {}", e),
        }
    }

    pub fn set_auto_play_next(&mut self, enabled: bool) {
        self.state.auto_play_next = enabled;
        self.persist(AUTO_PLAY_NEXT_KEY, if enabled { "true" } else { "false" });
    }

    /// Wait for the next queued event.
    ///
    /// The controller holds a sender itself, so this only returns `None` if
    /// the channel is closed from outside.
    pub async fn next_event(&mut self) -> Option<PlayerEvent> {
        self.events_rx.recv().await
    }

    /// Dispatch every queued event without waiting. Returns how many ran.
    pub fn drain_events(&mut self) -> usize {
        let mut handled = 0;
        while let Some(event) = self.events_rx.try_recv() {
            self.dispatch(event);
            handled += 1;
        }
        handled
    }

    /// Process events until [`is_finished`](Self::is_finished) holds.
    pub async fn run_until_finished(&mut self) {
        while !self.is_finished() {
            match self.next_event().await {
                Some(event) => self.dispatch(event),
                None => break,
            }
        }
    }

    /// True when no further event can move playback forward on its own:
    /// idle, ended, stuck loading with nothing attached, or stopped on a
    /// paused element until the user resumes it.
    pub fn is_finished(&self) -> bool {
        match self.state.transport {
            TransportState::Idle | TransportState::Ended => true,
            TransportState::Loading => {
                self.active_source.is_none()
                    || (self.attachment.is_none()
                        && !self.play_when_ready
                        && self.media.is_paused())
            }
            TransportState::Ready => !self.play_when_ready && self.media.is_paused(),
            TransportState::Paused => self.media.is_paused(),
            TransportState::Playing => false,
        }
    }

    pub fn dispatch(&mut self, event: PlayerEvent) {
        match event {
            PlayerEvent::Media(event) => self.handle_media_event(event),
            PlayerEvent::Backend { generation, event } => {
                self.handle_backend_event(generation, event)
            }
        }
    }

    fn handle_media_event(&mut self, event: MediaEvent) {
        match event {
            MediaEvent::CanPlay => {
                self.state.is_buffering = false;
                if self.state.transport == TransportState::Loading {
                    self.set_transport(TransportState::Ready);
                }
                if let Some(position) = self.resume_at.take() {
                    self.media.seek(position);
                }
            }
            MediaEvent::Playing => {
                self.state.is_playing = true;
                self.state.is_buffering = false;
                self.state.was_ended = false;
                self.set_transport(TransportState::Playing);
            }
            MediaEvent::Pause => {
                self.state.is_playing = false;
                if self.state.transport == TransportState::Playing {
                    self.set_transport(TransportState::Paused);
                }
            }
            MediaEvent::Waiting => self.state.is_buffering = true,
            MediaEvent::TimeUpdate {
                current_time,
                duration,
                buffered_end,
            } => self.on_time_update(current_time, duration, buffered_end),
            MediaEvent::Ended => self.on_ended(),
            MediaEvent::Error { message } => {
                warn!("Media element error: {}", message);
                self.state.is_playing = false;
                self.state.is_buffering = false;
            }
        }
    }

    fn handle_backend_event(&mut self, generation: Generation, event: BackendEvent) {
        if generation != self.generation || self.attachment.is_none() {
            debug!(
                "Dropping backend event from stale attachment {:?} (current {:?})",
                generation, self.generation
            );
            return;
        }

        match event {
            BackendEvent::ManifestParsed { levels } => {
                debug!("Manifest parsed with {} levels", levels.len());
                self.levels = levels;
                self.apply_selected_level();
                self.state.is_buffering = false;
                if self.state.transport == TransportState::Loading {
                    self.set_transport(TransportState::Ready);
                }
                if let Some(position) = self.resume_at.take() {
                    self.media.seek(position);
                }
                if self.play_when_ready {
                    self.play_when_ready = false;
                    self.start_playback();
                }
            }
            BackendEvent::LevelSwitched { level } => {
                let height = self.levels.iter().find(|l| l.index == level).map(|l| l.height);
                debug!("Backend switched to level {} ({:?})", level, height);
                if self.state.selected_quality.is_auto() {
                    self.state.selected_quality = QualitySelection::Auto { current: height };
                }
            }
            BackendEvent::Error { message, fatal } => {
                if !fatal {
                    warn!("Stream backend error: {}", message);
                    return;
                }
                warn!("Fatal stream backend error, detaching: {}", message);
                self.teardown();
                self.active_source = None;
                self.play_when_ready = false;
                self.state.is_playing = false;
                self.state.is_buffering = false;
                if self.state.transport == TransportState::Playing {
                    self.media.pause();
                    self.set_transport(TransportState::Paused);
                }
            }
        }
    }

    fn on_time_update(
        &mut self,
        current_time: f64,
        duration: Option<f64>,
        buffered_end: Option<f64>,
    ) {
        if let Some(duration) = duration.filter(|d| d.is_finite() && *d > 0.0) {
            self.state.duration = Some(duration);
        }
        let Some(duration) = self.known_duration() else {
            return;
        };

        self.state.current_time = current_time;
        self.state.progress = (current_time / duration * 100.0).clamp(0.0, 100.0);
        if let Some(end) = buffered_end {
            self.state.buffered = (end / duration * 100.0).clamp(0.0, 100.0);
        }
    }

    fn on_ended(&mut self) {
        if matches!(
            self.state.transport,
            TransportState::Idle | TransportState::Loading | TransportState::Ended
        ) {
            debug!("Ignoring end of stream in {:?}", self.state.transport);
            return;
        }

        self.state.is_playing = false;
        self.state.is_buffering = false;
        self.state.was_ended = true;
        self.set_transport(TransportState::Ended);

        let next = self.state.current_index + 1;
        if self.state.auto_play_next && next < self.episodes.len() {
            info!("Episode finished, advancing to {}", next);
            self.begin_episode(next, true);
        } else {
            debug!("Episode finished, staying at {}", self.state.current_index);
        }
    }

    fn begin_episode(&mut self, index: usize, autoplay: bool) {
        self.teardown();
        self.discard_pending_events();
        self.state.current_index = index;
        self.state.is_playing = false;
        self.state.was_ended = false;
        self.state.reset_position();
        self.play_when_ready = autoplay;
        self.resume_at = None;

        let episode = &self.episodes[index];
        let episode_id = episode.id.clone();
        let source = episode.source_for(&self.state.selected_quality).cloned();
        info!("Loading episode {} ({})", index, episode.to_display());
        self.persist(LAST_EPISODE_KEY, &episode_id);

        match source {
            Some(source) => self.load_source(source.url),
            None => {
                warn!(
                    "Episode {} has no source for {}",
                    episode_id, self.state.selected_quality
                );
                self.active_source = None;
                self.play_when_ready = false;
                self.state.is_buffering = false;
                self.set_transport(TransportState::Loading);
            }
        }
    }

    /// Attach `url`, replacing whatever was attached before.
    fn load_source(&mut self, url: String) {
        self.teardown();
        self.discard_pending_events();
        self.generation = self.generation.next();
        self.state.is_playing = false;
        self.state.is_buffering = true;
        self.set_transport(TransportState::Loading);
        self.active_source = Some(url.clone());

        let hls = is_hls_url(&url);
        let request = AttachRequest {
            url: url.clone(),
            generation: self.generation,
            events: self.events_tx.clone(),
        };
        let attached = match self.backend.as_mut() {
            Some(backend) if hls && backend.is_supported() => Some(backend.attach(request)),
            _ => None,
        };

        match attached {
            Some(Ok(attachment)) => {
                debug!("Attached {} as {:?}", url, self.generation);
                self.attachment = Some(attachment);
            }
            Some(Err(e)) => {
                warn!("Could not attach stream backend to {}: {}", url, e);
                self.active_source = None;
                self.play_when_ready = false;
                self.state.is_buffering = false;
            }
            None => {
                debug!("Playing {} natively", url);
                self.media.set_source(&url);
                if self.play_when_ready {
                    self.play_when_ready = false;
                    self.start_playback();
                }
            }
        }
    }

    /// Reload the current episode from a different URL, keeping the position.
    fn switch_source(&mut self, url: String) {
        let resume = self
            .known_duration()
            .map(|_| self.state.current_time)
            .filter(|t| *t > 0.0);
        self.play_when_ready = self.state.is_playing;
        self.load_source(url);
        self.resume_at = resume;
    }

    /// A source URL of the current episode for `selection` that differs from
    /// the one already loaded.
    fn alternate_source(&self, selection: &QualitySelection) -> Option<String> {
        let source = self.current_episode()?.source_for(selection)?;
        if Some(&source.url) == self.active_source.as_ref() {
            None
        } else {
            Some(source.url.clone())
        }
    }

    fn apply_selected_level(&mut self) {
        let Some(attachment) = self.attachment.as_mut() else {
            return;
        };
        match self.state.selected_quality {
            QualitySelection::Auto { .. } => attachment.set_auto_level(),
            QualitySelection::Fixed(height) => {
                match self.levels.iter().find(|l| l.height == height) {
                    Some(level) => attachment.set_level(level.index),
                    None => debug!("Manifest has no {}p level, leaving backend on auto", height),
                }
            }
        }
    }

    fn start_playback(&mut self) {
        match self.media.play() {
            Ok(()) => {
                self.state.is_playing = true;
                self.state.was_ended = false;
                self.set_transport(TransportState::Playing);
            }
            Err(e) => {
                debug!("Playback request rejected: {}", e);
                self.state.is_playing = false;
            }
        }
    }

    /// Drop queued events; they describe the source being replaced.
    fn discard_pending_events(&mut self) {
        let mut dropped = 0;
        while self.events_rx.try_recv().is_some() {
            dropped += 1;
        }
        if dropped > 0 {
            debug!("Discarded {} events from the previous source", dropped);
        }
    }

    /// Destroy the current attachment, if any.
    fn teardown(&mut self) {
        if let Some(attachment) = self.attachment.take() {
            debug!("Destroying attachment {:?}", attachment.generation());
            attachment.destroy();
        }
        self.levels.clear();
    }

    fn known_duration(&self) -> Option<f64> {
        self.state.duration.filter(|d| d.is_finite() && *d > 0.0)
    }

    fn set_transport(&mut self, transport: TransportState) {
        if self.state.transport != transport {
            debug!("Transport {:?} -> {:?}", self.state.transport, transport);
            self.state.transport = transport;
        }
    }

    fn persist(&mut self, key: &str, value: &str) {
        if let Err(e) = self.preferences.set(key, value) {
            warn!("Failed to save preference {}: {}", key, e);
        }
    }
}

impl Drop for PlaybackController {
    fn drop(&mut self) {
        self.teardown();
        self.media.clear_source();
    }
}
