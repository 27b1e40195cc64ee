//! Integration tests for anime-player.
//!
//! These tests verify the integration between different modules
//! using mock data where appropriate.

use anime_player::api::episodes_from_json;
use anime_player::config::Config;
use anime_player::preferences::{
    AUTO_PLAY_NEXT_KEY, FilePreferences, LAST_EPISODE_KEY, PreferenceStore,
};
use anime_player::types::{Episode, QualitySelection, StreamSource};
use anime_player::{ControllerOptions, PlaybackController, TransportState};

/// Test episode display formatting.
#[test]
fn test_episode_display_integration() {
    let episode = Episode {
        id: "test-123-1".to_string(),
        title: "Pilot Episode".to_string(),
        number: Some(1),
        sources: Vec::new(),
    };

    assert!(episode.to_display().contains("Ep 1"));
    assert!(episode.to_display().contains("Pilot Episode"));
}

/// Test stream source quality display.
#[test]
fn test_stream_source_quality_integration() {
    let sources = vec![
        StreamSource { quality: 1080, url: "http://example.com/1080.m3u8".to_string() },
        StreamSource { quality: 720, url: "http://example.com/720.mp4".to_string() },
        StreamSource { quality: 0, url: "http://example.com/master.m3u8".to_string() },
    ];

    assert_eq!(sources[0].to_display(), "1080p");
    assert_eq!(sources[1].to_display(), "720p");
    assert_eq!(sources[2].to_display(), "Adaptive");
    assert!(sources[0].is_hls());
    assert!(!sources[1].is_hls());
}

/// Test config defaults.
#[test]
fn test_config_defaults() {
    let config = Config::new();

    assert_eq!(config.default_quality(), QualitySelection::AUTO);
    assert!(config.controller_options().autoplay_on_select);
}

/// Test that a parsed API response resolves to the expected sources.
#[test]
fn test_api_response_quality_resolution() {
    let body = r#"[
        {"_id": "a", "number": 1, "sources": [
            {"quality": "480p", "url": "https://cdn/a/480.mp4"},
            {"quality": "1080p", "url": "https://cdn/a/1080.mp4"}
        ]}
    ]"#;
    let episodes = episodes_from_json(body).unwrap();
    let episode = &episodes[0];

    assert_eq!(
        episode.source_for(&QualitySelection::AUTO).unwrap().url,
        "https://cdn/a/1080.mp4"
    );
    assert_eq!(
        episode.source_for(&QualitySelection::Fixed(480)).unwrap().url,
        "https://cdn/a/480.mp4"
    );
    assert!(episode.source_for(&QualitySelection::Fixed(720)).is_none());
}

/// Preferences written by one controller are read by the next one.
#[test]
fn test_preferences_survive_controller_restart() {
    struct NullMedia;

    impl anime_player::backend::MediaElement for NullMedia {
        fn set_source(&mut self, _url: &str) {}
        fn clear_source(&mut self) {}
        fn play(&mut self) -> anime_player::Result<()> {
            Err(anime_player::PlayerError::Player("headless".to_string()))
        }
        fn pause(&mut self) {}
        fn is_paused(&self) -> bool {
            true
        }
        fn set_volume(&mut self, _volume: f64) {}
        fn seek(&mut self, _seconds: f64) {}
        fn is_fullscreen(&self) -> bool {
            false
        }
        fn request_fullscreen(&mut self) -> anime_player::Result<()> {
            Ok(())
        }
        fn exit_fullscreen(&mut self) -> anime_player::Result<()> {
            Ok(())
        }
    }

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("preferences.json");
    let episodes = episodes_from_json(
        r#"[{"_id": "e1", "src": "https://cdn/e1.mp4"}, {"_id": "e2", "src": "https://cdn/e2.mp4"}]"#,
    )
    .unwrap();

    {
        let prefs = FilePreferences::open(&path).unwrap();
        let mut controller = PlaybackController::new(
            Box::new(NullMedia),
            Box::new(prefs),
            ControllerOptions::default(),
        );
        controller.load_episodes(episodes.clone());
        controller.change_episode(1).unwrap();
        controller.set_auto_play_next(false);
    }

    let prefs = FilePreferences::open(&path).unwrap();
    assert_eq!(prefs.get(LAST_EPISODE_KEY).as_deref(), Some("e2"));
    assert!(!prefs.get_bool(AUTO_PLAY_NEXT_KEY, true));

    let mut controller = PlaybackController::new(
        Box::new(NullMedia),
        Box::new(prefs),
        ControllerOptions::default(),
    );
    assert!(!controller.state().auto_play_next);
    controller.load_episodes(episodes);
    assert_eq!(controller.state().current_index, 1);
    // playback was refused by the element, so the episode waits to be ready
    assert_eq!(controller.transport(), TransportState::Loading);
    assert!(!controller.state().is_playing);
}
