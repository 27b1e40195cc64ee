//! Main entry point for the anime-player CLI application.

use anime_player::api::ApiClient;
use anime_player::cache::TtlCache;
use anime_player::config::Config;
use anime_player::events;
use anime_player::external::ExternalPlayer;
use anime_player::preferences::{
    AUTO_PLAY_NEXT_KEY, FilePreferences, LAST_EPISODE_KEY, PreferenceStore, SELECTED_QUALITY_KEY,
};
use anime_player::types::QualitySelection;
use anime_player::{PlaybackController, PlayerError, TransportState};
use clap::{Parser, Subcommand, ValueEnum};
use log::{debug, info, warn};

/// Command-line arguments for the anime-player application.
#[derive(Parser, Debug)]
#[command(
    name = "anime-player",
    version,
    about = "Play anime episodes back to back",
    long_about = "Fetch episode lists from the anime API and play them through an external player, advancing to the next episode automatically."
)]
struct Args {
    /// Log verbosity level: 0=error, 1=warn, 2=info, 3=debug, 4=trace
    #[arg(short, long, default_value_t = 1)]
    log: u8,

    /// Base URL of the episode API (overrides config)
    #[arg(long)]
    api_url: Option<String>,

    /// Preferred quality: "auto" or a height such as "720" (saved for next time)
    #[arg(short, long)]
    quality: Option<String>,

    /// Video player to use (overrides config and platform default)
    #[arg(short, long)]
    player: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the episodes of an anime
    List {
        /// Anime identifier
        anime_id: String,
    },
    /// Play episodes of an anime in order
    Play {
        /// Anime identifier
        anime_id: String,

        /// Episode index to start from (defaults to the last one played)
        #[arg(short, long)]
        episode: Option<usize>,
    },
    /// Turn advancing to the next episode on or off
    Autoplay {
        #[arg(value_enum)]
        state: Toggle,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Toggle {
    On,
    Off,
}

fn api_client(config: &Config, api_url: Option<&str>) -> anime_player::Result<ApiClient> {
    let base_url = api_url.unwrap_or(&config.api_url);
    ApiClient::new(base_url, TtlCache::new(config.cache_ttl()))
}

async fn list_episodes(
    config: &Config,
    api_url: Option<&str>,
    anime_id: &str,
) -> anime_player::Result<()> {
    let client = api_client(config, api_url)?;
    let episodes = client.fetch_episodes(anime_id).await?;

    if episodes.is_empty() {
        return Err(PlayerError::NotFound(format!(
            "No episodes for '{}'",
            anime_id
        )));
    }

    for (index, episode) in episodes.iter().enumerate() {
        println!(
            "{:>3}  {}  [{}]",
            index,
            episode.to_display(),
            episode.qualities_display()
        );
    }
    Ok(())
}

async fn play_episodes(
    config: &Config,
    args: &Args,
    anime_id: &str,
    start: Option<usize>,
) -> anime_player::Result<()> {
    let client = api_client(config, args.api_url.as_deref())?;
    let episodes = client.fetch_episodes(anime_id).await?;

    if episodes.is_empty() {
        return Err(PlayerError::NotFound(format!(
            "No episodes for '{}'",
            anime_id
        )));
    }

    let mut preferences = FilePreferences::load()?;
    if let Some(quality) = &args.quality {
        let selection: QualitySelection = quality.parse()?;
        preferences.set(SELECTED_QUALITY_KEY, &selection.to_string())?;
    }
    if let Some(index) = start {
        let episode = episodes.get(index).ok_or(PlayerError::EpisodeOutOfRange {
            index,
            len: episodes.len(),
        })?;
        preferences.set(LAST_EPISODE_KEY, &episode.id)?;
    }

    let (tx, rx) = events::channel();
    let player = args.player.as_deref().or(config.player.as_deref());
    let media = ExternalPlayer::new(player, config.player_args.clone(), tx.clone())?;

    let mut controller = PlaybackController::with_channel(
        Box::new(media),
        Box::new(preferences),
        config.controller_options(),
        tx,
        rx,
    );
    controller.load_episodes(episodes);

    if !controller.state().is_playing {
        // autoplay_on_select is off; start the first episode explicitly
        controller.toggle_play();
    }

    // stops on the last episode, or when the player exits early
    controller.run_until_finished().await;

    let state = controller.state();
    let current = controller
        .current_episode()
        .map(|e| e.to_display())
        .unwrap_or_default();
    match state.transport {
        TransportState::Loading => Err(PlayerError::NotFound(format!(
            "No playable source for {} at {}",
            current, state.selected_quality
        ))),
        _ => {
            info!("Stopped at {}", current);
            println!("Finished: {}", current);
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Initialize logging
    let log_level = match args.log {
        0 => log::LevelFilter::Error,
        1 => log::LevelFilter::Warn,
        2 => log::LevelFilter::Info,
        3 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(log_level)
        .format_timestamp(None)
        .format_target(false)
        .init();

    debug!("Log level set to {:?}", log_level);

    // Load config, writing a default one on first run
    match Config::create_default_if_missing() {
        Ok(path) => debug!("Config file: {}", path.display()),
        Err(e) => warn!("Could not create default config: {}", e),
    }
    let config = Config::load().unwrap_or_else(|e| {
        warn!("Failed to load config: {}. Using defaults.", e);
        Config::new()
    });

    match &args.command {
        Command::List { anime_id } => {
            list_episodes(&config, args.api_url.as_deref(), anime_id).await?
        }
        Command::Play { anime_id, episode } => {
            play_episodes(&config, &args, anime_id, *episode).await?
        }
        Command::Autoplay { state } => {
            let enabled = matches!(state, Toggle::On);
            let mut preferences = FilePreferences::load()?;
            preferences.set(AUTO_PLAY_NEXT_KEY, if enabled { "true" } else { "false" })?;
            println!(
                "Autoplay next episode: {}",
                if enabled { "on" } else { "off" }
            );
        }
    }

    Ok(())
}
