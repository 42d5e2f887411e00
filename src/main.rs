/// Main entry point for the yaplayer CLI
use anyhow::Context;
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tracing::info;
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};
use yaplayer::controller::{Command as PlayerCommand, TrackDetails};
use yaplayer::library::LIKES_LIST;
use yaplayer::models::format_duration;
use yaplayer::playback::{EngineError, EngineEvent, Progress};
use yaplayer::{
    AssetCache, Config, Controller, Event, MessageLevel, PlaybackEngine, PlaybackStatus,
    QueueKind, RodioEngine, SessionState, SettingsStore, View, YandexFactory,
};

const PROGRESS_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Parser, Debug)]
#[command(
    name = "yaplayer",
    version,
    about = "Yandex Music player with a local track cache",
    long_about = None
)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(short, long)]
    log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Log in and remember the token
    Login {
        /// OAuth token; the stored one is used when omitted
        token: Option<String>,
    },

    /// Forget the token and purge the cache
    Logout,

    /// List your playlists
    Playlists,

    /// List liked tracks
    Likes,

    /// List the tracks of a playlist
    Tracks {
        /// Playlist title
        playlist: String,
    },

    /// List tracks similar to a row of a list
    Similar {
        /// Playlist title, or "likes"
        list: String,
        row: usize,
    },

    /// Download a track and its cover into the cache
    Fetch {
        /// Playlist title, or "likes"
        list: String,
        row: usize,
    },

    /// Play a list starting at a row
    Play {
        /// Playlist title, or "likes"
        list: String,
        #[arg(default_value_t = 0)]
        row: usize,
    },
}

/// Engine for commands that never play audio
struct SilentEngine;

impl PlaybackEngine for SilentEngine {
    fn play(&self, path: &Path) -> Result<(), EngineError> {
        tracing::debug!("Not playing {}", path.display());
        Ok(())
    }

    fn pause(&self) -> Result<(), EngineError> {
        Ok(())
    }

    fn resume(&self) -> Result<(), EngineError> {
        Ok(())
    }

    fn stop(&self) -> Result<(), EngineError> {
        Ok(())
    }

    fn seek(&self, _position: Duration) -> Result<(), EngineError> {
        Ok(())
    }

    fn set_volume(&self, _volume: u8) -> Result<(), EngineError> {
        Ok(())
    }

    fn progress(&self) -> Option<Progress> {
        None
    }
}

/// Controller plus the event stream printed to the terminal
struct Player {
    controller: Controller,
    events: broadcast::Receiver<Event>,
}

impl Player {
    async fn run(&mut self, command: PlayerCommand) {
        self.controller.handle(command).await;
        self.controller.settle().await;
        self.print_events();
    }

    fn print_events(&mut self) {
        loop {
            match self.events.try_recv() {
                Ok(Event::Message { level, text }) => match level {
                    MessageLevel::Info => println!("{}", text),
                    MessageLevel::Warning => eprintln!("warning: {}", text),
                    MessageLevel::Error => eprintln!("error: {}", text),
                },
                Ok(Event::NowPlaying { title, .. }) => println!("Now playing: {}", title),
                Ok(Event::TrackDetails(details)) => print_details(&details),
                Ok(Event::Progress { position, duration }) => print_progress(position, duration),
                Ok(_) => {}
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    tracing::warn!("Dropped {} events", n);
                }
                Err(_) => break,
            }
        }
    }

    async fn login(&mut self, token: Option<String>) -> anyhow::Result<()> {
        self.run(PlayerCommand::Login { token }).await;
        match self.controller.state() {
            SessionState::LoggedIn { .. } => Ok(()),
            SessionState::LoggedOut => anyhow::bail!("Not logged in"),
        }
    }

    /// Load a list by name into its queue
    async fn select(&mut self, name: &str) -> anyhow::Result<QueueKind> {
        if name == LIKES_LIST {
            self.run(PlayerCommand::SelectTab(View::Likes)).await;
            return Ok(QueueKind::Likes);
        }
        let row = self
            .controller
            .playlists()
            .position_of(name)
            .with_context(|| format!("No playlist named '{}'", name))?;
        self.run(PlayerCommand::SelectPlaylist(row)).await;
        Ok(QueueKind::Playlist)
    }

    fn print_list(&self, kind: QueueKind) {
        for (row, track) in self.controller.list(kind).tracks.iter().enumerate() {
            println!(
                "{:>4}  {}  [{}]",
                row,
                track.display_name(),
                format_duration(track.duration_ms)
            );
        }
    }

    /// Play until the queue runs out or Ctrl-C
    async fn play(
        &mut self,
        mut engine_events: mpsc::UnboundedReceiver<EngineEvent>,
    ) -> anyhow::Result<()> {
        let mut ticker = tokio::time::interval(PROGRESS_INTERVAL);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.controller.publish_progress().await;
                    self.print_events();
                }
                event = engine_events.recv() => match event {
                    Some(EngineEvent::Finished) => {
                        self.run(PlayerCommand::TrackFinished).await;
                        if self.controller.status().await == PlaybackStatus::Stopped {
                            info!("Reached the end of the queue");
                            break;
                        }
                    }
                    Some(EngineEvent::Failed(reason)) => {
                        eprintln!("error: {}", reason);
                        self.run(PlayerCommand::TrackFinished).await;
                    }
                    None => anyhow::bail!("Audio thread stopped"),
                },
                _ = tokio::signal::ctrl_c() => {
                    info!("Interrupted");
                    break;
                }
            }
        }
        Ok(())
    }
}

fn print_progress(position: Duration, duration: Option<Duration>) {
    let total = duration
        .map(|d| format_duration(d.as_millis() as u64))
        .unwrap_or_else(|| "-:--".to_string());
    print!("\r{} / {}", format_duration(position.as_millis() as u64), total);
    let _ = std::io::stdout().flush();
}

fn print_details(details: &TrackDetails) {
    println!("{} - {}", details.artists, details.title);
    println!("  {}  {}", details.album, details.duration);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config_path = Config::resolve_path(args.config.as_deref())?;
    let created = Config::create_default_if_missing(&config_path)?;
    let config = Config::load(Some(&config_path))?;
    let level = args
        .log_level
        .as_deref()
        .unwrap_or(&config.general.log_level);
    init_logging(level)?;

    info!("Starting yaplayer v{}", env!("CARGO_PKG_VERSION"));
    if created {
        info!("Created default config at {}", config_path.display());
    }

    let (engine, engine_events) = match args.command {
        Command::Play { .. } => {
            let (engine, events) = RodioEngine::spawn().context("Failed to open audio output")?;
            (Arc::new(engine) as Arc<dyn PlaybackEngine>, Some(events))
        }
        _ => (Arc::new(SilentEngine) as Arc<dyn PlaybackEngine>, None),
    };

    let settings = Arc::new(SettingsStore::new(config.settings_path()?));
    let cache = Arc::new(AssetCache::new(
        config.cache_dir()?,
        config.client.codec.clone(),
    ));
    let factory = Arc::new(YandexFactory::new(config.client.base_url.clone()));
    let controller = Controller::new(
        factory,
        engine,
        settings,
        cache,
        config.playback.wraparound,
    );
    let events = controller.subscribe();
    let mut player = Player { controller, events };

    let result = run_command(&mut player, args.command, &config, engine_events).await;
    player
        .run(PlayerCommand::Shutdown { geometry: None })
        .await;
    result
}

async fn run_command(
    player: &mut Player,
    command: Command,
    config: &Config,
    engine_events: Option<mpsc::UnboundedReceiver<EngineEvent>>,
) -> anyhow::Result<()> {
    match command {
        Command::Login { token } => {
            player.login(token).await?;
            if let Some(account) = player.controller.account() {
                println!("{} ({})", account.label(), account.login);
            }
        }
        Command::Logout => {
            player.login(None).await?;
            player.run(PlayerCommand::Logout).await;
        }
        Command::Playlists => {
            player.login(None).await?;
            for (row, playlist) in player.controller.playlists().rows().iter().enumerate() {
                println!(
                    "{:>4}  {}  ({} tracks, revision {})",
                    row, playlist.title, playlist.track_count, playlist.revision
                );
            }
        }
        Command::Likes => {
            player.login(None).await?;
            player.print_list(QueueKind::Likes);
        }
        Command::Tracks { playlist } => {
            player.login(None).await?;
            let kind = player.select(&playlist).await?;
            player.print_list(kind);
        }
        Command::Similar { list, row } => {
            player.login(None).await?;
            player.select(&list).await?;
            player.run(PlayerCommand::SelectTrack(row)).await;
            player.run(PlayerCommand::FindSimilar(row)).await;
            // Listing only; drop the resolution of the first track
            player.run(PlayerCommand::Stop).await;
            if player.controller.active_queue() == QueueKind::Similar {
                player.print_list(QueueKind::Similar);
            }
        }
        Command::Fetch { list, row } => {
            player.login(None).await?;
            let kind = player.select(&list).await?;
            let (audio, cover) = player.controller.fetch_row(kind, row).await?;
            println!("{}", audio.display());
            if cover.exists() {
                println!("{}", cover.display());
            }
        }
        Command::Play { list, row } => {
            player.login(None).await?;
            let engine_events = engine_events.context("Audio output is not open")?;
            player
                .run(PlayerCommand::SetVolume(config.playback.volume))
                .await;
            player.select(&list).await?;
            player.run(PlayerCommand::PlayRow(row)).await;
            player.play(engine_events).await?;
        }
    }
    Ok(())
}

fn init_logging(level: &str) -> anyhow::Result<()> {
    let level: filter::LevelFilter = level
        .parse()
        .with_context(|| format!("Invalid log level '{}'", level))?;
    let filter = filter::Targets::new()
        .with_default(level)
        .with_target("hyper", level.min(filter::LevelFilter::INFO))
        .with_target("reqwest", level.min(filter::LevelFilter::INFO))
        .with_target("symphonia", filter::LevelFilter::WARN);
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
    Ok(())
}
