/// yaplayer - Yandex Music player core
pub mod cache;
pub mod config;
pub mod controller;
pub mod library;
pub mod models;
pub mod playback;
pub mod presentation;
pub mod providers;
pub mod settings;

#[cfg(test)]
mod testing;

pub use cache::AssetCache;
pub use config::Config;
pub use controller::{Command, Controller, Event, MessageLevel, PlayerError, QueueKind, SessionState, View};
pub use models::{Album, Track, TrackRef};
pub use playback::{PlaybackEngine, PlaybackQueue, PlaybackStatus, RodioEngine};
pub use providers::{MusicProvider, ProviderError, ProviderFactory, YandexFactory};
pub use settings::{Settings, SettingsStore};
