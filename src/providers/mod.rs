/// Provider trait and the Yandex Music implementation
pub mod yandex;

use crate::models::{Account, DownloadOption, PlaylistSummary, PlaylistUpdate, Track, TrackRef};
use async_trait::async_trait;
use std::sync::Arc;

pub use yandex::{YandexFactory, YandexProvider};

/// Error type for provider operations
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("network error: {0}")]
    Network(String),
    #[error("token rejected: {0}")]
    Unauthorized(String),
    #[error("request rejected by server: {0}")]
    Rejected(String),
    #[error("unexpected response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ProviderError::Decode(e.to_string())
        } else {
            ProviderError::Network(e.to_string())
        }
    }
}

/// The remote music-service surface the player consumes
#[async_trait]
pub trait MusicProvider: Send + Sync {
    /// Identity check for the current token
    async fn account(&self) -> Result<Account, ProviderError>;

    /// Get the user's playlists
    async fn playlists(&self) -> Result<Vec<PlaylistSummary>, ProviderError>;

    /// Track references of one playlist, in server order
    async fn playlist_tracks(&self, kind: u64) -> Result<Vec<TrackRef>, ProviderError>;

    /// Track references of the liked-tracks collection, in server order
    async fn liked_tracks(&self) -> Result<Vec<TrackRef>, ProviderError>;

    /// Resolve track identifiers (`<track>` or `<track>:<album>`) to full records
    async fn fetch_tracks(&self, ids: &[String]) -> Result<Vec<Track>, ProviderError>;

    /// Add tracks to the liked collection; `false` when the server did not apply it
    async fn like_tracks(&self, track_ids: &[String]) -> Result<bool, ProviderError>;

    /// Remove tracks from the liked collection
    async fn unlike_tracks(&self, track_ids: &[String]) -> Result<bool, ProviderError>;

    /// Delete the tracks at positions `[from, to)` of a playlist
    async fn delete_from_playlist(
        &self,
        kind: u64,
        from: usize,
        to: usize,
        revision: u64,
    ) -> Result<PlaylistUpdate, ProviderError>;

    /// Insert a track into a playlist at position `at`
    async fn insert_into_playlist(
        &self,
        kind: u64,
        at: usize,
        track_id: &str,
        album_id: &str,
        revision: u64,
    ) -> Result<PlaylistUpdate, ProviderError>;

    /// Tracks similar to the given one
    async fn similar_tracks(&self, track_id: &str) -> Result<Vec<Track>, ProviderError>;

    /// Available encodings for a track
    async fn download_options(&self, track_id: &str)
        -> Result<Vec<DownloadOption>, ProviderError>;

    /// Audio bytes for the chosen encoding
    async fn fetch_audio(&self, option: &DownloadOption) -> Result<Vec<u8>, ProviderError>;

    /// Artwork bytes for a cover URI template
    async fn fetch_cover(&self, cover_uri: &str) -> Result<Vec<u8>, ProviderError>;
}

/// Builds a connected provider from a session token
#[async_trait]
pub trait ProviderFactory: Send + Sync {
    async fn connect(&self, token: &str) -> Result<Arc<dyn MusicProvider>, ProviderError>;
}
