//! Scripted collaborators for unit tests
use crate::models::{Account, Album, DownloadOption, PlaylistSummary, PlaylistUpdate, Track, TrackRef};
use crate::playback::{EngineError, PlaybackEngine, Progress};
use crate::providers::{MusicProvider, ProviderError, ProviderFactory};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const AUDIO_BYTES: &[u8] = b"ID3fake-audio";
pub const COVER_BYTES: &[u8] = b"\x89PNGfake-cover";

/// A resolved track with one album and artwork
pub fn track(id: &str, artists: &[&str], title: &str) -> Track {
    Track {
        id: id.to_string(),
        title: title.to_string(),
        artists: artists.iter().map(|a| a.to_string()).collect(),
        duration_ms: 185_000,
        albums: vec![Album {
            id: format!("album-{}", id),
            title: format!("Album {}", id),
            year: Some(2020),
        }],
        cover_uri: Some(format!("avatars.example.net/get-music-content/{}/%%", id)),
        available: true,
    }
}

/// A short reference to a track added with [`FakeProvider::add_track`]
pub fn stub(id: &str) -> TrackRef {
    TrackRef::Stub {
        track_id: id.to_string(),
        album_id: Some(format!("album-{}", id)),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteCall {
    pub kind: u64,
    pub from: usize,
    pub to: usize,
    pub revision: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertCall {
    pub kind: u64,
    pub at: usize,
    pub track_id: String,
    pub album_id: String,
    pub revision: u64,
}

struct State {
    account: Account,
    playlists: Vec<PlaylistSummary>,
    playlist_refs: HashMap<u64, Vec<TrackRef>>,
    likes: Vec<TrackRef>,
    catalog: HashMap<String, Track>,
    similar: HashMap<String, Vec<Track>>,
    failing: HashSet<String>,
    calls: HashMap<String, usize>,
    deletes: Vec<DeleteCall>,
    inserts: Vec<InsertCall>,
    refuse_likes: bool,
    echo_tracks: bool,
}

/// In-memory music service.
///
/// Every trait method counts its calls and fails with a network error once
/// [`FakeProvider::fail`] was called with its name.
pub struct FakeProvider {
    state: Mutex<State>,
}

impl FakeProvider {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                account: Account {
                    uid: 42,
                    login: "listener".to_string(),
                    full_name: "Test Listener".to_string(),
                    email: Some("listener@example.com".to_string()),
                },
                playlists: Vec::new(),
                playlist_refs: HashMap::new(),
                likes: Vec::new(),
                catalog: HashMap::new(),
                similar: HashMap::new(),
                failing: HashSet::new(),
                calls: HashMap::new(),
                deletes: Vec::new(),
                inserts: Vec::new(),
                refuse_likes: false,
                echo_tracks: true,
            }),
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    fn enter(&self, name: &str) -> Result<std::sync::MutexGuard<'_, State>, ProviderError> {
        let mut state = self.state();
        *state.calls.entry(name.to_string()).or_default() += 1;
        if state.failing.contains(name) {
            return Err(ProviderError::Network(format!("{} failed", name)));
        }
        Ok(state)
    }

    pub fn calls(&self, name: &str) -> usize {
        self.state().calls.get(name).copied().unwrap_or(0)
    }

    pub fn fail(&self, name: &str) {
        self.state().failing.insert(name.to_string());
    }

    pub fn add_track(&self, track: Track) {
        self.state().catalog.insert(track.id.clone(), track);
    }

    pub fn set_likes(&self, refs: Vec<TrackRef>) {
        self.state().likes = refs;
    }

    pub fn likes(&self) -> Vec<String> {
        self.state()
            .likes
            .iter()
            .map(|r| r.track_id().to_string())
            .collect()
    }

    pub fn add_playlist(&self, title: &str, kind: u64, revision: u64, refs: Vec<TrackRef>) {
        let mut state = self.state();
        for r in &refs {
            if let TrackRef::Full(track) = r {
                state.catalog.insert(track.id.clone(), track.clone());
            }
        }
        state.playlists.push(PlaylistSummary {
            title: title.to_string(),
            kind,
            revision,
            track_count: refs.len(),
        });
        state.playlist_refs.insert(kind, refs);
    }

    pub fn playlist_track_ids(&self, kind: u64) -> Vec<String> {
        self.state()
            .playlist_refs
            .get(&kind)
            .map(|refs| refs.iter().map(|r| r.track_id().to_string()).collect())
            .unwrap_or_default()
    }

    pub fn set_similar(&self, track_id: &str, tracks: Vec<Track>) {
        let mut state = self.state();
        for t in &tracks {
            state.catalog.insert(t.id.clone(), t.clone());
        }
        state.similar.insert(track_id.to_string(), tracks);
    }

    /// Make `like_tracks` answer "not applied"
    pub fn refuse_likes(&self) {
        self.state().refuse_likes = true;
    }

    /// Make playlist mutations answer without the new track list
    pub fn omit_tracks_in_updates(&self) {
        self.state().echo_tracks = false;
    }

    pub fn deletes(&self) -> Vec<DeleteCall> {
        self.state().deletes.clone()
    }

    pub fn inserts(&self) -> Vec<InsertCall> {
        self.state().inserts.clone()
    }
}

impl Default for FakeProvider {
    fn default() -> Self {
        Self::new()
    }
}

fn bump_revision(state: &mut State, kind: u64) -> Result<PlaylistUpdate, ProviderError> {
    let refs = state.playlist_refs.get(&kind).cloned().unwrap_or_default();
    let summary = state
        .playlists
        .iter_mut()
        .find(|p| p.kind == kind)
        .ok_or_else(|| ProviderError::Rejected(format!("no playlist {}", kind)))?;
    summary.revision += 1;
    summary.track_count = refs.len();
    Ok(PlaylistUpdate {
        revision: summary.revision,
        tracks: if state.echo_tracks { refs } else { Vec::new() },
    })
}

fn check_revision(state: &State, kind: u64, revision: u64) -> Result<(), ProviderError> {
    match state.playlists.iter().find(|p| p.kind == kind) {
        Some(p) if p.revision == revision => Ok(()),
        Some(p) => Err(ProviderError::Rejected(format!(
            "wrong revision {} (current {})",
            revision, p.revision
        ))),
        None => Err(ProviderError::Rejected(format!("no playlist {}", kind))),
    }
}

#[async_trait]
impl MusicProvider for FakeProvider {
    async fn account(&self) -> Result<Account, ProviderError> {
        Ok(self.enter("account")?.account.clone())
    }

    async fn playlists(&self) -> Result<Vec<PlaylistSummary>, ProviderError> {
        Ok(self.enter("playlists")?.playlists.clone())
    }

    async fn playlist_tracks(&self, kind: u64) -> Result<Vec<TrackRef>, ProviderError> {
        self.enter("playlist_tracks")?
            .playlist_refs
            .get(&kind)
            .cloned()
            .ok_or_else(|| ProviderError::Rejected(format!("no playlist {}", kind)))
    }

    async fn liked_tracks(&self) -> Result<Vec<TrackRef>, ProviderError> {
        Ok(self.enter("liked_tracks")?.likes.clone())
    }

    async fn fetch_tracks(&self, ids: &[String]) -> Result<Vec<Track>, ProviderError> {
        let state = self.enter("fetch_tracks")?;
        Ok(ids
            .iter()
            .filter_map(|id| {
                let track_id = id.split(':').next().unwrap_or(id);
                state.catalog.get(track_id).cloned()
            })
            .collect())
    }

    async fn like_tracks(&self, track_ids: &[String]) -> Result<bool, ProviderError> {
        let mut state = self.enter("like_tracks")?;
        if state.refuse_likes {
            return Ok(false);
        }
        for id in track_ids {
            if state.likes.iter().any(|r| r.track_id() == id) {
                continue;
            }
            let album_id = state
                .catalog
                .get(id)
                .and_then(|t| t.first_album())
                .map(|a| a.id.clone());
            state.likes.insert(
                0,
                TrackRef::Stub {
                    track_id: id.clone(),
                    album_id,
                },
            );
        }
        Ok(true)
    }

    async fn unlike_tracks(&self, track_ids: &[String]) -> Result<bool, ProviderError> {
        let mut state = self.enter("unlike_tracks")?;
        state
            .likes
            .retain(|r| !track_ids.iter().any(|id| id == r.track_id()));
        Ok(true)
    }

    async fn delete_from_playlist(
        &self,
        kind: u64,
        from: usize,
        to: usize,
        revision: u64,
    ) -> Result<PlaylistUpdate, ProviderError> {
        let mut state = self.enter("delete_from_playlist")?;
        state.deletes.push(DeleteCall {
            kind,
            from,
            to,
            revision,
        });
        check_revision(&state, kind, revision)?;
        let refs = state.playlist_refs.entry(kind).or_default();
        if from >= to || to > refs.len() {
            return Err(ProviderError::Rejected(format!(
                "invalid range {}..{}",
                from, to
            )));
        }
        refs.drain(from..to);
        bump_revision(&mut state, kind)
    }

    async fn insert_into_playlist(
        &self,
        kind: u64,
        at: usize,
        track_id: &str,
        album_id: &str,
        revision: u64,
    ) -> Result<PlaylistUpdate, ProviderError> {
        let mut state = self.enter("insert_into_playlist")?;
        state.inserts.push(InsertCall {
            kind,
            at,
            track_id: track_id.to_string(),
            album_id: album_id.to_string(),
            revision,
        });
        check_revision(&state, kind, revision)?;
        let entry = TrackRef::Stub {
            track_id: track_id.to_string(),
            album_id: Some(album_id.to_string()),
        };
        let refs = state.playlist_refs.entry(kind).or_default();
        let at = at.min(refs.len());
        refs.insert(at, entry);
        bump_revision(&mut state, kind)
    }

    async fn similar_tracks(&self, track_id: &str) -> Result<Vec<Track>, ProviderError> {
        Ok(self
            .enter("similar_tracks")?
            .similar
            .get(track_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn download_options(
        &self,
        track_id: &str,
    ) -> Result<Vec<DownloadOption>, ProviderError> {
        let _state = self.enter("download_options")?;
        Ok([("mp3", 192), ("mp3", 320), ("aac", 128)]
            .into_iter()
            .map(|(codec, bitrate_kbps)| DownloadOption {
                codec: codec.to_string(),
                bitrate_kbps,
                info_url: format!("fake://{}/{}/{}", track_id, codec, bitrate_kbps),
            })
            .collect())
    }

    async fn fetch_audio(&self, _option: &DownloadOption) -> Result<Vec<u8>, ProviderError> {
        let _state = self.enter("fetch_audio")?;
        Ok(AUDIO_BYTES.to_vec())
    }

    async fn fetch_cover(&self, _cover_uri: &str) -> Result<Vec<u8>, ProviderError> {
        let _state = self.enter("fetch_cover")?;
        Ok(COVER_BYTES.to_vec())
    }
}

/// Hands out one shared [`FakeProvider`] for the accepted token
pub struct FakeFactory {
    pub provider: Arc<FakeProvider>,
    accepted_token: String,
}

impl FakeFactory {
    pub fn new(provider: Arc<FakeProvider>, accepted_token: &str) -> Self {
        Self {
            provider,
            accepted_token: accepted_token.to_string(),
        }
    }
}

#[async_trait]
impl ProviderFactory for FakeFactory {
    async fn connect(&self, token: &str) -> Result<Arc<dyn MusicProvider>, ProviderError> {
        if token != self.accepted_token {
            return Err(ProviderError::Unauthorized("invalid token".to_string()));
        }
        Ok(self.provider.clone())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EngineCall {
    Play(PathBuf),
    Pause,
    Resume,
    Stop,
    Seek(Duration),
    Volume(u8),
}

/// Audio engine that only records what it was asked to do
#[derive(Default)]
pub struct FakeEngine {
    calls: Mutex<Vec<EngineCall>>,
    progress: Mutex<Option<Progress>>,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn played(&self) -> Vec<PathBuf> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                EngineCall::Play(path) => Some(path),
                _ => None,
            })
            .collect()
    }

    /// Position the engine reports from now on
    pub fn set_progress(&self, progress: Option<Progress>) {
        *self.progress.lock().unwrap() = progress;
    }

    fn record(&self, call: EngineCall) -> Result<(), EngineError> {
        self.calls.lock().unwrap().push(call);
        Ok(())
    }
}

impl PlaybackEngine for FakeEngine {
    fn play(&self, path: &Path) -> Result<(), EngineError> {
        self.record(EngineCall::Play(path.to_path_buf()))
    }

    fn pause(&self) -> Result<(), EngineError> {
        self.record(EngineCall::Pause)
    }

    fn resume(&self) -> Result<(), EngineError> {
        self.record(EngineCall::Resume)
    }

    fn stop(&self) -> Result<(), EngineError> {
        self.record(EngineCall::Stop)
    }

    fn seek(&self, position: Duration) -> Result<(), EngineError> {
        self.record(EngineCall::Seek(position))
    }

    fn set_volume(&self, volume: u8) -> Result<(), EngineError> {
        self.record(EngineCall::Volume(volume))
    }

    fn progress(&self) -> Option<Progress> {
        *self.progress.lock().unwrap()
    }
}
