//! Session and playback state machine.
//!
//! The [`Controller`] owns the session, the three materialized lists with
//! their queues, and the presentation models. Front ends send it
//! [`Command`]s and subscribe to the [`Event`] broadcast; no error ever
//! escapes [`Controller::handle`].
mod command;
mod error;
mod event;

pub use command::Command;
pub use error::PlayerError;
pub use event::{Event, MessageLevel, QueueKind, SessionState, TrackDetails, View};

use crate::cache::AssetCache;
use crate::library::{ListSource, MaterializedList, Materializer, LIKES_LIST, SIMILAR_LIST};
use crate::models::{Account, Track};
use crate::playback::{
    Direction, PlaybackEngine, PlaybackQueue, PlaybackStatus, Progress, QueueError,
};
use crate::presentation::{ModelKind, PlaylistListModel, TrackAction, TrackTableModel};
use crate::providers::{MusicProvider, ProviderFactory};
use crate::settings::{Geometry, SettingsStore};
use error::auth_error;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch, Mutex};
use tokio::task::JoinHandle;

const EVENT_CAPACITY: usize = 256;

/// Connection created on login and dropped on logout
struct Session {
    provider: Arc<dyn MusicProvider>,
    account: Account,
    token: String,
}

/// A materialized list and the queue projected from it
struct Slot {
    list: MaterializedList,
    queue: PlaybackQueue,
    index_rx: watch::Receiver<Option<usize>>,
}

impl Slot {
    fn new(name: &str, wraparound: bool) -> Self {
        let queue = PlaybackQueue::new(wraparound);
        let index_rx = queue.subscribe();
        Self {
            list: MaterializedList::new(name),
            queue,
            index_rx,
        }
    }

    fn current_track(&self) -> Option<&Track> {
        self.queue.current_index().and_then(|i| self.list.get(i))
    }
}

fn out_of_range(index: usize, len: usize) -> QueueError {
    QueueError::OutOfRange { index, len }
}

fn send_message(events: &broadcast::Sender<Event>, level: MessageLevel, text: String) {
    match level {
        MessageLevel::Error => tracing::error!("{}", text),
        MessageLevel::Warning => tracing::warn!("{}", text),
        MessageLevel::Info => tracing::info!("{}", text),
    }
    let _ = events.send(Event::Message { level, text });
}

/// Make the track local, then hand it to the engine
async fn play_track(
    provider: &dyn MusicProvider,
    cache: &AssetCache,
    engine: &dyn PlaybackEngine,
    status: &Mutex<PlaybackStatus>,
    events: &broadcast::Sender<Event>,
    track: &Track,
) -> Result<(), PlayerError> {
    let (audio, cover) = cache.ensure_local(provider, track).await?;
    engine.play(&audio)?;
    *status.lock().await = PlaybackStatus::Playing;
    let _ = events.send(Event::Playback(PlaybackStatus::Playing));
    let _ = events.send(Event::NowPlaying {
        title: track.display_name(),
        audio,
        cover,
    });
    Ok(())
}

pub struct Controller {
    factory: Arc<dyn ProviderFactory>,
    engine: Arc<dyn PlaybackEngine>,
    settings: Arc<SettingsStore>,
    cache: Arc<AssetCache>,
    materializer: Materializer,
    events: broadcast::Sender<Event>,
    state: SessionState,
    session: Option<Session>,
    playlist: Slot,
    likes: Slot,
    similar: Slot,
    active: QueueKind,
    /// Kind of the playlist loaded into the playlist slot
    loaded_playlist: Option<u64>,
    playlists_model: PlaylistListModel,
    tracks_model: TrackTableModel,
    likes_model: TrackTableModel,
    status: Arc<Mutex<PlaybackStatus>>,
    volume: u8,
    /// Resolution of the current track, aborted when it goes stale
    pending: Option<JoinHandle<()>>,
}

impl Controller {
    pub fn new(
        factory: Arc<dyn ProviderFactory>,
        engine: Arc<dyn PlaybackEngine>,
        settings: Arc<SettingsStore>,
        cache: Arc<AssetCache>,
        wraparound: bool,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            factory,
            engine,
            settings,
            materializer: Materializer::new(cache.clone()),
            cache,
            events,
            state: SessionState::LoggedOut,
            session: None,
            playlist: Slot::new("", wraparound),
            likes: Slot::new(LIKES_LIST, wraparound),
            similar: Slot::new(SIMILAR_LIST, wraparound),
            active: QueueKind::Playlist,
            loaded_playlist: None,
            playlists_model: PlaylistListModel::new(),
            tracks_model: TrackTableModel::for_playlist(),
            likes_model: TrackTableModel::for_likes(),
            status: Arc::new(Mutex::new(PlaybackStatus::Stopped)),
            volume: 100,
            pending: None,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn account(&self) -> Option<&Account> {
        self.session.as_ref().map(|s| &s.account)
    }

    pub fn playlists(&self) -> &PlaylistListModel {
        &self.playlists_model
    }

    pub fn tracks_model(&self) -> &TrackTableModel {
        &self.tracks_model
    }

    pub fn likes_model(&self) -> &TrackTableModel {
        &self.likes_model
    }

    pub fn list(&self, kind: QueueKind) -> &MaterializedList {
        &self.slot(kind).list
    }

    pub fn queue(&self, kind: QueueKind) -> &PlaybackQueue {
        &self.slot(kind).queue
    }

    pub fn active_queue(&self) -> QueueKind {
        self.active
    }

    pub fn cache(&self) -> &AssetCache {
        &self.cache
    }

    pub fn volume(&self) -> u8 {
        self.volume
    }

    pub async fn status(&self) -> PlaybackStatus {
        *self.status.lock().await
    }

    /// Handle one command; failures are reported as a message event
    pub async fn handle(&mut self, command: Command) {
        tracing::debug!("Handling command {:?}", command);
        if let Err(e) = self.dispatch(command).await {
            self.report(e);
        }
        if let Err(e) = self.sync_queues() {
            self.report(e);
        }
    }

    /// Make a row's audio and cover local without playing it
    pub async fn fetch_row(
        &self,
        kind: QueueKind,
        row: usize,
    ) -> Result<(PathBuf, PathBuf), PlayerError> {
        let provider = self.provider()?;
        let track = self.row_track(kind, row)?;
        Ok(self.cache.ensure_local(provider.as_ref(), track).await?)
    }

    /// Wait for the pending track resolution, if any
    pub async fn settle(&mut self) {
        if let Some(task) = self.pending.take() {
            if let Err(e) = task.await {
                if !e.is_cancelled() {
                    tracing::error!("Track resolution task failed: {}", e);
                }
            }
        }
    }

    /// Emit the position of the playing track.
    ///
    /// Falls back to the track's catalog length when the engine cannot tell
    /// the duration. Nothing is emitted while stopped.
    pub async fn publish_progress(&self) -> Option<Progress> {
        if self.status().await == PlaybackStatus::Stopped {
            return None;
        }
        let mut progress = self.engine.progress()?;
        if progress.duration.is_none() {
            progress.duration = self
                .slot(self.active)
                .current_track()
                .map(|t| Duration::from_millis(t.duration_ms));
        }
        self.emit(Event::Progress {
            position: progress.position,
            duration: progress.duration,
        });
        Some(progress)
    }

    async fn dispatch(&mut self, command: Command) -> Result<(), PlayerError> {
        match command {
            Command::Login { token } => self.login(token).await,
            Command::Shutdown { geometry } => self.shutdown(geometry).await,
            // The engine can report a finish after logout
            Command::TrackFinished if self.session.is_none() => Ok(()),
            _ if self.session.is_none() => Err(PlayerError::NotLoggedIn),
            Command::Logout => self.logout().await,
            Command::SelectTab(view) => self.select_tab(view).await,
            Command::SelectPlaylist(row) => self.select_playlist(row).await,
            Command::RefreshPlaylists => self.refresh_playlists().await,
            Command::RefreshLikes => self.refresh_likes().await,
            Command::SelectTrack(row) => self.select_track(row),
            Command::PlayRow(row) => self.play_row(row),
            Command::Activate { row, column } => self.activate(row, column).await,
            Command::DeleteRow(row) => self.delete_row(row).await,
            Command::FindSimilar(row) => self.find_similar(row).await,
            Command::Like(row) => self.like(row).await,
            Command::AddToPlaylist { target } => self.add_to_playlist(target).await,
            Command::Play => self.play().await,
            Command::Pause => self.pause().await,
            Command::Stop => self.stop().await,
            Command::Next => {
                self.step(Direction::Forward);
                Ok(())
            }
            Command::Previous => {
                self.step(Direction::Backward);
                Ok(())
            }
            Command::SeekPosition(ms) => Ok(self.engine.seek(Duration::from_millis(ms))?),
            Command::SetVolume(volume) => self.set_volume(volume),
            Command::TrackFinished => self.track_finished().await,
        }
    }

    fn emit(&self, event: Event) {
        let _ = self.events.send(event);
    }

    fn message(&self, level: MessageLevel, text: String) {
        send_message(&self.events, level, text);
    }

    fn report(&self, error: PlayerError) {
        self.message(error.level(), error.to_string());
    }

    fn set_state(&mut self, state: SessionState) {
        if self.state != state {
            tracing::info!("Session state: {:?} -> {:?}", self.state, state);
            self.state = state;
            self.emit(Event::StateChanged(state));
        }
    }

    async fn set_status(&self, status: PlaybackStatus) {
        *self.status.lock().await = status;
        self.emit(Event::Playback(status));
    }

    fn view(&self) -> View {
        match self.state {
            SessionState::LoggedIn { view } => view,
            SessionState::LoggedOut => View::Tracks,
        }
    }

    fn provider(&self) -> Result<Arc<dyn MusicProvider>, PlayerError> {
        self.session
            .as_ref()
            .map(|s| s.provider.clone())
            .ok_or(PlayerError::NotLoggedIn)
    }

    fn slot(&self, kind: QueueKind) -> &Slot {
        match kind {
            QueueKind::Playlist => &self.playlist,
            QueueKind::Likes => &self.likes,
            QueueKind::Similar => &self.similar,
        }
    }

    fn slot_mut(&mut self, kind: QueueKind) -> &mut Slot {
        match kind {
            QueueKind::Playlist => &mut self.playlist,
            QueueKind::Likes => &mut self.likes,
            QueueKind::Similar => &mut self.similar,
        }
    }

    fn row_track(&self, kind: QueueKind, row: usize) -> Result<&Track, PlayerError> {
        let list = &self.slot(kind).list;
        list.get(row)
            .ok_or_else(|| out_of_range(row, list.len()).into())
    }

    fn cancel_pending(&mut self) {
        if let Some(task) = self.pending.take() {
            if !task.is_finished() {
                tracing::debug!("Cancelling pending track resolution");
            }
            task.abort();
        }
    }

    /// Point the transport controls at another queue
    fn activate_queue(&mut self, kind: QueueKind) {
        if self.active != kind {
            self.cancel_pending();
            tracing::debug!("Active queue: {:?} -> {:?}", self.active, kind);
            self.active = kind;
        }
    }

    /// Re-project a slot's list onto its queue and table model.
    ///
    /// The cursor follows the current track to its new row. If the track left
    /// the active queue, playback stops.
    async fn rebind(&mut self, kind: QueueKind) -> Result<(), PlayerError> {
        let cache = self.cache.clone();
        let slot = self.slot_mut(kind);
        let had_current = slot.queue.current_index().is_some();
        let result = slot.queue.rebase(&slot.list.tracks, &cache);
        let kept = match &result {
            Ok(index) => *index,
            Err(_) => {
                // Keep list and queue the same length
                slot.list.clear();
                slot.queue.clear();
                None
            }
        };
        if let Some(index) = kept {
            // Same file keeps playing, only its row moved
            let _ = slot.index_rx.borrow_and_update();
            self.emit(Event::IndexChanged {
                queue: kind,
                index: Some(index),
            });
        }

        match kind {
            QueueKind::Playlist => self.tracks_model.reset(&self.playlist.queue),
            QueueKind::Likes => self.likes_model.reset(&self.likes.queue),
            QueueKind::Similar => {}
        }
        if let Some(model) = kind.model() {
            self.emit(Event::ModelReset(model));
        }

        if had_current && kept.is_none() && kind == self.active {
            self.cancel_pending();
            if self.status().await != PlaybackStatus::Stopped {
                tracing::info!("Current track left the {:?} queue, stopping", kind);
                self.engine.stop()?;
                self.set_status(PlaybackStatus::Stopped).await;
            }
        }
        result?;
        Ok(())
    }

    /// Publish cursor moves and start resolving the active queue's track
    fn sync_queues(&mut self) -> Result<(), PlayerError> {
        for kind in QueueKind::ALL {
            let slot = self.slot_mut(kind);
            if !slot.index_rx.has_changed().unwrap_or(false) {
                continue;
            }
            let index = *slot.index_rx.borrow_and_update();
            self.emit(Event::IndexChanged { queue: kind, index });
            if let (true, Some(index)) = (kind == self.active, index) {
                self.resolve(kind, index)?;
            }
        }
        Ok(())
    }

    fn resolve(&mut self, kind: QueueKind, index: usize) -> Result<(), PlayerError> {
        let provider = self.provider()?;
        let track = self.row_track(kind, index)?.clone();
        self.cancel_pending();

        let cache = self.cache.clone();
        let engine = self.engine.clone();
        let status = self.status.clone();
        let events = self.events.clone();
        tracing::debug!("Resolving '{}' from the {:?} queue", track.display_name(), kind);

        self.pending = Some(tokio::spawn(async move {
            if let Err(e) = play_track(
                provider.as_ref(),
                &cache,
                engine.as_ref(),
                &status,
                &events,
                &track,
            )
            .await
            {
                send_message(&events, e.level(), e.to_string());
            }
        }));
        Ok(())
    }

    async fn login(&mut self, token: Option<String>) -> Result<(), PlayerError> {
        if let Some(session) = &self.session {
            self.message(
                MessageLevel::Info,
                format!("Already logged in as {}", session.account.label()),
            );
            return Ok(());
        }

        let token = match token.filter(|t| !t.trim().is_empty()) {
            Some(token) => token,
            None => self
                .settings
                .token()
                .await?
                .ok_or_else(|| PlayerError::Auth("no token given and none stored".to_string()))?,
        };

        let provider = self.factory.connect(&token).await.map_err(auth_error)?;
        let account = provider.account().await.map_err(auth_error)?;
        tracing::info!("Logged in as {} (uid {})", account.login, account.uid);

        if let Err(e) = self
            .settings
            .update(|s| s.token = Some(token.clone()))
            .await
        {
            self.report(e.into());
        }

        let label = account.label();
        self.session = Some(Session {
            provider,
            account,
            token,
        });
        self.active = QueueKind::Playlist;
        self.set_state(SessionState::LoggedIn { view: View::Tracks });
        self.message(MessageLevel::Info, format!("Logged in as {}", label));

        // A failed refresh does not undo the login
        if let Err(e) = self.refresh_playlists().await {
            self.report(e);
        }
        if let Err(e) = self.refresh_likes().await {
            self.report(e);
        }
        Ok(())
    }

    async fn logout(&mut self) -> Result<(), PlayerError> {
        self.cancel_pending();
        if let Err(e) = self.engine.stop() {
            tracing::warn!("Failed to stop playback on logout: {}", e);
        }
        self.set_status(PlaybackStatus::Stopped).await;

        for kind in QueueKind::ALL {
            let slot = self.slot_mut(kind);
            slot.list.clear();
            slot.queue.clear();
        }
        self.loaded_playlist = None;
        self.playlists_model.clear();
        self.tracks_model.clear();
        self.likes_model.clear();
        for model in [ModelKind::Playlists, ModelKind::Tracks, ModelKind::Likes] {
            self.emit(Event::ModelReset(model));
        }

        let purged = self.cache.purge().await;
        let forgotten = self.settings.clear_token().await;

        self.session = None;
        self.active = QueueKind::Playlist;
        self.set_state(SessionState::LoggedOut);

        purged?;
        forgotten?;
        Ok(())
    }

    async fn shutdown(&mut self, geometry: Option<Geometry>) -> Result<(), PlayerError> {
        self.cancel_pending();
        if let Err(e) = self.engine.stop() {
            tracing::warn!("Failed to stop playback on shutdown: {}", e);
        }

        let Some(session) = &self.session else {
            tracing::debug!("Shutting down without a session, settings left as they are");
            return Ok(());
        };
        let token = session.token.clone();
        self.settings
            .update(move |s| {
                s.token = Some(token);
                if let Some(geometry) = geometry {
                    s.size = geometry.size;
                    s.pos = geometry.pos;
                }
            })
            .await?;
        tracing::info!("Saved session for next start");
        Ok(())
    }

    async fn select_tab(&mut self, view: View) -> Result<(), PlayerError> {
        self.cancel_pending();
        self.set_state(SessionState::LoggedIn { view });
        self.activate_queue(QueueKind::for_view(view));
        match view {
            View::Tracks => self.refresh_playlists().await,
            View::Likes => self.refresh_likes().await,
        }
    }

    async fn refresh_playlists(&mut self) -> Result<(), PlayerError> {
        let provider = self.provider()?;
        let playlists = provider.playlists().await?;
        tracing::info!("Loaded {} playlists", playlists.len());
        self.playlists_model.update_data(playlists);
        self.emit(Event::ModelReset(ModelKind::Playlists));
        Ok(())
    }

    async fn refresh_likes(&mut self) -> Result<(), PlayerError> {
        let provider = self.provider()?;
        self.materializer
            .load(
                provider.as_ref(),
                &mut self.likes.list,
                LIKES_LIST,
                ListSource::Likes,
            )
            .await?;
        self.rebind(QueueKind::Likes).await
    }

    async fn select_playlist(&mut self, row: usize) -> Result<(), PlayerError> {
        let provider = self.provider()?;
        let summary = self
            .playlists_model
            .row(row)
            .cloned()
            .ok_or_else(|| out_of_range(row, self.playlists_model.row_count()))?;

        self.materializer
            .load(
                provider.as_ref(),
                &mut self.playlist.list,
                &summary.title,
                ListSource::Playlist { kind: summary.kind },
            )
            .await?;
        self.loaded_playlist = Some(summary.kind);
        self.rebind(QueueKind::Playlist).await?;

        self.set_state(SessionState::LoggedIn { view: View::Tracks });
        self.activate_queue(QueueKind::Playlist);
        Ok(())
    }

    fn select_track(&self, row: usize) -> Result<(), PlayerError> {
        let track = self.row_track(QueueKind::for_view(self.view()), row)?;
        let cover = self.cache.cover_path(track).ok().filter(|p| p.exists());
        self.emit(Event::TrackDetails(TrackDetails::new(track, cover)));
        Ok(())
    }

    fn play_row(&mut self, row: usize) -> Result<(), PlayerError> {
        let kind = QueueKind::for_view(self.view());
        self.slot_mut(kind).queue.seek(row)?;
        self.activate_queue(kind);
        Ok(())
    }

    async fn activate(&mut self, row: usize, column: usize) -> Result<(), PlayerError> {
        let model = match self.view() {
            View::Tracks => &self.tracks_model,
            View::Likes => &self.likes_model,
        };
        let Some((action, row)) = model.activate(row, column) else {
            return Ok(());
        };
        match action {
            TrackAction::Delete => self.delete_row(row).await,
            TrackAction::FindSimilar => self.find_similar(row).await,
            TrackAction::Like => self.like(Some(row)).await,
        }
    }

    async fn delete_row(&mut self, row: usize) -> Result<(), PlayerError> {
        let provider = self.provider()?;
        match self.view() {
            View::Tracks => {
                let title = self.row_track(QueueKind::Playlist, row)?.title.clone();
                let (position, summary) = self
                    .loaded_playlist
                    .and_then(|kind| self.playlists_model.position_of_kind(kind))
                    .and_then(|p| self.playlists_model.row(p).cloned().map(|s| (p, s)))
                    .ok_or_else(|| PlayerError::EmptyResult("Select a playlist first".to_string()))?;

                let update = provider
                    .delete_from_playlist(summary.kind, row, row + 1, summary.revision)
                    .await?;
                tracing::info!(
                    "Playlist '{}' revision {} -> {}",
                    summary.title,
                    summary.revision,
                    update.revision
                );
                self.playlists_model.set_revision(position, update.revision);

                if update.tracks.is_empty() {
                    self.materializer
                        .load(
                            provider.as_ref(),
                            &mut self.playlist.list,
                            &summary.title,
                            ListSource::Playlist { kind: summary.kind },
                        )
                        .await?;
                } else {
                    self.materializer
                        .replace_from_refs(
                            provider.as_ref(),
                            &mut self.playlist.list,
                            &summary.title,
                            update.tracks,
                        )
                        .await?;
                }
                self.rebind(QueueKind::Playlist).await?;
                self.message(MessageLevel::Info, format!("Track '{}' removed", title));
            }
            View::Likes => {
                let track = self.row_track(QueueKind::Likes, row)?.clone();
                if provider.unlike_tracks(&[track.id.clone()]).await? {
                    self.refresh_likes().await?;
                    self.message(MessageLevel::Info, format!("Track '{}' removed", track.title));
                } else {
                    self.message(
                        MessageLevel::Warning,
                        format!("Could not remove '{}' from likes", track.title),
                    );
                }
            }
        }
        Ok(())
    }

    async fn find_similar(&mut self, row: usize) -> Result<(), PlayerError> {
        let provider = self.provider()?;
        let track_id = self
            .row_track(QueueKind::for_view(self.view()), row)?
            .id
            .clone();

        let count = self
            .materializer
            .load_similar(provider.as_ref(), &mut self.similar.list, &track_id)
            .await?;
        self.rebind(QueueKind::Similar).await?;
        self.activate_queue(QueueKind::Similar);
        self.similar.queue.seek(0)?;
        self.message(
            MessageLevel::Info,
            format!("Playing {} tracks similar to {}", count, track_id),
        );
        Ok(())
    }

    async fn like(&mut self, row: Option<usize>) -> Result<(), PlayerError> {
        let provider = self.provider()?;
        let track = match row {
            Some(row) => self
                .row_track(QueueKind::for_view(self.view()), row)?
                .clone(),
            None => self
                .slot(self.active)
                .current_track()
                .cloned()
                .ok_or_else(|| PlayerError::EmptyResult("Nothing is playing".to_string()))?,
        };

        if provider.like_tracks(&[track.id.clone()]).await? {
            self.message(MessageLevel::Info, format!("Track '{}' liked", track.title));
        } else {
            self.message(
                MessageLevel::Warning,
                format!("Could not like '{}'", track.title),
            );
        }
        self.refresh_likes().await
    }

    async fn add_to_playlist(&mut self, target: usize) -> Result<(), PlayerError> {
        let provider = self.provider()?;
        let Some(track) = self.slot(self.active).current_track().cloned() else {
            tracing::debug!("No current track to add");
            return Ok(());
        };
        let summary = self
            .playlists_model
            .row(target)
            .cloned()
            .ok_or_else(|| out_of_range(target, self.playlists_model.row_count()))?;

        if self.active == QueueKind::Playlist && self.loaded_playlist == Some(summary.kind) {
            tracing::debug!("'{}' already comes from '{}'", track.title, summary.title);
            return Ok(());
        }

        let album_id = track
            .first_album()
            .map(|a| a.id.clone())
            .ok_or_else(|| PlayerError::NoAlbum(track.display_name()))?;
        let update = provider
            .insert_into_playlist(summary.kind, 0, &track.id, &album_id, summary.revision)
            .await?;
        self.playlists_model.set_revision(target, update.revision);
        self.message(
            MessageLevel::Info,
            format!("Added '{}' to '{}'", track.title, summary.title),
        );

        if self.loaded_playlist == Some(summary.kind) {
            if update.tracks.is_empty() {
                self.materializer
                    .load(
                        provider.as_ref(),
                        &mut self.playlist.list,
                        &summary.title,
                        ListSource::Playlist { kind: summary.kind },
                    )
                    .await?;
            } else {
                self.materializer
                    .replace_from_refs(
                        provider.as_ref(),
                        &mut self.playlist.list,
                        &summary.title,
                        update.tracks,
                    )
                    .await?;
            }
            self.rebind(QueueKind::Playlist).await?;
        }
        Ok(())
    }

    async fn play(&mut self) -> Result<(), PlayerError> {
        match self.status().await {
            PlaybackStatus::Playing => Ok(()),
            PlaybackStatus::Paused => {
                self.engine.resume()?;
                self.set_status(PlaybackStatus::Playing).await;
                Ok(())
            }
            PlaybackStatus::Stopped => {
                let active = self.active;
                let queue = &mut self.slot_mut(active).queue;
                if queue.is_empty() {
                    return Err(PlayerError::EmptyResult("The queue is empty".to_string()));
                }
                match queue.current_index() {
                    Some(index) => queue.seek(index)?,
                    None => {
                        queue.advance(Direction::Forward);
                    }
                }
                Ok(())
            }
        }
    }

    async fn pause(&mut self) -> Result<(), PlayerError> {
        if self.status().await == PlaybackStatus::Playing {
            self.engine.pause()?;
            self.set_status(PlaybackStatus::Paused).await;
        }
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), PlayerError> {
        self.cancel_pending();
        self.engine.stop()?;
        self.set_status(PlaybackStatus::Stopped).await;
        Ok(())
    }

    fn step(&mut self, direction: Direction) -> bool {
        let active = self.active;
        let moved = self.slot_mut(active).queue.advance(direction);
        if !moved {
            tracing::debug!("{:?} queue cannot move {:?}", active, direction);
        }
        moved
    }

    async fn track_finished(&mut self) -> Result<(), PlayerError> {
        if !self.step(Direction::Forward) {
            self.set_status(PlaybackStatus::Stopped).await;
        }
        Ok(())
    }

    fn set_volume(&mut self, volume: u8) -> Result<(), PlayerError> {
        let volume = volume.min(100);
        self.engine.set_volume(volume)?;
        self.volume = volume;
        Ok(())
    }
}
