use crate::models::{format_duration, Track};
use crate::playback::PlaybackStatus;
use crate::presentation::ModelKind;
use std::path::PathBuf;
use std::time::Duration;

/// Tab the user is looking at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Tracks,
    Likes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    LoggedOut,
    LoggedIn { view: View },
}

/// The three queues the controller owns; one of them is active
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueueKind {
    Playlist,
    Likes,
    Similar,
}

impl QueueKind {
    pub const ALL: [QueueKind; 3] = [QueueKind::Playlist, QueueKind::Likes, QueueKind::Similar];

    /// Queue backing a view's table
    pub fn for_view(view: View) -> Self {
        match view {
            View::Tracks => QueueKind::Playlist,
            View::Likes => QueueKind::Likes,
        }
    }

    pub fn model(&self) -> Option<ModelKind> {
        match self {
            QueueKind::Playlist => Some(ModelKind::Tracks),
            QueueKind::Likes => Some(ModelKind::Likes),
            QueueKind::Similar => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageLevel {
    Info,
    Warning,
    Error,
}

/// Details pane contents for a selected row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackDetails {
    pub artists: String,
    pub title: String,
    pub duration: String,
    pub album: String,
    /// Cached artwork, when it has been downloaded
    pub cover: Option<PathBuf>,
}

impl TrackDetails {
    pub fn new(track: &Track, cover: Option<PathBuf>) -> Self {
        Self {
            artists: track.artists_label(),
            title: track.title.clone(),
            duration: format_duration(track.duration_ms),
            album: track.album_label(),
            cover,
        }
    }
}

/// Notifications broadcast to front ends
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    StateChanged(SessionState),
    Message { level: MessageLevel, text: String },
    ModelReset(ModelKind),
    IndexChanged {
        queue: QueueKind,
        index: Option<usize>,
    },
    NowPlaying {
        title: String,
        audio: PathBuf,
        cover: PathBuf,
    },
    TrackDetails(TrackDetails),
    Playback(PlaybackStatus),
    /// Position of the playing track, for the time slider
    Progress {
        position: Duration,
        duration: Option<Duration>,
    },
}
