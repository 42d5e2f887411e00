/// Data models shared by the provider, cache, queue and controller layers
use serde::{Deserialize, Serialize};

/// Album a track belongs to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Album {
    pub id: String,
    pub title: String,
    pub year: Option<i32>,
}

/// A fully resolved track record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    pub id: String,
    pub title: String,
    pub artists: Vec<String>,
    pub duration_ms: u64,
    pub albums: Vec<Album>,
    /// Artwork URI template, `%%` stands for the requested size
    pub cover_uri: Option<String>,
    pub available: bool,
}

impl Track {
    /// Artist names joined the way they appear in file names and labels
    pub fn artists_label(&self) -> String {
        self.artists.join(", ")
    }

    /// `"<artists> - <title>"`
    pub fn display_name(&self) -> String {
        format!("{} - {}", self.artists_label(), self.title)
    }

    pub fn first_album(&self) -> Option<&Album> {
        self.albums.first()
    }

    /// Album line shown in the details pane, e.g. `"Discovery [2001]"`
    pub fn album_label(&self) -> String {
        match self.first_album() {
            Some(Album {
                title,
                year: Some(year),
                ..
            }) => format!("{} [{}]", title, year),
            Some(album) => album.title.clone(),
            None => String::new(),
        }
    }
}

/// A reference to a track as returned by list endpoints.
///
/// Stubs carry only identity and must be resolved before they enter any
/// locally held list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackRef {
    Full(Track),
    Stub {
        track_id: String,
        album_id: Option<String>,
    },
}

impl TrackRef {
    pub fn track_id(&self) -> &str {
        match self {
            TrackRef::Full(track) => &track.id,
            TrackRef::Stub { track_id, .. } => track_id,
        }
    }

    /// Identifier in the `<track>:<album>` form the batch endpoint accepts
    pub fn lookup_id(&self) -> String {
        match self {
            TrackRef::Full(track) => match track.first_album() {
                Some(album) => format!("{}:{}", track.id, album.id),
                None => track.id.clone(),
            },
            TrackRef::Stub {
                track_id,
                album_id: Some(album_id),
            } => format!("{}:{}", track_id, album_id),
            TrackRef::Stub { track_id, .. } => track_id.clone(),
        }
    }
}

/// One row of the playlist catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistSummary {
    pub title: String,
    pub kind: u64,
    /// Server-assigned optimistic-concurrency token
    pub revision: u64,
    pub track_count: usize,
}

/// Server answer to a playlist mutation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistUpdate {
    pub revision: u64,
    pub tracks: Vec<TrackRef>,
}

/// Identity returned by the account check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub uid: u64,
    pub login: String,
    pub full_name: String,
    pub email: Option<String>,
}

impl Account {
    /// Text for the account corner label: `"Full Name | mail@example.com"`
    pub fn label(&self) -> String {
        match &self.email {
            Some(email) => format!("{} | {}", self.full_name, email),
            None => self.full_name.clone(),
        }
    }
}

/// One available encoding of a track
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadOption {
    pub codec: String,
    pub bitrate_kbps: u32,
    pub info_url: String,
}

/// Format milliseconds as `m:ss`
pub fn format_duration(ms: u64) -> String {
    format!("{}:{:02}", ms / 60_000, ms % 60_000 / 1_000)
}
