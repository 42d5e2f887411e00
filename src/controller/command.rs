use super::event::View;
use crate::settings::Geometry;

/// User-facing actions handled by the controller
#[derive(Clone, PartialEq)]
pub enum Command {
    /// Log in with the given token, or the stored one
    Login { token: Option<String> },
    Logout,
    SelectTab(View),
    SelectPlaylist(usize),
    RefreshPlaylists,
    RefreshLikes,
    SelectTrack(usize),
    /// Double-click on a row of the current view
    PlayRow(usize),
    /// Button press in an action column of the current view
    Activate { row: usize, column: usize },
    DeleteRow(usize),
    FindSimilar(usize),
    /// Like a row of the current view, or the current track when `None`
    Like(Option<usize>),
    /// Insert the current track into the playlist at this catalog row
    AddToPlaylist { target: usize },
    Play,
    Pause,
    Stop,
    Next,
    Previous,
    SeekPosition(u64),
    SetVolume(u8),
    /// The engine reached the end of the current file
    TrackFinished,
    Shutdown { geometry: Option<Geometry> },
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Login { .. } => "login",
            Command::Logout => "logout",
            Command::SelectTab(_) => "select_tab",
            Command::SelectPlaylist(_) => "select_playlist",
            Command::RefreshPlaylists => "refresh_playlists",
            Command::RefreshLikes => "refresh_likes",
            Command::SelectTrack(_) => "select_track",
            Command::PlayRow(_) => "play_row",
            Command::Activate { .. } => "activate",
            Command::DeleteRow(_) => "delete_row",
            Command::FindSimilar(_) => "find_similar",
            Command::Like(_) => "like",
            Command::AddToPlaylist { .. } => "add_to_playlist",
            Command::Play => "play",
            Command::Pause => "pause",
            Command::Stop => "stop",
            Command::Next => "next",
            Command::Previous => "previous",
            Command::SeekPosition(_) => "seek_position",
            Command::SetVolume(_) => "set_volume",
            Command::TrackFinished => "track_finished",
            Command::Shutdown { .. } => "shutdown",
        }
    }
}

// Tokens stay out of logs
impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Command::Login { token } => f
                .debug_struct("Login")
                .field("token", &token.as_ref().map(|_| "<redacted>"))
                .finish(),
            Command::Activate { row, column } => f
                .debug_struct("Activate")
                .field("row", row)
                .field("column", column)
                .finish(),
            Command::AddToPlaylist { target } => {
                f.debug_struct("AddToPlaylist").field("target", target).finish()
            }
            Command::SelectTab(view) => f.debug_tuple("SelectTab").field(view).finish(),
            Command::SelectPlaylist(row)
            | Command::SelectTrack(row)
            | Command::PlayRow(row)
            | Command::DeleteRow(row)
            | Command::FindSimilar(row) => f.debug_tuple(self.name()).field(row).finish(),
            Command::Like(row) => f.debug_tuple("Like").field(row).finish(),
            Command::SeekPosition(ms) => f.debug_tuple("SeekPosition").field(ms).finish(),
            Command::SetVolume(v) => f.debug_tuple("SetVolume").field(v).finish(),
            Command::Shutdown { geometry } => {
                f.debug_struct("Shutdown").field("geometry", geometry).finish()
            }
            _ => f.write_str(self.name()),
        }
    }
}
