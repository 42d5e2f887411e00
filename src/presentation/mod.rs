/// Read-only tabular projections bound by a front end
use crate::models::PlaylistSummary;
use crate::playback::PlaybackQueue;
use url::Url;

/// Which model a reset notification refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelKind {
    Playlists,
    Tracks,
    Likes,
}

/// Action hosted by a button column of a track table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackAction {
    Delete,
    FindSimilar,
    Like,
}

/// Content of one table cell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cell<'a> {
    Title(&'a str),
    Action(TrackAction),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellFlags {
    pub selectable: bool,
    /// Hosts an always-open button editor
    pub editable: bool,
}

/// Playlist catalog: one row per playlist, one display column
#[derive(Debug, Default)]
pub struct PlaylistListModel {
    rows: Vec<PlaylistSummary>,
}

impl PlaylistListModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fully replace the underlying data
    pub fn update_data(&mut self, playlists: Vec<PlaylistSummary>) {
        self.rows = playlists;
    }

    pub fn clear(&mut self) {
        self.rows.clear();
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn data(&self, row: usize) -> Option<&str> {
        self.rows.get(row).map(|p| p.title.as_str())
    }

    pub fn row(&self, row: usize) -> Option<&PlaylistSummary> {
        self.rows.get(row)
    }

    pub fn rows(&self) -> &[PlaylistSummary] {
        &self.rows
    }

    /// Store the revision the server returned for a playlist
    pub fn set_revision(&mut self, row: usize, revision: u64) {
        if let Some(playlist) = self.rows.get_mut(row) {
            playlist.revision = revision;
        }
    }

    pub fn position_of(&self, title: &str) -> Option<usize> {
        self.rows.iter().position(|p| p.title == title)
    }

    pub fn position_of_kind(&self, kind: u64) -> Option<usize> {
        self.rows.iter().position(|p| p.kind == kind)
    }
}

/// Display title derived from a locator: file name without its extension
pub fn title_from_locator(locator: &Url) -> String {
    locator
        .to_file_path()
        .ok()
        .and_then(|p| p.file_stem().map(|s| s.to_string_lossy().into_owned()))
        .unwrap_or_default()
}

/// Track table mirroring a playback queue.
///
/// Columns `0..n-1` are action slots in the order given at construction; the
/// last column is the display title.
#[derive(Debug)]
pub struct TrackTableModel {
    actions: Vec<TrackAction>,
    titles: Vec<String>,
}

impl TrackTableModel {
    pub fn new(actions: Vec<TrackAction>) -> Self {
        Self {
            actions,
            titles: Vec::new(),
        }
    }

    /// Table for playlist tracks: delete, radio, like
    pub fn for_playlist() -> Self {
        Self::new(vec![
            TrackAction::Delete,
            TrackAction::FindSimilar,
            TrackAction::Like,
        ])
    }

    /// Table for liked tracks: delete, radio
    pub fn for_likes() -> Self {
        Self::new(vec![TrackAction::Delete, TrackAction::FindSimilar])
    }

    /// Re-project the whole queue
    pub fn reset(&mut self, queue: &PlaybackQueue) {
        self.titles = queue.locators().iter().map(title_from_locator).collect();
    }

    pub fn clear(&mut self) {
        self.titles.clear();
    }

    pub fn row_count(&self) -> usize {
        self.titles.len()
    }

    pub fn column_count(&self) -> usize {
        self.actions.len() + 1
    }

    pub fn title_column(&self) -> usize {
        self.actions.len()
    }

    pub fn data(&self, row: usize, column: usize) -> Option<Cell<'_>> {
        let title = self.titles.get(row)?;
        if column == self.title_column() {
            Some(Cell::Title(title))
        } else {
            self.actions.get(column).copied().map(Cell::Action)
        }
    }

    pub fn flags(&self, column: usize) -> CellFlags {
        CellFlags {
            selectable: true,
            editable: column < self.title_column(),
        }
    }

    /// Map a button press to the bound action; `None` for the title column
    pub fn activate(&self, row: usize, column: usize) -> Option<(TrackAction, usize)> {
        if row >= self.titles.len() {
            return None;
        }
        self.actions.get(column).map(|action| (*action, row))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::AssetCache;
    use crate::testing::track;

    fn playlist(title: &str, kind: u64, revision: u64) -> PlaylistSummary {
        PlaylistSummary {
            title: title.to_string(),
            kind,
            revision,
            track_count: 0,
        }
    }

    #[test]
    fn test_playlist_model_rows() {
        let mut model = PlaylistListModel::new();
        model.update_data(vec![playlist("Road", 3, 10), playlist("Gym", 4, 2)]);

        assert_eq!(model.row_count(), 2);
        assert_eq!(model.data(1), Some("Gym"));
        assert_eq!(model.data(2), None);
        assert_eq!(model.position_of("Road"), Some(0));
        assert_eq!(model.position_of_kind(4), Some(1));
        assert_eq!(model.position_of_kind(9), None);

        model.set_revision(0, 11);
        assert_eq!(model.row(0).unwrap().revision, 11);
    }

    #[test]
    fn test_track_table_projects_queue() {
        let dir = tempfile::tempdir().unwrap();
        let cache = AssetCache::new(dir.path(), "mp3");
        let mut queue = PlaybackQueue::new(false);
        queue
            .set_source(
                &[
                    track("1", &["A", "B"], "First"),
                    track("2", &["C"], "Mr. Second"),
                ],
                &cache,
            )
            .unwrap();

        let mut model = TrackTableModel::for_playlist();
        model.reset(&queue);

        assert_eq!(model.row_count(), queue.len());
        assert_eq!(model.column_count(), 4);
        assert_eq!(model.data(0, 3), Some(Cell::Title("A, B - First")));
        assert_eq!(model.data(1, 3), Some(Cell::Title("C - Mr. Second")));
        assert_eq!(model.data(0, 0), Some(Cell::Action(TrackAction::Delete)));
        assert_eq!(model.data(0, 2), Some(Cell::Action(TrackAction::Like)));
        assert_eq!(model.data(2, 0), None);
    }

    #[test]
    fn test_only_title_column_is_plain() {
        let model = TrackTableModel::for_likes();
        assert_eq!(model.column_count(), 3);
        assert!(model.flags(0).editable);
        assert!(model.flags(1).editable);
        assert!(!model.flags(2).editable);
    }

    #[test]
    fn test_activate_dispatches_by_position() {
        let dir = tempfile::tempdir().unwrap();
        let cache = AssetCache::new(dir.path(), "mp3");
        let mut queue = PlaybackQueue::new(false);
        queue
            .set_source(&[track("1", &["A"], "One")], &cache)
            .unwrap();
        let mut model = TrackTableModel::for_likes();
        model.reset(&queue);

        assert_eq!(model.activate(0, 1), Some((TrackAction::FindSimilar, 0)));
        assert_eq!(model.activate(0, 2), None);
        assert_eq!(model.activate(5, 0), None);
    }
}
