use crate::cache::{AssetCache, CacheError};
use crate::models::Track;
use tokio::sync::watch;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    #[error("index {index} out of range for queue of {len}")]
    OutOfRange { index: usize, len: usize },
}

/// Navigation direction for [`PlaybackQueue::advance`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

/// Sequential queue of cache locators with a cursor.
///
/// The cursor is `None` until something is selected. Every cursor change is
/// published on a watch channel; subscribers resolve the newly current track
/// lazily.
#[derive(Debug)]
pub struct PlaybackQueue {
    locators: Vec<Url>,
    current: Option<usize>,
    wraparound: bool,
    index_tx: watch::Sender<Option<usize>>,
}

impl PlaybackQueue {
    pub fn new(wraparound: bool) -> Self {
        let (index_tx, _) = watch::channel(None);
        Self {
            locators: Vec::new(),
            current: None,
            wraparound,
            index_tx,
        }
    }

    /// Replace the queue contents with one locator per track, in order
    pub fn set_source(&mut self, tracks: &[Track], cache: &AssetCache) -> Result<(), CacheError> {
        let locators = tracks
            .iter()
            .map(|t| cache.locator(t))
            .collect::<Result<Vec<_>, _>>()?;
        self.locators = locators;
        self.set_current(None);
        Ok(())
    }

    /// Like [`set_source`](Self::set_source), but the cursor follows the
    /// current locator to its new position.
    ///
    /// Returns the new index, or `None` when nothing was current or the
    /// current locator is gone.
    pub fn rebase(
        &mut self,
        tracks: &[Track],
        cache: &AssetCache,
    ) -> Result<Option<usize>, CacheError> {
        let current = self.current.and_then(|i| self.locators.get(i).cloned());
        self.set_source(tracks, cache)?;
        let Some(current) = current else {
            return Ok(None);
        };
        let index = self.locators.iter().position(|l| *l == current);
        if index.is_some() {
            self.current = index;
            self.index_tx.send_replace(index);
        }
        Ok(index)
    }

    pub fn clear(&mut self) {
        self.locators.clear();
        self.set_current(None);
    }

    pub fn len(&self) -> usize {
        self.locators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locators.is_empty()
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current
    }

    pub fn locator(&self, index: usize) -> Option<&Url> {
        self.locators.get(index)
    }

    pub fn locators(&self) -> &[Url] {
        &self.locators
    }

    pub fn wraparound(&self) -> bool {
        self.wraparound
    }

    /// Observe cursor changes
    pub fn subscribe(&self) -> watch::Receiver<Option<usize>> {
        self.index_tx.subscribe()
    }

    /// Move the cursor to `index`.
    ///
    /// Out-of-range indices are rejected and leave the cursor alone. Seeking
    /// to the current index re-notifies so the track restarts.
    pub fn seek(&mut self, index: usize) -> Result<(), QueueError> {
        if index >= self.locators.len() {
            return Err(QueueError::OutOfRange {
                index,
                len: self.locators.len(),
            });
        }
        self.current = Some(index);
        self.index_tx.send_replace(self.current);
        Ok(())
    }

    /// Step the cursor; returns whether it moved.
    ///
    /// Without wraparound the cursor stays put at either end.
    pub fn advance(&mut self, direction: Direction) -> bool {
        let len = self.locators.len();
        if len == 0 {
            return false;
        }
        let next = match (direction, self.current) {
            (Direction::Forward, None) => Some(0),
            (Direction::Backward, None) => Some(len - 1),
            (Direction::Forward, Some(i)) if i + 1 < len => Some(i + 1),
            (Direction::Forward, Some(_)) if self.wraparound => Some(0),
            (Direction::Backward, Some(i)) if i > 0 => Some(i - 1),
            (Direction::Backward, Some(_)) if self.wraparound => Some(len - 1),
            _ => None,
        };
        match next {
            Some(index) if Some(index) != self.current || self.wraparound => {
                self.current = Some(index);
                self.index_tx.send_replace(self.current);
                true
            }
            _ => false,
        }
    }

    fn set_current(&mut self, current: Option<usize>) {
        if self.current != current {
            self.current = current;
            self.index_tx.send_replace(current);
        }
    }
}

impl Default for PlaybackQueue {
    fn default() -> Self {
        Self::new(false)
    }
}
