/// Materialization of remote track lists into locally held lists
use crate::cache::AssetCache;
use crate::models::{Track, TrackRef};
use crate::providers::{MusicProvider, ProviderError};
use std::collections::HashMap;
use std::sync::Arc;

pub const LIKES_LIST: &str = "likes";
pub const SIMILAR_LIST: &str = "similar";

/// Where a list's references come from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListSource {
    Likes,
    Playlist { kind: u64 },
}

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error(transparent)]
    Remote(#[from] ProviderError),
    #[error("no similar tracks found")]
    Empty,
}

/// Locally held, fully resolved track list
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MaterializedList {
    pub name: String,
    pub tracks: Vec<Track>,
}

impl MaterializedList {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tracks: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Track> {
        self.tracks.get(index)
    }

    pub fn clear(&mut self) {
        self.tracks.clear();
    }

    /// `"<artists> - <title>"` for every track, in order
    pub fn display_names(&self) -> Vec<String> {
        self.tracks.iter().map(Track::display_name).collect()
    }
}

/// Resolve references to full tracks, keeping server order.
///
/// All stubs go out in one batch request; nothing is returned unless every
/// stub came back.
pub async fn resolve_refs(
    provider: &dyn MusicProvider,
    refs: Vec<TrackRef>,
) -> Result<Vec<Track>, ProviderError> {
    let stub_ids: Vec<String> = refs
        .iter()
        .filter(|r| matches!(r, TrackRef::Stub { .. }))
        .map(TrackRef::lookup_id)
        .collect();

    let fetched: HashMap<String, Track> = if stub_ids.is_empty() {
        HashMap::new()
    } else {
        tracing::debug!("Resolving {} short track references", stub_ids.len());
        provider
            .fetch_tracks(&stub_ids)
            .await?
            .into_iter()
            .map(|t| (t.id.clone(), t))
            .collect()
    };

    refs.into_iter()
        .map(|r| match r {
            TrackRef::Full(track) => Ok(track),
            TrackRef::Stub { track_id, .. } => fetched
                .get(&track_id)
                .cloned()
                .ok_or_else(|| {
                    ProviderError::Decode(format!("track {} was not returned", track_id))
                }),
        })
        .collect()
}

/// Loads lists from the provider and snapshots them into the cache directory
#[derive(Clone)]
pub struct Materializer {
    cache: Arc<AssetCache>,
}

impl Materializer {
    pub fn new(cache: Arc<AssetCache>) -> Self {
        Self { cache }
    }

    /// Replace `list` with the tracks of `source`.
    ///
    /// On error `list` keeps its previous contents.
    pub async fn load(
        &self,
        provider: &dyn MusicProvider,
        list: &mut MaterializedList,
        name: &str,
        source: ListSource,
    ) -> Result<(), ProviderError> {
        let refs = match source {
            ListSource::Likes => provider.liked_tracks().await?,
            ListSource::Playlist { kind } => provider.playlist_tracks(kind).await?,
        };
        self.replace_from_refs(provider, list, name, refs).await
    }

    /// Resolve `refs` and replace `list` with them
    pub async fn replace_from_refs(
        &self,
        provider: &dyn MusicProvider,
        list: &mut MaterializedList,
        name: &str,
        refs: Vec<TrackRef>,
    ) -> Result<(), ProviderError> {
        let tracks = resolve_refs(provider, refs).await?;
        self.replace(list, name, tracks).await;
        Ok(())
    }

    /// Fill the similar-tracks list; an empty answer leaves it untouched
    pub async fn load_similar(
        &self,
        provider: &dyn MusicProvider,
        list: &mut MaterializedList,
        track_id: &str,
    ) -> Result<usize, LoadError> {
        let tracks = provider.similar_tracks(track_id).await?;
        if tracks.is_empty() {
            return Err(LoadError::Empty);
        }
        let count = tracks.len();
        self.replace(list, SIMILAR_LIST, tracks).await;
        Ok(count)
    }

    async fn replace(&self, list: &mut MaterializedList, name: &str, tracks: Vec<Track>) {
        list.name = name.to_string();
        list.tracks = tracks;
        tracing::info!("Loaded {} tracks into '{}'", list.len(), name);

        if let Err(e) = self.cache.write_snapshot(name, &list.display_names()).await {
            tracing::warn!("Failed to write snapshot for '{}': {:#}", name, e);
        }
    }
}
