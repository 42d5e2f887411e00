/// Local asset cache for audio files, covers and list snapshots
use crate::models::{DownloadOption, Track};
use crate::providers::{MusicProvider, ProviderError};
use anyhow::Context;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::fs;
use url::Url;

const TRACKS_DIR: &str = "tracks";
const COVERS_DIR: &str = "covers";
const SNAPSHOT_PREFIX: &str = "tracks_";
const COVER_EXTENSION: &str = "png";

/// Encoding used when the preferred codec is not offered
const FALLBACK_CODEC: &str = "mp3";
const FALLBACK_BITRATE_KBPS: u32 = 192;

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("track {0} has no title or artists")]
    InvalidTrack(String),
    #[error("no downloadable encoding for track {0}")]
    NoDownloadOption(String),
    #[error("'{0}' is not available for download")]
    Unavailable(String),
    #[error(transparent)]
    Remote(#[from] ProviderError),
    #[error("cache I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> CacheError + '_ {
    move |source| CacheError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Pick the encoding to download.
///
/// Highest bitrate of the preferred codec wins; otherwise the mp3/192 variant.
pub fn choose_download<'a>(
    options: &'a [DownloadOption],
    codec: &str,
) -> Option<&'a DownloadOption> {
    options
        .iter()
        .filter(|o| o.codec == codec)
        .max_by_key(|o| o.bitrate_kbps)
        .or_else(|| {
            options
                .iter()
                .find(|o| o.codec == FALLBACK_CODEC && o.bitrate_kbps == FALLBACK_BITRATE_KBPS)
        })
}

/// Keep `name` a single path component
fn single_component(name: &str) -> String {
    name.chars()
        .map(|c| if std::path::is_separator(c) { '_' } else { c })
        .collect()
}

/// Cache key for a track: `"<artists> - <title>"` with path separators replaced
pub fn cache_key(track: &Track) -> Result<String, CacheError> {
    if track.title.trim().is_empty() || track.artists.iter().all(|a| a.trim().is_empty()) {
        return Err(CacheError::InvalidTrack(track.id.clone()));
    }
    Ok(single_component(&track.display_name()))
}

/// Snapshot file name for a list, spaces and path separators replaced by underscores
pub fn snapshot_file_name(list_name: &str) -> String {
    format!(
        "{}{}.json",
        SNAPSHOT_PREFIX,
        single_component(list_name).replace(' ', "_")
    )
}

/// Write `bytes` next to `target` and move them into place
async fn write_atomic(target: &Path, bytes: &[u8]) -> Result<(), CacheError> {
    let file_name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let temp_path = target.with_file_name(format!("{}.{}.part", file_name, uuid::Uuid::new_v4()));

    if let Err(e) = fs::write(&temp_path, bytes).await {
        let _ = fs::remove_file(&temp_path).await;
        return Err(io_error(&temp_path)(e));
    }
    if let Err(e) = fs::rename(&temp_path, target).await {
        let _ = fs::remove_file(&temp_path).await;
        return Err(io_error(target)(e));
    }
    Ok(())
}

/// Remove `<target>.<uuid>.part` files left by interrupted writes
async fn remove_stale_parts(target: &Path) {
    let (Some(dir), Some(name)) = (target.parent(), target.file_name()) else {
        return;
    };
    let prefix = format!("{}.", name.to_string_lossy());
    let Ok(mut entries) = fs::read_dir(dir).await else {
        return;
    };
    while let Ok(Some(entry)) = entries.next_entry().await {
        let file_name = entry.file_name().to_string_lossy().into_owned();
        let stale = file_name
            .strip_prefix(&prefix)
            .and_then(|rest| rest.strip_suffix(".part"))
            .map(|id| uuid::Uuid::parse_str(id).is_ok())
            .unwrap_or(false);
        if !stale {
            continue;
        }
        match fs::remove_file(entry.path()).await {
            Ok(()) => tracing::debug!("Removed stale {}", file_name),
            Err(e) => tracing::warn!("Failed to remove stale {}: {}", file_name, e),
        }
    }
}

type InFlight = Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>;

/// Exclusive hold on one cache key; the map entry goes with the last holder
struct KeySlot<'a> {
    in_flight: &'a InFlight,
    key: String,
    guard: Option<tokio::sync::OwnedMutexGuard<()>>,
}

impl Drop for KeySlot<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        let mut in_flight = self
            .in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let unused = in_flight
            .get(&self.key)
            .map(|lock| Arc::strong_count(lock) == 1)
            .unwrap_or(false);
        if unused {
            in_flight.remove(&self.key);
        }
    }
}

/// Maps tracks to audio and cover files under a cache root
pub struct AssetCache {
    root: PathBuf,
    codec: String,
    /// One lock per cache key so a key is never downloaded twice at once
    in_flight: InFlight,
}

impl AssetCache {
    pub fn new(root: impl Into<PathBuf>, codec: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            codec: codec.into(),
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn codec(&self) -> &str {
        &self.codec
    }

    pub fn tracks_dir(&self) -> PathBuf {
        self.root.join(TRACKS_DIR)
    }

    pub fn covers_dir(&self) -> PathBuf {
        self.root.join(COVERS_DIR)
    }

    pub fn audio_path(&self, track: &Track) -> Result<PathBuf, CacheError> {
        let key = cache_key(track)?;
        Ok(self.tracks_dir().join(format!("{}.{}", key, self.codec)))
    }

    pub fn cover_path(&self, track: &Track) -> Result<PathBuf, CacheError> {
        let key = cache_key(track)?;
        Ok(self.covers_dir().join(format!("{}.{}", key, COVER_EXTENSION)))
    }

    /// `file://` locator of the track's audio file; no I/O
    pub fn locator(&self, track: &Track) -> Result<Url, CacheError> {
        let path = self.audio_path(track)?;
        let absolute = if path.is_absolute() {
            path
        } else {
            std::env::current_dir()
                .map_err(io_error(&path))?
                .join(path)
        };
        Url::from_file_path(&absolute).map_err(|_| CacheError::Io {
            path: absolute.clone(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "not a file path"),
        })
    }

    async fn claim(&self, key: &str) -> KeySlot<'_> {
        let lock = {
            let mut in_flight = self
                .in_flight
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            in_flight
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
                .clone()
        };
        KeySlot {
            in_flight: &self.in_flight,
            key: key.to_string(),
            guard: Some(lock.lock_owned().await),
        }
    }

    /// Make sure the audio and cover files of `track` exist locally.
    ///
    /// Returns `(audio_path, cover_path)`. Existing files are reused without
    /// touching the network. The cover path is returned even when the track
    /// has no artwork to download.
    pub async fn ensure_local(
        &self,
        provider: &dyn MusicProvider,
        track: &Track,
    ) -> Result<(PathBuf, PathBuf), CacheError> {
        let key = cache_key(track)?;
        let audio_path = self.audio_path(track)?;
        let cover_path = self.cover_path(track)?;

        let _slot = self.claim(&key).await;

        if !fs::try_exists(&audio_path).await.unwrap_or(false) {
            if !track.available {
                return Err(CacheError::Unavailable(track.display_name()));
            }
            let tracks_dir = self.tracks_dir();
            fs::create_dir_all(&tracks_dir)
                .await
                .map_err(io_error(&tracks_dir))?;
            remove_stale_parts(&audio_path).await;

            let options = provider.download_options(&track.id).await?;
            let option = choose_download(&options, &self.codec)
                .ok_or_else(|| CacheError::NoDownloadOption(track.id.clone()))?;
            tracing::info!(
                "Downloading track: {} ({} {} kbps)",
                key,
                option.codec,
                option.bitrate_kbps
            );
            let bytes = provider.fetch_audio(option).await?;
            write_atomic(&audio_path, &bytes).await?;
        } else {
            tracing::debug!("Audio cache hit for {}", key);
        }

        if !fs::try_exists(&cover_path).await.unwrap_or(false) {
            if let Some(cover_uri) = &track.cover_uri {
                let covers_dir = self.covers_dir();
                fs::create_dir_all(&covers_dir)
                    .await
                    .map_err(io_error(&covers_dir))?;
                remove_stale_parts(&cover_path).await;
                let bytes = provider.fetch_cover(cover_uri).await?;
                write_atomic(&cover_path, &bytes).await?;
                tracing::debug!("Wrote cover {}", cover_path.display());
            }
        }

        Ok((audio_path, cover_path))
    }

    /// Write the informational list snapshot; never read back by the player
    pub async fn write_snapshot(&self, list_name: &str, entries: &[String]) -> anyhow::Result<()> {
        fs::create_dir_all(&self.root)
            .await
            .context("Failed to create cache directory")?;
        let snapshot = self.root.join(snapshot_file_name(list_name));

        let json = serde_json::to_string(entries).context("Failed to serialize snapshot")?;
        fs::write(&snapshot, json)
            .await
            .with_context(|| format!("Failed to write snapshot: {}", snapshot.display()))?;

        tracing::debug!("Wrote snapshot to {}", snapshot.display());
        Ok(())
    }

    /// Read a snapshot back, for diagnostics
    pub async fn read_snapshot(&self, list_name: &str) -> anyhow::Result<Option<Vec<String>>> {
        let snapshot = self.root.join(snapshot_file_name(list_name));
        if !fs::try_exists(&snapshot).await.unwrap_or(false) {
            return Ok(None);
        }
        let json = fs::read_to_string(&snapshot)
            .await
            .with_context(|| format!("Failed to read snapshot: {}", snapshot.display()))?;
        let entries = serde_json::from_str(&json).context("Failed to deserialize snapshot")?;
        Ok(Some(entries))
    }

    /// Delete everything under the cache root
    pub async fn purge(&self) -> Result<(), CacheError> {
        match fs::remove_dir_all(&self.root).await {
            Ok(()) => {
                tracing::info!("Purged cache at {}", self.root.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error(&self.root)(e)),
        }
    }
}
