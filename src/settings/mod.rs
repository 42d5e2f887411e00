/// The flat JSON settings file holding the session token and window geometry
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;

pub const SETTINGS_FILE: &str = "settings.json";

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("failed to access settings file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed settings file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

fn default_size() -> (u32, u32) {
    (600, 700)
}

/// Contents of the settings file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(rename = "TOKEN", default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default = "default_size")]
    pub size: (u32, u32),
    #[serde(default)]
    pub pos: (i32, i32),
    /// Keys this version does not know about, kept on rewrite
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            token: None,
            size: default_size(),
            pos: (0, 0),
            extra: Map::new(),
        }
    }
}

/// Window geometry persisted on shutdown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub size: (u32, u32),
    pub pos: (i32, i32),
}

/// Serialised access to the settings file
pub struct SettingsStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load settings; a missing file yields defaults
    pub async fn load(&self) -> Result<Settings, SettingsError> {
        let _guard = self.lock.lock().await;
        self.read().await
    }

    /// The stored session token, if any
    pub async fn token(&self) -> Result<Option<String>, SettingsError> {
        Ok(self
            .load()
            .await?
            .token
            .filter(|t| !t.trim().is_empty()))
    }

    /// Read-modify-write under the store lock
    pub async fn update<F>(&self, f: F) -> Result<Settings, SettingsError>
    where
        F: FnOnce(&mut Settings),
    {
        let _guard = self.lock.lock().await;
        let mut settings = self.read().await?;
        f(&mut settings);
        self.write(&settings).await?;
        Ok(settings)
    }

    /// Drop the token, keeping geometry and unknown keys
    pub async fn clear_token(&self) -> Result<(), SettingsError> {
        let _guard = self.lock.lock().await;
        if !fs::try_exists(&self.path).await.unwrap_or(false) {
            return Ok(());
        }
        let mut settings = self.read().await?;
        settings.token = None;
        self.write(&settings).await?;
        tracing::info!("Removed session token from {}", self.path.display());
        Ok(())
    }

    async fn read(&self) -> Result<Settings, SettingsError> {
        let json = match fs::read_to_string(&self.path).await {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No settings file at {}", self.path.display());
                return Ok(Settings::default());
            }
            Err(source) => {
                return Err(SettingsError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        serde_json::from_str(&json).map_err(|source| SettingsError::Parse {
            path: self.path.clone(),
            source,
        })
    }

    async fn write(&self, settings: &Settings) -> Result<(), SettingsError> {
        let io_err = |source| SettingsError::Io {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await.map_err(io_err)?;
        }
        let json = serde_json::to_string(settings).map_err(|source| SettingsError::Parse {
            path: self.path.clone(),
            source,
        })?;
        fs::write(&self.path, json).await.map_err(io_err)?;

        // The file holds a credential
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o600))
                .await
                .map_err(io_err)?;
        }

        tracing::debug!("Saved settings to {}", self.path.display());
        Ok(())
    }
}
