/// Configuration management
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::providers::yandex::DEFAULT_BASE_URL;
use crate::settings::SETTINGS_FILE;

const APP_DIR: &str = "yaplayer";
const CONFIG_FILE: &str = "config.toml";
const ENV_PREFIX: &str = "YAPLAYER";

/// Application configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,
    pub client: ClientConfig,
    pub cache: CacheConfig,
    pub playback: PlaybackConfig,
}

/// General application settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level (error, warn, info, debug, trace)
    pub log_level: String,
    /// Settings file holding the token and window geometry
    pub settings_path: Option<PathBuf>,
}

/// Music service client settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub base_url: String,
    /// Preferred audio codec; also the extension of cached audio files
    pub codec: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Cache root; the platform cache directory when unset
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Wrap around at either end of a queue
    pub wraparound: bool,
    /// Initial volume in percent
    pub volume: u8,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            settings_path: None,
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            codec: "mp3".to_string(),
        }
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            wraparound: false,
            volume: 100,
        }
    }
}

impl Config {
    /// `path`, or the default location when `None`
    pub fn resolve_path(path: Option<&Path>) -> anyhow::Result<PathBuf> {
        match path {
            Some(path) => Ok(path.to_path_buf()),
            None => Self::default_path(),
        }
    }

    /// Write a default config file unless one exists; returns whether it did
    pub fn create_default_if_missing(path: &Path) -> anyhow::Result<bool> {
        if path.exists() {
            return Ok(false);
        }
        Self::default().save(path)?;
        Ok(true)
    }

    /// Load configuration from `path` (or the default location), creating
    /// a default file on first run. `YAPLAYER__SECTION__KEY` variables
    /// override file values.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let config_path = Self::resolve_path(path)?;
        Self::create_default_if_missing(&config_path)?;

        let config = ::config::Config::builder()
            .add_source(::config::File::from(config_path.as_path()).required(false))
            .add_source(
                ::config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("Failed to read config: {}", config_path.display()))?;

        config
            .try_deserialize()
            .with_context(|| format!("Invalid config: {}", config_path.display()))
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config: {}", path.display()))?;
        Ok(())
    }

    /// Get configuration directory path
    pub fn config_dir() -> anyhow::Result<PathBuf> {
        dirs::config_dir()
            .map(|dir| dir.join(APP_DIR))
            .context("Could not determine config directory")
    }

    pub fn default_path() -> anyhow::Result<PathBuf> {
        Ok(Self::config_dir()?.join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> anyhow::Result<PathBuf> {
        match &self.cache.dir {
            Some(dir) => Ok(dir.clone()),
            None => dirs::cache_dir()
                .map(|dir| dir.join(APP_DIR))
                .context("Could not determine cache directory"),
        }
    }

    pub fn settings_path(&self) -> anyhow::Result<PathBuf> {
        match &self.general.settings_path {
            Some(path) => Ok(path.clone()),
            None => Ok(Self::config_dir()?.join(SETTINGS_FILE)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_first_load_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE);

        let config = Config::load(Some(&path)).unwrap();

        assert_eq!(config, Config::default());
        assert!(path.exists());
        let written: Config = toml::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written, Config::default());
    }

    #[test]
    fn test_default_file_is_created_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);

        assert!(Config::create_default_if_missing(&path).unwrap());
        std::fs::write(&path, "[client]\ncodec = \"aac\"\n").unwrap();
        assert!(!Config::create_default_if_missing(&path).unwrap());
        assert!(std::fs::read_to_string(&path).unwrap().contains("aac"));
    }

    #[test]
    #[serial]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "[client]\ncodec = \"aac\"\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();

        assert_eq!(config.client.codec, "aac");
        assert_eq!(config.client.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.playback.volume, 100);
    }

    #[test]
    #[serial]
    fn test_environment_overrides_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "[playback]\nwraparound = false\n").unwrap();

        std::env::set_var("YAPLAYER__PLAYBACK__WRAPAROUND", "true");
        std::env::set_var("YAPLAYER__GENERAL__LOG_LEVEL", "debug");
        let config = Config::load(Some(&path));
        std::env::remove_var("YAPLAYER__PLAYBACK__WRAPAROUND");
        std::env::remove_var("YAPLAYER__GENERAL__LOG_LEVEL");

        let config = config.unwrap();
        assert!(config.playback.wraparound);
        assert_eq!(config.general.log_level, "debug");
    }

    #[test]
    fn test_explicit_paths_win() {
        let mut config = Config::default();
        config.cache.dir = Some(PathBuf::from("/tmp/yaplayer-cache"));
        config.general.settings_path = Some(PathBuf::from("/tmp/settings.json"));

        assert_eq!(
            config.cache_dir().unwrap(),
            PathBuf::from("/tmp/yaplayer-cache")
        );
        assert_eq!(
            config.settings_path().unwrap(),
            PathBuf::from("/tmp/settings.json")
        );
    }
}
