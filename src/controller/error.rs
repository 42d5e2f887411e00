use crate::cache::CacheError;
use crate::library::LoadError;
use crate::playback::{EngineError, QueueError};
use crate::providers::ProviderError;
use crate::settings::SettingsError;

use super::event::MessageLevel;

/// Everything a command can fail with.
///
/// None of these escape [`super::Controller::handle`]; each becomes a single
/// message event.
#[derive(Debug, thiserror::Error)]
pub enum PlayerError {
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error(transparent)]
    Remote(#[from] ProviderError),
    #[error("you are not logged in")]
    NotLoggedIn,
    #[error("{0}")]
    EmptyResult(String),
    #[error("track '{0}' has no album")]
    NoAlbum(String),
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error(transparent)]
    Queue(#[from] QueueError),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Settings(#[from] SettingsError),
}

impl PlayerError {
    pub fn level(&self) -> MessageLevel {
        match self {
            PlayerError::EmptyResult(_) => MessageLevel::Info,
            _ => MessageLevel::Error,
        }
    }
}

impl From<LoadError> for PlayerError {
    fn from(e: LoadError) -> Self {
        match e {
            LoadError::Remote(e) => PlayerError::Remote(e),
            LoadError::Empty => PlayerError::EmptyResult("No similar tracks found".to_string()),
        }
    }
}

/// Login failures caused by the token itself are authentication errors
pub(crate) fn auth_error(e: ProviderError) -> PlayerError {
    match e {
        ProviderError::Unauthorized(reason) => PlayerError::Auth(reason),
        other => PlayerError::Remote(other),
    }
}
