use serde::{Serialize, Deserialize};
use thiserror::Error;
use crate::cache::CacheError;
use crate::pubsub::PubSubError;
use crate::storage::StorageError;
use crate::uploader::UploadError;

/// Errors returned to callers of [`GameManager`](crate::game_manager::GameManager).
///
/// Collaborator failures collapse into `Internal` after being logged, so no
/// infrastructure detail reaches the caller.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("Something went wrong")]
    Internal,
}

impl GameError {
    pub fn not_found(msg: &str) -> Self {
        GameError::NotFound(msg.to_string())
    }

    pub fn bad_request(msg: &str) -> Self {
        GameError::BadRequest(msg.to_string())
    }
}

pub type Result<T> = core::result::Result<T, GameError>;

impl From<StorageError> for GameError {
    fn from(err: StorageError) -> Self {
        tracing::error!(error = %err, "game store failure");
        GameError::Internal
    }
}

impl From<CacheError> for GameError {
    fn from(err: CacheError) -> Self {
        tracing::error!(error = %err, "puzzle cache failure");
        GameError::Internal
    }
}

impl From<PubSubError> for GameError {
    fn from(err: PubSubError) -> Self {
        tracing::error!(error = %err, "pubsub failure");
        GameError::Internal
    }
}

impl From<UploadError> for GameError {
    fn from(err: UploadError) -> Self {
        tracing::error!(error = %err, "image upload failure");
        GameError::Internal
    }
}
