use std::path::PathBuf;

use thiserror::Error;

use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("unexpected response payload: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("invalid bearer token: {0}")]
    InvalidToken(String),
    #[error("failed to read '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid image: {0}")]
    InvalidImage(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ClientError {
    /// Network-level failures, as opposed to payloads the client could not
    /// make sense of.
    pub fn is_transport(&self) -> bool {
        matches!(self, ClientError::Transport(_))
    }
}
