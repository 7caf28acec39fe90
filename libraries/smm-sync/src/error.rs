use smm_client::ClientError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during sync operations
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Server client error: {0}")]
    Client(#[from] ClientError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The playlist of a category cannot be read; the caller should skip
    /// that category for this cycle.
    #[error("cannot read playlist '{}': {source}", path.display())]
    PlaylistUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Position cache error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid category name: {0:?}")]
    InvalidCategory(String),
}

pub type Result<T> = std::result::Result<T, SyncError>;
