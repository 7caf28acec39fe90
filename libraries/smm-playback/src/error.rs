//! Error types for the player

use smm_sync::SyncError;
use thiserror::Error;

/// Player errors
#[derive(Debug, Error)]
pub enum PlaybackError {
    /// No playlist is loaded
    #[error("No playlist loaded")]
    NoPlaylist,

    /// Playlist file has no songs
    #[error("No songs found in playlist '{0}'")]
    EmptyPlaylist(String),

    /// Song number out of range
    #[error("Index out of bounds: {0}")]
    IndexOutOfBounds(usize),

    /// The media engine rejected a song
    #[error("Media engine error: {0}")]
    Engine(String),

    /// Playlist, cursor or note file error
    #[error(transparent)]
    Sync(#[from] SyncError),

    /// The player task has stopped
    #[error("Player is not running")]
    ChannelClosed,
}

/// Result type for player operations
pub type Result<T> = std::result::Result<T, PlaybackError>;
