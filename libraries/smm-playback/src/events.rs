//! Player commands and events
//!
//! Commands flow into the player task over one channel; events flow out to
//! every subscriber. Nothing else touches the player's state.

use crate::types::{PlayState, PlayerSnapshot};
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

/// Requests handled by the player task
#[derive(Debug)]
pub enum PlayerCommand {
    /// Load a category's playlist at its resume point and start playing
    LoadPlaylist(String),
    Play,
    Pause,
    Next,
    Previous,
    /// Play the n-th song, 1-based
    Jump(usize),
    Seek(u64),
    /// Play the playlist from the first song
    ResetPlaylist,
    /// Append a note about the current song to the category's note buffer
    Note(String),
    SaveState,
    /// The engine reached the end of the current song
    TrackFinished,
    Snapshot(oneshot::Sender<PlayerSnapshot>),
    /// Force idle, save state and stop the task
    Shutdown,
}

/// Events emitted by the player
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlayerEvent {
    StateChanged {
        state: PlayState,
    },

    /// Current song changed
    MetaChanged {
        category: String,
        song: String,
        /// 1-based
        index: usize,
        count: usize,
    },

    /// Periodic position update while playing
    Position {
        position_ms: u64,
    },

    Error {
        message: String,
    },
}
