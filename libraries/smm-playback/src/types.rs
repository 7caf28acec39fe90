use serde::{Deserialize, Serialize};

/// Player state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayState {
    /// Nothing loaded in the engine
    Idle,
    Playing,
    Paused,
}

/// Player configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerConfig {
    /// `Previous` restarts the current song when it has played longer than this
    pub previous_threshold_ms: u64,
    /// Interval of `Position` events while playing
    pub position_interval_ms: u64,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            previous_threshold_ms: 5_000,
            position_interval_ms: 1_000,
        }
    }
}

/// Point-in-time view of the player
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    pub state: PlayState,
    pub category: Option<String>,
    pub song: Option<String>,
    /// 0-based position in the playlist
    pub index: Option<usize>,
    pub count: usize,
    pub position_ms: u64,
}
