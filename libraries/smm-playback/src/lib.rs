//! Player for smm playlists
//!
//! A single state machine owns the loaded playlist and the current song.
//! Other components talk to it through [`PlayerCommand`]s sent over a
//! channel and observe it through [`PlayerEvent`]s; they never share its
//! state. Playback itself is delegated to a [`MediaEngine`].
//!
//! # Example
//!
//! ```ignore
//! use smm_playback::{Player, PlayerCommand, PlayerConfig, PlayerHandle};
//!
//! let mut player = Player::new(engine, cursor_store, PlayerConfig::default());
//! player.restore()?;
//!
//! let handle = PlayerHandle::spawn(player);
//! handle.send(PlayerCommand::Play).await?;
//! handle.send(PlayerCommand::Note("great bass line".into())).await?;
//! handle.shutdown().await?;
//! ```

mod engine;
mod error;
mod events;
mod player;
mod types;

pub use engine::MediaEngine;
pub use error::{PlaybackError, Result};
pub use events::{PlayerCommand, PlayerEvent};
pub use player::{Player, PlayerHandle};
pub use types::{PlayState, PlayerConfig, PlayerSnapshot};
