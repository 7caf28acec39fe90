//! Media engine abstraction
//!
//! The decoder and audio output live outside this crate; the player only
//! drives them through [`MediaEngine`].

use crate::error::Result;
use std::path::Path;

/// Playback engine for one song at a time.
#[cfg_attr(test, mockall::automock)]
pub trait MediaEngine: Send {
    /// Stop whatever is loaded and prepare `path`, positioned at 0.
    fn load(&mut self, path: &Path) -> Result<()>;

    fn play(&mut self);

    fn pause(&mut self);

    /// Stop and release the loaded song.
    fn reset(&mut self);

    fn seek(&mut self, position_ms: u64);

    fn position_ms(&self) -> u64;
}
