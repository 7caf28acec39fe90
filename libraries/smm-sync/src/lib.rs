//! Keeps a device's playlists and song storage in step with an smm server.
//!
//! Per category this crate downloads new songs into `P/<category>/` and
//! appends them to `P/<category>.m3u`, prunes playlist lines the player has
//! moved past, deletes song files the playlist no longer mentions, keeps the
//! playback cursor, and uploads the listener's notes.

mod cleaner;
mod cursor;
mod download_log;
mod error;
mod manager;
mod notes;
mod playlist;
mod reconciler;
mod scanner;
mod types;

// Public exports
pub use cleaner::{membership_key, EntryKind, Janitor, LocalTree, StorageTree, TreeEntry};
pub use cursor::{
    position_key, resolve_resume_point, Cursor, CursorStore, FileCursorStore,
    LocalPositionCache, PortableCursorRepository, ResumePoint,
};
pub use download_log::{DownloadLog, LogWriter, ROTATE_AFTER};
pub use error::{Result, SyncError};
pub use manager::SyncManager;
pub use notes::{NoteBuffer, NoteUploader};
pub use playlist::{read_playlist, songs, write_playlist};
pub use reconciler::{fetch_and_merge_songs, prune_consumed, songs_remaining};
pub use scanner::{mime_type_for_file, LoggingScanner, MediaScanner};
pub use types::{BatchOutcome, Category, DownloadPlan, Layout, SyncSummary};
