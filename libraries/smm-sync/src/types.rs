use crate::error::{Result, SyncError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// A named music collection, e.g. "vocal" or "instrumental".
///
/// The name is used verbatim in file names, so it must be a single path
/// component.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Category(String);

impl Category {
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let trimmed = name.trim();
        if trimmed.is_empty()
            || trimmed != name
            || name == "."
            || name == ".."
            || name.contains(['/', '\\'])
        {
            return Err(SyncError::InvalidCategory(name));
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Category {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Category {
    type Error = SyncError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Category> for String {
    fn from(value: Category) -> Self {
        value.0
    }
}

/// Where the files of every category live on disk.
///
/// `playlist_root` holds `<category>.m3u` and the song tree `<category>/`;
/// `smm_root` holds the files shared with the server and other devices:
/// cursors, note buffers and the download log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    playlist_root: PathBuf,
    smm_root: PathBuf,
}

impl Layout {
    pub const LOG_FILE: &'static str = "download_log.txt";
    pub const OLD_LOG_FILE: &'static str = "download_log_1.txt";

    pub fn new(playlist_root: impl Into<PathBuf>, smm_root: impl Into<PathBuf>) -> Self {
        Self {
            playlist_root: playlist_root.into(),
            smm_root: smm_root.into(),
        }
    }

    pub fn playlist_root(&self) -> &Path {
        &self.playlist_root
    }

    pub fn smm_root(&self) -> &Path {
        &self.smm_root
    }

    /// `P/<category>.m3u`
    pub fn playlist_path(&self, category: &Category) -> PathBuf {
        self.playlist_root.join(format!("{}.m3u", category))
    }

    /// `P/<category>/`, root of the downloaded song tree.
    pub fn song_root(&self, category: &Category) -> PathBuf {
        self.playlist_root.join(category.as_str())
    }

    /// `S/<category>.last`
    pub fn cursor_path(&self, category: &Category) -> PathBuf {
        self.smm_root.join(format!("{}.last", category))
    }

    /// `S/<category>.note`
    pub fn note_path(&self, category: &Category) -> PathBuf {
        self.smm_root.join(format!("{}.note", category))
    }

    pub fn log_path(&self) -> PathBuf {
        self.smm_root.join(Self::LOG_FILE)
    }

    pub fn old_log_path(&self) -> PathBuf {
        self.smm_root.join(Self::OLD_LOG_FILE)
    }
}

/// Result of downloading one batch of songs.
///
/// `downloaded` counts songs fetched and appended to the playlist before
/// the batch ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum BatchOutcome {
    /// Every song was fetched.
    Complete { downloaded: usize },
    /// A transient failure stopped the batch; try again next cycle.
    RetryLater { downloaded: usize },
    /// A failure that a retry will not fix; do not repeat this batch.
    Abandoned { downloaded: usize },
}

impl BatchOutcome {
    pub fn downloaded(&self) -> usize {
        match *self {
            BatchOutcome::Complete { downloaded }
            | BatchOutcome::RetryLater { downloaded }
            | BatchOutcome::Abandoned { downloaded } => downloaded,
        }
    }

    pub fn should_retry(&self) -> bool {
        matches!(self, BatchOutcome::RetryLater { .. })
    }

    /// `true` for success or a non-recoverable error, `false` when the
    /// caller should retry later.
    pub fn is_done(&self) -> bool {
        !self.should_retry()
    }
}

/// Download parameters of a full sync cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadPlan {
    /// Songs requested per download
    pub count: u32,
    /// Download only when fewer songs than this remain to be played
    pub min_remaining: usize,
    pub seed: Option<u32>,
}

/// Summary of one full sync cycle of a category
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSummary {
    pub category: String,
    pub started_at: String,
    pub completed_at: String,
    pub duration_seconds: u64,
    pub notes_sent: bool,
    pub songs_pruned: usize,
    pub files_deleted: usize,
    pub songs_remaining: Option<usize>,
    pub download: Option<BatchOutcome>,
    pub errors_encountered: usize,
}
