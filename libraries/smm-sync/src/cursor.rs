//! Durable playback cursors.
//!
//! A category's cursor is stored twice:
//! - `S/<category>.last`, a one-line text file naming the last played song.
//!   It travels with the music to other devices and tells the sync cycle
//!   which playlist lines have been consumed.
//! - A local JSON position cache holding the playback position of every
//!   category and the category that was playing last.
//!
//! Everything here is synchronous `std::fs` so it can run from a teardown
//! path without a runtime.

use crate::error::Result;
use crate::playlist::{self, read_playlist, replace_file};
use crate::types::{Category, Layout};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Last played song and position within it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    /// Playlist line of the song, `None` if nothing has played yet
    pub last_played: Option<String>,
    pub position_ms: u64,
}

/// Where playback of a category resumes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResumePoint {
    /// Song at `start_at`; `None` for an empty playlist
    pub path: Option<String>,
    /// Index among the non-blank playlist lines
    pub start_at: usize,
    pub position_ms: u64,
}

/// Storage of per-category cursors.
pub trait CursorStore {
    fn load(&self, category: &Category) -> Result<Cursor>;

    /// Write both encodings; each is attempted even if the other fails.
    fn save(&self, category: &Category, cursor: &Cursor) -> Result<()>;
}

/// The portable `<category>.last` text files.
#[derive(Debug, Clone)]
pub struct PortableCursorRepository {
    smm_root: PathBuf,
}

impl PortableCursorRepository {
    pub fn new(smm_root: impl Into<PathBuf>) -> Self {
        Self {
            smm_root: smm_root.into(),
        }
    }

    pub fn path(&self, category: &Category) -> PathBuf {
        self.smm_root.join(format!("{}.last", category))
    }

    pub fn read(&self, category: &Category) -> Option<String> {
        Self::read_file(&self.path(category))
    }

    /// Replace the cursor file with `song` (an empty line for `None`).
    ///
    /// The new content is written aside and renamed over the old file, so a
    /// crash leaves either the old cursor or the new one.
    pub fn write(&self, category: &Category, song: Option<&str>) -> Result<()> {
        let path = self.path(category);
        let mut text = song.unwrap_or_default().to_string();
        text.push('\n');
        replace_file(&path, text.as_bytes())?;
        Ok(())
    }

    /// First line of a cursor file.
    ///
    /// A missing, unreadable or empty file means there is no cursor.
    pub fn read_file(path: &Path) -> Option<String> {
        match fs::read_to_string(path) {
            Ok(text) => text
                .lines()
                .next()
                .filter(|line| !line.is_empty())
                .map(str::to_string),
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "cannot read cursor file");
                None
            }
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct PositionCacheFile {
    #[serde(default)]
    current_category: Option<String>,
    #[serde(default)]
    positions: BTreeMap<String, u64>,
}

/// Local key-value cache of playback positions, one JSON file.
#[derive(Debug, Clone)]
pub struct LocalPositionCache {
    path: PathBuf,
}

/// Cache key of a category's playback position.
pub fn position_key(category: &Category) -> String {
    format!("{}_currentPos", category)
}

impl LocalPositionCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn position(&self, category: &Category) -> u64 {
        self.read()
            .positions
            .get(&position_key(category))
            .copied()
            .unwrap_or(0)
    }

    pub fn set_position(&self, category: &Category, position_ms: u64) -> Result<()> {
        let mut cache = self.read();
        cache.positions.insert(position_key(category), position_ms);
        self.write(&cache)
    }

    /// Category that was playing when state was last saved.
    pub fn current_category(&self) -> Option<Category> {
        self.read()
            .current_category
            .and_then(|name| Category::new(name).ok())
    }

    pub fn set_current_category(&self, category: &Category) -> Result<()> {
        let mut cache = self.read();
        cache.current_category = Some(category.to_string());
        self.write(&cache)
    }

    /// A missing cache is empty; a corrupt one is logged and replaced on
    /// the next write.
    fn read(&self) -> PositionCacheFile {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) => {
                if e.kind() != ErrorKind::NotFound {
                    warn!(path = %self.path.display(), error = %e, "cannot read position cache");
                }
                return PositionCacheFile::default();
            }
        };

        serde_json::from_slice(&bytes).unwrap_or_else(|e| {
            warn!(path = %self.path.display(), error = %e, "corrupt position cache; starting fresh");
            PositionCacheFile::default()
        })
    }

    fn write(&self, cache: &PositionCacheFile) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(cache)?;
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        replace_file(&self.path, &bytes)?;
        Ok(())
    }
}

/// Cursor store over the `.last` files and the local position cache.
#[derive(Debug, Clone)]
pub struct FileCursorStore {
    layout: Layout,
    portable: PortableCursorRepository,
    positions: LocalPositionCache,
}

impl FileCursorStore {
    pub fn new(layout: Layout, position_cache: impl Into<PathBuf>) -> Self {
        let portable = PortableCursorRepository::new(layout.smm_root());
        Self {
            layout,
            portable,
            positions: LocalPositionCache::new(position_cache),
        }
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn positions(&self) -> &LocalPositionCache {
        &self.positions
    }

    /// Find where playback of `category` resumes.
    ///
    /// Fails only if the playlist cannot be read.
    pub fn load_resume_point(&self, category: &Category) -> Result<ResumePoint> {
        let lines = read_playlist(&self.layout.playlist_path(category))?;
        let songs: Vec<&str> = playlist::songs(&lines).collect();
        let cursor = self.load(category)?;
        Ok(resolve_resume_point(&songs, &cursor))
    }
}

impl CursorStore for FileCursorStore {
    fn load(&self, category: &Category) -> Result<Cursor> {
        Ok(Cursor {
            last_played: self.portable.read(category),
            position_ms: self.positions.position(category),
        })
    }

    fn save(&self, category: &Category, cursor: &Cursor) -> Result<()> {
        let cached = self.positions.set_position(category, cursor.position_ms);
        let portable = self
            .portable
            .write(category, cursor.last_played.as_deref());

        debug!(
            category = %category,
            song = ?cursor.last_played,
            position_ms = cursor.position_ms,
            "Cursor saved"
        );

        cached.and(portable)
    }
}

/// Locate the cursor's song among the playlist songs.
///
/// The first occurrence wins. With no cursor, or a cursor naming a song
/// that is not in the playlist, playback starts at the first song with
/// position 0.
pub fn resolve_resume_point(songs: &[&str], cursor: &Cursor) -> ResumePoint {
    let found = cursor
        .last_played
        .as_deref()
        .and_then(|last| songs.iter().position(|song| *song == last));

    match found {
        Some(index) => ResumePoint {
            path: Some(songs[index].to_string()),
            start_at: index,
            position_ms: cursor.position_ms,
        },
        None => ResumePoint {
            path: songs.first().map(|s| (*s).to_string()),
            start_at: 0,
            position_ms: 0,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store(dir: &TempDir) -> FileCursorStore {
        let layout = Layout::new(dir.path().join("music"), dir.path().join("smm"));
        fs::create_dir_all(layout.playlist_root()).unwrap();
        fs::create_dir_all(layout.smm_root()).unwrap();
        FileCursorStore::new(layout, dir.path().join("cache/positions.json"))
    }

    #[test]
    fn test_resume_point_first_occurrence() {
        let cursor = Cursor {
            last_played: Some("x".into()),
            position_ms: 1500,
        };
        let point = resolve_resume_point(&["x", "y", "x", "z"], &cursor);

        assert_eq!(point.start_at, 0);
        assert_eq!(point.position_ms, 1500);
        assert_eq!(point.path.as_deref(), Some("x"));
    }

    #[test]
    fn test_resume_point_not_found() {
        let cursor = Cursor {
            last_played: Some("gone".into()),
            position_ms: 1500,
        };
        let point = resolve_resume_point(&["a", "b"], &cursor);
        assert_eq!(point.start_at, 0);
        assert_eq!(point.position_ms, 0);
        assert_eq!(point.path.as_deref(), Some("a"));

        let empty = resolve_resume_point(&[], &Cursor::default());
        assert_eq!(empty.path, None);
    }

    #[test]
    fn test_save_writes_both_encodings() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let vocal = Category::new("vocal").unwrap();

        store
            .save(
                &vocal,
                &Cursor {
                    last_played: Some("vocal/a/1.mp3".into()),
                    position_ms: 42_000,
                },
            )
            .unwrap();

        let text = fs::read_to_string(store.layout().cursor_path(&vocal)).unwrap();
        assert_eq!(text, "vocal/a/1.mp3\n");

        let json: serde_json::Value =
            serde_json::from_slice(&fs::read(store.positions().path()).unwrap()).unwrap();
        assert_eq!(json["positions"]["vocal_currentPos"], 42_000);

        let loaded = store.load(&vocal).unwrap();
        assert_eq!(loaded.last_played.as_deref(), Some("vocal/a/1.mp3"));
        assert_eq!(loaded.position_ms, 42_000);
    }

    #[test]
    fn test_save_nothing_played_writes_empty_line() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let vocal = Category::new("vocal").unwrap();

        store.save(&vocal, &Cursor::default()).unwrap();

        let text = fs::read_to_string(store.layout().cursor_path(&vocal)).unwrap();
        assert_eq!(text, "\n");
        assert_eq!(store.load(&vocal).unwrap(), Cursor::default());
    }

    #[test]
    fn test_load_resume_point_skips_blank_lines() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let vocal = Category::new("vocal").unwrap();

        fs::write(store.layout().playlist_path(&vocal), "a\n\nb\nc\n").unwrap();
        store
            .save(
                &vocal,
                &Cursor {
                    last_played: Some("b".into()),
                    position_ms: 900,
                },
            )
            .unwrap();

        let point = store.load_resume_point(&vocal).unwrap();
        assert_eq!(point.start_at, 1);
        assert_eq!(point.position_ms, 900);
    }

    #[test]
    fn test_corrupt_cache_starts_fresh() {
        let dir = TempDir::new().unwrap();
        let cache = LocalPositionCache::new(dir.path().join("positions.json"));
        let vocal = Category::new("vocal").unwrap();

        fs::write(cache.path(), b"{not json").unwrap();
        assert_eq!(cache.position(&vocal), 0);

        cache.set_position(&vocal, 10).unwrap();
        cache.set_current_category(&vocal).unwrap();
        assert_eq!(cache.position(&vocal), 10);
        assert_eq!(cache.current_category(), Some(vocal));
    }

    #[test]
    fn test_portable_write_replaces_whole_file() {
        let dir = TempDir::new().unwrap();
        let repo = PortableCursorRepository::new(dir.path());
        let vocal = Category::new("vocal").unwrap();

        repo.write(&vocal, Some("vocal/a/a_much_longer_first_song.mp3"))
            .unwrap();
        repo.write(&vocal, Some("vocal/b/2.mp3")).unwrap();

        assert_eq!(
            fs::read_to_string(repo.path(&vocal)).unwrap(),
            "vocal/b/2.mp3\n"
        );
        assert_eq!(repo.read(&vocal).as_deref(), Some("vocal/b/2.mp3"));

        // Only the cursor itself is left; nothing written aside survives
        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("vocal.last")]);
    }
}
