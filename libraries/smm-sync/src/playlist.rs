//! Playlist file access.
//!
//! A playlist is a text file with one song path per line, relative to the
//! directory holding the playlist. Lines are kept exactly as written;
//! blank lines survive a rewrite but are never treated as songs.

use crate::error::{Result, SyncError};
use std::fs;
use std::io::{self, Write};
use std::path::Path;

/// Read every line of a playlist, blank lines included.
pub fn read_playlist(path: &Path) -> Result<Vec<String>> {
    let text = fs::read_to_string(path).map_err(|source| SyncError::PlaylistUnreadable {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(text.lines().map(str::to_string).collect())
}

/// Non-blank playlist lines, in order.
pub fn songs(lines: &[String]) -> impl Iterator<Item = &str> {
    lines
        .iter()
        .map(String::as_str)
        .filter(|line| !line.trim().is_empty())
}

/// Rewrite a playlist with `lines`, each terminated by `\n`.
pub fn write_playlist(path: &Path, lines: &[String]) -> io::Result<()> {
    let mut text = String::with_capacity(lines.iter().map(|l| l.len() + 1).sum());
    for line in lines {
        text.push_str(line);
        text.push('\n');
    }
    replace_file(path, text.as_bytes())
}

/// Replace `path` with `contents` through a sibling temporary file, so a
/// crash leaves either the old or the new file, never a torn one.
pub(crate) fn replace_file(path: &Path, contents: &[u8]) -> io::Result<()> {
    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);

    {
        let mut file = fs::File::create(&tmp)?;
        file.write_all(contents)?;
        file.sync_all()?;
    }

    fs::rename(&tmp, path).map_err(|e| {
        let _ = fs::remove_file(&tmp);
        e
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_read_keeps_blank_lines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("vocal.m3u");
        fs::write(&path, "vocal/a.mp3\r\n\nvocal/b.mp3\n").unwrap();

        let lines = read_playlist(&path).unwrap();
        assert_eq!(lines, vec!["vocal/a.mp3", "", "vocal/b.mp3"]);
        assert_eq!(songs(&lines).collect::<Vec<_>>(), vec!["vocal/a.mp3", "vocal/b.mp3"]);
    }

    #[test]
    fn test_missing_playlist_is_unreadable() {
        let dir = TempDir::new().unwrap();
        let err = read_playlist(&dir.path().join("none.m3u")).unwrap_err();
        assert!(matches!(err, SyncError::PlaylistUnreadable { .. }));
    }

    #[test]
    fn test_write_playlist_replaces_content() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("vocal.m3u");
        fs::write(&path, "old\nlines\nhere\n").unwrap();

        write_playlist(&path, &["new".to_string()]).unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "new\n");
        assert!(!dir.path().join("vocal.m3u.tmp").exists());
    }
}
