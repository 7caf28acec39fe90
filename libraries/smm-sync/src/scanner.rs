use std::path::Path;
use tracing::debug;

/// Receives every media file written by a download so the host can index
/// it (the Android media store, a desktop library, ...).
pub trait MediaScanner: Send + Sync {
    fn scan_file(&self, path: &Path, mime_type: &str);
}

/// Scanner that only records new files in the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingScanner;

impl MediaScanner for LoggingScanner {
    fn scan_file(&self, path: &Path, mime_type: &str) {
        debug!(path = %path.display(), mime = mime_type, "New media file");
    }
}

/// MIME type announced to the scanner for a downloaded file.
pub fn mime_type_for_file(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    match ext.as_deref() {
        Some("mp3") => "audio/mpeg",
        Some("pdf") => "application/pdf",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("png") => "image/png",
        _ => "application/octet-stream",
    }
}

/// True for song files, the only files the storage janitor deletes one by one.
pub(crate) fn is_song_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("mp3"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mime_types() {
        assert_eq!(mime_type_for_file(Path::new("song.mp3")), "audio/mpeg");
        assert_eq!(mime_type_for_file(Path::new("SONG.MP3")), "audio/mpeg");
        assert_eq!(mime_type_for_file(Path::new("liner_notes.pdf")), "application/pdf");
        assert_eq!(mime_type_for_file(Path::new("AlbumArt.jpg")), "image/jpeg");
        assert_eq!(mime_type_for_file(Path::new("cover.png")), "image/png");
        assert_eq!(
            mime_type_for_file(Path::new("folder.ini")),
            "application/octet-stream"
        );
    }

    #[test]
    fn test_is_song_file() {
        assert!(is_song_file(Path::new("a/b.mp3")));
        assert!(is_song_file(Path::new("a/b.Mp3")));
        assert!(!is_song_file(Path::new("a/b.pdf")));
        assert!(!is_song_file(Path::new("a/mp3")));
    }
}
