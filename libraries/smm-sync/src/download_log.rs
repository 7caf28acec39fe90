//! Plain-text activity log kept next to the smm files.
//!
//! `download_log.txt` is rotated to `download_log_1.txt` when a write finds
//! it older than four hours; only one old log is kept. There is no timer:
//! during idle periods nothing is rotated.

use std::fs::{self, File, OpenOptions};
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, SystemTime};
use tracing_subscriber::fmt::MakeWriter;

/// Age after which the active log is rotated.
pub const ROTATE_AFTER: Duration = Duration::from_secs(4 * 60 * 60);

/// `MakeWriter` appending to the rotating download log.
#[derive(Debug)]
pub struct DownloadLog {
    active: PathBuf,
    old: PathBuf,
    rotate_after: Duration,
    lock: Mutex<()>,
}

impl DownloadLog {
    pub fn new(active: impl Into<PathBuf>, old: impl Into<PathBuf>) -> Self {
        Self {
            active: active.into(),
            old: old.into(),
            rotate_after: ROTATE_AFTER,
            lock: Mutex::new(()),
        }
    }

    pub fn with_rotate_after(mut self, rotate_after: Duration) -> Self {
        self.rotate_after = rotate_after;
        self
    }

    pub fn path(&self) -> &Path {
        &self.active
    }

    /// Rotate the active log if it is too old. Returns true if rotated.
    pub fn rotate_if_stale(&self) -> io::Result<bool> {
        let modified = match fs::metadata(&self.active).and_then(|m| m.modified()) {
            Ok(modified) => modified,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e),
        };

        let age = SystemTime::now()
            .duration_since(modified)
            .unwrap_or_default();
        if age <= self.rotate_after {
            return Ok(false);
        }

        match fs::remove_file(&self.old) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
        fs::rename(&self.active, &self.old)?;
        Ok(true)
    }

    fn open(&self) -> io::Result<File> {
        // A poisoned lock only means another writer panicked mid-rotation.
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        self.rotate_if_stale()?;
        OpenOptions::new().create(true).append(true).open(&self.active)
    }
}

/// Writer for one log event; drops output if the log cannot be opened.
pub enum LogWriter {
    File(File),
    Sink(io::Sink),
}

impl Write for LogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            LogWriter::File(file) => file.write(buf),
            LogWriter::Sink(sink) => sink.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            LogWriter::File(file) => file.flush(),
            LogWriter::Sink(sink) => sink.flush(),
        }
    }
}

impl<'a> MakeWriter<'a> for DownloadLog {
    type Writer = LogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        match self.open() {
            Ok(file) => LogWriter::File(file),
            Err(e) => {
                eprintln!("can't write log to {}: {}", self.active.display(), e);
                LogWriter::Sink(io::sink())
            }
        }
    }
}
