use crate::error::Result;
use crate::types::Category;
use smm_client::SmmClient;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::PathBuf;
use tracing::{debug, error, info};

fn single_line(text: &str) -> String {
    text.trim_end()
        .replace("\r\n", " ")
        .replace(['\r', '\n'], " ")
}

/// Per-category note buffers, `S/<category>.note`.
#[derive(Debug, Clone)]
pub struct NoteBuffer {
    smm_root: PathBuf,
}

impl NoteBuffer {
    pub fn new(smm_root: impl Into<PathBuf>) -> Self {
        Self {
            smm_root: smm_root.into(),
        }
    }

    pub fn path(&self, category: &Category) -> PathBuf {
        self.smm_root.join(format!("{}.note", category))
    }

    /// Append `"<song>" <text>` as one line.
    ///
    /// Line breaks inside `text` become spaces.
    pub fn append(&self, category: &Category, song: &str, text: &str) -> Result<()> {
        let path = self.path(category);
        let text = single_line(text);
        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        writeln!(file, "\"{}\" {}", song, text)?;
        file.sync_all()?;

        debug!(category = %category, song = %song, "Note added");
        Ok(())
    }

    /// Buffer contents with every line terminated by `\r\n`, or `None`
    /// when there is no buffer.
    pub fn read(&self, category: &Category) -> Result<Option<String>> {
        let text = match fs::read_to_string(self.path(category)) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let mut data = String::with_capacity(text.len() + 16);
        for line in text.lines() {
            data.push_str(line);
            data.push_str("\r\n");
        }
        Ok(Some(data))
    }

    pub fn clear(&self, category: &Category) -> Result<()> {
        match fs::remove_file(self.path(category)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Ships note buffers to the server.
pub struct NoteUploader<'a> {
    client: &'a SmmClient,
    buffer: &'a NoteBuffer,
}

impl<'a> NoteUploader<'a> {
    pub fn new(client: &'a SmmClient, buffer: &'a NoteBuffer) -> Self {
        Self { client, buffer }
    }

    /// Upload a category's note buffer as a unit.
    ///
    /// The buffer is deleted only after the server answers 200, so a failed
    /// upload is repeated with the same content next time. No buffer means
    /// nothing to send, which counts as success.
    pub async fn flush(&self, category: &Category) -> bool {
        let data = match self.buffer.read(category) {
            Ok(Some(data)) => data,
            Ok(None) => {
                debug!(category = %category, "No notes to send");
                return true;
            }
            Err(e) => {
                error!(category = %category, error = %e, "cannot read note buffer");
                return false;
            }
        };

        if let Err(e) = self.client.notes().put_note(category.as_str(), &data).await {
            error!(category = %category, error = %e, "put notes failed");
            return false;
        }

        if let Err(e) = self.buffer.clear(category) {
            error!(category = %category, error = %e, "cannot delete note buffer");
        }

        info!("{} sendNotes", category);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_append_and_read() {
        let dir = TempDir::new().unwrap();
        let buffer = NoteBuffer::new(dir.path());
        let vocal = Category::new("vocal").unwrap();

        assert_eq!(buffer.read(&vocal).unwrap(), None);

        buffer.append(&vocal, "vocal/a/1.mp3", "too loud").unwrap();
        buffer.append(&vocal, "vocal/b/2.mp3", "great\n").unwrap();

        assert_eq!(
            fs::read_to_string(buffer.path(&vocal)).unwrap(),
            "\"vocal/a/1.mp3\" too loud\n\"vocal/b/2.mp3\" great\n"
        );
        assert_eq!(
            buffer.read(&vocal).unwrap().as_deref(),
            Some("\"vocal/a/1.mp3\" too loud\r\n\"vocal/b/2.mp3\" great\r\n")
        );

        buffer.clear(&vocal).unwrap();
        buffer.clear(&vocal).unwrap();
        assert!(!buffer.path(&vocal).exists());
    }

    #[test]
    fn test_append_keeps_one_line_per_note() {
        let dir = TempDir::new().unwrap();
        let buffer = NoteBuffer::new(dir.path());
        let vocal = Category::new("vocal").unwrap();

        buffer
            .append(&vocal, "vocal/a/1.mp3", "first line\nsecond\r\nthird\rend\n")
            .unwrap();

        assert_eq!(
            fs::read_to_string(buffer.path(&vocal)).unwrap(),
            "\"vocal/a/1.mp3\" first line second third end\n"
        );
    }
}
