use crate::scanner::is_song_file;
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

/// Kind of a directory entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Dir,
    /// Symlinks, devices, ...; never touched
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    pub path: PathBuf,
    pub kind: EntryKind,
}

/// Filesystem operations the storage janitor needs.
pub trait StorageTree {
    /// Direct children of `dir`, never `dir` itself.
    fn entries(&self, dir: &Path) -> io::Result<Vec<TreeEntry>>;
    fn remove_file(&self, path: &Path) -> io::Result<()>;
    fn remove_dir_all(&self, path: &Path) -> io::Result<()>;
}

/// The local disk.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalTree;

impl StorageTree for LocalTree {
    fn entries(&self, dir: &Path) -> io::Result<Vec<TreeEntry>> {
        let mut entries = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let file_type = entry.file_type()?;
            let kind = if file_type.is_dir() {
                EntryKind::Dir
            } else if file_type.is_file() {
                EntryKind::File
            } else {
                EntryKind::Other
            };
            entries.push(TreeEntry {
                path: entry.path(),
                kind,
            });
        }
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(entries)
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(path)
    }

    fn remove_dir_all(&self, path: &Path) -> io::Result<()> {
        fs::remove_dir_all(path)
    }
}

/// Membership key of a song path: `\` becomes `/`, then lower-cased.
pub fn membership_key(path: &str) -> String {
    path.replace('\\', "/").to_lowercase()
}

/// Deletes song files a playlist no longer mentions.
pub struct Janitor<'a, T: StorageTree> {
    tree: &'a T,
    playlist_root: &'a Path,
    members: HashSet<String>,
}

impl<'a, T: StorageTree> Janitor<'a, T> {
    /// `playlist_lines` are paths relative to `playlist_root`, as written
    /// in the playlist file.
    pub fn new<I, S>(tree: &'a T, playlist_root: &'a Path, playlist_lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let members = playlist_lines
            .into_iter()
            .filter(|line| !line.as_ref().trim().is_empty())
            .map(|line| membership_key(line.as_ref()))
            .collect();

        Self {
            tree,
            playlist_root,
            members,
        }
    }

    /// Walk `song_root` post-order, deleting unmentioned song files and
    /// then every directory left with no songs and no subdirectories.
    /// `song_root` itself is kept.
    ///
    /// Failures are logged and the walk goes on. Returns the number of
    /// files deleted.
    pub fn clean(&self, song_root: &Path) -> usize {
        let deleted = self.clean_dir(song_root);
        info!(root = %song_root.display(), deleted, "Song storage cleaned");
        deleted
    }

    fn clean_dir(&self, dir: &Path) -> usize {
        let entries = match self.tree.entries(dir) {
            Ok(entries) => entries,
            Err(e) => {
                error!(dir = %dir.display(), error = %e, "cannot list directory");
                return 0;
            }
        };

        let mut deleted = 0;

        for entry in &entries {
            if entry.kind == EntryKind::File
                && is_song_file(&entry.path)
                && !self.is_member(&entry.path)
            {
                match self.tree.remove_file(&entry.path) {
                    Ok(()) => {
                        debug!(path = %entry.path.display(), "Deleted song not in playlist");
                        deleted += 1;
                    }
                    Err(e) => {
                        error!(path = %entry.path.display(), error = %e, "cannot delete file");
                    }
                }
            }
        }

        for entry in &entries {
            if entry.kind == EntryKind::Dir {
                deleted += self.clean_dir(&entry.path);

                if self.is_empty_of_music(&entry.path) {
                    match self.tree.remove_dir_all(&entry.path) {
                        Ok(()) => debug!(dir = %entry.path.display(), "Deleted directory"),
                        Err(e) => {
                            error!(dir = %entry.path.display(), error = %e, "cannot delete directory");
                        }
                    }
                }
            }
        }

        deleted
    }

    /// No subdirectories and no song files left.
    fn is_empty_of_music(&self, dir: &Path) -> bool {
        match self.tree.entries(dir) {
            Ok(entries) => !entries.iter().any(|entry| match entry.kind {
                EntryKind::Dir => true,
                EntryKind::File => is_song_file(&entry.path),
                EntryKind::Other => false,
            }),
            Err(e) => {
                error!(dir = %dir.display(), error = %e, "cannot list directory");
                false
            }
        }
    }

    fn is_member(&self, path: &Path) -> bool {
        match path.strip_prefix(self.playlist_root) {
            Ok(relative) => {
                let relative: Vec<_> = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect();
                self.members.contains(&membership_key(&relative.join("/")))
            }
            // Outside the playlist root; not ours to judge
            Err(_) => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::BTreeMap;

    /// In-memory tree: a path maps to its kind.
    #[derive(Default)]
    struct MemoryTree {
        nodes: RefCell<BTreeMap<PathBuf, EntryKind>>,
        fail_remove: Option<PathBuf>,
    }

    impl MemoryTree {
        fn with(paths: &[(&str, EntryKind)]) -> Self {
            let tree = Self::default();
            for (path, kind) in paths {
                tree.nodes.borrow_mut().insert(PathBuf::from(path), *kind);
            }
            tree
        }

        fn exists(&self, path: &str) -> bool {
            self.nodes.borrow().contains_key(Path::new(path))
        }
    }

    impl StorageTree for MemoryTree {
        fn entries(&self, dir: &Path) -> io::Result<Vec<TreeEntry>> {
            Ok(self
                .nodes
                .borrow()
                .iter()
                .filter(|(path, _)| path.parent() == Some(dir))
                .map(|(path, kind)| TreeEntry {
                    path: path.clone(),
                    kind: *kind,
                })
                .collect())
        }

        fn remove_file(&self, path: &Path) -> io::Result<()> {
            if self.fail_remove.as_deref() == Some(path) {
                return Err(io::Error::new(io::ErrorKind::PermissionDenied, "read-only"));
            }
            self.nodes.borrow_mut().remove(path);
            Ok(())
        }

        fn remove_dir_all(&self, path: &Path) -> io::Result<()> {
            self.nodes.borrow_mut().retain(|p, _| !p.starts_with(path));
            Ok(())
        }
    }

    use EntryKind::{Dir, File};

    #[test]
    fn test_membership_key() {
        assert_eq!(membership_key("Vocal\\Artist\\Song.MP3"), "vocal/artist/song.mp3");
    }

    #[test]
    fn test_deletes_orphans_and_empty_dirs() {
        let tree = MemoryTree::with(&[
            ("/m/vocal/A", Dir),
            ("/m/vocal/A/keep.mp3", File),
            ("/m/vocal/A/drop.mp3", File),
            ("/m/vocal/A/AlbumArt.jpg", File),
            ("/m/vocal/B", Dir),
            ("/m/vocal/B/old.mp3", File),
            ("/m/vocal/B/liner_notes.pdf", File),
            ("/m/vocal/C", Dir),
            ("/m/vocal/C/D", Dir),
        ]);
        let root = Path::new("/m");
        let janitor = Janitor::new(&tree, root, ["vocal/A/Keep.mp3"]);

        let deleted = janitor.clean(Path::new("/m/vocal"));

        assert_eq!(deleted, 2);
        assert!(tree.exists("/m/vocal/A/keep.mp3"));
        assert!(tree.exists("/m/vocal/A/AlbumArt.jpg"));
        assert!(!tree.exists("/m/vocal/A/drop.mp3"));
        assert!(!tree.exists("/m/vocal/B"));
        assert!(!tree.exists("/m/vocal/B/liner_notes.pdf"));
        assert!(!tree.exists("/m/vocal/C"));
    }

    #[test]
    fn test_failed_delete_is_not_counted() {
        let mut tree = MemoryTree::with(&[
            ("/m/vocal/A", Dir),
            ("/m/vocal/A/stuck.mp3", File),
            ("/m/vocal/A/gone.mp3", File),
        ]);
        tree.fail_remove = Some(PathBuf::from("/m/vocal/A/stuck.mp3"));
        let janitor = Janitor::new(&tree, Path::new("/m"), Vec::<String>::new());

        assert_eq!(janitor.clean(Path::new("/m/vocal")), 1);
        assert!(tree.exists("/m/vocal/A/stuck.mp3"));
        assert!(tree.exists("/m/vocal/A"));
    }
}
