//! Playlist reconciliation: merging downloaded songs into a category's
//! playlist and dropping the songs the listener has already played.

use crate::cursor::PortableCursorRepository;
use crate::error::Result;
use crate::playlist::{self, read_playlist, write_playlist};
use crate::scanner::{mime_type_for_file, MediaScanner};
use crate::types::{BatchOutcome, Category, Layout};
use smm_client::SmmClient;
use std::fs;
use std::path::{Path, PathBuf};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, info, warn};

enum Stop {
    RetryLater,
    Abandon,
}

/// Download `songs` of a category and append each one to its playlist.
///
/// Songs are fetched strictly in order. The first time a song directory is
/// seen, it is created and its metadata files (album art, liner notes) are
/// fetched before the song. Any failure ends the batch; songs already
/// appended stay in the playlist.
///
/// A song whose fetch fails with a non-recoverable error (a 4xx response,
/// a missing or bad `Content-Length`) ends the batch as
/// [`BatchOutcome::Abandoned`], so the same song is not asked for again on
/// the next cycle. Only network, 5xx and local IO failures give
/// [`BatchOutcome::RetryLater`].
///
/// All file work here goes through `tokio::fs`; the synchronous helpers in
/// this module are for the file-only operations.
///
/// # Arguments
/// * `songs` - Song paths relative to the category root, as selected by the server
/// * `scanner` - Notified of every file written
pub async fn fetch_and_merge_songs(
    client: &SmmClient,
    layout: &Layout,
    category: &Category,
    songs: &[String],
    scanner: Option<&dyn MediaScanner>,
) -> BatchOutcome {
    let playlist_path = layout.playlist_path(category);
    let song_root = layout.song_root(category);

    let mut playlist = match OpenOptions::new()
        .create(true)
        .append(true)
        .open(&playlist_path)
        .await
    {
        Ok(file) => file,
        Err(e) => {
            error!(
                path = %playlist_path.display(),
                error = %e,
                "cannot open playlist for append"
            );
            return BatchOutcome::Abandoned { downloaded: 0 };
        }
    };

    let mut downloaded = 0;
    let mut stop = None;

    for song in songs {
        let Some((dir_part, file_name)) = split_song_path(song) else {
            error!(category = %category, song = %song, "Server sent a malformed song path");
            stop = Some(Stop::Abandon);
            break;
        };

        let dest_dir = join_relative(&song_root, dir_part);

        if !path_exists(&dest_dir).await {
            if let Err(e) = tokio::fs::create_dir_all(&dest_dir).await {
                error!(dir = %dest_dir.display(), error = %e, "cannot create song directory");
                stop = Some(Stop::RetryLater);
                break;
            }

            if !fetch_metadata(client, dir_part, &dest_dir, scanner).await {
                // Removed so the next attempt fetches the metadata again
                if let Err(e) = tokio::fs::remove_dir_all(&dest_dir).await {
                    warn!(dir = %dest_dir.display(), error = %e, "cannot remove song directory");
                }
                stop = Some(Stop::RetryLater);
                break;
            }
        }

        let dest = dest_dir.join(file_name);
        match client.download().fetch_file(song, &dest).await {
            Ok(_) => {
                if let Some(scanner) = scanner {
                    scanner.scan_file(&dest, "audio/mpeg");
                }

                let line = format!("{}/{}\n", category, song);
                let appended = match playlist.write_all(line.as_bytes()).await {
                    Ok(()) => playlist.flush().await,
                    Err(e) => Err(e),
                };
                if let Err(e) = appended {
                    error!(
                        path = %playlist_path.display(),
                        error = %e,
                        "cannot append to playlist; disk full?"
                    );
                    stop = Some(Stop::Abandon);
                    break;
                }
                downloaded += 1;
            }
            Err(e) => {
                // The connection is most likely down; later songs would fail too.
                stop = Some(if e.is_recoverable() {
                    Stop::RetryLater
                } else {
                    Stop::Abandon
                });
                break;
            }
        }
    }

    if let Err(e) = playlist.sync_all().await {
        error!(
            path = %playlist_path.display(),
            error = %e,
            "cannot close playlist; disk full?"
        );
        stop = Some(Stop::Abandon);
    }
    drop(playlist);

    info!("{} {} songs downloaded", downloaded, category);

    match stop {
        None => BatchOutcome::Complete { downloaded },
        Some(Stop::RetryLater) => BatchOutcome::RetryLater { downloaded },
        Some(Stop::Abandon) => BatchOutcome::Abandoned { downloaded },
    }
}

/// Fetch the metadata files of one song directory into `dest_dir`.
///
/// Files already present are kept; they may have come with another
/// category. Returns false on the first failure.
async fn fetch_metadata(
    client: &SmmClient,
    resource_dir: &str,
    dest_dir: &Path,
    scanner: Option<&dyn MediaScanner>,
) -> bool {
    let Ok(files) = client.catalog().meta_list(resource_dir).await else {
        return false;
    };

    debug!(dir = %resource_dir, count = files.len(), "Fetching metadata");

    for file in &files {
        let Some(name) = file
            .rsplit('/')
            .next()
            .filter(|n| !n.is_empty() && *n != "." && *n != "..")
        else {
            warn!(resource = %file, "Skipping malformed metadata path");
            continue;
        };

        let dest = dest_dir.join(name);
        if !path_exists(&dest).await && client.download().fetch_file(file, &dest).await.is_err()
        {
            return false;
        }

        if let Some(scanner) = scanner {
            scanner.scan_file(&dest, mime_type_for_file(&dest));
        }
    }

    true
}

async fn path_exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}

/// Split a server song path into its directory part (with trailing `/`,
/// possibly empty) and file name. Paths that could escape the song root
/// are rejected.
pub(crate) fn split_song_path(song: &str) -> Option<(&str, &str)> {
    if song.is_empty() || song.starts_with('/') || song.contains('\\') {
        return None;
    }
    if song.split('/').any(|segment| segment == "." || segment == "..") {
        return None;
    }

    let (dir_part, file_name) = match song.rfind('/') {
        Some(i) => song.split_at(i + 1),
        None => ("", song),
    };

    if file_name.is_empty() {
        None
    } else {
        Some((dir_part, file_name))
    }
}

fn join_relative(root: &Path, relative: &str) -> PathBuf {
    let mut path = root.to_path_buf();
    path.extend(relative.split('/').filter(|s| !s.is_empty()));
    path
}

/// Drop the playlist lines before the song named by the cursor file.
///
/// The cursor file is a one-shot signal from the player: it is deleted
/// once read, whatever its content. An empty or missing cursor, or one
/// naming a song that is not in the playlist, leaves the playlist
/// untouched. Matching is exact (case-sensitive) and the first occurrence
/// wins.
///
/// Returns the number of lines dropped.
pub fn prune_consumed(playlist_path: &Path, cursor_path: &Path) -> Result<usize> {
    let lines = read_playlist(playlist_path)?;
    let last_played = PortableCursorRepository::read_file(cursor_path);

    match fs::remove_file(cursor_path) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %cursor_path.display(), error = %e, "cannot delete cursor file"),
    }

    let Some(last_played) = last_played else {
        return Ok(0);
    };

    let Some(index) = lines.iter().position(|line| *line == last_played) else {
        debug!(song = %last_played, "Cursor song not in playlist; nothing pruned");
        return Ok(0);
    };

    if index > 0 {
        write_playlist(playlist_path, &lines[index..])?;
    }

    Ok(index)
}

/// Number of songs left to play in a category, counting the current one.
///
/// Only playlist entries whose file exists are counted.
pub fn songs_remaining(layout: &Layout, category: &Category) -> Result<usize> {
    let lines = read_playlist(&layout.playlist_path(category))?;
    let current = PortableCursorRepository::read_file(&layout.cursor_path(category));

    let mut count = 0;
    let mut start_at = None;

    for song in playlist::songs(&lines) {
        if layout.playlist_root().join(song).is_file() {
            if start_at.is_none() && current.as_deref() == Some(song) {
                start_at = Some(count);
            }
            count += 1;
        }
    }

    Ok(count - start_at.unwrap_or(0))
}
