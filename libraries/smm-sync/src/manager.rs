use crate::cleaner::{Janitor, LocalTree};
use crate::error::Result;
use crate::notes::{NoteBuffer, NoteUploader};
use crate::playlist::read_playlist;
use crate::reconciler;
use crate::scanner::MediaScanner;
use crate::types::{BatchOutcome, Category, DownloadPlan, Layout, SyncSummary};
use smm_client::{SmmClient, SongRequest};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Entry points the scheduler drives for each category.
pub struct SyncManager {
    client: SmmClient,
    layout: Layout,
    notes: NoteBuffer,
    scanner: Option<Arc<dyn MediaScanner>>,
}

impl SyncManager {
    pub fn new(client: SmmClient, layout: Layout) -> Self {
        let notes = NoteBuffer::new(layout.smm_root());
        Self {
            client,
            layout,
            notes,
            scanner: None,
        }
    }

    /// Announce every downloaded file to `scanner`.
    pub fn with_scanner(mut self, scanner: Arc<dyn MediaScanner>) -> Self {
        self.scanner = Some(scanner);
        self
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn notes(&self) -> &NoteBuffer {
        &self.notes
    }

    /// Ask the server for `count` new songs and download them.
    ///
    /// Returns `true` for success or a non-recoverable error, `false` when
    /// the caller should retry later.
    pub async fn download_category(
        &self,
        category: &Category,
        count: u32,
        seed: Option<u32>,
    ) -> bool {
        self.download_batch(category, count, seed).await.is_done()
    }

    /// Like [`download_category`](Self::download_category), with the detailed outcome.
    pub async fn download_batch(
        &self,
        category: &Category,
        count: u32,
        seed: Option<u32>,
    ) -> BatchOutcome {
        let request = SongRequest::new(category.as_str(), count).with_seed(seed);

        let songs = match self.client.catalog().select_songs(&request).await {
            Ok(songs) => songs,
            Err(e) if e.is_recoverable() => return BatchOutcome::RetryLater { downloaded: 0 },
            Err(_) => return BatchOutcome::Abandoned { downloaded: 0 },
        };

        if songs.is_empty() {
            info!("0 {} songs downloaded", category);
            return BatchOutcome::Complete { downloaded: 0 };
        }

        reconciler::fetch_and_merge_songs(
            &self.client,
            &self.layout,
            category,
            &songs,
            self.scanner.as_deref(),
        )
        .await
    }

    /// Upload the category's note buffer; see [`NoteUploader::flush`].
    pub async fn send_notes(&self, category: &Category) -> bool {
        NoteUploader::new(&self.client, &self.notes)
            .flush(category)
            .await
    }

    /// Drop the playlist lines the player has moved past.
    ///
    /// A category without a playlist has nothing to prune.
    pub fn clean_playlist(&self, category: &Category) -> Result<usize> {
        let playlist_path = self.layout.playlist_path(category);
        if !playlist_path.exists() {
            debug!(category = %category, "No playlist to clean");
            return Ok(0);
        }

        match reconciler::prune_consumed(&playlist_path, &self.layout.cursor_path(category)) {
            Ok(deleted) => {
                info!("{} playlist cleaned: {} songs deleted", category, deleted);
                Ok(deleted)
            }
            Err(e) => {
                error!(
                    path = %playlist_path.display(),
                    error = %e,
                    "cannot read/write playlist"
                );
                Err(e)
            }
        }
    }

    /// Delete song files the playlist no longer mentions.
    ///
    /// Nothing is deleted when the playlist cannot be read.
    pub fn clean_songs(&self, category: &Category) -> Result<usize> {
        let playlist_path = self.layout.playlist_path(category);
        let lines = read_playlist(&playlist_path).map_err(|e| {
            error!(path = %playlist_path.display(), error = %e, "cannot read playlist");
            e
        })?;

        let song_root = self.layout.song_root(category);
        if !song_root.is_dir() {
            return Ok(0);
        }

        let janitor = Janitor::new(&LocalTree, self.layout.playlist_root(), &lines);
        let deleted = janitor.clean(&song_root);

        info!("{} song storage cleaned: {} files deleted", category, deleted);
        Ok(deleted)
    }

    pub fn songs_remaining(&self, category: &Category) -> Result<usize> {
        reconciler::songs_remaining(&self.layout, category)
    }

    /// One full cycle for a category: send notes, prune the playlist, clean
    /// song storage, then download when too few songs remain.
    ///
    /// Each step runs even if an earlier one failed, as far as the state on
    /// disk allows; failures are logged and counted in the summary.
    pub async fn sync_category(&self, category: &Category, plan: &DownloadPlan) -> SyncSummary {
        let started_at = chrono::Local::now();
        let start_time = std::time::Instant::now();
        let mut errors = 0;

        let notes_sent = self.send_notes(category).await;
        if !notes_sent {
            errors += 1;
        }

        let songs_pruned = self.clean_playlist(category).unwrap_or_else(|_| {
            errors += 1;
            0
        });

        let has_playlist = self.layout.playlist_path(category).exists();

        let files_deleted = if has_playlist {
            self.clean_songs(category).unwrap_or_else(|_| {
                errors += 1;
                0
            })
        } else {
            0
        };

        let songs_remaining = if has_playlist {
            match self.songs_remaining(category) {
                Ok(remaining) => Some(remaining),
                Err(e) => {
                    warn!(category = %category, error = %e, "Skipping download decision");
                    errors += 1;
                    None
                }
            }
        } else {
            Some(0)
        };

        let download = match songs_remaining {
            Some(remaining) if remaining < plan.min_remaining => {
                info!(category = %category, remaining, "Downloading new songs");
                let outcome = self.download_batch(category, plan.count, plan.seed).await;
                if !matches!(outcome, BatchOutcome::Complete { .. }) {
                    errors += 1;
                }
                Some(outcome)
            }
            Some(remaining) => {
                debug!(category = %category, remaining, "Enough songs left");
                None
            }
            None => None,
        };

        let summary = SyncSummary {
            category: category.to_string(),
            started_at: started_at.to_rfc3339(),
            completed_at: chrono::Local::now().to_rfc3339(),
            duration_seconds: start_time.elapsed().as_secs(),
            notes_sent,
            songs_pruned,
            files_deleted,
            songs_remaining,
            download,
            errors_encountered: errors,
        };

        info!(
            "Sync of {} complete: {} pruned, {} files deleted, {} downloaded, {} errors in {}s",
            summary.category,
            summary.songs_pruned,
            summary.files_deleted,
            summary.download.map_or(0, |d| d.downloaded()),
            summary.errors_encountered,
            summary.duration_seconds
        );

        summary
    }
}
