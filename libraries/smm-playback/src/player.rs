use crate::engine::MediaEngine;
use crate::error::{PlaybackError, Result};
use crate::events::{PlayerCommand, PlayerEvent};
use crate::types::{PlayState, PlayerConfig, PlayerSnapshot};
use smm_sync::{
    read_playlist, resolve_resume_point, songs, Category, Cursor, CursorStore, FileCursorStore,
    NoteBuffer,
};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

const EVENT_CAPACITY: usize = 64;
const COMMAND_CAPACITY: usize = 32;

/// Player state machine.
///
/// Owns the loaded playlist, the current song and the media engine. The
/// cursor is saved whenever playback pauses, moves past the end of the
/// playlist, or shuts down, so a crash loses at most the current song's
/// position.
pub struct Player<E: MediaEngine> {
    engine: E,
    store: FileCursorStore,
    notes: NoteBuffer,
    config: PlayerConfig,
    state: PlayState,
    category: Option<Category>,
    playlist: Vec<String>,
    index: Option<usize>,
    events: broadcast::Sender<PlayerEvent>,
}

impl<E: MediaEngine> Player<E> {
    pub fn new(engine: E, store: FileCursorStore, config: PlayerConfig) -> Self {
        let notes = NoteBuffer::new(store.layout().smm_root());
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            engine,
            store,
            notes,
            config,
            state: PlayState::Idle,
            category: None,
            playlist: Vec::new(),
            index: None,
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PlayerEvent> {
        self.events.subscribe()
    }

    pub fn state(&self) -> PlayState {
        self.state
    }

    pub fn snapshot(&self) -> PlayerSnapshot {
        PlayerSnapshot {
            state: self.state,
            category: self.category.as_ref().map(ToString::to_string),
            song: self.current_song().map(str::to_string),
            index: self.index,
            count: self.playlist.len(),
            position_ms: if self.state == PlayState::Idle {
                0
            } else {
                self.engine.position_ms()
            },
        }
    }

    /// Dispatch one command.
    pub fn handle(&mut self, command: PlayerCommand) -> Result<()> {
        match command {
            PlayerCommand::LoadPlaylist(name) => {
                let category = Category::new(name)?;
                self.load_playlist(category, PlayState::Playing)
            }
            PlayerCommand::Play => self.play(),
            PlayerCommand::Pause => self.pause(),
            PlayerCommand::Next | PlayerCommand::TrackFinished => self.next(),
            PlayerCommand::Previous => self.previous(),
            PlayerCommand::Jump(number) => self.jump(number),
            PlayerCommand::Seek(position_ms) => {
                self.seek(position_ms);
                Ok(())
            }
            PlayerCommand::ResetPlaylist => self.reset_playlist(),
            PlayerCommand::Note(text) => self.note(&text),
            PlayerCommand::SaveState => self.save_state(),
            PlayerCommand::Snapshot(reply) => {
                let _ = reply.send(self.snapshot());
                Ok(())
            }
            PlayerCommand::Shutdown => self.shutdown(),
        }
    }

    /// Reload the category that was playing when state was last saved,
    /// paused at its resume point. Returns false when there is nothing to
    /// restore.
    pub fn restore(&mut self) -> Result<bool> {
        let Some(category) = self.store.positions().current_category() else {
            debug!("No saved category to restore");
            return Ok(false);
        };

        match self.load_playlist(category, PlayState::Paused) {
            Ok(()) => Ok(true),
            Err(e) => {
                warn!(error = %e, "cannot restore saved playlist");
                self.set_idle_null();
                self.emit(PlayerEvent::StateChanged {
                    state: PlayState::Idle,
                });
                Err(e)
            }
        }
    }

    /// Load `category` at its resume point and enter `target` state.
    pub fn load_playlist(&mut self, category: Category, target: PlayState) -> Result<()> {
        let path = self.store.layout().playlist_path(&category);
        let lines = read_playlist(&path)?;
        let playlist: Vec<String> = songs(&lines).map(str::to_string).collect();
        if playlist.is_empty() {
            return Err(PlaybackError::EmptyPlaylist(path.display().to_string()));
        }

        let cursor = self.store.load(&category)?;
        let refs: Vec<&str> = playlist.iter().map(String::as_str).collect();
        let resume = resolve_resume_point(&refs, &cursor);

        info!(
            category = %category,
            start_at = resume.start_at,
            position_ms = resume.position_ms,
            "Playlist loaded"
        );

        self.category = Some(category);
        self.playlist = playlist;
        self.index = Some(resume.start_at);

        match target {
            PlayState::Idle => {
                self.engine.reset();
                self.set_state(PlayState::Idle);
                Ok(())
            }
            PlayState::Playing => self.play_song(resume.start_at, resume.position_ms),
            PlayState::Paused => {
                self.play_song(resume.start_at, resume.position_ms)?;
                self.pause()
            }
        }
    }

    fn play(&mut self) -> Result<()> {
        match self.state {
            PlayState::Playing => Ok(()),
            PlayState::Paused => {
                self.engine.play();
                self.set_state(PlayState::Playing);
                Ok(())
            }
            PlayState::Idle => {
                if self.playlist.is_empty() {
                    return Err(PlaybackError::NoPlaylist);
                }
                self.play_song(self.index.unwrap_or(0), 0)
            }
        }
    }

    fn pause(&mut self) -> Result<()> {
        if self.state != PlayState::Playing {
            debug!("pause while not playing");
            return Ok(());
        }

        self.engine.pause();
        self.set_state(PlayState::Paused);
        self.save_state()
    }

    /// Advance one song; at the end of the playlist stop instead of
    /// wrapping. State is saved either way.
    fn next(&mut self) -> Result<()> {
        let played = if self.playlist.is_empty() {
            self.index = None;
            self.stop();
            Ok(())
        } else {
            match self.index {
                Some(i) if i + 1 < self.playlist.len() => self.play_song(i + 1, 0),
                None => self.play_song(0, 0),
                Some(_) => {
                    info!("End of playlist");
                    self.stop();
                    Ok(())
                }
            }
        };

        let saved = self.save_state();
        played.and(saved)
    }

    fn previous(&mut self) -> Result<()> {
        if self.state != PlayState::Idle
            && self.engine.position_ms() > self.config.previous_threshold_ms
        {
            self.seek(0);
            return Ok(());
        }

        match self.index {
            Some(i) if i > 0 => self.play_song(i - 1, 0),
            _ => {
                // At the start of the playlist; stopping tells the listener so
                self.stop();
                Ok(())
            }
        }
    }

    fn jump(&mut self, number: usize) -> Result<()> {
        if number == 0 || number > self.playlist.len() {
            return Err(PlaybackError::IndexOutOfBounds(number));
        }
        self.play_song(number - 1, 0)
    }

    fn seek(&mut self, position_ms: u64) {
        if self.state == PlayState::Idle {
            return;
        }
        self.engine.seek(position_ms);
        self.emit(PlayerEvent::Position { position_ms });
    }

    fn reset_playlist(&mut self) -> Result<()> {
        if self.playlist.is_empty() {
            return Err(PlaybackError::NoPlaylist);
        }
        self.play_song(0, 0)
    }

    fn note(&mut self, text: &str) -> Result<()> {
        let (Some(category), Some(song)) = (self.category.as_ref(), self.current_song()) else {
            return Err(PlaybackError::NoPlaylist);
        };
        self.notes.append(category, song, text)?;
        Ok(())
    }

    /// Write the cursor and remember the current category.
    ///
    /// The position is 0 when idle.
    pub fn save_state(&mut self) -> Result<()> {
        let Some(category) = self.category.clone() else {
            return Ok(());
        };

        let cursor = Cursor {
            last_played: self.current_song().map(str::to_string),
            position_ms: if self.state == PlayState::Idle {
                0
            } else {
                self.engine.position_ms()
            },
        };

        let saved = self.store.save(&category, &cursor);
        let current = self.store.positions().set_current_category(&category);
        saved.and(current)?;
        Ok(())
    }

    /// Force idle and save state; a paused song keeps its position.
    fn shutdown(&mut self) -> Result<()> {
        let saved = match self.state {
            PlayState::Paused => self.save_state(),
            PlayState::Playing => {
                self.engine.pause();
                self.set_state(PlayState::Idle);
                self.save_state()
            }
            PlayState::Idle => self.save_state(),
        };

        self.set_state(PlayState::Idle);
        self.engine.reset();
        saved
    }

    fn play_song(&mut self, index: usize, position_ms: u64) -> Result<()> {
        let Some(song) = self.playlist.get(index).cloned() else {
            return Err(PlaybackError::IndexOutOfBounds(index + 1));
        };
        let Some(category) = self.category.as_ref().map(ToString::to_string) else {
            return Err(PlaybackError::NoPlaylist);
        };

        self.index = Some(index);
        let previous_state = self.state;
        self.state = PlayState::Idle;

        let path = self.store.layout().playlist_root().join(&song);
        debug!(song = %song, position_ms, "play");

        if let Err(e) = self.engine.load(&path) {
            // A song listed but not playable points at a sync bug or a failing disk
            error!(song = %song, error = %e, "can't play");
            if previous_state != PlayState::Idle {
                self.emit(PlayerEvent::StateChanged {
                    state: PlayState::Idle,
                });
            }
            self.emit_meta(category, song);
            return Err(e);
        }

        self.engine.play();
        self.state = PlayState::Playing;
        if previous_state != PlayState::Playing {
            self.emit(PlayerEvent::StateChanged {
                state: PlayState::Playing,
            });
        }
        self.emit_meta(category, song);

        if position_ms != 0 {
            self.engine.seek(position_ms);
            self.emit(PlayerEvent::Position { position_ms });
        }
        Ok(())
    }

    fn stop(&mut self) {
        self.engine.reset();
        self.set_state(PlayState::Idle);
    }

    fn set_idle_null(&mut self) {
        self.engine.reset();
        self.state = PlayState::Idle;
        self.category = None;
        self.playlist.clear();
        self.index = None;
    }

    fn current_song(&self) -> Option<&str> {
        self.index
            .and_then(|i| self.playlist.get(i))
            .map(String::as_str)
    }

    fn set_state(&mut self, state: PlayState) {
        if self.state != state {
            self.state = state;
            self.emit(PlayerEvent::StateChanged { state });
        }
    }

    fn emit_meta(&self, category: String, song: String) {
        self.emit(PlayerEvent::MetaChanged {
            category,
            song,
            index: self.index.map_or(0, |i| i + 1),
            count: self.playlist.len(),
        });
    }

    fn emit(&self, event: PlayerEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }
}

impl<E: MediaEngine + 'static> Player<E> {
    /// Process commands until `Shutdown` or until every sender is gone,
    /// emitting position updates while playing.
    pub async fn run(mut self, mut commands: mpsc::Receiver<PlayerCommand>) {
        let mut ticker = interval(Duration::from_millis(self.config.position_interval_ms.max(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                command = commands.recv() => {
                    let Some(command) = command else {
                        let _ = self.shutdown();
                        break;
                    };

                    let stop = matches!(command, PlayerCommand::Shutdown);
                    if let Err(e) = self.handle(command) {
                        warn!(error = %e, "Player command failed");
                        self.emit(PlayerEvent::Error { message: e.to_string() });
                    }
                    if stop {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    if self.state == PlayState::Playing {
                        let position_ms = self.engine.position_ms();
                        self.emit(PlayerEvent::Position { position_ms });
                    }
                }
            }
        }

        debug!("Player task stopped");
    }
}

/// Handle to a player running as its own task.
pub struct PlayerHandle {
    commands: mpsc::Sender<PlayerCommand>,
    events: broadcast::Sender<PlayerEvent>,
    task: JoinHandle<()>,
}

impl PlayerHandle {
    /// Spawn `player` onto the current tokio runtime.
    pub fn spawn<E: MediaEngine + 'static>(player: Player<E>) -> Self {
        let (commands, receiver) = mpsc::channel(COMMAND_CAPACITY);
        let events = player.events.clone();
        let task = tokio::spawn(player.run(receiver));
        Self {
            commands,
            events,
            task,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PlayerEvent> {
        self.events.subscribe()
    }

    pub async fn send(&self, command: PlayerCommand) -> Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| PlaybackError::ChannelClosed)
    }

    pub async fn snapshot(&self) -> Result<PlayerSnapshot> {
        let (reply, response) = oneshot::channel();
        self.send(PlayerCommand::Snapshot(reply)).await?;
        response.await.map_err(|_| PlaybackError::ChannelClosed)
    }

    /// Shut the player down and wait for its task to finish.
    pub async fn shutdown(self) -> Result<()> {
        self.send(PlayerCommand::Shutdown).await?;
        self.task.await.map_err(|_| PlaybackError::ChannelClosed)
    }
}
