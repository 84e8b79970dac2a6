//! Player commands and the producer-side handle.

use async_channel::Sender;
use thiserror::Error;
use tokio::sync::oneshot;

use super::snapshot::{PlaylistEntry, StatusSnapshot};
use crate::backend::{SeekMode, VolumeMode};
use crate::playlist::TrackId;

#[derive(Error, Debug)]
pub enum PlayerError {
  #[error("Backend write failed: {0}")]
  Write(#[from] std::io::Error),
  #[error("Backend output closed")]
  BackendClosed,
  #[error("Player is not running")]
  QueueClosed,
  #[error("Player dropped the reply")]
  ReplyDropped,
}

/// A request executed by the player, one at a time, in queue order.
#[derive(Debug)]
pub enum Command {
  /// Play a track by id, or the current track for `None` or an unknown id.
  Play(Option<TrackId>),
  Next,
  Prev,
  /// Toggle pause; starts playback when stopped.
  Pause,
  Stop,
  Shuffle,
  Loop,
  Repeat,
  Aspect,
  Audio,
  Subtitle,
  Fullscreen,
  /// Volume on the canonical 0-320 scale.
  Volume { value: i64, mode: VolumeMode },
  Seek { value: i64, mode: SeekMode },
  GetProperty { name: String, reply: oneshot::Sender<String> },
  Status(oneshot::Sender<StatusSnapshot>),
  Playlist(oneshot::Sender<Vec<PlaylistEntry>>),
  Quit,
}

impl Command {
  /// Whether the command drives the backend's transport and so means
  /// nothing without a playlist.
  pub fn needs_track(&self) -> bool {
    matches!(
      self,
      Command::Play(_)
        | Command::Next
        | Command::Prev
        | Command::Pause
        | Command::Stop
        | Command::Aspect
        | Command::Audio
        | Command::Subtitle
        | Command::Fullscreen
        | Command::Volume { .. }
        | Command::Seek { .. }
    )
  }
}

/// Cloneable handle used by every command producer.
#[derive(Debug, Clone)]
pub struct PlayerHandle {
  tx: Sender<Command>,
}

impl PlayerHandle {
  pub fn new(tx: Sender<Command>) -> Self {
    Self { tx }
  }

  /// Queue a command without waiting for it to run.
  pub fn enqueue(&self, command: Command) -> Result<(), PlayerError> {
    self.tx.try_send(command).map_err(|_| PlayerError::QueueClosed)
  }

  pub fn play(&self, id: Option<TrackId>) -> Result<(), PlayerError> {
    self.enqueue(Command::Play(id))
  }

  pub fn next(&self) -> Result<(), PlayerError> {
    self.enqueue(Command::Next)
  }

  pub fn prev(&self) -> Result<(), PlayerError> {
    self.enqueue(Command::Prev)
  }

  pub fn pause(&self) -> Result<(), PlayerError> {
    self.enqueue(Command::Pause)
  }

  pub fn stop(&self) -> Result<(), PlayerError> {
    self.enqueue(Command::Stop)
  }

  pub fn volume(&self, value: i64, mode: VolumeMode) -> Result<(), PlayerError> {
    self.enqueue(Command::Volume { value, mode })
  }

  pub fn seek(&self, value: i64, mode: SeekMode) -> Result<(), PlayerError> {
    self.enqueue(Command::Seek { value, mode })
  }

  pub fn quit(&self) -> Result<(), PlayerError> {
    self.enqueue(Command::Quit)
  }

  /// Read a normalized property value.
  pub async fn get_property(&self, name: &str) -> Result<String, PlayerError> {
    let (reply, rx) = oneshot::channel();
    self.enqueue(Command::GetProperty {
      name: name.to_string(),
      reply,
    })?;
    rx.await.map_err(|_| PlayerError::ReplyDropped)
  }

  /// Current status, computed after every earlier command has run.
  pub async fn status(&self) -> Result<StatusSnapshot, PlayerError> {
    let (reply, rx) = oneshot::channel();
    self.enqueue(Command::Status(reply))?;
    rx.await.map_err(|_| PlayerError::ReplyDropped)
  }

  /// Playlist in play order, computed after every earlier command has run.
  pub async fn playlist(&self) -> Result<Vec<PlaylistEntry>, PlayerError> {
    let (reply, rx) = oneshot::channel();
    self.enqueue(Command::Playlist(reply))?;
    rx.await.map_err(|_| PlayerError::ReplyDropped)
  }
}
