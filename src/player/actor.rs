//! The playback actor.
//!
//! One task owns the playlist, the cursor flags and the write side of the
//! backend's input. Commands run strictly one after another; each backend
//! request is answered by reading reply lines before the next one is sent.
//! A periodic poll notices when a track ends on its own.

use std::sync::Arc;
use std::time::Duration;

use async_channel::Receiver;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

use super::command::{Command, PlayerError};
use super::snapshot::{playlist_snapshot, status_snapshot, StatusProperties, StatusSnapshot};
use crate::backend::{
  normalize_seconds, normalize_volume, parse_reply, volume_to_native, Dialect, PlayState, Property,
  SeekMode, VolumeMode, UNAVAILABLE,
};
use crate::playlist::{Advance, Direction, Playlist, TrackId};

/// Seconds skipped by the remapped aspect/subtitle keys.
const REMAP_SEEK_SECONDS: i64 = 10;

/// Tuning knobs for the actor.
#[derive(Debug, Clone)]
pub struct PlayerOptions {
  /// Repurpose Aspect/Audio/Subtitle as seek forward, OSD and seek back.
  pub remap_keys: bool,
  /// Period of the liveness poll and of stop confirmation.
  pub poll_interval: Duration,
}

impl Default for PlayerOptions {
  fn default() -> Self {
    Self {
      remap_keys: true,
      poll_interval: Duration::from_millis(250),
    }
  }
}

/// Result of waiting for a loaded track to start.
#[derive(Debug, PartialEq, Eq)]
enum PlaybackStart {
  Started,
  Unplayable(String),
}

/// Single owner of all playback state.
pub struct Player<W> {
  dialect: Arc<Dialect>,
  input: W,
  replies: Receiver<String>,
  commands: Receiver<Command>,
  playlist: Playlist,
  stopped: bool,
  options: PlayerOptions,
}

impl<W: AsyncWrite + Unpin + Send> Player<W> {
  pub fn new(
    dialect: Arc<Dialect>,
    input: W,
    replies: Receiver<String>,
    commands: Receiver<Command>,
    playlist: Playlist,
    options: PlayerOptions,
  ) -> Self {
    Self {
      dialect,
      input,
      replies,
      commands,
      playlist,
      stopped: false,
      options,
    }
  }

  /// Run until `Quit`, until every producer is gone, or until the backend
  /// connection fails.
  pub async fn run(mut self) -> Result<(), PlayerError> {
    log::info!(
      "Player started with {} tracks ({:?} backend)",
      self.playlist.len(),
      self.dialect.kind
    );

    let commands = self.commands.clone();
    let mut ticker = self.ticker();

    loop {
      tokio::select! {
        biased;
        command = commands.recv() => {
          let Ok(command) = command else {
            log::info!("Command queue closed, player exiting");
            return Ok(());
          };
          if !self.dispatch(command).await? {
            log::info!("Player quit");
            return Ok(());
          }
        }
        _ = ticker.tick() => self.poll().await?,
      }
    }
  }

  fn ticker(&self) -> Interval {
    let period = self.options.poll_interval;
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
  }

  /// Execute one command. Returns `false` once the player should stop.
  async fn dispatch(&mut self, command: Command) -> Result<bool, PlayerError> {
    log::debug!("Dispatching {:?}", command);

    if self.playlist.is_empty() && command.needs_track() {
      log::debug!("Playlist is empty, ignoring {:?}", command);
      return Ok(true);
    }

    match command {
      Command::Play(id) => self.play(id).await?,
      Command::Next => self.next().await?,
      Command::Prev => self.prev().await?,
      Command::Pause => self.pause().await?,
      Command::Stop => self.stop().await?,
      Command::Shuffle => self.playlist.toggle_shuffle(),
      Command::Loop => self.playlist.toggle_loop(),
      Command::Repeat => self.playlist.toggle_repeat(),
      Command::Aspect => self.aspect().await?,
      Command::Audio => self.audio().await?,
      Command::Subtitle => self.subtitle().await?,
      Command::Fullscreen => {
        let line = self.dialect.cmd_fullscreen;
        self.send(line).await?;
      }
      Command::Volume { value, mode } => {
        let native = volume_to_native(value, self.dialect.volume_max);
        let line = self.dialect.volume(native, mode);
        self.send(&line).await?;
      }
      Command::Seek { value, mode } => {
        let line = self.dialect.seek(value, mode);
        self.send(&line).await?;
      }
      Command::GetProperty { name, reply } => {
        let value = self.get_property(&Property::from_name(&name)).await?;
        let _ = reply.send(value);
      }
      Command::Status(reply) => {
        let status = self.status().await?;
        let _ = reply.send(status);
      }
      Command::Playlist(reply) => {
        let _ = reply.send(playlist_snapshot(&self.playlist));
      }
      Command::Quit => {
        let line = self.dialect.cmd_quit;
        self.send(line).await?;
        return Ok(false);
      }
    }
    Ok(true)
  }

  /// Play a track by id, or the current track.
  ///
  /// Tracks the backend refuses are skipped as if they had ended. Once every
  /// track has been refused in a row the player gives up and marks itself
  /// stopped.
  async fn play(&mut self, id: Option<TrackId>) -> Result<(), PlayerError> {
    if let Some(id) = id {
      if !self.playlist.jump_to(id) {
        log::debug!("Unknown track id {}, playing current track", id);
      }
    }

    let mut refused = 0;
    loop {
      let Some(track) = self.playlist.current() else {
        return Ok(());
      };

      // Some backends drop a loadfile sent right after a failed one.
      let noop = self.dialect.cmd_noop;
      self.send(noop).await?;
      let load = self.dialect.load(&track.source);
      self.send(&load).await?;

      match self.await_playback().await? {
        PlaybackStart::Started => {
          log::info!("Playing track {}: {}", track.id, track.source);
          self.stopped = false;
          return Ok(());
        }
        PlaybackStart::Unplayable(name) => {
          log::warn!("Backend cannot play file: {}", name);
          refused += 1;
          if refused >= self.playlist.len() {
            log::warn!("No playable track found");
            self.stopped = true;
            return Ok(());
          }
          if !self.step_forward().await? {
            return Ok(());
          }
        }
      }
    }
  }

  /// Read backend output until the loaded track starts or is refused.
  ///
  /// A refusal is an announcement followed by an empty line. This trusts the
  /// backend to print one or the other.
  async fn await_playback(&mut self) -> Result<PlaybackStart, PlayerError> {
    let mut announced: Option<String> = None;
    loop {
      let line = self.read_line().await?;
      if let Some(name) = self.dialect.playing_announcement(&line) {
        announced = Some(name.to_string());
        continue;
      }
      if line.is_empty() {
        if let Some(name) = announced.take() {
          return Ok(PlaybackStart::Unplayable(name));
        }
        continue;
      }
      if self.dialect.confirms_playback(&line) {
        return Ok(PlaybackStart::Started);
      }
    }
  }

  async fn next(&mut self) -> Result<(), PlayerError> {
    if self.step_forward().await? {
      self.play(None).await?;
    }
    Ok(())
  }

  /// Move the cursor for `Next`. Returns whether a track should now play.
  ///
  /// At the end of a non-looping playlist nothing is committed until the
  /// backend itself reports stopped; a track that is still playing keeps
  /// playing.
  async fn step_forward(&mut self) -> Result<bool, PlayerError> {
    if self.playlist.is_repeat() {
      return Ok(true);
    }

    match self.playlist.advance(Direction::Forward) {
      Advance::Moved(_) => Ok(true),
      Advance::EndReached => {
        if self.state().await? == PlayState::Stopped {
          log::info!("End of playlist reached");
          self.stopped = true;
          self.playlist.rewind();
        } else {
          log::debug!("End of playlist, backend still busy");
        }
        Ok(false)
      }
    }
  }

  async fn prev(&mut self) -> Result<(), PlayerError> {
    if let Advance::Moved(_) = self.playlist.advance(Direction::Backward) {
      self.play(None).await?;
    }
    Ok(())
  }

  async fn pause(&mut self) -> Result<(), PlayerError> {
    if self.stopped {
      return self.play(None).await;
    }
    let line = self.dialect.cmd_pause;
    self.send(line).await
  }

  /// Stop playback and block until the backend confirms it.
  async fn stop(&mut self) -> Result<(), PlayerError> {
    if self.stopped {
      return Ok(());
    }

    // Paused backends may ignore stop.
    if self.state().await? == PlayState::Paused {
      let line = self.dialect.cmd_pause;
      self.send(line).await?;
    }
    let line = self.dialect.cmd_stop;
    self.send(line).await?;

    let mut ticker = self.ticker();
    loop {
      ticker.tick().await;
      if self.state().await? == PlayState::Stopped {
        log::info!("Playback stopped");
        self.stopped = true;
        return Ok(());
      }
    }
  }

  async fn aspect(&mut self) -> Result<(), PlayerError> {
    if self.options.remap_keys {
      let line = self.dialect.seek(REMAP_SEEK_SECONDS, SeekMode::Relative);
      return self.send(&line).await;
    }

    let aspect = self.get_property(&Property::Aspect).await?;
    if let Ok(ratio) = aspect.parse::<f64>() {
      // Flip between 16:9 and 4:3.
      let target = if ratio < 1.5555 { "1.7777" } else { "1.3333" };
      let line = self.dialect.switch_ratio(target);
      self.send(&line).await?;
    }
    Ok(())
  }

  async fn audio(&mut self) -> Result<(), PlayerError> {
    let line = if self.options.remap_keys {
      self.dialect.cmd_osd
    } else {
      self.dialect.cmd_switch_audio
    };
    self.send(line).await
  }

  async fn subtitle(&mut self) -> Result<(), PlayerError> {
    if self.options.remap_keys {
      let line = self.dialect.seek(-REMAP_SEEK_SECONDS, SeekMode::Relative);
      return self.send(&line).await;
    }
    let line = self.dialect.cmd_sub_select;
    self.send(line).await
  }

  /// Liveness poll: advance when the backend has gone idle on its own.
  async fn poll(&mut self) -> Result<(), PlayerError> {
    if self.stopped || self.playlist.is_empty() {
      return Ok(());
    }
    if self.state().await? == PlayState::Stopped {
      log::debug!("Track finished");
      self.next().await?;
    }
    Ok(())
  }

  async fn status(&mut self) -> Result<StatusSnapshot, PlayerError> {
    let fullscreen = self.get_property(&Property::Fullscreen).await?;
    let volume = self.get_property(&Property::Volume).await?;
    let length = self.get_property(&Property::Length).await?;
    let state = self.state().await?;
    let time = self.get_property(&Property::TimePos).await?;
    let filename = match state {
      PlayState::Stopped => None,
      _ => Some(self.get_property(&Property::Filename).await?),
    };

    let props = StatusProperties {
      state,
      fullscreen,
      volume,
      length,
      time,
      filename,
    };
    Ok(status_snapshot(&self.playlist, &props))
  }

  /// Query a property and normalize the reply.
  async fn get_property(&mut self, property: &Property) -> Result<String, PlayerError> {
    let dialect = Arc::clone(&self.dialect);
    let Some(name) = dialect.property_name(property) else {
      return Ok(self.state().await?.to_string());
    };

    let raw = self.query(name).await?;
    Ok(match property {
      Property::Length | Property::TimePos => normalize_seconds(&raw),
      Property::Volume => normalize_volume(&raw, dialect.volume_max),
      _ => raw,
    })
  }

  /// The `state` pseudo-property.
  async fn state(&mut self) -> Result<PlayState, PlayerError> {
    let (prop_filename, prop_pause) = (self.dialect.prop_filename, self.dialect.prop_pause);
    let filename = self.query(prop_filename).await?;
    if filename == UNAVAILABLE {
      return Ok(PlayState::Stopped);
    }
    let paused = self.query(prop_pause).await?;
    Ok(if paused == "yes" {
      PlayState::Paused
    } else {
      PlayState::Playing
    })
  }

  /// Send a get-property request and read until its answer.
  async fn query(&mut self, name: &str) -> Result<String, PlayerError> {
    let line = self.dialect.get_property(name);
    self.send(&line).await?;
    loop {
      let reply = self.read_line().await?;
      if let Some(value) = parse_reply(&reply, name) {
        return Ok(value);
      }
    }
  }

  async fn send(&mut self, line: &str) -> Result<(), PlayerError> {
    log::debug!("-> backend: {}", line);
    self.input.write_all(line.as_bytes()).await?;
    self.input.write_all(b"\n").await?;
    self.input.flush().await?;
    Ok(())
  }

  async fn read_line(&mut self) -> Result<String, PlayerError> {
    let line = self.replies.recv().await.map_err(|_| PlayerError::BackendClosed)?;
    log::trace!("<- backend: {}", line);
    Ok(line)
  }
}

impl<W> Drop for Player<W> {
  /// Close the queue and drop whatever is left in it, so producers waiting
  /// on a reply see it dropped instead of waiting forever.
  fn drop(&mut self) {
    self.commands.close();
    let mut dropped = 0;
    while self.commands.try_recv().is_ok() {
      dropped += 1;
    }
    if dropped > 0 {
      log::debug!("Dropped {} queued commands", dropped);
    }
  }
}
