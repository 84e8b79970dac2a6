//! In-memory MPlayer stand-in for driving the player in tests.

use std::sync::Arc;
use std::time::Duration;

use async_channel::Sender;
use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, BufReader, DuplexStream};
use tokio::task::JoinHandle;

use super::actor::{Player, PlayerOptions};
use super::command::{PlayerError, PlayerHandle};
use crate::backend::{Dialect, REPLY_CAPACITY};
use crate::playlist::Playlist;

pub struct FakeOptions {
  /// Sources the fake refuses to play.
  pub unplayable: Vec<String>,
  /// Filename queries still answered as loaded after a stop.
  pub stop_lag: usize,
  pub remap_keys: bool,
  pub poll_interval: Duration,
}

impl Default for FakeOptions {
  fn default() -> Self {
    Self {
      unplayable: Vec::new(),
      stop_lag: 0,
      remap_keys: true,
      // Long enough that the liveness poll stays out of the way.
      poll_interval: Duration::from_secs(30),
    }
  }
}

#[derive(Default)]
struct FakeState {
  loaded: Option<String>,
  paused: bool,
  volume: i64,
  pending_stop: Option<usize>,
  log: Vec<String>,
}

/// Test-side view of the fake backend.
#[derive(Clone)]
pub struct FakeBackend {
  state: Arc<Mutex<FakeState>>,
  reply_tx: Arc<Mutex<Option<Sender<String>>>>,
}

impl FakeBackend {
  /// Every line the player wrote, in order.
  pub fn commands(&self) -> Vec<String> {
    self.state.lock().log.clone()
  }

  /// Let the current track end on its own.
  pub fn finish_track(&self) {
    let mut state = self.state.lock();
    state.loaded = None;
    state.paused = false;
  }

  /// Close the backend's output as if the process died.
  pub fn crash(&self) {
    self.reply_tx.lock().take();
  }
}

pub struct Harness {
  pub handle: PlayerHandle,
  pub backend: FakeBackend,
  pub task: JoinHandle<Result<(), PlayerError>>,
}

/// Start a player over the fake backend with the given playlist.
pub fn start(sources: &[&str], options: FakeOptions) -> Harness {
  let (client, server) = tokio::io::duplex(64 * 1024);
  let (reply_tx, reply_rx) = async_channel::bounded(REPLY_CAPACITY);
  let (cmd_tx, cmd_rx) = async_channel::unbounded();

  let backend = FakeBackend {
    state: Arc::new(Mutex::new(FakeState {
      volume: 100,
      ..FakeState::default()
    })),
    reply_tx: Arc::new(Mutex::new(Some(reply_tx))),
  };
  tokio::spawn(respond(server, backend.clone(), options.unplayable, options.stop_lag));

  let player = Player::new(
    Arc::new(Dialect::mplayer()),
    client,
    reply_rx,
    cmd_rx,
    Playlist::from_sources(sources.iter().copied()),
    PlayerOptions {
      remap_keys: options.remap_keys,
      poll_interval: options.poll_interval,
    },
  );

  Harness {
    handle: PlayerHandle::new(cmd_tx),
    backend,
    task: tokio::spawn(player.run()),
  }
}

async fn respond(server: DuplexStream, backend: FakeBackend, unplayable: Vec<String>, stop_lag: usize) {
  let mut lines = BufReader::new(server).lines();
  while let Ok(Some(line)) = lines.next_line().await {
    let replies = answer(&backend, &line, &unplayable, stop_lag);
    let Some(tx) = backend.reply_tx.lock().clone() else {
      return;
    };
    for reply in replies {
      if tx.send(reply).await.is_err() {
        return;
      }
    }
    if line == "quit" {
      backend.reply_tx.lock().take();
      return;
    }
  }
}

fn answer(backend: &FakeBackend, line: &str, unplayable: &[String], stop_lag: usize) -> Vec<String> {
  let mut state = backend.state.lock();
  state.log.push(line.to_string());

  if let Some(track) = line.strip_prefix("loadfile ") {
    state.paused = false;
    if unplayable.iter().any(|u| u == track) {
      state.loaded = None;
      return vec![format!("Playing {}.", track), String::new()];
    }
    state.loaded = Some(track.to_string());
    return vec![
      format!("Playing {}.", track),
      "Audio: no sound".to_string(),
      "Starting playback...".to_string(),
    ];
  }

  if let Some(name) = line.strip_prefix("pausing_keep_force get_property ") {
    if name == "filename" {
      match state.pending_stop {
        Some(0) => {
          state.loaded = None;
          state.pending_stop = None;
        }
        Some(n) => state.pending_stop = Some(n - 1),
        None => {}
      }
    }
    let value = match (name, &state.loaded) {
      (_, None) if name != "pause" && name != "volume" => None,
      ("filename", Some(track)) => Some(track.clone()),
      ("pause", _) => Some(if state.paused { "yes" } else { "no" }.to_string()),
      ("volume", _) => Some(format!("{}.000000", state.volume)),
      ("length", _) => Some("125.00".to_string()),
      ("time_pos", _) => Some("61.4".to_string()),
      ("fullscreen", _) => Some("no".to_string()),
      ("aspect", _) => Some("1.3333".to_string()),
      _ => return vec!["ANS_ERROR=PROPERTY_UNKNOWN".to_string()],
    };
    return match value {
      Some(v) => vec![format!("ANS_{}={}", name, v)],
      None => vec!["ANS_ERROR=PROPERTY_UNAVAILABLE".to_string()],
    };
  }

  if let Some(rest) = line.strip_prefix("pausing_keep_force volume ") {
    if let Some(value) = rest.split(' ').next().and_then(|v| v.parse().ok()) {
      state.volume = value;
    }
    return Vec::new();
  }

  match line {
    "pause" if state.loaded.is_some() => state.paused = !state.paused,
    "stop" => {
      state.paused = false;
      if stop_lag == 0 {
        state.loaded = None;
      } else {
        state.pending_stop = Some(stop_lag);
      }
    }
    _ => {}
  }
  Vec::new()
}
