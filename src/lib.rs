//! Remote-control bridge for MPlayer and mpv.
//!
//! Starts a backend in slave mode, owns the playlist in a single player task
//! and exposes the player over a VLC-style HTTP remote.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::process::Child;

pub mod backend;
pub mod config;
pub mod player;
pub mod playlist;
pub mod remote;

pub use config::{AppConfig, ConfigError};

use backend::{
  forward, select_backend, spawn_backend, wait_for_exit, BackendProcess, Dialect, DialectKind,
  ProcessError,
};
use player::{Player, PlayerError, PlayerHandle};
use playlist::Playlist;
use remote::RemoteError;

/// Time allowed for the backend to exit after the player quits.
const QUIT_GRACE: Duration = Duration::from_secs(5);

#[derive(Error, Debug)]
pub enum AppError {
  #[error(transparent)]
  Config(#[from] ConfigError),
  #[error(transparent)]
  Process(#[from] ProcessError),
  #[error(transparent)]
  Player(#[from] PlayerError),
  #[error(transparent)]
  Remote(#[from] RemoteError),
  #[error("Failed to install signal handler: {0}")]
  Signal(std::io::Error),
  #[error("Player task failed: {0}")]
  Task(#[from] tokio::task::JoinError),
}

/// Run the bridge until the backend exits or something fatal happens.
pub async fn run(config: AppConfig, tracks: Vec<String>) -> Result<(), AppError> {
  config.validate()?;

  let binary = select_backend(config.backend.as_deref())?;
  let dialect = Arc::new(load_dialect(&binary).await);
  let BackendProcess { child, stdin, lines } =
    spawn_backend(&binary, &dialect, &config.backend_args).await?;

  let (cmd_tx, cmd_rx) = async_channel::unbounded();
  let replies = forward(lines, Arc::clone(&dialect), cmd_tx.clone());
  tokio::spawn(exit_with_backend(child));

  let mut playlist = Playlist::from_sources(tracks);
  if config.shuffle {
    playlist.shuffle_from_random_start(&mut rand::rng());
  }

  let handle = PlayerHandle::new(cmd_tx);
  let player = Player::new(dialect, stdin, replies, cmd_rx, playlist, config.player_options());
  let mut actor = tokio::spawn(player.run());

  handle.play(None)?;
  spawn_signal_handlers(handle.clone()).map_err(AppError::Signal)?;

  let server = remote::serve(remote::router(handle, &config.password), config.port);
  tokio::select! {
    result = server => {
      result?;
      Ok(())
    }
    joined = &mut actor => {
      joined??;
      // The exit watcher ends the process once the backend is gone.
      tokio::time::sleep(QUIT_GRACE).await;
      log::warn!("Backend did not exit after quit");
      Ok(())
    }
  }
}

/// Dialect for the selected binary. mpv is probed on a blocking thread.
async fn load_dialect(binary: &Path) -> Dialect {
  let dialect = Dialect::for_binary(binary);
  if dialect.kind != DialectKind::Mpv {
    return dialect;
  }

  let path = binary.to_path_buf();
  match tokio::task::spawn_blocking(move || Dialect::probe_mpv(&path)).await {
    Ok(probed) => probed,
    Err(e) => {
      log::warn!("mpv probe failed, using defaults: {}", e);
      dialect
    }
  }
}

/// Exit the program as soon as the backend exits.
async fn exit_with_backend(child: Child) {
  match wait_for_exit(child).await {
    Ok(status) if !status.success() => log::warn!("Backend exited with {}", status),
    Ok(_) => {}
    Err(e) => log::error!("Failed to wait for backend: {}", e),
  }
  std::process::exit(0);
}

/// Map OS signals onto player commands.
#[cfg(unix)]
fn spawn_signal_handlers(handle: PlayerHandle) -> std::io::Result<()> {
  use player::Command;
  use tokio::signal::unix::{signal, SignalKind};

  let mappings: [(SignalKind, &'static str, fn() -> Command); 4] = [
    (SignalKind::user_defined1(), "SIGUSR1", || Command::Prev),
    (SignalKind::user_defined2(), "SIGUSR2", || Command::Next),
    (SignalKind::interrupt(), "SIGINT", || Command::Quit),
    (SignalKind::terminate(), "SIGTERM", || Command::Quit),
  ];

  for (kind, name, command) in mappings {
    let mut stream = signal(kind)?;
    let handle = handle.clone();
    tokio::spawn(async move {
      while stream.recv().await.is_some() {
        log::info!("Received {}", name);
        if handle.enqueue(command()).is_err() {
          break;
        }
      }
    });
  }
  Ok(())
}

#[cfg(not(unix))]
fn spawn_signal_handlers(handle: PlayerHandle) -> std::io::Result<()> {
  tokio::spawn(async move {
    while tokio::signal::ctrl_c().await.is_ok() {
      log::info!("Received Ctrl-C");
      if handle.quit().is_err() {
        break;
      }
    }
  });
  Ok(())
}
