//! Backend binary detection and process spawning.

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};

use async_channel::Receiver;
use thiserror::Error;
use tokio::process::{Child, ChildStdin, Command};

use super::dialect::{Dialect, StartupLine};
use super::reader::merge_lines;

#[derive(Error, Debug)]
pub enum ProcessError {
  #[error("Backend executable not found: {0}")]
  NotFound(String),
  #[error("Failed to spawn backend: {0}")]
  SpawnFailed(#[from] std::io::Error),
  #[error("Backend {0} pipe unavailable")]
  MissingPipe(&'static str),
  #[error("Backend failed to start: {0}")]
  StartupFailed(String),
  #[error("Backend exited during startup")]
  ExitedDuringStartup,
}

/// A running backend with its input stream and merged output lines.
pub struct BackendProcess {
  pub child: Child,
  pub stdin: ChildStdin,
  pub lines: Receiver<String>,
}

/// Find a backend executable in common locations.
pub fn find_backend(name: &str) -> Option<PathBuf> {
  // Check PATH first
  if let Ok(path) = which::which(name) {
    return Some(path);
  }

  #[cfg(windows)]
  {
    let common_dirs = [r"C:\Program Files", r"C:\Program Files (x86)", r"C:\"];
    for dir in common_dirs {
      let p = PathBuf::from(dir).join(name).join(format!("{}.exe", name));
      if p.exists() {
        return Some(p);
      }
    }
  }

  #[cfg(not(windows))]
  {
    let common_dirs = ["/usr/bin", "/usr/local/bin", "/opt/homebrew/bin"];
    for dir in common_dirs {
      let p = PathBuf::from(dir).join(name);
      if p.exists() {
        return Some(p);
      }
    }
  }

  None
}

/// Choose the backend binary.
///
/// An explicit override must exist. Otherwise a program name mentioning
/// mpv prefers mpv, and the first installed of the two backends wins.
pub fn select_backend(override_binary: Option<&str>) -> Result<PathBuf, ProcessError> {
  if let Some(binary) = override_binary.filter(|b| !b.trim().is_empty()) {
    let path = Path::new(binary);
    if path.components().count() > 1 && path.exists() {
      return Ok(path.to_path_buf());
    }
    return find_backend(binary).ok_or_else(|| ProcessError::NotFound(binary.to_string()));
  }

  let prefers_mpv = std::env::args()
    .next()
    .map(|arg0| {
      Path::new(&arg0)
        .file_stem()
        .map(|s| s.to_string_lossy().contains("mpv"))
        .unwrap_or(false)
    })
    .unwrap_or(false);
  let order = if prefers_mpv {
    ["mpv", "mplayer"]
  } else {
    ["mplayer", "mpv"]
  };

  order
    .iter()
    .find_map(|name| find_backend(name))
    .ok_or_else(|| ProcessError::NotFound(order.join(" or ")))
}

/// Spawn the backend in slave mode and wait until it reports readiness.
pub async fn spawn_backend(
  path: &Path,
  dialect: &Dialect,
  extra_args: &[String],
) -> Result<BackendProcess, ProcessError> {
  log::info!("Spawning backend: {:?} {:?}", path, dialect.start_flags);
  if !extra_args.is_empty() {
    log::info!("Extra backend args: {:?}", extra_args);
  }

  let mut cmd = Command::new(path);
  cmd
    .args(dialect.start_flags)
    .args(extra_args)
    .stdin(Stdio::piped())
    .stdout(Stdio::piped())
    .stderr(Stdio::piped())
    .kill_on_drop(true);

  let mut child = cmd.spawn()?;
  let stdin = child.stdin.take().ok_or(ProcessError::MissingPipe("stdin"))?;
  let stdout = child.stdout.take().ok_or(ProcessError::MissingPipe("stdout"))?;
  let stderr = child.stderr.take().ok_or(ProcessError::MissingPipe("stderr"))?;

  let lines = merge_lines(stdout, stderr);
  wait_for_startup(&lines, dialect).await?;

  Ok(BackendProcess { child, stdin, lines })
}

/// Consume startup output until the dialect's ready or failure line.
pub async fn wait_for_startup(lines: &Receiver<String>, dialect: &Dialect) -> Result<(), ProcessError> {
  while let Ok(line) = lines.recv().await {
    match dialect.startup_line(&line) {
      StartupLine::Failed => return Err(ProcessError::StartupFailed(line)),
      StartupLine::Ready => {
        log::info!("Backend ready: {}", line);
        return Ok(());
      }
      StartupLine::Other => log::debug!("Backend startup: {}", line),
    }
  }
  Err(ProcessError::ExitedDuringStartup)
}

/// Wait for the backend to exit.
pub async fn wait_for_exit(mut child: Child) -> std::io::Result<ExitStatus> {
  let pid = child.id();
  let status = child.wait().await?;
  log::info!("Backend process (pid: {:?}) exited with: {}", pid, status);
  Ok(status)
}
