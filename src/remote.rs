//! HTTP remote control.
//!
//! Serves the status and playlist documents polled by VLC-style remote apps
//! and turns their query-string commands into player commands. Every request
//! needs Basic auth with an empty user name.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
  extract::{Query, State},
  http::{header, HeaderMap, StatusCode},
  response::{IntoResponse, Response},
  routing::get,
  Json, Router,
};
use base64::Engine;
use serde::Serialize;
use thiserror::Error;

use crate::backend::{SeekMode, VolumeMode, CANONICAL_VOLUME_MAX};
use crate::player::{Command, PlayerError, PlayerHandle, PlaylistEntry, StatusSnapshot};

#[derive(Error, Debug)]
pub enum RemoteError {
  #[error("Failed to bind HTTP port {0}: {1}")]
  Bind(u16, std::io::Error),
  #[error("HTTP server failed: {0}")]
  Serve(std::io::Error),
  #[error("Unauthorized")]
  Unauthorized,
  #[error("Player unavailable: {0}")]
  Player(#[from] PlayerError),
}

impl IntoResponse for RemoteError {
  fn into_response(self) -> Response {
    match self {
      RemoteError::Unauthorized => (
        StatusCode::UNAUTHORIZED,
        [(header::WWW_AUTHENTICATE, "Basic realm=\"authenticate\"")],
      )
        .into_response(),
      other => (StatusCode::SERVICE_UNAVAILABLE, other.to_string()).into_response(),
    }
  }
}

#[derive(Clone)]
struct RemoteState {
  player: PlayerHandle,
  password: Arc<str>,
}

/// Build the remote-control router.
pub fn router(player: PlayerHandle, password: &str) -> Router {
  Router::new()
    .route("/requests/status.json", get(status))
    .route("/requests/playlist.json", get(playlist))
    .with_state(RemoteState {
      player,
      password: Arc::from(password),
    })
}

/// Serve the router on all interfaces until the server fails.
pub async fn serve(router: Router, port: u16) -> Result<(), RemoteError> {
  let addr = SocketAddr::from(([0, 0, 0, 0], port));
  let listener = tokio::net::TcpListener::bind(addr)
    .await
    .map_err(|e| RemoteError::Bind(port, e))?;
  log::info!("HTTP remote listening on {}", addr);
  axum::serve(listener, router).await.map_err(RemoteError::Serve)
}

/// GET /requests/status.json
/// Runs the optional `command` and returns the status after it.
async fn status(
  State(state): State<RemoteState>,
  headers: HeaderMap,
  Query(params): Query<HashMap<String, String>>,
) -> Result<Json<StatusSnapshot>, RemoteError> {
  authorize(&headers, &state.password)?;
  if let Some(command) = parse_command(&params) {
    state.player.enqueue(command)?;
  }
  Ok(Json(state.player.status().await?))
}

/// GET /requests/playlist.json
async fn playlist(
  State(state): State<RemoteState>,
  headers: HeaderMap,
) -> Result<Json<PlaylistNode>, RemoteError> {
  authorize(&headers, &state.password)?;
  let entries = state.player.playlist().await?;
  Ok(Json(PlaylistNode::document(entries)))
}

fn authorize(headers: &HeaderMap, password: &str) -> Result<(), RemoteError> {
  let credentials = headers
    .get(header::AUTHORIZATION)
    .and_then(|v| v.to_str().ok())
    .and_then(|v| v.strip_prefix("Basic "))
    .and_then(|b64| base64::engine::general_purpose::STANDARD.decode(b64.trim()).ok());

  match credentials {
    Some(decoded) if decoded == format!(":{}", password).as_bytes() => Ok(()),
    _ => Err(RemoteError::Unauthorized),
  }
}

/// Playlist document node. Ids 1-3 are fixed containers.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum PlaylistNode {
  Node {
    name: &'static str,
    id: u32,
    children: Vec<PlaylistNode>,
  },
  Leaf {
    name: String,
    id: u32,
    current: bool,
  },
}

impl PlaylistNode {
  fn document(entries: Vec<PlaylistEntry>) -> Self {
    let leaves = entries
      .into_iter()
      .map(|e| PlaylistNode::Leaf {
        name: e.name,
        id: e.id,
        current: e.current,
      })
      .collect();

    PlaylistNode::Node {
      name: "Undefined",
      id: 1,
      children: vec![
        PlaylistNode::Node {
          name: "Playlist",
          id: 2,
          children: leaves,
        },
        PlaylistNode::Node {
          name: "Media Library",
          id: 3,
          children: Vec::new(),
        },
      ],
    }
  }
}

/// Map a remote query string onto a player command.
pub fn parse_command(params: &HashMap<String, String>) -> Option<Command> {
  let val = params.get("val").map(String::as_str).unwrap_or("");
  let command = match params.get("command")?.as_str() {
    "pl_play" => Command::Play(params.get("id").and_then(|id| id.trim().parse().ok())),
    "pl_next" => Command::Next,
    "pl_previous" => Command::Prev,
    "pl_pause" => Command::Pause,
    "pl_stop" => Command::Stop,
    "pl_random" => Command::Shuffle,
    "pl_loop" => Command::Loop,
    "pl_repeat" => Command::Repeat,
    "key" => match val {
      "aspect-ratio" => Command::Aspect,
      "audio-track" => Command::Audio,
      "subtitle-track" => Command::Subtitle,
      _ => return None,
    },
    "fullscreen" => Command::Fullscreen,
    "volume" => {
      let (value, mode) = parse_volume(val)?;
      Command::Volume { value, mode }
    }
    "seek" => {
      let (value, mode) = parse_seek(val)?;
      Command::Seek { value, mode }
    }
    other => {
      log::debug!("Ignoring unknown remote command {:?}", other);
      return None;
    }
  };
  Some(command)
}

/// Split a leading sign off. Signed values are relative.
fn split_sign(val: &str) -> Option<(bool, i64)> {
  let val = val.trim();
  let (relative, negative, digits) = match val.as_bytes().first()? {
    b'+' => (true, false, &val[1..]),
    b'-' => (true, true, &val[1..]),
    _ => (false, false, val),
  };
  let n: i64 = digits.parse().ok()?;
  Some((relative, if negative { -n } else { n }))
}

/// Volume values are clamped to the canonical scale: absolute levels to
/// 0-320 and relative steps to at most 320 either way.
fn parse_volume(val: &str) -> Option<(i64, VolumeMode)> {
  if let Some(percent) = val.trim().strip_suffix('%') {
    let p: i64 = percent.parse().ok()?;
    return Some((p.clamp(0, 100) * CANONICAL_VOLUME_MAX / 100, VolumeMode::Absolute));
  }
  match split_sign(val)? {
    (true, n) => Some((
      n.clamp(-CANONICAL_VOLUME_MAX, CANONICAL_VOLUME_MAX),
      VolumeMode::Relative,
    )),
    (false, n) => Some((n.clamp(0, CANONICAL_VOLUME_MAX), VolumeMode::Absolute)),
  }
}

fn parse_seek(val: &str) -> Option<(i64, SeekMode)> {
  if let Some(percent) = val.trim().strip_suffix('%') {
    let (_, p) = split_sign(percent)?;
    return Some((p, SeekMode::Percent));
  }
  match split_sign(val)? {
    (true, n) => Some((n, SeekMode::Relative)),
    (false, n) => Some((n, SeekMode::Absolute)),
  }
}
