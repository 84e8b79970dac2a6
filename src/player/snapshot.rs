//! Status and playlist views handed to the remote-control front end.

use std::path::Path;

use serde::Serialize;

use crate::backend::PlayState;
use crate::playlist::{Playlist, TrackId};

/// Canonical player status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusSnapshot {
  pub fullscreen: bool,
  /// Volume on the canonical 0-320 scale.
  pub volume: i64,
  #[serde(rename = "loop")]
  pub looping: bool,
  pub random: bool,
  /// Track length in seconds.
  pub length: i64,
  pub repeat: bool,
  pub state: PlayState,
  /// Position in seconds.
  pub time: i64,
  pub title: String,
  pub filename: String,
}

/// Normalized property replies gathered for one status snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusProperties {
  pub state: PlayState,
  pub fullscreen: String,
  pub volume: String,
  pub length: String,
  pub time: String,
  /// Only queried while something is loaded.
  pub filename: Option<String>,
}

/// One playlist row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlaylistEntry {
  pub name: String,
  pub id: TrackId,
  pub current: bool,
}

/// Build the status view from property replies and playlist flags.
///
/// Sentinels and other unparseable numbers read as 0.
pub fn status_snapshot(playlist: &Playlist, props: &StatusProperties) -> StatusSnapshot {
  let filename = match props.state {
    PlayState::Stopped => String::new(),
    _ => props.filename.clone().unwrap_or_default(),
  };

  StatusSnapshot {
    fullscreen: props.fullscreen == "yes",
    volume: parse_int(&props.volume),
    looping: playlist.is_looping(),
    random: playlist.is_shuffled(),
    length: parse_int(&props.length),
    repeat: playlist.is_repeat(),
    state: props.state,
    time: parse_int(&props.time),
    title: filename.clone(),
    filename,
  }
}

/// Build the playlist view in play order.
pub fn playlist_snapshot(playlist: &Playlist) -> Vec<PlaylistEntry> {
  let current = playlist.current().map(|t| t.id);
  playlist
    .play_order()
    .map(|track| PlaylistEntry {
      name: display_name(&track.source),
      id: track.id,
      current: Some(track.id) == current,
    })
    .collect()
}

fn display_name(source: &str) -> String {
  Path::new(source)
    .file_name()
    .map(|n| n.to_string_lossy().into_owned())
    .unwrap_or_else(|| source.to_string())
}

fn parse_int(raw: &str) -> i64 {
  raw
    .trim()
    .parse::<i64>()
    .or_else(|_| raw.trim().parse::<f64>().map(|f| f as i64))
    .unwrap_or(0)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::backend::UNAVAILABLE;

  fn props(state: PlayState) -> StatusProperties {
    StatusProperties {
      state,
      fullscreen: "yes".into(),
      volume: "160".into(),
      length: "125".into(),
      time: UNAVAILABLE.into(),
      filename: Some("song.ogg".into()),
    }
  }

  #[test]
  fn test_status_snapshot() {
    let mut pl = Playlist::from_sources(["/m/song.ogg"]);
    pl.toggle_repeat();
    let s = status_snapshot(&pl, &props(PlayState::Playing));
    assert!(s.fullscreen);
    assert_eq!(s.volume, 160);
    assert_eq!(s.length, 125);
    assert_eq!(s.time, 0);
    assert!(s.repeat && !s.looping && !s.random);
    assert_eq!(s.title, "song.ogg");
    assert_eq!(s.filename, "song.ogg");
  }

  #[test]
  fn test_stopped_status_has_no_title() {
    let pl = Playlist::from_sources(["/m/song.ogg"]);
    let s = status_snapshot(&pl, &props(PlayState::Stopped));
    assert_eq!(s.state, PlayState::Stopped);
    assert!(s.title.is_empty() && s.filename.is_empty());
  }

  #[test]
  fn test_status_serializes_canonical_names() {
    let pl = Playlist::from_sources(["a.mp3"]);
    let json = serde_json::to_value(status_snapshot(&pl, &props(PlayState::Paused))).unwrap();
    assert_eq!(json["state"], "paused");
    assert_eq!(json["loop"], false);
    assert_eq!(json["random"], false);
  }

  #[test]
  fn test_playlist_snapshot_in_play_order() {
    let mut pl = Playlist::from_sources(["/m/a.mp3", "http://radio.example/live", "/m/c.flac"]);
    pl.set_position(2);
    pl.toggle_shuffle();

    let entries = playlist_snapshot(&pl);
    assert_eq!(entries.len(), 3);
    assert_eq!(entries[0].name, "c.flac");
    assert!(entries[0].current);
    assert_eq!(entries.iter().filter(|e| e.current).count(), 1);
    assert!(entries.iter().any(|e| e.name == "live" && e.id == 5));
  }
}
