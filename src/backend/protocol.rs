//! Slave protocol reply parsing and value normalization.
//!
//! Both backends answer property queries with `ANS_<name>=<value>` lines but
//! disagree on everything else: error markers, time formats and volume
//! scales. Everything here maps those replies onto one canonical form.

use serde::{Deserialize, Serialize};

/// Canonical sentinel for a property the backend cannot provide right now.
pub const UNAVAILABLE: &str = "(unavailable)";

/// Canonical sentinel for a property query the backend rejected.
pub const ERROR: &str = "(error)";

/// Upper bound of the backend independent volume scale.
pub const CANONICAL_VOLUME_MAX: i64 = 320;

const ERROR_PREFIX: &str = "ANS_ERROR=";
const ERROR_UNAVAILABLE: &str = "PROPERTY_UNAVAILABLE";

/// How a seek value is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeekMode {
  /// Seconds from the start of the track.
  Absolute,
  /// Seconds from the current position (may be negative).
  Relative,
  /// Percentage of the track length.
  Percent,
}

/// How a volume value is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VolumeMode {
  Absolute,
  Relative,
}

/// Canonical property names understood by the player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Property {
  /// Pseudo-property derived from `Filename` and `Pause`.
  State,
  Filename,
  Pause,
  Volume,
  Length,
  TimePos,
  Fullscreen,
  Aspect,
  /// Any other backend property, passed through by name.
  Other(String),
}

impl Property {
  /// Resolve a property name, accepting either backend's spelling.
  pub fn from_name(name: &str) -> Self {
    match name {
      "state" => Property::State,
      "filename" => Property::Filename,
      "pause" => Property::Pause,
      "volume" => Property::Volume,
      "length" | "duration" => Property::Length,
      "time" | "time_pos" | "time-pos" => Property::TimePos,
      "fullscreen" => Property::Fullscreen,
      "aspect" | "video-aspect" => Property::Aspect,
      other => Property::Other(other.to_string()),
    }
  }
}

/// Playback state derived from the `state` pseudo-property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayState {
  Playing,
  Paused,
  Stopped,
}

impl PlayState {
  pub fn as_str(&self) -> &'static str {
    match self {
      PlayState::Playing => "playing",
      PlayState::Paused => "paused",
      PlayState::Stopped => "stopped",
    }
  }
}

impl std::fmt::Display for PlayState {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Check whether a value is one of the canonical sentinels.
pub fn is_sentinel(value: &str) -> bool {
  value == UNAVAILABLE || value == ERROR
}

/// Extract the answer to a query for `name` from one reply line.
///
/// Returns `None` for lines that belong to something else. Error markers
/// resolve to the canonical sentinels.
pub fn parse_reply(line: &str, name: &str) -> Option<String> {
  if let Some(error) = line.strip_prefix(ERROR_PREFIX) {
    if error.trim() == ERROR_UNAVAILABLE {
      return Some(UNAVAILABLE.to_string());
    }
    return Some(ERROR.to_string());
  }

  let value = line.strip_prefix("ANS_")?.strip_prefix(name)?.strip_prefix('=')?;
  Some(value.trim_end().to_string())
}

/// Parse seconds given either as a float or as `[HH:]MM:SS`.
///
/// Fractions are truncated.
pub fn parse_seconds(raw: &str) -> Option<i64> {
  let raw = raw.trim();
  if raw.contains(':') {
    let mut total: i64 = 0;
    for part in raw.split(':') {
      let value: f64 = part.parse().ok()?;
      if !value.is_finite() {
        return None;
      }
      total = total.checked_mul(60)?.checked_add(value.trunc() as i64)?;
    }
    return Some(total);
  }

  let value: f64 = raw.parse().ok()?;
  if !value.is_finite() {
    return None;
  }
  Some(value.trunc() as i64)
}

/// Normalize a time-like reply to integer seconds.
///
/// Sentinels and unparseable values pass through unchanged.
pub fn normalize_seconds(raw: &str) -> String {
  match parse_seconds(raw) {
    Some(seconds) => seconds.to_string(),
    None => raw.to_string(),
  }
}

/// Rescale a backend volume reply onto the canonical 0-320 scale.
///
/// Sentinels and unparseable values pass through unchanged.
pub fn normalize_volume(raw: &str, volume_max: u32) -> String {
  let Ok(native) = raw.trim().parse::<f64>() else {
    return raw.to_string();
  };
  if volume_max == 0 {
    return raw.to_string();
  }
  let canonical = (native * CANONICAL_VOLUME_MAX as f64 / volume_max as f64).round();
  (canonical as i64).to_string()
}

/// Rescale a canonical volume (absolute or delta) onto the backend's scale.
pub fn volume_to_native(value: i64, volume_max: u32) -> i64 {
  value
    .saturating_mul(i64::from(volume_max))
    .div_euclid(CANONICAL_VOLUME_MAX)
}

/// Escape a track for MPlayer's `loadfile`.
pub fn escape_backslash(track: &str) -> String {
  let mut escaped = String::with_capacity(track.len());
  for c in track.chars() {
    if matches!(c, '\\' | ' ' | '#') {
      escaped.push('\\');
    }
    escaped.push(c);
  }
  escaped
}

/// Quote a track for mpv's input command parser.
pub fn quote(track: &str) -> String {
  let mut quoted = String::with_capacity(track.len() + 2);
  quoted.push('"');
  for c in track.chars() {
    if matches!(c, '\\' | '"') {
      quoted.push('\\');
    }
    quoted.push(c);
  }
  quoted.push('"');
  quoted
}
