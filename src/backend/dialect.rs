//! Backend dialect tables.
//!
//! MPlayer and mpv differ only in strings: launch flags, command spellings,
//! property names and the log lines that signal playback. A [`Dialect`]
//! holds those strings; nothing else about the player depends on which
//! backend is running.

use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};

use super::protocol::{self, Property, SeekMode, VolumeMode};
use crate::playlist::Direction;

/// Which backend family a dialect speaks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialectKind {
  MPlayer,
  Mpv,
}

/// How track sources are made safe for `loadfile`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackQuoting {
  Backslash,
  DoubleQuote,
}

/// Classification of a line printed while the backend starts up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartupLine {
  Failed,
  Ready,
  Other,
}

/// Protocol strings for one backend.
///
/// Command templates use the named placeholders `{track}`, `{value}`,
/// `{name}` and `{ratio}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dialect {
  pub kind: DialectKind,
  pub binary: &'static str,
  pub start_flags: &'static [&'static str],
  /// Maximum of the backend's native volume property.
  pub volume_max: u32,

  pub startup_fail: &'static str,
  pub startup_ok: &'static str,

  pub playing_prefix: &'static str,
  pub playing_suffix: &'static str,
  pub playing_ok: &'static [&'static str],
  pub marker_prev: &'static str,
  pub marker_next: &'static str,

  pub cmd_loadfile: &'static str,
  pub cmd_noop: &'static str,
  pub cmd_pause: &'static str,
  pub cmd_stop: &'static str,
  pub cmd_quit: &'static str,
  pub cmd_seek_abs: &'static str,
  pub cmd_seek_rel: &'static str,
  pub cmd_seek_pct: &'static str,
  pub cmd_volume_abs: &'static str,
  pub cmd_volume_rel: &'static str,
  pub cmd_fullscreen: &'static str,
  pub cmd_osd: &'static str,
  pub cmd_switch_audio: &'static str,
  pub cmd_sub_select: &'static str,
  pub cmd_switch_ratio: &'static str,
  pub cmd_get_property: &'static str,
  pub track_quoting: TrackQuoting,

  pub prop_filename: &'static str,
  pub prop_pause: &'static str,
  pub prop_volume: &'static str,
  pub prop_length: &'static str,
  pub prop_time_pos: &'static str,
  pub prop_fullscreen: &'static str,
  pub prop_aspect: &'static str,
}

const MPV_GET_PROPERTY_DASH: &str = "print-text ANS_{name}=${{name}}";
const MPV_GET_PROPERTY_UNDERSCORE: &str = "print_text ANS_{name}=${{name}}";

impl Dialect {
  /// MPlayer (and MPlayer2) slave mode.
  pub fn mplayer() -> Self {
    Self {
      kind: DialectKind::MPlayer,
      binary: "mplayer",
      start_flags: &["-idle", "-slave", "-quiet", "-noconsolecontrols"],
      volume_max: 100,

      startup_fail: "Error ",
      startup_ok: "MPlayer",

      playing_prefix: "Playing ",
      playing_suffix: ".",
      playing_ok: &["Starting playback..."],
      marker_prev: "ANS_stream_start=",
      marker_next: "ANS_stream_end=",

      cmd_loadfile: "loadfile {track}",
      cmd_noop: "mute 0",
      cmd_pause: "pause",
      cmd_stop: "stop",
      cmd_quit: "quit",
      cmd_seek_abs: "pausing_keep_force seek {value} 2",
      cmd_seek_rel: "pausing_keep_force seek {value} 0",
      cmd_seek_pct: "pausing_keep_force seek {value} 1",
      cmd_volume_abs: "pausing_keep_force volume {value} 1",
      cmd_volume_rel: "pausing_keep_force volume {value} 0",
      cmd_fullscreen: "pausing_keep_force vo_fullscreen",
      cmd_osd: "pausing_keep_force osd",
      cmd_switch_audio: "pausing_keep_force switch_audio",
      cmd_sub_select: "pausing_keep_force sub_select",
      cmd_switch_ratio: "pausing_keep_force switch_ratio {ratio}",
      cmd_get_property: "pausing_keep_force get_property {name}",
      track_quoting: TrackQuoting::Backslash,

      prop_filename: "filename",
      prop_pause: "pause",
      prop_volume: "volume",
      prop_length: "length",
      prop_time_pos: "time_pos",
      prop_fullscreen: "fullscreen",
      prop_aspect: "aspect",
    }
  }

  /// mpv reading commands from stdin.
  ///
  /// The get-property template, length property and volume maximum are
  /// version dependent; see [`Dialect::probe_mpv`].
  pub fn mpv() -> Self {
    Self {
      kind: DialectKind::Mpv,
      binary: "mpv",
      start_flags: &["--idle", "--input-file=/dev/stdin", "--quiet", "--input-terminal=no"],
      volume_max: 100,

      startup_fail: "Error ",
      startup_ok: "[input",

      playing_prefix: "Playing: ",
      playing_suffix: "",
      playing_ok: &["[stream] ", " (+)"],
      marker_prev: "Backend: cmdPrev",
      marker_next: "Backend: cmdNext",

      cmd_loadfile: "loadfile {track}",
      cmd_noop: "ignore",
      cmd_pause: "cycle pause",
      cmd_stop: "stop",
      cmd_quit: "quit",
      cmd_seek_abs: "seek {value} absolute",
      cmd_seek_rel: "seek {value} relative",
      cmd_seek_pct: "seek {value} absolute-percent",
      cmd_volume_abs: "set volume {value}",
      cmd_volume_rel: "add volume {value}",
      cmd_fullscreen: "cycle fullscreen",
      cmd_osd: "osd",
      cmd_switch_audio: "cycle aid",
      cmd_sub_select: "cycle sid",
      cmd_switch_ratio: "set video-aspect {ratio}",
      cmd_get_property: MPV_GET_PROPERTY_UNDERSCORE,
      track_quoting: TrackQuoting::DoubleQuote,

      prop_filename: "filename",
      prop_pause: "pause",
      prop_volume: "volume",
      prop_length: "length",
      prop_time_pos: "time-pos",
      prop_fullscreen: "fullscreen",
      prop_aspect: "video-aspect",
    }
  }

  /// Pick the static table for a backend binary by its file name.
  pub fn for_binary(path: &Path) -> Self {
    let stem = path
      .file_stem()
      .map(|s| s.to_string_lossy().to_lowercase())
      .unwrap_or_default();
    if stem.contains("mpv") {
      Self::mpv()
    } else {
      Self::mplayer()
    }
  }

  /// Resolve the version dependent mpv fields by asking the installed binary.
  ///
  /// This blocks while mpv runs three times; call it off the async runtime.
  /// Any probe that fails keeps the default.
  pub fn probe_mpv(binary: &Path) -> Self {
    let mut dialect = Self::mpv();

    if let Some(out) = run_probe(binary, &["--input-cmdlist"], None) {
      if out.lines().any(|l| l.starts_with("print-text ")) {
        dialect.cmd_get_property = MPV_GET_PROPERTY_DASH;
      }
    }

    if let Some(out) = run_probe(binary, &["--list-properties"], None) {
      if out.lines().any(|l| l == " duration") {
        dialect.prop_length = "duration";
      }
    }

    // --volume=101 makes mpv < 0.10 fail here, leaving the maximum at 100.
    let print = if dialect.cmd_get_property == MPV_GET_PROPERTY_DASH {
      "print-text"
    } else {
      "print_text"
    };
    let script = format!(
      "{print} SOFTVOLMAX_${{options/softvol-max}}\n{print} VOLUMEMAX_${{options/volume-max}}\nquit\n"
    );
    let mut flags = vec!["--volume=101"];
    flags.extend_from_slice(dialect.start_flags);
    if let Some(out) = run_probe(binary, &flags, Some(&script)) {
      for line in out.lines() {
        let value = line
          .strip_prefix("SOFTVOLMAX_")
          .or_else(|| line.strip_prefix("VOLUMEMAX_"));
        if let Some(max) = value.and_then(|v| v.trim().parse::<f64>().ok()) {
          if max >= 1.0 {
            dialect.volume_max = max as u32;
            break;
          }
        }
      }
    }

    log::info!(
      "Probed mpv: get-property={:?} length={} volume-max={}",
      dialect.cmd_get_property,
      dialect.prop_length,
      dialect.volume_max
    );
    dialect
  }

  /// Classify a line printed during startup.
  pub fn startup_line(&self, line: &str) -> StartupLine {
    if line.starts_with(self.startup_fail) {
      StartupLine::Failed
    } else if line.starts_with(self.startup_ok) {
      StartupLine::Ready
    } else {
      StartupLine::Other
    }
  }

  /// Track name from a "now playing" announcement.
  pub fn playing_announcement<'a>(&self, line: &'a str) -> Option<&'a str> {
    let rest = line.strip_prefix(self.playing_prefix)?;
    let name = rest.strip_suffix(self.playing_suffix)?;
    if name.is_empty() {
      return None;
    }
    Some(name)
  }

  /// Whether a line confirms that playback actually started.
  pub fn confirms_playback(&self, line: &str) -> bool {
    self.playing_ok.iter().any(|ok| line.starts_with(ok))
  }

  /// Out-of-band previous/next marker carried by a line.
  pub fn marker(&self, line: &str) -> Option<Direction> {
    if line.starts_with(self.marker_prev) {
      Some(Direction::Backward)
    } else if line.starts_with(self.marker_next) {
      Some(Direction::Forward)
    } else {
      None
    }
  }

  /// `loadfile` command for a track source.
  pub fn load(&self, source: &str) -> String {
    let track = match self.track_quoting {
      TrackQuoting::Backslash => protocol::escape_backslash(source),
      TrackQuoting::DoubleQuote => protocol::quote(source),
    };
    self.cmd_loadfile.replace("{track}", &track)
  }

  pub fn seek(&self, value: i64, mode: SeekMode) -> String {
    let template = match mode {
      SeekMode::Absolute => self.cmd_seek_abs,
      SeekMode::Relative => self.cmd_seek_rel,
      SeekMode::Percent => self.cmd_seek_pct,
    };
    template.replace("{value}", &value.to_string())
  }

  /// Volume command; `native` is already on the backend's scale.
  pub fn volume(&self, native: i64, mode: VolumeMode) -> String {
    let template = match mode {
      VolumeMode::Absolute => self.cmd_volume_abs,
      VolumeMode::Relative => self.cmd_volume_rel,
    };
    template.replace("{value}", &native.to_string())
  }

  pub fn switch_ratio(&self, ratio: &str) -> String {
    self.cmd_switch_ratio.replace("{ratio}", ratio)
  }

  pub fn get_property(&self, name: &str) -> String {
    self.cmd_get_property.replace("{name}", name)
  }

  /// Native name of a canonical property. `State` has none.
  pub fn property_name<'a>(&self, property: &'a Property) -> Option<&'a str> {
    match property {
      Property::State => None,
      Property::Filename => Some(self.prop_filename),
      Property::Pause => Some(self.prop_pause),
      Property::Volume => Some(self.prop_volume),
      Property::Length => Some(self.prop_length),
      Property::TimePos => Some(self.prop_time_pos),
      Property::Fullscreen => Some(self.prop_fullscreen),
      Property::Aspect => Some(self.prop_aspect),
      Property::Other(name) => Some(name.as_str()),
    }
  }
}

/// Run the binary with `flags`, optionally feeding `stdin`, and collect stdout.
fn run_probe(binary: &Path, flags: &[&str], stdin: Option<&str>) -> Option<String> {
  let mut cmd = Command::new(binary);
  cmd
    .args(flags)
    .stdin(if stdin.is_some() { Stdio::piped() } else { Stdio::null() })
    .stdout(Stdio::piped())
    .stderr(Stdio::null());

  let mut child = match cmd.spawn() {
    Ok(child) => child,
    Err(e) => {
      log::warn!("Failed to probe {:?} {:?}: {}", binary, flags, e);
      return None;
    }
  };

  if let (Some(script), Some(mut pipe)) = (stdin, child.stdin.take()) {
    if let Err(e) = pipe.write_all(script.as_bytes()) {
      log::warn!("Failed to write probe script: {}", e);
    }
  }

  match child.wait_with_output() {
    Ok(output) => Some(String::from_utf8_lossy(&output.stdout).into_owned()),
    Err(e) => {
      log::warn!("Probe of {:?} failed: {}", binary, e);
      None
    }
  }
}
