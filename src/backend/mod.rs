//! Backend module - drives an external MPlayer or mpv through its slave protocol.
//!
//! Architecture:
//! - `dialect.rs` - per-backend protocol strings and version probing
//! - `process.rs` - binary detection, process spawning and startup check
//! - `reader.rs` - output line readers and marker/reply forwarding
//! - `protocol.rs` - reply parsing and value normalization

mod dialect;
mod process;
mod protocol;
mod reader;

pub use dialect::{Dialect, DialectKind, StartupLine, TrackQuoting};
pub use process::{
  find_backend, select_backend, spawn_backend, wait_for_exit, wait_for_startup, BackendProcess,
  ProcessError,
};
pub use protocol::{
  is_sentinel, normalize_seconds, normalize_volume, parse_reply, parse_seconds, volume_to_native,
  PlayState, Property, SeekMode, VolumeMode, CANONICAL_VOLUME_MAX, ERROR, UNAVAILABLE,
};
pub use reader::{forward, merge_lines, REPLY_CAPACITY};
