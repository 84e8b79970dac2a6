//! Player module - the single owner of playback state.
//!
//! Architecture:
//! - `command.rs` - commands, errors and the cloneable producer handle
//! - `actor.rs` - the task that executes commands against the backend
//! - `snapshot.rs` - status and playlist views built from actor state

mod actor;
mod command;
mod snapshot;
#[cfg(test)]
pub(crate) mod testing;

pub use actor::{Player, PlayerOptions};
pub use command::{Command, PlayerError, PlayerHandle};
pub use snapshot::{playlist_snapshot, status_snapshot, PlaylistEntry, StatusProperties, StatusSnapshot};
