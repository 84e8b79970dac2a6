//! Backend output readers.
//!
//! Each output stream gets a reader task that splits it into lines. A
//! forwarder task then routes every line: prev/next marker lines become
//! queued player commands, everything else goes to the bounded reply
//! channel the player reads from.

use std::sync::Arc;

use async_channel::{Receiver, Sender};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};

use super::dialect::Dialect;
use crate::player::Command;
use crate::playlist::Direction;

/// Capacity of the line and reply channels.
pub const REPLY_CAPACITY: usize = 1000;

/// Merge two output streams into one channel of lines.
///
/// The channel closes once both streams reach end of file.
pub fn merge_lines<O, E>(stdout: O, stderr: E) -> Receiver<String>
where
  O: AsyncRead + Send + Unpin + 'static,
  E: AsyncRead + Send + Unpin + 'static,
{
  let (tx, rx) = async_channel::bounded(REPLY_CAPACITY);
  tokio::spawn(reader_loop(stdout, tx.clone(), "stdout"));
  tokio::spawn(reader_loop(stderr, tx, "stderr"));
  rx
}

async fn reader_loop<R: AsyncRead + Unpin>(reader: R, tx: Sender<String>, stream: &'static str) {
  let mut buf_reader = BufReader::new(reader);
  let mut buf = Vec::new();

  loop {
    buf.clear();
    match buf_reader.read_until(b'\n', &mut buf).await {
      Ok(0) => {
        log::info!("Backend {} closed", stream);
        break;
      }
      Ok(_) => {
        let line = String::from_utf8_lossy(&buf);
        let line = line.trim_end_matches(['\n', '\r']).to_string();
        if tx.send(line).await.is_err() {
          break;
        }
      }
      Err(e) => {
        log::error!("Backend {} read error: {}", stream, e);
        break;
      }
    }
  }
}

/// Route backend lines between the command queue and the reply channel.
///
/// Marker commands are queued without waiting so the forwarder never
/// blocks on the player it feeds.
pub fn forward(lines: Receiver<String>, dialect: Arc<Dialect>, commands: Sender<Command>) -> Receiver<String> {
  let (reply_tx, reply_rx) = async_channel::bounded(REPLY_CAPACITY);

  tokio::spawn(async move {
    while let Ok(line) = lines.recv().await {
      if let Some(direction) = dialect.marker(&line) {
        let command = match direction {
          Direction::Forward => Command::Next,
          Direction::Backward => Command::Prev,
        };
        log::debug!("Backend marker {:?} -> {:?}", line, command);
        if let Err(e) = commands.try_send(command) {
          log::warn!("Failed to queue marker command: {}", e);
        }
        continue;
      }

      if reply_tx.send(line).await.is_err() {
        break;
      }
    }
    log::info!("Backend output forwarder stopped");
  });

  reply_rx
}
