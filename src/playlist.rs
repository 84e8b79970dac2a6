//! Playlist and shuffle model.
//!
//! Tracks keep their playlist position for their whole life. Play order is
//! derived through a shuffle permutation (`pos_to_shuf` / `shuf_to_pos`)
//! which is the identity while shuffle is off.

use std::collections::HashMap;

use rand::Rng;

/// Track identifier as exposed in playlist documents.
pub type TrackId = u32;

/// Ids 1..=3 belong to the fixed nodes of the playlist document.
pub const FIRST_TRACK_ID: TrackId = 4;

/// A playlist entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
  pub id: TrackId,
  /// File path or URL handed to the backend.
  pub source: String,
}

/// Direction of travel through the play order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
  Forward,
  Backward,
}

/// Outcome of [`Playlist::advance`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
  /// The cursor moved to this playlist position.
  Moved(usize),
  /// A boundary was hit without `loop`; the cursor did not move.
  EndReached,
}

/// Ordered track list with shuffle permutation and loop/repeat flags.
#[derive(Debug, Clone)]
pub struct Playlist {
  order: Vec<TrackId>,
  positions: HashMap<TrackId, usize>,
  sources: HashMap<TrackId, String>,
  pos_to_shuf: Vec<usize>,
  shuf_to_pos: Vec<usize>,
  next_id: TrackId,
  position: usize,
  shuffled: bool,
  looping: bool,
  repeat: bool,
}

impl Default for Playlist {
  fn default() -> Self {
    Self::new()
  }
}

impl Playlist {
  /// Create an empty playlist.
  pub fn new() -> Self {
    Self {
      order: Vec::new(),
      positions: HashMap::new(),
      sources: HashMap::new(),
      pos_to_shuf: Vec::new(),
      shuf_to_pos: Vec::new(),
      next_id: FIRST_TRACK_ID,
      position: 0,
      shuffled: false,
      looping: false,
      repeat: false,
    }
  }

  /// Build a playlist from track sources, in order.
  pub fn from_sources<I, S>(sources: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    let mut playlist = Self::new();
    for source in sources {
      playlist.append(source);
    }
    playlist
  }

  /// Append a track and return its new id.
  ///
  /// The new position maps to itself in the shuffle permutation, so an
  /// appended track plays last even while shuffled.
  pub fn append(&mut self, source: impl Into<String>) -> TrackId {
    let id = self.next_id;
    self.next_id += 1;

    let pos = self.order.len();
    self.order.push(id);
    self.positions.insert(id, pos);
    self.sources.insert(id, source.into());
    self.pos_to_shuf.push(pos);
    self.shuf_to_pos.push(pos);
    id
  }

  pub fn len(&self) -> usize {
    self.order.len()
  }

  pub fn is_empty(&self) -> bool {
    self.order.is_empty()
  }

  /// Current playlist position.
  pub fn position(&self) -> usize {
    self.position
  }

  /// Move the cursor to `pos`. Out of range positions are ignored.
  pub fn set_position(&mut self, pos: usize) {
    if pos < self.order.len() {
      self.position = pos;
    }
  }

  /// Track at the current position.
  pub fn current(&self) -> Option<Track> {
    self.track_at(self.position)
  }

  /// Track at a playlist position.
  pub fn track_at(&self, pos: usize) -> Option<Track> {
    let id = *self.order.get(pos)?;
    let source = self.sources.get(&id)?.clone();
    Some(Track { id, source })
  }

  /// Playlist position of a track id.
  pub fn position_of(&self, id: TrackId) -> Option<usize> {
    self.positions.get(&id).copied()
  }

  /// Move the cursor to the track with this id.
  ///
  /// Returns `false` and leaves the cursor alone for unknown ids.
  pub fn jump_to(&mut self, id: TrackId) -> bool {
    match self.position_of(id) {
      Some(pos) => {
        self.position = pos;
        true
      }
      None => false,
    }
  }

  /// Rewind the cursor to the first playlist position.
  pub fn rewind(&mut self) {
    self.position = 0;
  }

  pub fn is_shuffled(&self) -> bool {
    self.shuffled
  }

  pub fn is_looping(&self) -> bool {
    self.looping
  }

  pub fn is_repeat(&self) -> bool {
    self.repeat
  }

  /// Toggle playlist looping. Clears repeat.
  pub fn toggle_loop(&mut self) {
    self.looping = !self.looping;
    self.repeat = false;
  }

  /// Toggle single-track repeat. Clears loop.
  pub fn toggle_repeat(&mut self) {
    self.repeat = !self.repeat;
    self.looping = false;
  }

  /// Toggle shuffle using the thread-local RNG.
  pub fn toggle_shuffle(&mut self) {
    self.toggle_shuffle_with(&mut rand::rng());
  }

  /// Toggle shuffle, drawing the new permutation from `rng`.
  ///
  /// Enabling pins the current position to shuffled position 0 and gives
  /// every other position, in playlist order, a uniformly drawn remaining
  /// shuffled position. Disabling restores the identity.
  pub fn toggle_shuffle_with<R: Rng + ?Sized>(&mut self, rng: &mut R) {
    if self.shuffled {
      self.shuffled = false;
      for i in 0..self.order.len() {
        self.pos_to_shuf[i] = i;
        self.shuf_to_pos[i] = i;
      }
      return;
    }

    self.shuffled = true;
    if self.order.is_empty() {
      return;
    }

    let mut remaining: Vec<usize> = (1..self.order.len()).collect();
    for pos in 0..self.order.len() {
      if pos == self.position {
        self.pos_to_shuf[pos] = 0;
        self.shuf_to_pos[0] = pos;
      } else {
        let shuf = remaining.remove(rng.random_range(0..remaining.len()));
        self.pos_to_shuf[pos] = shuf;
        self.shuf_to_pos[shuf] = pos;
      }
    }
  }

  /// Turn shuffle on starting from a uniformly drawn track.
  pub fn shuffle_from_random_start<R: Rng + ?Sized>(&mut self, rng: &mut R) {
    if self.shuffled {
      return;
    }
    if !self.order.is_empty() {
      self.position = rng.random_range(0..self.order.len());
    }
    self.toggle_shuffle_with(rng);
  }

  /// Shuffled position of a playlist position.
  pub fn shuffled_position(&self, pos: usize) -> Option<usize> {
    self.pos_to_shuf.get(pos).copied()
  }

  /// Playlist position found at a shuffled position.
  pub fn position_at_shuffled(&self, shuf: usize) -> Option<usize> {
    self.shuf_to_pos.get(shuf).copied()
  }

  /// Step the cursor one place through the play order.
  ///
  /// Wraps around when looping; otherwise stops at the boundary and
  /// reports [`Advance::EndReached`] without moving.
  pub fn advance(&mut self, direction: Direction) -> Advance {
    let len = self.order.len();
    if len == 0 {
      return Advance::EndReached;
    }

    let shuf = self.pos_to_shuf[self.position];
    let target = match direction {
      Direction::Forward if shuf + 1 < len => shuf + 1,
      Direction::Forward if self.looping => 0,
      Direction::Backward if shuf > 0 => shuf - 1,
      Direction::Backward if self.looping => len - 1,
      _ => return Advance::EndReached,
    };

    self.position = self.shuf_to_pos[target];
    Advance::Moved(self.position)
  }

  /// Tracks in play order.
  pub fn play_order(&self) -> impl Iterator<Item = Track> + '_ {
    self
      .shuf_to_pos
      .iter()
      .filter_map(move |&pos| self.track_at(pos))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use rand::rngs::StdRng;
  use rand::SeedableRng;

  fn playlist(n: usize) -> Playlist {
    Playlist::from_sources((0..n).map(|i| format!("/music/track{}.mp3", i)))
  }

  fn assert_inverse(pl: &Playlist) {
    for pos in 0..pl.len() {
      let shuf = pl.shuffled_position(pos).unwrap();
      assert_eq!(pl.position_at_shuffled(shuf), Some(pos));
    }
  }

  #[test]
  fn test_ids_start_after_document_nodes() {
    let mut pl = Playlist::new();
    assert_eq!(pl.append("a.mp3"), 4);
    assert_eq!(pl.append("b.mp3"), 5);
    assert_eq!(pl.position_of(5), Some(1));
    assert_eq!(pl.track_at(1).unwrap().source, "b.mp3");
  }

  #[test]
  fn test_shuffle_from_random_start() {
    let mut rng = StdRng::seed_from_u64(3);
    let mut pl = playlist(6);
    pl.shuffle_from_random_start(&mut rng);
    assert!(pl.is_shuffled());
    assert_eq!(pl.shuffled_position(pl.position()), Some(0));
    assert_eq!(pl.play_order().next(), pl.current());
    assert_inverse(&pl);

    let mut empty = Playlist::new();
    empty.shuffle_from_random_start(&mut rng);
    assert!(empty.is_shuffled() && empty.current().is_none());
  }

  #[test]
  fn test_shuffle_twice_restores_identity() {
    let mut rng = StdRng::seed_from_u64(7);
    for n in 1..12 {
      let mut pl = playlist(n);
      pl.set_position(n / 2);
      pl.toggle_shuffle_with(&mut rng);
      assert!(pl.is_shuffled());
      pl.toggle_shuffle_with(&mut rng);
      assert!(!pl.is_shuffled());
      for i in 0..n {
        assert_eq!(pl.shuffled_position(i), Some(i));
        assert_eq!(pl.position_at_shuffled(i), Some(i));
      }
    }
  }

  #[test]
  fn test_shuffle_pins_current_track_first() {
    let mut rng = StdRng::seed_from_u64(42);
    for start in 0..8 {
      let mut pl = playlist(8);
      pl.set_position(start);
      pl.toggle_shuffle_with(&mut rng);
      assert_eq!(pl.shuffled_position(start), Some(0));
      assert_inverse(&pl);
    }
  }

  #[test]
  fn test_permutation_stays_inverse_across_appends() {
    let mut rng = StdRng::seed_from_u64(3);
    let mut pl = playlist(5);
    pl.toggle_shuffle_with(&mut rng);
    pl.append("late.ogg");
    pl.append("later.ogg");
    assert_inverse(&pl);
    assert_eq!(pl.shuffled_position(6), Some(6));
    pl.toggle_shuffle_with(&mut rng);
    pl.toggle_shuffle_with(&mut rng);
    assert_inverse(&pl);
  }

  #[test]
  fn test_next_without_loop_visits_every_track_once() {
    let mut rng = StdRng::seed_from_u64(11);
    let mut pl = playlist(6);
    pl.toggle_shuffle_with(&mut rng);

    let mut visited = vec![pl.shuffled_position(pl.position()).unwrap()];
    for _ in 1..6 {
      match pl.advance(Direction::Forward) {
        Advance::Moved(pos) => visited.push(pl.shuffled_position(pos).unwrap()),
        Advance::EndReached => panic!("ended early"),
      }
    }
    assert_eq!(visited, vec![0, 1, 2, 3, 4, 5]);

    let before = pl.position();
    assert_eq!(pl.advance(Direction::Forward), Advance::EndReached);
    assert_eq!(pl.position(), before);
  }

  #[test]
  fn test_loop_cycles_forever() {
    let mut pl = playlist(3);
    pl.toggle_loop();
    for step in 1..20 {
      assert_eq!(pl.advance(Direction::Forward), Advance::Moved(step % 3));
    }
    pl.rewind();
    assert_eq!(pl.advance(Direction::Backward), Advance::Moved(2));
  }

  #[test]
  fn test_backward_stops_at_start() {
    let mut pl = playlist(3);
    assert_eq!(pl.advance(Direction::Backward), Advance::EndReached);
    pl.set_position(2);
    assert_eq!(pl.advance(Direction::Backward), Advance::Moved(1));
  }

  #[test]
  fn test_loop_and_repeat_are_exclusive() {
    let mut pl = playlist(2);
    pl.toggle_loop();
    pl.toggle_repeat();
    assert!(pl.is_repeat());
    assert!(!pl.is_looping());
    pl.toggle_loop();
    assert!(pl.is_looping());
    assert!(!pl.is_repeat());
    pl.toggle_loop();
    assert!(!pl.is_looping() && !pl.is_repeat());
  }

  #[test]
  fn test_jump_to_unknown_id_keeps_cursor() {
    let mut pl = playlist(3);
    pl.set_position(2);
    assert!(!pl.jump_to(99));
    assert_eq!(pl.position(), 2);
    assert!(pl.jump_to(4));
    assert_eq!(pl.position(), 0);
  }

  #[test]
  fn test_empty_playlist() {
    let mut pl = Playlist::new();
    pl.toggle_shuffle();
    assert!(pl.current().is_none());
    assert_eq!(pl.advance(Direction::Forward), Advance::EndReached);
    assert_eq!(pl.play_order().count(), 0);
  }
}
