//! Play queue
//!
//! Ordered track list with a current index, repeat mode and shuffle. Pure and
//! synchronous: the engine holds it under its core lock and performs all
//! loading and output work itself.
//!
//! **Invariant:** when the queue is non-empty, `current < len`. When empty,
//! there is no current entry.

use crate::error::{Error, Result};
use cadence_common::events::RepeatMode;
use cadence_common::{Track, TrackId};
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::BTreeSet;
use std::time::Duration;

/// Outcome of a "previous" request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreviousAction {
    /// Seek the current track back to zero
    Restart,
    /// Load another entry
    Index(usize),
}

#[derive(Debug, Default)]
pub struct PlayQueue {
    tracks: Vec<Track>,
    current: usize,
    repeat: RepeatMode,
    shuffle: bool,
    /// Order before shuffle was enabled
    original_order: Option<Vec<Track>>,
}

impl PlayQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn track_ids(&self) -> Vec<TrackId> {
        self.tracks.iter().map(|t| t.id.clone()).collect()
    }

    pub fn get(&self, index: usize) -> Option<&Track> {
        self.tracks.get(index)
    }

    pub fn current_index(&self) -> Option<usize> {
        if self.tracks.is_empty() {
            None
        } else {
            Some(self.current)
        }
    }

    pub fn current(&self) -> Option<&Track> {
        self.tracks.get(self.current)
    }

    pub fn repeat_mode(&self) -> RepeatMode {
        self.repeat
    }

    pub fn set_repeat_mode(&mut self, mode: RepeatMode) {
        self.repeat = mode;
    }

    /// Advance `off -> all -> one -> off`
    pub fn cycle_repeat(&mut self) -> RepeatMode {
        self.repeat = self.repeat.cycled();
        self.repeat
    }

    pub fn is_shuffled(&self) -> bool {
        self.shuffle
    }

    /// Replace every entry, returning the clamped start index
    ///
    /// With shuffle on, the new tracks are shuffled around the start track
    /// (which becomes index 0) and their given order is kept for restore.
    pub fn replace<R: Rng + ?Sized>(
        &mut self,
        tracks: Vec<Track>,
        start: usize,
        rng: &mut R,
    ) -> Result<usize> {
        if tracks.is_empty() {
            return Err(Error::EmptyQueue);
        }

        let start = start.min(tracks.len() - 1);
        self.tracks = tracks;
        self.current = start;
        self.original_order = None;

        if self.shuffle {
            self.original_order = Some(self.tracks.clone());
            self.shuffle_around_current(rng);
        }

        Ok(self.current)
    }

    /// Remove every entry (repeat and shuffle flags survive)
    pub fn clear(&mut self) {
        self.tracks.clear();
        self.current = 0;
        self.original_order = None;
    }

    /// Index the next natural advance lands on, if any
    ///
    /// | repeat | has next | result |
    /// |--------|----------|--------|
    /// | one    | any      | current |
    /// | off/all| yes      | current + 1 |
    /// | all    | no       | 0 |
    /// | off    | no       | none |
    pub fn resolve_next(&self) -> Option<usize> {
        if self.tracks.is_empty() {
            return None;
        }
        let has_next = self.current + 1 < self.tracks.len();
        match (self.repeat, has_next) {
            (RepeatMode::One, _) => Some(self.current),
            (_, true) => Some(self.current + 1),
            (RepeatMode::All, false) => Some(0),
            (RepeatMode::Off, false) => None,
        }
    }

    /// Entry pre-attached for gapless hand-off: the next distinct index
    ///
    /// `None` under repeat-one (the current asset is replayed instead).
    pub fn handoff_index(&self) -> Option<usize> {
        match self.repeat {
            RepeatMode::One => None,
            _ => self.resolve_next().filter(|next| *next != self.current),
        }
    }

    /// Decide what "previous" does given how far into the track we are
    pub fn resolve_previous(&self, elapsed: Duration, restart_threshold: Duration) -> Option<PreviousAction> {
        if self.tracks.is_empty() {
            return None;
        }
        if elapsed > restart_threshold {
            return Some(PreviousAction::Restart);
        }
        if self.current > 0 {
            return Some(PreviousAction::Index(self.current - 1));
        }
        match self.repeat {
            RepeatMode::All if self.tracks.len() > 1 => {
                Some(PreviousAction::Index(self.tracks.len() - 1))
            }
            _ => Some(PreviousAction::Restart),
        }
    }

    pub fn set_current(&mut self, index: usize) -> Result<()> {
        self.check_index(index)?;
        self.current = index;
        Ok(())
    }

    fn check_index(&self, index: usize) -> Result<()> {
        if index >= self.tracks.len() {
            return Err(Error::InvalidIndex {
                index,
                len: self.tracks.len(),
            });
        }
        Ok(())
    }

    /// Add tracks at the end
    pub fn append(&mut self, tracks: Vec<Track>) {
        if let Some(original) = self.original_order.as_mut() {
            original.extend(tracks.iter().cloned());
        }
        self.tracks.extend(tracks);
    }

    /// Add tracks directly after the current entry (or at the start when empty)
    pub fn insert_after_current(&mut self, tracks: Vec<Track>) {
        if self.tracks.is_empty() {
            self.append(tracks);
            return;
        }
        if let Some(original) = self.original_order.as_mut() {
            let anchor = original
                .iter()
                .position(|t| t.id == self.tracks[self.current].id)
                .map(|p| p + 1)
                .unwrap_or(original.len());
            original.splice(anchor..anchor, tracks.iter().cloned());
        }
        let at = self.current + 1;
        self.tracks.splice(at..at, tracks);
    }

    /// Remove one entry; the playing entry cannot be removed
    pub fn remove_at(&mut self, index: usize) -> Result<Track> {
        self.check_index(index)?;
        if index == self.current {
            return Err(Error::RemovalRejected(index));
        }

        let removed = self.tracks.remove(index);
        if index < self.current {
            self.current -= 1;
        }

        if let Some(original) = self.original_order.as_mut() {
            if let Some(pos) = original.iter().position(|t| t.id == removed.id) {
                original.remove(pos);
            }
        }
        Ok(removed)
    }

    /// Move the entry at `from` to `to`; the current track stays current
    pub fn move_entry(&mut self, from: usize, to: usize) -> Result<()> {
        self.check_index(from)?;
        self.check_index(to)?;
        if from == to {
            return Ok(());
        }

        let track = self.tracks.remove(from);
        self.tracks.insert(to, track);

        self.current = if self.current == from {
            to
        } else if from < self.current && to >= self.current {
            self.current - 1
        } else if from > self.current && to <= self.current {
            self.current + 1
        } else {
            self.current
        };
        Ok(())
    }

    /// Reflect a rating locally on the current entry
    pub fn update_current_rating(&mut self, rating: Option<u8>) -> Result<&Track> {
        let current = self.current;
        let track = self.tracks.get_mut(current).ok_or(Error::NoCurrentTrack)?;
        track.rating = rating;
        let id = track.id.clone();

        if let Some(original) = self.original_order.as_mut() {
            for entry in original.iter_mut().filter(|t| t.id == id) {
                entry.rating = rating;
            }
        }
        Ok(&self.tracks[current])
    }

    /// Enable or disable shuffle; returns `true` if the mode changed
    ///
    /// Enabling moves the current track to index 0 and uniformly permutes the
    /// rest. Disabling restores the order seen when shuffle was enabled
    /// (including later edits) and keeps the current track current.
    pub fn set_shuffle<R: Rng + ?Sized>(&mut self, enabled: bool, rng: &mut R) -> bool {
        if enabled == self.shuffle {
            return false;
        }
        self.shuffle = enabled;

        if self.tracks.is_empty() {
            self.original_order = None;
            return true;
        }

        if enabled {
            self.original_order = Some(self.tracks.clone());
            self.shuffle_around_current(rng);
        } else {
            self.restore_original_order();
        }
        true
    }

    fn shuffle_around_current<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let current = self.tracks.remove(self.current);
        self.tracks.shuffle(rng);
        self.tracks.insert(0, current);
        self.current = 0;
    }

    fn restore_original_order(&mut self) {
        let Some(original) = self.original_order.take() else {
            return;
        };
        let current_id = self.tracks[self.current].id.clone();

        // Keep only entries still queued (as a multiset), append any strays
        let mut remaining: Vec<Option<Track>> = self.tracks.drain(..).map(Some).collect();
        let mut restored = Vec::with_capacity(remaining.len());
        for track in original {
            if let Some(slot) = remaining
                .iter_mut()
                .find(|slot| slot.as_ref().map(|t| t.id == track.id).unwrap_or(false))
            {
                restored.extend(slot.take());
            }
        }
        restored.extend(remaining.into_iter().flatten());

        self.current = restored
            .iter()
            .position(|t| t.id == current_id)
            .unwrap_or(0);
        self.tracks = restored;
    }

    /// Up to `count` upcoming indices after the current one
    ///
    /// Wraps past the end only under repeat-all. Never includes the current
    /// index and never repeats an index.
    pub fn upcoming(&self, count: usize) -> Vec<usize> {
        let len = self.tracks.len();
        if len == 0 {
            return Vec::new();
        }
        let wrap = self.repeat == RepeatMode::All;
        (1..=count)
            .map(|offset| self.current + offset)
            .take_while(|pos| wrap || *pos < len)
            .map(|pos| pos % len)
            .take_while(|idx| *idx != self.current)
            .collect()
    }

    /// Indices the cache may retain: current, the next two, and the window
    pub fn keep_indices(&self, lookahead: usize) -> BTreeSet<usize> {
        let Some(current) = self.current_index() else {
            return BTreeSet::new();
        };
        let mut keep: BTreeSet<usize> = self.upcoming(2).into_iter().collect();
        keep.extend(self.upcoming(lookahead));
        keep.insert(current);
        keep
    }
}
