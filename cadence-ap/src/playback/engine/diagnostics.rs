//! Status accessors
//!
//! Read-only views of the engine state. Each call takes the core lock once.

use super::core::PlaybackEngine;
use crate::gain::GainDecision;
use crate::state::EngineStatus;
use cadence_common::events::{PlaybackState, RepeatMode};
use cadence_common::{Track, TrackId};
use std::time::Duration;

impl PlaybackEngine {
    /// Consistent snapshot of the engine state
    pub fn status(&self) -> EngineStatus {
        let active_device = self.output.active_device();
        let core = self.core.lock();
        EngineStatus {
            state: core.state,
            current_index: core.queue.current_index(),
            track_id: core.queue.current().map(|t| t.id.clone()),
            position: core.position,
            duration: core.duration,
            repeat: core.queue.repeat_mode(),
            shuffle: core.queue.is_shuffled(),
            queue_len: core.queue.len(),
            cached: core.cache.track_ids(),
            lookahead: core.lookahead,
            gain: core.gain,
            active_device,
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.core.lock().state
    }

    pub fn current_index(&self) -> Option<usize> {
        self.core.lock().queue.current_index()
    }

    pub fn position(&self) -> Duration {
        self.core.lock().position
    }

    pub fn repeat_mode(&self) -> RepeatMode {
        self.core.lock().queue.repeat_mode()
    }

    pub fn is_shuffled(&self) -> bool {
        self.core.lock().queue.is_shuffled()
    }

    /// Queue contents in play order
    pub fn queue_track_ids(&self) -> Vec<TrackId> {
        self.core.lock().queue.track_ids()
    }

    /// Queue entries in play order (with locally reflected ratings)
    pub fn queue_tracks(&self) -> Vec<Track> {
        self.core.lock().queue.tracks().to_vec()
    }

    /// Identities currently held by the prepared-asset cache, sorted
    pub fn cached_track_ids(&self) -> Vec<TrackId> {
        self.core.lock().cache.track_ids()
    }

    /// Current lookahead window size
    pub fn lookahead(&self) -> usize {
        self.core.lock().lookahead
    }

    pub fn current_gain(&self) -> GainDecision {
        self.core.lock().gain
    }

    /// Queue index pre-attached for gapless hand-off, if any
    pub fn pending_handoff(&self) -> Option<usize> {
        self.core.lock().handoff.as_ref().map(|h| h.index)
    }
}
