//! Engine status snapshot
//!
//! Point-in-time copy of the engine state for UIs and the demo binary. Taken
//! under the core lock, so every field is mutually consistent.

use crate::gain::GainDecision;
use cadence_common::events::{PlaybackState, RepeatMode};
use cadence_common::TrackId;
use serde::Serialize;
use std::time::Duration;

#[derive(Debug, Clone, Serialize)]
pub struct EngineStatus {
    pub state: PlaybackState,
    pub current_index: Option<usize>,
    /// Track at the current index (not necessarily attached yet)
    pub track_id: Option<TrackId>,
    pub position: Duration,
    pub duration: Duration,
    pub repeat: RepeatMode,
    pub shuffle: bool,
    pub queue_len: usize,
    /// Identities held by the prepared-asset cache, sorted
    pub cached: Vec<TrackId>,
    pub lookahead: usize,
    pub gain: GainDecision,
    pub active_device: Option<String>,
}

impl EngineStatus {
    /// Normalized progress in `[0, 1]`
    pub fn progress(&self) -> f64 {
        if self.duration.is_zero() {
            return 0.0;
        }
        (self.position.as_secs_f64() / self.duration.as_secs_f64()).clamp(0.0, 1.0)
    }
}
