//! Audio output seam
//!
//! The output renders at most one active asset plus at most one pre-attached
//! asset for gapless hand-off. It is owned exclusively by the playback engine
//! and reports back through an unbounded channel of [`OutputEvent`]s.

use super::asset::PreparedAsset;
use cadence_common::TrackId;
use std::sync::Arc;
use std::time::Duration;

/// Events emitted by the output layer
///
/// Every event names the track it refers to so late events from an asset
/// that is no longer active can be recognised and dropped.
#[derive(Debug, Clone, PartialEq)]
pub enum OutputEvent {
    /// Periodic playhead update for the active asset
    Progress {
        track_id: TrackId,
        position: Duration,
        duration: Duration,
    },

    /// Active asset ran dry and is rebuffering
    Stalled { track_id: TrackId },

    /// Active asset recovered from a stall
    Resumed { track_id: TrackId },

    /// Active asset reached its natural end with nothing pre-attached
    Finished { track_id: TrackId },

    /// Active asset reached its natural end and the output moved onto the
    /// pre-attached asset for queue `index` without a gap
    ///
    /// Emitted instead of `Finished` for that transition.
    AdvancedTo {
        finished: TrackId,
        index: usize,
        track_id: TrackId,
    },
}

impl OutputEvent {
    /// Track the event refers to (the finishing track for hand-offs)
    pub fn track_id(&self) -> &TrackId {
        match self {
            OutputEvent::Progress { track_id, .. }
            | OutputEvent::Stalled { track_id }
            | OutputEvent::Resumed { track_id }
            | OutputEvent::Finished { track_id } => track_id,
            OutputEvent::AdvancedTo { finished, .. } => finished,
        }
    }
}

/// Output device owned by the engine
///
/// Calls are synchronous intent changes; implementations must not block.
pub trait AudioOutput: Send + Sync {
    /// Replace the active asset (paused at position zero)
    fn attach(&self, asset: Arc<dyn PreparedAsset>);

    /// Place an asset in the play-ahead slot for queue `index`
    fn attach_next(&self, index: usize, asset: Arc<dyn PreparedAsset>);

    /// Empty the play-ahead slot
    fn clear_next(&self);

    fn play(&self);

    fn pause(&self);

    /// Halt rendering and detach both slots
    fn stop(&self);

    fn seek(&self, position: Duration);

    /// Linear volume multiplier from the gain calculator
    fn set_volume(&self, volume: f32);

    /// Name of the device currently rendering, if the platform exposes it
    fn active_device(&self) -> Option<String> {
        None
    }
}
