//! Event types for the Cadence event system
//!
//! Provides shared event definitions and the EventBus used by the playback
//! engine to publish transitions to UIs and other observers.

mod playback_types;
mod queue_types;

pub use playback_types::{PlaybackState, RepeatMode};
pub use queue_types::QueueChangeTrigger;

use crate::track::TrackId;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Cadence event types
///
/// Events are broadcast via EventBus and can be serialized for transmission
/// to out-of-process observers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum CadenceEvent {
    /// Playback state changed
    ///
    /// Triggers:
    /// - UI: Update transport controls
    /// - Platform Integration: Update media keys
    PlaybackStateChanged {
        old_state: PlaybackState,
        new_state: PlaybackState,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A track became the current track
    TrackStarted {
        track_id: TrackId,
        /// Position in the queue
        index: usize,
        /// True when the output moved onto a pre-attached asset without a reload
        gapless: bool,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A track finished or was left
    TrackCompleted {
        track_id: TrackId,
        /// Seconds of the track that were played
        duration_played: f64,
        /// Whether the track reached its natural end (false if skipped)
        completed: bool,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Playback progress update
    ///
    /// Emitted at the configured progress interval while a track is active.
    PlaybackProgress {
        track_id: TrackId,
        position_ms: u64,
        duration_ms: u64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Queue changed
    QueueChanged {
        /// Queue contents after the change
        queue: Vec<TrackId>,
        /// Current index after the change (None when empty)
        current_index: Option<usize>,
        trigger: QueueChangeTrigger,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Repeat mode changed
    RepeatModeChanged {
        repeat_mode: RepeatMode,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Shuffle toggled
    ShuffleChanged {
        enabled: bool,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// The current track could not be made playable
    ///
    /// Queue and index are preserved; the caller decides whether to retry or skip.
    TrackUnavailable {
        track_id: TrackId,
        reason: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl CadenceEvent {
    /// Short event name for logging
    pub fn event_type(&self) -> &'static str {
        match self {
            CadenceEvent::PlaybackStateChanged { .. } => "PlaybackStateChanged",
            CadenceEvent::TrackStarted { .. } => "TrackStarted",
            CadenceEvent::TrackCompleted { .. } => "TrackCompleted",
            CadenceEvent::PlaybackProgress { .. } => "PlaybackProgress",
            CadenceEvent::QueueChanged { .. } => "QueueChanged",
            CadenceEvent::RepeatModeChanged { .. } => "RepeatModeChanged",
            CadenceEvent::ShuffleChanged { .. } => "ShuffleChanged",
            CadenceEvent::TrackUnavailable { .. } => "TrackUnavailable",
        }
    }
}

// ========================================
// EventBus Implementation
// ========================================

/// Central event distribution bus
///
/// The EventBus uses tokio::broadcast internally, providing:
/// - Non-blocking publish (slow subscribers don't block producers)
/// - Multiple concurrent subscribers
/// - Lagged message detection for slow subscribers
///
/// # Examples
///
/// ```
/// use cadence_common::events::{EventBus, CadenceEvent, PlaybackState};
///
/// let event_bus = EventBus::new(100);
/// let mut rx = event_bus.subscribe();
///
/// event_bus.emit_lossy(CadenceEvent::PlaybackStateChanged {
///     old_state: PlaybackState::Stopped,
///     new_state: PlaybackState::Loading,
///     timestamp: chrono::Utc::now(),
/// });
///
/// assert!(rx.try_recv().is_ok());
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<CadenceEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// * `capacity` - Number of events to buffer before lagging subscribers drop old events
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<CadenceEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: CadenceEvent,
    ) -> Result<usize, broadcast::error::SendError<CadenceEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: CadenceEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
