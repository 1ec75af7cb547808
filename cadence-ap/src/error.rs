//! Error types for cadence-ap
//!
//! Errors on the current track are surfaced to the caller. Errors on
//! speculative lookahead work are logged and dropped by the engine and never
//! leave a public operation.

use cadence_common::TrackId;
use thiserror::Error;

/// Main error type for cadence-ap
#[derive(Error, Debug)]
pub enum Error {
    /// `set_queue` was called with zero tracks
    #[error("Queue must contain at least one track")]
    EmptyQueue,

    /// The current track could not be resolved or prepared
    #[error("Track unavailable: {track_id} ({reason})")]
    TrackUnavailable { track_id: TrackId, reason: String },

    /// Preparation of a track failed
    #[error("Preparation failed for {track_id}: {reason}")]
    PreparationFailed { track_id: TrackId, reason: String },

    /// Preparation was cancelled before completing (evicted or superseded)
    #[error("Preparation cancelled for {0}")]
    PreparationCancelled(TrackId),

    /// A newer `set_queue`/`clear_queue` replaced the queue mid-operation
    #[error("Superseded by a newer queue")]
    Superseded,

    /// Queue index out of range
    #[error("Invalid index {index} (queue length {len})")]
    InvalidIndex { index: usize, len: usize },

    /// Attempt to remove the entry that is currently playing
    #[error("Cannot remove the current track at index {0}")]
    RemovalRejected(usize),

    /// Operation needs a non-empty queue
    #[error("Queue is empty")]
    NoCurrentTrack,

    /// Operation needs an asset attached to the output
    #[error("No track is loaded on the output")]
    NoActiveTrack,

    /// Engine created outside a tokio runtime
    #[error("Tokio runtime unavailable: {0}")]
    Runtime(String),

    /// Errors bubbled up from cadence-common
    #[error(transparent)]
    Common(#[from] cadence_common::Error),
}

impl Error {
    /// Reclassify a preparation error for the track that must play now
    pub(crate) fn into_unavailable(self, track_id: &TrackId) -> Self {
        match self {
            Error::PreparationFailed { track_id, reason } => {
                Error::TrackUnavailable { track_id, reason }
            }
            Error::PreparationCancelled(id) => Error::TrackUnavailable {
                track_id: id,
                reason: "preparation cancelled".to_string(),
            },
            Error::TrackUnavailable { .. } => self,
            other => Error::TrackUnavailable {
                track_id: track_id.clone(),
                reason: other.to_string(),
            },
        }
    }
}

/// Convenience Result type using cadence-ap Error
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preparation_failure_becomes_unavailable() {
        let id = TrackId::new("t1");
        let err = Error::PreparationFailed {
            track_id: id.clone(),
            reason: "404".to_string(),
        }
        .into_unavailable(&id);

        match err {
            Error::TrackUnavailable { track_id, reason } => {
                assert_eq!(track_id, id);
                assert_eq!(reason, "404");
            }
            other => panic!("Expected TrackUnavailable, got {:?}", other),
        }
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            Error::InvalidIndex { index: 7, len: 3 }.to_string(),
            "Invalid index 7 (queue length 3)"
        );
        assert_eq!(
            Error::RemovalRejected(2).to_string(),
            "Cannot remove the current track at index 2"
        );
    }
}
