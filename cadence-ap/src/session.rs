//! Now-playing / session reporter seam
//!
//! Lock-screen integration and scrobbling live behind this trait. The engine
//! calls it after releasing its own lock, so implementations may re-enter the
//! engine (remote play/pause/seek/next commands) from a spawned task.

use cadence_common::time::format_mmss;
use cadence_common::{Track, TrackId};
use std::time::Duration;
use tracing::{debug, info};

pub trait SessionReporter: Send + Sync {
    fn report_track_changed(&self, track: &Track, duration: Duration);

    fn report_progress(&self, current: Duration, duration: Duration);

    fn report_playback_state(&self, is_playing: bool);

    fn report_track_finished(&self, track_id: &TrackId);
}

/// Reporter that writes now-playing changes to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingSessionReporter;

impl SessionReporter for LoggingSessionReporter {
    fn report_track_changed(&self, track: &Track, duration: Duration) {
        info!(
            "Now playing: {} - {} [{}]",
            track.artist.as_deref().unwrap_or("Unknown artist"),
            track.title,
            format_mmss(duration)
        );
    }

    fn report_progress(&self, current: Duration, duration: Duration) {
        debug!("Progress {} / {}", format_mmss(current), format_mmss(duration));
    }

    fn report_playback_state(&self, is_playing: bool) {
        info!("Now playing state: {}", if is_playing { "playing" } else { "not playing" });
    }

    fn report_track_finished(&self, track_id: &TrackId) {
        info!("Scrobble: {}", track_id);
    }
}
