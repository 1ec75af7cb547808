//! Queue operations
//!
//! **Responsibilities:**
//! - Queue replacement and clearing (cancel everything, then load)
//! - In-place edits (append, insert after current, remove, move) that keep
//!   the current track current
//! - Shuffle, repeat and rating changes
//! - Lookahead refresh on demand and on network changes

use super::core::{Outbox, PlaybackEngine, QueueOptions};
use crate::error::{Error, Result};
use crate::playback::queue::PlayQueue;
use cadence_common::events::{CadenceEvent, PlaybackState, QueueChangeTrigger, RepeatMode};
use cadence_common::Track;
use chrono::Utc;
use std::time::Duration;
use tracing::{debug, info};

/// Album playback: more than one track and all share one album id
fn is_album_queue(tracks: &[Track]) -> bool {
    let Some(first) = tracks.first().and_then(|t| t.album_id.as_deref()) else {
        return false;
    };
    tracks.len() > 1 && tracks.iter().all(|t| t.album_id.as_deref() == Some(first))
}

impl PlaybackEngine {
    /// Replace the queue and load `start_index` (clamped)
    ///
    /// Returns the loaded index. Fails with `EmptyQueue` without touching any
    /// state, or with `TrackUnavailable` (queue kept, playback stopped).
    pub async fn set_queue(&self, tracks: Vec<Track>, start_index: usize) -> Result<usize> {
        self.set_queue_with(tracks, start_index, QueueOptions::default())
            .await
    }

    pub async fn set_queue_with(
        &self,
        tracks: Vec<Track>,
        start_index: usize,
        options: QueueOptions,
    ) -> Result<usize> {
        if tracks.is_empty() {
            return Err(Error::EmptyQueue);
        }

        // Supersede an in-flight load before queueing for the transition lock
        let pending = {
            let mut core = self.core.lock();
            core.generation += 1;
            core.cache.cancel_all()
        };
        pending.wait().await;

        let _transition = self.transition.lock().await;

        let album_playback = options
            .album_playback
            .unwrap_or_else(|| is_album_queue(&tracks));
        let auto_play = options
            .auto_play
            .unwrap_or(self.config.scheduler.auto_play);

        let mut outbox = Outbox::default();
        let (generation, start, pending) = {
            let mut guard = self.core.lock();
            let core = &mut *guard;

            core.generation += 1;
            let pending = core.cache.cancel_all();

            self.output.stop();
            core.leave_active(&mut outbox);
            core.reset_track_progress();
            core.set_state(PlaybackState::Stopped, &mut outbox);

            let count = tracks.len();
            let start = core.queue.replace(tracks, start_index, &mut core.rng)?;
            core.album_playback = album_playback;
            core.play_intent = auto_play;
            core.queue_changed(QueueChangeTrigger::Replaced, &mut outbox);

            info!(
                "Queue replaced: {} track(s), starting at {} (album playback: {})",
                count, start, album_playback
            );
            (core.generation, start, pending)
        };
        self.dispatch(outbox);
        pending.wait().await;

        self.load_index(start, generation).await
    }

    /// Stop playback and empty the queue
    pub async fn clear_queue(&self) {
        let pending = {
            let mut core = self.core.lock();
            core.generation += 1;
            core.cache.cancel_all()
        };
        pending.wait().await;

        let _transition = self.transition.lock().await;

        let mut outbox = Outbox::default();
        let pending = {
            let mut guard = self.core.lock();
            let core = &mut *guard;

            core.generation += 1;
            let pending = core.cache.cancel_all();
            self.output.stop();
            core.leave_active(&mut outbox);
            core.reset_track_progress();
            core.duration = Duration::ZERO;
            core.lookahead = 0;
            core.queue.clear();
            self.apply_gain(core);
            core.set_state(PlaybackState::Stopped, &mut outbox);
            core.queue_changed(QueueChangeTrigger::Cleared, &mut outbox);
            pending
        };
        self.dispatch(outbox);

        let cancelled = pending.wait().await;
        info!("Queue cleared ({} preparation(s) cancelled)", cancelled);
    }

    /// Add tracks at the end of the queue
    ///
    /// On an empty queue nothing is loaded; use `skip_to(0)` to start.
    pub fn append(&self, tracks: Vec<Track>) {
        if tracks.is_empty() {
            return;
        }
        let _ = self.edit_queue(QueueChangeTrigger::Appended, |queue| {
            queue.append(tracks);
            Ok(())
        });
    }

    /// Add tracks directly after the current entry
    pub fn insert_after_current(&self, tracks: Vec<Track>) {
        if tracks.is_empty() {
            return;
        }
        let _ = self.edit_queue(QueueChangeTrigger::InsertedNext, |queue| {
            queue.insert_after_current(tracks);
            Ok(())
        });
    }

    /// Remove the entry at `index`; the current entry cannot be removed
    pub fn remove_at(&self, index: usize) -> Result<Track> {
        self.edit_queue(QueueChangeTrigger::Removed, |queue| queue.remove_at(index))
    }

    /// Move the entry at `from` to `to`
    pub fn move_entry(&self, from: usize, to: usize) -> Result<()> {
        self.edit_queue(QueueChangeTrigger::Moved, |queue| queue.move_entry(from, to))
    }

    /// Apply an in-place edit, then drop a stale hand-off and re-plan
    fn edit_queue<T>(
        &self,
        trigger: QueueChangeTrigger,
        edit: impl FnOnce(&mut PlayQueue) -> Result<T>,
    ) -> Result<T> {
        let condition = self.network.snapshot();
        let mut outbox = Outbox::default();
        let result = {
            let mut guard = self.core.lock();
            let core = &mut *guard;

            let result = edit(&mut core.queue)?;
            self.invalidate_handoff(core);
            self.refresh_lookahead_detached(core, &condition);
            core.queue_changed(trigger, &mut outbox);
            debug!("Queue edited ({:?}), {} entries", trigger, core.queue.len());
            result
        };
        self.dispatch(outbox);
        Ok(result)
    }

    /// Enable or disable shuffle; the current track stays current
    ///
    /// Returns `true` if the mode changed.
    pub fn set_shuffle(&self, enabled: bool) -> bool {
        let condition = self.network.snapshot();
        let mut outbox = Outbox::default();
        let changed = {
            let mut guard = self.core.lock();
            let core = &mut *guard;

            let changed = core.queue.set_shuffle(enabled, &mut core.rng);
            if changed {
                self.invalidate_handoff(core);
                self.refresh_lookahead_detached(core, &condition);
                self.apply_gain(core);

                let trigger = if enabled {
                    QueueChangeTrigger::Shuffled
                } else {
                    QueueChangeTrigger::Unshuffled
                };
                core.queue_changed(trigger, &mut outbox);
                outbox.event(CadenceEvent::ShuffleChanged {
                    enabled,
                    timestamp: Utc::now(),
                });
                info!("Shuffle {}", if enabled { "enabled" } else { "disabled" });
            }
            changed
        };
        self.dispatch(outbox);
        changed
    }

    /// Cycle `off -> all -> one -> off`
    pub fn cycle_repeat_mode(&self) -> RepeatMode {
        let condition = self.network.snapshot();
        let mut outbox = Outbox::default();
        let mode = {
            let mut guard = self.core.lock();
            let core = &mut *guard;

            let mode = core.queue.cycle_repeat();
            // Next entry and window both depend on the mode
            self.invalidate_handoff(core);
            self.refresh_lookahead_detached(core, &condition);
            outbox.event(CadenceEvent::RepeatModeChanged {
                repeat_mode: mode,
                timestamp: Utc::now(),
            });
            info!("Repeat mode {}", mode);
            mode
        };
        self.dispatch(outbox);
        mode
    }

    /// Reflect a rating on the current queue entry
    ///
    /// Index and playback state are untouched.
    pub fn update_current_track_rating(&self, rating: Option<u8>) -> Result<()> {
        let mut outbox = Outbox::default();
        {
            let mut guard = self.core.lock();
            let core = &mut *guard;

            let updated = core.queue.update_current_rating(rating)?.clone();
            if let Some(active) = core.active.as_mut() {
                if active.track.id == updated.id {
                    active.track.rating = rating;
                }
            }
            core.queue_changed(QueueChangeTrigger::RatingUpdated, &mut outbox);
            debug!("Rated {} as {:?}", updated.id, rating);
        }
        self.dispatch(outbox);
        Ok(())
    }

    /// Re-size the lookahead window from the current network condition
    ///
    /// Returns the new lookahead count once evicted preparations are torn down.
    pub async fn refresh_lookahead(&self) -> usize {
        let condition = self.network.snapshot();
        let (lookahead, pending) = {
            let mut guard = self.core.lock();
            let core = &mut *guard;
            let pending = self.plan_lookahead(core, &condition);
            (core.lookahead, pending)
        };
        pending.wait().await;
        lookahead
    }

    /// Network observer reported a change
    pub async fn network_changed(&self) -> usize {
        let condition = self.network.snapshot();
        info!(
            "Network changed: {:?} (connected {}, expensive {}, constrained {})",
            condition.class, condition.connected, condition.expensive, condition.constrained
        );
        self.refresh_lookahead().await
    }
}
