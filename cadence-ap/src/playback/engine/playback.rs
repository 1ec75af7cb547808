//! Transport operations and output event handling
//!
//! **Responsibilities:**
//! - Track transitions (advance_next, advance_previous, skip_to, retry_current)
//! - Intent changes on the active asset (toggle_play_pause, seek)
//! - Normalization settings
//! - Output events: latched preload/hand-off thresholds, throttled progress,
//!   stall tracking, end-of-track and gapless adoption

use super::core::{ActiveTrack, Outbox, PlaybackEngine, Report};
use crate::audio::OutputEvent;
use crate::error::{Error, Result};
use crate::gain::{GainDecision, NormalizationSettings};
use crate::playback::queue::PreviousAction;
use cadence_common::events::{CadenceEvent, PlaybackState};
use cadence_common::time::duration_to_ms;
use cadence_common::TrackId;
use chrono::Utc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

impl PlaybackEngine {
    /// Advance to the next entry per the repeat rules
    ///
    /// Returns the new current index, or `None` when the end of a
    /// non-repeating queue was reached (playback stops, queue kept).
    pub async fn advance_next(&self) -> Result<Option<usize>> {
        let _transition = self.transition.lock().await;

        let mut outbox = Outbox::default();
        let (generation, next) = {
            let mut guard = self.core.lock();
            let core = &mut *guard;
            let current = core.queue.current_index().ok_or(Error::NoCurrentTrack)?;

            match core.queue.resolve_next() {
                None => {
                    info!("End of queue reached, stopping");
                    self.invalidate_handoff(core);
                    self.output.pause();
                    self.output.seek(Duration::ZERO);
                    core.reset_track_progress();
                    core.play_intent = false;
                    core.set_state(PlaybackState::Stopped, &mut outbox);
                    drop(guard);
                    self.dispatch(outbox);
                    return Ok(None);
                }
                Some(next) if next == current && core.active.is_some() => {
                    debug!("Replaying index {}", current);
                    self.restart_current(core, true, &mut outbox);
                    drop(guard);
                    self.dispatch(outbox);
                    return Ok(Some(current));
                }
                Some(next) => (core.generation, next),
            }
        };

        self.load_index(next, generation).await.map(Some)
    }

    /// Go back one entry, or restart the current track past the threshold
    ///
    /// Returns the current index afterwards.
    pub async fn advance_previous(&self) -> Result<usize> {
        let _transition = self.transition.lock().await;
        let threshold = self.config.scheduler.restart_threshold();

        let mut outbox = Outbox::default();
        let (generation, target) = {
            let mut guard = self.core.lock();
            let core = &mut *guard;
            let current = core.queue.current_index().ok_or(Error::NoCurrentTrack)?;

            match core.queue.resolve_previous(core.position, threshold) {
                Some(PreviousAction::Restart) if core.active.is_some() => {
                    debug!("Restarting index {} ({:?} elapsed)", current, core.position);
                    self.restart_current(core, false, &mut outbox);
                    drop(guard);
                    self.dispatch(outbox);
                    return Ok(current);
                }
                Some(PreviousAction::Restart) => (core.generation, current),
                Some(PreviousAction::Index(index)) => (core.generation, index),
                None => return Err(Error::NoCurrentTrack),
            }
        };

        self.load_index(target, generation).await
    }

    /// Jump to `index`, bypassing repeat and shuffle rules
    pub async fn skip_to(&self, index: usize) -> Result<usize> {
        let _transition = self.transition.lock().await;

        let generation = {
            let core = self.core.lock();
            let len = core.queue.len();
            if index >= len {
                return Err(Error::InvalidIndex { index, len });
            }
            core.generation
        };

        self.load_index(index, generation).await
    }

    /// Load the current entry again (after `TrackUnavailable`)
    pub async fn retry_current(&self) -> Result<usize> {
        let _transition = self.transition.lock().await;

        let (generation, index) = {
            let core = self.core.lock();
            let index = core.queue.current_index().ok_or(Error::NoCurrentTrack)?;
            (core.generation, index)
        };

        self.load_index(index, generation).await
    }

    /// Flip between playing and paused
    ///
    /// While the current asset is still being prepared this only flips the
    /// intent applied once it is ready.
    pub fn toggle_play_pause(&self) -> Result<PlaybackState> {
        let mut outbox = Outbox::default();
        let state = {
            let mut guard = self.core.lock();
            let core = &mut *guard;
            if core.queue.is_empty() {
                return Err(Error::NoCurrentTrack);
            }

            match (core.state, core.active.is_some()) {
                (PlaybackState::Playing, _) => {
                    self.output.pause();
                    core.play_intent = false;
                    core.set_state(PlaybackState::Paused, &mut outbox);
                }
                (PlaybackState::Stopped, true) => {
                    // Replaying an ended track re-arms its completion report
                    core.reset_track_progress();
                    core.finished_reported = false;
                    self.output.play();
                    core.play_intent = true;
                    core.set_state(PlaybackState::Playing, &mut outbox);
                }
                (PlaybackState::Paused, _) => {
                    self.output.play();
                    core.play_intent = true;
                    core.set_state(PlaybackState::Playing, &mut outbox);
                }
                (PlaybackState::Stopped, false) => return Err(Error::NoActiveTrack),
                (PlaybackState::Loading, false) => {
                    core.play_intent = !core.play_intent;
                    debug!("Play intent while loading: {}", core.play_intent);
                }
                // Stalled: pausing takes effect now, resuming once refilled
                (PlaybackState::Loading, true) => {
                    if core.play_intent {
                        self.output.pause();
                        core.play_intent = false;
                        core.set_state(PlaybackState::Paused, &mut outbox);
                    } else {
                        self.output.play();
                        core.play_intent = true;
                    }
                }
            }
            core.state
        };
        self.dispatch(outbox);
        Ok(state)
    }

    /// Seek the active asset, clamped to `[0, duration]`
    pub fn seek(&self, position: Duration) -> Result<Duration> {
        let mut core = self.core.lock();
        if core.queue.is_empty() {
            return Err(Error::NoCurrentTrack);
        }
        if core.active.is_none() {
            return Err(Error::NoActiveTrack);
        }

        let clamped = position.min(core.duration);
        self.output.seek(clamped);
        core.position = clamped;
        debug!("Seek to {:?}", clamped);
        Ok(clamped)
    }

    /// Replace normalization settings and re-apply the current gain
    pub fn set_normalization(&self, settings: NormalizationSettings) -> GainDecision {
        let mut guard = self.core.lock();
        let core = &mut *guard;
        core.normalization = settings;
        self.apply_gain(core);
        info!("Normalization set to {:?} (preamp {} dB)", settings.mode, settings.preamp_db);
        core.gain
    }

    /// React to an event from the output layer
    ///
    /// Events naming a track other than the active one are stale and dropped.
    pub async fn handle_output_event(&self, event: OutputEvent) {
        match event {
            OutputEvent::Progress {
                track_id,
                position,
                duration,
            } => self.on_progress(&track_id, position, duration).await,
            OutputEvent::Stalled { track_id } => self.on_stall(&track_id, true),
            OutputEvent::Resumed { track_id } => self.on_stall(&track_id, false),
            OutputEvent::Finished { track_id } => self.on_finished(&track_id).await,
            OutputEvent::AdvancedTo {
                finished,
                index,
                track_id,
            } => self.on_advanced(&finished, index, &track_id).await,
        }
    }

    async fn on_progress(&self, track_id: &TrackId, position: Duration, duration: Duration) {
        let scheduler = &self.config.scheduler;
        let condition = self.network.snapshot();
        let mut outbox = Outbox::default();

        let pending = {
            let mut guard = self.core.lock();
            let core = &mut *guard;
            if core.active_track_id() != Some(track_id) {
                return;
            }

            if !duration.is_zero() {
                core.duration = duration;
            }
            core.position = position.min(core.duration);
            let progress = if core.duration.is_zero() {
                0.0
            } else {
                core.position.as_secs_f64() / core.duration.as_secs_f64()
            };

            let mut pending = None;
            if !core.preload_latched && progress > scheduler.preload_threshold {
                core.preload_latched = true;
                debug!("{} passed {:.0}%, ensuring lookahead", track_id, progress * 100.0);
                pending = Some(self.plan_lookahead(core, &condition));
            }
            if !core.handoff_latched && progress > scheduler.handoff_threshold {
                core.handoff_latched = true;
                self.try_handoff(core);
            }

            let now = Instant::now();
            let due = core
                .last_progress_report
                .map(|last| now.duration_since(last) >= scheduler.progress_interval())
                .unwrap_or(true);
            if due {
                core.last_progress_report = Some(now);
                outbox.report(Report::Progress(core.position, core.duration));
                outbox.event(CadenceEvent::PlaybackProgress {
                    track_id: track_id.clone(),
                    position_ms: duration_to_ms(core.position),
                    duration_ms: duration_to_ms(core.duration),
                    timestamp: Utc::now(),
                });
            }
            pending
        };

        self.dispatch(outbox);
        if let Some(pending) = pending {
            pending.wait().await;
        }
    }

    fn on_stall(&self, track_id: &TrackId, stalled: bool) {
        let mut outbox = Outbox::default();
        {
            let mut guard = self.core.lock();
            let core = &mut *guard;
            if core.active_track_id() != Some(track_id) {
                return;
            }

            match (stalled, core.state) {
                (true, PlaybackState::Playing) => {
                    warn!("Playback of {} stalled, rebuffering", track_id);
                    core.set_state(PlaybackState::Loading, &mut outbox);
                }
                (false, PlaybackState::Loading) => {
                    info!("Playback of {} resumed", track_id);
                    let next = if core.play_intent {
                        PlaybackState::Playing
                    } else {
                        PlaybackState::Paused
                    };
                    core.set_state(next, &mut outbox);
                }
                _ => {}
            }
        }
        self.dispatch(outbox);
    }

    async fn on_finished(&self, track_id: &TrackId) {
        let mut outbox = Outbox::default();
        {
            let mut core = self.core.lock();
            if core.active_track_id() != Some(track_id) {
                debug!("Ignoring end of stale track {}", track_id);
                return;
            }
            core.mark_finished(&mut outbox);
        }
        self.dispatch(outbox);

        match self.advance_next().await {
            Ok(_) | Err(Error::Superseded) => {}
            Err(e) => warn!("Advance after {} finished failed: {}", track_id, e),
        }
    }

    async fn on_advanced(&self, finished: &TrackId, index: usize, track_id: &TrackId) {
        let condition = self.network.snapshot();
        let mut outbox = Outbox::default();

        let transition = self.transition.lock().await;
        let adopted = {
            let mut guard = self.core.lock();
            let core = &mut *guard;
            if core.active_track_id() != Some(finished) {
                debug!("Ignoring hand-off from stale track {}", finished);
                return;
            }
            core.mark_finished(&mut outbox);

            let expected = core
                .handoff
                .take()
                .filter(|h| h.index == index && &h.track_id == track_id)
                .filter(|_| core.queue.get(index).map(|t| &t.id == track_id).unwrap_or(false));

            match expected {
                Some(handoff) => {
                    let track = core.queue.get(index).cloned();
                    match (track, core.queue.set_current(index)) {
                        (Some(track), Ok(())) => {
                            let duration = if handoff.asset.duration().is_zero() {
                                track.duration
                            } else {
                                handoff.asset.duration()
                            };
                            core.reset_track_progress();
                            core.duration = duration;
                            core.finished_reported = false;
                            core.active = Some(ActiveTrack {
                                track: track.clone(),
                                asset: handoff.asset,
                            });
                            self.apply_gain(core);

                            info!("Gapless hand-off to {} (index {})", track.id, index);
                            outbox.event(CadenceEvent::TrackStarted {
                                track_id: track.id.clone(),
                                index,
                                gapless: true,
                                timestamp: Utc::now(),
                            });
                            outbox.report(Report::TrackChanged(track, duration));
                            Some(self.plan_lookahead(core, &condition))
                        }
                        _ => None,
                    }
                }
                None => {
                    warn!(
                        "Output advanced to unexpected entry {} (index {}), reloading",
                        track_id, index
                    );
                    None
                }
            }
        };
        self.dispatch(outbox);

        match adopted {
            Some(pending) => {
                pending.wait().await;
            }
            None => {
                drop(transition);
                match self.advance_next().await {
                    Ok(_) | Err(Error::Superseded) => {}
                    Err(e) => warn!("Fallback advance after {} failed: {}", finished, e),
                }
            }
        }
    }
}
