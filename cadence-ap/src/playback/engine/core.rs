//! Core playback engine - construction, shared state and orchestration
//!
//! **Responsibilities:**
//! - PlaybackEngine struct definition and initialization
//! - Output event handler lifecycle (`start`)
//! - Loading an index onto the output (`load_index`) and restarting in place
//! - Lookahead planning and cache pruning around the playhead
//! - Deferred dispatch of reporter notifications and observer events
//!
//! **Locking:** `core` (parking_lot) guards queue, cache membership and
//! playback state and is never held across an `.await`. `transition` (tokio,
//! FIFO) serializes every operation that changes the current index.
//! Notifications are collected while `core` is held and dispatched after it
//! is released, so reporters may call back into the engine.

use crate::audio::{
    AssetPreparer, AudioOutput, OutputEvent, PrepareOptions, PreparedAsset, SourceResolver,
};
use crate::buffering::{self, MAX_LOOKAHEAD};
use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::gain::{compute_gain, GainDecision, NormalizationSettings, PlaybackContext};
use crate::network::{NetworkCondition, NetworkObserver};
use crate::playback::asset_cache::{PendingCancellation, PreparedAssetCache};
use crate::playback::preparation::AssetPreparationService;
use crate::playback::queue::PlayQueue;
use crate::session::SessionReporter;
use cadence_common::events::{CadenceEvent, EventBus, PlaybackState, QueueChangeTrigger};
use cadence_common::{Track, TrackId};
use chrono::Utc;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// External collaborators the engine drives
pub struct EngineDeps {
    pub resolver: Arc<dyn SourceResolver>,
    pub preparer: Arc<dyn AssetPreparer>,
    pub output: Arc<dyn AudioOutput>,
    pub network: Arc<dyn NetworkObserver>,
    pub reporter: Arc<dyn SessionReporter>,
}

/// Per-call overrides for `set_queue_with`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueOptions {
    /// Start playing once loaded (default: `scheduler.auto_play`)
    pub auto_play: Option<bool>,
    /// Treat the queue as an album (default: every track shares one album id)
    pub album_playback: Option<bool>,
}

/// Asset currently attached to the output
pub(super) struct ActiveTrack {
    pub(super) track: Track,
    pub(super) asset: Arc<dyn PreparedAsset>,
}

/// Asset pre-attached to the output's play-ahead slot
pub(super) struct Handoff {
    pub(super) index: usize,
    pub(super) track_id: TrackId,
    pub(super) asset: Arc<dyn PreparedAsset>,
}

/// Deferred session-reporter call
pub(super) enum Report {
    TrackChanged(Track, Duration),
    Progress(Duration, Duration),
    PlaybackState(bool),
    TrackFinished(TrackId),
}

/// Notifications collected under the core lock
#[derive(Default)]
pub(super) struct Outbox {
    events: Vec<CadenceEvent>,
    reports: Vec<Report>,
}

impl Outbox {
    pub(super) fn event(&mut self, event: CadenceEvent) {
        self.events.push(event);
    }

    pub(super) fn report(&mut self, report: Report) {
        self.reports.push(report);
    }
}

/// Engine state guarded by the core lock
pub(super) struct EngineCore {
    pub(super) queue: PlayQueue,
    pub(super) cache: PreparedAssetCache,
    pub(super) state: PlaybackState,
    /// Play once the current asset is ready (vs. stay paused)
    pub(super) play_intent: bool,
    /// Bumped by `set_queue`/`clear_queue`; stale loads compare against it
    pub(super) generation: u64,
    pub(super) active: Option<ActiveTrack>,
    pub(super) handoff: Option<Handoff>,
    pub(super) position: Duration,
    pub(super) duration: Duration,
    pub(super) preload_latched: bool,
    pub(super) handoff_latched: bool,
    /// Completion already reported for the active track
    pub(super) finished_reported: bool,
    pub(super) album_playback: bool,
    pub(super) normalization: NormalizationSettings,
    pub(super) gain: GainDecision,
    pub(super) lookahead: usize,
    pub(super) last_progress_report: Option<Instant>,
    pub(super) rng: StdRng,
}

impl EngineCore {
    pub(super) fn set_state(&mut self, new_state: PlaybackState, outbox: &mut Outbox) {
        let old_state = self.state;
        if old_state == new_state {
            return;
        }
        self.state = new_state;
        debug!("Playback state {} -> {}", old_state, new_state);

        outbox.event(CadenceEvent::PlaybackStateChanged {
            old_state,
            new_state,
            timestamp: Utc::now(),
        });
        if old_state.is_playing() != new_state.is_playing() {
            outbox.report(Report::PlaybackState(new_state.is_playing()));
        }
    }

    pub(super) fn queue_changed(&self, trigger: QueueChangeTrigger, outbox: &mut Outbox) {
        outbox.event(CadenceEvent::QueueChanged {
            queue: self.queue.track_ids(),
            current_index: self.queue.current_index(),
            trigger,
            timestamp: Utc::now(),
        });
    }

    /// Re-arm the per-track progress triggers
    pub(super) fn reset_track_progress(&mut self) {
        self.position = Duration::ZERO;
        self.preload_latched = false;
        self.handoff_latched = false;
        self.last_progress_report = None;
    }

    /// Report natural completion of the active track
    pub(super) fn mark_finished(&mut self, outbox: &mut Outbox) {
        let Some(active) = self.active.as_ref() else {
            return;
        };
        if self.finished_reported {
            return;
        }
        self.finished_reported = true;
        outbox.report(Report::TrackFinished(active.track.id.clone()));
        outbox.event(CadenceEvent::TrackCompleted {
            track_id: active.track.id.clone(),
            duration_played: self.duration.as_secs_f64(),
            completed: true,
            timestamp: Utc::now(),
        });
    }

    /// Drop the active and pre-attached assets, reporting a skipped track
    pub(super) fn leave_active(&mut self, outbox: &mut Outbox) {
        if let Some(active) = self.active.take() {
            if !self.finished_reported {
                outbox.event(CadenceEvent::TrackCompleted {
                    track_id: active.track.id.clone(),
                    duration_played: self.position.as_secs_f64(),
                    completed: false,
                    timestamp: Utc::now(),
                });
            }
        }
        self.handoff = None;
        self.finished_reported = false;
    }

    pub(super) fn active_track_id(&self) -> Option<&TrackId> {
        self.active.as_ref().map(|a| &a.track.id)
    }
}

/// Playback engine - owns the queue and drives cache, output and reporter
pub struct PlaybackEngine {
    pub(super) core: Mutex<EngineCore>,

    /// Serializes index-changing operations in issue order
    pub(super) transition: tokio::sync::Mutex<()>,

    pub(super) preparation: AssetPreparationService,
    pub(super) output: Arc<dyn AudioOutput>,
    pub(super) network: Arc<dyn NetworkObserver>,
    pub(super) reporter: Arc<dyn SessionReporter>,

    pub(super) events: EventBus,
    pub(super) config: EngineConfig,

    /// Runtime for preparation tasks and background cancellation
    pub(super) runtime: Handle,

    /// Taken by the output event handler on `start`
    output_event_rx: Mutex<Option<mpsc::UnboundedReceiver<OutputEvent>>>,
}

impl PlaybackEngine {
    /// Create a new engine
    ///
    /// Must be called from within a tokio runtime; the engine keeps a handle
    /// to it for preparation tasks.
    pub fn new(
        deps: EngineDeps,
        output_events: mpsc::UnboundedReceiver<OutputEvent>,
        config: EngineConfig,
    ) -> Result<Self> {
        let runtime = Handle::try_current().map_err(|e| Error::Runtime(e.to_string()))?;
        let config = config.validated();

        info!(
            "Creating playback engine (preload {:.0}%, hand-off {:.0}%, normalization {:?})",
            config.scheduler.preload_threshold * 100.0,
            config.scheduler.handoff_threshold * 100.0,
            config.normalization.mode
        );

        let preparation = AssetPreparationService::new(
            deps.resolver,
            deps.preparer,
            config.streaming.clone(),
        );

        let core = EngineCore {
            queue: PlayQueue::new(),
            cache: PreparedAssetCache::new(runtime.clone()),
            state: PlaybackState::Stopped,
            play_intent: config.scheduler.auto_play,
            generation: 0,
            active: None,
            handoff: None,
            position: Duration::ZERO,
            duration: Duration::ZERO,
            preload_latched: false,
            handoff_latched: false,
            finished_reported: false,
            album_playback: false,
            normalization: config.normalization,
            gain: GainDecision::UNITY,
            lookahead: 0,
            last_progress_report: None,
            rng: StdRng::from_entropy(),
        };

        Ok(Self {
            core: Mutex::new(core),
            transition: tokio::sync::Mutex::new(()),
            preparation,
            output: deps.output,
            network: deps.network,
            reporter: deps.reporter,
            events: EventBus::new(config.scheduler.event_capacity),
            config,
            runtime,
            output_event_rx: Mutex::new(Some(output_events)),
        })
    }

    /// Seed the shuffle RNG (reproducible shuffles)
    pub fn with_shuffle_seed(mut self, seed: u64) -> Self {
        self.core.get_mut().rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Start the output event handler
    ///
    /// Returns `None` if it is already running. The handler holds only a weak
    /// reference and exits once the engine is dropped or the output closes
    /// its channel.
    pub fn start(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        let Some(mut rx) = self.output_event_rx.lock().take() else {
            warn!("Output event handler already started");
            return None;
        };
        let engine = Arc::downgrade(self);

        Some(self.runtime.spawn(async move {
            info!("Output event handler started");
            while let Some(event) = rx.recv().await {
                let Some(engine) = engine.upgrade() else {
                    break;
                };
                engine.handle_output_event(event).await;
            }
            debug!("Output event handler stopped");
        }))
    }

    /// Subscribe to observer events
    pub fn subscribe(&self) -> broadcast::Receiver<CadenceEvent> {
        self.events.subscribe()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Deliver notifications collected under the core lock
    pub(super) fn dispatch(&self, outbox: Outbox) {
        for report in outbox.reports {
            match report {
                Report::TrackChanged(track, duration) => {
                    self.reporter.report_track_changed(&track, duration)
                }
                Report::Progress(current, duration) => {
                    self.reporter.report_progress(current, duration)
                }
                Report::PlaybackState(is_playing) => {
                    self.reporter.report_playback_state(is_playing)
                }
                Report::TrackFinished(track_id) => self.reporter.report_track_finished(&track_id),
            }
        }
        for event in outbox.events {
            debug!("Event: {}", event.event_type());
            self.events.emit_lossy(event);
        }
    }

    /// Recompute and apply the gain of the active track
    pub(super) fn apply_gain(&self, core: &mut EngineCore) {
        let Some(active) = core.active.as_ref() else {
            core.gain = GainDecision::UNITY;
            return;
        };
        let context = PlaybackContext {
            is_shuffle: core.queue.is_shuffled(),
            is_album_playback: core.album_playback,
        };
        let decision = compute_gain(&active.track.loudness, &core.normalization, context);
        if decision != core.gain {
            debug!(
                "Gain for {}: x{:.3} ({:?})",
                active.track.id, decision.multiplier, decision.source
            );
        }
        core.gain = decision;
        self.output.set_volume(decision.as_volume());
    }

    /// Size the lookahead window, prune the cache to the keep-set and start
    /// preparing the window
    ///
    /// The returned cancellation must be awaited (or detached) by the caller
    /// once the core lock is released.
    pub(super) fn plan_lookahead(
        &self,
        core: &mut EngineCore,
        condition: &NetworkCondition,
    ) -> PendingCancellation {
        if core.queue.is_empty() {
            core.lookahead = 0;
            return core.cache.cancel_all();
        }

        let candidates = core.queue.upcoming(MAX_LOOKAHEAD);
        let durations: Vec<Duration> = candidates
            .iter()
            .filter_map(|idx| core.queue.get(*idx))
            .map(|t| t.duration)
            .collect();
        let plan = buffering::plan(condition, &durations);
        core.lookahead = plan.lookahead;

        let keep: HashSet<TrackId> = core
            .queue
            .keep_indices(plan.lookahead)
            .into_iter()
            .filter_map(|idx| core.queue.get(idx).map(|t| t.id.clone()))
            .collect();
        let pending = core.cache.prune(&keep);

        if condition.connected {
            let options = PrepareOptions {
                buffer_duration: plan.buffer_duration,
            };
            let window: Vec<Track> = core
                .queue
                .upcoming(plan.lookahead)
                .into_iter()
                .filter_map(|idx| core.queue.get(idx).cloned())
                .collect();
            for track in &window {
                let _ = core.cache.ensure(track, options, &self.preparation);
            }
        }

        debug!(
            "Lookahead {} (buffer {}s), cache holds {} asset(s)",
            plan.lookahead,
            plan.buffer_duration.as_secs(),
            core.cache.len()
        );
        pending
    }

    /// Re-plan from a synchronous operation; cancelled tasks are awaited in
    /// the background
    pub(super) fn refresh_lookahead_detached(&self, core: &mut EngineCore, condition: &NetworkCondition) {
        self.plan_lookahead(core, condition).detach(&self.runtime);
    }

    /// Empty the play-ahead slot and allow the hand-off to be retried
    pub(super) fn invalidate_handoff(&self, core: &mut EngineCore) {
        if core.handoff.take().is_some() {
            debug!("Pre-attached asset invalidated");
            self.output.clear_next();
        }
        core.handoff_latched = false;
    }

    /// Pre-attach the next entry if its asset is already prepared
    pub(super) fn try_handoff(&self, core: &mut EngineCore) {
        let Some(next) = core.queue.handoff_index() else {
            return;
        };
        let Some(track_id) = core.queue.get(next).map(|t| t.id.clone()) else {
            return;
        };

        match core.cache.get_ready(&track_id) {
            Some(asset) => {
                debug!("Pre-attaching {} (index {}) for gapless hand-off", track_id, next);
                self.output.attach_next(next, Arc::clone(&asset));
                core.handoff = Some(Handoff {
                    index: next,
                    track_id,
                    asset,
                });
            }
            None => {
                debug!("Next track {} not prepared, hand-off will reload", track_id);
            }
        }
    }

    /// Seek the active track back to zero
    ///
    /// `replay` marks a repeat-one replay, which is reported as a new start.
    pub(super) fn restart_current(&self, core: &mut EngineCore, replay: bool, outbox: &mut Outbox) {
        self.invalidate_handoff(core);
        self.output.seek(Duration::ZERO);
        core.reset_track_progress();

        if replay {
            core.finished_reported = false;
            if let Some(active) = core.active.as_ref() {
                outbox.event(CadenceEvent::TrackStarted {
                    track_id: active.track.id.clone(),
                    index: core.queue.current_index().unwrap_or(0),
                    gapless: false,
                    timestamp: Utc::now(),
                });
                outbox.report(Report::TrackChanged(active.track.clone(), core.duration));
            }
        }

        if core.play_intent {
            self.output.play();
            core.set_state(PlaybackState::Playing, outbox);
        }
    }

    /// Load `index` onto the output, preparing it if necessary
    ///
    /// Caller holds the transition lock. Returns the index the loaded track
    /// ends up at (queue edits may shift it while preparation is awaited).
    pub(super) async fn load_index(&self, index: usize, generation: u64) -> Result<usize> {
        let condition = self.network.snapshot();
        let mut outbox = Outbox::default();

        let (track, ticket, pending) = {
            let mut guard = self.core.lock();
            let core = &mut *guard;

            if core.generation != generation {
                return Err(Error::Superseded);
            }
            core.queue.set_current(index)?;
            let track = core.queue.current().cloned().ok_or(Error::NoCurrentTrack)?;

            core.leave_active(&mut outbox);
            self.output.stop();
            core.reset_track_progress();
            core.duration = track.duration;
            core.set_state(PlaybackState::Loading, &mut outbox);

            let options = PrepareOptions {
                buffer_duration: buffering::buffer_duration(&condition),
            };
            let ticket = core.cache.ensure(&track, options, &self.preparation);
            let pending = self.plan_lookahead(core, &condition);
            (track, ticket, pending)
        };
        self.dispatch(outbox);

        info!("Loading {} (index {})", track.id, index);
        pending.wait().await;
        let result = ticket.wait().await;

        let mut outbox = Outbox::default();
        let outcome = {
            let mut guard = self.core.lock();
            let core = &mut *guard;

            let still_current = core.generation == generation
                && core.queue.current().map(|t| t.id == track.id).unwrap_or(false);
            if !still_current {
                debug!("Load of {} superseded", track.id);
                return Err(Error::Superseded);
            }

            match result {
                Ok(asset) => {
                    let index = core.queue.current_index().unwrap_or(index);
                    let current = core.queue.current().cloned().unwrap_or(track);
                    let duration = if asset.duration().is_zero() {
                        current.duration
                    } else {
                        asset.duration()
                    };

                    self.output.attach(Arc::clone(&asset));
                    core.duration = duration;
                    core.finished_reported = false;
                    core.active = Some(ActiveTrack {
                        track: current.clone(),
                        asset,
                    });
                    self.apply_gain(core);

                    if core.play_intent {
                        self.output.play();
                        core.set_state(PlaybackState::Playing, &mut outbox);
                    } else {
                        core.set_state(PlaybackState::Paused, &mut outbox);
                    }

                    info!("Started {} (index {})", current.id, index);
                    outbox.event(CadenceEvent::TrackStarted {
                        track_id: current.id.clone(),
                        index,
                        gapless: false,
                        timestamp: Utc::now(),
                    });
                    outbox.report(Report::TrackChanged(current, duration));
                    Ok(index)
                }
                Err(e) => {
                    let err = e.into_unavailable(&track.id);
                    warn!("Current track unavailable: {}", err);
                    if let Error::TrackUnavailable { track_id, reason } = &err {
                        outbox.event(CadenceEvent::TrackUnavailable {
                            track_id: track_id.clone(),
                            reason: reason.clone(),
                            timestamp: Utc::now(),
                        });
                    }
                    core.set_state(PlaybackState::Stopped, &mut outbox);
                    Err(err)
                }
            }
        };
        self.dispatch(outbox);
        outcome
    }
}
