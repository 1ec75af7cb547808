//! Fake collaborators for engine integration tests
//!
//! - FakeResolver: fails on demand per track
//! - FakePreparer: per-track latency and failure, counts cancellations
//! - RecordingOutput: records every command the engine issues
//! - SettableNetwork: network condition switchable mid-test
//! - RecordingReporter: records now-playing notifications

use async_trait::async_trait;
use cadence_ap::audio::{
    AssetPreparer, AudioOutput, PrepareOptions, PreparedAsset, ResolveOptions, SourceError,
    SourceResolver, SourceUri,
};
use cadence_ap::network::{NetworkCondition, NetworkObserver};
use cadence_ap::session::SessionReporter;
use cadence_common::{Track, TrackId};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug)]
pub struct FakeAsset {
    id: TrackId,
    duration: Duration,
}

impl PreparedAsset for FakeAsset {
    fn track_id(&self) -> &TrackId {
        &self.id
    }

    fn duration(&self) -> Duration {
        self.duration
    }

    fn is_playable(&self) -> bool {
        true
    }
}

#[derive(Default)]
pub struct FakeResolver {
    failing: Mutex<HashSet<TrackId>>,
    resolved: AtomicUsize,
}

impl FakeResolver {
    pub fn fail(&self, id: &str) {
        self.failing.lock().unwrap().insert(TrackId::new(id));
    }

    pub fn heal(&self, id: &str) {
        self.failing.lock().unwrap().remove(&TrackId::new(id));
    }

    pub fn resolved(&self) -> usize {
        self.resolved.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceResolver for FakeResolver {
    async fn resolve_source(
        &self,
        track: &Track,
        _options: &ResolveOptions,
    ) -> Result<SourceUri, SourceError> {
        self.resolved.fetch_add(1, Ordering::SeqCst);
        if self.failing.lock().unwrap().contains(&track.id) {
            return Err(SourceError::Unavailable(format!("{} not found", track.id)));
        }
        Ok(SourceUri::new(format!("fake://{}", track.id)))
    }
}

pub struct FakePreparer {
    default_latency: Duration,
    latency: Mutex<HashMap<TrackId, Duration>>,
    failing: Mutex<HashSet<TrackId>>,
    started: Mutex<Vec<TrackId>>,
    buffer_durations: Mutex<Vec<Duration>>,
    cancelled: Arc<AtomicUsize>,
}

impl FakePreparer {
    pub fn new(default_latency: Duration) -> Self {
        Self {
            default_latency,
            latency: Mutex::new(HashMap::new()),
            failing: Mutex::new(HashSet::new()),
            started: Mutex::new(Vec::new()),
            buffer_durations: Mutex::new(Vec::new()),
            cancelled: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn set_latency(&self, id: &str, latency: Duration) {
        self.latency.lock().unwrap().insert(TrackId::new(id), latency);
    }

    pub fn fail(&self, id: &str) {
        self.failing.lock().unwrap().insert(TrackId::new(id));
    }

    pub fn heal(&self, id: &str) {
        self.failing.lock().unwrap().remove(&TrackId::new(id));
    }

    /// Track ids in the order their preparation started
    pub fn started(&self) -> Vec<String> {
        self.started.lock().unwrap().iter().map(|id| id.to_string()).collect()
    }

    pub fn started_count(&self, id: &str) -> usize {
        self.started
            .lock()
            .unwrap()
            .iter()
            .filter(|t| t.as_str() == id)
            .count()
    }

    pub fn last_buffer_duration(&self) -> Option<Duration> {
        self.buffer_durations.lock().unwrap().last().copied()
    }

    /// Preparations dropped before completing
    pub fn cancelled(&self) -> usize {
        self.cancelled.load(Ordering::SeqCst)
    }
}

struct InFlight {
    done: bool,
    cancelled: Arc<AtomicUsize>,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        if !self.done {
            self.cancelled.fetch_add(1, Ordering::SeqCst);
        }
    }
}

#[async_trait]
impl AssetPreparer for FakePreparer {
    async fn prepare(
        &self,
        track: &Track,
        _uri: &SourceUri,
        options: &PrepareOptions,
    ) -> Result<Arc<dyn PreparedAsset>, SourceError> {
        self.started.lock().unwrap().push(track.id.clone());
        self.buffer_durations.lock().unwrap().push(options.buffer_duration);

        let latency = self
            .latency
            .lock()
            .unwrap()
            .get(&track.id)
            .copied()
            .unwrap_or(self.default_latency);

        let mut guard = InFlight {
            done: false,
            cancelled: Arc::clone(&self.cancelled),
        };
        tokio::time::sleep(latency).await;
        guard.done = true;

        if self.failing.lock().unwrap().contains(&track.id) {
            return Err(SourceError::PreparationFailed(format!("{} is corrupt", track.id)));
        }
        Ok(Arc::new(FakeAsset {
            id: track.id.clone(),
            duration: track.duration,
        }))
    }
}

/// Command issued to the output
#[derive(Debug, Clone, PartialEq)]
pub enum OutputCall {
    Attach(String),
    AttachNext(usize, String),
    ClearNext,
    Play,
    Pause,
    Stop,
    Seek(Duration),
    SetVolume(f32),
}

#[derive(Default)]
pub struct RecordingOutput {
    calls: Mutex<Vec<OutputCall>>,
}

impl RecordingOutput {
    pub fn calls(&self) -> Vec<OutputCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.calls.lock().unwrap().clear();
    }

    pub fn attached(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                OutputCall::Attach(id) => Some(id),
                _ => None,
            })
            .collect()
    }

    pub fn last_volume(&self) -> Option<f32> {
        self.calls().into_iter().rev().find_map(|c| match c {
            OutputCall::SetVolume(v) => Some(v),
            _ => None,
        })
    }

    fn record(&self, call: OutputCall) {
        self.calls.lock().unwrap().push(call);
    }
}

impl AudioOutput for RecordingOutput {
    fn attach(&self, asset: Arc<dyn PreparedAsset>) {
        self.record(OutputCall::Attach(asset.track_id().to_string()));
    }

    fn attach_next(&self, index: usize, asset: Arc<dyn PreparedAsset>) {
        self.record(OutputCall::AttachNext(index, asset.track_id().to_string()));
    }

    fn clear_next(&self) {
        self.record(OutputCall::ClearNext);
    }

    fn play(&self) {
        self.record(OutputCall::Play);
    }

    fn pause(&self) {
        self.record(OutputCall::Pause);
    }

    fn stop(&self) {
        self.record(OutputCall::Stop);
    }

    fn seek(&self, position: Duration) {
        self.record(OutputCall::Seek(position));
    }

    fn set_volume(&self, volume: f32) {
        self.record(OutputCall::SetVolume(volume));
    }

    fn active_device(&self) -> Option<String> {
        Some("test-device".to_string())
    }
}

pub struct SettableNetwork {
    condition: Mutex<NetworkCondition>,
}

impl SettableNetwork {
    pub fn new(condition: NetworkCondition) -> Self {
        Self {
            condition: Mutex::new(condition),
        }
    }

    pub fn set(&self, condition: NetworkCondition) {
        *self.condition.lock().unwrap() = condition;
    }
}

impl NetworkObserver for SettableNetwork {
    fn snapshot(&self) -> NetworkCondition {
        *self.condition.lock().unwrap()
    }
}

/// Notification received by the reporter
#[derive(Debug, Clone, PartialEq)]
pub enum ReporterCall {
    TrackChanged(String, Duration),
    Progress(Duration, Duration),
    PlaybackState(bool),
    TrackFinished(String),
}

#[derive(Default)]
pub struct RecordingReporter {
    calls: Mutex<Vec<ReporterCall>>,
}

impl RecordingReporter {
    pub fn calls(&self) -> Vec<ReporterCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn progress_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, ReporterCall::Progress(..)))
            .count()
    }

    pub fn finished(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                ReporterCall::TrackFinished(id) => Some(id),
                _ => None,
            })
            .collect()
    }

    pub fn changed(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                ReporterCall::TrackChanged(id, _) => Some(id),
                _ => None,
            })
            .collect()
    }
}

impl SessionReporter for RecordingReporter {
    fn report_track_changed(&self, track: &Track, duration: Duration) {
        self.calls
            .lock()
            .unwrap()
            .push(ReporterCall::TrackChanged(track.id.to_string(), duration));
    }

    fn report_progress(&self, current: Duration, duration: Duration) {
        self.calls
            .lock()
            .unwrap()
            .push(ReporterCall::Progress(current, duration));
    }

    fn report_playback_state(&self, is_playing: bool) {
        self.calls
            .lock()
            .unwrap()
            .push(ReporterCall::PlaybackState(is_playing));
    }

    fn report_track_finished(&self, track_id: &TrackId) {
        self.calls
            .lock()
            .unwrap()
            .push(ReporterCall::TrackFinished(track_id.to_string()));
    }
}
