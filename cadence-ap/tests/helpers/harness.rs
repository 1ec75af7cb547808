//! Engine harness wiring the fakes together
//!
//! Output events are fed straight into `handle_output_event` so every test
//! controls exactly when the playhead moves.

use super::fakes::{FakePreparer, FakeResolver, RecordingOutput, RecordingReporter, SettableNetwork};
use cadence_ap::audio::OutputEvent;
use cadence_ap::config::EngineConfig;
use cadence_ap::network::NetworkCondition;
use cadence_ap::{EngineDeps, PlaybackEngine};
use cadence_common::events::CadenceEvent;
use cadence_common::{Track, TrackId};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};

/// Latency of a preparation unless overridden per track
pub const DEFAULT_LATENCY: Duration = Duration::from_millis(50);

pub struct TestEngine {
    pub engine: Arc<PlaybackEngine>,
    pub resolver: Arc<FakeResolver>,
    pub preparer: Arc<FakePreparer>,
    pub output: Arc<RecordingOutput>,
    pub network: Arc<SettableNetwork>,
    pub reporter: Arc<RecordingReporter>,
    /// Feeds the engine's output event handler once `start` is called
    pub output_tx: mpsc::UnboundedSender<OutputEvent>,
}

impl TestEngine {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        let resolver = Arc::new(FakeResolver::default());
        let preparer = Arc::new(FakePreparer::new(DEFAULT_LATENCY));
        let output = Arc::new(RecordingOutput::default());
        let network = Arc::new(SettableNetwork::new(NetworkCondition::wifi()));
        let reporter = Arc::new(RecordingReporter::default());

        let deps = EngineDeps {
            resolver: resolver.clone(),
            preparer: preparer.clone(),
            output: output.clone(),
            network: network.clone(),
            reporter: reporter.clone(),
        };

        // Most tests inject events directly; the channel is for `start`
        let (output_tx, rx) = mpsc::unbounded_channel();
        let engine = PlaybackEngine::new(deps, rx, config)
            .expect("engine must be created inside a runtime")
            .with_shuffle_seed(42);

        Self {
            engine: Arc::new(engine),
            resolver,
            preparer,
            output,
            network,
            reporter,
            output_tx,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CadenceEvent> {
        self.engine.subscribe()
    }

    pub async fn progress(&self, id: &str, position_secs: f64, duration_secs: f64) {
        self.engine
            .handle_output_event(OutputEvent::Progress {
                track_id: TrackId::new(id),
                position: Duration::from_secs_f64(position_secs),
                duration: Duration::from_secs_f64(duration_secs),
            })
            .await;
    }

    pub async fn finish(&self, id: &str) {
        self.engine
            .handle_output_event(OutputEvent::Finished {
                track_id: TrackId::new(id),
            })
            .await;
    }

    pub async fn advanced_to(&self, finished: &str, index: usize, id: &str) {
        self.engine
            .handle_output_event(OutputEvent::AdvancedTo {
                finished: TrackId::new(finished),
                index,
                track_id: TrackId::new(id),
            })
            .await;
    }

    pub fn current_id(&self) -> Option<String> {
        self.engine.status().track_id.map(|id| id.to_string())
    }

    pub fn cached(&self) -> Vec<String> {
        ids(&self.engine.cached_track_ids())
    }

    pub fn queue(&self) -> Vec<String> {
        ids(&self.engine.queue_track_ids())
    }
}

pub fn track(id: &str, secs: u64) -> Track {
    Track::new(id, format!("Track {id}"), Duration::from_secs(secs))
}

pub fn tracks(ids: &[&str], secs: u64) -> Vec<Track> {
    ids.iter().map(|id| track(id, secs)).collect()
}

pub fn ids(ids: &[TrackId]) -> Vec<String> {
    ids.iter().map(|id| id.to_string()).collect()
}

/// Let in-flight preparations run to completion (paused clock auto-advances)
pub async fn settle() {
    tokio::time::sleep(Duration::from_secs(1)).await;
}

/// Drain every event currently buffered
pub fn drain(rx: &mut broadcast::Receiver<CadenceEvent>) -> Vec<CadenceEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
