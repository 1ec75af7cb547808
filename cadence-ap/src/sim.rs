//! Simulated collaborators
//!
//! In-process stand-ins for the resolver, preparer, output device and network
//! observer. The demo binary runs the engine against them; they render no
//! audio but honour the same event contract as a real output.

use crate::audio::{
    AssetPreparer, AudioOutput, OutputEvent, PrepareOptions, PreparedAsset, ResolveOptions,
    SourceError, SourceResolver, SourceUri,
};
use crate::network::{NetworkCondition, NetworkObserver};
use async_trait::async_trait;
use cadence_common::{Track, TrackId};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

#[derive(Debug)]
pub struct SimulatedAsset {
    track_id: TrackId,
    duration: Duration,
}

impl SimulatedAsset {
    pub fn new(track_id: TrackId, duration: Duration) -> Self {
        Self { track_id, duration }
    }
}

impl PreparedAsset for SimulatedAsset {
    fn track_id(&self) -> &TrackId {
        &self.track_id
    }

    fn duration(&self) -> Duration {
        self.duration
    }

    fn is_playable(&self) -> bool {
        true
    }
}

/// Resolves every track except the ones marked unavailable
#[derive(Debug, Default)]
pub struct SimulatedResolver {
    unavailable: HashSet<TrackId>,
}

impl SimulatedResolver {
    pub fn new(unavailable: impl IntoIterator<Item = TrackId>) -> Self {
        Self {
            unavailable: unavailable.into_iter().collect(),
        }
    }
}

#[async_trait]
impl SourceResolver for SimulatedResolver {
    async fn resolve_source(
        &self,
        track: &Track,
        options: &ResolveOptions,
    ) -> Result<SourceUri, SourceError> {
        if self.unavailable.contains(&track.id) {
            return Err(SourceError::Unavailable(format!("{} not found on server", track.id)));
        }
        let mut uri = format!("sim://stream/{}", track.id);
        if let Some(kbps) = options.max_bitrate_kbps {
            uri.push_str(&format!("?maxBitRate={}", kbps));
        }
        Ok(SourceUri::new(uri))
    }
}

/// Prepares after a fixed latency, scaled up for larger buffers
#[derive(Debug, Clone)]
pub struct SimulatedPreparer {
    latency: Duration,
}

impl SimulatedPreparer {
    pub fn new(latency: Duration) -> Self {
        Self { latency }
    }
}

#[async_trait]
impl AssetPreparer for SimulatedPreparer {
    async fn prepare(
        &self,
        track: &Track,
        uri: &SourceUri,
        options: &PrepareOptions,
    ) -> Result<Arc<dyn PreparedAsset>, SourceError> {
        let buffered = options.buffer_duration.as_secs_f64() / 15.0;
        let latency = self.latency.mul_f64(buffered.max(0.2));
        trace!("Preparing {} from {} ({:?})", track.id, uri, latency);
        tokio::time::sleep(latency).await;
        Ok(Arc::new(SimulatedAsset::new(track.id.clone(), track.duration)))
    }
}

/// Network observer whose condition can be changed at runtime
#[derive(Debug)]
pub struct SimulatedNetwork {
    condition: Mutex<NetworkCondition>,
}

impl SimulatedNetwork {
    pub fn new(condition: NetworkCondition) -> Self {
        Self {
            condition: Mutex::new(condition),
        }
    }

    pub fn set(&self, condition: NetworkCondition) {
        *self.condition.lock() = condition;
    }
}

impl NetworkObserver for SimulatedNetwork {
    fn snapshot(&self) -> NetworkCondition {
        *self.condition.lock()
    }
}

#[derive(Default)]
struct OutputSlots {
    active: Option<Arc<dyn PreparedAsset>>,
    next: Option<(usize, Arc<dyn PreparedAsset>)>,
    position: Duration,
    playing: bool,
}

/// Output device driven by a clock instead of an audio callback
///
/// Each tick advances the playhead by `tick * speed` while playing, emits
/// `Progress`, and at the end of the asset either moves onto the
/// pre-attached asset (`AdvancedTo`) or stops (`Finished`).
pub struct SimulatedOutput {
    slots: Mutex<OutputSlots>,
}

impl SimulatedOutput {
    /// Create the output and spawn its clock
    pub fn spawn(
        tick: Duration,
        speed: f64,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<OutputEvent>, JoinHandle<()>) {
        let output = Arc::new(Self {
            slots: Mutex::new(OutputSlots::default()),
        });
        let (tx, rx) = mpsc::unbounded_channel();

        let clock = Arc::clone(&output);
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(tick);
            let step = tick.mul_f64(speed);
            loop {
                interval.tick().await;
                for event in clock.advance(step) {
                    if tx.send(event).is_err() {
                        return;
                    }
                }
            }
        });

        (output, rx, handle)
    }

    /// Move the playhead and collect the resulting events
    fn advance(&self, step: Duration) -> Vec<OutputEvent> {
        let mut slots = self.slots.lock();
        let Some(active) = slots.active.clone() else {
            return Vec::new();
        };
        if !slots.playing {
            return Vec::new();
        }

        let duration = active.duration();
        slots.position = (slots.position + step).min(duration);
        let mut events = vec![OutputEvent::Progress {
            track_id: active.track_id().clone(),
            position: slots.position,
            duration,
        }];

        if slots.position >= duration {
            match slots.next.take() {
                Some((index, next)) => {
                    events.push(OutputEvent::AdvancedTo {
                        finished: active.track_id().clone(),
                        index,
                        track_id: next.track_id().clone(),
                    });
                    slots.active = Some(next);
                    slots.position = Duration::ZERO;
                }
                None => {
                    slots.playing = false;
                    events.push(OutputEvent::Finished {
                        track_id: active.track_id().clone(),
                    });
                }
            }
        }
        events
    }
}

impl AudioOutput for SimulatedOutput {
    fn attach(&self, asset: Arc<dyn PreparedAsset>) {
        let mut slots = self.slots.lock();
        debug!("Output: attach {}", asset.track_id());
        slots.active = Some(asset);
        slots.position = Duration::ZERO;
        slots.playing = false;
    }

    fn attach_next(&self, index: usize, asset: Arc<dyn PreparedAsset>) {
        debug!("Output: attach_next {} at {}", asset.track_id(), index);
        self.slots.lock().next = Some((index, asset));
    }

    fn clear_next(&self) {
        self.slots.lock().next = None;
    }

    fn play(&self) {
        self.slots.lock().playing = true;
    }

    fn pause(&self) {
        self.slots.lock().playing = false;
    }

    fn stop(&self) {
        let mut slots = self.slots.lock();
        slots.active = None;
        slots.next = None;
        slots.position = Duration::ZERO;
        slots.playing = false;
    }

    fn seek(&self, position: Duration) {
        self.slots.lock().position = position;
    }

    fn set_volume(&self, volume: f32) {
        debug!("Output: volume x{:.3}", volume);
    }

    fn active_device(&self) -> Option<String> {
        Some("simulated".to_string())
    }
}
