//! Prepared-Asset Cache
//!
//! Bounded map from track identity to a prepared asset (or the in-flight task
//! producing it), evicted by a keep-set computed around the playhead.
//!
//! The cache is owned by the engine core and mutated only under the core lock.
//! Preparation runs on its own task and publishes its outcome through a
//! `watch` channel held by the cache entry, so waiting never happens under the
//! lock. Eviction aborts in-flight tasks immediately and hands back a
//! [`PendingCancellation`] the caller awaits once the lock is released.

use crate::audio::{PrepareOptions, PreparedAsset};
use crate::error::{Error, Result};
use crate::playback::preparation::AssetPreparationService;
use cadence_common::{Track, TrackId};
use futures::future::join_all;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Preparation outcome published by the preparation task
#[derive(Clone)]
enum SlotState {
    Preparing,
    Ready(Arc<dyn PreparedAsset>),
    Failed(String),
}

struct CacheEntry {
    task: JoinHandle<()>,
    slot: watch::Receiver<SlotState>,
}

impl CacheEntry {
    /// Failed, or the task ended without publishing (panicked)
    fn is_dead(&self) -> bool {
        match &*self.slot.borrow() {
            SlotState::Failed(_) => true,
            SlotState::Preparing => self.task.is_finished(),
            SlotState::Ready(_) => false,
        }
    }
}

/// Handle on one track's preparation, shared by every caller of `ensure`
#[derive(Clone)]
pub struct AssetTicket {
    track_id: TrackId,
    slot: watch::Receiver<SlotState>,
}

impl AssetTicket {
    /// Asset if preparation already succeeded
    pub fn ready(&self) -> Option<Arc<dyn PreparedAsset>> {
        match &*self.slot.borrow() {
            SlotState::Ready(asset) => Some(Arc::clone(asset)),
            _ => None,
        }
    }

    /// Wait for the preparation outcome
    ///
    /// Returns `PreparationCancelled` if the entry is evicted first.
    pub async fn wait(mut self) -> Result<Arc<dyn PreparedAsset>> {
        let state = match self
            .slot
            .wait_for(|s| !matches!(s, SlotState::Preparing))
            .await
        {
            Ok(state) => state.clone(),
            // Sender dropped without an outcome: task aborted
            Err(_) => SlotState::Preparing,
        };

        match state {
            SlotState::Ready(asset) => Ok(asset),
            SlotState::Failed(reason) => Err(Error::PreparationFailed {
                track_id: self.track_id,
                reason,
            }),
            SlotState::Preparing => Err(Error::PreparationCancelled(self.track_id)),
        }
    }
}

/// Aborted preparation tasks that must be awaited to complete an eviction
#[must_use = "evicted preparations must be awaited"]
#[derive(Default)]
pub struct PendingCancellation {
    tasks: Vec<(TrackId, JoinHandle<()>)>,
}

impl PendingCancellation {
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Wait until every aborted task has been torn down
    ///
    /// Returns how many tasks were actually cancelled (as opposed to having
    /// finished on their own in the meantime).
    pub async fn wait(self) -> usize {
        if self.tasks.is_empty() {
            return 0;
        }

        let (ids, handles): (Vec<_>, Vec<_>) = self.tasks.into_iter().unzip();
        let results = join_all(handles).await;

        let mut cancelled = 0;
        for (id, result) in ids.iter().zip(results) {
            match result {
                Err(e) if e.is_cancelled() => cancelled += 1,
                Err(e) => warn!("Preparation task for {} ended abnormally: {}", id, e),
                Ok(()) => {}
            }
        }
        debug!("Cancelled {} preparation task(s)", cancelled);
        cancelled
    }

    /// Await on a background task when the caller cannot suspend
    pub fn detach(self, runtime: &Handle) {
        if !self.is_empty() {
            runtime.spawn(async move {
                self.wait().await;
            });
        }
    }
}

pub struct PreparedAssetCache {
    entries: HashMap<TrackId, CacheEntry>,
    runtime: Handle,
}

impl PreparedAssetCache {
    /// Create an empty cache spawning preparation tasks on `runtime`
    pub fn new(runtime: Handle) -> Self {
        Self {
            entries: HashMap::new(),
            runtime,
        }
    }

    /// Return the existing preparation for `track` or start one
    ///
    /// Idempotent: a track already ready or in flight is never prepared twice.
    /// A failed entry is discarded and retried.
    pub fn ensure(
        &mut self,
        track: &Track,
        options: PrepareOptions,
        service: &AssetPreparationService,
    ) -> AssetTicket {
        if let Some(entry) = self.entries.get(&track.id) {
            if !entry.is_dead() {
                return AssetTicket {
                    track_id: track.id.clone(),
                    slot: entry.slot.clone(),
                };
            }
            debug!("Retrying preparation for {}", track.id);
            self.entries.remove(&track.id);
        }

        let (tx, rx) = watch::channel(SlotState::Preparing);
        let service = service.clone();
        let task_track = track.clone();

        let task = self.runtime.spawn(async move {
            let outcome = match service.prepare(&task_track, options).await {
                Ok(asset) => SlotState::Ready(asset),
                Err(e) => {
                    warn!("Preparation of {} failed: {}", task_track.id, e);
                    SlotState::Failed(match e {
                        Error::PreparationFailed { reason, .. } => reason,
                        other => other.to_string(),
                    })
                }
            };
            // No receivers left means the entry was evicted meanwhile
            let _ = tx.send(outcome);
        });

        debug!("Started preparation for {}", track.id);

        self.entries.insert(
            track.id.clone(),
            CacheEntry {
                task,
                slot: rx.clone(),
            },
        );

        AssetTicket {
            track_id: track.id.clone(),
            slot: rx,
        }
    }

    /// Prepared asset for `track_id`, if ready
    pub fn get_ready(&self, track_id: &TrackId) -> Option<Arc<dyn PreparedAsset>> {
        self.entries.get(track_id).and_then(|entry| match &*entry.slot.borrow() {
            SlotState::Ready(asset) => Some(Arc::clone(asset)),
            _ => None,
        })
    }

    pub fn contains(&self, track_id: &TrackId) -> bool {
        self.entries.contains_key(track_id)
    }

    pub fn is_preparing(&self, track_id: &TrackId) -> bool {
        self.entries
            .get(track_id)
            .map(|entry| matches!(&*entry.slot.borrow(), SlotState::Preparing) && !entry.task.is_finished())
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Cached identities, sorted for stable output
    pub fn track_ids(&self) -> Vec<TrackId> {
        let mut ids: Vec<TrackId> = self.entries.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Evict and release every entry not in `keep`
    ///
    /// Idempotent: a second prune with the same keep-set evicts nothing.
    pub fn prune(&mut self, keep: &HashSet<TrackId>) -> PendingCancellation {
        let evicted: Vec<TrackId> = self
            .entries
            .keys()
            .filter(|id| !keep.contains(*id))
            .cloned()
            .collect();

        if !evicted.is_empty() {
            debug!("Pruning {} cached asset(s), keeping {}", evicted.len(), keep.len());
        }
        self.evict(evicted)
    }

    /// Cancel every in-flight preparation and release every prepared asset
    pub fn cancel_all(&mut self) -> PendingCancellation {
        let all: Vec<TrackId> = self.entries.keys().cloned().collect();
        self.evict(all)
    }

    fn evict(&mut self, ids: Vec<TrackId>) -> PendingCancellation {
        let mut pending = PendingCancellation::default();
        for id in ids {
            if let Some(entry) = self.entries.remove(&id) {
                if !entry.task.is_finished() {
                    entry.task.abort();
                    pending.tasks.push((id, entry.task));
                }
                // Dropping the receiver releases the asset once no output holds it
            }
        }
        pending
    }
}

impl Drop for PreparedAssetCache {
    fn drop(&mut self) {
        for entry in self.entries.values() {
            entry.task.abort();
        }
    }
}
