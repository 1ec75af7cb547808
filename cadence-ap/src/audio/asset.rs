//! Playable sources and prepared assets
//!
//! Resolution ("which URI plays this track") and preparation ("open and probe
//! that URI") are external capabilities. The engine consumes them through the
//! [`SourceResolver`] and [`AssetPreparer`] traits and never inspects a
//! [`PreparedAsset`] beyond its duration and playability.

use async_trait::async_trait;
use cadence_common::{Track, TrackId};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Resolved, playable location of a track
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceUri(String);

impl SourceUri {
    pub fn new(uri: impl Into<String>) -> Self {
        Self(uri.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Transcoding preferences forwarded opaquely to the resolver
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Deserialize)]
#[serde(default)]
pub struct ResolveOptions {
    pub max_bitrate_kbps: Option<u32>,
    pub format: Option<String>,
}

/// Parameters for one preparation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrepareOptions {
    /// Media to buffer ahead of the playhead before the asset counts as ready
    pub buffer_duration: Duration,
}

/// Failures reported by the external source collaborators
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    #[error("source unavailable: {0}")]
    Unavailable(String),

    #[error("preparation failed: {0}")]
    PreparationFailed(String),
}

/// Opened, probed, ready-to-render media handle
///
/// Resources are released when the last `Arc` is dropped. The prepared-asset
/// cache holds the owning reference; the output borrows a clone while the
/// asset is active or pre-attached.
pub trait PreparedAsset: Send + Sync + fmt::Debug {
    fn track_id(&self) -> &TrackId;

    fn duration(&self) -> Duration;

    fn is_playable(&self) -> bool;
}

/// Maps a track to a playable source
#[async_trait]
pub trait SourceResolver: Send + Sync {
    async fn resolve_source(
        &self,
        track: &Track,
        options: &ResolveOptions,
    ) -> Result<SourceUri, SourceError>;
}

/// Opens and probes a resolved source
///
/// Implementations own their timeout policy; the engine only reacts to
/// success, failure, or cancellation (the future being dropped).
#[async_trait]
pub trait AssetPreparer: Send + Sync {
    async fn prepare(
        &self,
        track: &Track,
        uri: &SourceUri,
        options: &PrepareOptions,
    ) -> Result<Arc<dyn PreparedAsset>, SourceError>;
}
