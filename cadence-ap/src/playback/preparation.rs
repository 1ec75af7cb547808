//! Asset Preparation Service
//!
//! Resolves a track to a playable source and prepares it, turning collaborator
//! failures into crate errors tagged with the track identity. Cheap to clone:
//! every preparation task gets its own copy.

use crate::audio::{AssetPreparer, PrepareOptions, PreparedAsset, ResolveOptions, SourceResolver};
use crate::error::{Error, Result};
use cadence_common::Track;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

#[derive(Clone)]
pub struct AssetPreparationService {
    resolver: Arc<dyn SourceResolver>,
    preparer: Arc<dyn AssetPreparer>,
    resolve_options: ResolveOptions,
}

impl AssetPreparationService {
    pub fn new(
        resolver: Arc<dyn SourceResolver>,
        preparer: Arc<dyn AssetPreparer>,
        resolve_options: ResolveOptions,
    ) -> Self {
        Self {
            resolver,
            preparer,
            resolve_options,
        }
    }

    /// Resolve and prepare one track
    ///
    /// An asset that prepares but reports itself unplayable is a failure.
    pub async fn prepare(
        &self,
        track: &Track,
        options: PrepareOptions,
    ) -> Result<Arc<dyn PreparedAsset>> {
        let started = Instant::now();

        let uri = self
            .resolver
            .resolve_source(track, &self.resolve_options)
            .await
            .map_err(|e| Error::PreparationFailed {
                track_id: track.id.clone(),
                reason: e.to_string(),
            })?;

        debug!("Resolved {} -> {}", track.id, uri);

        let asset = self
            .preparer
            .prepare(track, &uri, &options)
            .await
            .map_err(|e| Error::PreparationFailed {
                track_id: track.id.clone(),
                reason: e.to_string(),
            })?;

        if !asset.is_playable() {
            return Err(Error::PreparationFailed {
                track_id: track.id.clone(),
                reason: "asset is not playable".to_string(),
            });
        }

        debug!(
            "Prepared {} in {}ms (duration {:.1}s, buffer {}s)",
            track.id,
            started.elapsed().as_millis(),
            asset.duration().as_secs_f64(),
            options.buffer_duration.as_secs()
        );

        Ok(asset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{SourceError, SourceUri};
    use async_trait::async_trait;
    use cadence_common::TrackId;
    use std::time::Duration;

    #[derive(Debug)]
    struct StubAsset {
        id: TrackId,
        playable: bool,
    }

    impl PreparedAsset for StubAsset {
        fn track_id(&self) -> &TrackId {
            &self.id
        }
        fn duration(&self) -> Duration {
            Duration::from_secs(200)
        }
        fn is_playable(&self) -> bool {
            self.playable
        }
    }

    struct StubResolver {
        fail: bool,
    }

    #[async_trait]
    impl SourceResolver for StubResolver {
        async fn resolve_source(
            &self,
            track: &Track,
            options: &ResolveOptions,
        ) -> std::result::Result<SourceUri, SourceError> {
            if self.fail {
                return Err(SourceError::Unavailable("offline".to_string()));
            }
            Ok(SourceUri::new(format!(
                "stream://{}?maxBitRate={}",
                track.id,
                options.max_bitrate_kbps.unwrap_or(0)
            )))
        }
    }

    struct StubPreparer {
        playable: bool,
    }

    #[async_trait]
    impl AssetPreparer for StubPreparer {
        async fn prepare(
            &self,
            track: &Track,
            uri: &SourceUri,
            _options: &PrepareOptions,
        ) -> std::result::Result<Arc<dyn PreparedAsset>, SourceError> {
            assert!(uri.as_str().contains("maxBitRate=320"));
            Ok(Arc::new(StubAsset {
                id: track.id.clone(),
                playable: self.playable,
            }))
        }
    }

    fn service(resolver_fails: bool, playable: bool) -> AssetPreparationService {
        AssetPreparationService::new(
            Arc::new(StubResolver {
                fail: resolver_fails,
            }),
            Arc::new(StubPreparer { playable }),
            ResolveOptions {
                max_bitrate_kbps: Some(320),
                format: None,
            },
        )
    }

    fn options() -> PrepareOptions {
        PrepareOptions {
            buffer_duration: Duration::from_secs(15),
        }
    }

    #[tokio::test]
    async fn test_prepare_success_forwards_options() {
        let track = Track::new("t1", "One", Duration::from_secs(200));
        let asset = service(false, true).prepare(&track, options()).await.unwrap();
        assert_eq!(asset.track_id(), &track.id);
    }

    #[tokio::test]
    async fn test_resolution_failure_is_tagged() {
        let track = Track::new("t1", "One", Duration::from_secs(200));
        match service(true, true).prepare(&track, options()).await {
            Err(Error::PreparationFailed { track_id, reason }) => {
                assert_eq!(track_id, track.id);
                assert!(reason.contains("offline"));
            }
            other => panic!("Expected PreparationFailed, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn test_unplayable_asset_is_rejected() {
        let track = Track::new("t1", "One", Duration::from_secs(200));
        let result = service(false, false).prepare(&track, options()).await;
        assert!(matches!(result, Err(Error::PreparationFailed { .. })));
    }
}
