//! cadence-ap configuration
//!
//! Loaded from TOML via `cadence_common::config`. Every field has a compiled
//! default; out-of-range values are clamped with a warning rather than
//! rejected.

use crate::audio::ResolveOptions;
use crate::gain::NormalizationSettings;
use cadence_common::config::{load_or_default, ConfigSource, LoggingConfig};
use serde::Deserialize;
use std::time::Duration;
use tracing::warn;

/// Scheduler tunables
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Normalized progress that triggers the lookahead ensure (latched per track)
    pub preload_threshold: f64,

    /// Normalized progress that pre-attaches the next asset (latched per track)
    pub handoff_threshold: f64,

    /// "Previous" restarts the current track past this much elapsed time
    pub restart_threshold_ms: u64,

    /// Minimum spacing of progress notifications to the session reporter
    pub progress_interval_ms: u64,

    /// Start playing once the first track of a new queue is loaded
    pub auto_play: bool,

    /// Broadcast buffer for observer events
    pub event_capacity: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            preload_threshold: 0.70,
            handoff_threshold: 0.90,
            restart_threshold_ms: 3000,
            progress_interval_ms: 1000,
            auto_play: true,
            event_capacity: 256,
        }
    }
}

impl SchedulerConfig {
    pub fn restart_threshold(&self) -> Duration {
        Duration::from_millis(self.restart_threshold_ms)
    }

    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms)
    }
}

/// Complete engine configuration
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub scheduler: SchedulerConfig,
    pub normalization: NormalizationSettings,
    /// Forwarded opaquely to the source resolver
    pub streaming: ResolveOptions,
    pub logging: LoggingConfig,
}

impl EngineConfig {
    /// Load from the resolved source and clamp invalid values
    pub fn load(source: &ConfigSource) -> crate::Result<Self> {
        let config: EngineConfig = load_or_default(source)?;
        Ok(config.validated())
    }

    /// Clamp out-of-range values to usable ones
    pub fn validated(mut self) -> Self {
        let defaults = SchedulerConfig::default();
        let s = &mut self.scheduler;

        if !(s.preload_threshold.is_finite() && s.preload_threshold > 0.0 && s.preload_threshold < 1.0) {
            warn!(
                "Invalid preload_threshold {}, using default {}",
                s.preload_threshold, defaults.preload_threshold
            );
            s.preload_threshold = defaults.preload_threshold;
        }

        if !(s.handoff_threshold.is_finite() && s.handoff_threshold > 0.0 && s.handoff_threshold < 1.0) {
            warn!(
                "Invalid handoff_threshold {}, using default {}",
                s.handoff_threshold, defaults.handoff_threshold
            );
            s.handoff_threshold = defaults.handoff_threshold;
        }

        if s.handoff_threshold < s.preload_threshold {
            warn!(
                "handoff_threshold {} below preload_threshold {}, raising it",
                s.handoff_threshold, s.preload_threshold
            );
            s.handoff_threshold = s.preload_threshold;
        }

        if s.event_capacity == 0 {
            warn!("event_capacity must be positive, using {}", defaults.event_capacity);
            s.event_capacity = defaults.event_capacity;
        }

        let n = &mut self.normalization;
        if !n.preamp_db.is_finite() || n.preamp_db.abs() > 24.0 {
            let clamped = if n.preamp_db.is_finite() {
                n.preamp_db.clamp(-24.0, 24.0)
            } else {
                0.0
            };
            warn!("preamp_db {} out of range, using {}", n.preamp_db, clamped);
            n.preamp_db = clamped;
        }

        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gain::NormalizationMode;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.scheduler.preload_threshold, 0.70);
        assert_eq!(config.scheduler.handoff_threshold, 0.90);
        assert_eq!(config.scheduler.restart_threshold(), Duration::from_secs(3));
        assert_eq!(config.scheduler.progress_interval(), Duration::from_secs(1));
        assert_eq!(config.normalization.mode, NormalizationMode::Off);
        assert_eq!(config.streaming.max_bitrate_kbps, None);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: EngineConfig = toml::from_str(
            r#"
            [scheduler]
            auto_play = false

            [normalization]
            mode = "album_gain"
            preamp_db = -2.0

            [streaming]
            max_bitrate_kbps = 192
            "#,
        )
        .unwrap();

        assert!(!config.scheduler.auto_play);
        assert_eq!(config.scheduler.preload_threshold, 0.70);
        assert_eq!(config.normalization.mode, NormalizationMode::AlbumGain);
        assert!(config.normalization.prevent_clipping);
        assert_eq!(config.streaming.max_bitrate_kbps, Some(192));
    }

    #[test]
    fn test_validation_clamps() {
        let mut config = EngineConfig::default();
        config.scheduler.preload_threshold = 1.5;
        config.scheduler.handoff_threshold = 0.5;
        config.scheduler.event_capacity = 0;
        config.normalization.preamp_db = 40.0;

        let config = config.validated();
        assert_eq!(config.scheduler.preload_threshold, 0.70);
        assert_eq!(config.scheduler.handoff_threshold, 0.70);
        assert_eq!(config.scheduler.event_capacity, 256);
        assert_eq!(config.normalization.preamp_db, 24.0);
    }

    #[test]
    fn test_load_from_file_validates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cadence.toml");
        std::fs::write(
            &path,
            "[scheduler]\nhandoff_threshold = 0.5\n\n[logging]\nlevel = \"debug\"\n",
        )
        .unwrap();

        let config = EngineConfig::load(&ConfigSource::CommandLine(path)).unwrap();
        assert_eq!(config.scheduler.handoff_threshold, 0.70);
        assert_eq!(config.logging.level, "debug");

        let missing = dir.path().join("absent.toml");
        let config = EngineConfig::load(&ConfigSource::CommandLine(missing)).unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_load_rejects_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        std::fs::write(&path, "[scheduler\nauto_play = ").unwrap();

        assert!(EngineConfig::load(&ConfigSource::CommandLine(path)).is_err());
    }
}
