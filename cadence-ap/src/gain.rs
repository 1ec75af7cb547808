//! Loudness normalization gain calculation
//!
//! Maps a track's ReplayGain metadata, the user's normalization settings and
//! the playback context to a linear volume multiplier. Pure and deterministic:
//! re-evaluated on every track change and every settings or context change,
//! never cached.

use cadence_common::LoudnessInfo;
use serde::{Deserialize, Serialize};

/// Upper bound on the applied multiplier (~ +12 dB)
pub const MAX_MULTIPLIER: f64 = 4.0;

/// Normalization mode selected by the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NormalizationMode {
    #[default]
    Off,
    /// Track gain while shuffling, album gain in album context
    Smart,
    TrackGain,
    AlbumGain,
}

/// User normalization settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizationSettings {
    pub mode: NormalizationMode,
    /// Added to the selected base gain (dB)
    pub preamp_db: f64,
    /// Cap the multiplier at `1/peak` when a peak value is known
    pub prevent_clipping: bool,
}

impl Default for NormalizationSettings {
    fn default() -> Self {
        Self {
            mode: NormalizationMode::Off,
            preamp_db: 0.0,
            prevent_clipping: true,
        }
    }
}

/// What the queue is being played as
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PlaybackContext {
    pub is_shuffle: bool,
    pub is_album_playback: bool,
}

/// Which stored value the gain came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GainSource {
    None,
    Track,
    Album,
}

/// Result of a gain calculation
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GainDecision {
    pub multiplier: f64,
    pub source: GainSource,
}

impl GainDecision {
    pub const UNITY: GainDecision = GainDecision {
        multiplier: 1.0,
        source: GainSource::None,
    };

    /// Multiplier in the output's sample format
    pub fn as_volume(&self) -> f32 {
        self.multiplier as f32
    }
}

/// Compute the linear multiplier for one track
pub fn compute_gain(
    loudness: &LoudnessInfo,
    settings: &NormalizationSettings,
    context: PlaybackContext,
) -> GainDecision {
    if settings.mode == NormalizationMode::Off || !loudness.has_gain() {
        return GainDecision::UNITY;
    }

    let prefer_album = match settings.mode {
        NormalizationMode::Off => return GainDecision::UNITY,
        // Shuffle wins over album context: a shuffled album is no longer an album
        NormalizationMode::Smart => !context.is_shuffle && context.is_album_playback,
        NormalizationMode::TrackGain => false,
        NormalizationMode::AlbumGain => true,
    };

    let (base_db, source) = match (prefer_album, loudness.track_gain, loudness.album_gain) {
        (true, _, Some(album)) => (album, GainSource::Album),
        (true, Some(track), None) => (track, GainSource::Track),
        (false, Some(track), _) => (track, GainSource::Track),
        (false, None, Some(album)) => (album, GainSource::Album),
        (_, None, None) => return GainDecision::UNITY,
    };

    let db = base_db + settings.preamp_db;
    if !db.is_finite() {
        return GainDecision::UNITY;
    }

    let mut linear = 10f64.powf(db / 20.0);

    if settings.prevent_clipping {
        let peak = match source {
            GainSource::Track => loudness.track_peak,
            GainSource::Album => loudness.album_peak,
            GainSource::None => None,
        };
        if let Some(peak) = peak.filter(|p| p.is_finite() && *p > 0.0) {
            linear = linear.min(1.0 / peak);
        }
    }

    GainDecision {
        multiplier: linear.clamp(0.0, MAX_MULTIPLIER),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(mode: NormalizationMode) -> NormalizationSettings {
        NormalizationSettings {
            mode,
            preamp_db: 0.0,
            prevent_clipping: false,
        }
    }

    fn both_gains() -> LoudnessInfo {
        LoudnessInfo {
            track_gain: Some(-6.0),
            album_gain: Some(-3.0),
            track_peak: Some(0.5),
            album_peak: Some(0.8),
        }
    }

    const SHUFFLE: PlaybackContext = PlaybackContext {
        is_shuffle: true,
        is_album_playback: false,
    };
    const ALBUM: PlaybackContext = PlaybackContext {
        is_shuffle: false,
        is_album_playback: true,
    };

    #[test]
    fn test_off_mode_is_unity() {
        let decision = compute_gain(&both_gains(), &settings(NormalizationMode::Off), ALBUM);
        assert_eq!(decision, GainDecision::UNITY);
    }

    #[test]
    fn test_missing_metadata_is_unity() {
        for mode in [
            NormalizationMode::Smart,
            NormalizationMode::TrackGain,
            NormalizationMode::AlbumGain,
        ] {
            let decision = compute_gain(&LoudnessInfo::default(), &settings(mode), SHUFFLE);
            assert_eq!(decision.multiplier, 1.0);
            assert_eq!(decision.source, GainSource::None);
        }
    }

    #[test]
    fn test_smart_picks_by_context() {
        let s = settings(NormalizationMode::Smart);

        let shuffled = compute_gain(&both_gains(), &s, SHUFFLE);
        assert_eq!(shuffled.source, GainSource::Track);

        let album = compute_gain(&both_gains(), &s, ALBUM);
        assert_eq!(album.source, GainSource::Album);
        assert!((album.multiplier - 10f64.powf(-3.0 / 20.0)).abs() < 1e-12);

        let shuffled_album = compute_gain(
            &both_gains(),
            &s,
            PlaybackContext {
                is_shuffle: true,
                is_album_playback: true,
            },
        );
        assert_eq!(shuffled_album.source, GainSource::Track);
    }

    #[test]
    fn test_fallback_to_other_value() {
        let track_only = LoudnessInfo {
            track_gain: Some(-4.0),
            ..Default::default()
        };
        let d = compute_gain(&track_only, &settings(NormalizationMode::AlbumGain), ALBUM);
        assert_eq!(d.source, GainSource::Track);

        let album_only = LoudnessInfo {
            album_gain: Some(-2.0),
            ..Default::default()
        };
        let d = compute_gain(&album_only, &settings(NormalizationMode::TrackGain), SHUFFLE);
        assert_eq!(d.source, GainSource::Album);

        let d = compute_gain(&album_only, &settings(NormalizationMode::Smart), SHUFFLE);
        assert_eq!(d.source, GainSource::Album);
    }

    #[test]
    fn test_preamp_is_added() {
        let loudness = LoudnessInfo {
            track_gain: Some(-6.0),
            ..Default::default()
        };
        let s = NormalizationSettings {
            mode: NormalizationMode::TrackGain,
            preamp_db: 6.0,
            prevent_clipping: false,
        };
        let d = compute_gain(&loudness, &s, PlaybackContext::default());
        assert!((d.multiplier - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_clip_protection_caps_at_inverse_peak() {
        let loudness = LoudnessInfo {
            track_gain: Some(6.0),
            track_peak: Some(0.9),
            ..Default::default()
        };
        let mut s = settings(NormalizationMode::TrackGain);

        let naive = compute_gain(&loudness, &s, PlaybackContext::default());
        assert!((naive.multiplier - 1.9953).abs() < 1e-3);

        s.prevent_clipping = true;
        let capped = compute_gain(&loudness, &s, PlaybackContext::default());
        assert!(capped.multiplier <= 1.0 / 0.9 + 1e-12);
        assert!((capped.multiplier - 1.0 / 0.9).abs() < 1e-12);
    }

    #[test]
    fn test_clip_protection_uses_matching_peak() {
        // Album-sourced gain must only look at album peak
        let loudness = LoudnessInfo {
            album_gain: Some(6.0),
            track_peak: Some(0.5),
            ..Default::default()
        };
        let s = NormalizationSettings {
            mode: NormalizationMode::AlbumGain,
            preamp_db: 0.0,
            prevent_clipping: true,
        };
        let d = compute_gain(&loudness, &s, ALBUM);
        assert!((d.multiplier - 10f64.powf(6.0 / 20.0)).abs() < 1e-12);
    }

    #[test]
    fn test_result_is_clamped() {
        let loud = LoudnessInfo {
            track_gain: Some(30.0),
            ..Default::default()
        };
        let d = compute_gain(&loud, &settings(NormalizationMode::TrackGain), SHUFFLE);
        assert_eq!(d.multiplier, MAX_MULTIPLIER);

        let nan_preamp = NormalizationSettings {
            mode: NormalizationMode::TrackGain,
            preamp_db: f64::NAN,
            prevent_clipping: true,
        };
        assert_eq!(compute_gain(&loud, &nan_preamp, SHUFFLE), GainDecision::UNITY);
    }

    #[test]
    fn test_identical_inputs_identical_output() {
        let s = NormalizationSettings {
            mode: NormalizationMode::Smart,
            preamp_db: 1.5,
            prevent_clipping: true,
        };
        let a = compute_gain(&both_gains(), &s, ALBUM);
        let b = compute_gain(&both_gains(), &s, ALBUM);
        assert_eq!(a.multiplier.to_bits(), b.multiplier.to_bits());
        assert_eq!(a.source, b.source);
    }
}
