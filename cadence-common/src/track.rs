//! Track model shared between the engine and its callers
//!
//! Tracks are owned by the calling layer. The playback engine only reads them,
//! except for replacing a queue entry when a rating changes locally.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Stable identity of a remote track (server-assigned, opaque)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackId(String);

impl TrackId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TrackId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for TrackId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// ReplayGain loudness values as stored by the server
///
/// Gains are in dB, peaks are linear amplitude (1.0 = full scale).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LoudnessInfo {
    #[serde(default)]
    pub track_gain: Option<f64>,
    #[serde(default)]
    pub album_gain: Option<f64>,
    #[serde(default)]
    pub track_peak: Option<f64>,
    #[serde(default)]
    pub album_peak: Option<f64>,
}

impl LoudnessInfo {
    /// True if at least one gain value is present
    pub fn has_gain(&self) -> bool {
        self.track_gain.is_some() || self.album_gain.is_some()
    }
}

/// A playable remote track
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub id: TrackId,

    pub title: String,

    #[serde(default)]
    pub artist: Option<String>,

    #[serde(default)]
    pub album: Option<String>,

    /// Album identity, used to tell album playback from mixed queues
    #[serde(default)]
    pub album_id: Option<String>,

    /// Duration as reported by the server metadata
    #[serde(with = "duration_secs")]
    pub duration: Duration,

    #[serde(default)]
    pub loudness: LoudnessInfo,

    /// User rating (0-5), reflected locally by `update_current_track_rating`
    #[serde(default)]
    pub rating: Option<u8>,

    /// Server-side suffix/content hint passed to the source resolver
    #[serde(default)]
    pub suffix: Option<String>,
}

impl Track {
    /// Minimal track with no loudness metadata
    pub fn new(id: impl Into<TrackId>, title: impl Into<String>, duration: Duration) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            artist: None,
            album: None,
            album_id: None,
            duration,
            loudness: LoudnessInfo::default(),
            rating: None,
            suffix: None,
        }
    }

    pub fn with_album(mut self, album_id: impl Into<String>) -> Self {
        self.album_id = Some(album_id.into());
        self
    }

    pub fn with_loudness(mut self, loudness: LoudnessInfo) -> Self {
        self.loudness = loudness;
        self
    }
}

/// Durations travel as fractional seconds in TOML/JSON
mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        if !secs.is_finite() || secs < 0.0 {
            return Err(serde::de::Error::custom(format!("invalid duration: {}", secs)));
        }
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_track_id_display() {
        let id = TrackId::new("tr-42");
        assert_eq!(id.to_string(), "tr-42");
        assert_eq!(id.as_str(), "tr-42");
    }

    #[test]
    fn test_loudness_has_gain() {
        assert!(!LoudnessInfo::default().has_gain());

        let album_only = LoudnessInfo {
            album_gain: Some(-3.0),
            ..Default::default()
        };
        assert!(album_only.has_gain());

        let peaks_only = LoudnessInfo {
            track_peak: Some(0.9),
            album_peak: Some(0.95),
            ..Default::default()
        };
        assert!(!peaks_only.has_gain(), "Peaks alone are not gain metadata");
    }

    #[test]
    fn test_track_deserializes_from_toml() {
        let track: Track = toml::from_str(
            r#"
            id = "abc"
            title = "Song"
            duration = 184.5
            album_id = "al-1"

            [loudness]
            track_gain = -6.5
            track_peak = 0.98
            "#,
        )
        .unwrap();

        assert_eq!(track.id, TrackId::new("abc"));
        assert_eq!(track.duration, Duration::from_millis(184_500));
        assert_eq!(track.loudness.track_gain, Some(-6.5));
        assert_eq!(track.loudness.album_gain, None);
        assert_eq!(track.album_id.as_deref(), Some("al-1"));
    }

    #[test]
    fn test_negative_duration_rejected() {
        let result: std::result::Result<Track, _> =
            toml::from_str("id = \"x\"\ntitle = \"t\"\nduration = -1.0\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_overflowing_duration_rejected() {
        let result: std::result::Result<Track, _> =
            serde_json::from_str(r#"{"id":"x","title":"t","duration":1e30}"#);
        assert!(result.is_err());

        let result: std::result::Result<Track, _> =
            toml::from_str("id = \"x\"\ntitle = \"t\"\nduration = 1e30\n");
        assert!(result.is_err());
    }
}
