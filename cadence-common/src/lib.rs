//! # Cadence Common Library
//!
//! Shared code for the Cadence playback crates:
//! - Track model and loudness metadata
//! - Event types (CadenceEvent enum) and the EventBus
//! - Configuration file resolution
//! - Timestamp helpers

pub mod config;
pub mod error;
pub mod events;
pub mod time;
pub mod track;

pub use error::{Error, Result};
pub use track::{LoudnessInfo, Track, TrackId};
