//! # Cadence Audio Player Library (cadence-ap)
//!
//! Playback queue and adaptive preloading engine for remote tracks.
//!
//! **Purpose:** Turn an ordered list of remote tracks into gapless,
//! stall-resistant playback: resolve and prepare assets ahead of the playhead,
//! size the lookahead window from network conditions, apply loudness
//! normalization, and hand off between tracks without a reload when possible.
//!
//! **Architecture:** A single [`PlaybackEngine`] owns the queue and a bounded
//! cache of prepared assets. Resolution, preparation, rendering, network
//! observation and now-playing reporting are external collaborators behind
//! the traits in [`audio`], [`network`] and [`session`].

pub mod audio;
pub mod buffering;
pub mod config;
pub mod error;
pub mod gain;
pub mod network;
pub mod playback;
pub mod session;
pub mod sim;
pub mod state;

pub use error::{Error, Result};
pub use playback::{EngineDeps, PlaybackEngine, QueueOptions};
pub use state::EngineStatus;
