//! Playback engine
//!
//! **Module Structure:**
//! - `core.rs`: Construction, shared state, loading and lookahead planning
//! - `playback.rs`: Transport operations and output event handling
//! - `queue.rs`: Queue replacement, edits, shuffle/repeat, network changes
//! - `diagnostics.rs`: Status accessors

mod core;
mod diagnostics;
mod playback;
mod queue;

pub use core::{EngineDeps, PlaybackEngine, QueueOptions};
