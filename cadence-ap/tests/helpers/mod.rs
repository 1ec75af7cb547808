//! Test helper modules for cadence-ap integration tests
//!
//! - fakes: collaborator fakes with controllable latency and failure
//! - harness: TestEngine wiring the fakes to a PlaybackEngine

#![allow(dead_code, unused_imports)]

pub mod fakes;
pub mod harness;

pub use fakes::{OutputCall, ReporterCall};
pub use harness::{drain, ids, settle, track, tracks, TestEngine};
