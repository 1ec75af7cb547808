//! Adaptive buffering policy
//!
//! Pure derivation of the lookahead count and the per-asset buffer duration
//! from the network condition and the durations of upcoming tracks. No state
//! beyond its inputs.

use crate::network::{ConnectionClass, NetworkCondition};
use std::time::Duration;

/// Deepest lookahead the policy ever recommends
pub const MAX_LOOKAHEAD: usize = 5;

/// Buffer ahead of the playhead on an unconstrained connection
pub const FULL_BUFFER: Duration = Duration::from_secs(15);

/// Buffer ahead of the playhead on an expensive/constrained connection
pub const LIMITED_BUFFER: Duration = Duration::from_secs(6);

/// Lookahead count and buffer duration for the next preparation round
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferingPlan {
    pub lookahead: usize,
    pub buffer_duration: Duration,
}

/// Lookahead the connection alone can sustain
pub fn network_recommended(condition: &NetworkCondition) -> usize {
    if !condition.connected {
        return 0;
    }

    let base = match condition.class {
        ConnectionClass::Wifi | ConnectionClass::Wired => 5,
        // Unknown links are treated like cellular until they prove otherwise
        ConnectionClass::Cellular | ConnectionClass::Unknown => 2,
    };

    if condition.is_limited() {
        (base / 2).max(1)
    } else {
        base
    }
}

/// Lookahead suggested by the average upcoming track duration
///
/// Short tracks need deeper lookahead so prepared audio does not run out
/// between scheduling decisions.
pub fn duration_recommended(average: Duration) -> usize {
    match average.as_secs_f64() {
        s if s < 180.0 => 5,
        s if s < 300.0 => 3,
        _ => 2,
    }
}

/// Per-asset amount of media buffered before an asset counts as ready
pub fn buffer_duration(condition: &NetworkCondition) -> Duration {
    if !condition.connected {
        Duration::ZERO
    } else if condition.is_limited() {
        LIMITED_BUFFER
    } else {
        FULL_BUFFER
    }
}

/// `min(network, duration-based)`; with no upcoming tracks only the network counts
pub fn lookahead_count(condition: &NetworkCondition, upcoming: &[Duration]) -> usize {
    let network = network_recommended(condition);
    if upcoming.is_empty() {
        return network;
    }

    let total: Duration = upcoming.iter().sum();
    let average = total / upcoming.len() as u32;
    network.min(duration_recommended(average))
}

pub fn plan(condition: &NetworkCondition, upcoming: &[Duration]) -> BufferingPlan {
    BufferingPlan {
        lookahead: lookahead_count(condition, upcoming),
        buffer_duration: buffer_duration(condition),
    }
}
