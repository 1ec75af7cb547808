//! Network condition snapshot consumed by the adaptive buffering policy
//!
//! The platform-specific observer lives outside this crate; the engine only
//! asks it for a synchronous snapshot whenever it sizes the lookahead window.

use serde::{Deserialize, Serialize};

/// Connection class as reported by the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionClass {
    Wifi,
    Cellular,
    Wired,
    #[default]
    Unknown,
}

/// Point-in-time network condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkCondition {
    pub connected: bool,
    /// Metered connection (e.g. cellular data plan, personal hotspot)
    pub expensive: bool,
    /// Low-data mode or otherwise constrained path
    pub constrained: bool,
    pub class: ConnectionClass,
}

impl NetworkCondition {
    pub const OFFLINE: NetworkCondition = NetworkCondition {
        connected: false,
        expensive: false,
        constrained: false,
        class: ConnectionClass::Unknown,
    };

    pub fn wifi() -> Self {
        Self {
            connected: true,
            expensive: false,
            constrained: false,
            class: ConnectionClass::Wifi,
        }
    }

    pub fn cellular() -> Self {
        Self {
            connected: true,
            expensive: true,
            constrained: false,
            class: ConnectionClass::Cellular,
        }
    }

    pub fn with_constrained(mut self, constrained: bool) -> Self {
        self.constrained = constrained;
        self
    }

    pub fn with_expensive(mut self, expensive: bool) -> Self {
        self.expensive = expensive;
        self
    }

    /// Expensive or constrained: both shrink lookahead and buffers
    pub fn is_limited(&self) -> bool {
        self.expensive || self.constrained
    }
}

impl Default for NetworkCondition {
    fn default() -> Self {
        Self::wifi()
    }
}

/// Source of network condition snapshots
pub trait NetworkObserver: Send + Sync {
    fn snapshot(&self) -> NetworkCondition;
}
