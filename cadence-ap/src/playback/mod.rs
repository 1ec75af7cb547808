//! Playback engine, queue and prepared-asset management

pub mod asset_cache;
pub mod engine;
pub mod preparation;
pub mod queue;

pub use asset_cache::{AssetTicket, PendingCancellation, PreparedAssetCache};
pub use engine::{EngineDeps, PlaybackEngine, QueueOptions};
pub use preparation::AssetPreparationService;
pub use queue::{PlayQueue, PreviousAction};
