//! Audio seams: playable sources, prepared assets, and the output device

pub mod asset;
pub mod output;

pub use asset::{
    AssetPreparer, PrepareOptions, PreparedAsset, ResolveOptions, SourceError, SourceResolver,
    SourceUri,
};
pub use output::{AudioOutput, OutputEvent};
