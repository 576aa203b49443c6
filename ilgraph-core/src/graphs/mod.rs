//! Concrete graphs

pub mod playback;

pub use playback::{PipelineSpec, PipelineStage, PlaybackGraph};
