//! # Composition
//!
//! Drives an export: every scene's audio is resampled and encoded, then its
//! frames are painted (image transition plus subtitle overlay) and handed to
//! the encoder with timestamps on one continuous timeline.

pub mod composer;
pub mod pipeline;
pub mod progress;

pub use composer::{SceneFrameComposer, SceneRenderContext};
pub use pipeline::{frame_count, ExportOptions, RenderPipeline};
pub use progress::{CancelToken, NoProgress, ProgressSink, ProgressTracker};
