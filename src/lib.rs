//! # Story-Compositor
//!
//! Assemble narrated story scenes into a single vertical video with karaoke
//! subtitles and per-scene image transitions.
//!
//! Each scene pairs one still image with one narration track. The scene's
//! audio drives its length; its word timings drive the subtitle overlay.
//! Scenes are concatenated on one timeline and handed to an
//! [`EncoderBackend`](encode::EncoderBackend).
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use story_compositor::{
//!     composition::{ExportOptions, NoProgress, RenderPipeline},
//!     config::Config,
//!     encode::FfmpegBackend,
//!     scene::Manifest,
//! };
//!
//! # #[tokio::main]
//! # async fn main() -> anyhow::Result<()> {
//! let config = Config::default();
//! let manifest = Manifest::from_file("project.toml")?;
//! let scenes = manifest
//!     .load_scenes(None, Duration::from_secs(config.pipeline.alignment_timeout_secs))
//!     .await?;
//!
//! let pipeline = RenderPipeline::new(config, Arc::new(FfmpegBackend::new()));
//! let video = pipeline
//!     .export(&scenes, ExportOptions::default(), &mut NoProgress)
//!     .await?;
//! video.save("story.mp4")?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`audio`] - Narration decoding, downmix and resampling
//! - [`timing`] - Word timings: estimation and optional alignment
//! - [`video`] - Scene images and the frame raster
//! - [`transition`] - Per-scene entrance animations
//! - [`subtitle`] - Karaoke subtitle layout and rendering
//! - [`encode`] - Encoder/muxer traits plus ffmpeg and in-memory backends
//! - [`composition`] - The export pipeline
//! - [`scene`] - Scene model and project manifests
//! - [`config`] - Configuration management

pub mod audio;
pub mod composition;
pub mod config;
pub mod encode;
pub mod error;
pub mod scene;
pub mod subtitle;
pub mod timing;
pub mod transition;
pub mod video;

// Re-export commonly used types for convenience
pub use crate::{
    composition::{CancelToken, ExportOptions, ProgressSink, RenderPipeline},
    config::Config,
    encode::{EncodedVideo, EncoderBackend, FfmpegBackend, RecordingBackend},
    error::{CompositorError, Result},
    scene::{Manifest, Scene, SceneScript},
    timing::TimedWord,
};
