//! # Audio Module
//!
//! Loading of per-scene speech audio and conversion to the encoder's sample
//! rate.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use story_compositor::audio::{AudioLoader, AudioResampler};
//!
//! # #[tokio::main]
//! # async fn main() -> anyhow::Result<()> {
//! let speech = AudioLoader::load("scene_0.wav").await?;
//! let speech = AudioResampler::new().resample(speech, 48_000)?;
//! println!("{:.2}s at {} Hz", speech.duration, speech.sample_rate);
//! # Ok(())
//! # }
//! ```

pub mod loader;
pub mod resampler;
pub mod types;

pub use loader::AudioLoader;
pub use resampler::AudioResampler;
pub use types::{AudioData, AudioFormat};
