//! # Video Module
//!
//! The output raster surface and decoding of scene images.

pub mod loader;
pub mod types;

pub use loader::ImageLoader;
pub use types::{Frame, ImageSource};
