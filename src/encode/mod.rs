//! # Encoding
//!
//! The render pipeline talks to encoders through the traits in this module:
//! one [`VideoEncoder`], one [`AudioEncoder`] and one [`Muxer`], opened
//! together by an [`EncoderBackend`] as an [`EncodeSession`].
//!
//! Two backends ship with the crate:
//! - [`FfmpegBackend`] drives the system `ffmpeg` binary with a hardware
//!   H.264 encoder.
//! - [`RecordingBackend`] records every submission in memory, for tests and
//!   dry runs.

pub mod ffmpeg;
pub mod recording;

use std::path::Path;

use tracing::{debug, info, warn};

use crate::config::{AudioConfig, VideoConfig};
use crate::error::{EncodeError, Result};
use crate::video::Frame;

pub use ffmpeg::FfmpegBackend;
pub use recording::{RecordedAudio, RecordedFrame, Recording, RecordingBackend};

/// Fixed parameters of the output video track
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoEncoderConfig {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub bitrate: u32,
    pub keyframe_interval: u32,
    /// Encoder to use; resolved by [`EncoderBackend::probe`] when unset
    pub encoder: Option<String>,
}

impl From<&VideoConfig> for VideoEncoderConfig {
    fn from(config: &VideoConfig) -> Self {
        Self {
            width: config.width,
            height: config.height,
            fps: config.fps,
            bitrate: config.bitrate,
            keyframe_interval: config.keyframe_interval,
            encoder: config.encoder.clone(),
        }
    }
}

/// Fixed parameters of the output audio track
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioEncoderConfig {
    pub sample_rate: u32,
    pub channels: u16,
    pub bitrate: u32,
}

impl From<&AudioConfig> for AudioEncoderConfig {
    fn from(config: &AudioConfig) -> Self {
        Self {
            sample_rate: config.sample_rate,
            channels: config.channels,
            bitrate: config.bitrate,
        }
    }
}

/// Accepts composed frames in non-decreasing timestamp order
pub trait VideoEncoder: Send {
    fn encode(&mut self, frame: &Frame, timestamp_micros: u64, keyframe: bool) -> Result<()>;

    /// Emit everything buffered; no frames may follow
    fn flush(&mut self) -> Result<()>;

    /// Release resources without producing output
    fn close(&mut self);
}

/// Accepts mono PCM chunks in non-decreasing timestamp order
pub trait AudioEncoder: Send {
    fn encode(&mut self, samples: &[f32], timestamp_micros: u64) -> Result<()>;

    fn flush(&mut self) -> Result<()>;

    fn close(&mut self);
}

/// Combines the flushed tracks into one container
pub trait Muxer: Send {
    /// Produce the finished container bytes
    fn finalize(&mut self) -> Result<Vec<u8>>;

    /// Drop any partial output
    fn discard(&mut self);
}

/// Provides encoders for one export
pub trait EncoderBackend: Send + Sync {
    fn name(&self) -> &str;

    /// Check the environment can encode `video`, returning the encoder that
    /// will be used. Fails with a capability error otherwise.
    fn probe(&self, video: &VideoEncoderConfig) -> Result<String>;

    /// Open encoders and muxer for one export
    fn open(&self, video: &VideoEncoderConfig, audio: &AudioEncoderConfig) -> Result<EncodeSession>;
}

/// The encoders and muxer of one export.
///
/// Dropping a session that was not finished closes both encoders and
/// discards the muxer, so no partial output survives a failed export.
pub struct EncodeSession {
    pub video: Box<dyn VideoEncoder>,
    pub audio: Box<dyn AudioEncoder>,
    muxer: Box<dyn Muxer>,
    finished: bool,
}

impl EncodeSession {
    pub fn new(video: Box<dyn VideoEncoder>, audio: Box<dyn AudioEncoder>, muxer: Box<dyn Muxer>) -> Self {
        Self {
            video,
            audio,
            muxer,
            finished: false,
        }
    }

    /// Flush video, then audio, then finalise the container
    pub fn finish(mut self) -> Result<Vec<u8>> {
        debug!("Flushing video encoder");
        self.video.flush()?;
        debug!("Flushing audio encoder");
        self.audio.flush()?;

        let data = self.muxer.finalize()?;
        self.finished = true;
        info!("Container finalised ({} bytes)", data.len());
        Ok(data)
    }
}

impl Drop for EncodeSession {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        warn!("Discarding unfinished export");
        self.video.close();
        self.audio.close();
        self.muxer.discard();
    }
}

/// Timestamp ordering guard shared by the bundled encoders
#[derive(Debug, Default)]
pub(crate) struct TrackClock {
    last_micros: Option<u64>,
}

impl TrackClock {
    pub(crate) fn advance(&mut self, track: &'static str, timestamp_micros: u64) -> std::result::Result<(), EncodeError> {
        if let Some(last_micros) = self.last_micros {
            if timestamp_micros < last_micros {
                return Err(EncodeError::OutOfOrder {
                    track,
                    timestamp_micros,
                    last_micros,
                });
            }
        }
        self.last_micros = Some(timestamp_micros);
        Ok(())
    }
}

/// A finished export
#[derive(Debug, Clone)]
pub struct EncodedVideo {
    /// Container bytes
    pub data: Vec<u8>,
    /// Seconds of encoded audio
    pub duration: f64,
    pub frame_count: usize,
    pub audio_sample_count: usize,
    pub scenes_rendered: usize,
    pub scenes_skipped: usize,
}

impl EncodedVideo {
    /// Write the container bytes to `path`
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, &self.data)?;
        info!("Wrote {} bytes to {}", self.data.len(), path.display());
        Ok(())
    }
}
