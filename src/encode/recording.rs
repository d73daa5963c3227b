use std::sync::{Arc, Mutex, MutexGuard};

use super::{
    AudioEncoder, AudioEncoderConfig, EncodeSession, EncoderBackend, Muxer, TrackClock, VideoEncoder,
    VideoEncoderConfig,
};
use crate::error::{CapabilityError, EncodeError, Result};
use crate::video::Frame;

/// One submitted video frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedFrame {
    pub timestamp_micros: u64,
    pub keyframe: bool,
    /// Mean of all channel bytes, enough to tell frames apart in tests
    pub mean_luma: u8,
}

/// One submitted audio chunk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedAudio {
    pub timestamp_micros: u64,
    pub sample_count: usize,
}

/// Everything a [`RecordingBackend`] session saw
#[derive(Debug, Clone, Default)]
pub struct Recording {
    pub video_config: Option<VideoEncoderConfig>,
    pub audio_config: Option<AudioEncoderConfig>,
    pub frames: Vec<RecordedFrame>,
    pub audio: Vec<RecordedAudio>,
    pub video_flushed: bool,
    pub audio_flushed: bool,
    pub video_closed: bool,
    pub audio_closed: bool,
    pub finalized: bool,
    pub discarded: bool,
}

impl Recording {
    pub fn total_audio_samples(&self) -> usize {
        self.audio.iter().map(|a| a.sample_count).sum()
    }

    /// Short textual description used as the container payload
    pub fn summary(&self) -> String {
        let keyframes = self.frames.iter().filter(|f| f.keyframe).count();
        let last = self.frames.last().map_or(0, |f| f.timestamp_micros);
        format!(
            "frames={} keyframes={} last_frame_us={} audio_chunks={} audio_samples={}\n",
            self.frames.len(),
            keyframes,
            last,
            self.audio.len(),
            self.total_audio_samples()
        )
    }
}

/// In-memory backend: validates ordering and frame sizes like a real encoder
/// and records every submission in a shared [`Recording`]
#[derive(Debug, Clone)]
pub struct RecordingBackend {
    recording: Arc<Mutex<Recording>>,
    available: bool,
    fail_after_frames: Option<usize>,
}

impl Default for RecordingBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self {
            recording: Arc::new(Mutex::new(Recording::default())),
            available: true,
            fail_after_frames: None,
        }
    }

    /// A backend whose probe reports no usable encoder
    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::new()
        }
    }

    /// A backend whose video encoder fails on frame number `frames`
    pub fn failing_after(frames: usize) -> Self {
        Self {
            fail_after_frames: Some(frames),
            ..Self::new()
        }
    }

    /// Copy of what has been recorded so far
    pub fn snapshot(&self) -> Recording {
        lock(&self.recording).map(|r| r.clone()).unwrap_or_default()
    }
}

fn lock(recording: &Mutex<Recording>) -> std::result::Result<MutexGuard<'_, Recording>, EncodeError> {
    recording.lock().map_err(|_| EncodeError::VideoFailed {
        reason: "recording lock poisoned".to_string(),
    })
}

impl EncoderBackend for RecordingBackend {
    fn name(&self) -> &str {
        "recording"
    }

    fn probe(&self, video: &VideoEncoderConfig) -> Result<String> {
        if !self.available {
            return Err(CapabilityError::NoHardwareEncoder {
                tried: "recording".to_string(),
            }
            .into());
        }
        Ok(video.encoder.clone().unwrap_or_else(|| "recording".to_string()))
    }

    fn open(&self, video: &VideoEncoderConfig, audio: &AudioEncoderConfig) -> Result<EncodeSession> {
        {
            let mut recording = lock(&self.recording)?;
            *recording = Recording {
                video_config: Some(video.clone()),
                audio_config: Some(audio.clone()),
                ..Recording::default()
            };
        }

        Ok(EncodeSession::new(
            Box::new(RecordingVideoEncoder {
                recording: Arc::clone(&self.recording),
                size: (video.width, video.height),
                clock: TrackClock::default(),
                fail_after_frames: self.fail_after_frames,
                flushed: false,
            }),
            Box::new(RecordingAudioEncoder {
                recording: Arc::clone(&self.recording),
                clock: TrackClock::default(),
                flushed: false,
            }),
            Box::new(RecordingMuxer {
                recording: Arc::clone(&self.recording),
            }),
        ))
    }
}

struct RecordingVideoEncoder {
    recording: Arc<Mutex<Recording>>,
    size: (u32, u32),
    clock: TrackClock,
    fail_after_frames: Option<usize>,
    flushed: bool,
}

impl VideoEncoder for RecordingVideoEncoder {
    fn encode(&mut self, frame: &Frame, timestamp_micros: u64, keyframe: bool) -> Result<()> {
        if self.flushed {
            return Err(EncodeError::Closed.into());
        }
        let got = (frame.width(), frame.height());
        if got != self.size {
            return Err(EncodeError::FrameSize {
                got,
                expected: self.size,
            }
            .into());
        }
        self.clock.advance("video", timestamp_micros)?;

        let mut recording = lock(&self.recording)?;
        if self.fail_after_frames == Some(recording.frames.len()) {
            return Err(EncodeError::VideoFailed {
                reason: format!("injected failure at frame {}", recording.frames.len()),
            }
            .into());
        }

        let bytes = frame.as_rgb_bytes();
        let sum: u64 = bytes.iter().map(|&b| u64::from(b)).sum();
        recording.frames.push(RecordedFrame {
            timestamp_micros,
            keyframe,
            mean_luma: (sum / bytes.len().max(1) as u64) as u8,
        });
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.flushed = true;
        lock(&self.recording)?.video_flushed = true;
        Ok(())
    }

    fn close(&mut self) {
        if let Ok(mut recording) = lock(&self.recording) {
            recording.video_closed = true;
        }
    }
}

struct RecordingAudioEncoder {
    recording: Arc<Mutex<Recording>>,
    clock: TrackClock,
    flushed: bool,
}

impl AudioEncoder for RecordingAudioEncoder {
    fn encode(&mut self, samples: &[f32], timestamp_micros: u64) -> Result<()> {
        if self.flushed {
            return Err(EncodeError::Closed.into());
        }
        self.clock.advance("audio", timestamp_micros)?;
        lock(&self.recording)?.audio.push(RecordedAudio {
            timestamp_micros,
            sample_count: samples.len(),
        });
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.flushed = true;
        lock(&self.recording)?.audio_flushed = true;
        Ok(())
    }

    fn close(&mut self) {
        if let Ok(mut recording) = lock(&self.recording) {
            recording.audio_closed = true;
        }
    }
}

struct RecordingMuxer {
    recording: Arc<Mutex<Recording>>,
}

impl Muxer for RecordingMuxer {
    fn finalize(&mut self) -> Result<Vec<u8>> {
        let mut recording = lock(&self.recording)?;
        if !recording.video_flushed || !recording.audio_flushed {
            return Err(EncodeError::MuxFailed {
                reason: "tracks must be flushed before finalising".to_string(),
            }
            .into());
        }
        recording.finalized = true;
        Ok(recording.summary().into_bytes())
    }

    fn discard(&mut self) {
        if let Ok(mut recording) = lock(&self.recording) {
            recording.discarded = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CompositorError;

    fn open(backend: &RecordingBackend) -> EncodeSession {
        let video = VideoEncoderConfig {
            width: 4,
            height: 4,
            fps: 30,
            bitrate: 1_000_000,
            keyframe_interval: 60,
            encoder: None,
        };
        let audio = AudioEncoderConfig {
            sample_rate: 48_000,
            channels: 1,
            bitrate: 128_000,
        };
        backend.open(&video, &audio).unwrap()
    }

    #[test]
    fn test_records_submissions_in_order() {
        let backend = RecordingBackend::new();
        let mut session = open(&backend);
        let frame = Frame::new_filled(4, 4, [30, 30, 30]);

        session.audio.encode(&[0.0; 480], 0).unwrap();
        session.video.encode(&frame, 0, true).unwrap();
        session.video.encode(&frame, 33_333, false).unwrap();
        let data = session.finish().unwrap();

        let recording = backend.snapshot();
        assert_eq!(recording.frames.len(), 2);
        assert!(recording.frames[0].keyframe && !recording.frames[1].keyframe);
        assert_eq!(recording.frames[1].mean_luma, 30);
        assert_eq!(recording.total_audio_samples(), 480);
        assert!(recording.finalized && !recording.discarded);
        assert!(String::from_utf8(data).unwrap().starts_with("frames=2 keyframes=1"));
    }

    #[test]
    fn test_rejects_out_of_order_frames() {
        let backend = RecordingBackend::new();
        let mut session = open(&backend);
        let frame = Frame::new_black(4, 4);

        session.video.encode(&frame, 66_666, false).unwrap();
        let result = session.video.encode(&frame, 33_333, false);
        assert!(matches!(
            result,
            Err(CompositorError::Encode(EncodeError::OutOfOrder { track: "video", .. }))
        ));
    }

    #[test]
    fn test_rejects_wrong_frame_size() {
        let backend = RecordingBackend::new();
        let mut session = open(&backend);

        let result = session.video.encode(&Frame::new_black(2, 2), 0, true);
        assert!(matches!(result, Err(CompositorError::Encode(EncodeError::FrameSize { .. }))));
    }

    #[test]
    fn test_unavailable_probe() {
        let backend = RecordingBackend::unavailable();
        let video = VideoEncoderConfig::from(&crate::config::VideoConfig::default());
        assert!(matches!(backend.probe(&video), Err(CompositorError::Capability(_))));
    }
}
