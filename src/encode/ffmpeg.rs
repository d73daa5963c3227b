use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::thread::JoinHandle;

use tempfile::TempDir;
use tracing::{debug, info, warn};

use super::{
    AudioEncoder, AudioEncoderConfig, EncodeSession, EncoderBackend, Muxer, TrackClock, VideoEncoder,
    VideoEncoderConfig,
};
use crate::error::{CapabilityError, EncodeError, Result};
use crate::video::Frame;

/// Hardware H.264 encoders, in the order they are tried
pub const HARDWARE_ENCODERS: &[&str] = &[
    "h264_videotoolbox",
    "h264_nvenc",
    "h264_qsv",
    "h264_vaapi",
    "h264_amf",
];

const VAAPI_DEVICE: &str = "/dev/dri/renderD128";

/// Drives the system `ffmpeg` binary.
///
/// Frames are streamed as raw RGB24 into an ffmpeg child that writes a
/// video-only intermediate; audio is collected and written as WAV; the muxer
/// combines both into an MP4 with AAC audio. Intermediates live in a temporary
/// directory removed with the session.
#[derive(Debug, Clone)]
pub struct FfmpegBackend {
    program: PathBuf,
}

impl Default for FfmpegBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl FfmpegBackend {
    pub fn new() -> Self {
        Self::with_program("ffmpeg")
    }

    /// Use a specific ffmpeg executable
    pub fn with_program<P: Into<PathBuf>>(program: P) -> Self {
        Self { program: program.into() }
    }

    /// Check whether ffmpeg can be executed
    pub fn check_ffmpeg_available(&self) -> bool {
        Command::new(&self.program)
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }

    /// Names of all encoders this ffmpeg build lists
    fn list_encoders(&self) -> Result<Vec<String>> {
        let output = Command::new(&self.program)
            .args(["-hide_banner", "-encoders"])
            .output()
            .map_err(|e| CapabilityError::EncoderListFailed { reason: e.to_string() })?;

        if !output.status.success() {
            return Err(CapabilityError::EncoderListFailed {
                reason: format!(
                    "exited with {}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            }
            .into());
        }
        Ok(parse_encoder_list(&String::from_utf8_lossy(&output.stdout)))
    }

    /// Encode a short synthetic clip to check the encoder works on this
    /// machine, not just that it was compiled in
    fn encoder_works(&self, encoder: &str) -> bool {
        let mut cmd = Command::new(&self.program);
        cmd.args(["-hide_banner", "-loglevel", "error"]);
        if encoder == "h264_vaapi" {
            cmd.args(["-vaapi_device", VAAPI_DEVICE]);
        }
        cmd.args(["-f", "lavfi", "-i", "color=c=black:s=256x256:d=0.1"]);
        if encoder == "h264_vaapi" {
            cmd.args(["-vf", "format=nv12,hwupload"]);
        }
        cmd.args(["-c:v", encoder, "-frames:v", "1", "-f", "null", "-"])
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        let ok = cmd.status().map(|s| s.success()).unwrap_or(false);
        debug!("Encoder {} {}", encoder, if ok { "works" } else { "failed the test encode" });
        ok
    }
}

/// Extract encoder names from `ffmpeg -encoders` output. Entries follow a
/// `------` separator as `<flags> <name> <description>`.
fn parse_encoder_list(listing: &str) -> Vec<String> {
    listing
        .lines()
        .skip_while(|line| !line.trim_start().starts_with("---"))
        .skip(1)
        .filter_map(|line| line.split_whitespace().nth(1))
        .map(str::to_string)
        .collect()
}

impl EncoderBackend for FfmpegBackend {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    fn probe(&self, video: &VideoEncoderConfig) -> Result<String> {
        if !self.check_ffmpeg_available() {
            return Err(CapabilityError::FfmpegNotFound.into());
        }
        let available = self.list_encoders()?;
        let listed = |name: &str| available.iter().any(|e| e == name);

        if let Some(name) = &video.encoder {
            if listed(name.as_str()) && self.encoder_works(name) {
                info!("Using configured encoder {}", name);
                return Ok(name.clone());
            }
            return Err(CapabilityError::EncoderUnavailable { name: name.clone() }.into());
        }

        for candidate in HARDWARE_ENCODERS {
            if listed(*candidate) && self.encoder_works(candidate) {
                info!("Using hardware encoder {}", candidate);
                return Ok(candidate.to_string());
            }
        }

        Err(CapabilityError::NoHardwareEncoder {
            tried: HARDWARE_ENCODERS.join(", "),
        }
        .into())
    }

    fn open(&self, video: &VideoEncoderConfig, audio: &AudioEncoderConfig) -> Result<EncodeSession> {
        let encoder = video.encoder.clone().ok_or_else(|| EncodeError::StartFailed {
            reason: "no video encoder selected; probe the backend first".to_string(),
        })?;
        if audio.channels != 1 {
            return Err(EncodeError::StartFailed {
                reason: format!("only mono audio is supported, got {} channels", audio.channels),
            }
            .into());
        }

        let scratch = tempfile::Builder::new().prefix("story-compositor-").tempdir()?;
        let video_path = scratch.path().join("video.mp4");
        let audio_path = scratch.path().join("narration.wav");
        let output_path = scratch.path().join("output.mp4");
        debug!("Encoding intermediates in {}", scratch.path().display());

        let video_encoder = FfmpegVideoEncoder::spawn(&self.program, video, &encoder, &video_path)?;
        let audio_encoder = WavAudioEncoder {
            path: audio_path.clone(),
            sample_rate: audio.sample_rate,
            samples: Vec::new(),
            clock: TrackClock::default(),
            flushed: false,
        };
        let muxer = FfmpegMuxer {
            program: self.program.clone(),
            video_path,
            audio_path,
            output_path,
            audio_bitrate: audio.bitrate,
            sample_rate: audio.sample_rate,
            scratch: Some(scratch),
        };

        Ok(EncodeSession::new(Box::new(video_encoder), Box::new(audio_encoder), Box::new(muxer)))
    }
}

/// Streams RGB24 frames to an ffmpeg child at a constant frame rate
struct FfmpegVideoEncoder {
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    /// Collects the child's stderr so a chatty encoder never blocks on it
    stderr_drain: Option<JoinHandle<io::Result<Vec<u8>>>>,
    size: (u32, u32),
    fps: u64,
    clock: TrackClock,
    /// Latest frame and its constant-rate slot, not yet written. A later
    /// frame landing on the same slot replaces it.
    pending: Option<(u64, Vec<u8>)>,
    slots_written: u64,
}

impl FfmpegVideoEncoder {
    fn spawn(program: &Path, config: &VideoEncoderConfig, encoder: &str, output: &Path) -> Result<Self> {
        let mut cmd = Command::new(program);
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .args(["-y", "-hide_banner", "-loglevel", "error"]);

        if encoder == "h264_vaapi" {
            cmd.args(["-vaapi_device", VAAPI_DEVICE]);
        }

        cmd.args([
            "-f",
            "rawvideo",
            "-pix_fmt",
            "rgb24",
            "-s",
            &format!("{}x{}", config.width, config.height),
            "-r",
            &config.fps.to_string(),
            "-i",
            "pipe:0",
            "-an",
        ]);

        if encoder == "h264_vaapi" {
            cmd.args(["-vf", "format=nv12,hwupload"]);
        } else {
            cmd.args(["-pix_fmt", "yuv420p"]);
        }

        // Raw frames carry no keyframe flags, so the cadence is set as the GOP
        cmd.args([
            "-c:v",
            encoder,
            "-b:v",
            &config.bitrate.to_string(),
            "-g",
            &config.keyframe_interval.to_string(),
        ])
        .arg(output);

        debug!("Spawning video encoder: {:?}", cmd);
        let mut child = cmd.spawn().map_err(|e| EncodeError::StartFailed {
            reason: format!("failed to spawn ffmpeg: {e}"),
        })?;
        let stdin = child.stdin.take().ok_or_else(|| EncodeError::StartFailed {
            reason: "ffmpeg stdin unavailable".to_string(),
        })?;
        let mut stderr = child.stderr.take().ok_or_else(|| EncodeError::StartFailed {
            reason: "ffmpeg stderr unavailable".to_string(),
        })?;
        let stderr_drain = std::thread::spawn(move || -> io::Result<Vec<u8>> {
            let mut bytes = Vec::new();
            stderr.read_to_end(&mut bytes)?;
            Ok(bytes)
        });

        Ok(Self {
            child: Some(child),
            stdin: Some(stdin),
            stderr_drain: Some(stderr_drain),
            size: (config.width, config.height),
            fps: u64::from(config.fps),
            clock: TrackClock::default(),
            pending: None,
            slots_written: 0,
        })
    }

    fn write(&mut self, bytes: &[u8]) -> Result<()> {
        let stdin = self.stdin.as_mut().ok_or(EncodeError::Closed)?;
        if let Err(e) = stdin.write_all(bytes) {
            // The child has gone away; its stderr says why
            self.close();
            let stderr = self.take_stderr();
            return Err(EncodeError::VideoFailed {
                reason: format!("ffmpeg stopped accepting frames ({e}): {stderr}"),
            }
            .into());
        }
        self.slots_written += 1;
        Ok(())
    }

    /// Everything the child wrote to stderr, once it has exited
    fn take_stderr(&mut self) -> String {
        match self.stderr_drain.take().map(JoinHandle::join) {
            Some(Ok(Ok(bytes))) => String::from_utf8_lossy(&bytes).trim().to_string(),
            Some(Ok(Err(e))) => format!("<failed to read ffmpeg stderr: {e}>"),
            Some(Err(_)) => "<ffmpeg stderr reader panicked>".to_string(),
            None => String::new(),
        }
    }
}

impl VideoEncoder for FfmpegVideoEncoder {
    fn encode(&mut self, frame: &Frame, timestamp_micros: u64, _keyframe: bool) -> Result<()> {
        let got = (frame.width(), frame.height());
        if got != self.size {
            return Err(EncodeError::FrameSize {
                got,
                expected: self.size,
            }
            .into());
        }
        self.clock.advance("video", timestamp_micros)?;

        // Map the timestamp onto the constant-rate output grid
        let slot = (timestamp_micros * self.fps + 500_000) / 1_000_000;
        let bytes = frame.as_rgb_bytes();

        match self.pending.take() {
            Some((pending_slot, mut buffer)) if slot <= pending_slot => {
                debug!("Frame at {}us replaces the pending frame of slot {}", timestamp_micros, pending_slot);
                buffer.clear();
                buffer.extend_from_slice(bytes);
                self.pending = Some((pending_slot, buffer));
            }
            Some((pending_slot, mut buffer)) => {
                // Repeat the pending frame over any gap up to the new slot
                for _ in pending_slot..slot {
                    self.write(&buffer)?;
                }
                buffer.clear();
                buffer.extend_from_slice(bytes);
                self.pending = Some((slot, buffer));
            }
            None => self.pending = Some((slot, bytes.to_vec())),
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        if let Some((_, buffer)) = self.pending.take() {
            self.write(&buffer)?;
        }

        drop(self.stdin.take());
        let mut child = self.child.take().ok_or(EncodeError::Closed)?;
        let status = child.wait().map_err(|e| EncodeError::VideoFailed {
            reason: format!("failed to wait for ffmpeg: {e}"),
        })?;
        let stderr = self.take_stderr();

        if !status.success() {
            return Err(EncodeError::VideoFailed {
                reason: format!("ffmpeg exited with {status}: {stderr}"),
            }
            .into());
        }
        debug!("Video encoder wrote {} frame slots", self.slots_written);
        Ok(())
    }

    fn close(&mut self) {
        drop(self.stdin.take());
        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.kill() {
                debug!("ffmpeg video encoder already exited: {}", e);
            }
            let _ = child.wait();
        }
    }
}

/// Collects mono PCM on a timeline and writes it as 16-bit WAV
struct WavAudioEncoder {
    path: PathBuf,
    sample_rate: u32,
    samples: Vec<f32>,
    clock: TrackClock,
    flushed: bool,
}

impl AudioEncoder for WavAudioEncoder {
    fn encode(&mut self, samples: &[f32], timestamp_micros: u64) -> Result<()> {
        if self.flushed {
            return Err(EncodeError::Closed.into());
        }
        self.clock.advance("audio", timestamp_micros)?;

        // Gaps between chunks become silence
        let offset = (u128::from(timestamp_micros) * u128::from(self.sample_rate) + 500_000) / 1_000_000;
        let offset = offset as usize;
        if offset > self.samples.len() {
            self.samples.resize(offset, 0.0);
        }
        self.samples.extend_from_slice(samples);
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        if self.flushed {
            return Ok(());
        }
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let failed = |e: hound::Error| EncodeError::AudioFailed { reason: e.to_string() };

        let mut writer = hound::WavWriter::create(&self.path, spec).map_err(failed)?;
        for &sample in &self.samples {
            let value = (sample.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16;
            writer.write_sample(value).map_err(failed)?;
        }
        writer.finalize().map_err(failed)?;

        self.flushed = true;
        debug!("Wrote {} audio samples to {}", self.samples.len(), self.path.display());
        Ok(())
    }

    fn close(&mut self) {
        self.samples.clear();
    }
}

/// Combines the intermediates into the final MP4
struct FfmpegMuxer {
    program: PathBuf,
    video_path: PathBuf,
    audio_path: PathBuf,
    output_path: PathBuf,
    audio_bitrate: u32,
    sample_rate: u32,
    scratch: Option<TempDir>,
}

impl Muxer for FfmpegMuxer {
    fn finalize(&mut self) -> Result<Vec<u8>> {
        if self.scratch.is_none() {
            return Err(EncodeError::Closed.into());
        }

        let output = Command::new(&self.program)
            .args(["-y", "-hide_banner", "-loglevel", "error", "-i"])
            .arg(&self.video_path)
            .arg("-i")
            .arg(&self.audio_path)
            .args([
                "-map",
                "0:v:0",
                "-map",
                "1:a:0",
                "-c:v",
                "copy",
                "-c:a",
                "aac",
                "-b:a",
                &self.audio_bitrate.to_string(),
                "-ar",
                &self.sample_rate.to_string(),
                "-ac",
                "1",
                "-movflags",
                "+faststart",
            ])
            .arg(&self.output_path)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| EncodeError::MuxFailed {
                reason: format!("failed to run ffmpeg: {e}"),
            })?;

        if !output.status.success() {
            return Err(EncodeError::MuxFailed {
                reason: format!(
                    "ffmpeg exited with {}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            }
            .into());
        }

        let data = std::fs::read(&self.output_path)?;
        self.scratch = None;
        Ok(data)
    }

    fn discard(&mut self) {
        if let Some(scratch) = self.scratch.take() {
            debug!("Removing encode intermediates in {}", scratch.path().display());
            if let Err(e) = scratch.close() {
                warn!("Failed to remove encode intermediates: {}", e);
            }
        }
    }
}
