use std::io::Cursor;
use std::path::Path;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, warn};

use crate::audio::types::{duration_of, AudioData, AudioFormat};
use crate::error::{AssetError, Result};

/// Speech audio loader for WAV (hound) and compressed formats (symphonia)
pub struct AudioLoader;

impl AudioLoader {
    /// Load an audio file and return decoded PCM
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<AudioData> {
        let path = path.as_ref().to_path_buf();
        let extension = Self::detect_format(&path).unwrap_or_default();

        if !Self::is_format_supported(&extension) {
            return Err(AssetError::UnsupportedFormat { format: extension }.into());
        }

        let bytes = tokio::fs::read(&path).await.map_err(|_| AssetError::AudioLoadFailed {
            path: path.display().to_string(),
        })?;

        let label = path.display().to_string();
        let mut audio = tokio::task::spawn_blocking(move || {
            Self::decode_bytes(bytes, &extension, &label)
        })
        .await
        .map_err(|e| AssetError::InvalidAudio { details: e.to_string() })??;

        audio.file_path = Some(path);
        Ok(audio)
    }

    /// Decode an in-memory encoded audio file, e.g. a synthesised speech payload.
    ///
    /// `extension` is used as a format hint (`"wav"`, `"mp3"`, ...).
    pub fn decode_bytes(bytes: Vec<u8>, extension: &str, label: &str) -> Result<AudioData> {
        let audio = if extension.eq_ignore_ascii_case("wav") {
            Self::decode_wav(&bytes, label)?
        } else {
            Self::decode_with_symphonia(Box::new(Cursor::new(bytes)), extension, label)?
        };

        debug!(
            "Decoded {}: {:.2}s, {} Hz, {} channel(s)",
            label, audio.duration, audio.sample_rate, audio.channels
        );
        Ok(audio)
    }

    /// WAV files go through hound, which handles every PCM layout TTS services emit
    fn decode_wav(bytes: &[u8], label: &str) -> Result<AudioData> {
        let load_failed = || AssetError::AudioLoadFailed { path: label.to_string() };

        let reader = hound::WavReader::new(Cursor::new(bytes)).map_err(|_| load_failed())?;
        let spec = reader.spec();

        let samples: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Float => reader
                .into_samples::<f32>()
                .collect::<std::result::Result<_, _>>()
                .map_err(|_| load_failed())?,
            hound::SampleFormat::Int => reader
                .into_samples::<i32>()
                .map(|sample| sample.map(|s| Self::int_to_float(s, spec.bits_per_sample)))
                .collect::<std::result::Result<_, _>>()
                .map_err(|_| load_failed())?,
        };

        Ok(AudioData {
            duration: duration_of(samples.len(), spec.sample_rate, spec.channels),
            samples,
            sample_rate: spec.sample_rate,
            channels: spec.channels,
            file_path: None,
            format: AudioFormat {
                extension: "wav".to_string(),
                bit_depth: Some(spec.bits_per_sample),
                compression: None,
            },
        })
    }

    fn decode_with_symphonia(
        source: Box<dyn MediaSource>,
        extension: &str,
        label: &str,
    ) -> Result<AudioData> {
        let load_failed = || AssetError::AudioLoadFailed { path: label.to_string() };

        let mss = MediaSourceStream::new(source, Default::default());
        let mut hint = Hint::new();
        if !extension.is_empty() {
            hint.with_extension(extension);
        }

        let probed = symphonia::default::get_probe()
            .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
            .map_err(|_| load_failed())?;
        let mut format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(load_failed)?;
        let track_id = track.id;
        let params = track.codec_params.clone();

        let sample_rate = params.sample_rate.ok_or_else(|| AssetError::InvalidAudio {
            details: format!("{label}: no sample rate"),
        })?;
        let channels = params
            .channels
            .map(|c| c.count() as u16)
            .ok_or_else(|| AssetError::InvalidAudio {
                details: format!("{label}: no channel layout"),
            })?;

        let mut decoder = symphonia::default::get_codecs()
            .make(&params, &DecoderOptions::default())
            .map_err(|_| load_failed())?;

        let mut samples = Vec::new();
        let mut scratch: Option<SampleBuffer<f32>> = None;

        loop {
            let packet = match format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::ResetRequired) => {
                    decoder.reset();
                    continue;
                }
                Err(e) if is_end_of_stream(&e) => break,
                Err(e) => {
                    return Err(AssetError::InvalidAudio {
                        details: format!("{label}: {e}"),
                    }
                    .into())
                }
            };

            if packet.track_id() != track_id {
                continue;
            }

            match decoder.decode(&packet) {
                Ok(decoded) => {
                    let spec = *decoded.spec();
                    let frames = decoded.capacity();
                    let needed = frames * spec.channels.count();
                    if scratch.as_ref().map_or(true, |buf| buf.capacity() < needed) {
                        scratch = Some(SampleBuffer::new(frames as u64, spec));
                    }
                    if let Some(buffer) = scratch.as_mut() {
                        buffer.copy_interleaved_ref(decoded);
                        samples.extend_from_slice(buffer.samples());
                    }
                }
                Err(SymphoniaError::DecodeError(reason)) => {
                    warn!("Skipping corrupt packet in {}: {}", label, reason);
                }
                Err(e) if is_end_of_stream(&e) => break,
                Err(e) => {
                    return Err(AssetError::InvalidAudio {
                        details: format!("{label}: {e}"),
                    }
                    .into())
                }
            }
        }

        Ok(AudioData {
            duration: duration_of(samples.len(), sample_rate, channels),
            samples,
            sample_rate,
            channels,
            file_path: None,
            format: AudioFormat {
                extension: extension.to_string(),
                bit_depth: params.bits_per_sample.map(|b| b as u16),
                compression: Some(format!("{:?}", params.codec)),
            },
        })
    }

    /// Convert integer sample to float (-1.0 to 1.0)
    fn int_to_float(sample: i32, bit_depth: u16) -> f32 {
        match bit_depth {
            // hound already re-centres unsigned 8-bit samples
            8 => sample as f32 / 128.0,
            16 => sample as f32 / 32768.0,
            24 => sample as f32 / 8388608.0,
            32 => sample as f32 / 2147483648.0,
            _ => sample as f32 / 32768.0,
        }
    }

    /// Detect audio format from file extension
    pub fn detect_format<P: AsRef<Path>>(path: P) -> Option<String> {
        path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_lowercase())
    }

    /// Check if a file format is supported
    pub fn is_format_supported(extension: &str) -> bool {
        matches!(
            extension.to_lowercase().as_str(),
            "wav" | "mp3" | "flac" | "ogg" | "m4a" | "aac"
        )
    }
}

/// Symphonia reports the end of a stream as an unexpected EOF
fn is_end_of_stream(err: &SymphoniaError) -> bool {
    matches!(err, SymphoniaError::IoError(e) if e.kind() == std::io::ErrorKind::UnexpectedEof)
}
