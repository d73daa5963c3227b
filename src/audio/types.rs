use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Decoded PCM audio with metadata
#[derive(Debug, Clone)]
pub struct AudioData {
    /// Audio samples (interleaved for stereo, mono for single channel)
    pub samples: Vec<f32>,

    /// Sample rate in Hz
    pub sample_rate: u32,

    /// Number of channels (1 = mono, 2 = stereo)
    pub channels: u16,

    /// Duration in seconds
    pub duration: f64,

    /// Original file path, if the audio came from disk
    pub file_path: Option<PathBuf>,

    /// Audio format information
    pub format: AudioFormat,
}

impl AudioData {
    /// Wrap raw interleaved PCM produced in memory (e.g. by a speech synthesiser)
    pub fn from_samples(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Self {
        let duration = duration_of(samples.len(), sample_rate, channels);
        Self {
            samples,
            sample_rate,
            channels,
            duration,
            file_path: None,
            format: AudioFormat::pcm(),
        }
    }

    /// Number of sample frames (samples per channel)
    pub fn frame_count(&self) -> usize {
        if self.channels == 0 {
            return 0;
        }
        self.samples.len() / self.channels as usize
    }

    /// Duration in whole microseconds
    pub fn duration_micros(&self) -> u64 {
        if self.sample_rate == 0 {
            return 0;
        }
        (self.frame_count() as u64 * 1_000_000 + u64::from(self.sample_rate) / 2)
            / u64::from(self.sample_rate)
    }

    /// Get samples for a specific channel (0-based)
    pub fn channel_samples(&self, channel: usize) -> Vec<f32> {
        if self.channels == 1 || channel >= self.channels as usize {
            return self.samples.clone();
        }

        self.samples
            .iter()
            .skip(channel)
            .step_by(self.channels as usize)
            .copied()
            .collect()
    }

    /// Get mono mix of all channels
    pub fn mono_samples(&self) -> Vec<f32> {
        if self.channels <= 1 {
            return self.samples.clone();
        }

        let mut mono = Vec::with_capacity(self.samples.len() / self.channels as usize);

        for chunk in self.samples.chunks(self.channels as usize) {
            let sum: f32 = chunk.iter().sum();
            mono.push(sum / self.channels as f32);
        }

        mono
    }

    /// Downmix to a single channel, keeping rate and duration
    pub fn into_mono(self) -> Self {
        if self.channels == 1 {
            return self;
        }
        let samples = self.mono_samples();
        Self {
            duration: duration_of(samples.len(), self.sample_rate, 1),
            samples,
            channels: 1,
            ..self
        }
    }
}

pub(crate) fn duration_of(sample_count: usize, sample_rate: u32, channels: u16) -> f64 {
    if sample_rate == 0 || channels == 0 {
        return 0.0;
    }
    sample_count as f64 / (sample_rate as f64 * channels as f64)
}

/// Audio file format information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioFormat {
    /// File extension (wav, mp3, flac, etc.)
    pub extension: String,

    /// Bit depth (16, 24, 32, etc.)
    pub bit_depth: Option<u16>,

    /// Compression type (if any)
    pub compression: Option<String>,
}

impl AudioFormat {
    /// Raw 32-bit float PCM
    pub fn pcm() -> Self {
        Self {
            extension: "pcm".to_string(),
            bit_depth: Some(32),
            compression: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration_from_samples() {
        let audio = AudioData::from_samples(vec![0.0; 48_000], 24_000, 2);
        assert_eq!(audio.frame_count(), 24_000);
        assert!((audio.duration - 1.0).abs() < 1e-12);
        assert_eq!(audio.duration_micros(), 1_000_000);
    }

    #[test]
    fn test_into_mono_averages_channels() {
        let audio = AudioData::from_samples(vec![1.0, 0.0, 0.5, 0.5], 8_000, 2);
        let mono = audio.into_mono();
        assert_eq!(mono.channels, 1);
        assert_eq!(mono.samples, vec![0.5, 0.5]);
        assert!((mono.duration - 2.0 / 8_000.0).abs() < 1e-12);
    }

    #[test]
    fn test_channel_samples() {
        let audio = AudioData::from_samples(vec![1.0, 2.0, 3.0, 4.0], 8_000, 2);
        assert_eq!(audio.channel_samples(1), vec![2.0, 4.0]);
    }
}
