use realfft::RealFftPlanner;
use rustfft::num_complex::Complex;
use tracing::debug;

use crate::audio::types::{duration_of, AudioData};
use crate::error::{ResampleError, Result};

/// Offline sample-rate converter.
///
/// Each channel is transformed as a whole: the spectrum is truncated
/// (downsampling) or zero-padded (upsampling) and transformed back at the new
/// length. The conversion is deterministic and keeps the channel count and the
/// duration (to within one output sample).
pub struct AudioResampler {
    planner: RealFftPlanner<f32>,
}

impl Default for AudioResampler {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioResampler {
    pub fn new() -> Self {
        Self {
            planner: RealFftPlanner::new(),
        }
    }

    /// Convert `audio` to `target_rate`. Returns the input untouched when the
    /// rate already matches.
    pub fn resample(&mut self, audio: AudioData, target_rate: u32) -> Result<AudioData> {
        if audio.sample_rate == target_rate {
            return Ok(audio);
        }
        if audio.sample_rate == 0 || target_rate == 0 {
            return Err(ResampleError::UnsupportedRate {
                from: audio.sample_rate,
                to: target_rate,
            }
            .into());
        }
        if audio.channels == 0 {
            return Err(ResampleError::NoChannels.into());
        }

        let channels = audio.channels as usize;
        let in_frames = audio.frame_count();
        let out_frames = output_length(in_frames, audio.sample_rate, target_rate);

        debug!(
            "Resampling {} frames {} Hz -> {} frames {} Hz ({} channel(s))",
            in_frames, audio.sample_rate, out_frames, target_rate, channels
        );

        let mut converted = Vec::with_capacity(channels);
        for channel in 0..channels {
            let input = audio.channel_samples(channel);
            converted.push(self.resample_channel(&input[..in_frames], out_frames)?);
        }

        let mut samples = Vec::with_capacity(out_frames * channels);
        for frame in 0..out_frames {
            for channel in &converted {
                samples.push(channel[frame]);
            }
        }

        Ok(AudioData {
            duration: duration_of(samples.len(), target_rate, audio.channels),
            samples,
            sample_rate: target_rate,
            ..audio
        })
    }

    fn resample_channel(&mut self, input: &[f32], out_len: usize) -> Result<Vec<f32>> {
        let in_len = input.len();
        if in_len == 0 || out_len == 0 {
            return Ok(vec![0.0; out_len]);
        }

        let forward = self.planner.plan_fft_forward(in_len);
        let mut time = input.to_vec();
        let mut spectrum = forward.make_output_vec();
        forward
            .process(&mut time, &mut spectrum)
            .map_err(|e| ResampleError::Fft { reason: e.to_string() })?;

        let inverse = self.planner.plan_fft_inverse(out_len);
        let mut resized = inverse.make_input_vec();
        let shared = spectrum.len().min(resized.len());
        resized[..shared].copy_from_slice(&spectrum[..shared]);

        // An even-length input's Nyquist bin is shared between the positive and
        // negative halves; once it is an interior bin of a longer spectrum it
        // only carries half its energy.
        if out_len > in_len && in_len % 2 == 0 {
            resized[in_len / 2] *= 0.5;
        }

        // The inverse real transform requires real DC and Nyquist bins.
        resized[0].im = 0.0;
        if out_len % 2 == 0 {
            if let Some(last) = resized.last_mut() {
                *last = Complex::new(last.re, 0.0);
            }
        }

        let mut output = inverse.make_output_vec();
        inverse
            .process(&mut resized, &mut output)
            .map_err(|e| ResampleError::Fft { reason: e.to_string() })?;

        let scale = 1.0 / in_len as f32;
        output.iter_mut().for_each(|s| *s *= scale);
        Ok(output)
    }
}

/// Number of output frames for a conversion, rounded to the nearest frame
fn output_length(in_frames: usize, from: u32, to: u32) -> usize {
    let scaled = in_frames as u128 * u128::from(to);
    ((scaled + u128::from(from) / 2) / u128::from(from)) as usize
}
