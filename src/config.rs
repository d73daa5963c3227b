use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

/// Main configuration for the Story-Compositor
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Video output settings
    pub video: VideoConfig,

    /// Audio output settings
    pub audio: AudioConfig,

    /// Subtitle layout and styling
    pub subtitles: SubtitleConfig,

    /// Render loop behaviour
    pub pipeline: PipelineConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|_| ConfigError::FileNotFound { path: path.display().to_string() })?;

        let config: Config = toml::from_str(&content)
            .map_err(|_| ConfigError::ParseFailed { path: path.display().to_string() })?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::InvalidValue {
                key: "config".to_string(),
                value: e.to_string()
            })?;

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.video.validate()?;
        self.audio.validate()?;
        self.subtitles.validate(self.video.width)?;
        self.pipeline.validate()?;
        Ok(())
    }
}

fn invalid(key: &str, value: impl ToString) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    }
}

/// Video encoder configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    /// Output width in pixels
    pub width: u32,

    /// Output height in pixels
    pub height: u32,

    /// Output frame rate
    pub fps: u32,

    /// Target bitrate in bits per second
    pub bitrate: u32,

    /// Force a keyframe every N frames
    pub keyframe_interval: u32,

    /// ffmpeg encoder name. When unset, the first available hardware
    /// H.264 encoder is used.
    pub encoder: Option<String>,

    /// Threads used to paint a single frame
    pub render_threads: usize,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            width: 1080,
            height: 1920,
            fps: 30,
            bitrate: 8_000_000,
            keyframe_interval: 60,
            encoder: None,
            render_threads: num_cpus::get(),
        }
    }
}

impl VideoConfig {
    fn validate(&self) -> Result<()> {
        if self.width == 0 || self.width % 2 != 0 {
            return Err(invalid("video.width", self.width).into());
        }

        if self.height == 0 || self.height % 2 != 0 {
            return Err(invalid("video.height", self.height).into());
        }

        if self.fps == 0 {
            return Err(invalid("video.fps", self.fps).into());
        }

        if self.bitrate == 0 {
            return Err(invalid("video.bitrate", self.bitrate).into());
        }

        if self.keyframe_interval == 0 {
            return Err(invalid("video.keyframe_interval", self.keyframe_interval).into());
        }

        if self.render_threads == 0 {
            return Err(invalid("video.render_threads", self.render_threads).into());
        }

        Ok(())
    }
}

/// Audio encoder configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Encoder sample rate (Hz); speech is resampled to this
    pub sample_rate: u32,

    /// Encoded channel count. Only mono is supported.
    pub channels: u16,

    /// Target bitrate in bits per second
    pub bitrate: u32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48_000,
            channels: 1,
            bitrate: 128_000,
        }
    }
}

impl AudioConfig {
    fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(invalid("audio.sample_rate", self.sample_rate).into());
        }

        if self.channels != 1 {
            return Err(invalid("audio.channels", self.channels).into());
        }

        if self.bitrate == 0 {
            return Err(invalid("audio.bitrate", self.bitrate).into());
        }

        Ok(())
    }
}

/// Subtitle layout and styling
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SubtitleConfig {
    /// Draw subtitles unless disabled per export
    pub enabled: bool,

    /// TrueType/OpenType font file. Common system fonts are tried when unset.
    pub font_path: Option<PathBuf>,

    /// Base font size in pixels
    pub font_size: f32,

    /// Size multiplier for the word being spoken
    pub active_scale: f32,

    /// Line advance as a multiple of the font size
    pub line_height: f32,

    /// Horizontal margin on each side of a subtitle line
    pub side_margin: u32,

    /// Distance from the frame bottom to the last line's baseline
    pub bottom_margin: u32,

    /// Colour of spoken and upcoming words
    pub text_color: [u8; 3],

    /// Colour of the word being spoken
    pub highlight_color: [u8; 3],

    /// Opacity of words not yet spoken (0.0-1.0)
    pub upcoming_opacity: f32,

    /// Fraction of the frame height covered by the backdrop gradient
    pub backdrop_height_ratio: f32,

    /// Opacity of the backdrop at the frame bottom (0.0-1.0)
    pub backdrop_opacity: f32,
}

impl Default for SubtitleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            font_path: None,
            font_size: 64.0,
            active_scale: 1.15,
            line_height: 1.35,
            side_margin: 80,
            bottom_margin: 260,
            text_color: [255, 255, 255],
            highlight_color: [250, 204, 21],
            upcoming_opacity: 0.5,
            backdrop_height_ratio: 0.4,
            backdrop_opacity: 0.75,
        }
    }
}

impl SubtitleConfig {
    /// Maximum width of one subtitle line on a canvas of the given width
    pub fn max_line_width(&self, canvas_width: u32) -> f32 {
        canvas_width.saturating_sub(self.side_margin * 2) as f32
    }

    fn validate(&self, canvas_width: u32) -> Result<()> {
        if self.font_size <= 0.0 {
            return Err(invalid("subtitles.font_size", self.font_size).into());
        }

        if self.active_scale < 1.0 {
            return Err(invalid("subtitles.active_scale", self.active_scale).into());
        }

        if self.line_height <= 0.0 {
            return Err(invalid("subtitles.line_height", self.line_height).into());
        }

        if self.max_line_width(canvas_width) <= 0.0 {
            return Err(invalid("subtitles.side_margin", self.side_margin).into());
        }

        for (key, value) in [
            ("subtitles.upcoming_opacity", self.upcoming_opacity),
            ("subtitles.backdrop_height_ratio", self.backdrop_height_ratio),
            ("subtitles.backdrop_opacity", self.backdrop_opacity),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(invalid(key, value).into());
            }
        }

        Ok(())
    }
}

/// Render loop behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Yield to the runtime every N frames
    pub yield_interval: u32,

    /// Give up on precise alignment after this many seconds
    pub alignment_timeout_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            yield_interval: 15,
            alignment_timeout_secs: 30,
        }
    }
}

impl PipelineConfig {
    fn validate(&self) -> Result<()> {
        if self.yield_interval == 0 {
            return Err(invalid("pipeline.yield_interval", self.yield_interval).into());
        }

        Ok(())
    }
}
