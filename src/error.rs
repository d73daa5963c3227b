use thiserror::Error;

/// Main error type for the Story-Compositor library
#[derive(Error, Debug)]
pub enum CompositorError {
    #[error("Encode capability missing: {0}")]
    Capability(#[from] CapabilityError),

    #[error("Asset error: {0}")]
    Asset(#[from] AssetError),

    #[error("Audio resampling error: {0}")]
    Resample(#[from] ResampleError),

    #[error("Encoding error: {0}")]
    Encode(#[from] EncodeError),

    #[error("Word alignment error: {0}")]
    Alignment(#[from] AlignmentError),

    #[error("Invalid input: {0}")]
    Validation(#[from] ValidationError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Export cancelled")]
    Cancelled,

    #[error("Generic error: {0}")]
    Generic(String),
}

/// The execution environment cannot encode the output video
#[derive(Error, Debug)]
pub enum CapabilityError {
    #[error("ffmpeg was not found on PATH")]
    FfmpegNotFound,

    #[error("no hardware H.264 encoder available (tried: {tried})")]
    NoHardwareEncoder { tried: String },

    #[error("requested encoder '{name}' is not available")]
    EncoderUnavailable { name: String },

    #[error("ffmpeg could not list its encoders: {reason}")]
    EncoderListFailed { reason: String },
}

/// Image or audio assets that could not be loaded
#[derive(Error, Debug)]
pub enum AssetError {
    #[error("Failed to load image for scene {scene}: {reason}")]
    ImageLoadFailed { scene: usize, reason: String },

    #[error("Failed to load audio file: {path}")]
    AudioLoadFailed { path: String },

    #[error("Unsupported audio format: {format}")]
    UnsupportedFormat { format: String },

    #[error("Invalid audio parameters: {details}")]
    InvalidAudio { details: String },

    #[error("No usable subtitle font found (tried: {tried})")]
    FontNotFound { tried: String },

    #[error("Failed to parse font {path}: {reason}")]
    FontParseFailed { path: String, reason: String },
}

/// Sample-rate conversion failures
#[derive(Error, Debug)]
pub enum ResampleError {
    #[error("cannot resample from {from} Hz to {to} Hz")]
    UnsupportedRate { from: u32, to: u32 },

    #[error("audio buffer has no channels")]
    NoChannels,

    #[error("FFT processing failed: {reason}")]
    Fft { reason: String },
}

/// Encoder and muxer failures
#[derive(Error, Debug)]
pub enum EncodeError {
    #[error("Failed to start encoder: {reason}")]
    StartFailed { reason: String },

    #[error("Video encoding failed: {reason}")]
    VideoFailed { reason: String },

    #[error("Audio encoding failed: {reason}")]
    AudioFailed { reason: String },

    #[error("Muxing failed: {reason}")]
    MuxFailed { reason: String },

    #[error("{track} chunk at {timestamp_micros}us submitted after {last_micros}us")]
    OutOfOrder {
        track: &'static str,
        timestamp_micros: u64,
        last_micros: u64,
    },

    #[error("Frame size mismatch: got {got:?}, expected {expected:?}")]
    FrameSize { got: (u32, u32), expected: (u32, u32) },

    #[error("Encoder already closed")]
    Closed,
}

/// Precise alignment failures. These never abort an export; the caller
/// recovers with estimated timings.
#[derive(Error, Debug)]
pub enum AlignmentError {
    #[error("alignment service failed: {reason}")]
    ServiceFailed { reason: String },

    #[error("alignment timed out after {seconds}s")]
    TimedOut { seconds: u64 },

    #[error("alignment returned malformed timings: {reason}")]
    Malformed { reason: String },
}

/// Malformed scene input rejected before it reaches the pipeline
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Scene {index} has empty narration text")]
    EmptyNarration { index: usize },

    #[error("Scene {index} has an empty image prompt")]
    EmptyImagePrompt { index: usize },

    #[error("Scene {index} has invalid word timings: {reason}")]
    InvalidTimings { index: usize, reason: String },

    #[error("No scene has an audio asset, nothing to render")]
    NothingToRender,

    #[error("Failed to parse manifest {path}: {reason}")]
    ManifestParseFailed { path: String, reason: String },
}

/// Configuration-specific errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to parse configuration file: {path}")]
    ParseFailed { path: String },

    #[error("Invalid configuration value: {key} = {value}")]
    InvalidValue { key: String, value: String },

    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },
}

/// Convenience type alias for Results using CompositorError
pub type Result<T> = std::result::Result<T, CompositorError>;

impl CompositorError {
    /// Create a generic error with a custom message
    pub fn generic<S: Into<String>>(message: S) -> Self {
        Self::Generic(message.into())
    }

    /// Whether this error aborts an export.
    ///
    /// Alignment failures are the only recoverable kind: the pipeline falls
    /// back to estimated word timings instead of surfacing them.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Alignment(_))
    }

    /// Get a user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            Self::Capability(CapabilityError::FfmpegNotFound) => {
                "ffmpeg is required to encode the video. Please install it and make sure it is on PATH.".to_string()
            }
            Self::Capability(CapabilityError::NoHardwareEncoder { .. }) => {
                "No hardware video encoder was found. Set `video.encoder` in the configuration to an encoder your ffmpeg supports.".to_string()
            }
            Self::Asset(AssetError::AudioLoadFailed { path }) => {
                format!("Could not load audio file '{}'. Please check the file exists and is a supported format.", path)
            }
            Self::Asset(AssetError::FontNotFound { .. }) => {
                "No subtitle font found. Set `subtitles.font_path` or disable subtitles.".to_string()
            }
            Self::Config(ConfigError::FileNotFound { path }) => {
                format!("Configuration file '{}' not found.", path)
            }
            _ => self.to_string(),
        }
    }
}
