//! # Scenes
//!
//! A scene pairs one narration with one image. Scenes are built once, before
//! an export, and are read-only while it runs.

pub mod manifest;

use serde::{Deserialize, Serialize};

use crate::audio::AudioData;
use crate::error::ValidationError;
use crate::timing::{validate_timings, TimedWord};
use crate::transition::{transition_for, TransitionKind};
use crate::video::ImageSource;

pub use manifest::{Manifest, ManifestScene};

/// The authored text of a scene
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SceneScript {
    pub narration_text: String,
    pub image_prompt: String,
}

impl SceneScript {
    pub fn new<N: Into<String>, P: Into<String>>(narration_text: N, image_prompt: P) -> Self {
        Self {
            narration_text: narration_text.into(),
            image_prompt: image_prompt.into(),
        }
    }

    /// Reject scripts with blank narration or image prompt
    pub fn validate(&self, index: usize) -> Result<(), ValidationError> {
        if self.narration_text.trim().is_empty() {
            return Err(ValidationError::EmptyNarration { index });
        }
        if self.image_prompt.trim().is_empty() {
            return Err(ValidationError::EmptyImagePrompt { index });
        }
        Ok(())
    }
}

/// Everything needed to render one scene
#[derive(Debug, Clone)]
pub struct Scene {
    pub index: usize,
    pub script: SceneScript,
    pub image: ImageSource,
    /// Narration audio; scenes without it are skipped at render time
    pub audio: Option<AudioData>,
    pub transition: TransitionKind,
    pub word_timings: Vec<TimedWord>,
}

impl Scene {
    /// Build a scene, assigning its transition from its position
    pub fn new(
        index: usize,
        script: SceneScript,
        image: ImageSource,
        audio: Option<AudioData>,
        word_timings: Vec<TimedWord>,
    ) -> Result<Self, ValidationError> {
        script.validate(index)?;
        validate_timings(&word_timings)
            .map_err(|reason| ValidationError::InvalidTimings { index, reason })?;

        Ok(Self {
            index,
            script,
            image,
            audio,
            transition: transition_for(index),
            word_timings,
        })
    }

    pub fn has_audio(&self) -> bool {
        self.audio.is_some()
    }

    /// Audio duration in seconds, zero without audio
    pub fn duration(&self) -> f64 {
        self.audio.as_ref().map_or(0.0, |a| a.duration)
    }
}
