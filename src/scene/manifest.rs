use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{Scene, SceneScript};
use crate::audio::AudioLoader;
use crate::error::{CompositorError, Result, ValidationError};
use crate::timing::{resolve_word_timings, TimedWord, WordAligner};
use crate::video::ImageSource;

/// A project description on disk: the ordered scenes and their assets.
///
/// ```toml
/// [[scenes]]
/// narration = "The lighthouse keeper woke before dawn."
/// image_prompt = "a lighthouse at dawn, oil painting"
/// image = "images/scene_0.png"
/// audio = "audio/scene_0.wav"
///
/// [[scenes.words]]
/// word = "The"
/// start = 0.0
/// end = 0.18
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub scenes: Vec<ManifestScene>,

    /// Directory relative asset paths are resolved against
    #[serde(skip)]
    pub base_dir: PathBuf,
}

/// One `[[scenes]]` entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestScene {
    pub narration: String,
    pub image_prompt: String,
    pub image: PathBuf,
    #[serde(default)]
    pub audio: Option<PathBuf>,
    /// Precise word timings; estimated from the audio when absent
    #[serde(default)]
    pub words: Option<Vec<TimedWord>>,
}

impl Manifest {
    /// Read and parse a manifest file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Self::parse(&content, base_dir).map_err(|e| {
            let e = match e {
                ValidationError::ManifestParseFailed { reason, .. } => ValidationError::ManifestParseFailed {
                    path: path.display().to_string(),
                    reason,
                },
                other => other,
            };
            CompositorError::from(e)
        })
    }

    /// Parse manifest TOML, resolving relative paths against `base_dir`
    pub fn parse(content: &str, base_dir: PathBuf) -> std::result::Result<Self, ValidationError> {
        let mut manifest: Manifest =
            toml::from_str(content).map_err(|e| ValidationError::ManifestParseFailed {
                path: "<inline>".to_string(),
                reason: e.to_string(),
            })?;
        manifest.base_dir = base_dir;

        for (index, scene) in manifest.scenes.iter().enumerate() {
            SceneScript::new(scene.narration.as_str(), scene.image_prompt.as_str()).validate(index)?;
        }
        Ok(manifest)
    }

    /// Absolute or manifest-relative path to an asset
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    /// Load every scene's audio and resolve word timings.
    ///
    /// Scenes with explicit `words` keep them; the rest are aligned with
    /// `aligner` when given, or estimated over the audio duration.
    pub async fn load_scenes(
        &self,
        aligner: Option<Arc<dyn WordAligner>>,
        alignment_timeout: Duration,
    ) -> Result<Vec<Scene>> {
        let mut scenes = Vec::with_capacity(self.scenes.len());

        for (index, entry) in self.scenes.iter().enumerate() {
            let script = SceneScript::new(entry.narration.as_str(), entry.image_prompt.as_str());
            let image = ImageSource::File(self.resolve(&entry.image));

            let audio = match &entry.audio {
                Some(path) => Some(AudioLoader::load(self.resolve(path)).await?),
                None => None,
            };

            let word_timings = match (&entry.words, &audio) {
                (Some(words), _) => words.clone(),
                (None, Some(audio)) => {
                    resolve_word_timings(aligner.clone(), audio, &script.narration_text, alignment_timeout)
                        .await
                }
                (None, None) => Vec::new(),
            };

            debug!(
                "Scene {}: {} word(s), audio {}",
                index,
                word_timings.len(),
                audio.as_ref().map_or("missing".to_string(), |a| format!("{:.2}s", a.duration))
            );
            scenes.push(Scene::new(index, script, image, audio, word_timings)?);
        }

        info!("Loaded {} scene(s) from manifest", scenes.len());
        Ok(scenes)
    }
}
