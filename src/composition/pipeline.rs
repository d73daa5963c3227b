use std::sync::Arc;
use std::time::Duration;

use image::RgbImage;
use tracing::{debug, info};

use super::composer::SceneFrameComposer;
use super::progress::{CancelToken, ProgressSink, ProgressTracker};
use crate::audio::AudioResampler;
use crate::config::Config;
use crate::encode::{AudioEncoderConfig, EncodeSession, EncodedVideo, EncoderBackend, VideoEncoderConfig};
use crate::error::{CompositorError, Result, ValidationError};
use crate::scene::Scene;
use crate::subtitle::{FontRasterizer, GlyphRasterizer, SubtitleRenderer};
use crate::timing::{resolve_word_timings, WordAligner};
use crate::transition::TransitionRenderer;
use crate::video::{Frame, ImageLoader};

/// Per-export switches
#[derive(Debug, Clone)]
pub struct ExportOptions {
    pub subtitles_enabled: bool,
    pub cancel: Option<CancelToken>,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            subtitles_enabled: true,
            cancel: None,
        }
    }
}

/// Number of frames covering `duration` seconds at `fps`
pub fn frame_count(duration: f64, fps: u32) -> usize {
    if !duration.is_finite() || duration <= 0.0 {
        return 0;
    }
    // Absorb float noise so that e.g. 2.0s at 30 fps is 60 frames, not 61
    (duration * f64::from(fps) - 1e-9).ceil().max(0.0) as usize
}

/// Microseconds covered by `samples` mono samples at `sample_rate`, rounded
fn samples_to_micros(samples: usize, sample_rate: u32) -> u64 {
    let rate = u128::from(sample_rate.max(1));
    ((samples as u128 * 1_000_000 + rate / 2) / rate) as u64
}

/// Bookkeeping for one export call
struct RenderJob<'a> {
    global_timestamp_micros: u64,
    total_duration_seconds: f64,
    /// Seconds of fully rendered scenes
    elapsed_seconds: f64,
    audio_samples: usize,
    frames_encoded: usize,
    scenes_rendered: usize,
    scenes_skipped: usize,
    progress: ProgressTracker<'a>,
}

impl<'a> RenderJob<'a> {
    fn new(total_duration_seconds: f64, sink: &'a mut dyn ProgressSink) -> Self {
        Self {
            global_timestamp_micros: 0,
            total_duration_seconds,
            elapsed_seconds: 0.0,
            audio_samples: 0,
            frames_encoded: 0,
            scenes_rendered: 0,
            scenes_skipped: 0,
            progress: ProgressTracker::new(sink),
        }
    }

    fn report(&mut self, scene_elapsed: f64) {
        self.progress
            .update(self.elapsed_seconds + scene_elapsed, self.total_duration_seconds);
    }

    /// Advance the timeline past a rendered scene
    fn finish_scene(&mut self, samples: usize, duration: f64, sample_rate: u32) {
        self.audio_samples += samples;
        self.global_timestamp_micros = samples_to_micros(self.audio_samples, sample_rate);
        self.elapsed_seconds += duration;
        self.scenes_rendered += 1;
    }
}

/// Renders scenes into one encoded video
pub struct RenderPipeline {
    config: Config,
    backend: Arc<dyn EncoderBackend>,
    rasterizer: Option<Arc<dyn GlyphRasterizer>>,
    aligner: Option<Arc<dyn WordAligner>>,
}

impl RenderPipeline {
    pub fn new(config: Config, backend: Arc<dyn EncoderBackend>) -> Self {
        Self {
            config,
            backend,
            rasterizer: None,
            aligner: None,
        }
    }

    /// Use `rasterizer` for subtitles instead of loading the configured font
    pub fn with_rasterizer(mut self, rasterizer: Arc<dyn GlyphRasterizer>) -> Self {
        self.rasterizer = Some(rasterizer);
        self
    }

    /// Align scenes that arrive without word timings
    pub fn with_aligner(mut self, aligner: Arc<dyn WordAligner>) -> Self {
        self.aligner = Some(aligner);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Render `scenes` in order and return the finished container.
    ///
    /// Any failure aborts the whole export; encoders are closed and partial
    /// output is discarded.
    pub async fn export(
        &self,
        scenes: &[Scene],
        options: ExportOptions,
        progress: &mut dyn ProgressSink,
    ) -> Result<EncodedVideo> {
        info!("🎬 Starting export of {} scene(s) via {}", scenes.len(), self.backend.name());
        self.config.validate()?;
        if !scenes.iter().any(Scene::has_audio) {
            return Err(ValidationError::NothingToRender.into());
        }
        let cancel = options.cancel.clone().unwrap_or_default();

        // Step 1: encode capability and encoders
        let session = self.open_session().await?;

        // Step 2: decode every image up front
        info!("🖼️  Decoding {} image(s)", scenes.len());
        let images = ImageLoader::load_all(scenes.iter().map(|s| s.image.clone()).collect()).await?;

        // Step 3: render scene by scene
        let total_duration: f64 = scenes.iter().map(Scene::duration).sum();
        info!("   Total narration: {:.2}s", total_duration);

        let subtitles_enabled = options.subtitles_enabled && self.config.subtitles.enabled;
        let composer = self.build_composer(subtitles_enabled)?;

        let mut run = ExportRun {
            pipeline: self,
            composer,
            session,
            frame: Frame::new_black(self.config.video.width, self.config.video.height),
            job: RenderJob::new(total_duration, progress),
            cancel,
            subtitles_enabled,
        };

        for (scene, image) in scenes.iter().zip(images) {
            run.check_cancelled()?;
            run.render_scene(scene, image).await?;
        }
        run.check_cancelled()?;

        // Step 4: flush and finalise
        info!("📦 Finalising container");
        let ExportRun { session, mut job, .. } = run;
        let data = session.finish()?;
        job.progress.finish();

        let duration = job.audio_samples as f64 / f64::from(self.config.audio.sample_rate);
        info!(
            "🎉 Export complete: {:.2}s, {} frames, {} scene(s) rendered, {} skipped",
            duration, job.frames_encoded, job.scenes_rendered, job.scenes_skipped
        );

        Ok(EncodedVideo {
            data,
            duration,
            frame_count: job.frames_encoded,
            audio_sample_count: job.audio_samples,
            scenes_rendered: job.scenes_rendered,
            scenes_skipped: job.scenes_skipped,
        })
    }

    async fn open_session(&self) -> Result<EncodeSession> {
        let mut video = VideoEncoderConfig::from(&self.config.video);
        let audio = AudioEncoderConfig::from(&self.config.audio);

        let backend = Arc::clone(&self.backend);
        let probe_config = video.clone();
        let encoder = tokio::task::spawn_blocking(move || backend.probe(&probe_config))
            .await
            .map_err(|e| CompositorError::generic(format!("encoder probe failed to run: {e}")))??;

        info!(
            "⚙️  Encoding {}x{} @ {} fps with {}, audio {} Hz mono",
            video.width, video.height, video.fps, encoder, audio.sample_rate
        );
        video.encoder = Some(encoder);
        self.backend.open(&video, &audio)
    }

    fn build_composer(&self, subtitles: bool) -> Result<SceneFrameComposer> {
        let transitions = TransitionRenderer::new(self.config.video.render_threads)?;
        if !subtitles {
            return Ok(SceneFrameComposer::new(transitions, None));
        }

        let rasterizer: Arc<dyn GlyphRasterizer> = match &self.rasterizer {
            Some(rasterizer) => Arc::clone(rasterizer),
            None => Arc::new(FontRasterizer::load(self.config.subtitles.font_path.as_deref())?),
        };
        let renderer = SubtitleRenderer::new(rasterizer, self.config.subtitles.clone());
        Ok(SceneFrameComposer::new(transitions, Some(renderer)))
    }
}

/// State of one in-flight export
struct ExportRun<'p, 'a> {
    pipeline: &'p RenderPipeline,
    composer: SceneFrameComposer,
    session: EncodeSession,
    /// Raster surface reused for every frame
    frame: Frame,
    job: RenderJob<'a>,
    cancel: CancelToken,
    subtitles_enabled: bool,
}

impl ExportRun<'_, '_> {
    fn check_cancelled(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            info!("Export cancelled");
            return Err(CompositorError::Cancelled);
        }
        Ok(())
    }

    async fn render_scene(&mut self, scene: &Scene, image: Arc<RgbImage>) -> Result<()> {
        let Some(audio) = &scene.audio else {
            info!("⏭️  Scene {}: no audio, skipping", scene.index);
            self.job.scenes_skipped += 1;
            return Ok(());
        };

        let pipeline = self.pipeline;
        let config = &pipeline.config;
        let fps = config.video.fps;
        let sample_rate = config.audio.sample_rate;

        let source = audio.clone().into_mono();
        let audio = tokio::task::spawn_blocking(move || AudioResampler::new().resample(source, sample_rate))
            .await
            .map_err(|e| CompositorError::generic(format!("resampler failed to run: {e}")))??;

        let timings = if scene.word_timings.is_empty() {
            let timeout = Duration::from_secs(config.pipeline.alignment_timeout_secs);
            resolve_word_timings(
                pipeline.aligner.clone(),
                &audio,
                &scene.script.narration_text,
                timeout,
            )
            .await
        } else {
            scene.word_timings.clone()
        };

        let total_frames = frame_count(audio.duration, fps);
        info!(
            "🎞️  Scene {}: {:.2}s, {} frames, {} transition, {} word(s)",
            scene.index,
            audio.duration,
            total_frames,
            scene.transition,
            timings.len()
        );

        let start_micros = self.job.global_timestamp_micros;
        self.session.audio.encode(&audio.samples, start_micros)?;

        let context = self
            .composer
            .prepare(scene, image, &timings, config.video.width);
        let keyframe_interval = config.video.keyframe_interval as usize;
        let yield_interval = config.pipeline.yield_interval as usize;

        for i in 0..total_frames {
            let scene_elapsed = i as f64 / f64::from(fps);
            self.composer.render_frame(
                &mut self.frame,
                &context,
                i,
                total_frames,
                scene_elapsed,
                self.subtitles_enabled,
            );

            let timestamp = start_micros + (i as u64 * 1_000_000) / u64::from(fps);
            self.session
                .video
                .encode(&self.frame, timestamp, i % keyframe_interval == 0)?;
            self.job.frames_encoded += 1;
            self.job
                .report(((i + 1) as f64 / f64::from(fps)).min(audio.duration));

            if (i + 1) % yield_interval == 0 {
                tokio::task::yield_now().await;
                self.check_cancelled()?;
            }
        }

        self.job
            .finish_scene(audio.samples.len(), audio.duration, sample_rate);
        debug!(
            "Scene {} done, timeline at {}us",
            scene.index, self.job.global_timestamp_micros
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::AudioData;
    use crate::encode::RecordingBackend;
    use crate::error::{AlignmentError, AssetError, CapabilityError, EncodeError};
    use crate::scene::SceneScript;
    use crate::subtitle::font::test_font::BlockFont;
    use crate::timing::TimedWord;
    use crate::video::ImageSource;
    use image::{DynamicImage, ImageOutputFormat, Rgb};
    use std::io::Cursor;
    use std::sync::Mutex;

    fn test_config() -> Config {
        let mut config = Config::default();
        config.video.width = 64;
        config.video.height = 96;
        config.video.render_threads = 1;
        config.subtitles.font_size = 12.0;
        config.subtitles.side_margin = 4;
        config.subtitles.bottom_margin = 10;
        config
    }

    fn png(color: [u8; 3]) -> ImageSource {
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(8, 12, Rgb(color)));
        let mut bytes = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut bytes), ImageOutputFormat::Png)
            .unwrap();
        ImageSource::from(bytes)
    }

    fn speech(seconds: f64, rate: u32) -> AudioData {
        AudioData::from_samples(vec![0.1; (seconds * f64::from(rate)) as usize], rate, 1)
    }

    fn scene(index: usize, audio: Option<AudioData>, timings: Vec<TimedWord>) -> Scene {
        Scene::new(
            index,
            SceneScript::new("Hi there", "a quiet harbour"),
            png([0, 0, 0]),
            audio,
            timings,
        )
        .unwrap()
    }

    fn hi_there() -> Vec<TimedWord> {
        vec![TimedWord::new("Hi", 0.0, 1.0), TimedWord::new("there", 1.0, 2.0)]
    }

    fn pipeline(backend: &RecordingBackend) -> RenderPipeline {
        RenderPipeline::new(test_config(), Arc::new(backend.clone())).with_rasterizer(Arc::new(BlockFont))
    }

    async fn export(pipeline: &RenderPipeline, scenes: &[Scene], options: ExportOptions) -> (Result<EncodedVideo>, Vec<f64>) {
        let mut reports = Vec::new();
        let mut sink = |p: f64| reports.push(p);
        let result = pipeline.export(scenes, options, &mut sink).await;
        (result, reports)
    }

    #[tokio::test]
    async fn test_two_scene_export() {
        let backend = RecordingBackend::new();
        let scenes = vec![
            scene(0, Some(speech(2.0, 24_000)), hi_there()),
            scene(1, Some(speech(2.0, 24_000)), hi_there()),
        ];
        assert_eq!(scenes[0].transition, crate::transition::TransitionKind::Zoom);
        assert_eq!(scenes[1].transition, crate::transition::TransitionKind::Slide);

        let (result, reports) = export(&pipeline(&backend), &scenes, ExportOptions::default()).await;
        let video = result.unwrap();

        assert!((video.duration - 4.0).abs() < 1e-6);
        assert_eq!(video.frame_count, 120);
        assert_eq!(video.audio_sample_count, 192_000);
        assert_eq!(video.scenes_rendered, 2);
        assert!(String::from_utf8(video.data).unwrap().starts_with("frames=120 keyframes=2"));

        assert_eq!(reports.last().copied(), Some(100.0));
        assert_eq!(reports.iter().filter(|&&p| p == 100.0).count(), 1);
        assert!(reports.windows(2).all(|w| w[0] <= w[1]));
        assert!(reports.iter().all(|p| (0.0..=100.0).contains(p)));

        let recording = backend.snapshot();
        assert!(recording.finalized && !recording.discarded);
        let keyframes: Vec<u64> = recording
            .frames
            .iter()
            .filter(|f| f.keyframe)
            .map(|f| f.timestamp_micros)
            .collect();
        assert_eq!(keyframes, vec![0, 2_000_000]);
    }

    #[tokio::test]
    async fn test_timestamps_and_skipped_scene() {
        let backend = RecordingBackend::new();
        let scenes = vec![
            scene(0, Some(speech(1.0, 24_000)), Vec::new()),
            scene(1, None, Vec::new()),
            scene(2, Some(speech(0.5, 16_000)), Vec::new()),
        ];

        let (result, _) = export(&pipeline(&backend), &scenes, ExportOptions::default()).await;
        let video = result.unwrap();
        assert_eq!(video.scenes_rendered, 2);
        assert_eq!(video.scenes_skipped, 1);
        assert_eq!(video.frame_count, 45);
        assert!((video.duration - 1.5).abs() < 1e-6);

        let recording = backend.snapshot();
        let audio_starts: Vec<u64> = recording.audio.iter().map(|a| a.timestamp_micros).collect();
        assert_eq!(audio_starts, vec![0, 1_000_000]);
        assert!(recording.frames.windows(2).all(|w| w[0].timestamp_micros <= w[1].timestamp_micros));

        // The third scene starts exactly where the first ended
        assert_eq!(recording.frames[29].timestamp_micros, 29 * 1_000_000 / 30);
        assert_eq!(recording.frames[30].timestamp_micros, 1_000_000);
        assert!(recording.frames[30].keyframe);
    }

    #[tokio::test]
    async fn test_nothing_to_render() {
        let backend = RecordingBackend::new();
        let scenes = vec![scene(0, None, Vec::new())];

        let (result, reports) = export(&pipeline(&backend), &scenes, ExportOptions::default()).await;
        assert!(matches!(
            result,
            Err(CompositorError::Validation(ValidationError::NothingToRender))
        ));
        assert!(reports.is_empty());
        assert!(backend.snapshot().video_config.is_none());
    }

    #[tokio::test]
    async fn test_missing_capability_fails_fast() {
        let backend = RecordingBackend::unavailable();
        let scenes = vec![scene(0, Some(speech(1.0, 48_000)), Vec::new())];

        let (result, _) = export(&pipeline(&backend), &scenes, ExportOptions::default()).await;
        assert!(matches!(
            result,
            Err(CompositorError::Capability(CapabilityError::NoHardwareEncoder { .. }))
        ));
        assert!(backend.snapshot().video_config.is_none());
    }

    #[tokio::test]
    async fn test_bad_image_aborts_and_discards() {
        let backend = RecordingBackend::new();
        let mut scenes = vec![
            scene(0, Some(speech(1.0, 48_000)), Vec::new()),
            scene(1, Some(speech(1.0, 48_000)), Vec::new()),
        ];
        scenes[1].image = ImageSource::from(b"not an image".to_vec());

        let (result, _) = export(&pipeline(&backend), &scenes, ExportOptions::default()).await;
        assert!(matches!(
            result,
            Err(CompositorError::Asset(AssetError::ImageLoadFailed { scene: 1, .. }))
        ));

        let recording = backend.snapshot();
        assert!(recording.frames.is_empty());
        assert!(recording.discarded && !recording.finalized);
    }

    #[tokio::test]
    async fn test_encoder_failure_closes_session() {
        let backend = RecordingBackend::failing_after(5);
        let scenes = vec![scene(0, Some(speech(1.0, 48_000)), Vec::new())];

        let (result, reports) = export(&pipeline(&backend), &scenes, ExportOptions::default()).await;
        assert!(matches!(result, Err(CompositorError::Encode(EncodeError::VideoFailed { .. }))));
        assert!(!reports.contains(&100.0));

        let recording = backend.snapshot();
        assert_eq!(recording.frames.len(), 5);
        assert!(recording.video_closed && recording.audio_closed && recording.discarded);
    }

    #[tokio::test]
    async fn test_cancellation_at_yield_point() {
        let backend = RecordingBackend::new();
        let scenes = vec![scene(0, Some(speech(2.0, 48_000)), Vec::new())];
        let token = CancelToken::new();
        let options = ExportOptions {
            cancel: Some(token.clone()),
            ..ExportOptions::default()
        };

        let pipeline = pipeline(&backend);
        let mut sink = move |p: f64| {
            if p > 10.0 {
                token.cancel();
            }
        };
        let result = pipeline.export(&scenes, options, &mut sink).await;
        assert!(matches!(result, Err(CompositorError::Cancelled)));

        // 10% is passed at frame 7; the next yield point is frame 15
        let recording = backend.snapshot();
        assert_eq!(recording.frames.len(), 15);
        assert!(recording.discarded);
    }

    struct FailingAligner {
        calls: Mutex<usize>,
    }

    impl WordAligner for FailingAligner {
        fn align(&self, _: &AudioData, _: &str) -> std::result::Result<Vec<TimedWord>, AlignmentError> {
            if let Ok(mut calls) = self.calls.lock() {
                *calls += 1;
            }
            Err(AlignmentError::ServiceFailed {
                reason: "service offline".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn test_alignment_failure_still_renders_subtitles() {
        let aligner = Arc::new(FailingAligner { calls: Mutex::new(0) });
        let scenes = vec![scene(0, Some(speech(1.0, 48_000)), Vec::new())];

        let backend = RecordingBackend::new();
        let pipeline = pipeline(&backend).with_aligner(aligner.clone());
        let (result, _) = export(&pipeline, &scenes, ExportOptions::default()).await;
        assert_eq!(result.unwrap().frame_count, 30);
        assert_eq!(*aligner.calls.lock().unwrap(), 1);
        // Black background, so any lit pixel comes from the subtitles
        assert!(backend.snapshot().frames.iter().any(|f| f.mean_luma > 0));

        let backend = RecordingBackend::new();
        let options = ExportOptions {
            subtitles_enabled: false,
            ..ExportOptions::default()
        };
        let (result, _) = export(&self::pipeline(&backend), &scenes, options).await;
        assert!(result.is_ok());
        assert!(backend.snapshot().frames.iter().all(|f| f.mean_luma == 0));
    }

    #[tokio::test]
    async fn test_invalid_config_rejected_before_encoding() {
        let backend = RecordingBackend::new();
        let mut config = test_config();
        config.video.fps = 0;
        let pipeline = RenderPipeline::new(config, Arc::new(backend.clone())).with_rasterizer(Arc::new(BlockFont));
        let scenes = vec![scene(0, Some(speech(1.0, 48_000)), Vec::new())];

        let (result, reports) = export(&pipeline, &scenes, ExportOptions::default()).await;
        assert!(matches!(result, Err(CompositorError::Config(_))));
        assert!(reports.is_empty());
        assert!(backend.snapshot().video_config.is_none());
    }

    #[tokio::test]
    async fn test_odd_frame_rate_keeps_tracks_ordered() {
        let backend = RecordingBackend::new();
        let mut config = test_config();
        config.video.fps = 49;
        let pipeline = RenderPipeline::new(config, Arc::new(backend.clone())).with_rasterizer(Arc::new(BlockFont));

        // Scene lengths that are not whole microseconds
        let scenes: Vec<Scene> = (0..6)
            .map(|i| {
                let audio = AudioData::from_samples(vec![0.1; 24_000 + 7 * i + 1], 48_000, 1);
                scene(i, Some(audio), Vec::new())
            })
            .collect();

        let (result, _) = export(&pipeline, &scenes, ExportOptions::default()).await;
        let video = result.unwrap();
        assert_eq!(video.scenes_rendered, 6);

        let recording = backend.snapshot();
        assert!(recording.frames.windows(2).all(|w| w[0].timestamp_micros <= w[1].timestamp_micros));
        // Each scene's first frame is its keyframe, at the scene's audio start
        let scene_starts: Vec<u64> = recording
            .frames
            .iter()
            .filter(|f| f.keyframe)
            .map(|f| f.timestamp_micros)
            .collect();
        let audio_starts: Vec<u64> = recording.audio.iter().map(|a| a.timestamp_micros).collect();
        assert_eq!(scene_starts, audio_starts);
    }

    #[test]
    fn test_timeline_advances_by_scene_durations() {
        let mut sink = crate::composition::NoProgress;
        let mut job = RenderJob::new(3.5, &mut sink);
        job.finish_scene(48_000, 1.0, 48_000);
        job.finish_scene(120_000, 2.5, 48_000);
        assert_eq!(job.global_timestamp_micros, 3_500_000);
        assert_eq!(job.scenes_rendered, 2);
        assert!((job.elapsed_seconds - 3.5).abs() < 1e-9);
    }

    #[test]
    fn test_frame_count() {
        assert_eq!(frame_count(2.0, 30), 60);
        assert_eq!(frame_count(2.01, 30), 61);
        assert_eq!(frame_count(0.0, 30), 0);
        assert_eq!(frame_count(1.0 / 3.0, 30), 10);
    }

    #[test]
    fn test_samples_to_micros() {
        assert_eq!(samples_to_micros(48_000, 48_000), 1_000_000);
        assert_eq!(samples_to_micros(1, 48_000), 21);
    }
}
