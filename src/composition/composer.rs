use std::sync::Arc;

use image::RgbImage;

use crate::scene::Scene;
use crate::subtitle::{SubtitleLine, SubtitleRenderer};
use crate::timing::TimedWord;
use crate::transition::{TransitionKind, TransitionRenderer};
use crate::video::Frame;

/// Per-scene state reused for every frame of the scene
pub struct SceneRenderContext {
    pub index: usize,
    pub image: Arc<RgbImage>,
    pub transition: TransitionKind,
    /// Subtitle lines laid out once for the scene; empty without timings
    pub lines: Vec<SubtitleLine>,
}

/// Paints one output frame: the scene image under its transition, then the
/// subtitle overlay
pub struct SceneFrameComposer {
    transitions: TransitionRenderer,
    subtitles: Option<SubtitleRenderer>,
}

impl SceneFrameComposer {
    pub fn new(transitions: TransitionRenderer, subtitles: Option<SubtitleRenderer>) -> Self {
        Self { transitions, subtitles }
    }

    /// Build the render context of `scene` for a canvas `canvas_width` wide,
    /// laying out `timings` as its subtitles
    pub fn prepare(
        &self,
        scene: &Scene,
        image: Arc<RgbImage>,
        timings: &[TimedWord],
        canvas_width: u32,
    ) -> SceneRenderContext {
        let lines = match &self.subtitles {
            Some(subtitles) if !timings.is_empty() => subtitles.layout_lines(timings, canvas_width),
            _ => Vec::new(),
        };

        SceneRenderContext {
            index: scene.index,
            image,
            transition: scene.transition,
            lines,
        }
    }

    /// Repaint `frame` for frame `frame_index` of `total_frames`.
    ///
    /// The frame is only valid until the next call.
    pub fn render_frame(
        &self,
        frame: &mut Frame,
        context: &SceneRenderContext,
        frame_index: usize,
        total_frames: usize,
        scene_elapsed: f64,
        subtitles_enabled: bool,
    ) {
        let progress = if total_frames == 0 {
            0.0
        } else {
            frame_index as f32 / total_frames as f32
        };
        self.transitions
            .compose_frame(frame, &context.image, context.transition, progress);

        if !subtitles_enabled || context.lines.is_empty() {
            return;
        }
        if let Some(subtitles) = &self.subtitles {
            subtitles.draw(frame, &context.lines, scene_elapsed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SubtitleConfig;
    use crate::scene::SceneScript;
    use crate::subtitle::font::test_font::BlockFont;
    use crate::video::ImageSource;
    use image::Rgb;

    const BLUE: [u8; 3] = [20, 40, 200];

    fn composer(with_subtitles: bool) -> SceneFrameComposer {
        let subtitles = with_subtitles.then(|| {
            SubtitleRenderer::new(
                Arc::new(BlockFont),
                SubtitleConfig {
                    font_size: 20.0,
                    side_margin: 0,
                    bottom_margin: 20,
                    backdrop_opacity: 0.0,
                    ..SubtitleConfig::default()
                },
            )
        });
        SceneFrameComposer::new(TransitionRenderer::new(1).unwrap(), subtitles)
    }

    fn scene(index: usize, timings: Vec<TimedWord>) -> Scene {
        Scene::new(
            index,
            SceneScript::new("ab cd", "blue sky"),
            ImageSource::Encoded(Arc::from(Vec::new())),
            None,
            timings,
        )
        .unwrap()
    }

    fn image() -> Arc<RgbImage> {
        Arc::new(RgbImage::from_pixel(10, 10, Rgb(BLUE)))
    }

    fn timings() -> Vec<TimedWord> {
        vec![TimedWord::new("ab", 0.0, 1.0), TimedWord::new("cd", 1.0, 2.0)]
    }

    #[test]
    fn test_background_only_without_subtitles() {
        let composer = composer(true);
        // Scene 2 fades; halfway in the entrance is complete
        let context = composer.prepare(&scene(2, timings()), image(), &timings(), 100);
        let mut frame = Frame::new_black(100, 100);

        composer.render_frame(&mut frame, &context, 30, 60, 1.0, false);
        assert!(frame.as_image().pixels().all(|p| p.0 == BLUE));
    }

    #[test]
    fn test_subtitles_drawn_when_enabled() {
        let composer = composer(true);
        let context = composer.prepare(&scene(0, timings()), image(), &timings(), 100);
        assert_eq!(context.lines.len(), 1);
        let mut frame = Frame::new_black(100, 100);

        composer.render_frame(&mut frame, &context, 15, 60, 0.5, true);
        // Active "ab" in the highlight colour at its glyph position
        assert_eq!(frame.get_pixel(28, 72), SubtitleConfig::default().highlight_color);
        // Top of the frame is untouched background
        assert_eq!(frame.get_pixel(50, 5), frame.get_pixel(60, 5));
    }

    #[test]
    fn test_no_lines_without_timings() {
        let composer = composer(true);
        let context = composer.prepare(&scene(1, Vec::new()), image(), &[], 100);
        assert!(context.lines.is_empty());
        assert_eq!(context.transition, TransitionKind::Slide);
    }

    #[test]
    fn test_first_fade_frame_is_black() {
        let composer = composer(false);
        let context = composer.prepare(&scene(2, timings()), image(), &timings(), 100);
        let mut frame = Frame::new_filled(100, 100, [9, 9, 9]);

        composer.render_frame(&mut frame, &context, 0, 60, 0.0, true);
        assert!(frame.as_rgb_bytes().iter().all(|&b| b == 0));
    }
}
