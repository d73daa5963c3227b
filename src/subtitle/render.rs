use std::sync::Arc;

use super::font::{GlyphBitmap, GlyphRasterizer};
use super::layout::{layout, select_visible_page, SubtitleLine, WordState};
use crate::config::SubtitleConfig;
use crate::timing::TimedWord;
use crate::video::Frame;

/// Shadow colour and strength relative to the word's own opacity
const SHADOW_COLOR: [u8; 3] = [0, 0, 0];
const SHADOW_STRENGTH: f32 = 0.6;

/// Draws paginated karaoke subtitles over a composed frame
pub struct SubtitleRenderer {
    rasterizer: Arc<dyn GlyphRasterizer>,
    config: SubtitleConfig,
}

impl SubtitleRenderer {
    pub fn new(rasterizer: Arc<dyn GlyphRasterizer>, config: SubtitleConfig) -> Self {
        Self { rasterizer, config }
    }

    pub fn config(&self) -> &SubtitleConfig {
        &self.config
    }

    /// Break a scene's timings into lines for a canvas of `canvas_width`
    pub fn layout_lines(&self, timings: &[TimedWord], canvas_width: u32) -> Vec<SubtitleLine> {
        layout(
            timings,
            self.config.max_line_width(canvas_width),
            self.rasterizer.as_ref(),
            self.config.font_size,
        )
    }

    /// Overlay the backdrop and the page visible at `time` (scene seconds)
    pub fn draw(&self, frame: &mut Frame, lines: &[SubtitleLine], time: f64) {
        self.draw_backdrop(frame);

        let page = select_visible_page(lines, time);
        if page.is_empty() {
            return;
        }

        let bottom = frame.height() as f32 - self.config.bottom_margin as f32;
        let advance = self.config.font_size * self.config.line_height;
        let count = page.lines.len();

        for (i, line) in page.lines.iter().enumerate() {
            let baseline = bottom - (count - 1 - i) as f32 * advance;
            self.draw_line(frame, line, baseline, time);
        }
    }

    /// Darken the bottom band of the frame with a gradient that is clear at
    /// its top edge and `backdrop_opacity` at the frame bottom
    fn draw_backdrop(&self, frame: &mut Frame) {
        let height = frame.height();
        let band = (height as f32 * self.config.backdrop_height_ratio).round() as u32;
        if band == 0 || self.config.backdrop_opacity <= 0.0 {
            return;
        }

        let start = height - band.min(height);
        for y in start..height {
            let t = (y - start) as f32 + 0.5;
            frame.darken_row(y, self.config.backdrop_opacity * t / band as f32);
        }
    }

    fn draw_line(&self, frame: &mut Frame, line: &SubtitleLine, baseline: f32, time: f64) {
        let base_px = self.config.font_size;
        let space = self.rasterizer.space_width(base_px);

        let styled: Vec<(WordState, f32, f32)> = line
            .words
            .iter()
            .map(|word| {
                let state = WordState::at(time, &word.timing);
                let px = match state {
                    WordState::Active => base_px * self.config.active_scale,
                    _ => base_px,
                };
                let width = if px == base_px {
                    word.width
                } else {
                    self.rasterizer.word_width(&word.timing.word, px)
                };
                (state, px, width)
            })
            .collect();

        let total: f32 = styled.iter().map(|(_, _, w)| w).sum::<f32>()
            + space * styled.len().saturating_sub(1) as f32;
        let mut pen_x = (frame.width() as f32 - total) / 2.0;

        for (word, (state, px, width)) in line.words.iter().zip(styled) {
            let (color, alpha) = match state {
                WordState::Active => (self.config.highlight_color, 1.0),
                WordState::Past => (self.config.text_color, 1.0),
                WordState::Upcoming => (self.config.text_color, self.config.upcoming_opacity),
            };
            self.draw_word(frame, &word.timing.word, px, pen_x, baseline, color, alpha);
            pen_x += width + space;
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn draw_word(
        &self,
        frame: &mut Frame,
        text: &str,
        px: f32,
        x: f32,
        baseline: f32,
        color: [u8; 3],
        alpha: f32,
    ) {
        let shadow = (px / 24.0).round().max(1.0) as i32;
        let mut pen_x = x;

        for ch in text.chars() {
            let glyph = self.rasterizer.rasterize(ch, px);
            let left = pen_x.round() as i32 + glyph.xmin;
            let top = baseline.round() as i32 - (glyph.height as i32 + glyph.ymin);

            blend_glyph(frame, &glyph, left + shadow, top + shadow, SHADOW_COLOR, alpha * SHADOW_STRENGTH);
            blend_glyph(frame, &glyph, left, top, color, alpha);
            pen_x += glyph.advance;
        }
    }
}

fn blend_glyph(frame: &mut Frame, glyph: &GlyphBitmap, left: i32, top: i32, color: [u8; 3], alpha: f32) {
    if glyph.width == 0 {
        return;
    }
    for (row, coverage) in glyph.coverage.chunks_exact(glyph.width).enumerate() {
        for (col, &c) in coverage.iter().enumerate() {
            if c == 0 {
                continue;
            }
            frame.blend_pixel(
                left + col as i32,
                top + row as i32,
                color,
                alpha * c as f32 / 255.0,
            );
        }
    }
}
