//! # Subtitles
//!
//! Karaoke-style captions: timed words are broken into lines once per scene,
//! then for every frame the two-line page holding the spoken word is drawn
//! over a bottom gradient, with the current word enlarged and highlighted.

pub mod font;
pub mod layout;
pub mod render;

pub use font::{FontRasterizer, GlyphBitmap, GlyphRasterizer, TextMeasurer};
pub use layout::{
    active_line_index, layout, select_visible_page, LaidOutWord, SubtitleLine, VisiblePage,
    WordState, LINES_PER_PAGE,
};
pub use render::SubtitleRenderer;
