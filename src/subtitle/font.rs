use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use fontdue::{Font, FontSettings};
use tracing::debug;

use crate::error::{AssetError, Result};

/// Bold sans fonts commonly present on Linux, macOS and Windows installs
const SYSTEM_FONTS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/TTF/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Bold.ttf",
    "/usr/share/fonts/liberation/LiberationSans-Bold.ttf",
    "/System/Library/Fonts/Supplemental/Arial Bold.ttf",
    "/Library/Fonts/Arial Bold.ttf",
    "C:\\Windows\\Fonts\\arialbd.ttf",
];

/// Measures rendered text width, used for line breaking
pub trait TextMeasurer {
    /// Advance width in pixels of `word` set at `px`
    fn word_width(&self, word: &str, px: f32) -> f32;

    /// Advance of a single space at `px`
    fn space_width(&self, px: f32) -> f32 {
        self.word_width(" ", px)
    }
}

/// A rasterised glyph: coverage bitmap plus placement relative to the pen
/// position on the baseline (y grows upwards, as fontdue reports it)
#[derive(Debug, Clone, Default)]
pub struct GlyphBitmap {
    pub width: usize,
    pub height: usize,
    pub xmin: i32,
    pub ymin: i32,
    pub advance: f32,
    /// Row-major coverage, top row first, 0-255
    pub coverage: Vec<u8>,
}

/// Produces glyph bitmaps for subtitle rendering
pub trait GlyphRasterizer: TextMeasurer + Send + Sync {
    fn rasterize(&self, ch: char, px: f32) -> Arc<GlyphBitmap>;
}

/// fontdue-backed rasteriser with a glyph cache keyed by character and size
pub struct FontRasterizer {
    font: Font,
    cache: Mutex<HashMap<(char, u32), Arc<GlyphBitmap>>>,
}

impl FontRasterizer {
    /// Parse a font from raw TTF/OTF bytes
    pub fn from_bytes(bytes: Vec<u8>, label: &str) -> Result<Self> {
        let font = Font::from_bytes(bytes, FontSettings::default()).map_err(|reason| {
            AssetError::FontParseFailed {
                path: label.to_string(),
                reason: reason.to_string(),
            }
        })?;
        Ok(Self {
            font,
            cache: Mutex::new(HashMap::new()),
        })
    }

    /// Load the configured font, or the first system font found when none is
    /// configured
    pub fn load(font_path: Option<&Path>) -> Result<Self> {
        let candidates: Vec<PathBuf> = match font_path {
            Some(path) => vec![path.to_path_buf()],
            None => SYSTEM_FONTS.iter().map(PathBuf::from).collect(),
        };

        for candidate in &candidates {
            if let Ok(bytes) = std::fs::read(candidate) {
                debug!("Using subtitle font {}", candidate.display());
                return Self::from_bytes(bytes, &candidate.display().to_string());
            }
        }

        let tried = candidates
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(", ");
        Err(AssetError::FontNotFound { tried }.into())
    }
}

impl TextMeasurer for FontRasterizer {
    fn word_width(&self, word: &str, px: f32) -> f32 {
        word.chars()
            .map(|ch| self.font.metrics(ch, px).advance_width)
            .sum()
    }
}

impl GlyphRasterizer for FontRasterizer {
    fn rasterize(&self, ch: char, px: f32) -> Arc<GlyphBitmap> {
        let key = (ch, px.to_bits());
        if let Ok(cache) = self.cache.lock() {
            if let Some(glyph) = cache.get(&key) {
                return Arc::clone(glyph);
            }
        }

        let (metrics, coverage) = self.font.rasterize(ch, px);
        let glyph = Arc::new(GlyphBitmap {
            width: metrics.width,
            height: metrics.height,
            xmin: metrics.xmin,
            ymin: metrics.ymin,
            advance: metrics.advance_width,
            coverage,
        });

        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(key, Arc::clone(&glyph));
        }
        glyph
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_configured_font() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing.ttf");

        match FontRasterizer::load(Some(&path)) {
            Err(crate::error::CompositorError::Asset(AssetError::FontNotFound { tried })) => {
                assert!(tried.contains("missing.ttf"));
            }
            Err(other) => panic!("Expected FontNotFound, got {other}"),
            Ok(_) => panic!("Expected FontNotFound"),
        }
    }

    #[test]
    fn test_garbage_font_bytes() {
        let result = FontRasterizer::from_bytes(b"definitely not a font".to_vec(), "inline");
        assert!(matches!(
            result,
            Err(crate::error::CompositorError::Asset(AssetError::FontParseFailed { .. }))
        ));
    }

    #[test]
    fn test_block_font_measures_chars() {
        let font = test_font::BlockFont;
        assert_eq!(font.word_width("abcd", 20.0), 40.0);
        assert_eq!(font.space_width(20.0), 10.0);
        assert!(font.rasterize(' ', 20.0).coverage.is_empty());
    }
}
