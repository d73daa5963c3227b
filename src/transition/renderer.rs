use image::RgbImage;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

use super::TransitionKind;
use crate::error::{CompositorError, Result};
use crate::video::Frame;

/// Final zoom factor reached at the end of a zoom scene
const ZOOM_AMOUNT: f32 = 0.15;

/// Where and how opaque the scene image is drawn for one frame, in canvas
/// pixels. The rectangle may extend past the canvas; the overflow is cropped.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawTransform {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub opacity: f32,
}

pub fn ease_out_cubic(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    1.0 - (1.0 - t).powi(3)
}

/// Cover-fit rectangle: the image scaled uniformly until it covers the
/// canvas, centred on the overflowing axis.
fn cover_fit(image: (u32, u32), canvas: (u32, u32)) -> DrawTransform {
    let (iw, ih) = (image.0.max(1) as f32, image.1.max(1) as f32);
    let (cw, ch) = (canvas.0 as f32, canvas.1 as f32);
    let scale = (cw / iw).max(ch / ih);
    let (width, height) = (iw * scale, ih * scale);

    DrawTransform {
        x: (cw - width) / 2.0,
        y: (ch - height) / 2.0,
        width,
        height,
        opacity: 1.0,
    }
}

/// Draw transform for `kind` at scene-local `progress` (clamped to [0, 1])
pub fn compute_transform(
    image: (u32, u32),
    canvas: (u32, u32),
    kind: TransitionKind,
    progress: f32,
) -> DrawTransform {
    let progress = if progress.is_finite() { progress.clamp(0.0, 1.0) } else { 0.0 };
    let fit = cover_fit(image, canvas);
    // Slide and fade finish in the first half of the scene, then hold
    let entrance = ease_out_cubic((progress * 2.0).min(1.0));

    match kind {
        TransitionKind::Zoom => {
            let scale = 1.0 + progress * ZOOM_AMOUNT;
            let (cx, cy) = (canvas.0 as f32 / 2.0, canvas.1 as f32 / 2.0);
            DrawTransform {
                x: cx + (fit.x - cx) * scale,
                y: cy + (fit.y - cy) * scale,
                width: fit.width * scale,
                height: fit.height * scale,
                opacity: 1.0,
            }
        }
        TransitionKind::Slide => DrawTransform {
            x: fit.x + canvas.0 as f32 * (1.0 - entrance),
            ..fit
        },
        TransitionKind::Fade => DrawTransform {
            opacity: entrance,
            ..fit
        },
        TransitionKind::None => fit,
    }
}

/// One bilinear tap along an axis: the two source indices and the weight of
/// the second
#[derive(Clone, Copy)]
struct Tap {
    lo: usize,
    hi: usize,
    frac: f32,
}

/// Source taps for every destination pixel along one axis; `None` where the
/// destination pixel lies outside the drawn rectangle
fn axis_taps(dest_len: u32, origin: f32, extent: f32, src_len: u32) -> Vec<Option<Tap>> {
    let max = src_len.saturating_sub(1) as f32;
    (0..dest_len)
        .map(|d| {
            let centre = d as f32 + 0.5;
            if extent <= 0.0 || centre < origin || centre >= origin + extent {
                return None;
            }
            let s = ((centre - origin) / extent * src_len as f32 - 0.5).clamp(0.0, max);
            let lo = s.floor();
            Some(Tap {
                lo: lo as usize,
                hi: (lo + 1.0).min(max) as usize,
                frac: s - lo,
            })
        })
        .collect()
}

/// Paints scene images into output frames
pub struct TransitionRenderer {
    pool: ThreadPool,
}

impl TransitionRenderer {
    /// Create a renderer painting each frame with `threads` worker threads
    pub fn new(threads: usize) -> Result<Self> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads.max(1))
            .thread_name(|i| format!("frame-paint-{i}"))
            .build()
            .map_err(|e| CompositorError::generic(format!("failed to build paint pool: {e}")))?;
        Ok(Self { pool })
    }

    /// Clear `frame` to black and draw `image` with `kind` at `progress`
    pub fn compose_frame(
        &self,
        frame: &mut Frame,
        image: &RgbImage,
        kind: TransitionKind,
        progress: f32,
    ) -> DrawTransform {
        let transform = compute_transform(
            image.dimensions(),
            (frame.width(), frame.height()),
            kind,
            progress,
        );
        self.paint(frame, image, &transform);
        transform
    }

    /// Draw `image` into `frame` at `transform`, over black
    pub fn paint(&self, frame: &mut Frame, image: &RgbImage, transform: &DrawTransform) {
        let (width, height) = (frame.width(), frame.height());
        let (iw, ih) = image.dimensions();
        let columns = axis_taps(width, transform.x, transform.width, iw);
        let rows = axis_taps(height, transform.y, transform.height, ih);
        let opacity = transform.opacity.clamp(0.0, 1.0);
        let src = image.as_raw();
        let src_stride = iw as usize * 3;
        let row_bytes = width as usize * 3;

        let fetch = |x: usize, y: usize, c: usize| src[y * src_stride + x * 3 + c] as f32;

        self.pool.install(|| {
            frame
                .as_rgb_bytes_mut()
                .par_chunks_mut(row_bytes)
                .zip(rows.par_iter())
                .for_each(|(row, tap_y)| {
                    let Some(ty) = tap_y.filter(|_| opacity > 0.0) else {
                        row.fill(0);
                        return;
                    };
                    for (pixel, tap_x) in row.chunks_exact_mut(3).zip(&columns) {
                        let Some(tx) = tap_x else {
                            pixel.fill(0);
                            continue;
                        };
                        for (c, out) in pixel.iter_mut().enumerate() {
                            let top = fetch(tx.lo, ty.lo, c) * (1.0 - tx.frac)
                                + fetch(tx.hi, ty.lo, c) * tx.frac;
                            let bottom = fetch(tx.lo, ty.hi, c) * (1.0 - tx.frac)
                                + fetch(tx.hi, ty.hi, c) * tx.frac;
                            let value = top * (1.0 - ty.frac) + bottom * ty.frac;
                            *out = (value * opacity).round().clamp(0.0, 255.0) as u8;
                        }
                    }
                });
        });
    }
}
