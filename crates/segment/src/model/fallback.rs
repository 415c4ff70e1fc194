use image::{GrayImage, Luma};

use super::ScoredMask;
use crate::prompt::BoxPrompt;

pub const DEFAULT_FALLBACK_SCORE: f32 = 0.95;
pub const DEFAULT_POINT_RADIUS: u32 = 20;

/// Deterministic stand-in for a model, used when none could be loaded.
///
/// Draws the ellipse inscribed in the box, then stamps a disk of
/// foreground at every positive point and a disk of background at every
/// negative point. Coordinates are truncated to whole pixels and the
/// ellipse axes are half the box sides, rounded down. A box with no width
/// or no height contributes nothing. Shapes are clipped to the mask, so
/// prompts far outside the image cost no more than ones inside it.
#[derive(Debug, Clone, PartialEq)]
pub struct FallbackMaskGenerator {
    pub score: f32,
    pub point_radius: u32,
}

impl Default for FallbackMaskGenerator {
    fn default() -> Self {
        Self {
            score: DEFAULT_FALLBACK_SCORE,
            point_radius: DEFAULT_POINT_RADIUS,
        }
    }
}

impl FallbackMaskGenerator {
    pub fn new(score: f32, point_radius: u32) -> Self {
        Self { score, point_radius }
    }

    pub fn generate(&self, width: u32, height: u32, prompt: &BoxPrompt) -> ScoredMask {
        let mut mask = GrayImage::new(width, height);

        let [x_min, y_min, x_max, y_max] = prompt.bbox.map(|v| v.trunc() as f64);
        let center = (((x_min + x_max) / 2.0).floor(), ((y_min + y_max) / 2.0).floor());
        let axes = (((x_max - x_min) / 2.0).floor(), ((y_max - y_min) / 2.0).floor());
        if axes.0 > 0.0 && axes.1 > 0.0 {
            fill_ellipse(&mut mask, center, axes, Luma([255u8]));
        }

        let radius = self.point_radius as f64;
        for [x, y] in &prompt.positive {
            fill_ellipse(&mut mask, (x.trunc() as f64, y.trunc() as f64), (radius, radius), Luma([255u8]));
        }
        for [x, y] in &prompt.negative {
            fill_ellipse(&mut mask, (x.trunc() as f64, y.trunc() as f64), (radius, radius), Luma([0u8]));
        }

        ScoredMask::new(mask, self.score)
    }
}

/// Scanline fill of the axis-aligned ellipse, restricted to rows and
/// columns inside `mask`. Zero axes draw a single pixel or line.
fn fill_ellipse(mask: &mut GrayImage, (cx, cy): (f64, f64), (a, b): (f64, f64), value: Luma<u8>) {
    let (width, height) = mask.dimensions();
    if width == 0 || height == 0 || !(a >= 0.0 && b >= 0.0) {
        return;
    }

    let top = (cy - b).ceil().max(0.0);
    let bottom = (cy + b).floor().min(height as f64 - 1.0);
    if !(top <= bottom) {
        return;
    }

    for y in top as u32..=bottom as u32 {
        let dy = y as f64 - cy;
        let span = if b > 0.0 {
            a * (1.0 - (dy / b).powi(2)).max(0.0).sqrt()
        } else {
            a
        };

        let left = (cx - span).ceil().max(0.0);
        let right = (cx + span).floor().min(width as f64 - 1.0);
        if !(left <= right) {
            continue;
        }
        for x in left as u32..=right as u32 {
            mask.put_pixel(x, y, value);
        }
    }
}
