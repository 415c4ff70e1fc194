use std::io::Cursor;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{DynamicImage, GrayImage, ImageFormat, Rgba, RgbaImage};
use crate::error::Result;

/// Semi-transparent blue used for mask overlays
pub const DEFAULT_MASK_COLOR: [u8; 4] = [0, 120, 255, 128];

/// Renders masks as overlay images: foreground pixels painted a constant
/// colour on a fully transparent background, serialized as PNG.
#[derive(Debug, Clone)]
pub struct MaskArtifactEncoder {
    pub color: [u8; 4],
}

impl Default for MaskArtifactEncoder {
    fn default() -> Self {
        Self { color: DEFAULT_MASK_COLOR }
    }
}

impl MaskArtifactEncoder {
    pub fn new(color: [u8; 4]) -> Self {
        Self { color }
    }

    /// Overlay image with the same dimensions as the mask
    pub fn render(&self, mask: &GrayImage) -> RgbaImage {
        let paint = Rgba(self.color);
        let clear = Rgba([0, 0, 0, 0]);
        RgbaImage::from_fn(mask.width(), mask.height(), |x, y| {
            if mask.get_pixel(x, y)[0] > 0 { paint } else { clear }
        })
    }

    /// PNG bytes of the rendered overlay
    pub fn to_png(&self, mask: &GrayImage) -> Result<Vec<u8>> {
        let mut buffer = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(self.render(mask)).write_to(&mut buffer, ImageFormat::Png)?;
        Ok(buffer.into_inner())
    }

    /// Base64 (standard alphabet, padded) of the PNG overlay
    pub fn encode(&self, mask: &GrayImage) -> Result<String> {
        Ok(STANDARD.encode(self.to_png(mask)?))
    }
}
