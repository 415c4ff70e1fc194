use image::GrayImage;
use crate::{error::Result, traits::ImagePreprocessor};

/// Thresholding preprocessor: pixels strictly above `threshold` become 255,
/// everything else 0.
#[derive(Debug, Clone)]
pub struct ThresholdPreprocessor {
    pub threshold: u8,
}

impl Default for ThresholdPreprocessor {
    /// Any non-zero pixel is foreground.
    fn default() -> Self {
        Self { threshold: 0 }
    }
}

impl ImagePreprocessor for ThresholdPreprocessor {
    fn preprocess(&self, image: &GrayImage) -> Result<GrayImage> {
        Ok(imageproc::contrast::threshold(image, self.threshold))
    }
}
