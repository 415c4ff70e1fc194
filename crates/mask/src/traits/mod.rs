use image::GrayImage;
use crate::error::Result;

/// Trait for mask preprocessing algorithms
pub trait ImagePreprocessor: Send + Sync {
    /// Preprocess the input mask (e.g., binarize)
    fn preprocess(&self, image: &GrayImage) -> Result<GrayImage>;
}

/// Trait for contour extraction algorithms
pub trait ContourExtractor: Send + Sync {
    /// Extract the outermost contours of a binary mask, in encounter order.
    /// Each contour is an open ring of pixel coordinates.
    fn extract_contours(&self, image: &GrayImage) -> Result<Vec<Vec<[f32; 2]>>>;
}

/// Trait for ring simplification algorithms
pub trait ShapeSimplifier: Send + Sync {
    /// Reduce the point count of an open ring within `tolerance` pixels
    fn simplify(&self, ring: &[[f32; 2]], tolerance: f64) -> Result<Vec<[f32; 2]>>;
}
