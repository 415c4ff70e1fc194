pub mod builder;

use image::GrayImage;
use tracing::debug;
use crate::{
    algorithms::geometry::{largest_ring, ring_perimeter},
    error::{MaskError, Result},
    types::MaskPolygon,
    traits::{ImagePreprocessor, ContourExtractor, ShapeSimplifier},
};

/// Polygons with fewer vertices than this are not usable as annotations
pub const DEFAULT_MIN_POLYGON_POINTS: usize = 3;

/// Default simplification factor, in thousandths of the contour perimeter
pub const DEFAULT_EPSILON: f64 = 2.0;

/// Converts a binary mask into a single simplified polygon.
///
/// Only the largest outer contour survives; secondary fragments and holes
/// are dropped. The simplification tolerance is `epsilon * perimeter / 1000`
/// so a fixed epsilon behaves the same on small and large masks. When the
/// simplified ring would fall below `min_points` vertices the unsimplified
/// contour is returned instead.
pub struct MaskPolygonizer {
    preprocessors: Vec<Box<dyn ImagePreprocessor>>,
    contour_extractor: Box<dyn ContourExtractor>,
    simplifier: Box<dyn ShapeSimplifier>,
    min_points: usize,
}

impl MaskPolygonizer {
    /// Create a new polygonizer builder
    pub fn builder() -> builder::PolygonizerBuilder {
        builder::PolygonizerBuilder::new()
    }

    pub fn new(
        preprocessors: Vec<Box<dyn ImagePreprocessor>>,
        contour_extractor: Box<dyn ContourExtractor>,
        simplifier: Box<dyn ShapeSimplifier>,
        min_points: usize,
    ) -> Self {
        Self {
            preprocessors,
            contour_extractor,
            simplifier,
            min_points,
        }
    }

    pub fn min_points(&self) -> usize {
        self.min_points
    }

    /// Convert a mask into its outline polygon and enclosed area.
    pub fn convert(&self, mask: &GrayImage, epsilon: f64) -> Result<MaskPolygon> {
        if !epsilon.is_finite() || epsilon < 0.0 {
            return Err(MaskError::InvalidEpsilon(epsilon));
        }

        let mut binary = mask.clone();
        for preprocessor in &self.preprocessors {
            binary = preprocessor.preprocess(&binary)?;
        }

        let contours = self.contour_extractor.extract_contours(&binary)?;
        let Some((index, area)) = largest_ring(&contours) else {
            return Ok(MaskPolygon::empty());
        };
        let contour = &contours[index];

        let tolerance = epsilon * ring_perimeter(contour) / 1000.0;
        let simplified = self.simplifier.simplify(contour, tolerance)?;

        let points = if simplified.len() < self.min_points {
            debug!(
                simplified = simplified.len(),
                original = contour.len(),
                "simplification degenerated, keeping original contour"
            );
            contour.clone()
        } else {
            simplified
        };

        debug!(
            contours = contours.len(),
            vertices = points.len(),
            area,
            tolerance,
            "mask polygonized"
        );

        Ok(MaskPolygon { points, area })
    }
}

impl Default for MaskPolygonizer {
    fn default() -> Self {
        Self::builder().build()
    }
}
