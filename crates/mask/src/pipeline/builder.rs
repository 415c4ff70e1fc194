use crate::{
    pipeline::{MaskPolygonizer, DEFAULT_MIN_POLYGON_POINTS},
    traits::{ImagePreprocessor, ContourExtractor, ShapeSimplifier},
    algorithms::{
        ImageprocContourExtractor,
        ThresholdPreprocessor,
        DouglasPeuckerSimplifier,
    },
};

/// Builder for creating polygonizers with a fluent API
pub struct PolygonizerBuilder {
    preprocessors: Vec<Box<dyn ImagePreprocessor>>,
    contour_extractor: Option<Box<dyn ContourExtractor>>,
    simplifier: Option<Box<dyn ShapeSimplifier>>,
    min_points: usize,
}

impl PolygonizerBuilder {
    /// Create a new polygonizer builder
    pub fn new() -> Self {
        Self {
            preprocessors: Vec::new(),
            contour_extractor: None,
            simplifier: None,
            min_points: DEFAULT_MIN_POLYGON_POINTS,
        }
    }

    /// Add a preprocessor, applied before contour extraction
    pub fn add_preprocessor<P>(mut self, preprocessor: P) -> Self
    where
        P: ImagePreprocessor + 'static,
    {
        self.preprocessors.push(Box::new(preprocessor));
        self
    }

    /// Set the contour extractor (replaces any existing one)
    pub fn set_contour_extractor<E>(mut self, extractor: E) -> Self
    where
        E: ContourExtractor + 'static,
    {
        self.contour_extractor = Some(Box::new(extractor));
        self
    }

    /// Set the simplifier (replaces any existing one)
    pub fn set_simplifier<S>(mut self, simplifier: S) -> Self
    where
        S: ShapeSimplifier + 'static,
    {
        self.simplifier = Some(Box::new(simplifier));
        self
    }

    /// Minimum vertex count a simplified polygon must keep
    pub fn min_polygon_points(mut self, min_points: usize) -> Self {
        self.min_points = min_points;
        self
    }

    /// Build the polygonizer with default components if not specified.
    /// Without an explicit preprocessor the mask is binarized so that any
    /// non-zero pixel is foreground.
    pub fn build(self) -> MaskPolygonizer {
        let preprocessors = if self.preprocessors.is_empty() {
            vec![Box::new(ThresholdPreprocessor::default()) as Box<dyn ImagePreprocessor>]
        } else {
            self.preprocessors
        };

        let contour_extractor = self.contour_extractor
            .unwrap_or_else(|| Box::new(ImageprocContourExtractor));

        let simplifier = self.simplifier
            .unwrap_or_else(|| Box::new(DouglasPeuckerSimplifier));

        MaskPolygonizer::new(preprocessors, contour_extractor, simplifier, self.min_points)
    }
}

impl Default for PolygonizerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
