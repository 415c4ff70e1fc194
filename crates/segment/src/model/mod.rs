//! Model backends: the capability traits real models implement, the handle
//! the manager holds, and the loader seam that turns checkpoints into models.

pub mod fallback;
#[cfg(feature = "onnx")]
pub mod onnx;

use std::path::PathBuf;
use std::sync::Arc;

use image::{imageops::FilterType, GrayImage, Luma, RgbImage};

use crate::catalog::ModelDescriptor;
use crate::config::Device;
use crate::error::{Result, SegmentError};
use crate::prompt::BoxPrompt;

pub use fallback::FallbackMaskGenerator;

/// Encoder output for one image.
///
/// Cheap to clone; the tensor is shared between the cache and the session.
/// A model that does all its work at prediction time may hand out an
/// embedding with no tensor, see [`ImageEmbedding::deferred`].
#[derive(Debug, Clone, PartialEq)]
pub struct ImageEmbedding {
    shape: Vec<usize>,
    values: Arc<[f32]>,
    source_size: (u32, u32),
}

impl ImageEmbedding {
    pub fn new(shape: Vec<usize>, values: Vec<f32>, source_size: (u32, u32)) -> Result<Self> {
        let expected: usize = shape.iter().product();
        if expected != values.len() {
            return Err(SegmentError::PredictionFailure(format!(
                "embedding shape {:?} needs {} values, got {}",
                shape,
                expected,
                values.len()
            )));
        }
        Ok(Self {
            shape,
            values: values.into(),
            source_size,
        })
    }

    /// Placeholder for models without a separate encoding step
    pub fn deferred(source_size: (u32, u32)) -> Self {
        Self {
            shape: Vec::new(),
            values: Arc::from(Vec::new()),
            source_size,
        }
    }

    pub fn is_deferred(&self) -> bool {
        self.shape.is_empty()
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// `(width, height)` of the image the embedding was computed from
    pub fn source_size(&self) -> (u32, u32) {
        self.source_size
    }
}

/// One candidate mask with the model's confidence in it
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredMask {
    pub mask: GrayImage,
    pub score: f32,
}

impl ScoredMask {
    pub fn new(mask: GrayImage, score: f32) -> Self {
        Self { mask, score }
    }
}

/// A model that segments from a box prompt with optional points
pub trait BoxCapableModel: Send + Sync {
    /// Run the image encoder
    fn embed(&self, image: &RgbImage) -> Result<ImageEmbedding>;

    /// Candidate masks for `prompt`, in any order
    fn predict(
        &self,
        image: &RgbImage,
        embedding: &ImageEmbedding,
        prompt: &BoxPrompt,
    ) -> Result<Vec<ScoredMask>>;
}

/// A model that additionally segments every instance matching a phrase
pub trait TextCapableModel: BoxCapableModel {
    /// One mask per detected instance, possibly none
    fn predict_text(
        &self,
        image: &RgbImage,
        embedding: &ImageEmbedding,
        text: &str,
    ) -> Result<Vec<ScoredMask>>;
}

/// Whatever currently answers predictions
pub enum LoadedModel {
    Box(Box<dyn BoxCapableModel>),
    Text(Box<dyn TextCapableModel>),
    /// No real model; predictions come from [`FallbackMaskGenerator`]
    Fallback,
}

impl LoadedModel {
    pub fn is_fallback(&self) -> bool {
        matches!(self, LoadedModel::Fallback)
    }

    pub fn supports_text(&self) -> bool {
        matches!(self, LoadedModel::Text(_))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            LoadedModel::Box(_) => "box",
            LoadedModel::Text(_) => "text",
            LoadedModel::Fallback => "fallback",
        }
    }

    /// Encode `image`. The fallback has nothing to encode.
    pub fn embed(&self, image: &RgbImage) -> Result<ImageEmbedding> {
        match self {
            LoadedModel::Box(model) => model.embed(image),
            LoadedModel::Text(model) => model.embed(image),
            LoadedModel::Fallback => Ok(ImageEmbedding::deferred(image.dimensions())),
        }
    }
}

impl std::fmt::Debug for LoadedModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "LoadedModel::{}", self.kind())
    }
}

/// Builds a model from its descriptor and resolved files
pub trait ModelLoader: Send + Sync {
    /// `files` holds the checkpoint followed by its companions, all of
    /// which exist at call time.
    fn load(&self, descriptor: &ModelDescriptor, files: &[PathBuf], device: Device) -> Result<LoadedModel>;
}

/// Loader used when no inference backend is compiled in.
///
/// Every load fails, which leaves the manager in fallback mode.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoBackendLoader;

impl ModelLoader for NoBackendLoader {
    fn load(&self, descriptor: &ModelDescriptor, _files: &[PathBuf], _device: Device) -> Result<LoadedModel> {
        Err(SegmentError::ModelLoadFailure {
            id: descriptor.id.clone(),
            reason: "no inference backend compiled in (enable the `onnx` feature)".into(),
        })
    }
}

/// The best loader this build offers
pub fn default_loader() -> Box<dyn ModelLoader> {
    #[cfg(feature = "onnx")]
    {
        Box::new(onnx::OnnxSamLoader::default())
    }
    #[cfg(not(feature = "onnx"))]
    {
        Box::new(NoBackendLoader)
    }
}

/// Bring a mask to `width` x `height` and back to strictly 0/255 values
pub fn conform_mask(mask: GrayImage, width: u32, height: u32) -> GrayImage {
    let resized = if mask.dimensions() == (width, height) {
        mask
    } else {
        image::imageops::resize(&mask, width, height, FilterType::Triangle)
    };

    let mut binary = resized;
    for pixel in binary.pixels_mut() {
        *pixel = if pixel[0] >= 128 { Luma([255]) } else { Luma([0]) };
    }
    binary
}

/// Index of the highest scoring candidate; the first one wins ties
pub fn best_candidate(candidates: &[ScoredMask]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (index, candidate) in candidates.iter().enumerate() {
        match best {
            Some((_, score)) if candidate.score <= score => {}
            _ => best = Some((index, candidate.score)),
        }
    }
    best.map(|(index, _)| index)
}
