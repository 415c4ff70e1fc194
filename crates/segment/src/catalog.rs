//! Registry of known model variants and their on-disk availability.

use std::path::{Path, PathBuf};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SegmentError};

/// Static description of a model variant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ModelDescriptor {
    pub id: String,
    pub name: String,
    /// Human readable checkpoint size, e.g. "149 MB"
    pub size: String,
    pub description: String,
    /// Checkpoint file, relative to the models directory
    pub checkpoint: String,
    /// Additional files the backend needs next to the checkpoint
    #[serde(default)]
    pub companions: Vec<String>,
    #[serde(default)]
    pub supports_text_prompt: bool,
    #[serde(default = "default_true")]
    pub supports_box_prompt: bool,
}

fn default_true() -> bool {
    true
}

impl ModelDescriptor {
    pub fn capabilities(&self) -> ModelCapabilities {
        ModelCapabilities {
            text_prompt: self.supports_text_prompt,
            box_prompt: self.supports_box_prompt,
        }
    }
}

/// Prompt modalities a model accepts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ModelCapabilities {
    pub text_prompt: bool,
    pub box_prompt: bool,
}

/// A descriptor together with its status at query time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, JsonSchema)]
pub struct ModelEntry {
    #[serde(flatten)]
    pub descriptor: ModelDescriptor,
    pub is_available: bool,
    pub is_loaded: bool,
}

fn descriptor(
    id: &str,
    name: &str,
    size: &str,
    description: &str,
    checkpoint: &str,
    companions: &[&str],
    supports_text_prompt: bool,
) -> ModelDescriptor {
    ModelDescriptor {
        id: id.to_string(),
        name: name.to_string(),
        size: size.to_string(),
        description: description.to_string(),
        checkpoint: checkpoint.to_string(),
        companions: companions.iter().map(|c| c.to_string()).collect(),
        supports_text_prompt,
        supports_box_prompt: true,
    }
}

/// The model variants shipped by default
pub fn builtin_models() -> Vec<ModelDescriptor> {
    vec![
        descriptor(
            "sam3",
            "SAM3",
            "3.3 GB",
            "Best accuracy with text prompt support",
            "sam3.pt",
            &[],
            true,
        ),
        descriptor(
            "sam2_tiny",
            "SAM2 Hiera Tiny",
            "149 MB",
            "Fastest model, good for quick annotations",
            "sam2_hiera_tiny.encoder.onnx",
            &["sam2_hiera_tiny.decoder.onnx"],
            false,
        ),
        descriptor(
            "sam2_small",
            "SAM2 Hiera Small",
            "176 MB",
            "Balanced speed and accuracy",
            "sam2_hiera_small.encoder.onnx",
            &["sam2_hiera_small.decoder.onnx"],
            false,
        ),
        descriptor(
            "sam2_base_plus",
            "SAM2 Hiera Base+",
            "309 MB",
            "Better accuracy, moderate speed",
            "sam2_hiera_base_plus.encoder.onnx",
            &["sam2_hiera_base_plus.decoder.onnx"],
            false,
        ),
        descriptor(
            "sam2_large",
            "SAM2 Hiera Large",
            "857 MB",
            "Best SAM2 accuracy, slower inference",
            "sam2_hiera_large.encoder.onnx",
            &["sam2_hiera_large.decoder.onnx"],
            false,
        ),
    ]
}

/// Queryable model registry rooted at a models directory.
///
/// Availability is checked against the filesystem on every query, since
/// checkpoints may be added or removed while the service runs.
#[derive(Debug, Clone)]
pub struct ModelCatalog {
    models_dir: PathBuf,
    descriptors: Vec<ModelDescriptor>,
}

impl ModelCatalog {
    pub fn new(models_dir: impl Into<PathBuf>, descriptors: Vec<ModelDescriptor>) -> Self {
        Self {
            models_dir: models_dir.into(),
            descriptors,
        }
    }

    /// Built-in descriptors resolved against `models_dir`
    pub fn builtin(models_dir: impl Into<PathBuf>) -> Self {
        Self::new(models_dir, builtin_models())
    }

    pub fn models_dir(&self) -> &Path {
        &self.models_dir
    }

    pub fn descriptors(&self) -> &[ModelDescriptor] {
        &self.descriptors
    }

    /// Every known model with its current availability
    pub fn list(&self) -> Vec<ModelEntry> {
        self.descriptors
            .iter()
            .map(|descriptor| ModelEntry {
                descriptor: descriptor.clone(),
                is_available: self.is_available(descriptor),
                is_loaded: false,
            })
            .collect()
    }

    /// Only the models whose files are all present
    pub fn available(&self) -> Vec<ModelEntry> {
        self.list().into_iter().filter(|entry| entry.is_available).collect()
    }

    pub fn describe(&self, id: &str) -> Result<&ModelDescriptor> {
        self.descriptors
            .iter()
            .find(|descriptor| descriptor.id == id)
            .ok_or_else(|| SegmentError::ModelNotFound { id: id.to_string() })
    }

    pub fn checkpoint_path(&self, descriptor: &ModelDescriptor) -> PathBuf {
        self.models_dir.join(&descriptor.checkpoint)
    }

    /// Checkpoint followed by its companions
    pub fn files(&self, descriptor: &ModelDescriptor) -> Vec<PathBuf> {
        std::iter::once(&descriptor.checkpoint)
            .chain(&descriptor.companions)
            .map(|file| self.models_dir.join(file))
            .collect()
    }

    pub fn is_available(&self, descriptor: &ModelDescriptor) -> bool {
        self.missing_file(descriptor).is_none()
    }

    fn missing_file(&self, descriptor: &ModelDescriptor) -> Option<PathBuf> {
        self.files(descriptor).into_iter().find(|path| !path.is_file())
    }

    /// Resolve an id to a descriptor whose files are all on disk
    pub fn require_available(&self, id: &str) -> Result<&ModelDescriptor> {
        let descriptor = self.describe(id)?;
        match self.missing_file(descriptor) {
            Some(path) => Err(SegmentError::ModelUnavailable { id: id.to_string(), path }),
            None => Ok(descriptor),
        }
    }
}
