use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SegmentError {
    #[error("Model not found: {id}")]
    ModelNotFound { id: String },

    #[error("Model not available: {id}. Checkpoint file not found at {}", path.display())]
    ModelUnavailable { id: String, path: PathBuf },

    #[error("Failed to load model {id}: {reason}")]
    ModelLoadFailure { id: String, reason: String },

    /// Inference was requested before any image was set on the session.
    /// This is a caller bug, not a user error.
    #[error("No image has been embedded for inference")]
    ImageNotEmbedded,

    #[error("Prediction failed: {0}")]
    PredictionFailure(String),

    #[error("Invalid prompt: {0}")]
    InvalidPrompt(String),

    #[error("Text prompts are not supported by model {model}")]
    TextPromptUnsupported { model: String },

    #[error("Mask processing error: {0}")]
    Mask(#[from] mask::MaskError),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    TomlDe(#[from] toml::de::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("Background task failed: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, SegmentError>;
