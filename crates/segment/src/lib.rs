//! # Segment
//!
//! Interactive segmentation core: a single active SAM-style model behind a
//! lock, an LRU cache of image embeddings, and a pipeline that turns box,
//! point, or text prompts into polygons via the [`mask`] crate.
//!
//! When no model can be loaded the service keeps answering with
//! deterministic placeholder masks, so it stays usable without weights.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use segment::{BoxPrompt, SegmentConfig, SegmentationService};
//!
//! # async fn run() -> segment::Result<()> {
//! let config = SegmentConfig::default().with_env_overrides()?;
//! let service = SegmentationService::from_config(&config).await?;
//!
//! let image = Arc::new(image::RgbImage::new(640, 480));
//! let prompt = BoxPrompt::new([100.0, 80.0, 300.0, 260.0]).with_positive([200.0, 170.0]);
//! let result = service.predict(image, "frame-0001", prompt, 2.0, false).await?;
//! println!("{} vertices, area {}", result.polygon.len(), result.area);
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod catalog;
pub mod config;
pub mod error;
pub mod manager;
pub mod model;
pub mod pipeline;
pub mod prompt;
pub mod result;
pub mod service;

pub use cache::{ResultCache, DEFAULT_CACHE_SIZE};
pub use catalog::{builtin_models, ModelCapabilities, ModelCatalog, ModelDescriptor, ModelEntry};
pub use config::{Device, SegmentConfig};
pub use error::{Result, SegmentError};
pub use manager::{ActiveModelState, ModelManager, ModelSession, SwitchOutcome};
pub use model::{
    default_loader, BoxCapableModel, FallbackMaskGenerator, ImageEmbedding, LoadedModel, ModelLoader,
    NoBackendLoader, ScoredMask, TextCapableModel,
};
pub use pipeline::PredictionPipeline;
pub use prompt::{BoxPrompt, Prompt, PromptInput};
pub use result::{ModelPhase, PredictionOutput, PredictionRequest, PredictionResult, ServiceStatus};
pub use service::SegmentationService;
