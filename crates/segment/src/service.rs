use std::sync::Arc;

use image::RgbImage;
use tokio::task;
use tracing::{info, warn};

use crate::catalog::ModelEntry;
use crate::config::SegmentConfig;
use crate::error::{Result, SegmentError};
use crate::manager::SwitchOutcome;
use crate::model::{default_loader, ModelLoader};
use crate::pipeline::PredictionPipeline;
use crate::prompt::BoxPrompt;
use crate::result::{PredictionOutput, PredictionRequest, PredictionResult, ServiceStatus};

/// Async front of the prediction core.
///
/// Model work is blocking, so every call that may touch the model runs on
/// tokio's blocking pool. Clones share the same model and cache.
#[derive(Clone)]
pub struct SegmentationService {
    pipeline: Arc<PredictionPipeline>,
}

impl SegmentationService {
    pub fn new(pipeline: PredictionPipeline) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
        }
    }

    /// Build from configuration with the default loader and try to load the
    /// configured default model. Failing to do so leaves the service running
    /// on fallback masks.
    pub async fn from_config(config: &SegmentConfig) -> Result<Self> {
        Self::with_loader(config, default_loader()).await
    }

    pub async fn with_loader(config: &SegmentConfig, loader: Box<dyn ModelLoader>) -> Result<Self> {
        config.validate()?;
        let service = Self::new(PredictionPipeline::from_config(config, loader));

        match service.switch_model(&config.default_model).await {
            Ok(outcome) => info!(?outcome, "startup model selected"),
            Err(err @ (SegmentError::ModelNotFound { .. } | SegmentError::ModelUnavailable { .. })) => {
                warn!(error = %err, "default model not loaded, serving fallback masks");
            }
            Err(err) => return Err(err),
        }

        Ok(service)
    }

    pub fn pipeline(&self) -> &PredictionPipeline {
        &self.pipeline
    }

    async fn blocking<T, F>(&self, work: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&PredictionPipeline) -> Result<T> + Send + 'static,
    {
        let pipeline = Arc::clone(&self.pipeline);
        task::spawn_blocking(move || work(&pipeline)).await?
    }

    /// Only models whose files are present, unless `include_unavailable`
    pub fn list_models(&self, include_unavailable: bool) -> Vec<ModelEntry> {
        self.pipeline.manager().list_models(include_unavailable)
    }

    /// Waits for in-flight predictions before releasing the old model
    pub async fn switch_model(&self, model_id: &str) -> Result<SwitchOutcome> {
        let model_id = model_id.to_string();
        self.blocking(move |pipeline| pipeline.manager().switch(&model_id)).await
    }

    pub async fn predict(
        &self,
        image: Arc<RgbImage>,
        image_id: impl Into<String>,
        prompt: BoxPrompt,
        epsilon: f64,
        want_mask: bool,
    ) -> Result<PredictionResult> {
        let image_id = image_id.into();
        self.blocking(move |pipeline| pipeline.predict(&image, &image_id, &prompt, epsilon, want_mask))
            .await
    }

    pub async fn predict_text(
        &self,
        image: Arc<RgbImage>,
        image_id: impl Into<String>,
        text: impl Into<String>,
        epsilon: f64,
    ) -> Result<Vec<PredictionResult>> {
        let image_id = image_id.into();
        let text = text.into();
        self.blocking(move |pipeline| pipeline.predict_text(&image, &image_id, &text, epsilon))
            .await
    }

    pub async fn handle(&self, image: Arc<RgbImage>, request: PredictionRequest) -> Result<PredictionOutput> {
        self.blocking(move |pipeline| pipeline.handle(&image, request)).await
    }

    pub fn status(&self) -> ServiceStatus {
        self.pipeline.manager().status()
    }

    pub async fn clear_cache(&self) -> Result<()> {
        self.blocking(|pipeline| {
            pipeline.manager().clear_cache();
            Ok(())
        })
        .await
    }
}
