use image::RgbImage;
use parking_lot::{Mutex, MutexGuard, RwLock};
use tracing::{debug, info, warn};

use crate::cache::ResultCache;
use crate::catalog::{ModelCapabilities, ModelCatalog, ModelEntry};
use crate::config::{Device, SegmentConfig};
use crate::error::{Result, SegmentError};
use crate::model::{
    best_candidate, conform_mask, FallbackMaskGenerator, ImageEmbedding, LoadedModel, ModelLoader,
    ScoredMask,
};
use crate::prompt::BoxPrompt;
use crate::result::{ModelPhase, ServiceStatus};

/// Published view of the active model, readable without waiting on inference
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveModelState {
    pub model_id: Option<String>,
    pub device: Device,
    pub capabilities: ModelCapabilities,
    pub phase: ModelPhase,
}

/// Result of a switch whose target id was valid
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwitchOutcome {
    Loaded { model_id: String },
    /// Loading failed; the fallback generator now answers predictions
    Degraded { model_id: String, reason: String },
}

impl SwitchOutcome {
    pub fn is_loaded(&self) -> bool {
        matches!(self, SwitchOutcome::Loaded { .. })
    }
}

struct SessionState {
    model: LoadedModel,
    model_id: Option<String>,
    capabilities: ModelCapabilities,
    current_image: Option<(String, ImageEmbedding)>,
}

/// Owns the single active model and the per-image embedding cache.
///
/// Inference and switching serialize on one session lock. The cache has its
/// own lock, always taken after the session lock. Status reads go to a
/// separate snapshot and never block behind a running inference.
pub struct ModelManager {
    catalog: ModelCatalog,
    loader: Box<dyn ModelLoader>,
    device: Device,
    fallback: FallbackMaskGenerator,
    session: Mutex<SessionState>,
    cache: Mutex<ResultCache<String, ImageEmbedding>>,
    published: RwLock<ActiveModelState>,
}

impl ModelManager {
    /// A manager with no model loaded
    pub fn new(catalog: ModelCatalog, loader: Box<dyn ModelLoader>, device: Device, cache_size: usize) -> Self {
        Self {
            catalog,
            loader,
            device,
            fallback: FallbackMaskGenerator::default(),
            session: Mutex::new(SessionState {
                model: LoadedModel::Fallback,
                model_id: None,
                capabilities: ModelCapabilities::default(),
                current_image: None,
            }),
            cache: Mutex::new(ResultCache::new(cache_size)),
            published: RwLock::new(ActiveModelState {
                model_id: None,
                device,
                capabilities: ModelCapabilities::default(),
                phase: ModelPhase::Unloaded,
            }),
        }
    }

    pub fn from_config(config: &SegmentConfig, loader: Box<dyn ModelLoader>) -> Self {
        let catalog = ModelCatalog::new(&config.models_dir, config.models.clone());
        Self::new(catalog, loader, config.device, config.cache_size).with_fallback(FallbackMaskGenerator::new(
            config.fallback_score,
            config.fallback_point_radius,
        ))
    }

    pub fn with_fallback(mut self, fallback: FallbackMaskGenerator) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn catalog(&self) -> &ModelCatalog {
        &self.catalog
    }

    pub fn device(&self) -> Device {
        self.device
    }

    /// Replace the active model.
    ///
    /// Unknown or unavailable ids are rejected before anything changes.
    /// Otherwise the current handle is released and the cache dropped
    /// before the new model is acquired, so two models are never resident
    /// together. A failed acquisition is not an error: the manager degrades
    /// to the fallback generator and says so in the outcome.
    pub fn switch(&self, model_id: &str) -> Result<SwitchOutcome> {
        let descriptor = self.catalog.require_available(model_id)?.clone();
        let files = self.catalog.files(&descriptor);

        let mut session = self.session.lock();

        let previous = std::mem::replace(&mut session.model, LoadedModel::Fallback);
        drop(previous);
        session.model_id = None;
        session.capabilities = ModelCapabilities::default();
        session.current_image = None;
        self.cache.lock().clear();
        self.publish(None, ModelCapabilities::default(), ModelPhase::Loading);

        info!(model = %descriptor.id, device = %self.device, "loading model");
        match self.loader.load(&descriptor, &files, self.device) {
            Ok(model) => {
                let capabilities = descriptor.capabilities();
                info!(model = %descriptor.id, kind = model.kind(), "model loaded");
                session.model = model;
                session.model_id = Some(descriptor.id.clone());
                session.capabilities = capabilities;
                self.publish(Some(descriptor.id.clone()), capabilities, ModelPhase::Loaded);
                Ok(SwitchOutcome::Loaded { model_id: descriptor.id })
            }
            Err(err) => {
                warn!(model = %descriptor.id, error = %err, "could not load model, serving fallback masks");
                self.publish(None, ModelCapabilities::default(), ModelPhase::Degraded);
                Ok(SwitchOutcome::Degraded {
                    model_id: descriptor.id,
                    reason: err.to_string(),
                })
            }
        }
    }

    fn publish(&self, model_id: Option<String>, capabilities: ModelCapabilities, phase: ModelPhase) {
        *self.published.write() = ActiveModelState {
            model_id,
            device: self.device,
            capabilities,
            phase,
        };
    }

    /// Exclusive access for one request's set-image and inference steps
    pub fn session(&self) -> ModelSession<'_> {
        ModelSession {
            manager: self,
            state: self.session.lock(),
        }
    }

    /// Set `image` as current, embedding it unless already known
    pub fn ensure_image(&self, image: &RgbImage, image_id: &str) -> Result<()> {
        self.session().ensure_image(image, image_id)
    }

    /// Best mask for a box prompt on `image_id`, which must still be the
    /// current image when the session lock is taken
    pub fn infer(&self, image: &RgbImage, image_id: &str, prompt: &BoxPrompt) -> Result<ScoredMask> {
        let session = self.session();
        if session.current_image_id() != Some(image_id) {
            return Err(SegmentError::ImageNotEmbedded);
        }
        session.infer(image, prompt)
    }

    pub fn active(&self) -> ActiveModelState {
        self.published.read().clone()
    }

    pub fn current_model(&self) -> Option<String> {
        self.published.read().model_id.clone()
    }

    pub fn is_loaded(&self) -> bool {
        self.published.read().phase == ModelPhase::Loaded
    }

    pub fn cache_len(&self) -> usize {
        self.cache.lock().len()
    }

    pub fn status(&self) -> ServiceStatus {
        let active = self.active();
        ServiceStatus {
            loaded: active.phase == ModelPhase::Loaded,
            device: active.device,
            cache_size: self.cache_len(),
            current_model: active.model_id,
            phase: active.phase,
        }
    }

    /// Catalog entries with the active model flagged. Unavailable models are
    /// included only when `include_unavailable` is set.
    pub fn list_models(&self, include_unavailable: bool) -> Vec<ModelEntry> {
        let current = self.current_model();
        self.catalog
            .list()
            .into_iter()
            .filter(|entry| include_unavailable || entry.is_available)
            .map(|mut entry| {
                entry.is_loaded = current.as_deref() == Some(entry.descriptor.id.as_str());
                entry
            })
            .collect()
    }

    /// Drop every cached embedding and forget the current image
    pub fn clear_cache(&self) {
        let mut session = self.session.lock();
        session.current_image = None;
        let mut cache = self.cache.lock();
        let dropped = cache.len();
        cache.clear();
        info!(dropped, "embedding cache cleared");
    }
}

/// Holds the session lock for the duration of one request
pub struct ModelSession<'a> {
    manager: &'a ModelManager,
    state: MutexGuard<'a, SessionState>,
}

impl ModelSession<'_> {
    pub fn model_id(&self) -> Option<&str> {
        self.state.model_id.as_deref()
    }

    pub fn is_fallback(&self) -> bool {
        self.state.model.is_fallback()
    }

    pub fn current_image_id(&self) -> Option<&str> {
        self.state.current_image.as_ref().map(|(id, _)| id.as_str())
    }

    /// Make `image_id` the current image.
    ///
    /// A no-op when it already is. Otherwise a cached embedding is reused,
    /// and only a cache miss runs the model's encoder.
    pub fn ensure_image(&mut self, image: &RgbImage, image_id: &str) -> Result<()> {
        if self.current_image_id() == Some(image_id) {
            return Ok(());
        }

        let cached = self.manager.cache.lock().get(&image_id.to_string()).cloned();
        let embedding = match cached {
            Some(embedding) => {
                debug!(image_id, "embedding cache hit");
                embedding
            }
            None => {
                debug!(image_id, "embedding cache miss");
                let embedding = self.state.model.embed(image)?;
                if let Some((evicted, _)) = self
                    .manager
                    .cache
                    .lock()
                    .put(image_id.to_string(), embedding.clone())
                {
                    debug!(evicted = %evicted, "evicted least recently used embedding");
                }
                embedding
            }
        };

        self.state.current_image = Some((image_id.to_string(), embedding));
        Ok(())
    }

    fn embedding(&self) -> Result<&ImageEmbedding> {
        self.state
            .current_image
            .as_ref()
            .map(|(_, embedding)| embedding)
            .ok_or(SegmentError::ImageNotEmbedded)
    }

    /// Highest scoring mask for `prompt`, at the image's dimensions
    pub fn infer(&self, image: &RgbImage, prompt: &BoxPrompt) -> Result<ScoredMask> {
        let embedding = self.embedding()?;
        let (width, height) = image.dimensions();

        let candidates = match &self.state.model {
            LoadedModel::Fallback => return Ok(self.manager.fallback.generate(width, height, prompt)),
            _ if !self.state.capabilities.box_prompt => {
                return Err(SegmentError::InvalidPrompt(format!(
                    "model {} does not accept box prompts",
                    self.model_id().unwrap_or("none")
                )));
            }
            LoadedModel::Box(model) => model.predict(image, embedding, prompt)?,
            LoadedModel::Text(model) => model.predict(image, embedding, prompt)?,
        };

        let count = candidates.len();
        let best = best_candidate(&candidates)
            .ok_or_else(|| SegmentError::PredictionFailure("model returned no masks".into()))?;
        let ScoredMask { mask, score } = candidates.into_iter().nth(best).ok_or_else(|| {
            SegmentError::PredictionFailure("selected mask is out of range".into())
        })?;
        debug!(candidates = count, score, "selected best mask");

        Ok(ScoredMask::new(conform_mask(mask, width, height), score))
    }

    /// Every instance matching `text`, each at the image's dimensions
    pub fn infer_text(&self, image: &RgbImage, text: &str) -> Result<Vec<ScoredMask>> {
        let embedding = self.embedding()?;
        let LoadedModel::Text(model) = &self.state.model else {
            return Err(SegmentError::TextPromptUnsupported {
                model: self.model_id().unwrap_or("none").to_string(),
            });
        };

        let (width, height) = image.dimensions();
        let instances = model.predict_text(image, embedding, text)?;
        Ok(instances
            .into_iter()
            .map(|instance| ScoredMask::new(conform_mask(instance.mask, width, height), instance.score))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NoBackendLoader;
    use std::fs::File;

    fn manager_in(dir: &std::path::Path) -> ModelManager {
        ModelManager::new(ModelCatalog::builtin(dir), Box::new(NoBackendLoader), Device::Cpu, 4)
    }

    #[test]
    fn test_starts_unloaded() {
        let manager = manager_in(std::path::Path::new("/nonexistent"));
        let status = manager.status();
        assert!(!status.loaded);
        assert_eq!(status.phase, ModelPhase::Unloaded);
        assert_eq!(status.current_model, None);
        assert_eq!(status.cache_size, 0);
    }

    #[test]
    fn test_infer_requires_image() {
        let manager = manager_in(std::path::Path::new("/nonexistent"));
        let result = manager.infer(&RgbImage::new(10, 10), "img", &BoxPrompt::new([0.0, 0.0, 5.0, 5.0]));
        assert!(matches!(result, Err(SegmentError::ImageNotEmbedded)));
    }

    #[test]
    fn test_failed_load_degrades() {
        let dir = tempfile::tempdir().expect("tempdir");
        File::create(dir.path().join("sam3.pt")).expect("create checkpoint");
        let manager = manager_in(dir.path());

        let outcome = manager.switch("sam3").expect("valid id");
        assert!(matches!(outcome, SwitchOutcome::Degraded { ref model_id, .. } if model_id == "sam3"));
        assert_eq!(manager.status().phase, ModelPhase::Degraded);
        assert!(!manager.is_loaded());

        let image = RgbImage::new(64, 64);
        manager.ensure_image(&image, "img").expect("ensure");
        let mask = manager
            .infer(&image, "img", &BoxPrompt::new([8.0, 8.0, 56.0, 56.0]))
            .expect("fallback mask");
        assert_eq!(mask.score, 0.95);
        assert_eq!(mask.mask.get_pixel(32, 32)[0], 255);
    }

    #[test]
    fn test_unavailable_model_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let manager = manager_in(dir.path());
        assert!(matches!(manager.switch("sam2_tiny"), Err(SegmentError::ModelUnavailable { .. })));
        assert_eq!(manager.status().phase, ModelPhase::Unloaded);
    }

    #[test]
    fn test_text_on_fallback_is_unsupported() {
        let manager = manager_in(std::path::Path::new("/nonexistent"));
        let image = RgbImage::new(8, 8);
        let mut session = manager.session();
        session.ensure_image(&image, "img").expect("ensure");
        assert!(matches!(
            session.infer_text(&image, "dog"),
            Err(SegmentError::TextPromptUnsupported { model }) if model == "none"
        ));
    }

    #[test]
    fn test_list_models_filters_unavailable() {
        let dir = tempfile::tempdir().expect("tempdir");
        File::create(dir.path().join("sam3.pt")).expect("create checkpoint");
        let manager = manager_in(dir.path());

        assert_eq!(manager.list_models(true).len(), 5);
        let available = manager.list_models(false);
        assert_eq!(available.len(), 1);
        assert!(!available[0].is_loaded);
    }
}
