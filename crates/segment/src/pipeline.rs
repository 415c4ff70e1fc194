use std::time::Instant;

use image::RgbImage;
use mask::{MaskArtifactEncoder, MaskError, MaskPolygonizer};
use tracing::{debug, warn};

use crate::config::SegmentConfig;
use crate::error::{Result, SegmentError};
use crate::manager::ModelManager;
use crate::model::{ModelLoader, ScoredMask};
use crate::prompt::{BoxPrompt, Prompt};
use crate::result::{PredictionOutput, PredictionRequest, PredictionResult};

fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}

fn check_epsilon(epsilon: f64) -> Result<()> {
    if !epsilon.is_finite() || epsilon < 0.0 {
        return Err(MaskError::InvalidEpsilon(epsilon).into());
    }
    Ok(())
}

/// Turns prompts on an image into polygon results.
///
/// Holds the manager's session only for the set-image and inference steps;
/// polygonization and overlay encoding happen after it is released.
pub struct PredictionPipeline {
    manager: ModelManager,
    polygonizer: MaskPolygonizer,
    encoder: MaskArtifactEncoder,
    default_epsilon: f64,
}

impl PredictionPipeline {
    pub fn new(manager: ModelManager) -> Self {
        Self {
            manager,
            polygonizer: MaskPolygonizer::default(),
            encoder: MaskArtifactEncoder::default(),
            default_epsilon: mask::DEFAULT_EPSILON,
        }
    }

    pub fn from_config(config: &SegmentConfig, loader: Box<dyn ModelLoader>) -> Self {
        Self {
            manager: ModelManager::from_config(config, loader),
            polygonizer: MaskPolygonizer::builder()
                .min_polygon_points(config.min_polygon_points)
                .build(),
            encoder: MaskArtifactEncoder::new(config.mask_color),
            default_epsilon: config.default_epsilon,
        }
    }

    pub fn with_polygonizer(mut self, polygonizer: MaskPolygonizer) -> Self {
        self.polygonizer = polygonizer;
        self
    }

    pub fn manager(&self) -> &ModelManager {
        &self.manager
    }

    pub fn default_epsilon(&self) -> f64 {
        self.default_epsilon
    }

    /// Segment the object inside a box, refined by optional points
    pub fn predict(
        &self,
        image: &RgbImage,
        image_id: &str,
        prompt: &BoxPrompt,
        epsilon: f64,
        want_mask: bool,
    ) -> Result<PredictionResult> {
        let started = Instant::now();
        check_epsilon(epsilon)?;
        crate::prompt::validate_box_prompt(prompt)?;

        let scored = {
            let mut session = self.manager.session();
            session.ensure_image(image, image_id)?;
            session.infer(image, prompt)?
        };

        let result = self.assemble(scored, epsilon, want_mask, started)?;
        debug!(
            image_id,
            vertices = result.polygon.len(),
            score = result.score,
            elapsed_ms = result.inference_time_ms,
            "box prediction finished"
        );
        Ok(result)
    }

    /// Segment every instance matching `text`.
    ///
    /// Never returns an empty list. A model without text support, a backend
    /// failure, or a search with no matches yields a single result whose
    /// `error` says why. Each instance carries its overlay.
    pub fn predict_text(
        &self,
        image: &RgbImage,
        image_id: &str,
        text: &str,
        epsilon: f64,
    ) -> Result<Vec<PredictionResult>> {
        let started = Instant::now();
        check_epsilon(epsilon)?;
        let text = text.trim();
        if text.is_empty() {
            return Err(SegmentError::InvalidPrompt("text prompt is empty".into()));
        }

        let instances = {
            let mut session = self.manager.session();
            session
                .ensure_image(image, image_id)
                .and_then(|()| session.infer_text(image, text))
        };

        let failed = |message: String| {
            PredictionResult::failed(message)
                .with_text_prompt(text)
                .with_inference_time(elapsed_ms(started))
        };

        let instances = match instances {
            Ok(instances) => instances,
            Err(err @ (SegmentError::TextPromptUnsupported { .. } | SegmentError::PredictionFailure(_))) => {
                warn!(image_id, error = %err, "text prediction failed");
                return Ok(vec![failed(err.to_string())]);
            }
            Err(err) => return Err(err),
        };

        if instances.is_empty() {
            debug!(image_id, text, "no instances found");
            return Ok(vec![failed(format!("No objects found matching '{}'", text))]);
        }

        let results = instances
            .into_iter()
            .enumerate()
            .map(|(instance_id, scored)| {
                let mut result = match self.assemble(scored, epsilon, true, started) {
                    Ok(result) => result,
                    Err(err) => {
                        warn!(image_id, instance_id, error = %err, "instance could not be converted");
                        failed(err.to_string())
                    }
                };
                result.instance_id = Some(instance_id);
                result.text_prompt = Some(text.to_string());
                result
            })
            .collect::<Vec<_>>();

        debug!(image_id, text, instances = results.len(), "text prediction finished");
        Ok(results)
    }

    /// Dispatch a normalized prompt to the matching prediction
    pub fn predict_prompt(
        &self,
        image: &RgbImage,
        image_id: &str,
        prompt: &Prompt,
        epsilon: f64,
        want_mask: bool,
    ) -> Result<PredictionOutput> {
        match prompt {
            Prompt::Box(prompt) => self
                .predict(image, image_id, prompt, epsilon, want_mask)
                .map(PredictionOutput::Single),
            Prompt::Text(text) => self
                .predict_text(image, image_id, text, epsilon)
                .map(PredictionOutput::Instances),
        }
    }

    /// Single entry point for a deserialized request
    pub fn handle(&self, image: &RgbImage, request: PredictionRequest) -> Result<PredictionOutput> {
        let prompt = request.prompt.normalize()?;
        self.predict_prompt(
            image,
            &request.image_id,
            &prompt,
            request.simplification_epsilon,
            request.return_mask,
        )
    }

    fn assemble(&self, scored: ScoredMask, epsilon: f64, want_mask: bool, started: Instant) -> Result<PredictionResult> {
        let (width, height) = scored.mask.dimensions();
        let polygon = self.polygonizer.convert(&scored.mask, epsilon)?;
        let polygon_normalized = polygon.normalized(width, height)?;
        let mask_base64 = if want_mask {
            Some(self.encoder.encode(&scored.mask)?)
        } else {
            None
        };

        Ok(PredictionResult {
            is_valid: polygon.is_valid(self.polygonizer.min_points()),
            mask: scored.mask,
            polygon: polygon.points,
            polygon_normalized,
            area: polygon.area,
            score: scored.score,
            inference_time_ms: elapsed_ms(started),
            mask_base64,
            error: None,
            instance_id: None,
            text_prompt: None,
        })
    }
}
