//! Request and response shapes exchanged with a request layer.

use image::GrayImage;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::config::Device;
use crate::prompt::PromptInput;

/// A polygon prediction for one object
#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct PredictionResult {
    /// Single-channel mask at the input image size
    #[serde(skip)]
    #[schemars(skip)]
    pub mask: GrayImage,
    /// Open ring in pixel coordinates
    pub polygon: Vec<[f32; 2]>,
    /// `polygon` divided by the image width and height
    pub polygon_normalized: Vec<[f32; 2]>,
    /// Enclosed area of the unsimplified contour, in pixels squared
    pub area: f64,
    pub score: f32,
    pub inference_time_ms: f64,
    pub is_valid: bool,
    /// Base64 PNG overlay of `mask`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mask_base64: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_prompt: Option<String>,
}

impl PredictionResult {
    /// An invalid result that only carries an error marker
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            mask: GrayImage::new(0, 0),
            polygon: Vec::new(),
            polygon_normalized: Vec::new(),
            area: 0.0,
            score: 0.0,
            inference_time_ms: 0.0,
            is_valid: false,
            mask_base64: None,
            error: Some(message.into()),
            instance_id: None,
            text_prompt: None,
        }
    }

    pub fn with_text_prompt(mut self, text: impl Into<String>) -> Self {
        self.text_prompt = Some(text.into());
        self
    }

    pub fn with_inference_time(mut self, millis: f64) -> Self {
        self.inference_time_ms = millis;
        self
    }

    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }
}

fn default_epsilon() -> f64 {
    mask::DEFAULT_EPSILON
}

/// Everything a request layer needs to ask for a prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PredictionRequest {
    pub image_id: String,
    #[serde(flatten)]
    pub prompt: PromptInput,
    /// Simplification factor, in thousandths of the contour perimeter
    #[serde(default = "default_epsilon")]
    pub simplification_epsilon: f64,
    /// Include the encoded mask overlay in box prompt results
    #[serde(default)]
    pub return_mask: bool,
}

impl PredictionRequest {
    pub fn new(image_id: impl Into<String>, prompt: PromptInput) -> Self {
        Self {
            image_id: image_id.into(),
            prompt,
            simplification_epsilon: default_epsilon(),
            return_mask: false,
        }
    }
}

/// Box prompts produce one result, text prompts any number
#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
#[serde(untagged)]
pub enum PredictionOutput {
    Single(PredictionResult),
    Instances(Vec<PredictionResult>),
}

/// Where the model manager is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ModelPhase {
    Unloaded,
    Loading,
    Loaded,
    /// A load failed; predictions are served by the fallback generator
    Degraded,
}

/// Snapshot reported by `status()`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ServiceStatus {
    /// Whether a real model is answering predictions
    pub loaded: bool,
    pub device: Device,
    /// Number of cached image embeddings
    pub cache_size: usize,
    pub current_model: Option<String>,
    pub phase: ModelPhase,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_result_serialization() {
        let result = PredictionResult::failed("No objects found matching 'cat'").with_text_prompt("cat");
        assert!(result.has_error());
        let json = serde_json::to_value(&result).expect("serialize");

        assert_eq!(json["is_valid"], false);
        assert_eq!(json["error"], "No objects found matching 'cat'");
        assert_eq!(json["text_prompt"], "cat");
        assert_eq!(json["polygon"], serde_json::json!([]));
        assert!(json.get("mask").is_none());
        assert!(json.get("instance_id").is_none());
    }

    #[test]
    fn test_request_defaults() {
        let request: PredictionRequest =
            serde_json::from_str(r#"{"image_id": "abc", "bbox": [0, 0, 10, 10]}"#).expect("deserialize");
        assert_eq!(request.simplification_epsilon, 2.0);
        assert!(!request.return_mask);
        assert_eq!(request.prompt, PromptInput::boxed([0.0, 0.0, 10.0, 10.0]));
    }

    #[test]
    fn test_status_serialization() {
        let status = ServiceStatus {
            loaded: false,
            device: Device::Cpu,
            cache_size: 0,
            current_model: None,
            phase: ModelPhase::Degraded,
        };
        let json = serde_json::to_value(&status).expect("serialize");
        assert_eq!(json["device"], "cpu");
        assert_eq!(json["phase"], "degraded");
        assert!(json["current_model"].is_null());
    }
}
