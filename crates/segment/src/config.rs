use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

use crate::catalog::{builtin_models, ModelDescriptor};
use crate::error::{Result, SegmentError};

/// Compute device a model is loaded on
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq,
    Serialize, Deserialize, JsonSchema,
    Display, EnumString, EnumIter, IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Device {
    #[default]
    Cpu,
    Cuda,
}

/// Service configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct SegmentConfig {
    /// Directory checkpoints are resolved against
    pub models_dir: PathBuf,
    pub device: Device,
    /// Model loaded at startup
    pub default_model: String,
    /// Capacity of the per-image embedding cache
    pub cache_size: usize,
    pub min_polygon_points: usize,
    pub default_epsilon: f64,
    /// Longest image side accepted from the image source
    pub max_image_size: u32,
    /// RGBA colour of the encoded mask overlay
    pub mask_color: [u8; 4],
    /// Confidence reported by the fallback generator
    pub fallback_score: f32,
    /// Radius in pixels of the disks the fallback stamps for point prompts
    pub fallback_point_radius: u32,
    pub models: Vec<ModelDescriptor>,
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            models_dir: PathBuf::from("./models"),
            device: Device::Cpu,
            default_model: "sam3".to_string(),
            cache_size: crate::cache::DEFAULT_CACHE_SIZE,
            min_polygon_points: mask::DEFAULT_MIN_POLYGON_POINTS,
            default_epsilon: mask::DEFAULT_EPSILON,
            max_image_size: 4096,
            mask_color: mask::DEFAULT_MASK_COLOR,
            fallback_score: crate::model::fallback::DEFAULT_FALLBACK_SCORE,
            fallback_point_radius: crate::model::fallback::DEFAULT_POINT_RADIUS,
            models: builtin_models(),
        }
    }
}

impl SegmentConfig {
    /// Load configuration from a TOML file
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Load configuration from a TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: SegmentConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Load configuration from a JSON string
    pub fn from_json(content: &str) -> Result<Self> {
        let config: SegmentConfig = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Auto-detect file format and load configuration
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();
        match path_ref.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Self::from_toml_file(path),
            Some("json") => Self::from_json_file(path),
            _ => Err(SegmentError::Config(format!(
                "unsupported config format: {}. Please use .toml or .json files",
                path_ref.display()
            ))),
        }
    }

    /// Apply `SAM_*` environment variable overrides
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup("SAM_MODELS_DIR") {
            self.models_dir = PathBuf::from(dir);
        }
        if let Some(device) = lookup("SAM_DEVICE") {
            self.device = Device::from_str(&device)
                .map_err(|_| SegmentError::Config(format!("unknown device: {}", device)))?;
        }
        if let Some(model) = lookup("SAM_DEFAULT_MODEL") {
            self.default_model = model;
        }
        if let Some(size) = lookup("SAM_CACHE_SIZE") {
            self.cache_size = parse_number("SAM_CACHE_SIZE", &size)?;
        }
        if let Some(size) = lookup("SAM_MAX_IMAGE_SIZE") {
            self.max_image_size = parse_number("SAM_MAX_IMAGE_SIZE", &size)?;
        }

        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.cache_size == 0 {
            return Err(SegmentError::Config("cache_size must be at least 1".into()));
        }
        if self.min_polygon_points == 0 {
            return Err(SegmentError::Config("min_polygon_points must be at least 1".into()));
        }
        if !self.default_epsilon.is_finite() || self.default_epsilon < 0.0 {
            return Err(SegmentError::Config(format!(
                "default_epsilon must be finite and non-negative, got {}",
                self.default_epsilon
            )));
        }
        if self.max_image_size == 0 {
            return Err(SegmentError::Config("max_image_size must be positive".into()));
        }
        if !(0.0..=1.0).contains(&self.fallback_score) {
            return Err(SegmentError::Config(format!(
                "fallback_score must be within [0, 1], got {}",
                self.fallback_score
            )));
        }

        let mut seen = HashSet::new();
        for model in &self.models {
            if !seen.insert(model.id.as_str()) {
                return Err(SegmentError::Config(format!("duplicate model id: {}", model.id)));
            }
        }

        Ok(())
    }
}

fn parse_number<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| SegmentError::Config(format!("{} must be a number, got {:?}", key, value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_are_valid() {
        let config = SegmentConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.cache_size, 100);
        assert_eq!(config.min_polygon_points, 3);
        assert_eq!(config.default_epsilon, 2.0);
        assert_eq!(config.models.len(), 5);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = SegmentConfig::from_toml(
            r#"
            models_dir = "/opt/models"
            device = "cuda"
            cache_size = 8
            "#,
        )
        .expect("valid toml");

        assert_eq!(config.models_dir, PathBuf::from("/opt/models"));
        assert_eq!(config.device, Device::Cuda);
        assert_eq!(config.cache_size, 8);
        assert_eq!(config.default_model, "sam3");
    }

    #[test]
    fn test_json_config() {
        let config = SegmentConfig::from_json(r#"{"default_model": "sam2_tiny"}"#).expect("valid json");
        assert_eq!(config.default_model, "sam2_tiny");
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(matches!(
            SegmentConfig::from_toml("cache_size = 0"),
            Err(SegmentError::Config(_))
        ));
        assert!(matches!(
            SegmentConfig::from_toml("fallback_score = 1.5"),
            Err(SegmentError::Config(_))
        ));
        assert!(matches!(
            SegmentConfig::from_toml("device = \"tpu\""),
            Err(SegmentError::TomlDe(_))
        ));
    }

    #[test]
    fn test_duplicate_model_ids_are_rejected() {
        let mut config = SegmentConfig::default();
        let duplicate = config.models[0].clone();
        config.models.push(duplicate);
        assert!(matches!(config.validate(), Err(SegmentError::Config(_))));
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [
            ("SAM_DEVICE", "CUDA"),
            ("SAM_CACHE_SIZE", "12"),
            ("SAM_MODELS_DIR", "/srv/weights"),
        ]
        .into_iter()
        .collect();

        let config = SegmentConfig::default()
            .with_overrides(|key| env.get(key).map(|v| v.to_string()))
            .expect("valid overrides");

        assert_eq!(config.device, Device::Cuda);
        assert_eq!(config.cache_size, 12);
        assert_eq!(config.models_dir, PathBuf::from("/srv/weights"));
    }

    #[test]
    fn test_bad_override_is_reported() {
        let result = SegmentConfig::default()
            .with_overrides(|key| (key == "SAM_CACHE_SIZE").then(|| "many".to_string()));
        assert!(matches!(result, Err(SegmentError::Config(_))));
    }

    #[test]
    fn test_unknown_extension() {
        assert!(matches!(
            SegmentConfig::from_file("settings.yaml"),
            Err(SegmentError::Config(_))
        ));
    }
}
