//! Prompt input as received from callers, and its normalized forms.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SegmentError};

/// Box plus optional refinement points, in absolute pixel coordinates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct BoxPrompt {
    /// `[x_min, y_min, x_max, y_max]`
    pub bbox: [f32; 4],
    #[serde(default)]
    pub positive: Vec<[f32; 2]>,
    #[serde(default)]
    pub negative: Vec<[f32; 2]>,
}

impl BoxPrompt {
    pub fn new(bbox: [f32; 4]) -> Self {
        Self {
            bbox,
            positive: Vec::new(),
            negative: Vec::new(),
        }
    }

    pub fn with_positive(mut self, point: [f32; 2]) -> Self {
        self.positive.push(point);
        self
    }

    pub fn with_negative(mut self, point: [f32; 2]) -> Self {
        self.negative.push(point);
        self
    }

    pub fn width(&self) -> f32 {
        self.bbox[2] - self.bbox[0]
    }

    pub fn height(&self) -> f32 {
        self.bbox[3] - self.bbox[1]
    }
}

/// A prompt after normalization: exactly one modality
#[derive(Debug, Clone, PartialEq)]
pub enum Prompt {
    Box(BoxPrompt),
    Text(String),
}

/// Raw prompt fields as a request layer would deserialize them
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PromptInput {
    /// `[x_min, y_min, x_max, y_max]` in pixels
    #[serde(default)]
    pub bbox: Option<[f32; 4]>,
    #[serde(default)]
    pub points_pos: Option<Vec<[f32; 2]>>,
    #[serde(default)]
    pub points_neg: Option<Vec<[f32; 2]>>,
    /// Natural-language description; excludes box and points
    #[serde(default)]
    pub text: Option<String>,
}

impl PromptInput {
    pub fn boxed(bbox: [f32; 4]) -> Self {
        Self {
            bbox: Some(bbox),
            ..Self::default()
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    /// Resolve to a single prompt modality.
    ///
    /// Points default to empty lists. A text prompt cannot be combined with
    /// a box or points, and points alone are not enough without a box.
    pub fn normalize(self) -> Result<Prompt> {
        let has_points = self.points_pos.as_ref().is_some_and(|p| !p.is_empty())
            || self.points_neg.as_ref().is_some_and(|p| !p.is_empty());

        match (self.bbox, self.text) {
            (Some(_), Some(_)) => Err(SegmentError::InvalidPrompt(
                "a text prompt cannot be combined with a box".into(),
            )),
            (None, Some(_)) if has_points => Err(SegmentError::InvalidPrompt(
                "a text prompt cannot be combined with points".into(),
            )),
            (None, Some(text)) => {
                let text = text.trim();
                if text.is_empty() {
                    return Err(SegmentError::InvalidPrompt("text prompt is empty".into()));
                }
                Ok(Prompt::Text(text.to_string()))
            }
            (Some(bbox), None) => {
                let prompt = BoxPrompt {
                    bbox,
                    positive: self.points_pos.unwrap_or_default(),
                    negative: self.points_neg.unwrap_or_default(),
                };
                validate_box_prompt(&prompt)?;
                Ok(Prompt::Box(prompt))
            }
            (None, None) if has_points => Err(SegmentError::InvalidPrompt(
                "points require a bounding box".into(),
            )),
            (None, None) => Err(SegmentError::InvalidPrompt(
                "either a bounding box or a text prompt is required".into(),
            )),
        }
    }
}

pub(crate) fn validate_box_prompt(prompt: &BoxPrompt) -> Result<()> {
    let finite = prompt.bbox.iter().all(|v| v.is_finite())
        && prompt
            .positive
            .iter()
            .chain(&prompt.negative)
            .all(|[x, y]| x.is_finite() && y.is_finite());

    if !finite {
        return Err(SegmentError::InvalidPrompt("coordinates must be finite".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_box_with_default_points() {
        let prompt = PromptInput::boxed([1.0, 2.0, 30.0, 40.0]).normalize().expect("valid");
        assert_eq!(prompt, Prompt::Box(BoxPrompt::new([1.0, 2.0, 30.0, 40.0])));
    }

    #[test]
    fn test_box_with_points() {
        let input = PromptInput {
            bbox: Some([0.0, 0.0, 10.0, 10.0]),
            points_pos: Some(vec![[5.0, 5.0]]),
            points_neg: Some(vec![[1.0, 1.0]]),
            text: None,
        };
        match input.normalize().expect("valid") {
            Prompt::Box(prompt) => {
                assert_eq!(prompt.positive, vec![[5.0, 5.0]]);
                assert_eq!(prompt.negative, vec![[1.0, 1.0]]);
            }
            other => panic!("expected box prompt, got {:?}", other),
        }
    }

    #[test]
    fn test_text_is_trimmed() {
        assert_eq!(
            PromptInput::text("  dog ").normalize().expect("valid"),
            Prompt::Text("dog".into())
        );
    }

    #[test]
    fn test_invalid_combinations() {
        let both = PromptInput {
            bbox: Some([0.0, 0.0, 1.0, 1.0]),
            text: Some("cat".into()),
            ..PromptInput::default()
        };
        let text_and_points = PromptInput {
            points_pos: Some(vec![[1.0, 1.0]]),
            text: Some("cat".into()),
            ..PromptInput::default()
        };
        let points_only = PromptInput {
            points_neg: Some(vec![[1.0, 1.0]]),
            ..PromptInput::default()
        };

        for input in [both, text_and_points, points_only, PromptInput::default(), PromptInput::text("   ")] {
            assert!(matches!(input.normalize(), Err(SegmentError::InvalidPrompt(_))));
        }
    }

    #[test]
    fn test_non_finite_coordinates() {
        let input = PromptInput {
            bbox: Some([0.0, f32::NAN, 1.0, 1.0]),
            ..PromptInput::default()
        };
        assert!(matches!(input.normalize(), Err(SegmentError::InvalidPrompt(_))));
    }

    #[test]
    fn test_deserializes_from_request_json() {
        let input: PromptInput = serde_json::from_str(
            r#"{"bbox": [10, 20, 110, 80], "points_pos": [[50, 50]]}"#,
        )
        .expect("valid json");
        assert_eq!(input.bbox, Some([10.0, 20.0, 110.0, 80.0]));
        assert!(input.points_neg.is_none());
    }
}
