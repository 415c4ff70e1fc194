//! Encoder/decoder SAM exports run through ONNX Runtime.
//!
//! The encoder takes a `1 x 3 x 1024 x 1024` image: longest side resized to
//! 1024, padded bottom and right, normalized with ImageNet statistics. The
//! decoder takes the usual prompt encoder inputs: `point_coords` in the
//! resized frame, `point_labels` (1 positive, 0 negative, 2/3 box corners),
//! an empty `mask_input` and the original size, and returns mask logits at
//! the original size plus `iou_predictions`.

use std::path::{Path, PathBuf};

use image::{imageops::FilterType, GrayImage, Luma, RgbImage};
use ndarray::{Array1, Array2, Array3, Array4, ArrayView, IxDyn};
use ort::{inputs, CUDAExecutionProvider, GraphOptimizationLevel, Session};
use tracing::{debug, info};

use super::{BoxCapableModel, ImageEmbedding, LoadedModel, ModelLoader, ScoredMask};
use crate::catalog::ModelDescriptor;
use crate::config::Device;
use crate::error::{Result, SegmentError};
use crate::prompt::BoxPrompt;

const INPUT_SIZE: u32 = 1024;
const MASK_INPUT_SIZE: usize = 256;
const INTRA_THREADS: usize = 4;
const PIXEL_MEAN: [f32; 3] = [123.675, 116.28, 103.53];
const PIXEL_STD: [f32; 3] = [58.395, 57.12, 57.375];

/// Loads `*.encoder.onnx` checkpoints with their decoder companion
#[derive(Debug, Clone)]
pub struct OnnxSamLoader {
    pub intra_threads: usize,
}

impl Default for OnnxSamLoader {
    fn default() -> Self {
        Self {
            intra_threads: INTRA_THREADS,
        }
    }
}

impl OnnxSamLoader {
    fn session(&self, path: &Path, device: Device) -> ort::Result<Session> {
        let builder = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(self.intra_threads)?;

        let builder = match device {
            Device::Cuda => builder.with_execution_providers([CUDAExecutionProvider::default().build()])?,
            Device::Cpu => builder,
        };

        builder.commit_from_file(path)
    }
}

impl ModelLoader for OnnxSamLoader {
    fn load(&self, descriptor: &ModelDescriptor, files: &[PathBuf], device: Device) -> Result<LoadedModel> {
        let failure = |reason: String| SegmentError::ModelLoadFailure {
            id: descriptor.id.clone(),
            reason,
        };

        let [encoder_path, decoder_path] = files else {
            return Err(failure(format!(
                "expected an encoder and a decoder file, got {} file(s)",
                files.len()
            )));
        };
        if encoder_path.extension().and_then(|ext| ext.to_str()) != Some("onnx") {
            return Err(failure(format!(
                "unsupported checkpoint format: {}",
                encoder_path.display()
            )));
        }

        info!(model = %descriptor.id, %device, "creating ONNX sessions");
        let encoder = self
            .session(encoder_path, device)
            .map_err(|e| failure(format!("encoder: {}", e)))?;
        let decoder = self
            .session(decoder_path, device)
            .map_err(|e| failure(format!("decoder: {}", e)))?;

        Ok(LoadedModel::Box(Box::new(OnnxSamModel { encoder, decoder })))
    }
}

pub struct OnnxSamModel {
    encoder: Session,
    decoder: Session,
}

fn prediction_failure(error: impl std::fmt::Display) -> SegmentError {
    SegmentError::PredictionFailure(error.to_string())
}

impl OnnxSamModel {
    /// Factor mapping original pixel coordinates into the encoder frame
    fn scale(width: u32, height: u32) -> f32 {
        INPUT_SIZE as f32 / width.max(height).max(1) as f32
    }

    fn preprocess_image(image: &RgbImage) -> Array4<f32> {
        let (width, height) = image.dimensions();
        let scale = Self::scale(width, height);
        let new_width = ((width as f32 * scale).round() as u32).clamp(1, INPUT_SIZE);
        let new_height = ((height as f32 * scale).round() as u32).clamp(1, INPUT_SIZE);
        let resized = image::imageops::resize(image, new_width, new_height, FilterType::Lanczos3);

        // Padding stays zero after normalization
        let size = INPUT_SIZE as usize;
        let mut tensor = Array4::zeros((1, 3, size, size));
        for (x, y, pixel) in resized.enumerate_pixels() {
            for channel in 0..3 {
                tensor[[0, channel, y as usize, x as usize]] =
                    (pixel[channel] as f32 - PIXEL_MEAN[channel]) / PIXEL_STD[channel];
            }
        }
        tensor
    }

    /// Points and labels mapped into the encoder frame
    fn preprocess_prompt(prompt: &BoxPrompt, width: u32, height: u32) -> Result<(Array3<f32>, Array2<f32>)> {
        let scale = Self::scale(width, height);
        let [x1, y1, x2, y2] = prompt.bbox;

        let mut coords = vec![x1 * scale, y1 * scale, x2 * scale, y2 * scale];
        let mut labels = vec![2.0, 3.0];
        for ([x, y], label) in prompt
            .positive
            .iter()
            .map(|p| (p, 1.0))
            .chain(prompt.negative.iter().map(|p| (p, 0.0)))
        {
            coords.extend([x * scale, y * scale]);
            labels.push(label);
        }

        let count = labels.len();
        let coords = Array3::from_shape_vec((1, count, 2), coords).map_err(prediction_failure)?;
        let labels = Array2::from_shape_vec((1, count), labels).map_err(prediction_failure)?;
        Ok((coords, labels))
    }
}

impl BoxCapableModel for OnnxSamModel {
    fn embed(&self, image: &RgbImage) -> Result<ImageEmbedding> {
        let input = Self::preprocess_image(image);
        let outputs = self
            .encoder
            .run(inputs![&self.encoder.inputs[0].name => input.view()].map_err(prediction_failure)?)
            .map_err(prediction_failure)?;

        let tensor = outputs["image_embeddings"]
            .try_extract_tensor::<f32>()
            .map_err(prediction_failure)?;
        debug!(shape = ?tensor.shape(), "image encoded");

        ImageEmbedding::new(tensor.shape().to_vec(), tensor.iter().copied().collect(), image.dimensions())
    }

    fn predict(&self, image: &RgbImage, embedding: &ImageEmbedding, prompt: &BoxPrompt) -> Result<Vec<ScoredMask>> {
        let (width, height) = image.dimensions();
        let embedding = ArrayView::from_shape(IxDyn(embedding.shape()), embedding.values())
            .map_err(prediction_failure)?;
        let (coords, labels) = Self::preprocess_prompt(prompt, width, height)?;
        let mask_input = Array4::<f32>::zeros((1, 1, MASK_INPUT_SIZE, MASK_INPUT_SIZE));
        let has_mask_input = Array1::from(vec![0.0f32]);
        let orig_size = Array1::from(vec![height as f32, width as f32]);

        let outputs = self
            .decoder
            .run(
                inputs![
                    "image_embeddings" => embedding,
                    "point_coords" => coords.view(),
                    "point_labels" => labels.view(),
                    "mask_input" => mask_input.view(),
                    "has_mask_input" => has_mask_input.view(),
                    "orig_im_size" => orig_size.view(),
                ]
                .map_err(prediction_failure)?,
            )
            .map_err(prediction_failure)?;

        let masks = outputs["masks"].try_extract_tensor::<f32>().map_err(prediction_failure)?;
        let scores = outputs["iou_predictions"]
            .try_extract_tensor::<f32>()
            .map_err(prediction_failure)?;

        let &[_, count, mask_h, mask_w] = masks.shape() else {
            return Err(SegmentError::PredictionFailure(format!(
                "unexpected mask tensor shape {:?}",
                masks.shape()
            )));
        };

        let scores: Vec<f32> = scores.iter().copied().collect();
        let candidates = (0..count)
            .map(|i| {
                let mask = GrayImage::from_fn(mask_w as u32, mask_h as u32, |x, y| {
                    let logit = masks[&[0, i, y as usize, x as usize][..]];
                    if logit > 0.0 { Luma([255]) } else { Luma([0]) }
                });
                ScoredMask::new(mask, scores.get(i).copied().unwrap_or(0.0))
            })
            .collect();

        Ok(candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_encoding() {
        let prompt = BoxPrompt::new([10.0, 20.0, 110.0, 220.0])
            .with_positive([50.0, 60.0])
            .with_negative([70.0, 80.0]);
        let (coords, labels) = OnnxSamModel::preprocess_prompt(&prompt, 512, 2048).expect("encode");

        assert_eq!(coords.shape(), &[1, 4, 2]);
        assert_eq!(labels.as_slice(), Some(&[2.0, 3.0, 1.0, 0.0][..]));
        // Longest side 2048 maps to 1024
        assert_eq!(coords[[0, 0, 0]], 5.0);
        assert_eq!(coords[[0, 0, 1]], 10.0);
        assert_eq!(coords[[0, 3, 0]], 35.0);
    }

    #[test]
    fn test_image_is_padded_and_normalized() {
        let image = RgbImage::from_pixel(200, 100, image::Rgb([124, 116, 104]));
        let tensor = OnnxSamModel::preprocess_image(&image);

        assert_eq!(tensor.shape(), &[1, 3, 1024, 1024]);
        assert!(tensor[[0, 0, 10, 10]].abs() < 0.05);
        // Below the resized content is padding
        assert_eq!(tensor[[0, 0, 600, 10]], 0.0);
    }

    #[test]
    fn test_rejects_non_onnx_checkpoints() {
        let descriptor = crate::catalog::builtin_models().remove(0);
        let files = vec![PathBuf::from("sam3.pt"), PathBuf::from("other.onnx")];
        let result = OnnxSamLoader::default().load(&descriptor, &files, Device::Cpu);
        assert!(matches!(result, Err(SegmentError::ModelLoadFailure { .. })));

        let result = OnnxSamLoader::default().load(&descriptor, &files[..1], Device::Cpu);
        assert!(matches!(result, Err(SegmentError::ModelLoadFailure { .. })));
    }
}
