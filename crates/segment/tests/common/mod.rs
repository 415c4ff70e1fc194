#![allow(dead_code)]

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use image::{GrayImage, Luma, RgbImage};
use segment::{
    BoxCapableModel, BoxPrompt, Device, ImageEmbedding, LoadedModel, ModelCatalog, ModelDescriptor,
    ModelLoader, ModelManager, PredictionPipeline, Result, ScoredMask, SegmentError, TextCapableModel,
};
use tempfile::TempDir;

/// Counts encoder runs and loads across every model a loader creates
#[derive(Debug, Default, Clone)]
pub struct Counters {
    embeds: Arc<AtomicUsize>,
    loads: Arc<AtomicUsize>,
}

impl Counters {
    pub fn embeds(&self) -> usize {
        self.embeds.load(Ordering::SeqCst)
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

/// Returns a filled box at half resolution with a high score, plus an
/// empty low scoring candidate. Text prompts match "dog" twice.
pub struct StubModel {
    counters: Counters,
}

fn half_res_box(width: u32, height: u32, bbox: [f32; 4]) -> GrayImage {
    let [x1, y1, x2, y2] = bbox.map(|v| (v / 2.0) as u32);
    let mut mask = GrayImage::new(width / 2, height / 2);
    for y in y1..y2.min(height / 2) {
        for x in x1..x2.min(width / 2) {
            mask.put_pixel(x, y, Luma([255]));
        }
    }
    mask
}

impl BoxCapableModel for StubModel {
    fn embed(&self, image: &RgbImage) -> Result<ImageEmbedding> {
        self.counters.embeds.fetch_add(1, Ordering::SeqCst);
        ImageEmbedding::new(vec![1, 2], vec![0.5, 0.25], image.dimensions())
    }

    fn predict(&self, image: &RgbImage, embedding: &ImageEmbedding, prompt: &BoxPrompt) -> Result<Vec<ScoredMask>> {
        if embedding.source_size() != image.dimensions() {
            return Err(SegmentError::PredictionFailure("embedding belongs to another image".into()));
        }
        let (width, height) = image.dimensions();
        Ok(vec![
            ScoredMask::new(GrayImage::new(width, height), 0.3),
            ScoredMask::new(half_res_box(width, height, prompt.bbox), 0.9),
            ScoredMask::new(GrayImage::new(width, height), 0.9),
        ])
    }
}

impl TextCapableModel for StubModel {
    fn predict_text(&self, image: &RgbImage, _embedding: &ImageEmbedding, text: &str) -> Result<Vec<ScoredMask>> {
        let (width, height) = image.dimensions();
        match text {
            "dog" => Ok(vec![
                ScoredMask::new(half_res_box(width, height, [10.0, 10.0, 50.0, 50.0]), 0.8),
                ScoredMask::new(half_res_box(width, height, [60.0, 60.0, 120.0, 100.0]), 0.7),
            ]),
            "explode" => Err(SegmentError::PredictionFailure("backend exploded".into())),
            _ => Ok(Vec::new()),
        }
    }
}

/// Text-capable descriptors get a text model, the rest a box model
#[derive(Debug, Default, Clone)]
pub struct StubLoader {
    pub counters: Counters,
}

impl ModelLoader for StubLoader {
    fn load(&self, descriptor: &ModelDescriptor, files: &[PathBuf], _device: Device) -> Result<LoadedModel> {
        assert!(files.iter().all(|f| f.is_file()), "loader called with missing files");
        self.counters.loads.fetch_add(1, Ordering::SeqCst);
        let model = StubModel {
            counters: self.counters.clone(),
        };
        Ok(if descriptor.supports_text_prompt {
            LoadedModel::Text(Box::new(model))
        } else {
            LoadedModel::Box(Box::new(model))
        })
    }
}

/// Always fails, like a corrupt checkpoint
pub struct BrokenLoader;

impl ModelLoader for BrokenLoader {
    fn load(&self, descriptor: &ModelDescriptor, _files: &[PathBuf], _device: Device) -> Result<LoadedModel> {
        Err(SegmentError::ModelLoadFailure {
            id: descriptor.id.clone(),
            reason: "corrupt checkpoint".into(),
        })
    }
}

/// A models directory holding checkpoints for sam3 and sam2_tiny
pub fn models_dir() -> TempDir {
    let dir = tempfile::tempdir().expect("tempdir");
    for file in ["sam3.pt", "sam2_hiera_tiny.encoder.onnx", "sam2_hiera_tiny.decoder.onnx"] {
        File::create(dir.path().join(file)).expect("create checkpoint");
    }
    dir
}

pub fn manager(dir: &Path, loader: impl ModelLoader + 'static, cache_size: usize) -> ModelManager {
    ModelManager::new(ModelCatalog::builtin(dir), Box::new(loader), Device::Cpu, cache_size)
}

pub fn pipeline(dir: &Path, loader: impl ModelLoader + 'static, cache_size: usize) -> PredictionPipeline {
    PredictionPipeline::new(manager(dir, loader, cache_size))
}

pub fn test_image() -> RgbImage {
    RgbImage::new(160, 120)
}
