use std::fs;
use std::path::Path;

use image::{imageops::FilterType, DynamicImage, GrayImage, RgbImage};
use mask::MaskArtifactEncoder;
use segment::SegmentConfig;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::debug;

/// Hex characters kept from the path digest
const IDENTITY_LEN: usize = 12;

#[derive(Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    Image(#[from] image::ImageError),
    #[error(transparent)]
    Mask(#[from] mask::MaskError),
    #[error(transparent)]
    Segment(#[from] segment::SegmentError),
    #[error(transparent)]
    IoError(#[from] std::io::Error),
}

/// An image ready for prediction together with its identity
#[derive(Debug, Clone)]
pub struct LoadedImage {
    pub id: String,
    pub image: RgbImage,
    /// Dimensions before any downscaling
    pub original_size: (u32, u32),
}

/// Decodes image files into RGB8, bounded to a maximum side length
#[derive(Debug, Clone)]
pub struct ImageSource {
    max_size: u32,
}

impl ImageSource {
    pub fn new(max_size: u32) -> Self {
        Self { max_size: max_size.max(1) }
    }

    pub fn from_config(config: &SegmentConfig) -> Self {
        Self::new(config.max_image_size)
    }

    pub fn load<P: AsRef<Path>>(&self, path: P) -> Result<LoadedImage, CliError> {
        let path = path.as_ref();
        let decoded = image::open(path)?;
        let original_size = (decoded.width(), decoded.height());
        let image = self.prepare(decoded);
        debug!(
            path = %path.display(),
            original = ?original_size,
            prepared = ?image.dimensions(),
            "image loaded"
        );

        Ok(LoadedImage {
            id: image_identity(path)?,
            image,
            original_size,
        })
    }

    /// Convert to RGB8, shrinking so the longest side fits `max_size`
    pub fn prepare(&self, image: DynamicImage) -> RgbImage {
        if image.width().max(image.height()) > self.max_size {
            image.resize(self.max_size, self.max_size, FilterType::Lanczos3).to_rgb8()
        } else {
            image.to_rgb8()
        }
    }
}

/// Stable identity for an image file: a prefix of the SHA-256 of its
/// canonical path
pub fn image_identity<P: AsRef<Path>>(path: P) -> Result<String, CliError> {
    let canonical = fs::canonicalize(path)?;
    let mut hasher = Sha256::new();
    hasher.update(canonical.to_string_lossy().as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    Ok(digest[..IDENTITY_LEN].to_string())
}

/// Configuration file (if any) with `SAM_*` environment overrides on top
pub fn load_config(path: Option<&Path>) -> Result<SegmentConfig, CliError> {
    let config = match path {
        Some(path) => SegmentConfig::from_file(path)?,
        None => SegmentConfig::default(),
    };
    Ok(config.with_env_overrides()?)
}

/// Write a mask as a PNG overlay in `color`
pub fn write_mask_overlay<P: AsRef<Path>>(mask: &GrayImage, color: [u8; 4], path: P) -> Result<(), CliError> {
    let png = MaskArtifactEncoder::new(color).to_png(mask)?;
    fs::write(path, png)?;
    Ok(())
}

fn parse_floats<const N: usize>(value: &str) -> Result<[f32; N], String> {
    let parts: Vec<&str> = value.split(',').map(str::trim).collect();
    if parts.len() != N {
        return Err(format!("expected {} comma separated numbers, got {:?}", N, value));
    }

    let mut out = [0.0f32; N];
    for (slot, part) in out.iter_mut().zip(parts) {
        *slot = part
            .parse::<f32>()
            .map_err(|_| format!("{:?} is not a number", part))?;
        if !slot.is_finite() {
            return Err(format!("{:?} is not a finite number", part));
        }
    }
    Ok(out)
}

/// Parse `x,y`
pub fn parse_point(value: &str) -> Result<[f32; 2], String> {
    parse_floats::<2>(value)
}

/// Parse `x_min,y_min,x_max,y_max`
pub fn parse_bbox(value: &str) -> Result<[f32; 4], String> {
    let bbox = parse_floats::<4>(value)?;
    if bbox[2] < bbox[0] || bbox[3] < bbox[1] {
        return Err(format!("box corners are inverted: {:?}", value));
    }
    Ok(bbox)
}
