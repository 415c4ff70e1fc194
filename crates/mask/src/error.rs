use thiserror::Error;

#[derive(Error, Debug)]
pub enum MaskError {
    #[error("Failed to encode mask image: {0}")]
    ImageEncode(#[from] image::ImageError),

    #[error("Invalid simplification epsilon {0}: must be finite and non-negative")]
    InvalidEpsilon(f64),

    #[error("Cannot normalize against a degenerate image of {width}x{height}")]
    DegenerateImage { width: u32, height: u32 },
}

pub type Result<T> = std::result::Result<T, MaskError>;
