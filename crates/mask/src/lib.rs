//! # Mask Polygon Library
//!
//! Converts binary segmentation masks into simplified polygons suitable for
//! annotation, plus the helpers a prediction service needs around that:
//! coordinate normalization and an encoded overlay artifact.
//!
//! The conversion is deterministic and model-independent:
//!
//! 1. Binarize (any non-zero pixel is foreground)
//! 2. Extract outermost contours
//! 3. Keep the contour with the largest enclosed area
//! 4. Simplify with Douglas-Peucker at `epsilon * perimeter / 1000`
//! 5. Fall back to the raw contour if simplification degenerates
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use mask::{MaskPolygonizer, MaskArtifactEncoder};
//!
//! let mask = image::open("mask.png")?.to_luma8();
//! let polygon = MaskPolygonizer::default().convert(&mask, 2.0)?;
//! let normalized = polygon.normalized(mask.width(), mask.height())?;
//! let overlay = MaskArtifactEncoder::default().encode(&mask)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod error;
pub mod types;
pub mod traits;
pub mod algorithms;
pub mod pipeline;
pub mod io;

pub use error::{MaskError, Result};
pub use types::{MaskPolygon, normalize_points, denormalize_points};
pub use traits::*;
pub use algorithms::*;
pub use pipeline::{
    MaskPolygonizer, DEFAULT_EPSILON, DEFAULT_MIN_POLYGON_POINTS,
    builder::PolygonizerBuilder,
};
pub use io::*;
