pub mod preprocessing;
pub mod extraction;
pub mod geometry;
pub mod simplification;

pub use preprocessing::*;
pub use extraction::*;
pub use geometry::{largest_ring, ring_area, ring_perimeter};
pub use simplification::*;
