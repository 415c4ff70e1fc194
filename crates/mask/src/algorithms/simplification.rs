use crate::{error::Result, traits::ShapeSimplifier, types::ring_to_linestring};

/// Douglas-Peucker simplifier using geo crate's implementation.
///
/// The ring is closed before simplifying so the implicit closing edge is
/// approximated too, then reopened.
#[derive(Debug, Clone, Default)]
pub struct DouglasPeuckerSimplifier;

impl ShapeSimplifier for DouglasPeuckerSimplifier {
    fn simplify(&self, ring: &[[f32; 2]], tolerance: f64) -> Result<Vec<[f32; 2]>> {
        use geo::Simplify;

        if ring.len() < 3 {
            return Ok(ring.to_vec());
        }

        let closed = ring_to_linestring(ring);
        let simplified = closed.simplify(&tolerance);

        let mut points: Vec<[f32; 2]> = simplified
            .coords()
            .map(|coord| [coord.x as f32, coord.y as f32])
            .collect();

        if points.len() > 1 && points.first() == points.last() {
            points.pop();
        }

        Ok(points)
    }
}
