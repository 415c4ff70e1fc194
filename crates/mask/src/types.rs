use serde::{Deserialize, Serialize};
use geo_types::{Coord, LineString};

use crate::error::{MaskError, Result};

/// Outline of a single mask region.
///
/// `points` is an open ring in pixel space: the closing edge from the last
/// point back to the first is implicit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MaskPolygon {
    pub points: Vec<[f32; 2]>,
    /// Enclosed area in pixel², measured on the unsimplified contour
    pub area: f64,
}

impl MaskPolygon {
    /// The polygon produced for a mask with no foreground
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Whether the polygon has enough vertices to be used as an annotation
    pub fn is_valid(&self, min_points: usize) -> bool {
        self.points.len() >= min_points
    }

    /// Points divided component-wise by the image dimensions
    pub fn normalized(&self, width: u32, height: u32) -> Result<Vec<[f32; 2]>> {
        normalize_points(&self.points, width, height)
    }

    /// Get the bounding box of the polygon, or `None` when it has no points
    pub fn bounding_box(&self) -> Option<([f32; 2], [f32; 2])> {
        if self.points.is_empty() {
            return None;
        }

        let mut min = [f32::INFINITY; 2];
        let mut max = [f32::NEG_INFINITY; 2];
        for &[x, y] in &self.points {
            min[0] = min[0].min(x);
            min[1] = min[1].min(y);
            max[0] = max[0].max(x);
            max[1] = max[1].max(y);
        }

        Some((min, max))
    }

    /// Length of the closed outline, including the implicit closing edge
    pub fn perimeter(&self) -> f64 {
        crate::algorithms::geometry::ring_perimeter(&self.points)
    }
}

/// Build a closed LineString from an open ring of pixel coordinates.
pub(crate) fn ring_to_linestring(points: &[[f32; 2]]) -> LineString<f64> {
    let mut coords: Vec<Coord<f64>> = points
        .iter()
        .map(|&[x, y]| Coord { x: x as f64, y: y as f64 })
        .collect();

    if let (Some(&first), Some(&last)) = (coords.first(), coords.last()) {
        if coords.len() > 1 && first != last {
            coords.push(first);
        }
    }

    LineString::new(coords)
}

fn check_dimensions(width: u32, height: u32) -> Result<()> {
    if width == 0 || height == 0 {
        return Err(MaskError::DegenerateImage { width, height });
    }
    Ok(())
}

/// Map pixel coordinates into the unit square of an image of the given size.
pub fn normalize_points(points: &[[f32; 2]], width: u32, height: u32) -> Result<Vec<[f32; 2]>> {
    check_dimensions(width, height)?;
    let (w, h) = (width as f64, height as f64);

    Ok(points
        .iter()
        .map(|&[x, y]| [(x as f64 / w) as f32, (y as f64 / h) as f32])
        .collect())
}

/// Inverse of [`normalize_points`].
pub fn denormalize_points(points: &[[f32; 2]], width: u32, height: u32) -> Result<Vec<[f32; 2]>> {
    check_dimensions(width, height)?;
    let (w, h) = (width as f64, height as f64);

    Ok(points
        .iter()
        .map(|&[x, y]| [(x as f64 * w) as f32, (y as f64 * h) as f32])
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> MaskPolygon {
        MaskPolygon {
            points: vec![[0.0, 0.0], [10.0, 0.0], [10.0, 10.0], [0.0, 10.0]],
            area: 100.0,
        }
    }

    #[test]
    fn test_perimeter_includes_closing_edge() {
        assert!((square().perimeter() - 40.0).abs() < 1e-9);
    }

    #[test]
    fn test_bounding_box() {
        let (min, max) = square().bounding_box().expect("non-empty polygon");
        assert_eq!(min, [0.0, 0.0]);
        assert_eq!(max, [10.0, 10.0]);
        assert!(MaskPolygon::empty().bounding_box().is_none());
    }

    #[test]
    fn test_normalize_into_unit_square() {
        let normalized = square().normalized(20, 40).expect("valid dimensions");
        assert_eq!(normalized[2], [0.5, 0.25]);
        for [x, y] in normalized {
            assert!((0.0..=1.0).contains(&x));
            assert!((0.0..=1.0).contains(&y));
        }
    }

    #[test]
    fn test_normalize_rejects_zero_dimensions() {
        assert!(matches!(
            normalize_points(&[[1.0, 1.0]], 0, 10),
            Err(MaskError::DegenerateImage { width: 0, height: 10 })
        ));
    }

    #[test]
    fn test_validity_threshold() {
        assert!(square().is_valid(3));
        assert!(!square().is_valid(5));
        assert!(!MaskPolygon::empty().is_valid(3));
    }
}
