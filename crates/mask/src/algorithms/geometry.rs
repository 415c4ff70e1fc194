use crate::types::ring_to_linestring;
use geo_types::Polygon;

/// Enclosed area of an open ring (shoelace), always non-negative.
pub fn ring_area(ring: &[[f32; 2]]) -> f64 {
    use geo::Area;

    if ring.len() < 3 {
        return 0.0;
    }
    Polygon::new(ring_to_linestring(ring), vec![]).unsigned_area()
}

/// Arc length of an open ring treated as closed.
pub fn ring_perimeter(ring: &[[f32; 2]]) -> f64 {
    use geo::EuclideanLength;
    ring_to_linestring(ring).euclidean_length()
}

/// Index of the ring with the largest enclosed area. Ties go to the ring
/// encountered first.
pub fn largest_ring(rings: &[Vec<[f32; 2]>]) -> Option<(usize, f64)> {
    let mut best: Option<(usize, f64)> = None;

    for (index, ring) in rings.iter().enumerate() {
        let area = ring_area(ring);
        match best {
            Some((_, best_area)) if area <= best_area => {}
            _ => best = Some((index, area)),
        }
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_area_is_orientation_independent() {
        let ccw = vec![[0.0, 0.0], [4.0, 0.0], [4.0, 3.0], [0.0, 3.0]];
        let cw: Vec<[f32; 2]> = ccw.iter().rev().copied().collect();
        assert!((ring_area(&ccw) - 12.0).abs() < 1e-9);
        assert!((ring_area(&cw) - 12.0).abs() < 1e-9);
    }

    #[test]
    fn test_degenerate_rings_have_zero_area() {
        assert_eq!(ring_area(&[]), 0.0);
        assert_eq!(ring_area(&[[3.0, 3.0]]), 0.0);
        assert_eq!(ring_area(&[[0.0, 0.0], [5.0, 0.0]]), 0.0);
    }

    #[test]
    fn test_perimeter_of_closed_square() {
        let square = vec![[0.0, 0.0], [2.0, 0.0], [2.0, 2.0], [0.0, 2.0]];
        assert!((ring_perimeter(&square) - 8.0).abs() < 1e-9);
    }

    #[test]
    fn test_largest_ring_prefers_first_on_tie() {
        let a = vec![[0.0, 0.0], [2.0, 0.0], [2.0, 2.0], [0.0, 2.0]];
        let b = vec![[5.0, 5.0], [7.0, 5.0], [7.0, 7.0], [5.0, 7.0]];
        let c = vec![[0.0, 0.0], [9.0, 0.0], [9.0, 1.0]];

        assert_eq!(largest_ring(&[a.clone(), b.clone()]).map(|(i, _)| i), Some(0));
        assert_eq!(largest_ring(&[c, a, b]).map(|(i, _)| i), Some(0));
        assert_eq!(largest_ring(&[]), None);
    }
}
