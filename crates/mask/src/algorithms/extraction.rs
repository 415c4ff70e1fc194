use image::GrayImage;
use imageproc::contours::BorderType;
use imageproc::point::Point;
use crate::{error::Result, traits::ContourExtractor};

/// Imageproc-based contour extractor keeping only outermost borders.
///
/// Straight horizontal, vertical and diagonal runs are collapsed to their
/// end points, so a rectangle comes back as its four corners.
#[derive(Debug, Clone, Default)]
pub struct ImageprocContourExtractor;

impl ContourExtractor for ImageprocContourExtractor {
    fn extract_contours(&self, binary_image: &GrayImage) -> Result<Vec<Vec<[f32; 2]>>> {
        // Non-zero pixels are foreground.
        let contours = imageproc::contours::find_contours::<i32>(binary_image);

        let result = contours
            .into_iter()
            .filter(|contour| matches!(contour.border_type, BorderType::Outer) && contour.parent.is_none())
            .map(|contour| compress_runs(&contour.points))
            .collect();

        Ok(result)
    }
}

/// Drop every point whose incoming and outgoing steps are equal
fn compress_runs(points: &[Point<i32>]) -> Vec<[f32; 2]> {
    let n = points.len();
    if n < 3 {
        return points.iter().map(|p| [p.x as f32, p.y as f32]).collect();
    }

    let step = |from: Point<i32>, to: Point<i32>| (to.x - from.x, to.y - from.y);
    (0..n)
        .filter(|&i| {
            let prev = points[(i + n - 1) % n];
            let next = points[(i + 1) % n];
            step(prev, points[i]) != step(points[i], next)
        })
        .map(|i| [points[i].x as f32, points[i].y as f32])
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn test_empty_mask_has_no_contours() {
        let mask = GrayImage::new(32, 32);
        let contours = ImageprocContourExtractor.extract_contours(&mask).expect("extraction");
        assert!(contours.is_empty());
    }

    #[test]
    fn test_straight_runs_collapse_to_corners() {
        let mut mask = GrayImage::new(40, 30);
        for y in 5..20 {
            for x in 10..30 {
                mask.put_pixel(x, y, Luma([255u8]));
            }
        }

        let contours = ImageprocContourExtractor.extract_contours(&mask).expect("extraction");
        assert_eq!(contours.len(), 1);
        let mut corners = contours[0].clone();
        corners.sort_by(|a, b| a.partial_cmp(b).expect("finite"));
        assert_eq!(corners, vec![[10.0, 5.0], [10.0, 19.0], [29.0, 5.0], [29.0, 19.0]]);
    }

    #[test]
    fn test_diagonal_edges_keep_only_turns() {
        let points: Vec<Point<i32>> = [(0, 0), (1, 1), (2, 2), (3, 3), (2, 3), (1, 3), (0, 3), (0, 2), (0, 1)]
            .into_iter()
            .map(|(x, y)| Point::new(x, y))
            .collect();
        assert_eq!(compress_runs(&points), vec![[0.0, 0.0], [3.0, 3.0], [0.0, 3.0]]);
    }

    #[test]
    fn test_holes_and_islands_are_not_external() {
        // Ring with a hole, plus an island inside the hole.
        let mut mask = GrayImage::new(60, 60);
        for y in 5..55 {
            for x in 5..55 {
                let in_hole = (15..45).contains(&x) && (15..45).contains(&y);
                let in_island = (25..35).contains(&x) && (25..35).contains(&y);
                if !in_hole || in_island {
                    mask.put_pixel(x, y, Luma([255u8]));
                }
            }
        }

        let contours = ImageprocContourExtractor.extract_contours(&mask).expect("extraction");
        assert_eq!(contours.len(), 1);
        assert!(contours[0].contains(&[5.0, 5.0]));
    }

    #[test]
    fn test_separate_regions_in_encounter_order() {
        let mut mask = GrayImage::new(50, 20);
        for y in 2..8 {
            for x in 2..8 {
                mask.put_pixel(x, y, Luma([1u8]));
                mask.put_pixel(x + 30, y + 10, Luma([1u8]));
            }
        }

        let contours = ImageprocContourExtractor.extract_contours(&mask).expect("extraction");
        assert_eq!(contours.len(), 2);
        assert!(contours[0].contains(&[2.0, 2.0]));
        assert!(contours[1].contains(&[32.0, 12.0]));
    }
}
