//! Contour shape similarity
//!
//! Secondary signal used by the max profile: compare the outline of a title
//! glyph with the outline of a candidate crop through log-scaled Hu moment
//! invariants. Candidates are tried in both polarities since some renders
//! invert foreground and background relative to the title band.

use crate::decoder::crop;
use crate::preprocess::{binarize_otsu, luma_601};
use crate::profile::ShapeRefinement;
use crate::types::BoundingBox;
use image::{imageops, GrayImage, RgbImage};
use imageproc::contours::{find_contours, BorderType};

/// Distance reported when a candidate has no contour in either polarity
pub const NO_CONTOUR_DISTANCE: f64 = 999.0;

/// Magnitudes at or below this are ignored by the distance
const HU_EPSILON: f64 = 1e-5;

/// The seven Hu moment invariants of a closed outline
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HuMoments(pub [f64; 7]);

impl HuMoments {
    /// Moments of the polygon traced by `points` (Green's theorem)
    pub fn from_polygon(points: &[(f64, f64)]) -> Self {
        let n = points.len();
        if n == 0 {
            return HuMoments([0.0; 7]);
        }

        let (mut a00, mut a10, mut a01): (f64, f64, f64) = (0.0, 0.0, 0.0);
        let (mut a20, mut a11, mut a02): (f64, f64, f64) = (0.0, 0.0, 0.0);
        let (mut a30, mut a21, mut a12, mut a03): (f64, f64, f64, f64) = (0.0, 0.0, 0.0, 0.0);

        let (mut xp, mut yp) = points[n - 1];
        for &(x, y) in points {
            let xp2 = xp * xp;
            let yp2 = yp * yp;
            let x2 = x * x;
            let y2 = y * y;
            let cross = xp * y - x * yp;

            a00 += cross;
            a10 += cross * (xp + x);
            a01 += cross * (yp + y);
            a20 += cross * (xp2 + xp * x + x2);
            a11 += cross * (xp * (2.0 * yp + y) + x * (yp + 2.0 * y));
            a02 += cross * (yp2 + yp * y + y2);
            a30 += cross * (xp + x) * (xp2 + x2);
            a21 += cross * (xp2 * (3.0 * yp + y) + 2.0 * xp * x * (yp + y) + x2 * (yp + 3.0 * y));
            a12 += cross * (yp2 * (3.0 * xp + x) + 2.0 * yp * y * (xp + x) + y2 * (xp + 3.0 * x));
            a03 += cross * (yp + y) * (yp2 + y2);

            xp = x;
            yp = y;
        }

        if a00.abs() <= f32::EPSILON as f64 {
            return HuMoments([0.0; 7]);
        }

        // orientation-independent: flip so the area comes out positive
        let sign = a00.signum();
        let m00 = sign * a00 / 2.0;
        let m10 = sign * a10 / 6.0;
        let m01 = sign * a01 / 6.0;
        let m20 = sign * a20 / 12.0;
        let m11 = sign * a11 / 24.0;
        let m02 = sign * a02 / 12.0;
        let m30 = sign * a30 / 20.0;
        let m21 = sign * a21 / 60.0;
        let m12 = sign * a12 / 60.0;
        let m03 = sign * a03 / 20.0;

        let cx = m10 / m00;
        let cy = m01 / m00;

        let mu20 = m20 - cx * m10;
        let mu11 = m11 - cx * m01;
        let mu02 = m02 - cy * m01;
        let mu30 = m30 - 3.0 * cx * m20 + 2.0 * cx * cx * m10;
        let mu21 = m21 - 2.0 * cx * m11 - cy * m20 + 2.0 * cx * cx * m01;
        let mu12 = m12 - 2.0 * cy * m11 - cx * m02 + 2.0 * cy * cy * m10;
        let mu03 = m03 - 3.0 * cy * m02 + 2.0 * cy * cy * m01;

        let s2 = 1.0 / (m00 * m00);
        let s3 = s2 / m00.sqrt();
        let (n20, n11, n02) = (mu20 * s2, mu11 * s2, mu02 * s2);
        let (n30, n21, n12, n03) = (mu30 * s3, mu21 * s3, mu12 * s3, mu03 * s3);

        let t0 = n30 + n12;
        let t1 = n21 + n03;
        let q0 = n20 - n02;
        let q1 = n30 - 3.0 * n12;
        let q2 = 3.0 * n21 - n03;

        HuMoments([
            n20 + n02,
            q0 * q0 + 4.0 * n11 * n11,
            q1 * q1 + q2 * q2,
            t0 * t0 + t1 * t1,
            q1 * t0 * (t0 * t0 - 3.0 * t1 * t1) + q2 * t1 * (3.0 * t0 * t0 - t1 * t1),
            q0 * (t0 * t0 - t1 * t1) + 4.0 * n11 * t0 * t1,
            q2 * t0 * (t0 * t0 - 3.0 * t1 * t1) - q1 * t1 * (3.0 * t0 * t0 - t1 * t1),
        ])
    }

    /// Sum of absolute differences of the signed log10 invariants
    ///
    /// Invariants that are negligible on either side are skipped.
    pub fn distance(&self, other: &HuMoments) -> f64 {
        self.0
            .iter()
            .zip(other.0.iter())
            .filter(|(a, b)| a.abs() > HU_EPSILON && b.abs() > HU_EPSILON)
            .map(|(a, b)| (signed_log(*a) - signed_log(*b)).abs())
            .sum()
    }
}

fn signed_log(v: f64) -> f64 {
    v.signum() * v.abs().log10()
}

/// Absolute polygon area (shoelace)
pub fn polygon_area(points: &[(f64, f64)]) -> f64 {
    let n = points.len();
    if n < 3 {
        return 0.0;
    }
    let mut twice: f64 = 0.0;
    let (mut xp, mut yp) = points[n - 1];
    for &(x, y) in points {
        twice += xp * y - x * yp;
        xp = x;
        yp = y;
    }
    twice.abs() / 2.0
}

/// Outline of the largest top-level foreground region, by polygon area
///
/// The mask is framed with one background pixel first, so a region that
/// touches the image edge still has an outer border. Ties keep the first
/// contour found.
pub fn largest_external_contour(binary: &GrayImage) -> Option<Vec<(f64, f64)>> {
    find_contours::<i32>(&framed(binary))
        .into_iter()
        .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
        .map(|c| {
            c.points
                .iter()
                .map(|p| ((p.x - 1) as f64, (p.y - 1) as f64))
                .collect::<Vec<_>>()
        })
        .fold(None, |best: Option<(f64, Vec<(f64, f64)>)>, points| {
            let area = polygon_area(&points);
            match best {
                Some((best_area, _)) if best_area >= area => best,
                _ => Some((area, points)),
            }
        })
        .map(|(_, points)| points)
}

/// Copy of `binary` inside a one pixel background border
fn framed(binary: &GrayImage) -> GrayImage {
    let (width, height) = binary.dimensions();
    let mut out = GrayImage::new(width + 2, height + 2);
    imageops::replace(&mut out, binary, 1, 1);
    out
}

/// Shape signals for one solve call
pub struct ShapeScorer {
    settings: ShapeRefinement,
}

impl ShapeScorer {
    pub fn new(settings: ShapeRefinement) -> Self {
        Self { settings }
    }

    /// Invariants of a title glyph, if it has any foreground outline
    pub fn title_moments(&self, glyph: &RgbImage) -> Option<HuMoments> {
        let binary = binarize_otsu(&luma_601(glyph), false);
        largest_external_contour(&binary).map(|c| HuMoments::from_polygon(&c))
    }

    /// Invariants of a candidate in normal then inverted polarity
    ///
    /// A polarity without any contour is left out.
    pub fn candidate_moments(
        &self,
        click_area: &RgbImage,
        bbox: &BoundingBox,
    ) -> Vec<HuMoments> {
        let (width, height) = click_area.dimensions();
        let region = bbox.padded(self.settings.candidate_pad, width, height);
        if region.is_empty() {
            return Vec::new();
        }
        let gray = luma_601(&crop(click_area, &region));
        [false, true]
            .iter()
            .filter_map(|&inverted| largest_external_contour(&binarize_otsu(&gray, inverted)))
            .map(|c| HuMoments::from_polygon(&c))
            .collect()
    }

    /// Similarity in `[0, ceiling]`; larger is more alike
    pub fn similarity(&self, title: Option<&HuMoments>, candidate: &[HuMoments]) -> f64 {
        let Some(title) = title else {
            return 0.0;
        };
        let best = candidate
            .iter()
            .map(|c| title.distance(c))
            .fold(NO_CONTOUR_DISTANCE, f64::min);
        (self.settings.distance_ceiling - best).max(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Luma, Rgb};

    fn rect(x: f64, y: f64, w: f64, h: f64) -> Vec<(f64, f64)> {
        vec![(x, y), (x + w, y), (x + w, y + h), (x, y + h)]
    }

    fn mask(width: u32, height: u32, on: impl Fn(u32, u32) -> bool) -> GrayImage {
        ImageBuffer::from_fn(width, height, |x, y| {
            if on(x, y) {
                Luma([255u8])
            } else {
                Luma([0u8])
            }
        })
    }

    fn scorer() -> ShapeScorer {
        ShapeScorer::new(ShapeRefinement::default())
    }

    #[test]
    fn test_polygon_area() {
        assert_eq!(polygon_area(&rect(0.0, 0.0, 4.0, 3.0)), 12.0);
        assert_eq!(polygon_area(&[(0.0, 0.0), (1.0, 1.0)]), 0.0);
    }

    #[test]
    fn test_square_first_invariant() {
        let hu = HuMoments::from_polygon(&rect(3.0, 7.0, 10.0, 10.0));
        assert!((hu.0[0] - 1.0 / 6.0).abs() < 1e-9);
        assert!(hu.0[1].abs() < 1e-12);
    }

    #[test]
    fn test_moments_ignore_orientation_and_scale() {
        let mut clockwise = rect(0.0, 0.0, 20.0, 5.0);
        clockwise.reverse();
        let a = HuMoments::from_polygon(&clockwise);
        let b = HuMoments::from_polygon(&rect(50.0, 50.0, 40.0, 10.0));
        assert!(a.distance(&b) < 1e-9);
    }

    #[test]
    fn test_degenerate_polygon_has_zero_moments() {
        let hu = HuMoments::from_polygon(&[(1.0, 1.0)]);
        assert_eq!(hu, HuMoments([0.0; 7]));
    }

    #[test]
    fn test_distance_grows_with_shape_difference() {
        let square = HuMoments::from_polygon(&rect(0.0, 0.0, 10.0, 10.0));
        let near = HuMoments::from_polygon(&rect(0.0, 0.0, 10.0, 9.0));
        let bar = HuMoments::from_polygon(&rect(0.0, 0.0, 20.0, 3.0));
        assert!(square.distance(&near) < square.distance(&bar));
    }

    #[test]
    fn test_largest_external_contour_picks_biggest_blob() {
        let binary = mask(40, 40, |x, y| {
            let small = (2..6).contains(&x) && (2..6).contains(&y);
            let large = (10..30).contains(&x) && (10..30).contains(&y);
            small || large
        });
        let contour = largest_external_contour(&binary).unwrap();
        assert!(contour.iter().all(|&(x, y)| x >= 10.0 && y >= 10.0));
    }

    #[test]
    fn test_no_foreground_no_contour() {
        assert!(largest_external_contour(&mask(10, 10, |_, _| false)).is_none());
    }

    #[test]
    fn test_title_without_outline_scores_zero() {
        let black: RgbImage = ImageBuffer::from_pixel(20, 20, Rgb([0u8, 0, 0]));
        let s = scorer();
        let title = s.title_moments(&black);
        assert!(title.is_none());
        let candidate = vec![HuMoments::from_polygon(&rect(0.0, 0.0, 5.0, 5.0))];
        assert_eq!(s.similarity(title.as_ref(), &candidate), 0.0);
    }

    #[test]
    fn test_missing_candidate_contour_scores_zero() {
        let s = scorer();
        let title = HuMoments::from_polygon(&rect(0.0, 0.0, 5.0, 5.0));
        assert_eq!(s.similarity(Some(&title), &[]), 0.0);
    }

    #[test]
    fn test_inverted_candidate_matches_title() {
        // bright square on dark ground for the title
        let glyph: RgbImage = ImageBuffer::from_fn(20, 20, |x, y| {
            if (4..16).contains(&x) && (4..16).contains(&y) {
                Rgb([255u8, 255, 255])
            } else {
                Rgb([0u8, 0, 0])
            }
        });
        // dark square on bright ground for the candidate
        let area: RgbImage = ImageBuffer::from_fn(100, 40, |x, y| {
            if (40..60).contains(&x) && (10..30).contains(&y) {
                Rgb([0u8, 0, 0])
            } else {
                Rgb([255u8, 255, 255])
            }
        });

        let s = scorer();
        let title = s.title_moments(&glyph).unwrap();
        let candidates = s.candidate_moments(&area, &BoundingBox::new(20, 10, 80, 30));
        assert_eq!(candidates.len(), 2);

        let normal = title.distance(&candidates[0]);
        let inverted = title.distance(&candidates[1]);
        assert!(inverted < normal);

        let score = s.similarity(Some(&title), &candidates);
        assert!((score - (2.0 - inverted)).abs() < 1e-12);
        assert!(score > 1.9);
    }

    #[test]
    fn test_region_touching_edge_keeps_outline() {
        // dark square on white, not inverted: the white ground is foreground
        let binary = binarize_otsu(
            &mask(30, 20, |x, y| !((10..20).contains(&x) && (5..15).contains(&y))),
            false,
        );
        let contour = largest_external_contour(&binary).unwrap();
        assert_eq!(polygon_area(&contour), 29.0 * 19.0);
        assert!(contour
            .iter()
            .all(|&(x, y)| (0.0..=29.0).contains(&x) && (0.0..=19.0).contains(&y)));
    }

    #[test]
    fn test_dark_title_matches_identical_dark_candidate() {
        let ink = |inside: bool| {
            if inside {
                Rgb([20u8, 20, 20])
            } else {
                Rgb([240u8, 240, 240])
            }
        };
        let glyph: RgbImage = ImageBuffer::from_fn(20, 20, |x, y| {
            ink((5..15).contains(&x) && (3..17).contains(&y))
        });
        let area: RgbImage = ImageBuffer::from_fn(100, 40, |x, y| {
            ink((45..55).contains(&x) && (13..27).contains(&y))
        });

        let s = scorer();
        let title = s.title_moments(&glyph);
        assert!(title.is_some());
        let candidates = s.candidate_moments(&area, &BoundingBox::new(40, 10, 60, 30));
        assert_eq!(candidates.len(), 2);
        assert!(s.similarity(title.as_ref(), &candidates) > 1.9);
    }
}
