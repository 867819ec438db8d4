//! Detector orchestration: finder triple → geometry → rectified bit grid.

use log::debug;
use nalgebra::Point2;
use yomu_core::BitMatrix;

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::alignment::{AlignmentPattern, AlignmentPatternFinder};
use crate::error::DetectionError;
use crate::finder::{FinderPatternFinder, FinderPatternGroup};
use crate::perspective::PerspectiveTransform;
use crate::sampler::sample_grid;

/// Default half-width, in modules, of the alignment search region.
pub const DEFAULT_ALIGNMENT_ALLOWANCE: u32 = 15;
/// Tight allowance used by the first detection attempt.
pub const TIGHT_ALIGNMENT_ALLOWANCE: u32 = 5;

const MIN_DIMENSION: i32 = 21;
const MAX_DIMENSION: i32 = 177;

/// A rectified symbol grid plus the image-space landmarks that produced it.
#[derive(Clone, Debug)]
pub struct DetectorResult {
    pub bits: BitMatrix,
    /// Pattern centers: bottom-left, top-left, top-right, and the alignment
    /// pattern when one was used.
    pub points: Vec<Point2<f64>>,
}

/// Geometric QR symbol detector over a binarized image.
pub struct Detector<'a> {
    image: &'a BitMatrix,
}

impl<'a> Detector<'a> {
    pub fn new(image: &'a BitMatrix) -> Self {
        Self { image }
    }

    /// Detect the most plausible symbol.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "debug", skip(self), fields(width = self.image.width(), height = self.image.height()))
    )]
    pub fn detect(&self, alignment_allowance: u32) -> Result<DetectorResult, DetectionError> {
        let group = FinderPatternFinder::find(self.image)?;
        self.process_group(&group, alignment_allowance)
    }

    /// Detect every non-overlapping symbol; groups that fail geometry
    /// checks are skipped rather than failing the whole call.
    #[cfg_attr(feature = "tracing", instrument(level = "debug", skip(self)))]
    pub fn detect_multi(&self, alignment_allowance: u32) -> Vec<DetectorResult> {
        FinderPatternFinder::find_multi(self.image)
            .iter()
            .filter_map(|group| match self.process_group(group, alignment_allowance) {
                Ok(result) => Some(result),
                Err(err) => {
                    debug!("skipping finder triple: {err}");
                    None
                }
            })
            .collect()
    }

    fn process_group(
        &self,
        group: &FinderPatternGroup,
        alignment_allowance: u32,
    ) -> Result<DetectorResult, DetectionError> {
        let top_left = group.top_left.position;
        let top_right = group.top_right.position;
        let bottom_left = group.bottom_left.position;

        let module_size = (group.top_left.module_size
            + group.top_right.module_size
            + group.bottom_left.module_size)
            / 3.0;
        if module_size < 1.0 {
            return Err(DetectionError::ModuleSizeTooSmall);
        }

        let dimension = compute_dimension(&top_left, &top_right, &bottom_left, module_size)?;
        let provisional_version = (dimension - 17) / 4;

        let mut alignment: Option<AlignmentPattern> = None;
        if provisional_version > 1 {
            // Expected alignment center, extrapolated across the symbol.
            let t = (dimension as f64 - 10.5) / (dimension as f64 - 7.0);
            let est = top_left + t * ((bottom_left - top_left) + (top_right - top_left));
            alignment =
                self.find_alignment_in_region(module_size, est.x, est.y, alignment_allowance);
            if alignment.is_none() {
                debug!("no alignment pattern; falling back to parallelogram corner");
            }
        }

        let dim = dimension as f64;
        let dim_minus_three = dim - 3.5;
        let (bottom_right, source_bottom_right) = match &alignment {
            Some(pattern) => (pattern.position, dim_minus_three - 3.0),
            None => (bottom_left + (top_right - top_left), dim_minus_three),
        };

        let transform = PerspectiveTransform::quadrilateral_to_quadrilateral(
            &[
                Point2::new(3.5, 3.5),
                Point2::new(dim_minus_three, 3.5),
                Point2::new(source_bottom_right, source_bottom_right),
                Point2::new(3.5, dim_minus_three),
            ],
            &[top_left, top_right, bottom_right, bottom_left],
        );

        let bits = sample_grid(self.image, &transform, dimension as usize);

        let mut points = vec![bottom_left, top_left, top_right];
        if let Some(pattern) = alignment {
            points.push(pattern.position);
        }
        Ok(DetectorResult { bits, points })
    }

    /// Search a square region of radius `allowance * module_size` around
    /// the expected center.
    fn find_alignment_in_region(
        &self,
        module_size: f64,
        est_x: f64,
        est_y: f64,
        allowance: u32,
    ) -> Option<AlignmentPattern> {
        let allowance_px = (allowance as f64 * module_size) as i64;
        let width = self.image.width() as i64;
        let height = self.image.height() as i64;

        let left = (est_x as i64 - allowance_px).max(0);
        let right = (est_x as i64 + allowance_px).min(width - 1);
        let top = (est_y as i64 - allowance_px).max(0);
        let bottom = (est_y as i64 + allowance_px).min(height - 1);
        if right - left < (3.0 * module_size) as i64 || bottom - top < (3.0 * module_size) as i64
        {
            return None;
        }

        AlignmentPatternFinder::new(
            self.image,
            left as usize,
            top as usize,
            (right - left) as usize,
            (bottom - top) as usize,
            module_size,
        )
        .find()
    }
}

fn compute_dimension(
    top_left: &Point2<f64>,
    top_right: &Point2<f64>,
    bottom_left: &Point2<f64>,
    module_size: f64,
) -> Result<i32, DetectionError> {
    let dim_top = ((top_left - top_right).norm() / module_size).round() as i32 + 7;
    let dim_left = ((top_left - bottom_left).norm() / module_size).round() as i32 + 7;
    let dimension = adjust_dimension((dim_top + dim_left) / 2);
    if !(MIN_DIMENSION..=MAX_DIMENSION).contains(&dimension) {
        return Err(DetectionError::DimensionOutOfRange { dimension });
    }
    Ok(dimension)
}

/// Nudge a dimension estimate to the nearest value ≡ 1 (mod 4).
pub fn adjust_dimension(dimension: i32) -> i32 {
    match dimension & 0x03 {
        0 => dimension + 1,
        2 => dimension - 1,
        3 => dimension + 2,
        _ => dimension,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alignment::tests::draw_alignment_pattern;
    use crate::finder::tests::draw_finder_pattern;

    #[test]
    fn adjusted_dimensions_are_one_mod_four() {
        for n in 18..=180 {
            let adjusted = adjust_dimension(n);
            assert_eq!(adjusted.rem_euclid(4), 1, "from {n}");
            assert!((adjusted - n).abs() <= 2, "from {n}");
        }
    }

    fn version1_skeleton(scale: usize) -> BitMatrix {
        let dim = 21 * scale;
        let mut m = BitMatrix::new(dim, dim);
        draw_finder_pattern(&mut m, 0, 0, scale);
        draw_finder_pattern(&mut m, 14 * scale, 0, scale);
        draw_finder_pattern(&mut m, 0, 14 * scale, scale);
        for t in (8..13).step_by(2) {
            for p in 0..scale {
                for q in 0..scale {
                    m.set(t * scale + p, 6 * scale + q);
                    m.set(6 * scale + p, t * scale + q);
                }
            }
        }
        m
    }

    #[test]
    fn detects_synthetic_version1_grid() {
        let m = version1_skeleton(3);
        let result = Detector::new(&m)
            .detect(DEFAULT_ALIGNMENT_ALLOWANCE)
            .expect("detect");
        assert_eq!(result.bits.width(), 21);
        assert_eq!(result.bits.height(), 21);
        // Center of the top-left finder pattern.
        assert!(result.bits.get(3, 3));
        // White separator module inside the pattern ring.
        assert!(!result.bits.get(1, 5));
        assert_eq!(result.points.len(), 3);
    }

    #[test]
    fn detects_version2_with_alignment_pattern() {
        // Version 2: 25 modules, alignment center at (18, 18).
        let scale = 4usize;
        let dim = 25 * scale;
        let mut m = BitMatrix::new(dim, dim);
        draw_finder_pattern(&mut m, 0, 0, scale);
        draw_finder_pattern(&mut m, 18 * scale, 0, scale);
        draw_finder_pattern(&mut m, 0, 18 * scale, scale);
        draw_alignment_pattern(&mut m, 18, 18, scale);
        for t in (8..17).step_by(2) {
            for p in 0..scale {
                for q in 0..scale {
                    m.set(t * scale + p, 6 * scale + q);
                    m.set(6 * scale + p, t * scale + q);
                }
            }
        }

        let result = Detector::new(&m)
            .detect(DEFAULT_ALIGNMENT_ALLOWANCE)
            .expect("detect");
        assert_eq!(result.bits.width(), 25);
        // Alignment pattern used as the fourth landmark.
        assert_eq!(result.points.len(), 4);
        assert!(result.bits.get(18, 18), "alignment core module");
        assert!(result.bits.get(3, 3));
    }

    #[test]
    fn blank_image_fails_with_detection_error() {
        let m = BitMatrix::new(100, 100);
        assert!(Detector::new(&m).detect(DEFAULT_ALIGNMENT_ALLOWANCE).is_err());
    }
}
