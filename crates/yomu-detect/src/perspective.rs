//! Plane-to-plane perspective mapping between module space and image space.

use nalgebra::{Matrix3, Point2, Vector3};

const DEGENERACY_EPS: f64 = 1e-10;

/// 3×3 homography applied as `p' ~ H · (x, y, 1)`.
///
/// The transform is affine when the bottom row is `(0, 0, 1)`; the batch
/// mapper skips the per-point division in that case.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PerspectiveTransform {
    h: Matrix3<f64>,
}

impl PerspectiveTransform {
    pub fn new(h: Matrix3<f64>) -> Self {
        Self { h }
    }

    #[inline]
    pub fn matrix(&self) -> &Matrix3<f64> {
        &self.h
    }

    #[inline]
    pub fn is_affine(&self) -> bool {
        self.h[(2, 0)] == 0.0 && self.h[(2, 1)] == 0.0 && self.h[(2, 2)] == 1.0
    }

    /// Map the unit square `(0,0) (1,0) (1,1) (0,1)` onto the given
    /// quadrilateral (corners in that order).
    ///
    /// The parallelogram case (`dx3 = dy3 = 0`) produces an exact affine
    /// transform; a vanishing perspective denominator also falls back to
    /// the affine solution.
    pub fn square_to_quadrilateral(quad: &[Point2<f64>; 4]) -> Self {
        let [p0, p1, p2, p3] = quad;
        let dx3 = p0.x - p1.x + p2.x - p3.x;
        let dy3 = p0.y - p1.y + p2.y - p3.y;

        let affine = Self::new(Matrix3::new(
            p1.x - p0.x,
            p3.x - p0.x,
            p0.x,
            p1.y - p0.y,
            p3.y - p0.y,
            p0.y,
            0.0,
            0.0,
            1.0,
        ));
        if dx3 == 0.0 && dy3 == 0.0 {
            return affine;
        }

        let dx1 = p1.x - p2.x;
        let dx2 = p3.x - p2.x;
        let dy1 = p1.y - p2.y;
        let dy2 = p3.y - p2.y;
        let den = dx1 * dy2 - dx2 * dy1;
        if den.abs() < DEGENERACY_EPS {
            return affine;
        }

        let g = (dx3 * dy2 - dx2 * dy3) / den;
        let h = (dx1 * dy3 - dx3 * dy1) / den;
        Self::new(Matrix3::new(
            p1.x - p0.x + g * p1.x,
            p3.x - p0.x + h * p3.x,
            p0.x,
            p1.y - p0.y + g * p1.y,
            p3.y - p0.y + h * p3.y,
            p0.y,
            g,
            h,
            1.0,
        ))
    }

    /// Map the given quadrilateral onto the unit square: the adjugate
    /// (scale-free inverse) of [`square_to_quadrilateral`].
    pub fn quadrilateral_to_square(quad: &[Point2<f64>; 4]) -> Self {
        Self::square_to_quadrilateral(quad).build_adjoint()
    }

    /// Adjugate of the coefficient matrix. Homographies are scale
    /// invariant, so this acts as the inverse transform.
    pub fn build_adjoint(&self) -> Self {
        let m = &self.h;
        Self::new(Matrix3::new(
            m[(1, 1)] * m[(2, 2)] - m[(1, 2)] * m[(2, 1)],
            m[(0, 2)] * m[(2, 1)] - m[(0, 1)] * m[(2, 2)],
            m[(0, 1)] * m[(1, 2)] - m[(0, 2)] * m[(1, 1)],
            m[(1, 2)] * m[(2, 0)] - m[(1, 0)] * m[(2, 2)],
            m[(0, 0)] * m[(2, 2)] - m[(0, 2)] * m[(2, 0)],
            m[(0, 2)] * m[(1, 0)] - m[(0, 0)] * m[(1, 2)],
            m[(1, 0)] * m[(2, 1)] - m[(1, 1)] * m[(2, 0)],
            m[(0, 1)] * m[(2, 0)] - m[(0, 0)] * m[(2, 1)],
            m[(0, 0)] * m[(1, 1)] - m[(0, 1)] * m[(1, 0)],
        ))
    }

    /// Map one quadrilateral onto another (corners in matching order).
    pub fn quadrilateral_to_quadrilateral(
        from: &[Point2<f64>; 4],
        to: &[Point2<f64>; 4],
    ) -> Self {
        let q_to_s = Self::quadrilateral_to_square(from);
        let s_to_q = Self::square_to_quadrilateral(to);
        Self::new(s_to_q.h * q_to_s.h)
    }

    /// Apply to a single point.
    #[inline]
    pub fn apply(&self, p: Point2<f64>) -> Point2<f64> {
        let v = self.h * Vector3::new(p.x, p.y, 1.0);
        Point2::new(v[0] / v[2], v[1] / v[2])
    }

    /// Apply in place to a flat `[x0, y0, x1, y1, …]` buffer.
    ///
    /// The affine path is pure multiply-add; no division happens there.
    pub fn transform_points(&self, points: &mut [f64]) {
        debug_assert!(points.len() % 2 == 0);
        let m = &self.h;
        if self.is_affine() {
            for pair in points.chunks_exact_mut(2) {
                let (x, y) = (pair[0], pair[1]);
                pair[0] = m[(0, 0)] * x + m[(0, 1)] * y + m[(0, 2)];
                pair[1] = m[(1, 0)] * x + m[(1, 1)] * y + m[(1, 2)];
            }
        } else {
            for pair in points.chunks_exact_mut(2) {
                let (x, y) = (pair[0], pair[1]);
                let w = m[(2, 0)] * x + m[(2, 1)] * y + m[(2, 2)];
                pair[0] = (m[(0, 0)] * x + m[(0, 1)] * y + m[(0, 2)]) / w;
                pair[1] = (m[(1, 0)] * x + m[(1, 1)] * y + m[(1, 2)]) / w;
            }
        }
    }
}
