//! 2D affine transform.

use serde::{Deserialize, Serialize};

use super::{FitError, Model2D, weighted_centroids};
use crate::core::types::{Point2D, PointMatch};

/// Affine transform in 2D.
///
/// ```text
/// x' = m00 · x + m01 · y + m02
/// y' = m10 · x + m11 · y + m12
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AffineModel2D {
    /// Row 0, column 0
    pub m00: f64,
    /// Row 0, column 1
    pub m01: f64,
    /// X translation
    pub m02: f64,
    /// Row 1, column 0
    pub m10: f64,
    /// Row 1, column 1
    pub m11: f64,
    /// Y translation
    pub m12: f64,
}

impl AffineModel2D {
    /// Create from the six matrix entries.
    #[inline]
    pub fn new(m00: f64, m01: f64, m02: f64, m10: f64, m11: f64, m12: f64) -> Self {
        Self {
            m00,
            m01,
            m02,
            m10,
            m11,
            m12,
        }
    }

    /// Identity transform.
    #[inline]
    pub fn identity() -> Self {
        Self::new(1.0, 0.0, 0.0, 0.0, 1.0, 0.0)
    }

    /// Pure translation.
    #[inline]
    pub fn translation(tx: f64, ty: f64) -> Self {
        Self::new(1.0, 0.0, tx, 0.0, 1.0, ty)
    }

    /// Rotation by `theta` radians followed by a translation.
    #[inline]
    pub fn rigid(theta: f64, tx: f64, ty: f64) -> Self {
        let (sin, cos) = theta.sin_cos();
        Self::new(cos, -sin, tx, sin, cos, ty)
    }

    /// Determinant of the linear part.
    #[inline]
    pub fn determinant(&self) -> f64 {
        self.m00 * self.m11 - self.m01 * self.m10
    }

    /// Composition `self ∘ other`: apply `other` first, then `self`.
    pub fn concatenate(&self, other: &AffineModel2D) -> AffineModel2D {
        AffineModel2D {
            m00: self.m00 * other.m00 + self.m01 * other.m10,
            m01: self.m00 * other.m01 + self.m01 * other.m11,
            m02: self.m00 * other.m02 + self.m01 * other.m12 + self.m02,
            m10: self.m10 * other.m00 + self.m11 * other.m10,
            m11: self.m10 * other.m01 + self.m11 * other.m11,
            m12: self.m10 * other.m02 + self.m11 * other.m12 + self.m12,
        }
    }

    /// Composition `other ∘ self`: apply `self` first, then `other`.
    #[inline]
    pub fn pre_concatenate(&self, other: &AffineModel2D) -> AffineModel2D {
        other.concatenate(self)
    }

    /// Inverse transform, or `None` if the linear part is singular.
    pub fn inverse(&self) -> Option<AffineModel2D> {
        let det = self.determinant();
        if det.abs() < f64::EPSILON {
            return None;
        }

        let i00 = self.m11 / det;
        let i01 = -self.m01 / det;
        let i10 = -self.m10 / det;
        let i11 = self.m00 / det;

        Some(AffineModel2D {
            m00: i00,
            m01: i01,
            m02: -(i00 * self.m02 + i01 * self.m12),
            m10: i10,
            m11: i11,
            m12: -(i10 * self.m02 + i11 * self.m12),
        })
    }

    /// Entry-wise blend `(1 - λ) · a + λ · b`.
    ///
    /// `lambda = 0` returns `a`, `lambda = 1` returns `b`.
    pub fn interpolate(a: &AffineModel2D, b: &AffineModel2D, lambda: f64) -> AffineModel2D {
        let l1 = 1.0 - lambda;
        AffineModel2D {
            m00: l1 * a.m00 + lambda * b.m00,
            m01: l1 * a.m01 + lambda * b.m01,
            m02: l1 * a.m02 + lambda * b.m02,
            m10: l1 * a.m10 + lambda * b.m10,
            m11: l1 * a.m11 + lambda * b.m11,
            m12: l1 * a.m12 + lambda * b.m12,
        }
    }

    /// Entries as `[m00, m10, m01, m11, m02, m12]` (column-major).
    #[inline]
    pub fn to_array(&self) -> [f64; 6] {
        [self.m00, self.m10, self.m01, self.m11, self.m02, self.m12]
    }

    /// Largest absolute entry-wise difference to another transform.
    pub fn max_abs_diff(&self, other: &AffineModel2D) -> f64 {
        self.to_array()
            .iter()
            .zip(other.to_array().iter())
            .map(|(a, b)| (a - b).abs())
            .fold(0.0, f64::max)
    }
}

impl Default for AffineModel2D {
    fn default() -> Self {
        Self::identity()
    }
}

impl Model2D for AffineModel2D {
    fn min_num_matches(&self) -> usize {
        3
    }

    fn fit(&mut self, matches: &[PointMatch]) -> Result<(), FitError> {
        if matches.len() < self.min_num_matches() {
            return Err(FitError::NotEnoughDataPoints {
                required: self.min_num_matches(),
                found: matches.len(),
            });
        }

        let (pc, qc, _) = weighted_centroids(matches)?;

        // Normal equations on centered coordinates
        let (mut a00, mut a01, mut a11) = (0.0, 0.0, 0.0);
        let (mut b00, mut b01, mut b10, mut b11) = (0.0, 0.0, 0.0, 0.0);

        for m in matches {
            let px = m.p.x - pc.x;
            let py = m.p.y - pc.y;
            let qx = m.q.x - qc.x;
            let qy = m.q.y - qc.y;
            let w = m.weight;

            a00 += w * px * px;
            a01 += w * px * py;
            a11 += w * py * py;
            b00 += w * px * qx;
            b01 += w * py * qx;
            b10 += w * px * qy;
            b11 += w * py * qy;
        }

        let scale = a00 * a11;
        let det = scale - a01 * a01;
        if scale <= 0.0 || det <= scale * 1e-12 {
            return Err(FitError::IllDefinedDataPoints);
        }

        let ai00 = a11 / det;
        let ai01 = -a01 / det;
        let ai11 = a00 / det;

        let m00 = ai00 * b00 + ai01 * b01;
        let m01 = ai01 * b00 + ai11 * b01;
        let m10 = ai00 * b10 + ai01 * b11;
        let m11 = ai01 * b10 + ai11 * b11;

        *self = AffineModel2D {
            m00,
            m01,
            m02: qc.x - m00 * pc.x - m01 * pc.y,
            m10,
            m11,
            m12: qc.y - m10 * pc.x - m11 * pc.y,
        };
        Ok(())
    }

    #[inline]
    fn apply(&self, point: &Point2D) -> Point2D {
        Point2D::new(
            self.m00 * point.x + self.m01 * point.y + self.m02,
            self.m10 * point.x + self.m11 * point.y + self.m12,
        )
    }

    #[inline]
    fn to_affine(&self) -> AffineModel2D {
        *self
    }
}
