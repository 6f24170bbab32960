//! 2D rigid model (rotation + translation).

use super::{AffineModel2D, FitError, Model2D, weighted_centroids};
use crate::core::types::{Point2D, PointMatch};

/// Rotation by `theta` radians followed by a translation.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RigidModel2D {
    /// Rotation in radians
    pub theta: f64,
    /// X offset
    pub tx: f64,
    /// Y offset
    pub ty: f64,
}

impl RigidModel2D {
    /// Create a rigid transform.
    #[inline]
    pub fn new(theta: f64, tx: f64, ty: f64) -> Self {
        Self { theta, tx, ty }
    }
}

impl Model2D for RigidModel2D {
    fn min_num_matches(&self) -> usize {
        2
    }

    /// Closed-form weighted least squares (Procrustes without scale).
    fn fit(&mut self, matches: &[PointMatch]) -> Result<(), FitError> {
        if matches.len() < self.min_num_matches() {
            return Err(FitError::NotEnoughDataPoints {
                required: self.min_num_matches(),
                found: matches.len(),
            });
        }

        let (pc, qc, _) = weighted_centroids(matches)?;

        let mut sin_sum = 0.0;
        let mut cos_sum = 0.0;
        for m in matches {
            let x1x = m.p.x - pc.x;
            let x1y = m.p.y - pc.y;
            let x2x = m.q.x - qc.x;
            let x2y = m.q.y - qc.y;
            sin_sum += m.weight * (x1x * x2y - x1y * x2x);
            cos_sum += m.weight * (x1x * x2x + x1y * x2y);
        }

        if sin_sum == 0.0 && cos_sum == 0.0 {
            return Err(FitError::IllDefinedDataPoints);
        }

        let theta = sin_sum.atan2(cos_sum);
        let (sin, cos) = theta.sin_cos();

        self.theta = theta;
        self.tx = qc.x - (cos * pc.x - sin * pc.y);
        self.ty = qc.y - (sin * pc.x + cos * pc.y);
        Ok(())
    }

    #[inline]
    fn apply(&self, point: &Point2D) -> Point2D {
        self.to_affine().apply(point)
    }

    #[inline]
    fn to_affine(&self) -> AffineModel2D {
        AffineModel2D::rigid(self.theta, self.tx, self.ty)
    }
}
