//! 2D translation model.

use super::{AffineModel2D, FitError, Model2D, weighted_centroids};
use crate::core::types::{Point2D, PointMatch};

/// Pure translation.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TranslationModel2D {
    /// X offset
    pub tx: f64,
    /// Y offset
    pub ty: f64,
}

impl TranslationModel2D {
    /// Create a translation.
    #[inline]
    pub fn new(tx: f64, ty: f64) -> Self {
        Self { tx, ty }
    }
}

impl Model2D for TranslationModel2D {
    fn min_num_matches(&self) -> usize {
        1
    }

    fn fit(&mut self, matches: &[PointMatch]) -> Result<(), FitError> {
        if matches.is_empty() {
            return Err(FitError::NotEnoughDataPoints {
                required: 1,
                found: 0,
            });
        }

        let (pc, qc, _) = weighted_centroids(matches)?;
        self.tx = qc.x - pc.x;
        self.ty = qc.y - pc.y;
        Ok(())
    }

    #[inline]
    fn apply(&self, point: &Point2D) -> Point2D {
        Point2D::new(point.x + self.tx, point.y + self.ty)
    }

    #[inline]
    fn to_affine(&self) -> AffineModel2D {
        AffineModel2D::translation(self.tx, self.ty)
    }
}
