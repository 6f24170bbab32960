//! Affine model regularized toward a rigid or translation model.

use serde::{Deserialize, Serialize};

use super::{AffineModel2D, FitError, Model2D, RigidModel2D, TranslationModel2D};
use crate::core::types::{Point2D, PointMatch};

/// Model family an affine fit is pulled toward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegularizerKind {
    /// Rotation + translation
    #[default]
    Rigid,
    /// Translation only
    Translation,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Regularizer {
    Rigid(RigidModel2D),
    Translation(TranslationModel2D),
}

impl Regularizer {
    fn new(kind: RegularizerKind) -> Self {
        match kind {
            RegularizerKind::Rigid => Regularizer::Rigid(RigidModel2D::default()),
            RegularizerKind::Translation => {
                Regularizer::Translation(TranslationModel2D::default())
            }
        }
    }

    fn model(&mut self) -> &mut dyn Model2D {
        match self {
            Regularizer::Rigid(m) => m,
            Regularizer::Translation(m) => m,
        }
    }

    fn to_affine(&self) -> AffineModel2D {
        match self {
            Regularizer::Rigid(m) => m.to_affine(),
            Regularizer::Translation(m) => m.to_affine(),
        }
    }
}

/// `interpolate(affine, regularizer, lambda)`.
///
/// Both halves are fitted to the same matches. At `lambda >= 1` only the
/// regularizer contributes, at `lambda <= 0` only the affine does, so the
/// half that does not contribute is not fitted.
#[derive(Debug, Clone, PartialEq)]
pub struct RegularizedModel {
    affine: AffineModel2D,
    regularizer: Regularizer,
    kind: RegularizerKind,
    lambda: f64,
}

impl RegularizedModel {
    /// Create from a starting affine, a regularizer family and a weight.
    pub fn new(affine: AffineModel2D, kind: RegularizerKind, lambda: f64) -> Self {
        Self {
            affine,
            regularizer: Regularizer::new(kind),
            kind,
            lambda,
        }
    }

    /// Current regularizer weight.
    #[inline]
    pub fn lambda(&self) -> f64 {
        self.lambda
    }

    /// Change the regularizer weight.
    #[inline]
    pub fn set_lambda(&mut self, lambda: f64) {
        self.lambda = lambda;
    }
}

impl Model2D for RegularizedModel {
    fn min_num_matches(&self) -> usize {
        let reg = match self.kind {
            RegularizerKind::Rigid => 2,
            RegularizerKind::Translation => 1,
        };
        if self.lambda >= 1.0 {
            reg
        } else {
            reg.max(self.affine.min_num_matches())
        }
    }

    fn fit(&mut self, matches: &[PointMatch]) -> Result<(), FitError> {
        if self.lambda >= 1.0 {
            return self.regularizer.model().fit(matches);
        }
        if self.lambda <= 0.0 {
            return self.affine.fit(matches);
        }

        // Commit both halves only when both succeed
        let mut affine = self.affine;
        let mut regularizer = self.regularizer;
        affine.fit(matches)?;
        regularizer.model().fit(matches)?;
        self.affine = affine;
        self.regularizer = regularizer;
        Ok(())
    }

    #[inline]
    fn apply(&self, point: &Point2D) -> Point2D {
        self.to_affine().apply(point)
    }

    fn to_affine(&self) -> AffineModel2D {
        let lambda = self.lambda.clamp(0.0, 1.0);
        AffineModel2D::interpolate(&self.affine, &self.regularizer.to_affine(), lambda)
    }
}
