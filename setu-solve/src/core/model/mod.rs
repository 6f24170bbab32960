//! 2D transform models.
//!
//! All models share the [`Model2D`] capability: least-squares fitting to a set
//! of point matches, point application, and conversion to an equivalent
//! [`AffineModel2D`]. Composition and blending always happen on the affine
//! equivalent, so the closed [`TransformModel`] enum is all callers need.
//!
//! ```text
//!   Translation ⊂ Rigid ⊂ Affine
//!
//!   Regularized(λ) = (1 - λ) · Affine + λ · Regularizer
//!                    λ = 1.0 → rigid-like, λ = 0.0 → fully affine
//! ```

mod affine;
mod regularized;
mod rigid;
mod translation;

pub use affine::AffineModel2D;
pub use regularized::{RegularizedModel, RegularizerKind};
pub use rigid::RigidModel2D;
pub use translation::TranslationModel2D;

use crate::core::types::{Point2D, PointMatch};

/// Reasons a model cannot be fitted to a set of matches.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FitError {
    /// Fewer matches than the model has degrees of freedom for
    #[error("not enough data points: {found} found, {required} required")]
    NotEnoughDataPoints {
        /// Matches required
        required: usize,
        /// Matches given
        found: usize,
    },

    /// Matches do not constrain the model (collinear, coincident or zero weight)
    #[error("ill-defined data points")]
    IllDefinedDataPoints,
}

/// Capability shared by every transform model.
pub trait Model2D {
    /// Minimum number of matches needed by [`Model2D::fit`].
    fn min_num_matches(&self) -> usize;

    /// Replace this model with the weighted least-squares fit mapping every
    /// `p` onto its `q`.
    fn fit(&mut self, matches: &[PointMatch]) -> Result<(), FitError>;

    /// Map a point from local into world coordinates.
    fn apply(&self, point: &Point2D) -> Point2D;

    /// Equivalent affine transform.
    fn to_affine(&self) -> AffineModel2D;
}

/// Closed set of transform models.
#[derive(Debug, Clone, PartialEq)]
pub enum TransformModel {
    /// Pure translation
    Translation(TranslationModel2D),
    /// Rotation + translation
    Rigid(RigidModel2D),
    /// Full affine
    Affine(AffineModel2D),
    /// Affine blended with a rigid or translation regularizer
    Regularized(RegularizedModel),
}

impl TransformModel {
    /// `previous` regularized toward `kind` with weight `lambda`.
    pub fn regularized(previous: AffineModel2D, kind: RegularizerKind, lambda: f64) -> Self {
        TransformModel::Regularized(RegularizedModel::new(previous, kind, lambda))
    }

    /// Regularizer weight, `None` for the unregularized variants.
    pub fn lambda(&self) -> Option<f64> {
        match self {
            TransformModel::Regularized(m) => Some(m.lambda()),
            _ => None,
        }
    }

    /// Change the regularizer weight. The other variants have none to change.
    pub fn set_lambda(&mut self, lambda: f64) {
        if let TransformModel::Regularized(m) = self {
            m.set_lambda(lambda);
        }
    }
}

impl Model2D for TransformModel {
    fn min_num_matches(&self) -> usize {
        match self {
            TransformModel::Translation(m) => m.min_num_matches(),
            TransformModel::Rigid(m) => m.min_num_matches(),
            TransformModel::Affine(m) => m.min_num_matches(),
            TransformModel::Regularized(m) => m.min_num_matches(),
        }
    }

    fn fit(&mut self, matches: &[PointMatch]) -> Result<(), FitError> {
        match self {
            TransformModel::Translation(m) => m.fit(matches),
            TransformModel::Rigid(m) => m.fit(matches),
            TransformModel::Affine(m) => m.fit(matches),
            TransformModel::Regularized(m) => m.fit(matches),
        }
    }

    fn apply(&self, point: &Point2D) -> Point2D {
        match self {
            TransformModel::Translation(m) => m.apply(point),
            TransformModel::Rigid(m) => m.apply(point),
            TransformModel::Affine(m) => m.apply(point),
            TransformModel::Regularized(m) => m.apply(point),
        }
    }

    fn to_affine(&self) -> AffineModel2D {
        match self {
            TransformModel::Translation(m) => m.to_affine(),
            TransformModel::Rigid(m) => m.to_affine(),
            TransformModel::Affine(m) => *m,
            TransformModel::Regularized(m) => m.to_affine(),
        }
    }
}

/// Weighted centroids of the `p` and `q` sides plus the total weight.
pub(crate) fn weighted_centroids(
    matches: &[PointMatch],
) -> Result<(Point2D, Point2D, f64), FitError> {
    let mut ws = 0.0;
    let (mut pcx, mut pcy, mut qcx, mut qcy) = (0.0, 0.0, 0.0, 0.0);

    for m in matches {
        ws += m.weight;
        pcx += m.weight * m.p.x;
        pcy += m.weight * m.p.y;
        qcx += m.weight * m.q.x;
        qcy += m.weight * m.q.y;
    }

    if ws <= 0.0 || !ws.is_finite() {
        return Err(FitError::IllDefinedDataPoints);
    }

    Ok((
        Point2D::new(pcx / ws, pcy / ws),
        Point2D::new(qcx / ws, qcy / ws),
        ws,
    ))
}
