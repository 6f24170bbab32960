//! Merging independently solved blocks.
//!
//! - [`Reconciler`]: boundary corrections and blending for one block
//! - [`stitch`]: reconcile a whole solve set top to bottom

mod reconciler;
mod stitcher;

pub use reconciler::{
    ReconcileConfig, Reconciler, Reconciliation, bottom_blend_weight, top_blend_weight,
};
pub use stitcher::{Stitched, stitch};
