//! Engine layer: graph construction, block solving and merging.
//!
//! # Contents
//!
//! - [`graph`]: tile graph, inclusion policy, connected-component partitioning
//! - [`solve`]: blocks, annealed relaxation, per-block worker
//! - [`merge`]: boundary reconciliation and stitching of solved blocks
//! - [`diagnostics`]: per-tile residuals of a solved block
//! - [`distributed`]: whole-stack driver tying the above together

pub mod diagnostics;
pub mod distributed;
pub mod graph;
pub mod merge;
pub mod solve;

pub use distributed::{DistributedSolve, SolveSummary};
