//! SetuSolve - Distributed block solver for stacks of microscopy tiles
//!
//! Aligns millions of overlapping image tiles across many layers by fitting
//! one 2D transform per tile to the point matches between tiles. The stack
//! is cut into z-blocks that are solved independently and then stitched
//! back together.
//!
//! # Architecture
//!
//! The crate is organized into 3 logical layers:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                      io/                            │  ← Infrastructure
//! │         (stack source, datasets, checkpoints)       │
//! └─────────────────────────────────────────────────────┘
//!                          │
//! ┌─────────────────────────────────────────────────────┐
//! │                    engine/                          │  ← Orchestration
//! │     (tile graph, relaxation, merge, distributed)    │
//! └─────────────────────────────────────────────────────┘
//!                          │
//! ┌─────────────────────────────────────────────────────┐
//! │                     core/                           │  ← Foundation
//! │           (types, transform models)                 │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! Configuration lives in [`config`] and errors in [`error`].
//!
//! # Pipeline
//!
//! 1. [`SolveSet::from_range`](engine::solve::SolveSet::from_range) cuts the
//!    z-range into blocks.
//! 2. [`GraphBuilder`](engine::graph::GraphBuilder) turns each block's
//!    correspondences into a tile graph, filtered by the inclusion policy.
//! 3. [`split`](engine::graph::split) partitions the graph into connected
//!    components.
//! 4. [`AnnealedSolver`](engine::solve::AnnealedSolver) relaxes each
//!    component through a schedule of decreasing regularization.
//! 5. [`stitch`](engine::merge::stitch) reconciles solved blocks with their
//!    neighbours and blends the boundary bands.

pub mod config;
pub mod core;
pub mod engine;
pub mod error;
pub mod io;

pub use config::SolveConfig;
pub use core::model::{AffineModel2D, Model2D, RegularizerKind, TransformModel};
pub use core::types::{Correspondence, Point2D, PointMatch, TileSpec};
pub use engine::{DistributedSolve, SolveSummary};
pub use error::{Error, Result};
pub use io::{CheckpointStore, InMemoryStack, JsonDataset, ResolvedTileSink, StackSource};
