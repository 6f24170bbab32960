//! Configuration sections.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::defaults;
use crate::core::model::RegularizerKind;
use crate::engine::diagnostics::ErrorFilter;
use crate::engine::solve::Stage;

/// `[stack]`: what to solve
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StackSection {
    /// Stack name, used in log output
    #[serde(default)]
    pub stack: String,

    /// First layer to solve
    #[serde(default)]
    pub min_z: i64,

    /// Last layer to solve
    #[serde(default)]
    pub max_z: i64,

    /// Layers per block (0 = one block)
    #[serde(default = "defaults::block_size")]
    pub block_size: usize,
}

impl Default for StackSection {
    fn default() -> Self {
        Self {
            stack: String::new(),
            min_z: 0,
            max_z: 0,
            block_size: defaults::block_size(),
        }
    }
}

/// `[solver]`: relaxation schedule and parallelism
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SolverSection {
    /// Threads per block relaxation
    #[serde(default = "defaults::threads")]
    pub threads: usize,

    /// Blocks solved concurrently
    #[serde(default = "defaults::block_threads")]
    pub block_threads: usize,

    /// Model the affine fit is regularized toward: "rigid" or "translation"
    #[serde(default)]
    pub regularizer: RegularizerKind,

    /// Annealing stages, most constrained first
    #[serde(default = "defaults::stages")]
    pub stages: Vec<Stage>,

    /// Stop a stage once the mean match distance is at or below this (pixels)
    #[serde(default)]
    pub max_allowed_error: f64,

    /// Fraction of each fitted update applied per iteration, in (0, 1]
    #[serde(default = "defaults::damp")]
    pub damp: f64,

    /// Matches counted in per-tile diagnostics
    #[serde(default)]
    pub diagnostics: ErrorFilter,
}

impl Default for SolverSection {
    fn default() -> Self {
        Self {
            threads: defaults::threads(),
            block_threads: defaults::block_threads(),
            regularizer: RegularizerKind::default(),
            stages: defaults::stages(),
            max_allowed_error: 0.0,
            damp: defaults::damp(),
            diagnostics: ErrorFilter::default(),
        }
    }
}

/// `[merge]`: boundary reconciliation
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MergeSection {
    /// Layers in each block's top band
    #[serde(default = "defaults::overlap")]
    pub overlap_top: usize,

    /// Layers in each block's bottom band
    #[serde(default = "defaults::overlap")]
    pub overlap_bottom: usize,

    /// Grid samples per tile axis
    #[serde(default = "defaults::samples_per_dimension")]
    pub samples_per_dimension: usize,

    /// Iteration budget of the boundary chain solve
    #[serde(default = "defaults::reconcile_iterations")]
    pub reconcile_iterations: usize,
}

impl Default for MergeSection {
    fn default() -> Self {
        Self {
            overlap_top: defaults::overlap(),
            overlap_bottom: defaults::overlap(),
            samples_per_dimension: defaults::samples_per_dimension(),
            reconcile_iterations: defaults::reconcile_iterations(),
        }
    }
}

/// `[checkpoint]`: solved block persistence
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CheckpointSection {
    /// Directory for block checkpoints (disabled when absent)
    #[serde(default)]
    pub directory: Option<PathBuf>,

    /// Entries required before a merge from checkpoints
    #[serde(default = "defaults::min_entries")]
    pub min_entries: usize,
}

impl Default for CheckpointSection {
    fn default() -> Self {
        Self {
            directory: None,
            min_entries: defaults::min_entries(),
        }
    }
}
