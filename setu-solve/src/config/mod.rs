//! Unified configuration loading for SetuSolve.
//!
//! Loads all configuration from a single TOML file with sensible defaults.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use setu_solve::config::SolveConfig;
//!
//! let config = SolveConfig::load(Path::new("configs/setu-solve.toml"))?;
//!
//! // Or use built-in defaults (no file needed)
//! let config = SolveConfig::default();
//!
//! let solver = AnnealedSolver::new(config.solver_config())?;
//! let reconciler = Reconciler::new(config.reconcile_config())?;
//! ```
//!
//! ## Configuration Sections
//!
//! | Section | Description |
//! |---------|-------------|
//! | [`StackSection`] | Stack name, z-range, block size |
//! | [`SolverSection`] | Threads, regularizer, lambda schedule, stopping rules |
//! | [`MergeSection`] | Boundary band depths and chain solve budget |
//! | [`InclusionConfig`](crate::engine::graph::InclusionConfig) | Exclusions, z-limits, link rules |
//! | [`CheckpointSection`] | Checkpoint directory and merge minimum |
//!
//! ## Example TOML
//!
//! ```toml
//! [stack]
//! min_z = 1
//! max_z = 1200
//! block_size = 100
//!
//! [solver]
//! threads = 8
//! regularizer = "rigid"
//! stages = [
//!     { lambda = 1.0,  iterations = 100, plateau_width = 50 },
//!     { lambda = 0.01, iterations = 20,  plateau_width = 20 },
//! ]
//!
//! [merge]
//! overlap_top = 25
//! overlap_bottom = 25
//!
//! [[inclusion.rules]]
//! layers = [20]
//! partner_layers = [21]
//! effect = "keep_at_most"
//! max_pairs = 2
//! ```

pub(crate) mod defaults;
mod sections;
mod setu;

pub use sections::{CheckpointSection, MergeSection, SolverSection, StackSection};
pub use setu::SolveConfig;
