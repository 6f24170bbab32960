//! Block solving.
//!
//! # Components
//!
//! - [`Block`] / [`SolvedBlock`]: a z-range of tiles before and after solving
//! - [`SolveSet`]: blocks covering a range, with adjacency
//! - [`AnnealedSolver`]: staged relaxation of a tile graph
//! - [`BlockWorker`]: build → split → solve for one block

mod block;
mod error_statistic;
mod relaxation;
mod solve_set;
mod worker;

pub use block::{Block, CHILD_ID_BITS, SolvedBlock, ZRange};
pub use error_statistic::{ErrorStatistic, PLATEAU_SLOPE};
pub use relaxation::{
    AnnealedSolver, Degeneracy, SolveReport, SolverConfig, Stage, StageReport, TerminationReason,
    aggregate_error,
};
pub use solve_set::SolveSet;
pub use worker::{BlockResult, BlockWorker, SolveOutcome};
