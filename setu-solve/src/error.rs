//! Error types for SetuSolve

use std::path::PathBuf;

use crate::core::model::FitError;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Which boundary band of a block a reconciliation error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BandSide {
    /// Top-most `overlap_top` layers.
    Top,
    /// Bottom-most `overlap_bottom` layers.
    Bottom,
}

impl std::fmt::Display for BandSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BandSide::Top => write!(f, "top"),
            BandSide::Bottom => write!(f, "bottom"),
        }
    }
}

/// SetuSolve error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encode/decode error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid or unreadable configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// The stack source (metadata service or dataset) failed
    #[error("Stack source error: {0}")]
    Source(String),

    /// Model fit failed outside of the relaxation loop
    #[error("Model fit failed: {0}")]
    Fit(#[from] FitError),

    /// A partitioned component owns no tile in one of its layers
    #[error("Block {block_id} [{min_z}, {max_z}]: layer z={z} has no tiles after partitioning")]
    EmptyLayer {
        /// Block that violated the invariant
        block_id: u64,
        /// Empty layer
        z: i64,
        /// Block range start
        min_z: i64,
        /// Block range end
        max_z: i64,
    },

    /// A block cannot be solved (no edges or a singular constraint system)
    #[error("Block {block_id} [{min_z}, {max_z}] is degenerate: {reason}")]
    DegenerateBlock {
        /// Offending block
        block_id: u64,
        /// Block range start
        min_z: i64,
        /// Block range end
        max_z: i64,
        /// What made it degenerate
        reason: String,
    },

    /// No tiles inside a boundary band, so there is no anchor frame
    #[error("Block {block_id} [{min_z}, {max_z}]: {side} boundary band is empty")]
    EmptyBoundaryBand {
        /// Offending block
        block_id: u64,
        /// Which band
        side: BandSide,
        /// Block range start
        min_z: i64,
        /// Block range end
        max_z: i64,
    },

    /// Fewer checkpoint entries than required for a merge
    #[error("Found {found} checkpoint entries, at least {required} required")]
    InsufficientCheckpoints {
        /// Entries discovered
        found: usize,
        /// Entries required
        required: usize,
    },

    /// A checkpoint entry could not be read or parsed
    #[error("Checkpoint {path}: {message}")]
    Checkpoint {
        /// File that failed
        path: PathBuf,
        /// Underlying failure
        message: String,
    },

    /// A tile was solved by two different blocks
    #[error("Tile {tile_id} appears in blocks {first_block} and {second_block}")]
    DuplicateTile {
        /// Duplicated tile
        tile_id: String,
        /// Block that claimed it first
        first_block: u64,
        /// Block that claimed it again
        second_block: u64,
    },

    /// Worker pool could not be created
    #[error("Thread pool error: {0}")]
    ThreadPool(String),
}

impl From<rayon::ThreadPoolBuildError> for Error {
    fn from(e: rayon::ThreadPoolBuildError) -> Self {
        Error::ThreadPool(e.to_string())
    }
}
