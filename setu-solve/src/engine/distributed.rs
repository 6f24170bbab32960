//! Distributed solve driver.
//!
//! Cuts the configured z-range into blocks, solves the blocks in parallel,
//! optionally checkpoints every solved component, then stitches all of them
//! and writes the final models layer by layer.
//!
//! ```text
//!   [min_z, max_z] ──► SolveSet ──► BlockWorker × block_threads
//!                                          │
//!                                   SolvedBlock ──► CheckpointStore
//!                                          │
//!                                      stitch() ──► ResolvedTileSink
//! ```

use std::collections::BTreeSet;
use std::path::PathBuf;

use rayon::prelude::*;

use crate::config::SolveConfig;
use crate::core::model::AffineModel2D;
use crate::core::types::TileSpec;
use crate::engine::diagnostics::BlockDiagnostics;
use crate::engine::graph::BuildStats;
use crate::engine::merge::{Reconciler, Stitched, stitch};
use crate::engine::solve::{
    AnnealedSolver, Block, BlockResult, BlockWorker, SolveSet, SolvedBlock,
};
use crate::error::Result;
use crate::io::{CheckpointStore, ResolvedTileSink, StackSource};

/// Summary of a distributed run or a merge from checkpoints.
#[derive(Debug, Clone, Default)]
pub struct SolveSummary {
    /// Blocks the range was cut into (0 for a checkpoint merge)
    pub input_blocks: usize,
    /// Layers of the range holding at least one tile (0 for a checkpoint merge)
    pub occupied_layers: usize,
    /// Solved connected components
    pub solved_blocks: usize,
    /// Tiles with a final model
    pub tiles: usize,
    /// Layers written to the sink
    pub layers: usize,
    /// Graph build counters over all blocks
    pub stats: BuildStats,
    /// Per-component residuals
    pub diagnostics: Vec<BlockDiagnostics>,
    /// Checkpoint files written
    pub checkpoints: Vec<PathBuf>,
    /// Correction for untouched layers below the range
    pub below_correction: AffineModel2D,
}

/// Outcome of one input block on a worker thread.
struct BlockRun {
    result: BlockResult,
    solved: Vec<SolvedBlock>,
    checkpoints: Vec<PathBuf>,
}

/// Drives a whole-stack solve.
#[derive(Debug, Clone)]
pub struct DistributedSolve {
    config: SolveConfig,
}

impl DistributedSolve {
    /// Create a driver; the configuration is validated first.
    pub fn new(config: SolveConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Configuration in use.
    pub fn config(&self) -> &SolveConfig {
        &self.config
    }

    /// Solve the configured range of `source` and write final models to `sink`.
    ///
    /// A failing block does not stop the others. Once every block is done,
    /// the first failure is returned and nothing is written.
    pub fn run<S, K>(&self, source: &S, sink: &mut K) -> Result<SolveSummary>
    where
        S: StackSource + Sync + ?Sized,
        K: ResolvedTileSink + ?Sized,
    {
        let stack = &self.config.stack;
        // id 0 would share split-off ids with block 1
        let set = SolveSet::from_range(stack.min_z, stack.max_z, stack.block_size, 1);
        let input_blocks = set.len();

        let (lo, hi) = TileSpec::z_window(stack.min_z, stack.max_z);
        let occupied: BTreeSet<i64> = source
            .z_values(lo, hi)?
            .into_iter()
            .map(|z| z.round() as i64)
            .filter(|z| (stack.min_z..=stack.max_z).contains(z))
            .collect();

        log::info!(
            "Solving stack '{}' z=[{}, {}] ({} layers with tiles) as {} blocks on {} block threads",
            stack.stack,
            stack.min_z,
            stack.max_z,
            occupied.len(),
            input_blocks,
            self.config.solver.block_threads
        );

        let store = self
            .config
            .checkpoint
            .directory
            .as_deref()
            .map(CheckpointStore::new)
            .transpose()?;

        let solver = AnnealedSolver::new(self.config.solver_config())?;
        let worker = BlockWorker::new(
            &self.config.inclusion,
            self.config.solver.regularizer,
            &solver,
        )
        .with_error_filter(self.config.solver.diagnostics);

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.solver.block_threads)
            .thread_name(|i| format!("setu-block-{i}"))
            .build()?;

        let runs: Vec<Result<BlockRun>> = pool.install(|| {
            set.into_blocks()
                .into_par_iter()
                .map(|block| {
                    let (id, min_z, max_z) = (block.id, block.min_z, block.max_z);
                    let run = Self::run_block(&worker, store.as_ref(), source, block);
                    if let Err(e) = &run {
                        log::error!("Block {} [{}, {}] failed: {}", id, min_z, max_z, e);
                    }
                    run
                })
                .collect()
        });

        let mut summary = SolveSummary {
            input_blocks,
            occupied_layers: occupied.len(),
            ..Default::default()
        };
        let mut solved = Vec::new();
        let mut first_error = None;
        for run in runs {
            match run {
                Ok(run) => {
                    summary.stats.merge(&run.result.stats);
                    summary.diagnostics.extend(
                        run.result.outcomes.into_iter().map(|outcome| outcome.diagnostics),
                    );
                    summary.checkpoints.extend(run.checkpoints);
                    solved.extend(run.solved);
                }
                Err(e) => {
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }
        if let Some(e) = first_error {
            return Err(e);
        }

        log::info!(
            "Solved {} components: {} of {} correspondences connected, {} rejected, {} missing specs",
            solved.len(),
            summary.stats.connected,
            summary.stats.correspondences,
            summary.stats.total_rejected(),
            summary.stats.missing_tile_specs
        );

        self.merge(solved, sink, summary)
    }

    /// Stitch the blocks of a checkpoint directory and write final models.
    pub fn merge_from_checkpoints<K>(
        &self,
        store: &CheckpointStore,
        min_entries: usize,
        sink: &mut K,
    ) -> Result<SolveSummary>
    where
        K: ResolvedTileSink + ?Sized,
    {
        let blocks = store.load_all(min_entries).inspect_err(|e| {
            log::error!("Cannot merge from {}: {}", store.dir().display(), e);
        })?;
        self.merge(blocks, sink, SolveSummary::default())
    }

    fn run_block<S>(
        worker: &BlockWorker<'_>,
        store: Option<&CheckpointStore>,
        source: &S,
        block: Block,
    ) -> Result<BlockRun>
    where
        S: StackSource + Sync + ?Sized,
    {
        let result = worker.run(source, block)?;
        let solved: Vec<SolvedBlock> = result
            .outcomes
            .iter()
            .map(|outcome| outcome.block.to_solved())
            .collect();

        let mut checkpoints = Vec::new();
        if let Some(store) = store {
            for block in &solved {
                checkpoints.push(store.save(block)?);
            }
        }

        Ok(BlockRun {
            result,
            solved,
            checkpoints,
        })
    }

    fn merge<K>(
        &self,
        blocks: Vec<SolvedBlock>,
        sink: &mut K,
        mut summary: SolveSummary,
    ) -> Result<SolveSummary>
    where
        K: ResolvedTileSink + ?Sized,
    {
        let reconciler = Reconciler::new(self.config.reconcile_config())?;
        let set = SolveSet::new(blocks);
        let stitched = stitch(&reconciler, &set)?;

        summary.solved_blocks = set.len();
        summary.tiles = stitched.final_models.len();
        summary.below_correction = stitched.below_correction;
        summary.layers = write_layers(&stitched, set.blocks(), sink)?;

        log::info!(
            "Wrote {} tiles across {} layers",
            summary.tiles,
            summary.layers
        );
        Ok(summary)
    }
}

/// Hand final models to the sink, one layer at a time in z order.
fn write_layers<K>(stitched: &Stitched, blocks: &[SolvedBlock], sink: &mut K) -> Result<usize>
where
    K: ResolvedTileSink + ?Sized,
{
    let layers = stitched.models_by_layer(blocks);
    for (z, models) in &layers {
        sink.save_resolved_tiles(*z, models).inspect_err(|e| {
            log::error!("Failed to save {} resolved tiles for z={}: {}", models.len(), z, e);
        })?;
        log::debug!("Saved {} resolved tiles for z={}", models.len(), z);
    }
    Ok(layers.len())
}
