//! Block worker: build → split → solve.

use super::block::Block;
use super::relaxation::{AnnealedSolver, SolveReport};
use crate::core::model::RegularizerKind;
use crate::engine::diagnostics::{BlockDiagnostics, ErrorFilter, compute_tile_errors};
use crate::engine::graph::{BuildStats, GraphBuilder, InclusionConfig, split};
use crate::error::Result;
use crate::io::StackSource;

/// One solved connected component.
#[derive(Debug, Clone)]
pub struct SolveOutcome {
    /// Solved block with its new models
    pub block: Block,
    /// Per-stage convergence
    pub report: SolveReport,
    /// Residuals under the new models
    pub diagnostics: BlockDiagnostics,
}

/// Result of working through one input block.
#[derive(Debug, Clone)]
pub struct BlockResult {
    /// Input block id
    pub block_id: u64,
    /// Graph build counters
    pub stats: BuildStats,
    /// One entry per connected component
    pub outcomes: Vec<SolveOutcome>,
}

/// Runs the per-block pipeline.
#[derive(Debug)]
pub struct BlockWorker<'a> {
    inclusion: &'a InclusionConfig,
    regularizer: RegularizerKind,
    solver: &'a AnnealedSolver,
    error_filter: ErrorFilter,
}

impl<'a> BlockWorker<'a> {
    /// Create a worker sharing a solver.
    pub fn new(
        inclusion: &'a InclusionConfig,
        regularizer: RegularizerKind,
        solver: &'a AnnealedSolver,
    ) -> Self {
        Self {
            inclusion,
            regularizer,
            solver,
            error_filter: ErrorFilter::All,
        }
    }

    /// Restrict diagnostics to a subset of matches.
    pub fn with_error_filter(mut self, filter: ErrorFilter) -> Self {
        self.error_filter = filter;
        self
    }

    /// Build, partition and solve one block.
    ///
    /// A block without any connected tiles yields no outcomes.
    pub fn run<S: StackSource + ?Sized>(&self, source: &S, block: Block) -> Result<BlockResult> {
        let builder = GraphBuilder::new(self.inclusion, self.regularizer, block.min_z, block.max_z);
        let (graph, stats) = builder.build(source)?;

        let block_id = block.id;
        if graph.num_nodes() == 0 {
            log::warn!(
                "Block {} [{}, {}]: no connected tiles, nothing to solve",
                block.id,
                block.min_z,
                block.max_z
            );
            return Ok(BlockResult {
                block_id,
                stats,
                outcomes: Vec::new(),
            });
        }

        let block = Block::with_graph(block.id, block.min_z, block.max_z, graph);
        let components = split(block)?;

        let mut outcomes = Vec::with_capacity(components.len());
        for mut component in components {
            let report = self.solver.solve_block(&mut component)?;
            let diagnostics = BlockDiagnostics {
                block_id: component.id,
                lambda: report.final_lambda().unwrap_or(0.0),
                tile_errors: compute_tile_errors(
                    &component.graph,
                    &component.new_models,
                    self.error_filter,
                ),
            };
            if let Some((tile_id, error)) = diagnostics.worst_tile() {
                log::debug!(
                    "Block {}: worst tile {} avg {:.3} max {:.3} over {} matches",
                    component.id,
                    tile_id,
                    error.avg,
                    error.max,
                    error.num_matches
                );
            }
            outcomes.push(SolveOutcome {
                block: component,
                report,
                diagnostics,
            });
        }

        Ok(BlockResult {
            block_id,
            stats,
            outcomes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{Correspondence, Point2D, PointMatch, TileSpec};
    use crate::engine::solve::SolverConfig;
    use crate::io::InMemoryStack;

    fn square() -> Vec<PointMatch> {
        [(10.0, 10.0), (90.0, 10.0), (90.0, 90.0), (10.0, 90.0)]
            .iter()
            .map(|&(x, y)| PointMatch::new(Point2D::new(x, y), Point2D::new(x - 1.0, y)))
            .collect()
    }

    #[test]
    fn test_two_islands_become_two_outcomes() {
        let mut stack = InMemoryStack::new();
        for (id, z) in [("a", 0.0), ("b", 0.0), ("c", 1.0), ("d", 1.0)] {
            stack.add_tile(TileSpec::new(id, &format!("{z:.1}"), z, 100.0, 100.0));
        }
        stack.add_correspondence(Correspondence::new("0.0", "a", "0.0", "b", square()));
        stack.add_correspondence(Correspondence::new("1.0", "c", "1.0", "d", square()));

        let inclusion = InclusionConfig::default();
        let solver = AnnealedSolver::new(SolverConfig::default()).unwrap();
        let worker = BlockWorker::new(&inclusion, RegularizerKind::Rigid, &solver);

        let result = worker.run(&stack, Block::new(1, 0, 1)).unwrap();
        assert_eq!(result.block_id, 1);
        assert_eq!(result.outcomes.len(), 2);
        let ids: Vec<u64> = result.outcomes.iter().map(|o| o.block.id).collect();
        let parent = Block::new(1, 0, 1);
        assert_eq!(ids, vec![parent.child_id(0), parent.child_id(1)]);
        assert_eq!(result.outcomes[0].block.new_models.len(), 2);
        assert_eq!(result.outcomes[0].diagnostics.tile_errors.len(), 2);
    }

    #[test]
    fn test_empty_range_has_no_outcomes() {
        let stack = InMemoryStack::new();
        let inclusion = InclusionConfig::default();
        let solver = AnnealedSolver::new(SolverConfig::default()).unwrap();
        let worker = BlockWorker::new(&inclusion, RegularizerKind::Rigid, &solver);

        let result = worker.run(&stack, Block::new(0, 0, 5)).unwrap();
        assert!(result.outcomes.is_empty());
    }
}
