//! Annealed iterative relaxation.
//!
//! Every free tile repeatedly fits its regularized model to the current world
//! positions of its neighbours' matches, while the regularizer weight is
//! lowered stage by stage from rigid toward fully affine.
//!
//! # Algorithm
//!
//! ```text
//! for stage in schedule:                      λ = 1.0, 0.5, 0.1, 0.01
//!     set λ on every node
//!     repeat:
//!         snapshot ← world of every node
//!         parallel for each free node i:
//!             matches ← (local p in i, snapshot[j](q)) over i's edges
//!             fit ← regularized fit of matches
//!         barrier
//!         world_i ← (1 - damp) · world_i + damp · fit_i
//!         error ← weighted mean match distance
//!     until error ≤ max_allowed_error, plateau, or max iterations
//! ```
//!
//! All fits of one iteration read the same snapshot, so the result does not
//! depend on the number of threads or the order nodes are visited in.

use std::fmt;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::block::Block;
use super::error_statistic::ErrorStatistic;
use crate::config::defaults;
use crate::core::model::{AffineModel2D, Model2D, TransformModel};
use crate::core::types::PointMatch;
use crate::engine::graph::{Edge, TileGraph, TileNode};
use crate::error::{Error, Result};

/// One stage of the annealing schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stage {
    /// Regularizer weight
    pub lambda: f64,

    /// Iteration cap
    pub iterations: usize,

    /// Plateau window, 0 disables the plateau check
    pub plateau_width: usize,
}

impl Stage {
    /// Create a stage.
    pub fn new(lambda: f64, iterations: usize, plateau_width: usize) -> Self {
        Self {
            lambda,
            iterations,
            plateau_width,
        }
    }
}

/// Configuration for [`AnnealedSolver`].
#[derive(Debug, Clone)]
pub struct SolverConfig {
    /// Stages from most to least constrained
    pub stages: Vec<Stage>,

    /// Stop a stage once the error is at or below this
    pub max_allowed_error: f64,

    /// Fraction of the fitted update applied per iteration
    pub damp: f64,

    /// Worker threads for the per-node fan-out
    pub threads: usize,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            stages: defaults::stages(),
            max_allowed_error: 0.0,
            damp: defaults::damp(),
            threads: 1,
        }
    }
}

/// Reason a stage ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TerminationReason {
    /// Error dropped to the allowed maximum
    MaxAllowedError,
    /// Iteration cap reached
    MaxIterations,
    /// Error stopped changing
    Plateau,
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TerminationReason::MaxAllowedError => write!(f, "max allowed error"),
            TerminationReason::MaxIterations => write!(f, "max iterations"),
            TerminationReason::Plateau => write!(f, "plateau"),
        }
    }
}

/// Outcome of one stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageReport {
    /// Regularizer weight of the stage
    pub lambda: f64,
    /// Iterations run
    pub iterations: usize,
    /// Aggregate error after the last iteration
    pub final_error: f64,
    /// Why the stage ended
    pub termination: TerminationReason,
}

/// Outcome of a full solve.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SolveReport {
    /// One entry per stage, in schedule order
    pub stages: Vec<StageReport>,
}

impl SolveReport {
    /// Error after the last stage.
    pub fn final_error(&self) -> Option<f64> {
        self.stages.last().map(|s| s.final_error)
    }

    /// Lambda of the last stage.
    pub fn final_lambda(&self) -> Option<f64> {
        self.stages.last().map(|s| s.lambda)
    }

    /// Iterations over all stages.
    pub fn total_iterations(&self) -> usize {
        self.stages.iter().map(|s| s.iterations).sum()
    }
}

/// Why a graph cannot be relaxed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Degeneracy {
    /// The graph has no edges
    NoEdges,
    /// No free node could fit a model in the first iteration
    NoFit,
}

impl fmt::Display for Degeneracy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Degeneracy::NoEdges => write!(f, "no correspondences between tiles"),
            Degeneracy::NoFit => write!(f, "no tile could fit a model (singular system)"),
        }
    }
}

/// Relaxation solver with its own worker pool.
#[derive(Debug)]
pub struct AnnealedSolver {
    config: SolverConfig,
    pool: rayon::ThreadPool,
}

impl AnnealedSolver {
    /// Create a solver; fails if the thread pool cannot be built.
    pub fn new(config: SolverConfig) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.threads.max(1))
            .thread_name(|i| format!("setu-relax-{i}"))
            .build()?;
        Ok(Self { config, pool })
    }

    /// Solver configuration.
    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// Solve a block and record every tile's new model.
    pub fn solve_block(&self, block: &mut Block) -> Result<SolveReport> {
        let report = self
            .relax(&mut block.graph)
            .map_err(|reason| Error::DegenerateBlock {
                block_id: block.id,
                min_z: block.min_z,
                max_z: block.max_z,
                reason: reason.to_string(),
            })?;

        let mut order: Vec<&TileNode> = block.graph.nodes().iter().collect();
        order.sort_by(|a, b| a.tile_id.cmp(&b.tile_id));
        for node in order {
            log::debug!(
                "Block {}: tile {} (z={}) -> {:?}",
                block.id,
                node.tile_id,
                node.spec.z,
                node.world.to_array()
            );
            block.new_models.insert(node.tile_id.clone(), node.world);
        }

        log::info!(
            "Block {} [{}, {}]: solved {} tiles in {} iterations, error {:.4}",
            block.id,
            block.min_z,
            block.max_z,
            block.num_tiles(),
            report.total_iterations(),
            report.final_error().unwrap_or(0.0)
        );
        Ok(report)
    }

    /// Run the full schedule on a graph, updating every free node's world.
    pub fn relax(&self, graph: &mut TileGraph) -> std::result::Result<SolveReport, Degeneracy> {
        if graph.num_edges() == 0 {
            return Err(Degeneracy::NoEdges);
        }

        let free_nodes = graph.nodes().iter().filter(|n| !n.fixed).count();
        let mut report = SolveReport::default();

        for (stage_index, stage) in self.config.stages.iter().enumerate() {
            graph.set_lambda(stage.lambda);
            let mut stat = ErrorStatistic::new(stage.plateau_width);

            let termination = loop {
                let fitted = self.iterate(graph);
                if stage_index == 0 && stat.iterations() == 0 && free_nodes > 0 && fitted == 0 {
                    return Err(Degeneracy::NoFit);
                }

                let error = self.pool.install(|| aggregate_error(graph));
                stat.add(error);

                if error <= self.config.max_allowed_error {
                    break TerminationReason::MaxAllowedError;
                }
                if stat.is_plateau(stage.plateau_width) {
                    break TerminationReason::Plateau;
                }
                if stat.iterations() >= stage.iterations {
                    break TerminationReason::MaxIterations;
                }
            };

            let stage_report = StageReport {
                lambda: stage.lambda,
                iterations: stat.iterations(),
                final_error: stat.last().unwrap_or(0.0),
                termination,
            };
            log::debug!(
                "Stage λ={}: {} iterations, error {:.6} (min {:.6}, max {:.6}), stopped on {}",
                stage_report.lambda,
                stage_report.iterations,
                stage_report.final_error,
                stat.min(),
                stat.max(),
                termination
            );
            report.stages.push(stage_report);
        }

        Ok(report)
    }

    /// One Jacobi sweep; returns the number of nodes that fitted a model.
    fn iterate(&self, graph: &mut TileGraph) -> usize {
        let snapshot: Vec<AffineModel2D> = graph.nodes().iter().map(|n| n.world).collect();
        let damp = self.config.damp;

        let updates: Vec<Option<(TransformModel, AffineModel2D)>> = {
            let nodes = graph.nodes();
            let edges = graph.edges();
            self.pool.install(|| {
                nodes
                    .par_iter()
                    .enumerate()
                    .map(|(i, node)| {
                        if node.fixed {
                            return None;
                        }
                        let matches = node_matches(i, node, edges, &snapshot);
                        let mut model = node.model.clone();
                        model.fit(&matches).ok()?;
                        let world = AffineModel2D::interpolate(&node.world, &model.to_affine(), damp);
                        Some((model, world))
                    })
                    .collect()
            })
        };

        let mut fitted = 0;
        for (node, update) in graph.nodes_mut().iter_mut().zip(updates) {
            if let Some((model, world)) = update {
                node.model = model;
                node.world = world;
                fitted += 1;
            }
        }
        fitted
    }
}

/// Matches from node `i`'s local frame to its neighbours' world positions.
fn node_matches(
    i: usize,
    node: &TileNode,
    edges: &[Edge],
    world: &[AffineModel2D],
) -> Vec<PointMatch> {
    let mut matches = Vec::new();
    for &e in &node.edges {
        let edge = &edges[e];
        let partner = &world[edge.other(i)];
        if edge.a == i {
            matches.extend(
                edge.matches
                    .iter()
                    .map(|m| PointMatch::weighted(m.p, partner.apply(&m.q), m.weight)),
            );
        } else {
            matches.extend(
                edge.matches
                    .iter()
                    .map(|m| PointMatch::weighted(m.q, partner.apply(&m.p), m.weight)),
            );
        }
    }
    matches
}

/// Weighted mean world-space distance over all matches.
pub fn aggregate_error(graph: &TileGraph) -> f64 {
    let nodes = graph.nodes();
    let per_edge: Vec<(f64, f64)> = graph
        .edges()
        .par_iter()
        .map(|edge| {
            let wa = &nodes[edge.a].world;
            let wb = &nodes[edge.b].world;
            edge.matches.iter().fold((0.0, 0.0), |(sum, ws), m| {
                let d = wa.apply(&m.p).distance(&wb.apply(&m.q));
                (sum + m.weight * d, ws + m.weight)
            })
        })
        .collect();

    let (sum, ws) = per_edge
        .iter()
        .fold((0.0, 0.0), |(s, w), &(es, ew)| (s + es, w + ew));
    if ws > 0.0 { sum / ws } else { 0.0 }
}
