//! Shared fixtures for integration tests.
//!
//! Stacks are laid out as `layers × columns` tiles of 100 × 100 px. Columns
//! overlap by 10 px. Every tile has a known true translation, and the point
//! matches are generated from it, so a solve should recover the relative
//! offsets exactly.

#![allow(dead_code)]

use std::collections::BTreeMap;

use setu_solve::core::model::{AffineModel2D, RegularizerKind};
use setu_solve::core::types::{Correspondence, Point2D, PointMatch, TileSpec};
use setu_solve::engine::graph::{GraphBuilder, InclusionConfig, split};
use setu_solve::engine::solve::{AnnealedSolver, Block, SolverConfig, Stage};
use setu_solve::io::InMemoryStack;

pub const TILE_SIZE: f64 = 100.0;
pub const COLUMN_STEP: f64 = 90.0;

pub fn tile_id(z: i64, column: usize) -> String {
    format!("{z}.{column}")
}

pub fn section_id(z: i64) -> String {
    format!("{z}.0")
}

/// Small deterministic offset from the nominal position.
pub fn jitter(z: i64, column: usize) -> (f64, f64) {
    let dx = ((z * 7 + column as i64 * 3) % 5) as f64 - 2.0;
    let dy = ((z * 3 + column as i64 * 5) % 7) as f64 - 3.0;
    (dx * 0.5, dy * 0.5)
}

/// Matches from `a`'s frame to `b`'s frame for world points `points`.
pub fn matches_between(a: (f64, f64), b: (f64, f64), points: &[(f64, f64)]) -> Vec<PointMatch> {
    points
        .iter()
        .map(|&(wx, wy)| {
            PointMatch::new(
                Point2D::new(wx - a.0, wy - a.1),
                Point2D::new(wx - b.0, wy - b.1),
            )
        })
        .collect()
}

/// Stack from explicit true translations, one entry per layer and column.
pub fn stack_from_truth(truth: &BTreeMap<(i64, usize), (f64, f64)>) -> InMemoryStack {
    let mut stack = InMemoryStack::new();
    for &(z, column) in truth.keys() {
        let spec = TileSpec::new(
            &tile_id(z, column),
            &section_id(z),
            z as f64,
            TILE_SIZE,
            TILE_SIZE,
        )
        .with_model(AffineModel2D::translation(column as f64 * COLUMN_STEP, 0.0));
        stack.add_tile(spec);
    }

    for (&(z, column), &t) in truth {
        // montage neighbour to the right
        if let Some(&right) = truth.get(&(z, column + 1)) {
            let x = t.0 + 95.0;
            let points = [(x, t.1 + 20.0), (x - 3.0, t.1 + 50.0), (x, t.1 + 80.0)];
            stack.add_correspondence(Correspondence::new(
                &section_id(z),
                &tile_id(z, column),
                &section_id(z),
                &tile_id(z, column + 1),
                matches_between(t, right, &points),
            ));
        }
        // same column one layer down
        if let Some(&below) = truth.get(&(z + 1, column)) {
            let points = [
                (t.0 + 20.0, t.1 + 20.0),
                (t.0 + 80.0, t.1 + 20.0),
                (t.0 + 80.0, t.1 + 80.0),
                (t.0 + 20.0, t.1 + 80.0),
            ];
            stack.add_correspondence(Correspondence::new(
                &section_id(z),
                &tile_id(z, column),
                &section_id(z + 1),
                &tile_id(z + 1, column),
                matches_between(t, below, &points),
            ));
        }
    }
    stack
}

/// True translations of a jittered `layers × columns` grid.
pub fn grid_truth(layers: i64, columns: usize) -> BTreeMap<(i64, usize), (f64, f64)> {
    let mut truth = BTreeMap::new();
    for z in 0..layers {
        for column in 0..columns {
            let (dx, dy) = jitter(z, column);
            truth.insert((z, column), (column as f64 * COLUMN_STEP + dx, dy));
        }
    }
    truth
}

pub fn grid_stack(layers: i64, columns: usize) -> InMemoryStack {
    stack_from_truth(&grid_truth(layers, columns))
}

pub fn solver(stages: Vec<Stage>, threads: usize) -> AnnealedSolver {
    AnnealedSolver::new(SolverConfig {
        stages,
        max_allowed_error: 0.0,
        damp: 0.5,
        threads,
    })
    .unwrap()
}

/// Build, split and solve `[min_z, max_z]`; returns new models of all components.
pub fn solve_range(
    stack: &InMemoryStack,
    min_z: i64,
    max_z: i64,
    solver: &AnnealedSolver,
) -> BTreeMap<String, AffineModel2D> {
    let inclusion = InclusionConfig::default();
    let (graph, _) = GraphBuilder::new(&inclusion, RegularizerKind::Rigid, min_z, max_z)
        .build(stack)
        .unwrap();
    let blocks = split(Block::with_graph(1, min_z, max_z, graph)).unwrap();

    let mut models = BTreeMap::new();
    for mut block in blocks {
        solver.solve_block(&mut block).unwrap();
        models.extend(block.new_models);
    }
    models
}

/// Translation part of a model.
pub fn offset(model: &AffineModel2D) -> (f64, f64) {
    (model.m02, model.m12)
}
