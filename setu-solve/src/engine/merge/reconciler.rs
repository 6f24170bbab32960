//! Boundary reconciliation of a solved block.
//!
//! A solved block lives in its own frame. Reconciliation finds the rigid
//! corrections that put it back next to the untouched regions above and below
//! it, then blends the boundary bands so tiles near either edge hand over
//! smoothly to the previous geometry.
//!
//! ```text
//!   min_z ┬──────────────  w = 1.0  previous ∘ top
//!         │  top band       ramp
//!   top_border ──────────  w = 0.0  new ∘ realign
//!         │
//!         │  interior       new ∘ realign
//!         │
//!   bottom_border ───────  w = 0.0  new ∘ realign
//!         │  bottom band    ramp
//!   max_z ┴──────────────  w = 1.0  previous ∘ bottom
//! ```
//!
//! The corrections come from a three-node chain `top - realigned - bottom`
//! connected by grid samples of the band tiles, relaxed with a rigid model
//! while `top` stays fixed.

use std::collections::BTreeMap;

use crate::config::defaults;
use crate::core::model::{AffineModel2D, Model2D, RegularizerKind};
use crate::core::types::{Point2D, PointMatch, TileSpec};
use crate::engine::graph::TileGraph;
use crate::engine::solve::{AnnealedSolver, SolvedBlock, SolverConfig, Stage};
use crate::error::{BandSide, Error, Result};

const TOP: &str = "top";
const REALIGNED: &str = "realigned";
const BOTTOM: &str = "bottom";

/// Reconciliation settings.
#[derive(Debug, Clone)]
pub struct ReconcileConfig {
    /// Layers in the top band
    pub overlap_top: usize,
    /// Layers in the bottom band
    pub overlap_bottom: usize,
    /// Grid samples per tile axis
    pub samples_per_dimension: usize,
    /// Iteration budget for the chain solve
    pub iterations: usize,
    /// Damping of the chain solve
    pub damp: f64,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            overlap_top: defaults::overlap(),
            overlap_bottom: defaults::overlap(),
            samples_per_dimension: defaults::samples_per_dimension(),
            iterations: defaults::reconcile_iterations(),
            damp: defaults::damp(),
        }
    }
}

/// Result of reconciling one block.
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciliation {
    /// Blended model per tile
    pub final_models: BTreeMap<String, AffineModel2D>,
    /// Correction of the top band's previous models
    pub top: AffineModel2D,
    /// Correction of the new models
    pub realign: AffineModel2D,
    /// Correction of the bottom band's previous models
    pub bottom: AffineModel2D,
}

/// Weight of the previous-anchored model in the top band.
///
/// 1.0 at `min_z`, 0.0 at `min_z + overlap_top - 1`.
pub fn top_blend_weight(z: f64, min_z: i64, overlap_top: usize) -> f64 {
    let top_border = (min_z + overlap_top as i64 - 1) as f64;
    let span = (overlap_top.max(2) - 1) as f64;
    ((top_border - z) / span).clamp(0.0, 1.0)
}

/// Weight of the previous-anchored model in the bottom band.
///
/// 0.0 at `max_z - overlap_bottom + 1`, 1.0 at `max_z`.
pub fn bottom_blend_weight(z: f64, max_z: i64, overlap_bottom: usize) -> f64 {
    let bottom_border = (max_z - overlap_bottom as i64 + 1) as f64;
    let span = (overlap_bottom.max(2) - 1) as f64;
    ((z - bottom_border) / span).clamp(0.0, 1.0)
}

/// Grid of sample points over a tile, corners included.
fn grid_samples(width: f64, height: f64, per_dimension: usize) -> Vec<Point2D> {
    let n = per_dimension.max(2);
    let step_x = (width - 1.0).max(0.0) / (n - 1) as f64;
    let step_y = (height - 1.0).max(0.0) / (n - 1) as f64;
    let mut samples = Vec::with_capacity(n * n);
    for iy in 0..n {
        for ix in 0..n {
            samples.push(Point2D::new(ix as f64 * step_x, iy as f64 * step_y));
        }
    }
    samples
}

/// Reconciles solved blocks with their untouched surroundings.
#[derive(Debug)]
pub struct Reconciler {
    config: ReconcileConfig,
    solver: AnnealedSolver,
}

impl Reconciler {
    /// Create a reconciler with its own single-threaded chain solver.
    pub fn new(config: ReconcileConfig) -> Result<Self> {
        let solver = AnnealedSolver::new(SolverConfig {
            stages: vec![Stage::new(1.0, config.iterations, config.iterations)],
            max_allowed_error: 0.0,
            damp: config.damp,
            threads: 1,
        })?;
        Ok(Self { config, solver })
    }

    /// Settings in use.
    pub fn config(&self) -> &ReconcileConfig {
        &self.config
    }

    /// Reconcile one solved block.
    pub fn reconcile(&self, block: &SolvedBlock) -> Result<Reconciliation> {
        let top_border = block.min_z + self.config.overlap_top as i64 - 1;
        let bottom_border = block.max_z - self.config.overlap_bottom as i64 + 1;

        let tiles = self.solved_tiles(block);

        let top_samples = self.band_samples(&tiles, |z| z <= top_border as f64, true);
        if top_samples.is_empty() {
            return Err(Error::EmptyBoundaryBand {
                block_id: block.id,
                side: BandSide::Top,
                min_z: block.min_z,
                max_z: block.max_z,
            });
        }
        let bottom_samples = self.band_samples(&tiles, |z| z >= bottom_border as f64, false);
        if bottom_samples.is_empty() {
            return Err(Error::EmptyBoundaryBand {
                block_id: block.id,
                side: BandSide::Bottom,
                min_z: block.min_z,
                max_z: block.max_z,
            });
        }

        let mut chain = TileGraph::new(RegularizerKind::Rigid);
        let top = chain.get_or_insert(&TileSpec::new(TOP, TOP, block.min_z as f64, 0.0, 0.0));
        let realigned = chain.get_or_insert(&TileSpec::new(REALIGNED, REALIGNED, block.min_z as f64, 0.0, 0.0));
        let bottom = chain.get_or_insert(&TileSpec::new(BOTTOM, BOTTOM, block.max_z as f64, 0.0, 0.0));
        chain.connect(top, realigned, &top_samples);
        chain.connect(realigned, bottom, &bottom_samples);
        chain.fix(TOP);

        let report = self
            .solver
            .relax(&mut chain)
            .map_err(|reason| Error::DegenerateBlock {
                block_id: block.id,
                min_z: block.min_z,
                max_z: block.max_z,
                reason: format!("boundary chain: {reason}"),
            })?;

        let nodes = chain.nodes();
        let top_correction = nodes[top].world;
        let realign = nodes[realigned].world;
        let bottom_correction = nodes[bottom].world;

        log::info!(
            "Block {} [{}, {}]: reconciled {} top / {} bottom samples, chain error {:.4}",
            block.id,
            block.min_z,
            block.max_z,
            top_samples.len(),
            bottom_samples.len(),
            report.final_error().unwrap_or(0.0)
        );
        log::debug!(
            "Block {}: realign {:?}, bottom {:?}",
            block.id,
            realign.to_array(),
            bottom_correction.to_array()
        );

        let mut final_models = BTreeMap::new();
        for tile in &tiles {
            let aligned = tile.new.pre_concatenate(&realign);
            let model = if tile.z <= top_border as f64 {
                let w = top_blend_weight(tile.z, block.min_z, self.config.overlap_top);
                let anchored = tile.previous.pre_concatenate(&top_correction);
                AffineModel2D::interpolate(&aligned, &anchored, w)
            } else if tile.z >= bottom_border as f64 {
                let w = bottom_blend_weight(tile.z, block.max_z, self.config.overlap_bottom);
                let anchored = tile.previous.pre_concatenate(&bottom_correction);
                AffineModel2D::interpolate(&aligned, &anchored, w)
            } else {
                aligned
            };
            final_models.insert(tile.tile_id.to_string(), model);
        }

        Ok(Reconciliation {
            final_models,
            top: top_correction,
            realign,
            bottom: bottom_correction,
        })
    }

    fn solved_tiles<'b>(&self, block: &'b SolvedBlock) -> Vec<SolvedTile<'b>> {
        let mut tiles = Vec::with_capacity(block.new_models.len());
        for (tile_id, new) in &block.new_models {
            let Some(spec) = block.tile_specs.get(tile_id) else {
                log::warn!(
                    "Block {}: tile {} has a solved model but no spec, skipping",
                    block.id,
                    tile_id
                );
                continue;
            };
            let previous = block
                .previous_models
                .get(tile_id)
                .copied()
                .unwrap_or(spec.model);
            tiles.push(SolvedTile {
                tile_id,
                spec,
                z: spec.z,
                previous,
                new: *new,
            });
        }
        tiles
    }

    /// Grid samples of every band tile.
    ///
    /// Top band: previous → new, oriented top → realigned.
    /// Bottom band: new → previous, oriented realigned → bottom.
    fn band_samples(
        &self,
        tiles: &[SolvedTile<'_>],
        in_band: impl Fn(f64) -> bool,
        top: bool,
    ) -> Vec<PointMatch> {
        let mut matches = Vec::new();
        for tile in tiles.iter().filter(|t| in_band(t.z)) {
            for s in grid_samples(
                tile.spec.width,
                tile.spec.height,
                self.config.samples_per_dimension,
            ) {
                let before = tile.previous.apply(&s);
                let after = tile.new.apply(&s);
                matches.push(if top {
                    PointMatch::new(before, after)
                } else {
                    PointMatch::new(after, before)
                });
            }
        }
        matches
    }
}

struct SolvedTile<'b> {
    tile_id: &'b str,
    spec: &'b TileSpec,
    z: f64,
    previous: AffineModel2D,
    new: AffineModel2D,
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::collections::BTreeSet;

    /// One tile per layer; new models are the previous ones moved by `shift`.
    fn shifted_block(min_z: i64, max_z: i64, shift: AffineModel2D) -> SolvedBlock {
        let mut block = SolvedBlock {
            id: 1,
            min_z,
            max_z,
            tile_specs: BTreeMap::new(),
            previous_models: BTreeMap::new(),
            new_models: BTreeMap::new(),
            z_to_tile_ids: BTreeMap::new(),
        };
        for z in min_z..=max_z {
            let id = format!("t{z}");
            let previous = AffineModel2D::translation(z as f64 * 10.0, 0.0);
            let spec = TileSpec::new(&id, &format!("{z}.0"), z as f64, 200.0, 100.0)
                .with_model(previous);
            block.tile_specs.insert(id.clone(), spec);
            block.previous_models.insert(id.clone(), previous);
            block.new_models.insert(id.clone(), previous.pre_concatenate(&shift));
            block.z_to_tile_ids.insert(z, BTreeSet::from([id]));
        }
        block
    }

    fn reconciler(overlap: usize) -> Reconciler {
        Reconciler::new(ReconcileConfig {
            overlap_top: overlap,
            overlap_bottom: overlap,
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_blend_weight_ramp_endpoints() {
        assert_relative_eq!(top_blend_weight(100.0, 100, 25), 1.0, epsilon = 1e-9);
        assert_relative_eq!(top_blend_weight(124.0, 100, 25), 0.0, epsilon = 1e-9);
        assert_relative_eq!(top_blend_weight(112.0, 100, 25), 0.5, epsilon = 1e-9);
        assert_relative_eq!(bottom_blend_weight(200.0, 200, 25), 1.0, epsilon = 1e-9);
        assert_relative_eq!(bottom_blend_weight(176.0, 200, 25), 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_grid_samples_cover_corners() {
        let samples = grid_samples(101.0, 51.0, 5);
        assert_eq!(samples.len(), 25);
        assert_eq!(samples[0], Point2D::new(0.0, 0.0));
        assert_eq!(samples[4], Point2D::new(100.0, 0.0));
        assert_eq!(samples[24], Point2D::new(100.0, 50.0));
    }

    #[test]
    fn test_pure_translation_is_undone() {
        let shift = AffineModel2D::translation(40.0, -25.0);
        let block = shifted_block(0, 9, shift);
        let result = reconciler(3).reconcile(&block).unwrap();

        assert_eq!(result.top, AffineModel2D::identity());
        assert_relative_eq!(result.realign.m02, -40.0, epsilon = 1e-6);
        assert_relative_eq!(result.realign.m12, 25.0, epsilon = 1e-6);
        assert!(result.bottom.max_abs_diff(&AffineModel2D::identity()) < 1e-6);

        for (tile_id, model) in &result.final_models {
            let previous = block.previous_models[tile_id];
            assert!(
                model.max_abs_diff(&previous) < 1e-6,
                "{tile_id}: {model:?} vs {previous:?}"
            );
        }
    }

    #[test]
    fn test_band_edges_are_anchored() {
        // new models rotate every tile; band edges keep previous ∘ correction
        let shift = AffineModel2D::rigid(0.01, 3.0, 0.0);
        let block = shifted_block(0, 9, shift);
        let result = reconciler(4).reconcile(&block).unwrap();

        let first = &result.final_models["t0"];
        let expected = block.previous_models["t0"].pre_concatenate(&result.top);
        assert!(first.max_abs_diff(&expected) < 1e-9);

        let last = &result.final_models["t9"];
        let expected = block.previous_models["t9"].pre_concatenate(&result.bottom);
        assert!(last.max_abs_diff(&expected) < 1e-9);

        let middle = &result.final_models["t5"];
        let expected = block.new_models["t5"].pre_concatenate(&result.realign);
        assert!(middle.max_abs_diff(&expected) < 1e-12);
    }

    #[test]
    fn test_empty_band_is_fatal() {
        let mut block = shifted_block(0, 9, AffineModel2D::identity());
        for z in 0..3 {
            let id = format!("t{z}");
            block.new_models.remove(&id);
        }
        match reconciler(3).reconcile(&block) {
            Err(Error::EmptyBoundaryBand { side, block_id, .. }) => {
                assert_eq!(side, BandSide::Top);
                assert_eq!(block_id, 1);
            }
            other => panic!("expected EmptyBoundaryBand, got {other:?}"),
        }
    }
}
