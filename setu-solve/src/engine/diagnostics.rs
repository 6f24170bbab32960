//! Per-tile residual diagnostics.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::model::{AffineModel2D, Model2D};
use crate::engine::graph::TileGraph;

/// Which matches count toward a tile's error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorFilter {
    /// Every match
    #[default]
    All,
    /// Only matches to tiles in other layers
    CrossLayerOnly,
    /// Only matches to tiles in the same layer
    MontageOnly,
}

impl ErrorFilter {
    fn accepts(self, layer_a: i64, layer_b: i64) -> bool {
        match self {
            ErrorFilter::All => true,
            ErrorFilter::CrossLayerOnly => layer_a != layer_b,
            ErrorFilter::MontageOnly => layer_a == layer_b,
        }
    }
}

/// Residual summary for one tile.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TileError {
    /// Mean world-space distance over the tile's matches
    pub avg: f64,
    /// Largest distance
    pub max: f64,
    /// Matches counted
    pub num_matches: usize,
}

impl TileError {
    fn add(&mut self, distance: f64) {
        let n = self.num_matches as f64;
        self.avg = (self.avg * n + distance) / (n + 1.0);
        self.max = self.max.max(distance);
        self.num_matches += 1;
    }
}

/// Per-tile errors of one solved block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockDiagnostics {
    /// Block identifier
    pub block_id: u64,
    /// Regularizer weight of the final stage
    pub lambda: f64,
    /// Errors by tile id
    pub tile_errors: BTreeMap<String, TileError>,
}

impl BlockDiagnostics {
    /// Tile with the largest average error.
    pub fn worst_tile(&self) -> Option<(&str, &TileError)> {
        self.tile_errors
            .iter()
            .max_by(|a, b| a.1.avg.total_cmp(&b.1.avg))
            .map(|(id, e)| (id.as_str(), e))
    }
}

/// Distance between the two world points of every match, per tile.
///
/// Each match counts toward both of its tiles. Tiles without a model in
/// `models` are skipped.
pub fn compute_tile_errors(
    graph: &TileGraph,
    models: &BTreeMap<String, AffineModel2D>,
    filter: ErrorFilter,
) -> BTreeMap<String, TileError> {
    let nodes = graph.nodes();
    let mut errors: BTreeMap<String, TileError> = BTreeMap::new();

    for edge in graph.edges() {
        let (a, b) = (&nodes[edge.a], &nodes[edge.b]);
        if !filter.accepts(a.layer(), b.layer()) {
            continue;
        }
        let (Some(ma), Some(mb)) = (models.get(&a.tile_id), models.get(&b.tile_id)) else {
            continue;
        };

        for m in &edge.matches {
            let d = ma.apply(&m.p).distance(&mb.apply(&m.q));
            errors.entry(a.tile_id.clone()).or_default().add(d);
            errors.entry(b.tile_id.clone()).or_default().add(d);
        }
    }

    errors
}
