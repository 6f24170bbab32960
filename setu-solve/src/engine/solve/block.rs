//! Blocks: the unit of independent solving.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::core::model::AffineModel2D;
use crate::core::types::TileSpec;
use crate::engine::graph::TileGraph;

/// Anything covering an inclusive integer layer range.
pub trait ZRange {
    /// Block identifier
    fn id(&self) -> u64;

    /// First layer
    fn min_z(&self) -> i64;

    /// Last layer
    fn max_z(&self) -> i64;

    /// Whether the two ranges overlap or are directly consecutive.
    fn touches<O: ZRange + ?Sized>(&self, other: &O) -> bool {
        self.min_z() <= other.max_z() + 1 && other.min_z() <= self.max_z() + 1
    }
}

/// Low bits of a block id that number the components split off it.
pub const CHILD_ID_BITS: u32 = 20;

/// A contiguous z-range of tiles solved as one problem.
#[derive(Debug, Clone)]
pub struct Block {
    /// Block identifier
    pub id: u64,

    /// First layer
    pub min_z: i64,

    /// Last layer
    pub max_z: i64,

    /// Tiles and correspondences
    pub graph: TileGraph,

    /// Tile ids per layer
    pub z_to_tile_ids: BTreeMap<i64, BTreeSet<String>>,

    /// Solved models, filled in by the solver
    pub new_models: BTreeMap<String, AffineModel2D>,
}

impl Block {
    /// Block with no tiles yet.
    pub fn new(id: u64, min_z: i64, max_z: i64) -> Self {
        Self::with_graph(id, min_z, max_z, TileGraph::default())
    }

    /// Id of the `index`-th connected component split off this block.
    ///
    /// Only the parent id and the component order go in, so a block splits
    /// into the same ids on every run. Input blocks keep their ids below
    /// `1 << CHILD_ID_BITS`, which keeps them apart from split-off ids.
    pub fn child_id(&self, index: usize) -> u64 {
        (self.id << CHILD_ID_BITS) | (index as u64 + 1)
    }

    /// Block over an existing graph; the layer index is limited to the range.
    pub fn with_graph(id: u64, min_z: i64, max_z: i64, graph: TileGraph) -> Self {
        let z_to_tile_ids = graph
            .layer_index()
            .into_iter()
            .filter(|(z, _)| *z >= min_z && *z <= max_z)
            .collect();
        Self {
            id,
            min_z,
            max_z,
            graph,
            z_to_tile_ids,
            new_models: BTreeMap::new(),
        }
    }

    /// Number of tiles.
    pub fn num_tiles(&self) -> usize {
        self.graph.num_nodes()
    }

    /// Pre-solve model per tile.
    pub fn previous_models(&self) -> BTreeMap<String, AffineModel2D> {
        self.graph
            .nodes()
            .iter()
            .map(|n| (n.tile_id.clone(), n.previous))
            .collect()
    }

    /// Tile spec per tile.
    pub fn tile_specs(&self) -> BTreeMap<String, TileSpec> {
        self.graph
            .nodes()
            .iter()
            .map(|n| (n.tile_id.clone(), n.spec.clone()))
            .collect()
    }

    /// Graph-free copy for checkpointing and merging.
    pub fn to_solved(&self) -> SolvedBlock {
        SolvedBlock {
            id: self.id,
            min_z: self.min_z,
            max_z: self.max_z,
            tile_specs: self.tile_specs(),
            previous_models: self.previous_models(),
            new_models: self.new_models.clone(),
            z_to_tile_ids: self.z_to_tile_ids.clone(),
        }
    }
}

impl ZRange for Block {
    fn id(&self) -> u64 {
        self.id
    }

    fn min_z(&self) -> i64 {
        self.min_z
    }

    fn max_z(&self) -> i64 {
        self.max_z
    }
}

/// A solved block without its graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolvedBlock {
    /// Block identifier
    pub id: u64,
    /// First layer
    pub min_z: i64,
    /// Last layer
    pub max_z: i64,
    /// Tile specs by tile id
    pub tile_specs: BTreeMap<String, TileSpec>,
    /// Pre-solve models
    pub previous_models: BTreeMap<String, AffineModel2D>,
    /// Solved models
    pub new_models: BTreeMap<String, AffineModel2D>,
    /// Tile ids per layer
    pub z_to_tile_ids: BTreeMap<i64, BTreeSet<String>>,
}

impl SolvedBlock {
    /// Number of tiles.
    pub fn num_tiles(&self) -> usize {
        self.tile_specs.len()
    }
}

impl ZRange for SolvedBlock {
    fn id(&self) -> u64 {
        self.id
    }

    fn min_z(&self) -> i64 {
        self.min_z
    }

    fn max_z(&self) -> i64 {
        self.max_z
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::RegularizerKind;

    #[test]
    fn test_child_ids_follow_parent_and_index() {
        let a = Block::new(3, 0, 9);
        let b = Block::new(4, 10, 19);
        assert_eq!(a.child_id(0), (3 << CHILD_ID_BITS) + 1);
        assert_eq!(a.child_id(1), (3 << CHILD_ID_BITS) + 2);
        assert_eq!(a.child_id(0), Block::new(3, 5, 6).child_id(0));
        assert_ne!(a.child_id(1), b.child_id(1));
        // never an input id
        assert!(a.child_id(0) >= 1 << CHILD_ID_BITS);
    }

    #[test]
    fn test_touches() {
        let a = Block::new(0, 0, 9);
        let b = Block::new(1, 10, 19);
        let c = Block::new(2, 21, 30);
        assert!(a.touches(&b));
        assert!(b.touches(&a));
        assert!(!b.touches(&c));
    }

    #[test]
    fn test_to_solved_carries_membership() {
        let mut graph = TileGraph::new(RegularizerKind::Rigid);
        let spec = TileSpec::new("t", "3.0", 3.0, 10.0, 10.0)
            .with_model(AffineModel2D::translation(1.0, 2.0));
        graph.get_or_insert(&spec);

        let mut block = Block::with_graph(7, 3, 3, graph);
        block
            .new_models
            .insert("t".to_string(), AffineModel2D::translation(3.0, 4.0));

        let solved = block.to_solved();
        assert_eq!(solved.id, 7);
        assert_eq!(solved.previous_models["t"], AffineModel2D::translation(1.0, 2.0));
        assert_eq!(solved.new_models["t"], AffineModel2D::translation(3.0, 4.0));
        assert!(solved.z_to_tile_ids[&3].contains("t"));
    }
}
