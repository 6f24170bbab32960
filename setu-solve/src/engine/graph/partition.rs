//! Graph partitioning into connected components.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::engine::graph::TileGraph;
use crate::engine::solve::Block;
use crate::error::{Error, Result};

/// Union-find over node indices.
struct DisjointSets {
    parent: Vec<usize>,
    rank: Vec<u8>,
}

impl DisjointSets {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
            rank: vec![0; n],
        }
    }

    /// Find with path compression.
    fn find(&mut self, x: usize) -> usize {
        if self.parent[x] != x {
            self.parent[x] = self.find(self.parent[x]);
        }
        self.parent[x]
    }

    /// Union by rank.
    fn union(&mut self, x: usize, y: usize) {
        let root_x = self.find(x);
        let root_y = self.find(y);

        if root_x != root_y {
            if self.rank[root_x] < self.rank[root_y] {
                self.parent[root_x] = root_y;
            } else if self.rank[root_x] > self.rank[root_y] {
                self.parent[root_y] = root_x;
            } else {
                self.parent[root_y] = root_x;
                self.rank[root_x] += 1;
            }
        }
    }
}

/// Connected components as sorted node index lists.
///
/// Components are ordered by their smallest tile id.
pub fn connected_components(graph: &TileGraph) -> Vec<Vec<usize>> {
    let n = graph.num_nodes();
    let mut sets = DisjointSets::new(n);
    for edge in graph.edges() {
        sets.union(edge.a, edge.b);
    }

    let mut by_root: HashMap<usize, Vec<usize>> = HashMap::new();
    for i in 0..n {
        let root = sets.find(i);
        by_root.entry(root).or_default().push(i);
    }

    let nodes = graph.nodes();
    let mut components: Vec<Vec<usize>> = by_root.into_values().collect();
    components.sort_by(|a, b| {
        let min_id = |c: &Vec<usize>| c.iter().map(|&i| nodes[i].tile_id.as_str()).min();
        min_id(a).cmp(&min_id(b))
    });
    components
}

/// Every layer of `[min_z, max_z]` must hold at least one tile.
fn check_layers(
    block_id: u64,
    z_to_tile_ids: &BTreeMap<i64, BTreeSet<String>>,
    min_z: i64,
    max_z: i64,
) -> Result<()> {
    match (min_z..=max_z).find(|z| !z_to_tile_ids.contains_key(z)) {
        Some(z) => Err(Error::EmptyLayer {
            block_id,
            z,
            min_z,
            max_z,
        }),
        None => Ok(()),
    }
}

/// Occupied layer range of a graph, clamped to `[min_z, max_z]`.
fn occupied_range(graph: &TileGraph, min_z: i64, max_z: i64) -> Option<(i64, i64)> {
    let layers = graph.nodes().iter().map(|n| n.layer());
    let (lo, hi) = (layers.clone().min()?, layers.max()?);
    Some((lo.max(min_z), hi.min(max_z)))
}

/// Split a block into one block per connected component.
///
/// A block with one component keeps its id and graph. Otherwise each
/// component becomes a new block with id [`Block::child_id`] and a z-range
/// recomputed from its tiles. Either way every layer between the first and
/// last occupied layer must hold at least one tile.
pub fn split(block: Block) -> Result<Vec<Block>> {
    let components = connected_components(&block.graph);
    if components.len() <= 1 {
        if let Some((min_z, max_z)) = occupied_range(&block.graph, block.min_z, block.max_z) {
            check_layers(block.id, &block.z_to_tile_ids, min_z, max_z)?;
        }
        return Ok(vec![block]);
    }

    log::info!(
        "Block {} [{}, {}]: {} tiles form {} connected components",
        block.id,
        block.min_z,
        block.max_z,
        block.num_tiles(),
        components.len()
    );

    let mut blocks = Vec::with_capacity(components.len());
    for (index, component) in components.iter().enumerate() {
        let graph = block.graph.subgraph(component);
        let Some((min_z, max_z)) = occupied_range(&graph, block.min_z, block.max_z) else {
            continue;
        };

        let child = Block::with_graph(block.child_id(index), min_z, max_z, graph);
        check_layers(child.id, &child.z_to_tile_ids, min_z, max_z)?;

        log::debug!(
            "Block {} -> {} [{}, {}] with {} tiles",
            block.id,
            child.id,
            min_z,
            max_z,
            child.num_tiles()
        );
        blocks.push(child);
    }

    Ok(blocks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::RegularizerKind;
    use crate::core::types::{Point2D, PointMatch, TileSpec};

    fn graph_of(tiles: &[(&str, f64)], links: &[(&str, &str)]) -> TileGraph {
        let mut graph = TileGraph::new(RegularizerKind::Rigid);
        for &(id, z) in tiles {
            graph.get_or_insert(&TileSpec::new(id, &format!("{z:.1}"), z, 10.0, 10.0));
        }
        let m = [PointMatch::new(Point2D::new(0.0, 0.0), Point2D::new(0.0, 0.0))];
        for &(a, b) in links {
            let (Some(a), Some(b)) = (graph.index_of(a), graph.index_of(b)) else {
                panic!("unknown tile");
            };
            graph.connect(a, b, &m);
        }
        graph
    }

    #[test]
    fn test_components_are_ordered_by_tile_id() {
        let graph = graph_of(
            &[("z", 0.0), ("b", 0.0), ("y", 0.0), ("a", 0.0)],
            &[("z", "y"), ("b", "a")],
        );
        let components = connected_components(&graph);
        assert_eq!(components.len(), 2);
        // {a, b} before {y, z}
        assert_eq!(components[0], vec![1, 3]);
        assert_eq!(components[1], vec![0, 2]);
    }

    #[test]
    fn test_single_component_is_unchanged() {
        let graph = graph_of(&[("a", 0.0), ("b", 1.0)], &[("a", "b")]);
        let block = Block::with_graph(5, 0, 1, graph);
        let blocks = split(block).unwrap();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].id, 5);
    }

    #[test]
    fn test_single_component_with_gap_is_fatal() {
        let graph = graph_of(
            &[("a", 0.0), ("b", 1.0), ("c", 3.0)],
            &[("a", "b"), ("b", "c")],
        );
        let block = Block::with_graph(5, 0, 3, graph);
        match split(block) {
            Err(Error::EmptyLayer {
                block_id,
                z,
                min_z,
                max_z,
            }) => {
                assert_eq!((block_id, z, min_z, max_z), (5, 2, 0, 3));
            }
            other => panic!("expected EmptyLayer, got {other:?}"),
        }
    }

    #[test]
    fn test_single_component_may_leave_block_edges_empty() {
        // layers 0 and 4 are outside the occupied range [1, 2]
        let graph = graph_of(&[("a", 1.0), ("b", 2.0)], &[("a", "b")]);
        let block = Block::with_graph(5, 0, 4, graph);
        let blocks = split(block).unwrap();
        assert_eq!(blocks.len(), 1);
        assert_eq!((blocks[0].min_z, blocks[0].max_z), (0, 4));
    }

    #[test]
    fn test_split_recomputes_ranges() {
        let graph = graph_of(
            &[("a", 0.0), ("b", 1.0), ("c", 2.0), ("d", 3.0)],
            &[("a", "b"), ("c", "d")],
        );
        let parent = Block::with_graph(1, 0, 3, graph);
        let (first, second) = (parent.child_id(0), parent.child_id(1));
        let blocks = split(parent).unwrap();

        assert_eq!(blocks.len(), 2);
        assert_eq!((blocks[0].id, blocks[0].min_z, blocks[0].max_z), (first, 0, 1));
        assert_eq!((blocks[1].id, blocks[1].min_z, blocks[1].max_z), (second, 2, 3));
        assert_eq!(blocks[1].graph.num_edges(), 1);

        // partitioning a component again is a no-op
        for block in blocks {
            let id = block.id;
            let again = split(block).unwrap();
            assert_eq!(again.len(), 1);
            assert_eq!(again[0].id, id);
        }
    }

    #[test]
    fn test_split_ids_repeat_across_runs() {
        let graph = graph_of(
            &[("a", 0.0), ("b", 0.0), ("c", 0.0), ("d", 0.0)],
            &[("c", "d"), ("a", "b")],
        );
        let block = Block::with_graph(9, 0, 0, graph);
        let ids = |blocks: Vec<Block>| blocks.iter().map(|b| b.id).collect::<Vec<u64>>();
        let first = ids(split(block.clone()).unwrap());
        let second = ids(split(block).unwrap());
        assert_eq!(first, second);
        assert_eq!(first, vec![(9 << 20) + 1, (9 << 20) + 2]);
    }

    #[test]
    fn test_gap_inside_component_is_fatal() {
        let graph = graph_of(
            &[("a", 0.0), ("b", 2.0), ("x", 5.0), ("y", 5.0)],
            &[("a", "b"), ("x", "y")],
        );
        let block = Block::with_graph(1, 0, 5, graph);
        match split(block) {
            Err(Error::EmptyLayer { z, min_z, max_z, .. }) => {
                assert_eq!((z, min_z, max_z), (1, 0, 2));
            }
            other => panic!("expected EmptyLayer, got {other:?}"),
        }
    }
}
