//! Tile connectivity graph.
//!
//! Nodes are tiles, edges carry the point matches between two tiles. The
//! graph is an arena: nodes and edges live in vectors and refer to each other
//! by index, with side tables for tile id → node and node pair → edge.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::core::model::{AffineModel2D, RegularizerKind, TransformModel};
use crate::core::types::{PointMatch, TileSpec};

/// A tile in the graph.
#[derive(Debug, Clone)]
pub struct TileNode {
    /// Tile identifier
    pub tile_id: String,

    /// Tile spec as loaded for this pass
    pub spec: TileSpec,

    /// Transform before the solve
    pub previous: AffineModel2D,

    /// Model being fitted
    pub model: TransformModel,

    /// Current local-to-world estimate
    pub world: AffineModel2D,

    /// Whether this node is held in place by the solver
    pub fixed: bool,

    /// Incident edge indices
    pub edges: Vec<usize>,
}

impl TileNode {
    fn new(spec: &TileSpec, kind: RegularizerKind) -> Self {
        Self {
            tile_id: spec.tile_id.clone(),
            spec: spec.clone(),
            previous: spec.model,
            model: TransformModel::regularized(spec.model, kind, 1.0),
            world: spec.model,
            fixed: false,
            edges: Vec::new(),
        }
    }

    /// Integer layer index of the tile.
    #[inline]
    pub fn layer(&self) -> i64 {
        self.spec.layer()
    }
}

/// Undirected edge between two nodes.
///
/// Matches are oriented from `a` to `b` with `a < b`: each `p` lives in
/// node `a`'s local frame and each `q` in node `b`'s.
#[derive(Debug, Clone)]
pub struct Edge {
    /// Lower node index
    pub a: usize,
    /// Higher node index
    pub b: usize,
    /// Point matches, `a` → `b`
    pub matches: Vec<PointMatch>,
    /// Sum of match weights
    pub weight: f64,
}

impl Edge {
    /// The node at the other end of this edge.
    #[inline]
    pub fn other(&self, node: usize) -> usize {
        if node == self.a { self.b } else { self.a }
    }
}

/// Arena graph of tiles and their correspondences.
#[derive(Debug, Clone, Default)]
pub struct TileGraph {
    nodes: Vec<TileNode>,
    edges: Vec<Edge>,
    node_index: HashMap<String, usize>,
    edge_index: HashMap<(usize, usize), usize>,
    regularizer: RegularizerKind,
}

impl TileGraph {
    /// Create an empty graph whose nodes use the given regularizer.
    pub fn new(regularizer: RegularizerKind) -> Self {
        Self {
            regularizer,
            ..Self::default()
        }
    }

    /// Node index for a tile, creating the node on first reference.
    ///
    /// The previous model is snapshotted from `spec` only on creation.
    pub fn get_or_insert(&mut self, spec: &TileSpec) -> usize {
        if let Some(&idx) = self.node_index.get(&spec.tile_id) {
            return idx;
        }
        let idx = self.nodes.len();
        self.nodes.push(TileNode::new(spec, self.regularizer));
        self.node_index.insert(spec.tile_id.clone(), idx);
        idx
    }

    /// Add matches between two nodes, `p` in `from`'s frame and `q` in `to`'s.
    ///
    /// Matches accumulate on one edge per unordered node pair. Returns the
    /// edge index, or `None` for a self-connection.
    pub fn connect(&mut self, from: usize, to: usize, matches: &[PointMatch]) -> Option<usize> {
        if from == to {
            return None;
        }

        let (a, b) = if from < to { (from, to) } else { (to, from) };
        let idx = match self.edge_index.get(&(a, b)) {
            Some(&idx) => idx,
            None => {
                let idx = self.edges.len();
                self.edges.push(Edge {
                    a,
                    b,
                    matches: Vec::new(),
                    weight: 0.0,
                });
                self.edge_index.insert((a, b), idx);
                self.nodes[a].edges.push(idx);
                self.nodes[b].edges.push(idx);
                idx
            }
        };

        let edge = &mut self.edges[idx];
        if from == a {
            edge.matches.extend_from_slice(matches);
        } else {
            edge.matches.extend(matches.iter().map(PointMatch::flipped));
        }
        edge.weight += matches.iter().map(|m| m.weight).sum::<f64>();
        Some(idx)
    }

    /// Node index of a tile.
    pub fn index_of(&self, tile_id: &str) -> Option<usize> {
        self.node_index.get(tile_id).copied()
    }

    /// Node by tile id.
    pub fn node(&self, tile_id: &str) -> Option<&TileNode> {
        self.index_of(tile_id).map(|idx| &self.nodes[idx])
    }

    /// All nodes.
    pub fn nodes(&self) -> &[TileNode] {
        &self.nodes
    }

    /// Mutable nodes.
    pub fn nodes_mut(&mut self) -> &mut [TileNode] {
        &mut self.nodes
    }

    /// All edges.
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Number of nodes.
    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Number of edges.
    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    /// Regularizer used for new nodes.
    pub fn regularizer(&self) -> RegularizerKind {
        self.regularizer
    }

    /// Hold a tile in place during relaxation.
    pub fn fix(&mut self, tile_id: &str) -> bool {
        match self.index_of(tile_id) {
            Some(idx) => {
                self.nodes[idx].fixed = true;
                true
            }
            None => false,
        }
    }

    /// Set the regularizer weight of every node.
    pub fn set_lambda(&mut self, lambda: f64) {
        for node in &mut self.nodes {
            node.model.set_lambda(lambda);
        }
    }

    /// Tile ids per integer layer.
    pub fn layer_index(&self) -> BTreeMap<i64, BTreeSet<String>> {
        let mut layers: BTreeMap<i64, BTreeSet<String>> = BTreeMap::new();
        for node in &self.nodes {
            layers
                .entry(node.layer())
                .or_default()
                .insert(node.tile_id.clone());
        }
        layers
    }

    /// Copy of the graph restricted to the given nodes.
    ///
    /// Nodes keep their relative order; edges with both ends inside the
    /// selection are re-indexed, all others are dropped.
    pub fn subgraph(&self, selection: &[usize]) -> TileGraph {
        let mut sorted: Vec<usize> = selection.to_vec();
        sorted.sort_unstable();
        sorted.dedup();

        let mut remap: HashMap<usize, usize> = HashMap::with_capacity(sorted.len());
        let mut graph = TileGraph::new(self.regularizer);

        for &old in &sorted {
            let mut node = self.nodes[old].clone();
            node.edges.clear();
            remap.insert(old, graph.nodes.len());
            graph.node_index.insert(node.tile_id.clone(), graph.nodes.len());
            graph.nodes.push(node);
        }

        for edge in &self.edges {
            if let (Some(&a), Some(&b)) = (remap.get(&edge.a), remap.get(&edge.b)) {
                // remap is monotonic, so a < b still holds
                let idx = graph.edges.len();
                graph.edges.push(Edge {
                    a,
                    b,
                    matches: edge.matches.clone(),
                    weight: edge.weight,
                });
                graph.edge_index.insert((a, b), idx);
                graph.nodes[a].edges.push(idx);
                graph.nodes[b].edges.push(idx);
            }
        }

        graph
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Point2D;

    fn spec(id: &str, z: f64) -> TileSpec {
        TileSpec::new(id, &format!("{z:.1}"), z, 100.0, 100.0)
    }

    fn one_match(px: f64, qx: f64) -> Vec<PointMatch> {
        vec![PointMatch::new(Point2D::new(px, 0.0), Point2D::new(qx, 0.0))]
    }

    #[test]
    fn test_get_or_insert_is_idempotent() {
        let mut graph = TileGraph::new(RegularizerKind::Rigid);
        let a = graph.get_or_insert(&spec("a", 0.0));
        let a2 = graph.get_or_insert(&spec("a", 0.0).with_model(AffineModel2D::translation(5.0, 0.0)));
        assert_eq!(a, a2);
        assert_eq!(graph.num_nodes(), 1);
        // first reference wins
        assert_eq!(graph.nodes()[a].previous, AffineModel2D::identity());
    }

    #[test]
    fn test_connect_orients_and_accumulates() {
        let mut graph = TileGraph::new(RegularizerKind::Rigid);
        let a = graph.get_or_insert(&spec("a", 0.0));
        let b = graph.get_or_insert(&spec("b", 0.0));

        let e1 = graph.connect(a, b, &one_match(1.0, 2.0)).unwrap();
        let e2 = graph.connect(b, a, &one_match(3.0, 4.0)).unwrap();
        assert_eq!(e1, e2);
        assert_eq!(graph.num_edges(), 1);

        let edge = &graph.edges()[e1];
        assert_eq!(edge.a, a);
        assert_eq!(edge.weight, 2.0);
        // second batch was flipped into a → b orientation
        assert_eq!(edge.matches[1].p.x, 4.0);
        assert_eq!(edge.matches[1].q.x, 3.0);
        assert_eq!(graph.nodes()[a].edges, vec![e1]);
        assert_eq!(graph.nodes()[b].edges, vec![e1]);
    }

    #[test]
    fn test_self_connection_is_ignored() {
        let mut graph = TileGraph::new(RegularizerKind::Rigid);
        let a = graph.get_or_insert(&spec("a", 0.0));
        assert!(graph.connect(a, a, &one_match(0.0, 0.0)).is_none());
        assert_eq!(graph.num_edges(), 0);
    }

    #[test]
    fn test_subgraph_reindexes_edges() {
        let mut graph = TileGraph::new(RegularizerKind::Rigid);
        let a = graph.get_or_insert(&spec("a", 0.0));
        let b = graph.get_or_insert(&spec("b", 0.0));
        let c = graph.get_or_insert(&spec("c", 1.0));
        graph.connect(a, b, &one_match(0.0, 1.0));
        graph.connect(b, c, &one_match(0.0, 1.0));

        let sub = graph.subgraph(&[c, b]);
        assert_eq!(sub.num_nodes(), 2);
        assert_eq!(sub.num_edges(), 1);
        assert_eq!(sub.index_of("b"), Some(0));
        assert_eq!(sub.index_of("c"), Some(1));
        assert_eq!(sub.edges()[0].a, 0);
        assert_eq!(sub.edges()[0].b, 1);
        assert!(sub.index_of("a").is_none());
    }

    #[test]
    fn test_set_lambda_reaches_every_node() {
        let mut graph = TileGraph::new(RegularizerKind::Translation);
        graph.get_or_insert(&spec("a", 0.0));
        graph.get_or_insert(&spec("b", 1.0));
        assert!(graph.nodes().iter().all(|n| n.model.lambda() == Some(1.0)));

        graph.set_lambda(0.25);
        assert!(graph.nodes().iter().all(|n| n.model.lambda() == Some(0.25)));
    }

    #[test]
    fn test_layer_index() {
        let mut graph = TileGraph::new(RegularizerKind::Rigid);
        graph.get_or_insert(&spec("a", 0.0));
        graph.get_or_insert(&spec("b", 0.0));
        graph.get_or_insert(&spec("c", 2.0));
        let layers = graph.layer_index();
        assert_eq!(layers.len(), 2);
        assert_eq!(layers[&0].len(), 2);
        assert!(layers[&2].contains("c"));
    }
}
