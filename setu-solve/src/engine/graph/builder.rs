//! Correspondence graph builder.
//!
//! Pulls the correspondences of every section in a block's z-range from a
//! [`StackSource`], filters pairs through the [`InclusionPolicy`], and turns
//! the survivors into a [`TileGraph`].

use std::collections::BTreeMap;

use super::inclusion::{Decision, InclusionConfig, InclusionPolicy, RejectReason};
use super::tile_graph::TileGraph;
use crate::core::model::RegularizerKind;
use crate::core::types::{Correspondence, TileSpec};
use crate::error::Result;
use crate::io::StackSource;

/// Counters from one build.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BuildStats {
    /// Correspondences read from the source
    pub correspondences: usize,
    /// Correspondences turned into edges
    pub connected: usize,
    /// Pairs skipped because a tile spec was unavailable
    pub missing_tile_specs: usize,
    /// Pairs skipped because they carried no matches
    pub empty: usize,
    /// Pairs rejected by the inclusion policy, per reason
    pub rejected: BTreeMap<RejectReason, usize>,
}

impl BuildStats {
    /// Total rejected pairs.
    pub fn total_rejected(&self) -> usize {
        self.rejected.values().sum()
    }

    /// Add another build's counters to these.
    pub fn merge(&mut self, other: &BuildStats) {
        self.correspondences += other.correspondences;
        self.connected += other.connected;
        self.missing_tile_specs += other.missing_tile_specs;
        self.empty += other.empty;
        for (reason, count) in &other.rejected {
            *self.rejected.entry(*reason).or_default() += count;
        }
    }
}

/// Builds the tile graph for one z-range.
#[derive(Debug)]
pub struct GraphBuilder<'a> {
    inclusion: &'a InclusionConfig,
    regularizer: RegularizerKind,
    min_z: i64,
    max_z: i64,
}

impl<'a> GraphBuilder<'a> {
    /// Create a builder for `[min_z, max_z]`.
    pub fn new(
        inclusion: &'a InclusionConfig,
        regularizer: RegularizerKind,
        min_z: i64,
        max_z: i64,
    ) -> Self {
        Self {
            inclusion,
            regularizer,
            min_z,
            max_z,
        }
    }

    /// Build the graph from a stack source.
    ///
    /// Sections are visited in sorted order so the node order, and with it
    /// the solve, is reproducible.
    pub fn build<S: StackSource + ?Sized>(&self, source: &S) -> Result<(TileGraph, BuildStats)> {
        let (lo, hi) = TileSpec::z_window(self.min_z, self.max_z);
        let mut section_ids = source.section_ids(lo, hi)?;
        section_ids.sort();
        section_ids.dedup();

        let mut graph = TileGraph::new(self.regularizer);
        let mut policy = InclusionPolicy::new(self.inclusion, self.min_z, self.max_z);
        let mut stats = BuildStats::default();

        for section_id in &section_ids {
            let correspondences = source.matches_with_p_group(section_id)?;
            log::debug!(
                "Section {}: {} correspondences",
                section_id,
                correspondences.len()
            );
            for correspondence in &correspondences {
                self.ingest(source, correspondence, &mut graph, &mut policy, &mut stats)?;
            }
        }

        log::info!(
            "Built graph for z [{}, {}]: {} tiles, {} edges ({} of {} pairs connected, {} rejected, {} missing specs)",
            self.min_z,
            self.max_z,
            graph.num_nodes(),
            graph.num_edges(),
            stats.connected,
            stats.correspondences,
            stats.total_rejected(),
            stats.missing_tile_specs
        );

        Ok((graph, stats))
    }

    fn ingest<S: StackSource + ?Sized>(
        &self,
        source: &S,
        correspondence: &Correspondence,
        graph: &mut TileGraph,
        policy: &mut InclusionPolicy<'_>,
        stats: &mut BuildStats,
    ) -> Result<()> {
        stats.correspondences += 1;

        if correspondence.matches.is_empty() || correspondence.p_id == correspondence.q_id {
            stats.empty += 1;
            return Ok(());
        }

        let p_spec = source.tile_spec(&correspondence.p_group_id, &correspondence.p_id)?;
        let q_spec = source.tile_spec(&correspondence.q_group_id, &correspondence.q_id)?;
        let (Some(p_spec), Some(q_spec)) = (p_spec, q_spec) else {
            log::info!(
                "Skipping pair {} <-> {}: tile spec not found",
                correspondence.p_id,
                correspondence.q_id
            );
            stats.missing_tile_specs += 1;
            return Ok(());
        };

        if let Decision::Reject(reason) = policy.evaluate(&p_spec, &q_spec) {
            log::debug!(
                "Rejected pair {} (z={}) <-> {} (z={}): {}",
                p_spec.tile_id,
                p_spec.z,
                q_spec.tile_id,
                q_spec.z,
                reason
            );
            *stats.rejected.entry(reason).or_insert(0) += 1;
            return Ok(());
        }

        let p = graph.get_or_insert(&p_spec);
        let q = graph.get_or_insert(&q_spec);
        graph.connect(p, q, &correspondence.matches);
        stats.connected += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{Point2D, PointMatch};
    use crate::io::InMemoryStack;

    fn matches() -> Vec<PointMatch> {
        vec![PointMatch::new(Point2D::new(1.0, 1.0), Point2D::new(2.0, 2.0)); 4]
    }

    fn stack() -> InMemoryStack {
        let mut stack = InMemoryStack::new();
        stack.add_tile(TileSpec::new("a", "0.0", 0.0, 100.0, 100.0));
        stack.add_tile(TileSpec::new("b", "0.0", 0.0, 100.0, 100.0));
        stack.add_tile(TileSpec::new("c", "1.0", 1.0, 100.0, 100.0));
        stack.add_tile(TileSpec::new("far", "9.0", 9.0, 100.0, 100.0));
        stack
    }

    #[test]
    fn test_repeated_correspondences_share_nodes() {
        let mut stack = stack();
        stack.add_correspondence(Correspondence::new("0.0", "a", "0.0", "b", matches()));
        stack.add_correspondence(Correspondence::new("0.0", "a", "0.0", "b", matches()));
        stack.add_correspondence(Correspondence::new("0.0", "b", "1.0", "c", matches()));

        let config = InclusionConfig::default();
        let builder = GraphBuilder::new(&config, RegularizerKind::Rigid, 0, 1);
        let (graph, stats) = builder.build(&stack).unwrap();

        assert_eq!(graph.num_nodes(), 3);
        assert_eq!(graph.num_edges(), 2);
        assert_eq!(stats.connected, 3);
        let ab = &graph.edges()[0];
        assert_eq!(ab.matches.len(), 8);
        assert_eq!(ab.weight, 8.0);
    }

    #[test]
    fn test_missing_spec_and_empty_pairs_are_skipped() {
        let mut stack = stack();
        stack.add_correspondence(Correspondence::new("0.0", "a", "0.0", "ghost", matches()));
        stack.add_correspondence(Correspondence::new("0.0", "a", "0.0", "b", Vec::new()));

        let config = InclusionConfig::default();
        let builder = GraphBuilder::new(&config, RegularizerKind::Rigid, 0, 1);
        let (graph, stats) = builder.build(&stack).unwrap();

        assert_eq!(graph.num_nodes(), 0);
        assert_eq!(stats.missing_tile_specs, 1);
        assert_eq!(stats.empty, 1);
    }

    #[test]
    fn test_fractional_z_rounds_into_range() {
        let mut stack = stack();
        // layer 2 by rounding, above the raw bound of 2.0
        stack.add_tile(TileSpec::new("d", "2.3", 2.3, 100.0, 100.0));
        stack.add_correspondence(Correspondence::new("2.3", "d", "1.0", "c", matches()));

        let config = InclusionConfig::default();
        let builder = GraphBuilder::new(&config, RegularizerKind::Rigid, 0, 2);
        let (graph, stats) = builder.build(&stack).unwrap();

        assert_eq!(stats.correspondences, 1);
        assert_eq!(graph.num_edges(), 1);
        assert!(graph.index_of("d").is_some());
    }

    #[test]
    fn test_out_of_range_pairs_are_counted() {
        let mut stack = stack();
        stack.add_correspondence(Correspondence::new("0.0", "a", "9.0", "far", matches()));

        let config = InclusionConfig::default();
        let builder = GraphBuilder::new(&config, RegularizerKind::Rigid, 0, 1);
        let (graph, stats) = builder.build(&stack).unwrap();

        assert_eq!(graph.num_edges(), 0);
        assert_eq!(stats.rejected[&RejectReason::OutsideRange], 1);
    }
}
