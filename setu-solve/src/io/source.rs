//! Stack source and resolved-tile sink.
//!
//! The solver reads tile specs and correspondences through [`StackSource`]
//! and hands final models to a [`ResolvedTileSink`]. [`InMemoryStack`] is the
//! in-process implementation of both.

use std::collections::{BTreeMap, BTreeSet};

use crate::core::model::AffineModel2D;
use crate::core::types::{Correspondence, TileSpec};
use crate::error::Result;

/// Read access to a stack's tiles and correspondences.
pub trait StackSource {
    /// Section (match group) ids with tiles in `[min_z, max_z]`.
    fn section_ids(&self, min_z: f64, max_z: f64) -> Result<Vec<String>>;

    /// Every correspondence whose first tile is in `p_group_id`.
    fn matches_with_p_group(&self, p_group_id: &str) -> Result<Vec<Correspondence>>;

    /// Tile spec, or `None` if the tile is unknown.
    fn tile_spec(&self, group_id: &str, tile_id: &str) -> Result<Option<TileSpec>>;

    /// Distinct z values in `[min_z, max_z]`, sorted.
    fn z_values(&self, min_z: f64, max_z: f64) -> Result<Vec<f64>>;
}

/// Destination for final models.
pub trait ResolvedTileSink {
    /// Store the final models of one layer.
    fn save_resolved_tiles(&mut self, z: i64, models: &BTreeMap<String, AffineModel2D>)
    -> Result<()>;
}

/// Stack held entirely in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStack {
    tiles: BTreeMap<String, TileSpec>,
    correspondences: Vec<Correspondence>,
    resolved: BTreeMap<i64, BTreeMap<String, AffineModel2D>>,
}

impl InMemoryStack {
    /// Empty stack.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stack from tiles and correspondences.
    pub fn from_parts(tiles: Vec<TileSpec>, correspondences: Vec<Correspondence>) -> Self {
        let mut stack = Self::new();
        for tile in tiles {
            stack.add_tile(tile);
        }
        stack.correspondences = correspondences;
        stack
    }

    /// Add or replace a tile.
    pub fn add_tile(&mut self, tile: TileSpec) {
        self.tiles.insert(tile.tile_id.clone(), tile);
    }

    /// Add a correspondence.
    pub fn add_correspondence(&mut self, correspondence: Correspondence) {
        self.correspondences.push(correspondence);
    }

    /// All tiles.
    pub fn tiles(&self) -> impl Iterator<Item = &TileSpec> {
        self.tiles.values()
    }

    /// All correspondences.
    pub fn correspondences(&self) -> &[Correspondence] {
        &self.correspondences
    }

    /// Number of tiles.
    pub fn num_tiles(&self) -> usize {
        self.tiles.len()
    }

    /// Models stored through [`ResolvedTileSink`], by layer.
    pub fn resolved(&self) -> &BTreeMap<i64, BTreeMap<String, AffineModel2D>> {
        &self.resolved
    }

    /// Resolved model of one tile.
    pub fn resolved_model(&self, tile_id: &str) -> Option<AffineModel2D> {
        self.resolved
            .values()
            .find_map(|layer| layer.get(tile_id).copied())
    }

    fn in_range(z: f64, min_z: f64, max_z: f64) -> bool {
        z >= min_z && z <= max_z
    }
}

impl StackSource for InMemoryStack {
    fn section_ids(&self, min_z: f64, max_z: f64) -> Result<Vec<String>> {
        let ids: BTreeSet<&String> = self
            .tiles
            .values()
            .filter(|t| Self::in_range(t.z, min_z, max_z))
            .map(|t| &t.section_id)
            .collect();
        Ok(ids.into_iter().cloned().collect())
    }

    fn matches_with_p_group(&self, p_group_id: &str) -> Result<Vec<Correspondence>> {
        Ok(self
            .correspondences
            .iter()
            .filter(|c| c.p_group_id == p_group_id)
            .cloned()
            .collect())
    }

    fn tile_spec(&self, _group_id: &str, tile_id: &str) -> Result<Option<TileSpec>> {
        Ok(self.tiles.get(tile_id).cloned())
    }

    fn z_values(&self, min_z: f64, max_z: f64) -> Result<Vec<f64>> {
        let mut zs: Vec<f64> = self
            .tiles
            .values()
            .map(|t| t.z)
            .filter(|&z| Self::in_range(z, min_z, max_z))
            .collect();
        zs.sort_by(f64::total_cmp);
        zs.dedup();
        Ok(zs)
    }
}

impl ResolvedTileSink for InMemoryStack {
    fn save_resolved_tiles(
        &mut self,
        z: i64,
        models: &BTreeMap<String, AffineModel2D>,
    ) -> Result<()> {
        self.resolved
            .entry(z)
            .or_default()
            .extend(models.iter().map(|(id, m)| (id.clone(), *m)));
        Ok(())
    }
}
