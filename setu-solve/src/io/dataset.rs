//! File-backed stack.
//!
//! A dataset is one JSON document:
//!
//! ```json
//! {
//!   "tile_specs": [ { "tile_id": "...", "section_id": "...", "z": 0.0, ... } ],
//!   "matches":    [ { "p_group_id": "...", "p_id": "...", "q_group_id": "...", ... } ]
//! }
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::source::{InMemoryStack, ResolvedTileSink, StackSource};
use crate::core::model::AffineModel2D;
use crate::core::types::{Correspondence, TileSpec};
use crate::error::{Error, Result};

#[derive(Debug, Default, Serialize, Deserialize)]
struct DatasetFile {
    #[serde(default)]
    tile_specs: Vec<TileSpec>,
    #[serde(default)]
    matches: Vec<Correspondence>,
}

/// Resolved models as written to disk.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResolvedModels {
    /// Models per layer, then per tile id
    pub layers: BTreeMap<i64, BTreeMap<String, AffineModel2D>>,
}

/// Stack loaded from a JSON dataset file.
#[derive(Debug, Clone, Default)]
pub struct JsonDataset {
    stack: InMemoryStack,
}

impl JsonDataset {
    /// Load a dataset file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            Error::Source(format!("Failed to read dataset {}: {}", path.display(), e))
        })?;
        let dataset = Self::from_json(&content)?;
        log::info!(
            "Loaded dataset {}: {} tiles, {} correspondences",
            path.display(),
            dataset.stack.num_tiles(),
            dataset.stack.correspondences().len()
        );
        Ok(dataset)
    }

    /// Parse a dataset document.
    pub fn from_json(content: &str) -> Result<Self> {
        let file: DatasetFile = serde_json::from_str(content)?;
        Ok(Self {
            stack: InMemoryStack::from_parts(file.tile_specs, file.matches),
        })
    }

    /// Serialize tiles and correspondences back to a dataset document.
    pub fn to_json(&self) -> Result<String> {
        let file = DatasetFile {
            tile_specs: self.stack.tiles().cloned().collect(),
            matches: self.stack.correspondences().to_vec(),
        };
        Ok(serde_json::to_string_pretty(&file)?)
    }

    /// Underlying in-memory stack.
    pub fn stack(&self) -> &InMemoryStack {
        &self.stack
    }

    /// Models collected through [`ResolvedTileSink`].
    pub fn resolved(&self) -> ResolvedModels {
        ResolvedModels {
            layers: self.stack.resolved().clone(),
        }
    }

    /// Write the collected models as pretty JSON.
    pub fn write_resolved(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.resolved())?;
        fs::write(path, json)?;
        log::info!("Wrote resolved models to {}", path.display());
        Ok(())
    }
}

impl StackSource for JsonDataset {
    fn section_ids(&self, min_z: f64, max_z: f64) -> Result<Vec<String>> {
        self.stack.section_ids(min_z, max_z)
    }

    fn matches_with_p_group(&self, p_group_id: &str) -> Result<Vec<Correspondence>> {
        self.stack.matches_with_p_group(p_group_id)
    }

    fn tile_spec(&self, group_id: &str, tile_id: &str) -> Result<Option<TileSpec>> {
        self.stack.tile_spec(group_id, tile_id)
    }

    fn z_values(&self, min_z: f64, max_z: f64) -> Result<Vec<f64>> {
        self.stack.z_values(min_z, max_z)
    }
}

impl ResolvedTileSink for JsonDataset {
    fn save_resolved_tiles(
        &mut self,
        z: i64,
        models: &BTreeMap<String, AffineModel2D>,
    ) -> Result<()> {
        self.stack.save_resolved_tiles(z, models)
    }
}
