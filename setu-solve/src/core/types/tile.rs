//! Tile specs and correspondences.

use serde::{Deserialize, Serialize};

use super::PointMatch;
use crate::core::model::AffineModel2D;

/// Immutable description of one tile for a solve pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileSpec {
    /// Unique tile identifier
    pub tile_id: String,

    /// Match group (section) this tile belongs to
    pub section_id: String,

    /// Layer position
    pub z: f64,

    /// Width in pixels
    pub width: f64,

    /// Height in pixels
    pub height: f64,

    /// Current local-to-world transform
    #[serde(default)]
    pub model: AffineModel2D,
}

impl TileSpec {
    /// Create a tile spec with an identity transform.
    pub fn new(tile_id: &str, section_id: &str, z: f64, width: f64, height: f64) -> Self {
        Self {
            tile_id: tile_id.to_string(),
            section_id: section_id.to_string(),
            z,
            width,
            height,
            model: AffineModel2D::identity(),
        }
    }

    /// Set the current transform.
    pub fn with_model(mut self, model: AffineModel2D) -> Self {
        self.model = model;
        self
    }

    /// Integer layer index.
    #[inline]
    pub fn layer(&self) -> i64 {
        self.z.round() as i64
    }

    /// Real-valued z window holding every tile whose layer is in `[min_z, max_z]`.
    pub fn z_window(min_z: i64, max_z: i64) -> (f64, f64) {
        (min_z as f64 - 0.5, max_z as f64 + 0.5)
    }
}

/// Point matches between tile `p_id` and tile `q_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Correspondence {
    /// Group of the first tile
    pub p_group_id: String,
    /// First tile
    pub p_id: String,
    /// Group of the second tile
    pub q_group_id: String,
    /// Second tile
    pub q_id: String,
    /// Matches with `p` in `p_id`'s frame and `q` in `q_id`'s frame
    pub matches: Vec<PointMatch>,
}

impl Correspondence {
    /// Create a correspondence.
    pub fn new(
        p_group_id: &str,
        p_id: &str,
        q_group_id: &str,
        q_id: &str,
        matches: Vec<PointMatch>,
    ) -> Self {
        Self {
            p_group_id: p_group_id.to_string(),
            p_id: p_id.to_string(),
            q_group_id: q_group_id.to_string(),
            q_id: q_id.to_string(),
            matches,
        }
    }

    /// Sum of match weights.
    pub fn total_weight(&self) -> f64 {
        self.matches.iter().map(|m| m.weight).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Point2D;

    #[test]
    fn test_layer_rounds() {
        assert_eq!(TileSpec::new("a", "1.0", 4.4, 10.0, 10.0).layer(), 4);
        assert_eq!(TileSpec::new("a", "1.0", 4.6, 10.0, 10.0).layer(), 5);
    }

    #[test]
    fn test_total_weight() {
        let m = PointMatch::weighted(Point2D::new(0.0, 0.0), Point2D::new(1.0, 1.0), 0.25);
        let c = Correspondence::new("0.0", "a", "1.0", "b", vec![m, m]);
        assert_eq!(c.total_weight(), 0.5);
    }
}
