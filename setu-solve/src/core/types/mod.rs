//! Core data types for tile alignment.
//!
//! - [`Point2D`]: 2D point in pixel or world coordinates
//! - [`PointMatch`]: Weighted pair of corresponding points
//! - [`TileSpec`]: Tile identity, layer, size and current transform
//! - [`Correspondence`]: All point matches between two named tiles

mod point;
mod tile;

pub use point::{Point2D, PointMatch};
pub use tile::{Correspondence, TileSpec};
