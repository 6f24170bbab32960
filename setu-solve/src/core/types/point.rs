//! Point and point match types.

use serde::{Deserialize, Serialize};

/// A 2D point in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point2D {
    /// X coordinate
    pub x: f64,
    /// Y coordinate
    pub y: f64,
}

impl Point2D {
    /// Create a new point.
    #[inline]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Squared distance to another point (avoids sqrt).
    #[inline]
    pub fn distance_squared(&self, other: &Point2D) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }

    /// Distance to another point.
    #[inline]
    pub fn distance(&self, other: &Point2D) -> f64 {
        self.distance_squared(other).sqrt()
    }
}

impl Default for Point2D {
    fn default() -> Self {
        Self { x: 0.0, y: 0.0 }
    }
}

fn default_weight() -> f64 {
    1.0
}

/// A pair of corresponding points.
///
/// `p` lives in the first tile's frame and `q` in the second tile's frame.
/// During model fitting `q` is the target the model should map `p` onto.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointMatch {
    /// Point in the first frame
    pub p: Point2D,
    /// Point in the second frame
    pub q: Point2D,
    /// Match weight
    #[serde(default = "default_weight")]
    pub weight: f64,
}

impl PointMatch {
    /// Create a unit-weight match.
    #[inline]
    pub fn new(p: Point2D, q: Point2D) -> Self {
        Self { p, q, weight: 1.0 }
    }

    /// Create a weighted match.
    #[inline]
    pub fn weighted(p: Point2D, q: Point2D, weight: f64) -> Self {
        Self { p, q, weight }
    }

    /// Same match seen from the other side.
    #[inline]
    pub fn flipped(&self) -> Self {
        Self {
            p: self.q,
            q: self.p,
            weight: self.weight,
        }
    }
}
