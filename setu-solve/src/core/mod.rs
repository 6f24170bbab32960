//! Core foundation layer.
//!
//! This is the bottom layer of the solver stack with no internal dependencies.
//! All other layers depend on core.
//!
//! # Contents
//!
//! - [`types`]: Core data types (points, point matches, tile specs, correspondences)
//! - [`model`]: 2D transform models (translation, rigid, affine, regularized blend)

pub mod model;
pub mod types;
