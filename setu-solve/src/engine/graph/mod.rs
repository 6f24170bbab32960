//! Tile connectivity graph.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       TILE GRAPH                            │
//! │                                                             │
//! │    Nodes: tiles, each with a model being fitted            │
//! │    Edges: point matches between two tiles                  │
//! │                                                             │
//! │    z=0   [a] ──── [b]                                       │
//! │           │        │                                        │
//! │    z=1   [c] ──── [d]        [e] ── [f]   (2nd component)   │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Components
//!
//! - [`TileGraph`]: arena of [`TileNode`]s and [`Edge`]s
//! - [`GraphBuilder`]: builds a graph from a stack source
//! - [`InclusionPolicy`]: decides which tile pairs become edges
//! - [`split`]: one block per connected component

mod builder;
mod inclusion;
mod partition;
mod tile_graph;

pub use builder::{BuildStats, GraphBuilder};
pub use inclusion::{
    Decision, InclusionConfig, InclusionPolicy, LinkRule, RejectReason, RuleEffect, ZLimit,
};
pub use partition::{connected_components, split};
pub use tile_graph::{Edge, TileGraph, TileNode};
