//! I/O and infrastructure layer.
//!
//! # Contents
//!
//! - [`source`]: stack source / resolved-tile sink traits and the in-memory stack
//! - [`dataset`]: JSON dataset files
//! - [`checkpoint`]: solved block persistence

pub mod checkpoint;
pub mod dataset;
pub mod source;

pub use checkpoint::CheckpointStore;
pub use dataset::{JsonDataset, ResolvedModels};
pub use source::{InMemoryStack, ResolvedTileSink, StackSource};
