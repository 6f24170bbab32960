//! Default value functions for serde deserialization.

use crate::engine::solve::Stage;

pub fn block_size() -> usize {
    500
}

pub fn threads() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

pub fn block_threads() -> usize {
    1
}

pub fn stages() -> Vec<Stage> {
    vec![
        Stage::new(1.0, 100, 50),
        Stage::new(0.5, 100, 50),
        Stage::new(0.1, 40, 40),
        Stage::new(0.01, 20, 20),
    ]
}

pub fn damp() -> f64 {
    0.5
}

pub fn overlap() -> usize {
    25
}

pub fn samples_per_dimension() -> usize {
    5
}

pub fn reconcile_iterations() -> usize {
    2000
}

pub fn min_entries() -> usize {
    3
}
