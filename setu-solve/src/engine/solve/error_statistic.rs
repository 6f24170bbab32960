//! Rolling error window for convergence checks.

use std::collections::VecDeque;

/// Largest |slope| still considered flat.
pub const PLATEAU_SLOPE: f64 = 1e-4;

/// The last `capacity` aggregate errors of a stage.
#[derive(Debug, Clone)]
pub struct ErrorStatistic {
    values: VecDeque<f64>,
    capacity: usize,
    iterations: usize,
}

impl ErrorStatistic {
    /// Window sized for a plateau width of `plateau_width`.
    pub fn new(plateau_width: usize) -> Self {
        let capacity = plateau_width + 1;
        Self {
            values: VecDeque::with_capacity(capacity),
            capacity,
            iterations: 0,
        }
    }

    /// Record one iteration's error.
    pub fn add(&mut self, error: f64) {
        if self.values.len() == self.capacity {
            self.values.pop_front();
        }
        self.values.push_back(error);
        self.iterations += 1;
    }

    /// Iterations recorded, including those pushed out of the window.
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// Most recent error.
    pub fn last(&self) -> Option<f64> {
        self.values.back().copied()
    }

    /// Mean over the window.
    pub fn mean(&self) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        self.values.iter().sum::<f64>() / self.values.len() as f64
    }

    /// Smallest value in the window.
    pub fn min(&self) -> f64 {
        self.values.iter().copied().fold(f64::INFINITY, f64::min)
    }

    /// Largest value in the window.
    pub fn max(&self) -> f64 {
        self.values.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    }

    /// Average change per iteration over the last `distance` iterations.
    ///
    /// Returns `None` if the window holds fewer than `distance + 1` values.
    pub fn wide_slope(&self, distance: usize) -> Option<f64> {
        let n = self.values.len();
        if distance == 0 || n <= distance {
            return None;
        }
        Some((self.values[n - 1] - self.values[n - 1 - distance]) / distance as f64)
    }

    /// Whether the error has stopped changing.
    ///
    /// Requires more than `width` iterations, then checks the slope over
    /// `width`, `width / 2`, `width / 4`, … down to 1.
    pub fn is_plateau(&self, width: usize) -> bool {
        if width == 0 || self.iterations <= width {
            return false;
        }

        let mut d = width;
        while d >= 1 {
            match self.wide_slope(d) {
                Some(slope) if slope.abs() <= PLATEAU_SLOPE => {}
                _ => return false,
            }
            d /= 2;
        }
        true
    }
}
