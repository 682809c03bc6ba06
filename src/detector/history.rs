//! Fixed-length trailing windows of observations and errors

use std::collections::VecDeque;

/// Holds exactly `capacity` values; pushing drops the oldest.
#[derive(Debug, Clone, PartialEq)]
pub struct RollingWindow {
    values: VecDeque<f64>,
    capacity: usize,
}

impl RollingWindow {
    /// Window of `capacity` zeros
    pub fn new(capacity: usize) -> Self {
        Self {
            values: std::iter::repeat(0.0).take(capacity).collect(),
            capacity,
        }
    }

    /// Window holding the last `capacity` elements of `values`, zero-padded
    /// on the left when `values` is shorter.
    pub fn seeded(capacity: usize, values: &[f64]) -> Self {
        let mut window = Self::new(capacity);
        let start = values.len().saturating_sub(capacity);
        for &v in &values[start..] {
            window.push(v);
        }
        window
    }

    /// Append `value`, dropping the oldest element.
    pub fn push(&mut self, value: f64) {
        if self.capacity == 0 {
            return;
        }
        self.values.pop_front();
        self.values.push_back(value);
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Most recent value
    pub fn last(&self) -> Option<f64> {
        self.values.back().copied()
    }

    /// Oldest first
    pub fn to_vec(&self) -> Vec<f64> {
        self.values.iter().copied().collect()
    }
}
