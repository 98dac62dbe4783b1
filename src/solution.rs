use crate::grid::Grid;
use serde::Serialize;
use std::ops::{Deref, DerefMut};

/// Final voltage magnitude outside the band around nominal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VoltageViolation {
    pub node: usize,
    /// Distance past the nearest band edge: positive above the band,
    /// negative below it.
    pub deviation: f64,
}

/// Solved network model together with the outcome of the solve.
#[derive(Clone)]
pub struct Solution {
    grid: Grid,
    pub(crate) converged: bool,
    pub(crate) iterations: usize,
    pub(crate) summary: String,
    pub(crate) violations: Vec<VoltageViolation>,
}

impl Solution {
    pub(crate) fn new(grid: Grid) -> Self {
        Self {
            grid,
            converged: false,
            iterations: 0,
            summary: String::new(),
            violations: Vec::new(),
        }
    }

    /// Converged with every voltage inside its band.
    pub fn success(&self) -> bool {
        self.converged && self.violations.is_empty()
    }

    pub fn converged(&self) -> bool {
        self.converged
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    pub fn summary(&self) -> &str {
        &self.summary
    }

    pub fn violations(&self) -> &[VoltageViolation] {
        &self.violations
    }

    pub fn into_grid(self) -> Grid {
        self.grid
    }
}

impl Deref for Solution {
    type Target = Grid;

    fn deref(&self) -> &Self::Target {
        &self.grid
    }
}

impl DerefMut for Solution {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.grid
    }
}
