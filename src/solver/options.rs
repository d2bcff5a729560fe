//! This module defines configuration options for the EEQ model.
//!
//! It provides the `SolverOptions` struct, which selects how coordination numbers are counted
//! and lets callers override the Ewald splitting parameter for periodic structures.

use crate::ncoord::{CountingFunction, DEFAULT_CUTOFF};

/// Configuration parameters of an [`EeqModel`](super::EeqModel).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolverOptions {
    /// The neighbor counting function, including its steepness.
    pub counting: CountingFunction,
    /// Real-space cutoff of the coordination number in Bohr.
    pub cutoff: f64,
    /// Optional smooth upper bound on coordination numbers.
    pub cn_max: Option<f64>,
    /// Ewald splitting parameter. When `None` it is chosen per structure by balancing the
    /// direct- and reciprocal-space sums.
    pub ewald_alpha: Option<f64>,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            counting: CountingFunction::default(),
            cutoff: DEFAULT_CUTOFF,
            cn_max: None,
            ewald_alpha: None,
        }
    }
}
