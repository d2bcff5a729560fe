//! This module contains the solver components of the EEQ charge model.
//!
//! It includes the right-hand-side builder, the `EeqModel` orchestrating a calculation and the
//! `SolverOptions` configuring it.

mod implementation;
mod options;
pub mod rhs;

pub use implementation::EeqModel;
pub use options::SolverOptions;
