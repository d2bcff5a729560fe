//! Electronegativity-equilibration (EEQ) atomic partial charges.
//!
//! Given a structure, species parameters and coordination numbers, the charges follow from a
//! single symmetric indefinite linear solve with a Lagrange constraint on the total charge.
//! Isolated molecules use a directly summed Gaussian-damped Coulomb interaction; periodic
//! structures use Ewald summation over Wigner–Seitz minimum images. On request the solver also
//! returns per-atom electrostatic energies, the analytic gradient with the strain derivative, and
//! the derivatives of the charges with respect to positions and strain.
//!
//! All quantities are in atomic units (Bohr, Hartree).

pub mod coulomb;
pub mod elements;
pub mod error;
pub mod math;
pub mod ncoord;
pub mod params;
pub mod solver;
pub mod types;

pub use error::EeqError;
pub use ncoord::{CoordinationNumber, CountingFunction, NCoord};
pub use params::{Parameters, SpeciesData};
pub use solver::{EeqModel, SolverOptions};
pub use types::{
    Atom, AtomView, ChargeResponse, Coordination, EeqOutput, Lattice, Request, Structure,
};
