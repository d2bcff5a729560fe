//! This module defines the physical and numerical constants used throughout the eeq library.
//!
//! The library works in atomic units (Bohr, Hartree). Conversions are only needed at the
//! command-line boundary, where structures are read in angstroms.

/// Conversion factor from Bohr radii to angstroms.
pub const BOHR_TO_ANGSTROM: f64 = 0.529_177_210_903;

/// Conversion factor from Hartree energy units to electron volts.
pub const HARTREE_TO_EV: f64 = 27.211_386_245_988;

/// √π.
pub const SQRT_PI: f64 = 1.772_453_850_905_516;

/// √(2/π), the self-energy prefactor of a normalized Gaussian charge of unit width.
pub const SQRT_2_OVER_PI: f64 = 0.797_884_560_802_865_4;

/// Below this distance in Bohr two distinct atoms are coincident and the interaction matrix is
/// rejected. The damped Coulomb kernel switches to its analytic short-range limit below the same
/// distance, which is only reached by an atom with itself.
pub const DISTANCE_THRESHOLD_BOHR: f64 = 1e-12;

/// Periodic image vectors shorter than this (√ε) are skipped in lattice sums.
pub const IMAGE_THRESHOLD: f64 = 1.490_116_119_384_765_6e-8;

/// Regularizer in the coordination-number dependent electronegativity term, keeping
/// `CN / sqrt(CN + reg)` finite at vanishing coordination.
pub const CN_REGULARIZATION: f64 = 1e-14;

/// Number of cells enumerated on each side of the origin for the direct- and reciprocal-space
/// Ewald sums and for the minimum-image search.
pub const EWALD_DEPTH: usize = 2;

/// Two periodic images whose squared distances differ by less than this are treated as equally
/// minimal and share the interaction.
pub const IMAGE_TIE_TOLERANCE: f64 = 1e-6;
