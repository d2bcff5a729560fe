//! This module provides mathematical utilities and constants for the eeq library.
//!
//! Besides the constants it contains the Gaussian-damped Coulomb kernel used by the isolated
//! interaction matrix, lattice helpers for periodic structures, and thin wrappers around the
//! dense linear algebra of `faer` that translate numerical failures into [`crate::EeqError`].

/// Physical and numerical constants.
pub mod constants;

/// Lattice volume, reciprocal lattice and lattice-point enumeration.
pub mod lattice;

/// Symmetric indefinite factorization, solve and inversion of the augmented matrix.
pub mod linalg;

/// Gaussian-damped Coulomb interaction between two spherical charge distributions.
pub mod shielding;

#[inline(always)]
pub(crate) fn sub(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

#[inline(always)]
pub(crate) fn add(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [a[0] + b[0], a[1] + b[1], a[2] + b[2]]
}

#[inline(always)]
pub(crate) fn dot(a: [f64; 3], b: [f64; 3]) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

#[inline(always)]
pub(crate) fn norm_squared(a: [f64; 3]) -> f64 {
    dot(a, a)
}

#[inline(always)]
pub(crate) fn cross(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}
