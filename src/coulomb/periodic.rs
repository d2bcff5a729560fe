//! Interaction matrix of a periodic structure by Ewald summation.
//!
//! Each pair interacts through every Wigner–Seitz minimum image of the partner atom, each image
//! weighted by the inverse of the image count. For an image the interaction is the direct-space
//! sum over the local replicas plus the reciprocal-space sum. An atom also interacts with its own
//! minimum self-images, and its diagonal carries the hardness, the Gaussian self-energy and the
//! Ewald self-correction.

use super::ewald::{EwaldSum, KernelDerivative};
use super::wignerseitz::WignerSeitzCell;
use super::{CoulombDerivatives, merge_matrices};
use crate::math::shielding::gaussian_self_energy;
use crate::math::sub;
use crate::params::SpeciesData;
use faer::Mat;
use rayon::prelude::*;

/// Ewald interaction builder bound to one periodic structure.
///
/// It owns the minimum-image table and the Ewald translation sets, so it must be rebuilt when
/// the lattice or the atom order changes. Positions may move as long as the minimum images stay
/// the same.
#[derive(Debug, Clone)]
pub struct PeriodicCoulomb {
    wsc: WignerSeitzCell,
    ewald: EwaldSum,
}

impl PeriodicCoulomb {
    /// Binds the minimum-image table and the Ewald sum of one structure.
    ///
    /// Both must have been built for the same lattice, periodicity and atom order; the builder
    /// indexes the cell by atom position in the slices later passed to
    /// [`PeriodicCoulomb::matrix`] and [`PeriodicCoulomb::derivatives`].
    pub fn new(wsc: WignerSeitzCell, ewald: EwaldSum) -> Self {
        Self { wsc, ewald }
    }

    /// Minimum-image table of the structure, including its lattice translations.
    pub fn cell(&self) -> &WignerSeitzCell {
        &self.wsc
    }

    /// Image-averaged Ewald interaction of atom `i` with atom `j` (which may equal `i`).
    fn pair_interaction(&self, rij: [f64; 3], i: usize, j: usize, damping: f64) -> f64 {
        let count = self.wsc.image_count(i, j);
        if count == 0 {
            return 0.0;
        }
        let weight = 1.0 / count as f64;
        self.wsc
            .images(i, j)
            .map(|t| {
                let vec = sub(rij, t);
                self.ewald.direct(vec, damping) + self.ewald.reciprocal(vec)
            })
            .sum::<f64>()
            * weight
    }

    /// Image-averaged derivative of [`PeriodicCoulomb::pair_interaction`].
    fn pair_derivative(&self, rij: [f64; 3], i: usize, j: usize, damping: f64) -> KernelDerivative {
        let mut out = KernelDerivative::default();
        let count = self.wsc.image_count(i, j);
        if count == 0 {
            return out;
        }
        let weight = 1.0 / count as f64;
        for t in self.wsc.images(i, j) {
            let vec = sub(rij, t);
            out.add_scaled(&self.ewald.direct_derivative(vec, damping), weight);
            out.add_scaled(&self.ewald.reciprocal_derivative(vec), weight);
        }
        out
    }

    /// Atom block of the augmented matrix; the Lagrange border is left to the caller.
    pub fn matrix(&self, positions: &[[f64; 3]], species: &[SpeciesData]) -> Mat<f64> {
        let natoms = positions.len();
        let size = natoms + 1;
        let correction = self.ewald.self_correction();

        (0..natoms)
            .into_par_iter()
            .fold(
                || Mat::zeros(size, size),
                |mut local: Mat<f64>, i| {
                    let wi = species[i].width;
                    for j in 0..i {
                        let wj = species[j].width;
                        let damping = 1.0 / (wi * wi + wj * wj).sqrt();
                        let rij = sub(positions[i], positions[j]);
                        let value = self.pair_interaction(rij, i, j, damping);
                        local[(i, j)] += value;
                        local[(j, i)] += value;
                    }

                    let damping = 1.0 / (2.0 * wi * wi).sqrt();
                    local[(i, i)] += self.pair_interaction([0.0; 3], i, i, damping)
                        + species[i].hardness
                        + gaussian_self_energy(wi)
                        + correction;
                    local
                },
            )
            .reduce(|| Mat::zeros(size, size), merge_matrices)
    }

    /// Position and strain derivatives of the matrix, contracted with `q`.
    pub fn derivatives(
        &self,
        positions: &[[f64; 3]],
        species: &[SpeciesData],
        q: &[f64],
    ) -> CoulombDerivatives {
        let natoms = positions.len();

        (0..natoms)
            .into_par_iter()
            .fold(
                || CoulombDerivatives::zeros(natoms),
                |mut local, i| {
                    let wi = species[i].width;
                    for j in 0..i {
                        let wj = species[j].width;
                        let damping = 1.0 / (wi * wi + wj * wj).sqrt();
                        let rij = sub(positions[i], positions[j]);
                        let d = self.pair_derivative(rij, i, j, damping);
                        local.add_pair(i, j, d.gradient, &d.strain, q);
                    }

                    let damping = 1.0 / (2.0 * wi * wi).sqrt();
                    let d = self.pair_derivative([0.0; 3], i, i, damping);
                    local.add_self_strain(i, &d.strain, q[i]);
                    local
                },
            )
            .reduce(|| CoulombDerivatives::zeros(natoms), CoulombDerivatives::merge)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coulomb::ewald::select_alpha;
    use crate::types::{Lattice, Structure};
    use approx::assert_relative_eq;

    fn species(width: f64) -> SpeciesData {
        SpeciesData {
            width,
            electronegativity: 0.3,
            hardness: 0.4,
            cn_scale: 0.0,
            covalent_radius: 1.0,
        }
    }

    fn lattice() -> Lattice {
        [[7.5, 0.0, 0.0], [0.4, 7.1, 0.0], [-0.3, 0.5, 8.0]]
    }

    fn builder(positions: &[[f64; 3]]) -> PeriodicCoulomb {
        let structure = Structure::periodic(vec![1; positions.len()], positions.to_vec(), lattice(), 0.0);
        let wsc = WignerSeitzCell::new(&structure).unwrap();
        let alpha = select_alpha(&lattice(), [true; 3]);
        PeriodicCoulomb::new(wsc, EwaldSum::new(&lattice(), [true; 3], alpha))
    }

    fn positions() -> Vec<[f64; 3]> {
        vec![[0.2, 0.1, 0.3], [2.1, 1.3, 0.9], [4.4, 3.9, 5.2]]
    }

    #[test]
    fn matrix_is_symmetric() {
        let pos = positions();
        let widths = vec![species(0.8), species(1.1), species(0.9)];
        let m = builder(&pos).matrix(&pos, &widths);
        for i in 0..3 {
            for j in 0..3 {
                assert_relative_eq!(m[(i, j)], m[(j, i)], epsilon = 1e-14);
            }
        }
    }

    #[test]
    fn lattice_translation_of_an_atom_leaves_matrix_unchanged() {
        let pos = positions();
        let widths = vec![species(0.8), species(1.1), species(0.9)];
        let reference = builder(&pos).matrix(&pos, &widths);

        let mut shifted = pos.clone();
        for c in 0..3 {
            shifted[1][c] += lattice()[0][c];
        }
        let moved = builder(&shifted).matrix(&shifted, &widths);
        for i in 0..3 {
            for j in 0..3 {
                assert_relative_eq!(reference[(i, j)], moved[(i, j)], epsilon = 1e-10);
            }
        }
    }

    #[test]
    fn position_derivative_matches_finite_difference_of_contraction() {
        let pos = positions();
        let widths = vec![species(0.8), species(1.1), species(0.9)];
        let q = [0.35, -0.5, 0.15];
        let d = builder(&pos).derivatives(&pos, &widths, &q);
        let step = 1e-6;

        let contracted = |p: &[[f64; 3]]| {
            let m = builder(p).matrix(p, &widths);
            (0..3)
                .map(|i| (0..3).map(|j| m[(i, j)] * q[j]).sum::<f64>())
                .collect::<Vec<_>>()
        };

        for k in 0..3 {
            for c in 0..3 {
                let mut plus = pos.clone();
                let mut minus = pos.clone();
                plus[k][c] += step;
                minus[k][c] -= step;
                let (aq_plus, aq_minus) = (contracted(&plus), contracted(&minus));
                for m in 0..3 {
                    let numerical = (aq_plus[m] - aq_minus[m]) / (2.0 * step);
                    let analytic = if m == k {
                        d.trace[k][c]
                    } else {
                        d.dadr[(3 * k + c, m)]
                    };
                    assert_relative_eq!(analytic, numerical, epsilon = 1e-7);
                }
            }
        }
    }
}
