//! Interaction matrix of an isolated (non-periodic) structure.

use super::{CoulombDerivatives, merge_matrices};
use crate::math::shielding::{
    gaussian_coulomb, gaussian_coulomb_derivative, gaussian_self_energy, pair_exponent,
};
use crate::math::{norm_squared, sub};
use crate::params::SpeciesData;
use faer::Mat;
use rayon::prelude::*;

/// Direct pairwise Gaussian-damped Coulomb interaction.
///
/// Every atom carries a Gaussian charge whose width comes from its species, so the interaction
/// stays finite at short range and tends to the bare Coulomb law at long range. The builder holds
/// no state; positions and species are passed to each call.
#[derive(Debug, Clone, Copy, Default)]
pub struct IsolatedCoulomb;

impl IsolatedCoulomb {
    /// Atom block of the augmented matrix; the Lagrange border is left to the caller.
    ///
    /// Off-diagonal: `erf(sqrt(γ r²)) / r` with `γ = 1/(w_i² + w_j²)`.
    /// Diagonal: `η_i + sqrt(2/π) / w_i`.
    pub fn matrix(&self, positions: &[[f64; 3]], species: &[SpeciesData]) -> Mat<f64> {
        let natoms = positions.len();
        let size = natoms + 1;

        let mut matrix = (0..natoms)
            .into_par_iter()
            .fold(
                || Mat::zeros(size, size),
                |mut local: Mat<f64>, i| {
                    for j in 0..i {
                        let r2 = norm_squared(sub(positions[i], positions[j]));
                        let gamma = pair_exponent(species[i].width, species[j].width);
                        let value = gaussian_coulomb(r2, gamma);
                        local[(i, j)] += value;
                        local[(j, i)] += value;
                    }
                    local
                },
            )
            .reduce(|| Mat::zeros(size, size), merge_matrices);

        for (i, data) in species.iter().enumerate() {
            matrix[(i, i)] += data.hardness + gaussian_self_energy(data.width);
        }

        matrix
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
                    for j in 0..i {
                        let vec = sub(positions[i], positions[j]);
                        let r2 = norm_squared(vec);
                        let gamma = pair_exponent(species[i].width, species[j].width);
                        let dtmp = gaussian_coulomb_derivative(r2, gamma);

                        let dg = vec.map(|x| dtmp * x);
                        let mut ds = [[0.0; 3]; 3];
                        for a in 0..3 {
                            for b in 0..3 {
                                ds[a][b] = dg[a] * vec[b];
                            }
                        }
                        local.add_pair(i, j, dg, &ds, q);
                    }
                    local
                },
            )
            .reduce(|| CoulombDerivatives::zeros(natoms), CoulombDerivatives::merge)
    }
}
