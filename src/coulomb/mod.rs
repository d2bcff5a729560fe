//! This module builds the augmented EEQ interaction matrix and its derivatives.
//!
//! The matrix has one row and column per atom plus a Lagrange border enforcing the total charge:
//! the last row and column are ones except for a zero corner. The atom block is the
//! Gaussian-damped Coulomb interaction, summed directly for isolated structures
//! ([`isolated`]) and by Ewald summation over Wigner–Seitz minimum images for periodic ones
//! ([`periodic`]).
//!
//! Builders fan out over the outer atom index with rayon. Each worker accumulates into a private
//! buffer and the buffers are merged by a single associative reduction, so no two workers ever
//! write the same cell.

pub mod ewald;
pub mod isolated;
pub mod periodic;
pub mod wignerseitz;

use crate::error::EeqError;
use crate::math::constants::DISTANCE_THRESHOLD_BOHR;
use crate::math::{norm_squared, sub};
use crate::params::SpeciesData;
use crate::types::Structure;
use ewald::{EwaldSum, select_alpha};
use faer::Mat;
use isolated::IsolatedCoulomb;
use periodic::PeriodicCoulomb;
use rayon::prelude::*;
use tracing::debug;
use wignerseitz::WignerSeitzCell;

/// Interaction-matrix derivatives contracted with a charge vector.
///
/// The layouts follow the flattened Cartesian convention of [`crate::types`]:
/// `dadr[(3k + c, m)]` is ∂(A q)_m/∂R_kc for `m ≠ k`, `dadl[(3a + b, m)]` is ∂(A q)_m/∂ε_ab,
/// and `trace[k]` is the diagonal block ∂(A q)_k/∂R_k, which by translational invariance equals
/// the sum of the pair derivatives of atom `k`. The Lagrange column `m = N` is always zero.
#[derive(Debug, Clone)]
pub struct CoulombDerivatives {
    /// Position derivative of the contracted matrix, `3N × (N + 1)`.
    ///
    /// Row `3k + c` holds ∂(A q)_m/∂R_kc for every other atom `m`. The entry `m = k` is not
    /// stored here; see [`CoulombDerivatives::trace`].
    pub dadr: Mat<f64>,
    /// Strain derivative of the contracted matrix, `9 × (N + 1)`, with row `3a + b` for the
    /// strain component ε_ab. Diagonal elements contribute in periodic structures.
    pub dadl: Mat<f64>,
    /// Diagonal blocks ∂(A q)_k/∂R_k, one Cartesian vector per atom.
    ///
    /// The charge response needs them added into `dadr`, while the gradient contraction
    /// does not, so they are kept apart.
    pub trace: Vec<[f64; 3]>,
}

impl CoulombDerivatives {
    pub(crate) fn zeros(natoms: usize) -> Self {
        Self {
            dadr: Mat::zeros(3 * natoms, natoms + 1),
            dadl: Mat::zeros(9, natoms + 1),
            trace: vec![[0.0; 3]; natoms],
        }
    }

    /// Contracts the derivative of the pair element `A_ij` with the charges and scatters it.
    ///
    /// `dg` is ∂A_ij/∂R_i (so ∂A_ij/∂R_j = −dg) and `ds` is ∂A_ij/∂ε.
    pub(crate) fn add_pair(
        &mut self,
        i: usize,
        j: usize,
        dg: [f64; 3],
        ds: &[[f64; 3]; 3],
        q: &[f64],
    ) {
        for c in 0..3 {
            self.trace[i][c] += dg[c] * q[j];
            self.trace[j][c] -= dg[c] * q[i];
            self.dadr[(3 * i + c, j)] += dg[c] * q[i];
            self.dadr[(3 * j + c, i)] -= dg[c] * q[j];
        }
        for a in 0..3 {
            for b in 0..3 {
                self.dadl[(3 * a + b, j)] += ds[a][b] * q[i];
                self.dadl[(3 * a + b, i)] += ds[a][b] * q[j];
            }
        }
    }

    /// Adds the strain derivative of a diagonal element `A_ii`, contracted with `q_i`.
    pub(crate) fn add_self_strain(&mut self, i: usize, ds: &[[f64; 3]; 3], qi: f64) {
        for a in 0..3 {
            for b in 0..3 {
                self.dadl[(3 * a + b, i)] += ds[a][b] * qi;
            }
        }
    }

    pub(crate) fn merge(mut self, other: Self) -> Self {
        add_into(&mut self.dadr, &other.dadr);
        add_into(&mut self.dadl, &other.dadl);
        for (mine, theirs) in self.trace.iter_mut().zip(&other.trace) {
            for c in 0..3 {
                mine[c] += theirs[c];
            }
        }
        self
    }
}

/// The geometry-specific interaction builder of one structure.
pub enum Coulomb {
    /// Direct pair sum for structures without periodic directions.
    Isolated(IsolatedCoulomb),
    /// Ewald sum over minimum images for structures with at least one periodic direction.
    Periodic(PeriodicCoulomb),
}

impl Coulomb {
    /// Selects the builder for `structure`. For periodic structures this constructs the
    /// Wigner–Seitz cell and picks the Ewald splitting parameter, unless `alpha` overrides it.
    ///
    /// # Errors
    ///
    /// Returns `EeqError::MissingLattice` for a periodic structure without lattice vectors.
    pub fn new(structure: &Structure, alpha: Option<f64>) -> Result<Self, EeqError> {
        if !structure.is_periodic() {
            return Ok(Coulomb::Isolated(IsolatedCoulomb));
        }

        let lattice = structure.lattice.as_ref().ok_or(EeqError::MissingLattice)?;
        let wsc = WignerSeitzCell::new(structure)?;
        let alpha = alpha.unwrap_or_else(|| select_alpha(lattice, structure.periodic));
        debug!(alpha, "periodic interaction matrix");
        let ewald = EwaldSum::new(lattice, structure.periodic, alpha);

        Ok(Coulomb::Periodic(PeriodicCoulomb::new(wsc, ewald)))
    }

    /// Builds the symmetric augmented matrix of size `N + 1`.
    ///
    /// # Errors
    ///
    /// Returns `EeqError::Factorization` if two distinct atoms occupy the same point, directly or
    /// through a lattice translation. Such a system has no unique charges, and the damped kernel
    /// would otherwise hide the degeneracy behind its finite short-range limit.
    pub fn matrix(
        &self,
        positions: &[[f64; 3]],
        species: &[SpeciesData],
    ) -> Result<Mat<f64>, EeqError> {
        let translations = match self {
            Coulomb::Isolated(_) => &[[0.0; 3]][..],
            Coulomb::Periodic(builder) => builder.cell().translations(),
        };
        if let Some((i, j)) = coincident_pair(positions, translations) {
            return Err(EeqError::Factorization(format!(
                "atoms {} and {} are coincident",
                i + 1,
                j + 1
            )));
        }

        let mut matrix = match self {
            Coulomb::Isolated(builder) => builder.matrix(positions, species),
            Coulomb::Periodic(builder) => builder.matrix(positions, species),
        };
        apply_neutrality_border(&mut matrix, positions.len());
        Ok(matrix)
    }

    /// Builds the matrix derivatives contracted with the charges `q` (length `N` or `N + 1`;
    /// only the first `N` entries are read).
    pub fn derivatives(
        &self,
        positions: &[[f64; 3]],
        species: &[SpeciesData],
        q: &[f64],
    ) -> CoulombDerivatives {
        match self {
            Coulomb::Isolated(builder) => builder.derivatives(positions, species, q),
            Coulomb::Periodic(builder) => builder.derivatives(positions, species, q),
        }
    }
}

/// First pair `(j, i)` with `j < i` whose separation, under any of `translations`, is below
/// [`DISTANCE_THRESHOLD_BOHR`].
fn coincident_pair(positions: &[[f64; 3]], translations: &[[f64; 3]]) -> Option<(usize, usize)> {
    let threshold2 = DISTANCE_THRESHOLD_BOHR * DISTANCE_THRESHOLD_BOHR;
    (0..positions.len()).into_par_iter().find_map_first(|i| {
        (0..i)
            .find(|&j| {
                let rij = sub(positions[i], positions[j]);
                translations
                    .iter()
                    .any(|&t| norm_squared(sub(rij, t)) < threshold2)
            })
            .map(|j| (j, i))
    })
}

/// Writes the Lagrange border: ones in the last row and column, zero in the corner.
pub(crate) fn apply_neutrality_border(matrix: &mut Mat<f64>, natoms: usize) {
    matrix.col_mut(natoms).subrows_mut(0, natoms).fill(1.0);
    matrix.row_mut(natoms).subcols_mut(0, natoms).fill(1.0);
    matrix[(natoms, natoms)] = 0.0;
}

pub(crate) fn merge_matrices(mut a: Mat<f64>, b: Mat<f64>) -> Mat<f64> {
    add_into(&mut a, &b);
    a
}

pub(crate) fn add_into(target: &mut Mat<f64>, source: &Mat<f64>) {
    for j in 0..target.ncols() {
        for i in 0..target.nrows() {
            target[(i, j)] += source[(i, j)];
        }
    }
}
