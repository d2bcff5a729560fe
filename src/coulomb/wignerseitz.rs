//! Wigner–Seitz minimum-image bookkeeping for periodic structures.
//!
//! For every ordered atom pair the cell records which lattice translations bring the second
//! atom closest to the first. Several translations may tie at symmetry points of the cell
//! boundary; all of them are kept and interactions are averaged over them instead of picking
//! one arbitrarily.

use crate::error::EeqError;
use crate::math::constants::{EWALD_DEPTH, IMAGE_THRESHOLD, IMAGE_TIE_TOLERANCE};
use crate::math::lattice::lattice_points;
use crate::math::{norm_squared, sub};
use crate::types::Structure;
use rayon::prelude::*;
use tracing::debug;

/// Minimum-image translations of every ordered atom pair.
#[derive(Debug, Clone)]
pub struct WignerSeitzCell {
    natoms: usize,
    translations: Vec<[f64; 3]>,
    images: Vec<Vec<usize>>,
}

impl WignerSeitzCell {
    /// Builds the cell for a periodic structure.
    ///
    /// # Errors
    ///
    /// Returns `EeqError::MissingLattice` if the structure carries no lattice.
    pub fn new(structure: &Structure) -> Result<Self, EeqError> {
        let lattice = structure.lattice.as_ref().ok_or(EeqError::MissingLattice)?;
        let translations = lattice_points(lattice, structure.periodic, EWALD_DEPTH, true);
        let positions = &structure.positions;
        let natoms = positions.len();

        let images: Vec<Vec<usize>> = (0..natoms)
            .into_par_iter()
            .flat_map_iter(|i| {
                let translations = &translations;
                (0..natoms).map(move |j| {
                    minimum_images(sub(positions[i], positions[j]), translations)
                })
            })
            .collect();

        let max_images = images.iter().map(Vec::len).max().unwrap_or(0);
        debug!(
            natoms,
            translations = translations.len(),
            max_images,
            "built Wigner-Seitz cell"
        );

        Ok(Self {
            natoms,
            translations,
            images,
        })
    }

    /// The shared translation table, origin included.
    ///
    /// It spans the fixed enumeration depth along every periodic direction and is also used to
    /// detect atoms that coincide through a lattice translation.
    pub fn translations(&self) -> &[[f64; 3]] {
        &self.translations
    }

    /// Indices into [`WignerSeitzCell::translations`] of the minimum images of `j` seen from `i`.
    pub fn image_indices(&self, i: usize, j: usize) -> &[usize] {
        &self.images[i * self.natoms + j]
    }

    /// Number of equally minimal images of `j` seen from `i`.
    pub fn image_count(&self, i: usize, j: usize) -> usize {
        self.image_indices(i, j).len()
    }

    /// Minimum-image translations `T` such that `R_i − R_j − T` is shortest.
    pub fn images(&self, i: usize, j: usize) -> impl Iterator<Item = [f64; 3]> + '_ {
        self.image_indices(i, j)
            .iter()
            .map(move |&index| self.translations[index])
    }
}

/// Translations minimizing `|rij − T|`, excluding those that make the two atoms coincide.
fn minimum_images(rij: [f64; 3], translations: &[[f64; 3]]) -> Vec<usize> {
    let distances: Vec<Option<f64>> = translations
        .iter()
        .map(|&t| {
            let r2 = norm_squared(sub(rij, t));
            (r2 >= IMAGE_THRESHOLD).then_some(r2)
        })
        .collect();

    let Some(min) = distances.iter().flatten().copied().reduce(f64::min) else {
        return Vec::new();
    };

    distances
        .iter()
        .enumerate()
        .filter_map(|(index, r2)| match r2 {
            Some(r2) if r2 - min < IMAGE_TIE_TOLERANCE => Some(index),
            _ => None,
        })
        .collect()
}
