//! Dense linear algebra on the augmented EEQ matrix.
//!
//! The augmented matrix is symmetric but indefinite (the Lagrange border has a zero corner), so
//! it is factorized with a Bunch–Kaufman `L B Lᵀ` decomposition reading the lower triangle. The
//! factorization itself never reports failure, so singular pivot blocks are detected here by
//! inspecting the block-diagonal factor, mirroring the status code of a LAPACK `sytrf` call.

use crate::error::EeqError;
use faer::linalg::solvers::{DenseSolveCore, Lblt, Solve};
use faer::{Col, Mat, Side};
use std::panic::{self, AssertUnwindSafe};
use tracing::trace;

/// A symmetric indefinite factorization of the augmented matrix.
pub struct SymmetricFactorization {
    lblt: Lblt<f64>,
}

impl SymmetricFactorization {
    /// Factorizes `matrix` using its lower triangle.
    ///
    /// # Errors
    ///
    /// Returns `EeqError::Factorization` if a 1×1 pivot or the determinant of a 2×2 pivot block
    /// is zero or not finite, relative to the magnitude of the matrix entries.
    pub fn new(matrix: &Mat<f64>) -> Result<Self, EeqError> {
        let lblt = panic::catch_unwind(AssertUnwindSafe(|| matrix.lblt(Side::Lower)))
            .map_err(|_| {
                EeqError::Factorization("symmetric indefinite decomposition panicked".to_string())
            })?;

        let scale = max_abs(matrix);
        check_pivot_blocks(&lblt, scale)?;

        Ok(Self { lblt })
    }

    /// Solves `A y = rhs` by substitution against the factors.
    ///
    /// # Errors
    ///
    /// Returns `EeqError::Solve` if the solution contains non-finite entries.
    pub fn solve(&self, rhs: &Col<f64>) -> Result<Col<f64>, EeqError> {
        let solution = self.lblt.solve(rhs);
        if let Some(row) = first_non_finite(solution.as_ref().iter().copied()) {
            return Err(EeqError::Solve(format!(
                "non-finite solution component at row {}",
                row + 1
            )));
        }
        Ok(solution)
    }

    /// Forms the inverse of the factorized matrix.
    ///
    /// Only the lower triangle of the returned matrix is guaranteed by the inversion kernel; the
    /// strictly upper triangle is overwritten with its mirror image so the result is exactly
    /// symmetric.
    ///
    /// # Errors
    ///
    /// Returns `EeqError::Inversion` if the inverse contains non-finite entries.
    pub fn inverse(&self) -> Result<Mat<f64>, EeqError> {
        let mut inverse = self.lblt.inverse();
        let n = inverse.nrows();

        for j in 0..n {
            for i in j..n {
                if !inverse[(i, j)].is_finite() {
                    return Err(EeqError::Inversion(format!(
                        "non-finite inverse entry at ({}, {})",
                        i + 1,
                        j + 1
                    )));
                }
            }
        }
        mirror_lower_to_upper(&mut inverse);

        Ok(inverse)
    }
}

/// Copies the strictly lower triangle into the strictly upper triangle.
pub fn mirror_lower_to_upper(matrix: &mut Mat<f64>) {
    let n = matrix.nrows();
    for j in 0..n {
        for i in (j + 1)..n {
            matrix[(j, i)] = matrix[(i, j)];
        }
    }
}

fn check_pivot_blocks(lblt: &Lblt<f64>, scale: f64) -> Result<(), EeqError> {
    let diag = lblt.B_diag().column_vector();
    let subdiag = lblt.B_subdiag().column_vector();
    let n = diag.nrows();
    let tol = f64::EPSILON * (n as f64) * scale.max(f64::MIN_POSITIVE);

    let mut i = 0;
    while i < n {
        if i + 1 < n && subdiag[i] != 0.0 {
            let (d1, d2, s) = (diag[i], diag[i + 1], subdiag[i]);
            let det = d1 * d2 - s * s;
            let magnitude = d1.abs().max(d2.abs()).max(s.abs());
            if !det.is_finite() || det.abs() <= tol * magnitude {
                return Err(EeqError::Factorization(format!(
                    "singular 2x2 pivot block at rows {} and {}",
                    i + 1,
                    i + 2
                )));
            }
            trace!(row = i, det, "2x2 pivot block");
            i += 2;
        } else {
            let d = diag[i];
            if !d.is_finite() || d.abs() <= tol {
                return Err(EeqError::Factorization(format!(
                    "singular 1x1 pivot at row {}",
                    i + 1
                )));
            }
            i += 1;
        }
    }

    Ok(())
}

fn max_abs(matrix: &Mat<f64>) -> f64 {
    let mut max = 0.0f64;
    for j in 0..matrix.ncols() {
        for i in 0..matrix.nrows() {
            max = max.max(matrix[(i, j)].abs());
        }
    }
    max
}

fn first_non_finite(values: impl Iterator<Item = f64>) -> Option<usize> {
    values.enumerate().find(|(_, v)| !v.is_finite()).map(|(i, _)| i)
}
