//! Right-hand side of the augmented EEQ system.

use crate::math::constants::CN_REGULARIZATION;
use crate::params::SpeciesData;
use faer::Col;

/// Electronegativity vector and, optionally, its derivative with respect to the coordination
/// numbers. Both have length `N + 1`; the last entry of `x` is the target total charge and the
/// last entry of `dxdcn` is zero.
#[derive(Debug, Clone)]
pub struct Rhs {
    pub x: Col<f64>,
    pub dxdcn: Option<Col<f64>>,
}

/// Builds `x_i = −χ_i + κ_i CN_i / sqrt(CN_i + reg)` and `x_(N+1) = charge`.
///
/// With `derivative` set, also returns `dx_i/dCN_i = 0.5 κ_i / sqrt(CN_i + reg)`.
pub fn build_rhs(species: &[SpeciesData], cn: &[f64], charge: f64, derivative: bool) -> Rhs {
    let natoms = species.len();

    let x = Col::from_fn(natoms + 1, |i| {
        if i == natoms {
            return charge;
        }
        let data = &species[i];
        let tmp = data.cn_scale / (cn[i] + CN_REGULARIZATION).sqrt();
        -data.electronegativity + tmp * cn[i]
    });

    let dxdcn = derivative.then(|| {
        Col::from_fn(natoms + 1, |i| {
            if i == natoms {
                return 0.0;
            }
            0.5 * species[i].cn_scale / (cn[i] + CN_REGULARIZATION).sqrt()
        })
    });

    Rhs { x, dxdcn }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn species(chi: f64, kcn: f64) -> SpeciesData {
        SpeciesData {
            width: 1.0,
            electronegativity: chi,
            hardness: 0.5,
            cn_scale: kcn,
            covalent_radius: 1.0,
        }
    }

    #[test]
    fn values_follow_the_square_root_law() {
        let rhs = build_rhs(&[species(0.4, 0.1), species(0.2, 0.05)], &[4.0, 0.0], -1.0, false);
        assert_eq!(rhs.x.nrows(), 3);
        assert_relative_eq!(rhs.x[0], -0.4 + 0.1 * 2.0, epsilon = 1e-12);
        assert_relative_eq!(rhs.x[1], -0.2, epsilon = 1e-12);
        assert_eq!(rhs.x[2], -1.0);
        assert!(rhs.dxdcn.is_none());
    }

    #[test]
    fn derivative_has_zero_lagrange_entry() {
        let rhs = build_rhs(&[species(0.4, 0.1), species(0.2, 0.05)], &[4.0, 1.0], 0.0, true);
        let dxdcn = rhs.dxdcn.unwrap();
        assert_relative_eq!(dxdcn[0], 0.5 * 0.1 / 2.0, epsilon = 1e-12);
        assert_relative_eq!(dxdcn[1], 0.5 * 0.05, epsilon = 1e-12);
        assert_eq!(dxdcn[2], 0.0);
    }

    #[test]
    fn derivative_matches_finite_difference() {
        let data = [species(0.3, 0.07)];
        let cn = 2.3;
        let step = 1e-6;
        let analytic = build_rhs(&data, &[cn], 0.0, true).dxdcn.unwrap()[0];
        let plus = build_rhs(&data, &[cn + step], 0.0, false).x[0];
        let minus = build_rhs(&data, &[cn - step], 0.0, false).x[0];
        assert_relative_eq!(analytic, (plus - minus) / (2.0 * step), epsilon = 1e-8);
    }
}
