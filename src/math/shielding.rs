use super::constants::{DISTANCE_THRESHOLD_BOHR, SQRT_2_OVER_PI, SQRT_PI};
use libm::erf;

/// Combined exponent `γ = 1 / (w_i² + w_j²)` of two Gaussian charge distributions.
#[inline]
pub fn pair_exponent(width_i: f64, width_j: f64) -> f64 {
    1.0 / (width_i * width_i + width_j * width_j)
}

/// Coulomb interaction `erf(sqrt(γ r²)) / r` of two unit Gaussian charges at squared distance
/// `r2`.
///
/// Below [`DISTANCE_THRESHOLD_BOHR`] the analytic limit `2 sqrt(γ/π)` is returned.
#[inline]
pub fn gaussian_coulomb(r2: f64, gamma: f64) -> f64 {
    let r = r2.sqrt();
    if r < DISTANCE_THRESHOLD_BOHR {
        2.0 * (gamma / std::f64::consts::PI).sqrt()
    } else {
        erf((r2 * gamma).sqrt()) / r
    }
}

/// Radial derivative of [`gaussian_coulomb`] divided by `r`.
///
/// Multiplying the returned factor by the separation vector `R_i - R_j` gives the gradient of
/// the interaction with respect to `R_i`.
#[inline]
pub fn gaussian_coulomb_derivative(r2: f64, gamma: f64) -> f64 {
    let r = r2.sqrt();
    if r < DISTANCE_THRESHOLD_BOHR {
        return -4.0 * gamma * gamma.sqrt() / (3.0 * SQRT_PI);
    }
    let arg = gamma * r2;
    2.0 * gamma.sqrt() * (-arg).exp() / (SQRT_PI * r2) - erf(arg.sqrt()) / (r2 * r)
}

/// Self-interaction `sqrt(2/π) / w` of a normalized Gaussian charge of width `w`.
#[inline]
pub fn gaussian_self_energy(width: f64) -> f64 {
    SQRT_2_OVER_PI / width
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn kernel_approaches_point_charge_at_long_range() {
        let gamma = pair_exponent(0.8, 1.1);
        let r = 40.0;
        assert_relative_eq!(gaussian_coulomb(r * r, gamma), 1.0 / r, epsilon = 1e-14);
    }

    #[test]
    fn kernel_limit_matches_self_energy() {
        let width = 0.9;
        let gamma = pair_exponent(width, width);
        assert_relative_eq!(
            gaussian_coulomb(0.0, gamma),
            gaussian_self_energy(width),
            epsilon = 1e-14
        );
        let tiny = 1e-7;
        assert_relative_eq!(
            gaussian_coulomb(tiny * tiny, gamma),
            gaussian_coulomb(0.0, gamma),
            epsilon = 1e-10
        );
    }

    #[test]
    fn kernel_is_screened_below_bare_coulomb() {
        let gamma = pair_exponent(1.2, 1.2);
        for r in [0.5, 1.0, 2.0, 3.0] {
            assert!(gaussian_coulomb(r * r, gamma) < 1.0 / r);
        }
    }

    #[test]
    fn derivative_matches_finite_difference() {
        let gamma = pair_exponent(0.7, 1.3);
        let step = 1e-5;
        for r in [0.3, 1.1, 2.5, 6.0] {
            let numerical = (gaussian_coulomb((r + step) * (r + step), gamma)
                - gaussian_coulomb((r - step) * (r - step), gamma))
                / (2.0 * step);
            let analytic = gaussian_coulomb_derivative(r * r, gamma) * r;
            assert_relative_eq!(analytic, numerical, epsilon = 1e-8);
        }
    }

    #[test]
    fn derivative_limit_is_continuous() {
        let gamma = pair_exponent(0.9, 0.9);
        let small = 1e-4;
        assert_relative_eq!(
            gaussian_coulomb_derivative(small * small, gamma),
            gaussian_coulomb_derivative(0.0, gamma),
            epsilon = 1e-6
        );
    }
}
