//! Ewald summation of the Gaussian-damped Coulomb interaction in periodic structures.
//!
//! The interaction is split into a short-ranged direct-space sum over nearby replicas and a
//! Gaussian-damped reciprocal-space sum. Both run over fixed translation sets reaching
//! [`EWALD_DEPTH`] cells in every periodic direction; this is adequate as long as the splitting
//! parameter lets both series decay within that depth, which [`select_alpha`] aims for. The
//! depth is not validated against the chosen splitting parameter.

use crate::math::constants::{EWALD_DEPTH, IMAGE_THRESHOLD, SQRT_PI};
use crate::math::lattice::{lattice_points, reciprocal, volume};
use crate::math::{add, dot, norm_squared};
use crate::types::Lattice;
use libm::{erf, erfc};
use std::f64::consts::PI;
use tracing::debug;

/// Translation sets and constants of one Ewald evaluation, fixed per structure.
#[derive(Debug, Clone)]
pub struct EwaldSum {
    alpha: f64,
    volume: f64,
    direct: Vec<[f64; 3]>,
    reciprocal: Vec<[f64; 3]>,
}

/// Gradient and strain derivative of one Ewald kernel evaluation.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct KernelDerivative {
    /// Derivative with respect to the separation vector.
    pub gradient: [f64; 3],
    /// Derivative with respect to strain of the cell and separation.
    pub strain: [[f64; 3]; 3],
}

impl KernelDerivative {
    fn accumulate(&mut self, factor: f64, vec: [f64; 3]) {
        for a in 0..3 {
            self.gradient[a] += factor * vec[a];
            for b in 0..3 {
                self.strain[a][b] += factor * vec[a] * vec[b];
            }
        }
    }

    /// Adds `weight * other` to `self`.
    pub fn add_scaled(&mut self, other: &KernelDerivative, weight: f64) {
        for a in 0..3 {
            self.gradient[a] += weight * other.gradient[a];
            for b in 0..3 {
                self.strain[a][b] += weight * other.strain[a][b];
            }
        }
    }
}

impl EwaldSum {
    /// Precomputes the direct and reciprocal translation sets for `lattice`.
    pub fn new(lattice: &Lattice, periodic: [bool; 3], alpha: f64) -> Self {
        let direct = lattice_points(lattice, periodic, EWALD_DEPTH, true);
        let reciprocal = lattice_points(&reciprocal(lattice), periodic, EWALD_DEPTH, false);
        Self {
            alpha,
            volume: volume(lattice),
            direct,
            reciprocal,
        }
    }

    /// The splitting parameter α.
    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// Constant `−2α/√π` removing the self-interaction of the compensating Gaussian.
    pub fn self_correction(&self) -> f64 {
        -2.0 * self.alpha / SQRT_PI
    }

    /// Direct-space sum `Σ_T erf(γ|r+T|)/|r+T| − erf(α|r+T|)/|r+T|`, skipping vanishing
    /// distances. `damping` is γ, the inverse combined width of the two charges.
    pub fn direct(&self, rij: [f64; 3], damping: f64) -> f64 {
        let mut sum = 0.0;
        for &t in &self.direct {
            let r = norm_squared(add(rij, t)).sqrt();
            if r < IMAGE_THRESHOLD {
                continue;
            }
            sum += (erf(damping * r) - erf(self.alpha * r)) / r;
        }
        sum
    }

    /// Reciprocal-space sum `(4π/V) Σ_{G≠0} cos(G·r) exp(−G²/4α²) / G²`.
    pub fn reciprocal(&self, rij: [f64; 3]) -> f64 {
        let fac = 4.0 * PI / self.volume;
        let inv_4alpha2 = 0.25 / (self.alpha * self.alpha);
        let mut sum = 0.0;
        for &g in &self.reciprocal {
            let g2 = norm_squared(g);
            if g2 < IMAGE_THRESHOLD {
                continue;
            }
            sum += dot(g, rij).cos() * fac * (-g2 * inv_4alpha2).exp() / g2;
        }
        sum
    }

    /// Derivatives of [`EwaldSum::direct`].
    pub fn direct_derivative(&self, rij: [f64; 3], damping: f64) -> KernelDerivative {
        let mut out = KernelDerivative::default();
        let alpha = self.alpha;
        for &t in &self.direct {
            let vec = add(rij, t);
            let r2 = norm_squared(vec);
            let r1 = r2.sqrt();
            if r1 < IMAGE_THRESHOLD {
                continue;
            }
            let gtmp = 2.0 * damping * (-r2 * damping * damping).exp() / (SQRT_PI * r2)
                - erf(r1 * damping) / (r2 * r1);
            let atmp = -2.0 * alpha * (-r2 * alpha * alpha).exp() / (SQRT_PI * r2)
                + erf(r1 * alpha) / (r2 * r1);
            out.accumulate(gtmp + atmp, vec);
        }
        out
    }

    /// Derivatives of [`EwaldSum::reciprocal`], including the volume and reciprocal vector
    /// response to strain.
    pub fn reciprocal_derivative(&self, rij: [f64; 3]) -> KernelDerivative {
        let mut out = KernelDerivative::default();
        let fac = 4.0 * PI / self.volume;
        let alpha2 = self.alpha * self.alpha;
        for &g in &self.reciprocal {
            let g2 = norm_squared(g);
            if g2 < IMAGE_THRESHOLD {
                continue;
            }
            let gv = dot(g, rij);
            let expk = fac * (-0.25 * g2 / alpha2).exp() / g2;
            let cosk = gv.cos() * expk;
            let sink = gv.sin() * expk;
            let scale = 2.0 / g2 + 0.5 / alpha2;
            for a in 0..3 {
                out.gradient[a] -= sink * g[a];
                for b in 0..3 {
                    let unity = if a == b { 1.0 } else { 0.0 };
                    out.strain[a][b] += cosk * (scale * g[a] * g[b] - unity);
                }
            }
        }
        out
    }
}

/// Chooses the Ewald splitting parameter for `lattice`.
///
/// Returns the α at which the direct-space tail `Σ_{T≠0} erfc(α|T|)/|T|` equals the reciprocal
/// sum `(4π/V) Σ_{G≠0} exp(−G²/4α²)/G²`, both over the same fixed-depth translation sets used by
/// [`EwaldSum`]. The direct tail decreases and the reciprocal sum increases monotonically in α,
/// so the balance point is unique and found by bisection.
pub fn select_alpha(lattice: &Lattice, periodic: [bool; 3]) -> f64 {
    let vol = volume(lattice);
    let direct = lattice_points(lattice, periodic, EWALD_DEPTH, false);
    let recip = lattice_points(&reciprocal(lattice), periodic, EWALD_DEPTH, false);

    let balance = |alpha: f64| -> f64 {
        let dir: f64 = direct
            .iter()
            .map(|&t| norm_squared(t).sqrt())
            .filter(|&r| r >= IMAGE_THRESHOLD)
            .map(|r| erfc(alpha * r) / r)
            .sum();
        let rec: f64 = recip
            .iter()
            .map(|&g| norm_squared(g))
            .filter(|&g2| g2 >= IMAGE_THRESHOLD)
            .map(|g2| (-0.25 * g2 / (alpha * alpha)).exp() / g2)
            .sum::<f64>()
            * 4.0
            * PI
            / vol;
        dir - rec
    };

    let guess = SQRT_PI / vol.cbrt();
    let mut lo = guess;
    let mut hi = guess;
    for _ in 0..64 {
        if balance(lo) > 0.0 {
            break;
        }
        lo *= 0.5;
    }
    for _ in 0..64 {
        if balance(hi) < 0.0 {
            break;
        }
        hi *= 2.0;
    }

    for _ in 0..200 {
        let mid = 0.5 * (lo + hi);
        if balance(mid) > 0.0 {
            lo = mid;
        } else {
            hi = mid;
        }
        if hi - lo <= 1e-12 * hi {
            break;
        }
    }

    let alpha = 0.5 * (lo + hi);
    debug!(alpha, volume = vol, "selected Ewald splitting parameter");
    alpha
}
