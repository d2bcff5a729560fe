//! Coordination numbers: continuous, differentiable neighbor counts.
//!
//! The solver only depends on the [`CoordinationNumber`] trait. [`NCoord`] is the engine shipped
//! with the crate; its counting function, cutoff and optional smooth cap are fixed when it is
//! constructed and reused for every structure.

use crate::error::EeqError;
use crate::math::constants::{IMAGE_THRESHOLD, SQRT_PI};
use crate::math::lattice::translations_within;
use crate::math::{norm_squared, sub};
use crate::params::Parameters;
use crate::types::{Coordination, Structure};
use faer::Mat;
use libm::erf;
use rayon::prelude::*;
use std::collections::HashMap;
use tracing::{debug, instrument};

/// Default real-space cutoff of the neighbor count in Bohr.
pub const DEFAULT_CUTOFF: f64 = 25.0;

/// A source of coordination numbers and their derivatives.
pub trait CoordinationNumber {
    /// Computes the coordination number of every atom, and position and strain derivatives when
    /// `derivatives` is set.
    fn compute(&self, structure: &Structure, derivatives: bool) -> Result<Coordination, EeqError>;
}

/// Shape of the neighbor counting function of a pair at distance `r` with reference distance
/// `r0` (the sum of the covalent radii).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CountingFunction {
    /// `0.5 (1 + erf(−k (r − r0) / r0))`.
    Erf { steepness: f64 },
    /// `1 / (1 + exp(−k (r0/r − 1)))`.
    Exp { steepness: f64 },
}

impl CountingFunction {
    /// Error-function counting with the usual steepness of 7.5.
    pub const fn erf() -> Self {
        CountingFunction::Erf { steepness: 7.5 }
    }

    /// Fermi-type counting with the usual steepness of 16.
    pub const fn exp() -> Self {
        CountingFunction::Exp { steepness: 16.0 }
    }

    /// Count and its radial derivative.
    #[inline]
    fn evaluate(&self, r: f64, r0: f64) -> (f64, f64) {
        match *self {
            CountingFunction::Erf { steepness } => {
                let x = -steepness * (r - r0) / r0;
                let count = 0.5 * (1.0 + erf(x));
                let dcount = -steepness / (SQRT_PI * r0) * (-x * x).exp();
                (count, dcount)
            }
            CountingFunction::Exp { steepness } => {
                let e = (-steepness * (r0 / r - 1.0)).exp();
                let count = 1.0 / (1.0 + e);
                let dcount = -steepness * r0 / (r * r) * e / ((1.0 + e) * (1.0 + e));
                (count, dcount)
            }
        }
    }
}

impl Default for CountingFunction {
    fn default() -> Self {
        Self::erf()
    }
}

/// Coordination-number engine over pairwise counting functions.
///
/// The coordination number of an atom is the sum of the counting function over every other atom
/// and every periodic image within the cutoff. The reference distance of a pair is the sum of the
/// covalent radii taken from the parameter set at construction, so the engine does not borrow the
/// parameters afterwards.
#[derive(Debug, Clone)]
pub struct NCoord {
    counting: CountingFunction,
    cutoff: f64,
    cn_max: Option<f64>,
    radii: HashMap<u8, f64>,
}

impl NCoord {
    /// Creates an engine using the covalent radii of `parameters`.
    ///
    /// `cutoff` is in Bohr and bounds both isolated pairs and periodic images. The engine starts
    /// without a cap; see [`NCoord::with_cap`].
    pub fn new(parameters: &Parameters, counting: CountingFunction, cutoff: f64) -> Self {
        let radii = parameters
            .elements
            .iter()
            .map(|(&z, data)| (z, data.covalent_radius))
            .collect();
        Self {
            counting,
            cutoff,
            cn_max: None,
            radii,
        }
    }

    /// Smoothly caps coordination numbers at `cn_max`:
    /// `ln(1 + e^max) − ln(1 + e^(max − CN))`.
    pub fn with_cap(mut self, cn_max: Option<f64>) -> Self {
        self.cn_max = cn_max;
        self
    }

    /// Counting function applied to every pair.
    pub fn counting(&self) -> CountingFunction {
        self.counting
    }

    /// Real-space cutoff in Bohr beyond which pairs and periodic images are not counted.
    pub fn cutoff(&self) -> f64 {
        self.cutoff
    }

    fn radii_of(&self, structure: &Structure) -> Result<Vec<f64>, EeqError> {
        structure
            .atomic_numbers
            .iter()
            .map(|&z| self.radii.get(&z).copied().ok_or(EeqError::ParameterNotFound(z)))
            .collect()
    }
}

struct CnAccumulator {
    cn: Vec<f64>,
    dcndr: Option<Mat<f64>>,
    dcndl: Option<Mat<f64>>,
}

impl CnAccumulator {
    fn zeros(natoms: usize, derivatives: bool) -> Self {
        Self {
            cn: vec![0.0; natoms],
            dcndr: derivatives.then(|| Mat::zeros(3 * natoms, natoms)),
            dcndl: derivatives.then(|| Mat::zeros(9, natoms)),
        }
    }

    fn merge(mut self, other: Self) -> Self {
        for (a, b) in self.cn.iter_mut().zip(&other.cn) {
            *a += b;
        }
        if let (Some(a), Some(b)) = (self.dcndr.as_mut(), other.dcndr.as_ref()) {
            crate::coulomb::add_into(a, b);
        }
        if let (Some(a), Some(b)) = (self.dcndl.as_mut(), other.dcndl.as_ref()) {
            crate::coulomb::add_into(a, b);
        }
        self
    }
}

impl CoordinationNumber for NCoord {
    #[instrument(skip_all, name = "coordination_number", fields(natoms = structure.len()))]
    fn compute(&self, structure: &Structure, derivatives: bool) -> Result<Coordination, EeqError> {
        let natoms = structure.len();
        let radii = self.radii_of(structure)?;
        let positions = &structure.positions;

        let translations = if structure.is_periodic() {
            let lattice = structure.lattice.as_ref().ok_or(EeqError::MissingLattice)?;
            translations_within(lattice, structure.periodic, self.cutoff)
        } else {
            vec![[0.0; 3]]
        };
        debug!(translations = translations.len(), "counting neighbors");

        let cutoff2 = self.cutoff * self.cutoff;
        let counting = self.counting;

        let acc = (0..natoms)
            .into_par_iter()
            .fold(
                || CnAccumulator::zeros(natoms, derivatives),
                |mut local, i| {
                    for j in 0..=i {
                        let rij = sub(positions[i], positions[j]);
                        let r0 = radii[i] + radii[j];
                        for &t in &translations {
                            let vec = sub(rij, t);
                            let r2 = norm_squared(vec);
                            if r2 > cutoff2 || r2 < IMAGE_THRESHOLD {
                                continue;
                            }
                            let r = r2.sqrt();
                            let (count, dcount) = counting.evaluate(r, r0);

                            local.cn[i] += count;
                            if i != j {
                                local.cn[j] += count;
                            }

                            if let (Some(dcndr), Some(dcndl)) =
                                (local.dcndr.as_mut(), local.dcndl.as_mut())
                            {
                                let dg = vec.map(|x| dcount * x / r);
                                for c in 0..3 {
                                    dcndr[(3 * i + c, i)] += dg[c];
                                    dcndr[(3 * j + c, j)] -= dg[c];
                                    dcndr[(3 * j + c, i)] -= dg[c];
                                    dcndr[(3 * i + c, j)] += dg[c];
                                }
                                for a in 0..3 {
                                    for b in 0..3 {
                                        let ds = dg[a] * vec[b];
                                        dcndl[(3 * a + b, i)] += ds;
                                        if i != j {
                                            dcndl[(3 * a + b, j)] += ds;
                                        }
                                    }
                                }
                            }
                        }
                    }
                    local
                },
            )
            .reduce(
                || CnAccumulator::zeros(natoms, derivatives),
                CnAccumulator::merge,
            );

        let mut coordination = Coordination {
            cn: acc.cn,
            dcndr: acc.dcndr,
            dcndl: acc.dcndl,
        };

        if let Some(cn_max) = self.cn_max {
            apply_cap(&mut coordination, cn_max);
        }

        Ok(coordination)
    }
}

fn apply_cap(coordination: &mut Coordination, cn_max: f64) {
    let natoms = coordination.cn.len();
    for m in 0..natoms {
        let cn = coordination.cn[m];
        let capped = ln_1p_exp(cn_max) - ln_1p_exp(cn_max - cn);
        let scale = 1.0 / (1.0 + (cn - cn_max).exp());
        coordination.cn[m] = capped;

        if let Some(dcndr) = coordination.dcndr.as_mut() {
            for row in 0..dcndr.nrows() {
                dcndr[(row, m)] *= scale;
            }
        }
        if let Some(dcndl) = coordination.dcndl.as_mut() {
            for row in 0..dcndl.nrows() {
                dcndl[(row, m)] *= scale;
            }
        }
    }
}

/// `ln(1 + e^x)` without overflow for large `x`.
#[inline]
fn ln_1p_exp(x: f64) -> f64 {
    if x > 30.0 { x + (-x).exp().ln_1p() } else { x.exp().ln_1p() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::SpeciesData;
    use approx::assert_relative_eq;

    fn parameters() -> Parameters {
        let species = |rcov: f64| SpeciesData {
            width: 1.0,
            electronegativity: 0.3,
            hardness: 0.4,
            cn_scale: 0.01,
            covalent_radius: rcov,
        };
        Parameters::new()
            .with_species(1, species(0.8))
            .with_species(6, species(1.4))
            .with_species(8, species(1.25))
    }

    fn formaldehyde() -> Structure {
        Structure::molecule(
            vec![6, 8, 1, 1],
            vec![
                [0.0, 0.0, 0.0],
                [2.27, 0.05, 0.0],
                [-1.1, 1.75, 0.1],
                [-1.05, -1.8, -0.1],
            ],
            0.0,
        )
    }

    fn periodic_chain() -> Structure {
        Structure::periodic(
            vec![6, 1, 8],
            vec![[0.1, 0.2, 0.0], [2.0, 0.3, 0.4], [0.8, 2.3, 1.1]],
            [[4.5, 0.0, 0.0], [0.3, 9.0, 0.0], [0.0, -0.4, 9.5]],
            0.0,
        )
    }

    #[test]
    fn counting_functions_are_half_at_reference_distance() {
        for counting in [CountingFunction::erf(), CountingFunction::exp()] {
            let (count, _) = counting.evaluate(2.0, 2.0);
            assert_relative_eq!(count, 0.5, epsilon = 1e-14);
        }
    }

    #[test]
    fn counting_derivatives_match_finite_difference() {
        let step = 1e-6;
        for counting in [CountingFunction::erf(), CountingFunction::exp()] {
            for r in [1.2, 2.0, 3.3] {
                let (_, analytic) = counting.evaluate(r, 2.1);
                let numerical = (counting.evaluate(r + step, 2.1).0
                    - counting.evaluate(r - step, 2.1).0)
                    / (2.0 * step);
                assert_relative_eq!(analytic, numerical, epsilon = 1e-8);
            }
        }
    }

    #[test]
    fn isolated_cn_counts_bonded_neighbors() {
        let engine = NCoord::new(&parameters(), CountingFunction::erf(), DEFAULT_CUTOFF);
        let coordination = engine.compute(&formaldehyde(), false).unwrap();
        assert!(coordination.dcndr.is_none());
        assert!(coordination.cn[0] > 2.0 && coordination.cn[0] < 3.0);
        assert!(coordination.cn[2] > 0.5 && coordination.cn[2] < 1.0);
    }

    #[test]
    fn unknown_species_is_reported() {
        let engine = NCoord::new(&parameters(), CountingFunction::erf(), DEFAULT_CUTOFF);
        let structure = Structure::molecule(vec![6, 7], vec![[0.0; 3], [2.0, 0.0, 0.0]], 0.0);
        assert!(matches!(
            engine.compute(&structure, false),
            Err(EeqError::ParameterNotFound(7))
        ));
    }

    fn check_position_derivatives(engine: &NCoord, structure: &Structure) {
        let analytic = engine.compute(structure, true).unwrap();
        let dcndr = analytic.dcndr.as_ref().unwrap();
        let step = 1e-5;
        let n = structure.len();

        for k in 0..n {
            for c in 0..3 {
                let mut plus = structure.clone();
                let mut minus = structure.clone();
                plus.positions[k][c] += step;
                minus.positions[k][c] -= step;
                let cn_plus = engine.compute(&plus, false).unwrap().cn;
                let cn_minus = engine.compute(&minus, false).unwrap().cn;
                for m in 0..n {
                    let numerical = (cn_plus[m] - cn_minus[m]) / (2.0 * step);
                    assert_relative_eq!(dcndr[(3 * k + c, m)], numerical, epsilon = 1e-7);
                }
            }
        }
    }

    fn check_strain_derivatives(engine: &NCoord, structure: &Structure) {
        let analytic = engine.compute(structure, true).unwrap();
        let dcndl = analytic.dcndl.as_ref().unwrap();
        let step = 1e-6;

        for a in 0..3 {
            for b in 0..3 {
                let strained = |eps: f64| {
                    let deform = |v: [f64; 3]| {
                        let mut out = v;
                        out[a] += eps * v[b];
                        out
                    };
                    let mut s = structure.clone();
                    s.positions = s.positions.iter().map(|&p| deform(p)).collect();
                    s.lattice = s.lattice.map(|l| [deform(l[0]), deform(l[1]), deform(l[2])]);
                    engine.compute(&s, false).unwrap().cn
                };
                let (plus, minus) = (strained(step), strained(-step));
                for m in 0..structure.len() {
                    let numerical = (plus[m] - minus[m]) / (2.0 * step);
                    assert_relative_eq!(dcndl[(3 * a + b, m)], numerical, epsilon = 1e-6);
                }
            }
        }
    }

    #[test]
    fn isolated_derivatives_match_finite_difference() {
        let engine = NCoord::new(&parameters(), CountingFunction::erf(), DEFAULT_CUTOFF);
        check_position_derivatives(&engine, &formaldehyde());
        check_strain_derivatives(&engine, &formaldehyde());
    }

    #[test]
    fn capped_derivatives_match_finite_difference() {
        let engine = NCoord::new(&parameters(), CountingFunction::exp(), DEFAULT_CUTOFF)
            .with_cap(Some(2.0));
        check_position_derivatives(&engine, &formaldehyde());
        let capped = engine.compute(&formaldehyde(), false).unwrap();
        let bound = ln_1p_exp(2.0);
        assert!(capped.cn.iter().all(|&cn| cn < bound));
    }

    #[test]
    fn periodic_derivatives_match_finite_difference() {
        let engine = NCoord::new(&parameters(), CountingFunction::erf(), 15.0);
        check_position_derivatives(&engine, &periodic_chain());
        check_strain_derivatives(&engine, &periodic_chain());
    }

    #[test]
    fn periodic_images_add_neighbors() {
        let engine = NCoord::new(&parameters(), CountingFunction::erf(), 15.0);
        let periodic = engine.compute(&periodic_chain(), false).unwrap();
        let mut isolated = periodic_chain();
        isolated.lattice = None;
        isolated.periodic = [false; 3];
        let molecule = engine.compute(&isolated, false).unwrap();
        for (p, m) in periodic.cn.iter().zip(&molecule.cn) {
            assert!(p >= m);
        }
        assert!(periodic.cn[0] > molecule.cn[0]);
    }
}
