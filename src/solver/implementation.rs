//! This module implements `EeqModel`, the entry point for EEQ charge calculations.
//!
//! A calculation is a single linear solve: the electronegativity vector and the augmented
//! interaction matrix are built for the structure, the matrix is factorized, and the charges are
//! read off the solution. When the gradient or the charge response is requested the matrix
//! derivatives are contracted with the charges and combined with the coordination-number
//! derivatives. The response additionally needs the explicit inverse of the matrix.

use super::options::SolverOptions;
use super::rhs::{Rhs, build_rhs};
use crate::{
    coulomb::{Coulomb, CoulombDerivatives},
    error::EeqError,
    math::linalg::SymmetricFactorization,
    ncoord::{CoordinationNumber, NCoord},
    params::Parameters,
    types::{ChargeResponse, Coordination, EeqOutput, Request, Structure},
};
use faer::{Col, Mat};
use tracing::{debug, instrument};

/// Derived flags of a [`Request`], fixed for the duration of one call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Capabilities {
    pub energy: bool,
    pub gradient: bool,
    pub response: bool,
    pub cn_derivatives: bool,
}

impl From<&Request> for Capabilities {
    fn from(request: &Request) -> Self {
        Self {
            energy: request.energy,
            gradient: request.gradient,
            response: request.response,
            cn_derivatives: request.gradient || request.response,
        }
    }
}

/// The electronegativity-equilibration charge model.
///
/// Pairs a parameter set with a coordination-number engine. The model holds no per-call state
/// and can be shared between threads.
pub struct EeqModel<'p, C = NCoord> {
    parameters: &'p Parameters,
    ncoord: C,
    options: SolverOptions,
}

impl<'p> EeqModel<'p, NCoord> {
    /// Creates a model with default options and the built-in coordination-number engine.
    ///
    /// # Examples
    ///
    /// ```
    /// use eeq::{EeqModel, Parameters, Structure};
    ///
    /// let params = Parameters::load_from_str(r#"
    /// [elements]
    /// H = { rad = 0.8, chi = 0.2, eta = 0.5, kcn = 0.02, rcov = 0.6 }
    /// O = { rad = 0.9, chi = 0.5, eta = 0.6, kcn = 0.01, rcov = 1.2 }
    /// "#).unwrap();
    ///
    /// let model = EeqModel::new(&params);
    /// let water = Structure::molecule(
    ///     vec![8, 1, 1],
    ///     vec![[0.0, 0.0, 0.0], [1.8, 0.0, 0.0], [-0.45, 1.75, 0.0]],
    ///     0.0,
    /// );
    /// let output = model.charges(&water).unwrap();
    /// assert!(output.charges[0] < 0.0);
    /// assert!(output.total_charge().abs() < 1e-10);
    /// ```
    pub fn new(parameters: &'p Parameters) -> Self {
        Self::with_options(parameters, SolverOptions::default())
    }

    /// Creates a model with custom options and the built-in coordination-number engine.
    pub fn with_options(parameters: &'p Parameters, options: SolverOptions) -> Self {
        let ncoord =
            NCoord::new(parameters, options.counting, options.cutoff).with_cap(options.cn_max);
        Self {
            parameters,
            ncoord,
            options,
        }
    }
}

impl<'p, C: CoordinationNumber> EeqModel<'p, C> {
    /// Creates a model around a caller-supplied coordination-number engine. Only the Ewald
    /// settings of `options` are used.
    pub fn with_engine(parameters: &'p Parameters, ncoord: C, options: SolverOptions) -> Self {
        Self {
            parameters,
            ncoord,
            options,
        }
    }

    /// Options the model was built with. With a caller-supplied engine only
    /// [`SolverOptions::ewald_alpha`] affects the result.
    pub fn options(&self) -> &SolverOptions {
        &self.options
    }

    /// The coordination-number engine, for callers that want to compute and reuse coordination
    /// numbers themselves before calling [`EeqModel::solve`].
    pub fn ncoord(&self) -> &C {
        &self.ncoord
    }

    /// Computes the charges of `structure` only.
    pub fn charges(&self, structure: &Structure) -> Result<EeqOutput, EeqError> {
        self.evaluate(structure, &Request::charges())
    }

    /// Computes coordination numbers with the model's engine, then solves.
    pub fn evaluate(&self, structure: &Structure, request: &Request) -> Result<EeqOutput, EeqError> {
        if structure.is_empty() {
            return Err(EeqError::NoAtoms);
        }
        let caps = Capabilities::from(request);
        let coordination = self.ncoord.compute(structure, caps.cn_derivatives)?;
        self.solve(structure, &coordination, request)
    }

    /// Solves the EEQ system for `structure` with precomputed coordination numbers.
    ///
    /// Charges are always returned. Energies, the gradient with the strain derivative, and the
    /// charge response tensors are added as `request` asks. Gradient and response output need
    /// the position and strain derivatives of the coordination numbers.
    ///
    /// # Errors
    ///
    /// * `EeqError::NoAtoms` for an empty structure.
    /// * `EeqError::ParameterNotFound` if a species has no parameters.
    /// * `EeqError::InvalidCoordination` if `coordination` does not fit the structure or request.
    /// * `EeqError::MissingLattice` for a periodic structure without lattice.
    /// * `EeqError::Factorization`, `EeqError::Inversion` or `EeqError::Solve` if the linear
    ///   algebra fails, and `EeqError::Factorization` if two distinct atoms coincide. No partial
    ///   output is returned in either case.
    #[instrument(skip_all, name = "eeq_solve", fields(natoms = structure.len()))]
    pub fn solve(
        &self,
        structure: &Structure,
        coordination: &Coordination,
        request: &Request,
    ) -> Result<EeqOutput, EeqError> {
        let natoms = structure.len();
        if natoms == 0 {
            return Err(EeqError::NoAtoms);
        }
        let caps = Capabilities::from(request);
        check_coordination(coordination, natoms, caps)?;

        let species = self.parameters.lookup(&structure.atomic_numbers)?;
        let positions = &structure.positions;

        let Rhs { x, dxdcn } =
            build_rhs(&species, &coordination.cn, structure.charge, caps.cn_derivatives);

        let coulomb = Coulomb::new(structure, self.options.ewald_alpha)?;
        let amat = coulomb.matrix(positions, &species)?;
        debug!(periodic = structure.is_periodic(), size = amat.nrows(), "built interaction matrix");

        let factorization = SymmetricFactorization::new(&amat)?;

        let (solution, inverse) = if caps.response {
            debug!("inverting interaction matrix for charge response");
            let inverse = factorization.inverse()?;
            let solution: Col<f64> = &inverse * &x;
            (solution, Some(inverse))
        } else {
            (factorization.solve(&x)?, None)
        };

        let charges: Vec<f64> = (0..natoms).map(|i| solution[i]).collect();

        let energies = caps
            .energy
            .then(|| atomic_energies(&amat, &x, &charges));

        let mut output = EeqOutput {
            charges,
            energies,
            gradient: None,
            sigma: None,
            response: None,
        };

        if !caps.cn_derivatives {
            return Ok(output);
        }

        let derivs = coulomb.derivatives(positions, &species, &output.charges);
        let (Some(dcndr), Some(dcndl), Some(dxdcn)) =
            (coordination.dcndr.as_ref(), coordination.dcndl.as_ref(), dxdcn.as_ref())
        else {
            return Err(EeqError::InvalidCoordination(
                "coordination-number derivatives are missing".to_string(),
            ));
        };

        let chain: Vec<f64> = (0..natoms)
            .map(|m| -dxdcn[m] * output.charges[m])
            .collect();

        if caps.gradient {
            let (gradient, sigma) = contract_gradient(&derivs, dcndr, dcndl, &output.charges, &chain);
            output.gradient = Some(gradient);
            output.sigma = Some(sigma);
        }

        if let Some(inverse) = inverse.as_ref() {
            output.response = Some(charge_response(derivs, dcndr, dcndl, dxdcn, inverse));
        }

        Ok(output)
    }
}

fn check_coordination(
    coordination: &Coordination,
    natoms: usize,
    caps: Capabilities,
) -> Result<(), EeqError> {
    if coordination.cn.len() != natoms {
        return Err(EeqError::InvalidCoordination(format!(
            "expected {} coordination numbers, got {}",
            natoms,
            coordination.cn.len()
        )));
    }
    if !caps.cn_derivatives {
        return Ok(());
    }
    if !coordination.has_derivatives() {
        return Err(EeqError::InvalidCoordination(
            "gradient and response output need coordination-number derivatives".to_string(),
        ));
    }
    let shapes_match = coordination
        .dcndr
        .as_ref()
        .is_some_and(|d| d.nrows() == 3 * natoms && d.ncols() == natoms)
        && coordination
            .dcndl
            .as_ref()
            .is_some_and(|d| d.nrows() == 9 && d.ncols() == natoms);
    if !shapes_match {
        return Err(EeqError::InvalidCoordination(
            "coordination-number derivative tensors have the wrong shape".to_string(),
        ));
    }
    Ok(())
}

/// `e_i = q_i (0.5 (A q)_i − x_i)` over the atom block of the matrix.
fn atomic_energies(amat: &Mat<f64>, x: &Col<f64>, charges: &[f64]) -> Vec<f64> {
    let natoms = charges.len();
    (0..natoms)
        .map(|i| {
            let aq: f64 = (0..natoms).map(|j| amat[(i, j)] * charges[j]).sum();
            charges[i] * (0.5 * aq - x[i])
        })
        .collect()
}

/// Energy gradient and strain derivative from the unadjusted matrix derivatives.
fn contract_gradient(
    derivs: &CoulombDerivatives,
    dcndr: &Mat<f64>,
    dcndl: &Mat<f64>,
    charges: &[f64],
    chain: &[f64],
) -> (Vec<[f64; 3]>, [[f64; 3]; 3]) {
    let natoms = charges.len();

    let gradient = (0..natoms)
        .map(|k| {
            let mut g = [0.0; 3];
            for (c, gc) in g.iter_mut().enumerate() {
                let row = 3 * k + c;
                *gc = (0..natoms)
                    .map(|m| derivs.dadr[(row, m)] * charges[m] + dcndr[(row, m)] * chain[m])
                    .sum();
            }
            g
        })
        .collect();

    let mut sigma = [[0.0; 3]; 3];
    for (a, sigma_a) in sigma.iter_mut().enumerate() {
        for (b, sigma_ab) in sigma_a.iter_mut().enumerate() {
            let row = 3 * a + b;
            *sigma_ab = (0..natoms)
                .map(|m| 0.5 * derivs.dadl[(row, m)] * charges[m] + dcndl[(row, m)] * chain[m])
                .sum();
        }
    }

    (gradient, sigma)
}

/// Coupled-perturbed charge response `dq = −(∂A q − ∂x) A⁻¹`.
///
/// Takes ownership of the contracted derivatives: the diagonal blocks and the electronegativity
/// derivatives are folded into them in place.
fn charge_response(
    mut derivs: CoulombDerivatives,
    dcndr: &Mat<f64>,
    dcndl: &Mat<f64>,
    dxdcn: &Col<f64>,
    inverse: &Mat<f64>,
) -> ChargeResponse {
    let natoms = derivs.trace.len();

    for (k, trace) in derivs.trace.iter().enumerate() {
        for (c, value) in trace.iter().enumerate() {
            derivs.dadr[(3 * k + c, k)] += value;
        }
    }
    for m in 0..natoms {
        for row in 0..3 * natoms {
            derivs.dadr[(row, m)] -= dcndr[(row, m)] * dxdcn[m];
        }
        for row in 0..9 {
            derivs.dadl[(row, m)] -= dcndl[(row, m)] * dxdcn[m];
        }
    }

    let columns = inverse.as_ref().subcols(0, natoms);
    let dqdr: Mat<f64> = derivs.dadr.as_ref() * columns;
    let dqdl: Mat<f64> = derivs.dadl.as_ref() * columns;

    ChargeResponse {
        dqdr: Mat::from_fn(dqdr.nrows(), natoms, |i, j| -dqdr[(i, j)]),
        dqdl: Mat::from_fn(dqdl.nrows(), natoms, |i, j| -dqdl[(i, j)]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ncoord::CountingFunction;
    use crate::params::SpeciesData;
    use approx::assert_relative_eq;

    fn parameters() -> Parameters {
        Parameters::new()
            .with_species(
                1,
                SpeciesData {
                    width: 0.9,
                    electronegativity: 0.2,
                    hardness: 0.45,
                    cn_scale: 0.03,
                    covalent_radius: 0.6,
                },
            )
            .with_species(
                8,
                SpeciesData {
                    width: 1.1,
                    electronegativity: 0.5,
                    hardness: 0.6,
                    cn_scale: -0.02,
                    covalent_radius: 1.2,
                },
            )
    }

    #[test]
    fn options_configure_the_coordination_engine() {
        let params = parameters();
        let options = SolverOptions {
            counting: CountingFunction::exp(),
            cutoff: 12.0,
            cn_max: Some(3.0),
            ewald_alpha: None,
        };
        let model = EeqModel::with_options(&params, options);

        assert_eq!(model.options().cn_max, Some(3.0));
        assert_eq!(model.ncoord().counting(), CountingFunction::exp());
        assert_eq!(model.ncoord().cutoff(), 12.0);
    }

    fn water() -> Structure {
        Structure::molecule(
            vec![8, 1, 1],
            vec![[0.0, 0.0, 0.0], [1.8, 0.1, 0.0], [-0.45, 1.75, 0.2]],
            0.0,
        )
    }

    #[test]
    fn capabilities_follow_request() {
        let caps = Capabilities::from(&Request::charges());
        assert!(!caps.cn_derivatives);
        let caps = Capabilities::from(&Request {
            energy: false,
            gradient: false,
            response: true,
        });
        assert!(caps.response && caps.cn_derivatives && !caps.gradient);
    }

    #[test]
    fn empty_structure_is_rejected() {
        let params = parameters();
        let model = EeqModel::new(&params);
        let empty = Structure::molecule(vec![], vec![], 0.0);
        assert!(matches!(model.charges(&empty), Err(EeqError::NoAtoms)));
        assert!(matches!(
            model.solve(&empty, &Coordination::from_values(vec![]), &Request::charges()),
            Err(EeqError::NoAtoms)
        ));
    }

    #[test]
    fn gradient_without_cn_derivatives_is_rejected() {
        let params = parameters();
        let model = EeqModel::new(&params);
        let coordination = Coordination::from_values(vec![1.0, 1.0, 1.0]);
        let result = model.solve(&water(), &coordination, &Request::gradient());
        assert!(matches!(result, Err(EeqError::InvalidCoordination(_))));
    }

    #[test]
    fn mismatched_cn_length_is_rejected() {
        let params = parameters();
        let model = EeqModel::new(&params);
        let coordination = Coordination::from_values(vec![1.0, 1.0]);
        let result = model.solve(&water(), &coordination, &Request::charges());
        assert!(matches!(result, Err(EeqError::InvalidCoordination(_))));
    }

    #[test]
    fn solve_and_inverse_paths_agree() {
        let params = parameters();
        let model = EeqModel::new(&params);
        let plain = model.evaluate(&water(), &Request::energy()).unwrap();
        let full = model.evaluate(&water(), &Request::all()).unwrap();

        for (a, b) in plain.charges.iter().zip(&full.charges) {
            assert_relative_eq!(a, b, epsilon = 1e-12);
        }
        assert_relative_eq!(
            plain.energy().unwrap(),
            full.energy().unwrap(),
            epsilon = 1e-12
        );
        assert!(plain.gradient.is_none() && plain.response.is_none());
        assert!(full.gradient.is_some() && full.sigma.is_some() && full.response.is_some());
    }

    #[test]
    fn outputs_are_only_filled_when_requested() {
        let params = parameters();
        let model = EeqModel::new(&params);
        let output = model.charges(&water()).unwrap();
        assert!(output.energies.is_none());
        assert!(output.gradient.is_none());
        assert!(output.sigma.is_none());
        assert!(output.response.is_none());
    }

    #[test]
    fn response_alone_skips_gradient() {
        let params = parameters();
        let model = EeqModel::new(&params);
        let request = Request {
            energy: false,
            gradient: false,
            response: true,
        };
        let output = model.evaluate(&water(), &request).unwrap();
        assert!(output.gradient.is_none());
        let response = output.response.unwrap();
        assert_eq!(response.dqdr.nrows(), 9);
        assert_eq!(response.dqdr.ncols(), 3);
        assert_eq!(response.dqdl.nrows(), 9);
    }

    #[test]
    fn response_columns_sum_to_zero_for_fixed_total_charge() {
        let params = parameters();
        let model = EeqModel::new(&params);
        let output = model.evaluate(&water(), &Request::all()).unwrap();
        let response = output.response.unwrap();
        for row in 0..9 {
            let sum: f64 = (0..3).map(|n| response.dqdr[(row, n)]).sum();
            assert_relative_eq!(sum, 0.0, epsilon = 1e-10);
        }
    }
}
