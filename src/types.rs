//! This module defines the core types used in the eeq library for describing structures and
//! calculation results.
//!
//! It includes the `AtomView` trait for abstracting atom data access, the `Structure` struct that
//! the solver consumes, the `Request` describing which optional outputs a caller wants, and the
//! `EeqOutput`/`ChargeResponse` types that carry the results back. All lengths are in Bohr and all
//! energies in Hartree.
//!
//! Derivative tensors are stored as dense `faer` matrices with a flattened Cartesian index: a
//! position derivative with respect to atom `k`, direction `c` lives in row `3 * k + c`, and a
//! strain derivative with respect to component `(a, b)` lives in row `3 * a + b`.

use faer::Mat;

/// Lattice vectors stored as rows, in Bohr.
pub type Lattice = [[f64; 3]; 3];

/// A trait for viewing atom data without owning it.
///
/// This lets callers build a [`Structure`] from their own atom representation without an
/// intermediate conversion step.
pub trait AtomView {
    /// Returns the atomic number of the atom, used to look up species parameters.
    fn atomic_number(&self) -> u8;

    /// Returns the Cartesian position of the atom in Bohr.
    fn position(&self) -> [f64; 3];
}

/// A concrete representation of an atom with atomic number and position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Atom {
    /// The atomic number of the atom, identifying its chemical element.
    pub atomic_number: u8,
    /// The Cartesian position of the atom in Bohr.
    pub position: [f64; 3],
}

impl AtomView for Atom {
    #[inline(always)]
    fn atomic_number(&self) -> u8 {
        self.atomic_number
    }

    #[inline(always)]
    fn position(&self) -> [f64; 3] {
        self.position
    }
}

/// An atomic structure, either an isolated molecule or a periodic solid.
///
/// The solver treats the structure as read-only for the duration of a call.
#[derive(Debug, Clone, PartialEq)]
pub struct Structure {
    /// Atomic number of every atom.
    pub atomic_numbers: Vec<u8>,
    /// Cartesian positions in Bohr, same order as `atomic_numbers`.
    pub positions: Vec<[f64; 3]>,
    /// Lattice vectors as rows, required whenever any periodicity flag is set.
    pub lattice: Option<Lattice>,
    /// Periodicity along each lattice vector.
    pub periodic: [bool; 3],
    /// Target total charge of the structure.
    pub charge: f64,
}

impl Structure {
    /// Creates an isolated (non-periodic) structure.
    ///
    /// # Examples
    ///
    /// ```
    /// use eeq::Structure;
    ///
    /// let h2 = Structure::molecule(vec![1, 1], vec![[0.0, 0.0, 0.0], [1.4, 0.0, 0.0]], 0.0);
    /// assert_eq!(h2.len(), 2);
    /// assert!(!h2.is_periodic());
    /// ```
    pub fn molecule(atomic_numbers: Vec<u8>, positions: Vec<[f64; 3]>, charge: f64) -> Self {
        Self {
            atomic_numbers,
            positions,
            lattice: None,
            periodic: [false; 3],
            charge,
        }
    }

    /// Creates a structure periodic in all three directions.
    pub fn periodic(
        atomic_numbers: Vec<u8>,
        positions: Vec<[f64; 3]>,
        lattice: Lattice,
        charge: f64,
    ) -> Self {
        Self {
            atomic_numbers,
            positions,
            lattice: Some(lattice),
            periodic: [true; 3],
            charge,
        }
    }

    /// Collects a structure from any slice of atoms implementing [`AtomView`].
    pub fn from_atoms<A: AtomView>(atoms: &[A], charge: f64) -> Self {
        Self::molecule(
            atoms.iter().map(AtomView::atomic_number).collect(),
            atoms.iter().map(AtomView::position).collect(),
            charge,
        )
    }

    /// Attaches a lattice and periodicity flags to the structure.
    pub fn with_lattice(mut self, lattice: Lattice, periodic: [bool; 3]) -> Self {
        self.lattice = Some(lattice);
        self.periodic = periodic;
        self
    }

    /// Number of atoms.
    pub fn len(&self) -> usize {
        self.atomic_numbers.len()
    }

    /// Whether the structure has no atoms. Every calculation rejects such a structure with
    /// `EeqError::NoAtoms`.
    pub fn is_empty(&self) -> bool {
        self.atomic_numbers.is_empty()
    }

    /// Whether any direction is periodic.
    pub fn is_periodic(&self) -> bool {
        self.periodic.iter().any(|&p| p)
    }
}

/// Coordination numbers of a structure, optionally with their derivatives.
#[derive(Debug, Clone)]
pub struct Coordination {
    /// One coordination number per atom.
    pub cn: Vec<f64>,
    /// Position derivatives, `3N × N`: entry `(3k + c, m)` is ∂CN_m/∂R_kc.
    pub dcndr: Option<Mat<f64>>,
    /// Strain derivatives, `9 × N`: entry `(3a + b, m)` is ∂CN_m/∂ε_ab.
    pub dcndl: Option<Mat<f64>>,
}

impl Coordination {
    /// Wraps plain coordination numbers without derivative information.
    pub fn from_values(cn: Vec<f64>) -> Self {
        Self {
            cn,
            dcndr: None,
            dcndl: None,
        }
    }

    /// Whether both position and strain derivatives are present.
    pub fn has_derivatives(&self) -> bool {
        self.dcndr.is_some() && self.dcndl.is_some()
    }
}

/// The optional outputs a caller asks the solver for. Charges are always produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Request {
    /// Per-atom electrostatic energies.
    pub energy: bool,
    /// Energy gradient with respect to positions and strain derivative (virial).
    pub gradient: bool,
    /// Charge response tensors dq/dR and dq/dε.
    pub response: bool,
}

impl Request {
    /// Charges only.
    pub fn charges() -> Self {
        Self::default()
    }

    /// Charges and energies.
    pub fn energy() -> Self {
        Self {
            energy: true,
            ..Self::default()
        }
    }

    /// Energies, gradient and strain derivative.
    pub fn gradient() -> Self {
        Self {
            energy: true,
            gradient: true,
            response: false,
        }
    }

    /// Every output the solver can produce.
    pub fn all() -> Self {
        Self {
            energy: true,
            gradient: true,
            response: true,
        }
    }
}

/// Derivatives of the solved charges.
#[derive(Debug, Clone)]
pub struct ChargeResponse {
    /// `3N × N`: entry `(3k + c, n)` is ∂q_n/∂R_kc.
    pub dqdr: Mat<f64>,
    /// `9 × N`: entry `(3a + b, n)` is ∂q_n/∂ε_ab.
    pub dqdl: Mat<f64>,
}

impl ChargeResponse {
    /// ∂q_target/∂R_(atom, direction).
    #[inline]
    pub fn position(&self, atom: usize, direction: usize, target: usize) -> f64 {
        self.dqdr[(3 * atom + direction, target)]
    }

    /// ∂q_target/∂ε_(a, b).
    #[inline]
    pub fn strain(&self, a: usize, b: usize, target: usize) -> f64 {
        self.dqdl[(3 * a + b, target)]
    }
}

/// The result of an EEQ calculation.
#[derive(Debug, Clone)]
pub struct EeqOutput {
    /// Partial charges in the input atom order; they sum to the structure's total charge.
    pub charges: Vec<f64>,
    /// Per-atom electrostatic energies, present when requested.
    pub energies: Option<Vec<f64>>,
    /// Energy gradient per atom, present when requested.
    pub gradient: Option<Vec<[f64; 3]>>,
    /// Derivative of the energy with respect to strain, present with the gradient.
    pub sigma: Option<[[f64; 3]; 3]>,
    /// Charge response tensors, present when requested.
    pub response: Option<ChargeResponse>,
}

impl EeqOutput {
    /// Total electrostatic energy, if energies were requested.
    pub fn energy(&self) -> Option<f64> {
        self.energies.as_ref().map(|e| e.iter().sum())
    }

    /// Sum of the partial charges.
    pub fn total_charge(&self) -> f64 {
        self.charges.iter().sum()
    }
}
