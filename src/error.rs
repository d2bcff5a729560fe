use std::path::PathBuf;
use thiserror::Error;

/// The primary error type for all fallible operations in the `eeq` library.
///
/// The three linear-algebra variants are the only ways a well-formed solve can
/// fail. None of them is retried internally, and when one is returned the call
/// produced no charges, energies, gradients or response tensors.
#[derive(Error, Debug)]
pub enum EeqError {
    /// The symmetric indefinite factorization of the augmented interaction
    /// matrix hit a singular or non-finite pivot block.
    ///
    /// Typical causes are coincident atoms of the same species, which make two
    /// rows of the matrix identical.
    #[error("Failed to factorize the interaction matrix: {0}")]
    Factorization(String),

    /// Inverting the factorized matrix failed. Only reachable when charge
    /// response derivatives were requested.
    #[error("Failed to invert the interaction matrix: {0}")]
    Inversion(String),

    /// Back-substitution against the factorization produced a non-finite
    /// solution.
    #[error("Failed to solve the linear matrix system: {0}")]
    Solve(String),

    /// Parameters for a species, identified by its atomic number, are missing
    /// from the provided `Parameters` set.
    #[error("Species parameters not found for element with atomic number: {0}")]
    ParameterNotFound(u8),

    /// The structure is flagged as periodic but carries no lattice.
    #[error("Structure is periodic but no lattice vectors were provided")]
    MissingLattice,

    /// An I/O error that occurred while reading a parameter file.
    #[error("I/O error at path '{path}': {source}")]
    Io {
        /// The path of the file that caused the I/O error.
        path: PathBuf,
        /// The underlying `std::io::Error`.
        #[source]
        source: std::io::Error,
    },

    /// A parameter file is not valid TOML or does not match the expected
    /// layout.
    #[error("Failed to deserialize TOML parameters: {0}")]
    Deserialization(#[from] toml::de::Error),

    /// The supplied coordination numbers do not match the structure, or lack the derivatives
    /// needed for gradient or response output.
    #[error("Invalid coordination numbers: {0}")]
    InvalidCoordination(String),

    /// The input structure contained no atoms.
    #[error("Input validation failed: at least one atom is required for a calculation")]
    NoAtoms,
}

impl EeqError {
    /// Whether the error originates from the dense linear algebra stage.
    pub fn is_linalg(&self) -> bool {
        matches!(
            self,
            EeqError::Factorization(_) | EeqError::Inversion(_) | EeqError::Solve(_)
        )
    }
}
