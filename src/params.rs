//! This module provides species parameters and utilities for loading them from TOML files.
//!
//! It defines the `SpeciesData` struct holding the per-element scalars of the EEQ model, and the
//! `Parameters` struct collecting them by atomic number. Keys in the TOML `[elements]` table may
//! be atomic numbers or element symbols.

use super::elements::symbol_to_atomic_number;
use super::error::EeqError;
use serde::Deserialize;
use serde::de::{self, Deserializer, MapAccess, Visitor};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;

/// EEQ parameters of one species, in atomic units.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct SpeciesData {
    /// Width of the Gaussian charge distribution in Bohr.
    ///
    /// Pair interactions are damped by `erf(r / sqrt(rad_i² + rad_j²)) / r`, and the self-energy
    /// of the normalized Gaussian is `sqrt(2/π) / rad`.
    #[serde(rename = "rad")]
    pub width: f64,
    /// Electronegativity in Hartree.
    #[serde(rename = "chi")]
    pub electronegativity: f64,
    /// Chemical hardness in Hartree.
    #[serde(rename = "eta")]
    pub hardness: f64,
    /// Scaling of the coordination-number dependent electronegativity term.
    #[serde(rename = "kcn")]
    pub cn_scale: f64,
    /// Covalent radius in Bohr, used by the coordination-number engine.
    #[serde(rename = "rcov")]
    pub covalent_radius: f64,
}

/// A collection of species parameters, indexed by atomic number.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Parameters {
    /// A mapping from atomic number to the corresponding species parameters.
    #[serde(deserialize_with = "deserialize_element_map")]
    pub elements: HashMap<u8, SpeciesData>,
}

impl Parameters {
    /// Loads species parameters from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns `EeqError::Io` if the file cannot be read, or `EeqError::Deserialization` if the
    /// TOML content is invalid or contains unrecognized element keys.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use eeq::Parameters;
    /// use std::path::Path;
    ///
    /// let params = Parameters::load_from_file(Path::new("eeq.toml")).unwrap();
    /// ```
    pub fn load_from_file(path: &Path) -> Result<Self, EeqError> {
        let content = std::fs::read_to_string(path).map_err(|io_error| EeqError::Io {
            path: path.to_path_buf(),
            source: io_error,
        })?;

        Self::load_from_str(&content)
    }

    /// Parses species parameters from a TOML string.
    ///
    /// # Examples
    ///
    /// ```
    /// use eeq::Parameters;
    ///
    /// let toml_data = r#"
    /// [elements]
    /// "1" = { rad = 0.6, chi = 0.2, eta = 0.4, kcn = 0.02, rcov = 0.8 }
    /// "O" = { rad = 0.9, chi = 0.5, eta = 0.3, kcn = 0.01, rcov = 1.2 }
    /// "#;
    ///
    /// let params = Parameters::load_from_str(toml_data).unwrap();
    /// assert_eq!(params.elements.len(), 2);
    /// assert!(params.get(8).is_some());
    /// ```
    pub fn load_from_str(toml_str: &str) -> Result<Self, EeqError> {
        toml::from_str(toml_str).map_err(EeqError::from)
    }

    /// Creates an empty parameter set.
    pub fn new() -> Self {
        Parameters {
            elements: HashMap::new(),
        }
    }

    /// Adds or replaces the parameters of one species.
    pub fn with_species(mut self, atomic_number: u8, data: SpeciesData) -> Self {
        self.elements.insert(atomic_number, data);
        self
    }

    /// Parameters of one species, if present.
    pub fn get(&self, atomic_number: u8) -> Option<&SpeciesData> {
        self.elements.get(&atomic_number)
    }

    /// Resolves the parameters of every atom in order.
    ///
    /// # Errors
    ///
    /// Returns `EeqError::ParameterNotFound` for the first atomic number without parameters.
    pub fn lookup(&self, atomic_numbers: &[u8]) -> Result<Vec<SpeciesData>, EeqError> {
        atomic_numbers
            .iter()
            .map(|&z| self.get(z).copied().ok_or(EeqError::ParameterNotFound(z)))
            .collect()
    }
}

impl Default for Parameters {
    fn default() -> Self {
        Self::new()
    }
}

fn deserialize_element_map<'de, D>(deserializer: D) -> Result<HashMap<u8, SpeciesData>, D::Error>
where
    D: Deserializer<'de>,
{
    struct ElementMapVisitor;

    impl<'de> Visitor<'de> for ElementMapVisitor {
        type Value = HashMap<u8, SpeciesData>;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a map from atomic number or symbol to species data")
        }

        fn visit_map<M>(self, mut map: M) -> Result<Self::Value, M::Error>
        where
            M: MapAccess<'de>,
        {
            let mut elements = HashMap::with_capacity(map.size_hint().unwrap_or(0));
            while let Some((key, value)) = map.next_entry::<String, SpeciesData>()? {
                let atomic_number = key.parse::<u8>().or_else(|_| {
                    symbol_to_atomic_number(&key)
                        .ok_or_else(|| de::Error::custom(format!("invalid element key: '{}'", key)))
                })?;
                if value.width <= 0.0 {
                    return Err(de::Error::custom(format!(
                        "non-positive Gaussian width for element '{}'",
                        key
                    )));
                }
                elements.insert(atomic_number, value);
            }
            Ok(elements)
        }
    }

    deserializer.deserialize_map(ElementMapVisitor)
}
