use crate::composition::Composition;
use crate::correlation::{Correlation, PolyTerm};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// An element symbol and its atomic weight in g/mol.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ElementRecord {
    pub symbol: String,
    pub mass: f64,
}

impl ElementRecord {
    pub fn new(symbol: &str, mass: f64) -> Self {
        Self {
            symbol: symbol.to_owned(),
            mass,
        }
    }
}

/// One temperature range of a piecewise property correlation together with
/// its integration constants.
///
/// The correlation stores the reduced heat capacity `cp/R`. Enthalpy and
/// entropy follow from its antiderivatives as
/// `h = R (int cp/R dT + enthalpy_constant)` and
/// `s = R (int cp/(R T) dT + entropy_constant)`, so the two constants fix
/// the enthalpy of formation and the absolute entropy of the range.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PropertyRecord {
    pub min_temperature: f64,
    pub max_temperature: f64,
    pub correlation: Correlation,
    #[serde(default)]
    pub enthalpy_constant: f64,
    #[serde(default)]
    pub entropy_constant: f64,
}

impl PropertyRecord {
    pub fn new(
        min_temperature: f64,
        max_temperature: f64,
        correlation: Correlation,
        enthalpy_constant: f64,
        entropy_constant: f64,
    ) -> Self {
        Self {
            min_temperature,
            max_temperature,
            correlation,
            enthalpy_constant,
            entropy_constant,
        }
    }

    /// Builds a record from the seven coefficients of one range of a NASA-7
    /// polynomial.
    pub fn nasa7(min_temperature: f64, max_temperature: f64, coefficients: [f64; 7]) -> Self {
        let [a1, a2, a3, a4, a5, b1, b2] = coefficients;
        let terms = vec![
            PolyTerm::new(a1, 0.0),
            PolyTerm::new(a2, 1.0),
            PolyTerm::new(a3, 2.0),
            PolyTerm::new(a4, 3.0),
            PolyTerm::new(a5, 4.0),
        ];
        Self::new(
            min_temperature,
            max_temperature,
            Correlation::Polynomial { terms },
            b1,
            b2,
        )
    }
}

/// One temperature range of a vapor pressure correlation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VaporPressureRecord {
    pub min_temperature: f64,
    pub max_temperature: f64,
    pub correlation: Correlation,
}

impl VaporPressureRecord {
    pub fn new(min_temperature: f64, max_temperature: f64, correlation: Correlation) -> Self {
        Self {
            min_temperature,
            max_temperature,
            correlation,
        }
    }
}

/// All data of a single species, as stored in a database file.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SpeciesRecord {
    pub name: String,
    pub composition: Composition,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub molarweight: Option<f64>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub phases: IndexMap<String, Vec<PropertyRecord>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub vapor_pressure: Vec<VaporPressureRecord>,
}

impl SpeciesRecord {
    pub fn new(name: &str, composition: Composition, molarweight: Option<f64>) -> Self {
        Self {
            name: name.to_owned(),
            composition,
            molarweight,
            phases: IndexMap::new(),
            vapor_pressure: Vec::new(),
        }
    }
}

/// Top level structure of a species database file.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DatabaseRecord {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub elements: Vec<ElementRecord>,
    pub species: Vec<SpeciesRecord>,
}
