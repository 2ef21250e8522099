use crate::errors::DataError;
use num_dual::DualNum;
use serde::{Deserialize, Serialize};
use std::f64::consts::LN_10;

/// A single `c * T^e` term of a polynomial correlation.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PolyTerm {
    pub coefficient: f64,
    pub exponent: f64,
}

impl PolyTerm {
    pub fn new(coefficient: f64, exponent: f64) -> Self {
        Self {
            coefficient,
            exponent,
        }
    }
}

/// Correlation forms for temperature dependent property records.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Correlation {
    /// A polynomial with arbitrary real exponents, `f(T) = sum(c_i * T^e_i)`.
    ///
    /// Heat capacity records store `cp/R` in this form, with the NASA
    /// polynomials as the most common special case.
    Polynomial { terms: Vec<PolyTerm> },
    /// The Antoine vapor pressure correlation `p = 10^(a - b / (T + c))`
    /// with `p` in bar and `T` in K.
    Antoine { a: f64, b: f64, c: f64 },
}

impl Correlation {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Polynomial { .. } => "Polynomial",
            Self::Antoine { .. } => "Antoine",
        }
    }

    /// Antiderivatives are only available for polynomial correlations.
    pub fn is_integrable(&self) -> bool {
        matches!(self, Self::Polynomial { .. })
    }

    /// Evaluates the correlation at the given temperature. Antoine
    /// correlations return the vapor pressure in Pa.
    pub fn evaluate<D: DualNum<f64> + Copy>(&self, temperature: D) -> D {
        match self {
            Self::Polynomial { terms } => terms.iter().fold(D::zero(), |acc, t| {
                acc + temperature.powf(t.exponent) * t.coefficient
            }),
            Self::Antoine { a, b, c } => {
                let exponent = -((temperature + *c).recip() * *b) + *a;
                (exponent * LN_10).exp() * 1e5
            }
        }
    }

    /// Evaluates the antiderivative `int f(T) dT` without integration
    /// constant.
    pub fn integral<D: DualNum<f64> + Copy>(&self, temperature: D) -> Result<D, DataError> {
        match self {
            Self::Polynomial { terms } => Ok(terms.iter().fold(D::zero(), |acc, t| {
                if t.exponent == -1.0 {
                    acc + temperature.ln() * t.coefficient
                } else {
                    acc + temperature.powf(t.exponent + 1.0) * (t.coefficient / (t.exponent + 1.0))
                }
            })),
            Self::Antoine { .. } => Err(DataError::NonIntegrable(self.name())),
        }
    }

    /// Evaluates the antiderivative `int f(T)/T dT` without integration
    /// constant.
    pub fn integral_over_t<D: DualNum<f64> + Copy>(&self, temperature: D) -> Result<D, DataError> {
        match self {
            Self::Polynomial { terms } => Ok(terms.iter().fold(D::zero(), |acc, t| {
                if t.exponent == 0.0 {
                    acc + temperature.ln() * t.coefficient
                } else {
                    acc + temperature.powf(t.exponent) * (t.coefficient / t.exponent)
                }
            })),
            Self::Antoine { .. } => Err(DataError::NonIntegrable(self.name())),
        }
    }
}
