use super::{mixing_entropy, solve_temperature, validate_composition, validate_state};
use crate::composition::Composition;
use crate::errors::{EquilError, EquilResult};
use crate::species::{SpeciesDatabase, GAS_PHASE};
use crate::{P0, RGAS};
use ndarray::Array1;
use std::sync::Arc;

/// A mixture of ideal gases.
///
/// Species properties are looked up in the database under the
/// [`GAS_PHASE`] tag. The equation of state is `p v = n R T` and mixing
/// is ideal.
#[derive(Clone, Debug)]
pub struct IdealGasPhase {
    pub(super) db: Arc<SpeciesDatabase>,
    pub(super) temperature: f64,
    pub(super) pressure: f64,
    pub(super) composition: Composition,
}

impl IdealGasPhase {
    pub fn new(
        db: &Arc<SpeciesDatabase>,
        composition: Composition,
        temperature: f64,
        pressure: f64,
    ) -> EquilResult<Self> {
        validate_state("IdealGasPhase", temperature, pressure)?;
        validate_composition("IdealGasPhase", &composition)?;
        Ok(Self {
            db: db.clone(),
            temperature,
            pressure,
            composition,
        })
    }

    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    pub fn pressure(&self) -> f64 {
        self.pressure
    }

    pub fn composition(&self) -> &Composition {
        &self.composition
    }

    pub fn phase_id(&self) -> &str {
        GAS_PHASE
    }

    pub(super) fn heat_capacity_at(&self, temperature: f64) -> EquilResult<f64> {
        let mut cp = 0.0;
        for (species, n) in self.composition.iter() {
            cp += n * self.db.heat_capacity(species, GAS_PHASE, temperature)?;
        }
        Ok(cp)
    }

    pub(super) fn enthalpy_at(&self, temperature: f64) -> EquilResult<f64> {
        let mut h = 0.0;
        for (species, n) in self.composition.iter() {
            h += n * self.db.enthalpy(species, GAS_PHASE, temperature)?;
        }
        Ok(h)
    }

    pub fn heat_capacity(&self) -> EquilResult<f64> {
        self.heat_capacity_at(self.temperature)
    }

    pub fn enthalpy(&self) -> EquilResult<f64> {
        self.enthalpy_at(self.temperature)
    }

    /// The entropy in J/K, including the entropy of mixing and the pressure
    /// dependence `-n R ln(p / p0)`.
    pub fn entropy(&self) -> EquilResult<f64> {
        let mut s = 0.0;
        for (species, n) in self.composition.iter() {
            s += n * self.db.entropy(species, GAS_PHASE, self.temperature)?;
        }
        let n = self.composition.total();
        Ok(s + mixing_entropy(&self.composition) - RGAS * n * (self.pressure / P0).ln())
    }

    /// The volume `n R T / p` in m3.
    pub fn volume(&self) -> f64 {
        self.composition.total() * RGAS * self.temperature / self.pressure
    }

    /// The chemical potentials `mu_i = g_i + R T ln(n_i p / (n p0))` in
    /// J/mol, in composition order.
    pub fn chemical_potential(&self) -> EquilResult<Array1<f64>> {
        let n = self.composition.total();
        if n == 0.0 {
            return Err(EquilError::ZeroTotalComposition);
        }
        let pressure_term = RGAS * self.temperature * (self.pressure / P0).ln();
        let mut mu = Vec::with_capacity(self.composition.len());
        for (species, ni) in self.composition.iter() {
            let g = self.db.gibbs_energy(species, GAS_PHASE, self.temperature)?;
            let mixing = if ni > 0.0 {
                RGAS * self.temperature * (ni / n).ln()
            } else {
                f64::NEG_INFINITY
            };
            mu.push(g + mixing + pressure_term);
        }
        Ok(Array1::from_vec(mu))
    }

    pub fn set_enthalpy(&mut self, enthalpy: f64) -> EquilResult<()> {
        let t = solve_temperature(
            |t| Ok(self.enthalpy_at(t)? - enthalpy),
            |t| self.heat_capacity_at(t),
            self.temperature,
            "set_enthalpy",
        )?;
        self.temperature = t;
        Ok(())
    }

    /// Adjusts the temperature so that `u = h - n R T` matches the given
    /// value in J. The slope of the residual is `cv = cp - n R`.
    pub fn set_internal_energy(&mut self, internal_energy: f64) -> EquilResult<()> {
        let n = self.composition.total();
        let t = solve_temperature(
            |t| Ok(self.enthalpy_at(t)? - n * RGAS * t - internal_energy),
            |t| Ok(self.heat_capacity_at(t)? - n * RGAS),
            self.temperature,
            "set_internal_energy",
        )?;
        self.temperature = t;
        Ok(())
    }

    pub fn with_composition(&self, composition: Composition) -> Self {
        Self {
            composition,
            ..self.clone()
        }
    }

    /// Combines two ideal gas phases adiabatically.
    pub fn mix(&self, other: &Self) -> EquilResult<Self> {
        let enthalpy = self.enthalpy_at(self.temperature)? + other.enthalpy_at(other.temperature)?;
        let mut mixed = Self::new(
            &self.db,
            &self.composition + &other.composition,
            0.5 * (self.temperature + other.temperature),
            self.pressure.min(other.pressure),
        )?;
        mixed.set_enthalpy(enthalpy)?;
        Ok(mixed)
    }
}
