use super::{
    mixing_entropy, solve_temperature, validate_composition, validate_positive, validate_state,
};
use crate::composition::Composition;
use crate::errors::{EquilError, EquilResult};
use crate::species::SpeciesDatabase;
use crate::RGAS;
use ndarray::Array1;
use std::sync::Arc;

/// A condensed phase with a fixed molar density.
///
/// The phase tag selects the property records, so the same model covers
/// liquids and solids. The volume `n / rho` does not change with
/// temperature or pressure, and the entropy does not depend on the
/// pressure.
#[derive(Clone, Debug)]
pub struct IncompressiblePhase {
    pub(super) db: Arc<SpeciesDatabase>,
    pub(super) phase_id: String,
    pub(super) temperature: f64,
    pub(super) pressure: f64,
    pub(super) composition: Composition,
    /// Molar density in mol/m3.
    pub(super) molar_density: f64,
}

impl IncompressiblePhase {
    pub fn new(
        db: &Arc<SpeciesDatabase>,
        phase_id: &str,
        composition: Composition,
        temperature: f64,
        pressure: f64,
        molar_density: f64,
    ) -> EquilResult<Self> {
        validate_state("IncompressiblePhase", temperature, pressure)?;
        validate_composition("IncompressiblePhase", &composition)?;
        validate_positive("IncompressiblePhase", "molar density", molar_density)?;
        Ok(Self {
            db: db.clone(),
            phase_id: phase_id.to_owned(),
            temperature,
            pressure,
            composition,
            molar_density,
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
        &self.phase_id
    }

    /// The molar density in mol/m3.
    pub fn molar_density(&self) -> f64 {
        self.molar_density
    }

    pub fn set_molar_density(&mut self, molar_density: f64) -> EquilResult<()> {
        validate_positive("set_molar_density", "molar density", molar_density)?;
        self.molar_density = molar_density;
        Ok(())
    }

    pub(super) fn heat_capacity_at(&self, temperature: f64) -> EquilResult<f64> {
        let mut cp = 0.0;
        for (species, n) in self.composition.iter() {
            cp += n * self.db.heat_capacity(species, &self.phase_id, temperature)?;
        }
        Ok(cp)
    }

    pub(super) fn enthalpy_at(&self, temperature: f64) -> EquilResult<f64> {
        let mut h = 0.0;
        for (species, n) in self.composition.iter() {
            h += n * self.db.enthalpy(species, &self.phase_id, temperature)?;
        }
        Ok(h)
    }

    pub fn heat_capacity(&self) -> EquilResult<f64> {
        self.heat_capacity_at(self.temperature)
    }

    pub fn enthalpy(&self) -> EquilResult<f64> {
        self.enthalpy_at(self.temperature)
    }

    /// The entropy in J/K, including the entropy of mixing.
    pub fn entropy(&self) -> EquilResult<f64> {
        let mut s = 0.0;
        for (species, n) in self.composition.iter() {
            s += n * self.db.entropy(species, &self.phase_id, self.temperature)?;
        }
        Ok(s + mixing_entropy(&self.composition))
    }

    /// The volume `n / rho` in m3.
    pub fn volume(&self) -> f64 {
        self.composition.total() / self.molar_density
    }

    /// The chemical potentials `mu_i = g_i + R T ln(n_i / n)` in J/mol, in
    /// composition order.
    pub fn chemical_potential(&self) -> EquilResult<Array1<f64>> {
        let n = self.composition.total();
        if n == 0.0 {
            return Err(EquilError::ZeroTotalComposition);
        }
        let mut mu = Vec::with_capacity(self.composition.len());
        for (species, ni) in self.composition.iter() {
            let g = self.db.gibbs_energy(species, &self.phase_id, self.temperature)?;
            let mixing = if ni > 0.0 {
                RGAS * self.temperature * (ni / n).ln()
            } else {
                f64::NEG_INFINITY
            };
            mu.push(g + mixing);
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

    /// Adjusts the temperature so that `u = h - p v` matches the given
    /// value in J. The volume is constant, so the slope is `cp`.
    pub fn set_internal_energy(&mut self, internal_energy: f64) -> EquilResult<()> {
        let pv = self.pressure * self.volume();
        let t = solve_temperature(
            |t| Ok(self.enthalpy_at(t)? - pv - internal_energy),
            |t| self.heat_capacity_at(t),
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

    /// Combines two incompressible phases adiabatically. The molar density
    /// of the result follows from the added volumes before the temperature
    /// is solved.
    pub fn mix(&self, other: &Self) -> EquilResult<Self> {
        if self.phase_id != other.phase_id {
            return Err(EquilError::PhaseMismatch(
                format!("incompressible ({})", self.phase_id),
                format!("incompressible ({})", other.phase_id),
            ));
        }
        let enthalpy = self.enthalpy_at(self.temperature)? + other.enthalpy_at(other.temperature)?;
        let composition = &self.composition + &other.composition;
        let molar_density = composition.total() / (self.volume() + other.volume());
        let mut mixed = Self::new(
            &self.db,
            &self.phase_id,
            composition,
            0.5 * (self.temperature + other.temperature),
            self.pressure.min(other.pressure),
            molar_density,
        )?;
        mixed.set_enthalpy(enthalpy)?;
        Ok(mixed)
    }
}
