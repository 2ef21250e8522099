//! Homogeneous phases and their thermodynamic properties.
//!
//! All properties are extensive and in SI units (J, J/K, m3). Enthalpies
//! are referenced to the elements at 298.15 K, so reaction enthalpies
//! follow directly from differences.
use crate::composition::Composition;
use crate::errors::{EquilError, EquilResult};
use crate::species::SpeciesDatabase;
use crate::RGAS;
use ndarray::Array1;
use std::fmt;
use std::sync::Arc;

mod ideal_gas;
mod incompressible;
pub use ideal_gas::IdealGasPhase;
pub use incompressible::IncompressiblePhase;

const MAX_ITER_T: usize = 50;
const TOL_T: f64 = 1e-10;

fn validate_positive(context: &str, quantity: &str, value: f64) -> EquilResult<()> {
    if !value.is_finite() || value <= 0.0 {
        return Err(EquilError::InvalidState(
            context.to_owned(),
            quantity.to_owned(),
            value,
        ));
    }
    Ok(())
}

fn validate_state(context: &str, temperature: f64, pressure: f64) -> EquilResult<()> {
    validate_positive(context, "temperature", temperature)?;
    validate_positive(context, "pressure", pressure)
}

fn validate_composition(context: &str, composition: &Composition) -> EquilResult<()> {
    for (species, amount) in composition.iter() {
        if !amount.is_finite() || amount < 0.0 {
            return Err(EquilError::InvalidState(
                context.to_owned(),
                format!("amount of {}", species),
                amount,
            ));
        }
    }
    Ok(())
}

/// The ideal entropy of mixing `-R sum(n_i ln(n_i / n))` in J/K. Species
/// with zero amounts do not contribute.
fn mixing_entropy(composition: &Composition) -> f64 {
    let n = composition.total();
    if n == 0.0 {
        return 0.0;
    }
    -RGAS
        * composition
            .iter()
            .filter(|&(_, ni)| ni > 0.0)
            .map(|(_, ni)| ni * (ni / n).ln())
            .sum::<f64>()
}

/// Solves `residual(T) = 0` for the temperature with Newton's method. The
/// slope is the derivative of the residual, a heat capacity for the energy
/// balances solved here, and therefore has to be positive.
fn solve_temperature<F, G>(
    mut residual: F,
    mut slope: G,
    t0: f64,
    label: &str,
) -> EquilResult<f64>
where
    F: FnMut(f64) -> EquilResult<f64>,
    G: FnMut(f64) -> EquilResult<f64>,
{
    let mut t = t0;
    for _ in 0..MAX_ITER_T {
        let res = residual(t)?;
        let heat_capacity = slope(t)?;
        if !heat_capacity.is_finite() || heat_capacity <= 0.0 {
            return Err(EquilError::InvalidState(
                label.to_owned(),
                "heat capacity".to_owned(),
                heat_capacity,
            ));
        }
        let mut delta = res / heat_capacity;
        // reduce step if necessary; this keeps the temperature positive
        // and within reach of the property data
        if delta.abs() > 0.5 * t {
            delta *= 0.5 * t / delta.abs();
        }
        t -= delta;
        if delta.abs() < TOL_T * t {
            return Ok(t);
        }
    }
    Err(EquilError::NotConverged(label.to_owned()))
}

/// Adjusts the common temperature of a set of phases so that their total
/// enthalpy matches the given value in J.
pub(crate) fn set_phases_enthalpy(phases: &mut [Phase], enthalpy: f64) -> EquilResult<()> {
    let t0 = match phases.first() {
        Some(phase) => phase.temperature(),
        None => {
            return Err(EquilError::InvalidState(
                "set_enthalpy".to_owned(),
                "number of phases".to_owned(),
                0.0,
            ))
        }
    };
    let t = solve_temperature(
        |t| {
            Ok(phases
                .iter()
                .map(|p| p.enthalpy_at(t))
                .sum::<EquilResult<f64>>()?
                - enthalpy)
        },
        |t| phases.iter().map(|p| p.heat_capacity_at(t)).sum(),
        t0,
        "set_enthalpy",
    )?;
    for phase in phases.iter_mut() {
        phase.set_temperature(t)?;
    }
    Ok(())
}

/// A homogeneous phase: an amount of matter with a single temperature,
/// pressure and composition, whose properties follow one of the available
/// phase models.
#[derive(Clone, Debug)]
pub enum Phase {
    IdealGas(IdealGasPhase),
    Incompressible(IncompressiblePhase),
}

impl Phase {
    pub fn temperature(&self) -> f64 {
        match self {
            Phase::IdealGas(p) => p.temperature,
            Phase::Incompressible(p) => p.temperature,
        }
    }

    pub fn pressure(&self) -> f64 {
        match self {
            Phase::IdealGas(p) => p.pressure,
            Phase::Incompressible(p) => p.pressure,
        }
    }

    pub fn composition(&self) -> &Composition {
        match self {
            Phase::IdealGas(p) => &p.composition,
            Phase::Incompressible(p) => &p.composition,
        }
    }

    /// The total amount in mol.
    pub fn total_moles(&self) -> f64 {
        self.composition().total()
    }

    /// The phase tag under which property records are looked up.
    pub fn phase_id(&self) -> &str {
        match self {
            Phase::IdealGas(p) => p.phase_id(),
            Phase::Incompressible(p) => p.phase_id(),
        }
    }

    pub(crate) fn db(&self) -> &Arc<SpeciesDatabase> {
        match self {
            Phase::IdealGas(p) => &p.db,
            Phase::Incompressible(p) => &p.db,
        }
    }

    fn kind(&self) -> String {
        match self {
            Phase::IdealGas(_) => "ideal gas".to_owned(),
            Phase::Incompressible(p) => format!("incompressible ({})", p.phase_id()),
        }
    }

    /// The heat capacity at constant pressure in J/K.
    pub fn heat_capacity(&self) -> EquilResult<f64> {
        self.heat_capacity_at(self.temperature())
    }

    /// The enthalpy in J, referenced to the elements at 298.15 K.
    pub fn enthalpy(&self) -> EquilResult<f64> {
        self.enthalpy_at(self.temperature())
    }

    /// The entropy in J/K, including the ideal entropy of mixing.
    pub fn entropy(&self) -> EquilResult<f64> {
        match self {
            Phase::IdealGas(p) => p.entropy(),
            Phase::Incompressible(p) => p.entropy(),
        }
    }

    /// The Gibbs energy `h - T s` in J.
    pub fn gibbs_energy(&self) -> EquilResult<f64> {
        Ok(self.enthalpy()? - self.temperature() * self.entropy()?)
    }

    /// The Helmholtz energy `g - p v` in J.
    pub fn helmholtz_energy(&self) -> EquilResult<f64> {
        Ok(self.gibbs_energy()? - self.pressure() * self.volume())
    }

    /// The internal energy `h - p v` in J.
    pub fn internal_energy(&self) -> EquilResult<f64> {
        Ok(self.enthalpy()? - self.pressure() * self.volume())
    }

    /// The volume in m3.
    pub fn volume(&self) -> f64 {
        match self {
            Phase::IdealGas(p) => p.volume(),
            Phase::Incompressible(p) => p.volume(),
        }
    }

    /// The chemical potentials of all species in the composition in J/mol,
    /// in composition order. Species with zero amounts yield `-inf`.
    pub fn chemical_potential(&self) -> EquilResult<Array1<f64>> {
        match self {
            Phase::IdealGas(p) => p.chemical_potential(),
            Phase::Incompressible(p) => p.chemical_potential(),
        }
    }

    pub(crate) fn enthalpy_at(&self, temperature: f64) -> EquilResult<f64> {
        match self {
            Phase::IdealGas(p) => p.enthalpy_at(temperature),
            Phase::Incompressible(p) => p.enthalpy_at(temperature),
        }
    }

    pub(crate) fn heat_capacity_at(&self, temperature: f64) -> EquilResult<f64> {
        match self {
            Phase::IdealGas(p) => p.heat_capacity_at(temperature),
            Phase::Incompressible(p) => p.heat_capacity_at(temperature),
        }
    }

    pub fn set_temperature(&mut self, temperature: f64) -> EquilResult<()> {
        validate_positive("set_temperature", "temperature", temperature)?;
        match self {
            Phase::IdealGas(p) => p.temperature = temperature,
            Phase::Incompressible(p) => p.temperature = temperature,
        }
        Ok(())
    }

    pub fn set_pressure(&mut self, pressure: f64) -> EquilResult<()> {
        validate_positive("set_pressure", "pressure", pressure)?;
        match self {
            Phase::IdealGas(p) => p.pressure = pressure,
            Phase::Incompressible(p) => p.pressure = pressure,
        }
        Ok(())
    }

    /// Adjusts the temperature so that the enthalpy matches the given value
    /// in J.
    pub fn set_enthalpy(&mut self, enthalpy: f64) -> EquilResult<()> {
        match self {
            Phase::IdealGas(p) => p.set_enthalpy(enthalpy),
            Phase::Incompressible(p) => p.set_enthalpy(enthalpy),
        }
    }

    /// Adjusts the temperature so that the internal energy matches the
    /// given value in J. The pressure is kept fixed.
    pub fn set_internal_energy(&mut self, internal_energy: f64) -> EquilResult<()> {
        match self {
            Phase::IdealGas(p) => p.set_internal_energy(internal_energy),
            Phase::Incompressible(p) => p.set_internal_energy(internal_energy),
        }
    }

    /// The same phase with a different composition.
    pub fn with_composition(&self, composition: Composition) -> Phase {
        match self {
            Phase::IdealGas(p) => Phase::IdealGas(p.with_composition(composition)),
            Phase::Incompressible(p) => Phase::Incompressible(p.with_composition(composition)),
        }
    }

    /// Combines two phases of the same model into one.
    ///
    /// The compositions are added, the lower of the two pressures is kept
    /// and the temperature follows from the total enthalpy, so mixing is
    /// adiabatic.
    pub fn mix(&self, other: &Phase) -> EquilResult<Phase> {
        match (self, other) {
            (Phase::IdealGas(a), Phase::IdealGas(b)) => a.mix(b).map(Phase::IdealGas),
            (Phase::Incompressible(a), Phase::Incompressible(b)) => {
                a.mix(b).map(Phase::Incompressible)
            }
            _ => Err(EquilError::PhaseMismatch(self.kind(), other.kind())),
        }
    }
}

impl From<IdealGasPhase> for Phase {
    fn from(phase: IdealGasPhase) -> Self {
        Phase::IdealGas(phase)
    }
}

impl From<IncompressiblePhase> for Phase {
    fn from(phase: IncompressiblePhase) -> Self {
        Phase::Incompressible(phase)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::IdealGas(p) => write!(
                f,
                "<IdealGasPhase: {:.6} mol, {:.6} K, {:.6} bar, {}>",
                p.composition.total(),
                p.temperature,
                p.pressure / 1e5,
                p.composition
            ),
            Phase::Incompressible(p) => write!(
                f,
                "<IncompressiblePhase ({}): {:.6} mol, {:.6} K, {:.6} bar, {}>",
                p.phase_id(),
                p.composition.total(),
                p.temperature,
                p.pressure / 1e5,
                p.composition
            ),
        }
    }
}
