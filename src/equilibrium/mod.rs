//! Multi-phase chemical and phase equilibrium.
//!
//! Equilibrium compositions minimize the total Gibbs energy (constant
//! pressure) or Helmholtz energy (constant volume) of a set of phases,
//! subject to conservation constraints and non-negative amounts. An outer
//! loop couples the minimization to an energy balance when no temperature
//! is imposed.
use crate::composition::Composition;
use crate::errors::{EquilError, EquilResult};
use crate::phase::{set_phases_enthalpy, Phase};
use crate::{P0, RGAS};
use indexmap::IndexSet;
use ndarray::{Array1, Array2};

mod minimizer;
use minimizer::{minimize, Objective};

/// Maximum number of outer energy balance iterations.
const MAX_ITER_ENERGY: usize = 10;
/// Relative temperature change between outer iterations at convergence.
const TOL_ENERGY: f64 = 1e-4;

/// Level of detail in the iteration output.
#[derive(Copy, Clone, PartialOrd, PartialEq, Eq)]
pub enum Verbosity {
    /// Do not print output.
    None,
    /// Print information about the success or failure of the iteration.
    Result,
    /// Print a detailed output for every iteration.
    Iter,
}

impl Default for Verbosity {
    fn default() -> Self {
        Self::None
    }
}

/// Options for the equilibrium solvers.
///
/// If the values are [None], solver specific default values are used.
/// `max_iter` and `tol` apply to the inner minimization; the outer energy
/// balance uses fixed settings.
#[derive(Copy, Clone, Default)]
pub struct SolverOptions {
    /// Maximum number of iterations.
    pub max_iter: Option<usize>,
    /// Tolerance.
    pub tol: Option<f64>,
    /// Iteration output indicated by the [Verbosity] enum.
    pub verbosity: Verbosity,
}

impl From<(Option<usize>, Option<f64>, Option<Verbosity>)> for SolverOptions {
    fn from(options: (Option<usize>, Option<f64>, Option<Verbosity>)) -> Self {
        Self {
            max_iter: options.0,
            tol: options.1,
            verbosity: options.2.unwrap_or(Verbosity::None),
        }
    }
}

impl SolverOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = Some(max_iter);
        self
    }

    pub fn tol(mut self, tol: f64) -> Self {
        self.tol = Some(tol);
        self
    }

    pub fn verbosity(mut self, verbosity: Verbosity) -> Self {
        self.verbosity = verbosity;
        self
    }

    pub fn unwrap_or(self, max_iter: usize, tol: f64) -> (usize, f64, Verbosity) {
        (
            self.max_iter.unwrap_or(max_iter),
            self.tol.unwrap_or(tol),
            self.verbosity,
        )
    }
}

/// The mechanical constraint under which an equilibrium is solved.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MechanicalConstraint {
    /// Every phase keeps its pressure.
    ConstantPressure,
    /// The system keeps the volume of the input. Restricted to a single
    /// ideal gas phase, whose pressure follows from the equation of state.
    ConstantVolume,
}

/// The thermal constraint under which an equilibrium is solved.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ThermalConstraint {
    /// All phases stay at the temperature of the input, which must be
    /// uniform.
    ConstantTemperature,
    /// The common temperature is solved so that the total enthalpy
    /// (constant pressure) or internal energy (constant volume) of the
    /// input is conserved.
    EnergyBalance,
}

/// The quantities conserved by an equilibrium solve.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Conservation {
    /// Elemental amounts are conserved and species may interconvert.
    Elements,
    /// Per-species amounts are conserved and species only redistribute
    /// between phases.
    Species,
}

/// Brings a set of phases into thermodynamic equilibrium.
///
/// The amounts of all species already present in the phase compositions,
/// including explicit zero entries, are varied to minimize the total Gibbs
/// energy (constant pressure) or Helmholtz energy (constant volume) under
/// the chosen conservation constraints. The returned phases are in the
/// same order as the input.
pub fn find_equilibrium(
    phases: Vec<Phase>,
    mechanical: MechanicalConstraint,
    thermal: ThermalConstraint,
    conservation: Conservation,
    options: SolverOptions,
) -> EquilResult<Vec<Phase>> {
    if phases.is_empty() {
        return Err(EquilError::InvalidState(
            "find_equilibrium".to_owned(),
            "number of phases".to_owned(),
            0.0,
        ));
    }
    if mechanical == MechanicalConstraint::ConstantVolume
        && !(phases.len() == 1 && matches!(phases[0], Phase::IdealGas(_)))
    {
        return Err(EquilError::InvalidState(
            "find_equilibrium".to_owned(),
            "number of gas phases for a constant volume solve".to_owned(),
            phases.len() as f64,
        ));
    }
    match thermal {
        ThermalConstraint::ConstantTemperature => {
            let temperature = uniform_temperature(&phases)?;
            isothermal_equilibrium(phases, temperature, mechanical, conservation, options)
        }
        ThermalConstraint::EnergyBalance => {
            energy_balance_equilibrium(phases, mechanical, conservation, options)
        }
    }
}

/// Lets a single phase react towards chemical equilibrium.
///
/// Candidate products that are missing from the composition are inserted
/// with zero amounts before the solve, so they can form from the elements
/// of the feed. Conservation is always elemental.
pub fn react(
    phase: Phase,
    candidate_products: &[&str],
    mechanical: MechanicalConstraint,
    thermal: ThermalConstraint,
    options: SolverOptions,
) -> EquilResult<Phase> {
    let mut composition = phase.composition().clone();
    for product in candidate_products {
        if !phase.db().has_species(product) {
            return Err(EquilError::UnknownSpecies((*product).to_owned()));
        }
        if !composition.contains(product) {
            composition.set(product, 0.0);
        }
    }
    let phases = find_equilibrium(
        vec![phase.with_composition(composition)],
        mechanical,
        thermal,
        Conservation::Elements,
        options,
    )?;
    // find_equilibrium preserves the number of phases
    Ok(phases.into_iter().next().unwrap())
}

fn uniform_temperature(phases: &[Phase]) -> EquilResult<f64> {
    let temperature = phases[0].temperature();
    for phase in phases {
        if ((phase.temperature() - temperature) / temperature).abs() > 1e-12 {
            return Err(EquilError::InvalidState(
                "find_equilibrium".to_owned(),
                "temperature spread between phases".to_owned(),
                phase.temperature() - temperature,
            ));
        }
    }
    Ok(temperature)
}

/// Solves the equilibrium at a fixed temperature.
fn isothermal_equilibrium(
    mut phases: Vec<Phase>,
    temperature: f64,
    mechanical: MechanicalConstraint,
    conservation: Conservation,
    options: SolverOptions,
) -> EquilResult<Vec<Phase>> {
    for phase in &mut phases {
        phase.set_temperature(temperature)?;
    }
    let rt = RGAS * temperature;
    // the volume a constant volume solve conserves, fixed by the input
    let v0 = phases[0].volume();

    // one variable per species per phase, grouped by phase, with the
    // conservation coefficients of each variable
    let mut keys: IndexSet<String> = IndexSet::new();
    let mut var_phase = Vec::new();
    let mut var_species: Vec<String> = Vec::new();
    let mut var_amount = Vec::new();
    let mut var_coeffs: Vec<Vec<(usize, f64)>> = Vec::new();
    for (p, phase) in phases.iter().enumerate() {
        for (species, amount) in phase.composition().iter() {
            let coeffs = match conservation {
                Conservation::Elements => phase
                    .db()
                    .elemental_composition(species)?
                    .iter()
                    .map(|(element, count)| (keys.insert_full(element.to_owned()).0, count))
                    .collect(),
                Conservation::Species => vec![(keys.insert_full(species.to_owned()).0, 1.0)],
            };
            var_phase.push(p);
            var_species.push(species.to_owned());
            var_amount.push(amount);
            var_coeffs.push(coeffs);
        }
    }

    // conservation targets from the input amounts
    let mut b_full = vec![0.0; keys.len()];
    for (coeffs, amount) in var_coeffs.iter().zip(&var_amount) {
        for &(k, c) in coeffs {
            b_full[k] += c * amount;
        }
    }

    // a zero target pins every variable that would contribute to it;
    // rows where coefficients of both signs can cancel, like the net
    // charge of a neutral feed, stay as constraints instead
    let mut has_positive = vec![false; keys.len()];
    let mut has_negative = vec![false; keys.len()];
    for coeffs in &var_coeffs {
        for &(k, c) in coeffs {
            if c > 0.0 {
                has_positive[k] = true;
            } else if c < 0.0 {
                has_negative[k] = true;
            }
        }
    }
    let pinned: Vec<bool> = b_full
        .iter()
        .enumerate()
        .map(|(k, &bk)| bk == 0.0 && !(has_positive[k] && has_negative[k]))
        .collect();
    let kept: Vec<usize> = (0..var_species.len())
        .filter(|&i| var_coeffs[i].iter().all(|&(k, c)| c == 0.0 || !pinned[k]))
        .collect();
    if kept.is_empty() {
        return Err(EquilError::InvalidState(
            "isothermal_equilibrium".to_owned(),
            "total amount".to_owned(),
            0.0,
        ));
    }
    let mut key_map = vec![usize::MAX; keys.len()];
    let mut nc = 0;
    for (k, &is_pinned) in pinned.iter().enumerate() {
        if !is_pinned {
            key_map[k] = nc;
            nc += 1;
        }
    }

    let nv = kept.len();
    let mut a = Array2::zeros((nc, nv));
    let mut x0 = Array1::zeros(nv);
    let mut b = Array1::zeros(nc);
    let mut min_coeff = f64::INFINITY;
    for (i, &var) in kept.iter().enumerate() {
        x0[i] = var_amount[var];
        for &(k, c) in &var_coeffs[var] {
            if c != 0.0 {
                a[(key_map[k], i)] = c;
            }
            if c > 0.0 {
                min_coeff = min_coeff.min(c);
            }
        }
    }
    for (k, &is_pinned) in pinned.iter().enumerate() {
        if !is_pinned {
            b[key_map[k]] = b_full[k];
        }
    }
    // every variable is bounded by the total conserved amount; formula
    // coefficients below one stretch the bound accordingly and negative
    // coefficients, as carried by cations, stay out of it
    let upper = b.mapv(f64::abs).sum() / min_coeff.min(1.0);

    // contiguous variable ranges per phase
    let mut blocks = Vec::with_capacity(phases.len());
    let mut offset = 0;
    for p in 0..phases.len() {
        let start = offset;
        while offset < nv && var_phase[kept[offset]] == p {
            offset += 1;
        }
        blocks.push(start..offset);
    }

    // standard chemical potentials, evaluated once per solve
    let mut mu0 = Vec::with_capacity(nv);
    for &var in &kept {
        let phase = &phases[var_phase[var]];
        mu0.push(
            phase
                .db()
                .gibbs_energy(&var_species[var], phase.phase_id(), temperature)?,
        );
    }

    let pressures: Vec<f64> = phases.iter().map(|p| p.pressure()).collect();
    let gas: Vec<bool> = phases
        .iter()
        .map(|p| matches!(p, Phase::IdealGas(_)))
        .collect();

    // the objective is made dimensionless with the energy of the input
    let mut initial = 0.0;
    for phase in &phases {
        initial += match mechanical {
            MechanicalConstraint::ConstantPressure => phase.gibbs_energy()?,
            MechanicalConstraint::ConstantVolume => phase.helmholtz_energy()?,
        };
    }
    let scale = 1.0 / initial.abs().max(1.0);

    let objective = |x: &Array1<f64>| -> EquilResult<Objective> {
        let mut value = 0.0;
        let mut gradient = Array1::zeros(nv);
        let mut hessian = Array2::zeros((nv, nv));
        for (p, block) in blocks.iter().enumerate() {
            if block.is_empty() {
                continue;
            }
            let n: f64 = block.clone().map(|i| x[i]).sum();
            match mechanical {
                MechanicalConstraint::ConstantPressure => {
                    let ln_p = if gas[p] { (pressures[p] / P0).ln() } else { 0.0 };
                    for i in block.clone() {
                        let mu = mu0[i] + rt * ((x[i] / n).ln() + ln_p);
                        value += x[i] * mu;
                        gradient[i] = mu;
                        for j in block.clone() {
                            hessian[(i, j)] = -rt / n;
                        }
                        hessian[(i, i)] += rt / x[i];
                    }
                }
                MechanicalConstraint::ConstantVolume => {
                    // Helmholtz energy with the ideal gas pressure at the
                    // conserved volume, p = n R T / v0
                    for i in block.clone() {
                        let mu = mu0[i] + rt * (x[i] * rt / (v0 * P0)).ln();
                        value += x[i] * mu;
                        gradient[i] = mu;
                        hessian[(i, i)] = rt / x[i];
                    }
                    value -= n * rt;
                }
            }
        }
        Ok(Objective {
            value: value * scale,
            gradient: gradient * scale,
            hessian: hessian * scale,
        })
    };

    let x = minimize(objective, &a, &b, &x0, upper, options)?;

    // write the solution back; pinned species keep their zero amounts
    let mut result = Vec::with_capacity(phases.len());
    for (p, phase) in phases.iter().enumerate() {
        let mut composition = Composition::new();
        for species in phase.composition().keys() {
            composition.set(species, 0.0);
        }
        for i in blocks[p].clone() {
            composition.set(&var_species[kept[i]], x[i]);
        }
        let mut equilibrated = phase.with_composition(composition);
        if mechanical == MechanicalConstraint::ConstantVolume {
            let pressure = equilibrated.total_moles() * rt / v0;
            equilibrated.set_pressure(pressure)?;
        }
        result.push(equilibrated);
    }
    Ok(result)
}

/// Couples the isothermal equilibrium to an energy balance.
///
/// Each iteration equilibrates the phases at the current temperature and
/// then solves the temperature at which the input enthalpy (constant
/// pressure) or internal energy (constant volume) is recovered, until the
/// temperature settles.
fn energy_balance_equilibrium(
    mut phases: Vec<Phase>,
    mechanical: MechanicalConstraint,
    conservation: Conservation,
    options: SolverOptions,
) -> EquilResult<Vec<Phase>> {
    let verbosity = options.verbosity;

    // the conserved energy, evaluated at the individual input temperatures
    let mut target = 0.0;
    for phase in &phases {
        target += match mechanical {
            MechanicalConstraint::ConstantPressure => phase.enthalpy()?,
            MechanicalConstraint::ConstantVolume => phase.internal_energy()?,
        };
    }

    // mole weighted average temperature as the starting estimate
    let total: f64 = phases.iter().map(|p| p.total_moles()).sum();
    if total == 0.0 {
        return Err(EquilError::InvalidState(
            "energy balance".to_owned(),
            "total amount".to_owned(),
            0.0,
        ));
    }
    let mut temperature = phases
        .iter()
        .map(|p| p.temperature() * p.total_moles())
        .sum::<f64>()
        / total;
    for phase in &mut phases {
        phase.set_temperature(temperature)?;
    }

    log_iter!(verbosity, " iter |  temperature  |  rel. change");
    log_iter!(verbosity, "{:-<40}", "");

    for iteration in 1..=MAX_ITER_ENERGY {
        let t_old = temperature;
        let volume: f64 = phases.iter().map(|p| p.volume()).sum();
        phases = isothermal_equilibrium(phases, t_old, mechanical, conservation, options)?;
        match mechanical {
            MechanicalConstraint::ConstantPressure => set_phases_enthalpy(&mut phases, target)?,
            MechanicalConstraint::ConstantVolume => {
                // single gas phase; the pressure tracks the equation of
                // state at the conserved volume
                let phase = &mut phases[0];
                phase.set_internal_energy(target)?;
                let pressure = phase.total_moles() * RGAS * phase.temperature() / volume;
                phase.set_pressure(pressure)?;
            }
        }
        temperature = phases[0].temperature();
        let change = ((temperature - t_old) / t_old).abs();

        log_iter!(
            verbosity,
            " {:4} | {:11.5} K | {:10.4e}",
            iteration,
            temperature,
            change
        );

        if change < TOL_ENERGY {
            log_result!(
                verbosity,
                "Energy balance converged in {} step(s)\n",
                iteration
            );
            return Ok(phases);
        }
    }
    Err(EquilError::NotConverged("energy balance".to_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::correlation::{Correlation, PolyTerm};
    use crate::phase::IdealGasPhase;
    use crate::species::{PropertyRecord, SpeciesDatabase, GAS_PHASE};
    use approx::assert_relative_eq;
    use std::sync::Arc;

    /// Two isomers of N2 whose standard potentials differ by R T ln 3 at
    /// every temperature, so the equilibrium ratio is 3 : 1.
    fn isomer_db() -> Arc<SpeciesDatabase> {
        let mut db = SpeciesDatabase::new();
        for (name, entropy_constant) in [("A", 0.0), ("B", 3f64.ln())] {
            db.register_species(name, Composition::from_iter([("N", 2.0)]), None)
                .unwrap();
            db.register_phase_record(
                name,
                GAS_PHASE,
                PropertyRecord::new(
                    200.0,
                    2000.0,
                    Correlation::Polynomial {
                        terms: vec![PolyTerm::new(3.5, 0.0)],
                    },
                    0.0,
                    entropy_constant,
                ),
            )
            .unwrap();
        }
        Arc::new(db)
    }

    #[test]
    fn isomer_equilibrium() -> EquilResult<()> {
        let db = isomer_db();
        let feed = Composition::from_iter([("A", 1.0)]);
        let gas: Phase = IdealGasPhase::new(&db, feed, 500.0, 1e5)?.into();
        let g_feed = gas.gibbs_energy()?;

        let result = react(
            gas,
            &["B"],
            MechanicalConstraint::ConstantPressure,
            ThermalConstraint::ConstantTemperature,
            SolverOptions::default(),
        )?;

        assert_relative_eq!(result.composition().amount("A"), 0.25, max_relative = 1e-6);
        assert_relative_eq!(result.composition().amount("B"), 0.75, max_relative = 1e-6);
        assert_relative_eq!(result.total_moles(), 1.0, max_relative = 1e-10);
        assert!(result.gibbs_energy()? < g_feed);
        assert_relative_eq!(result.temperature(), 500.0);
        Ok(())
    }

    /// Argon with a cation and free electrons. The cation carries a
    /// negative electron count, so a neutral feed conserves the net charge
    /// on a zero-target row with coefficients of both signs.
    fn argon_plasma_db() -> Arc<SpeciesDatabase> {
        let mut db = SpeciesDatabase::new();
        let species = [
            ("Ar", vec![("Ar", 1.0)], 0.0),
            ("Ar+", vec![("Ar", 1.0), ("e-", -1.0)], 24.0),
            ("e-", vec![("e-", 1.0)], 0.0),
        ];
        for (name, elements, entropy_constant) in species {
            db.register_species(name, Composition::from_iter(elements), None)
                .unwrap();
            db.register_phase_record(
                name,
                GAS_PHASE,
                PropertyRecord::new(
                    200.0,
                    2000.0,
                    Correlation::Polynomial {
                        terms: vec![PolyTerm::new(2.5, 0.0)],
                    },
                    0.0,
                    entropy_constant,
                ),
            )
            .unwrap();
        }
        Arc::new(db)
    }

    #[test]
    fn ionization_conserves_the_charge() -> EquilResult<()> {
        // the entropy constant of the cation makes ionization all but
        // complete at 1000 K; a neutral feed has to stay neutral
        let db = argon_plasma_db();
        let feed = Composition::from_iter([("Ar", 1.0)]);
        let gas: Phase = IdealGasPhase::new(&db, feed, 1000.0, 1e5)?.into();

        let result = react(
            gas,
            &["Ar+", "e-"],
            MechanicalConstraint::ConstantPressure,
            ThermalConstraint::ConstantTemperature,
            SolverOptions::default(),
        )?;

        let products = result.composition();
        assert_relative_eq!(products.amount("Ar+"), 1.0, max_relative = 1e-6);
        assert_relative_eq!(products.amount("e-"), 1.0, max_relative = 1e-6);
        assert!(products.amount("Ar") < 1e-6);
        assert!((products.amount("e-") - products.amount("Ar+")).abs() < 1e-9);
        assert_relative_eq!(
            products.amount("Ar") + products.amount("Ar+"),
            1.0,
            max_relative = 1e-9
        );
        Ok(())
    }

    #[test]
    fn constant_volume_requires_single_gas_phase() -> EquilResult<()> {
        let db = isomer_db();
        let gas = |amount: f64| -> EquilResult<Phase> {
            Ok(
                IdealGasPhase::new(&db, Composition::from_iter([("A", amount)]), 500.0, 1e5)?
                    .into(),
            )
        };
        assert!(matches!(
            find_equilibrium(
                vec![gas(1.0)?, gas(2.0)?],
                MechanicalConstraint::ConstantVolume,
                ThermalConstraint::ConstantTemperature,
                Conservation::Elements,
                SolverOptions::default(),
            ),
            Err(EquilError::InvalidState(..))
        ));
        Ok(())
    }

    #[test]
    fn temperatures_must_be_uniform() -> EquilResult<()> {
        let db = isomer_db();
        let cold: Phase =
            IdealGasPhase::new(&db, Composition::from_iter([("A", 1.0)]), 400.0, 1e5)?.into();
        let hot: Phase =
            IdealGasPhase::new(&db, Composition::from_iter([("A", 1.0)]), 600.0, 1e5)?.into();
        assert!(matches!(
            find_equilibrium(
                vec![cold, hot],
                MechanicalConstraint::ConstantPressure,
                ThermalConstraint::ConstantTemperature,
                Conservation::Elements,
                SolverOptions::default(),
            ),
            Err(EquilError::InvalidState(..))
        ));
        Ok(())
    }

    #[test]
    fn unknown_candidate_product() -> EquilResult<()> {
        let db = isomer_db();
        let gas: Phase =
            IdealGasPhase::new(&db, Composition::from_iter([("A", 1.0)]), 500.0, 1e5)?.into();
        assert!(matches!(
            react(
                gas,
                &["C"],
                MechanicalConstraint::ConstantPressure,
                ThermalConstraint::ConstantTemperature,
                SolverOptions::default(),
            ),
            Err(EquilError::UnknownSpecies(_))
        ));
        Ok(())
    }

    #[test]
    fn empty_input_is_rejected() {
        assert!(matches!(
            find_equilibrium(
                Vec::new(),
                MechanicalConstraint::ConstantPressure,
                ThermalConstraint::ConstantTemperature,
                Conservation::Elements,
                SolverOptions::default(),
            ),
            Err(EquilError::InvalidState(..))
        ));
    }
}
