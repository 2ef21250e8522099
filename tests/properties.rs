use approx::assert_relative_eq;
use equil::species::{SpeciesDatabase, GAS_PHASE};
use equil::{Composition, EquilError, EquilResult, IdealGasPhase, Phase, RGAS, T0};
use std::sync::Arc;

fn gri() -> EquilResult<Arc<SpeciesDatabase>> {
    Ok(Arc::new(SpeciesDatabase::from_json("tests/gri_subset.json")?))
}

#[test]
fn standard_formation_enthalpies() -> EquilResult<()> {
    let db = gri()?;
    assert_relative_eq!(
        db.enthalpy("H2O", GAS_PHASE, T0)?,
        -241_826.0,
        max_relative = 1e-4
    );
    assert_relative_eq!(
        db.enthalpy("CO2", GAS_PHASE, T0)?,
        -393_510.0,
        max_relative = 1e-4
    );
    // elements in their reference state
    assert_relative_eq!(db.enthalpy("N2", GAS_PHASE, T0)?, 0.0, epsilon = 50.0);
    assert_relative_eq!(db.enthalpy("O2", GAS_PHASE, T0)?, 0.0, epsilon = 50.0);
    Ok(())
}

#[test]
fn standard_entropies() -> EquilResult<()> {
    let db = gri()?;
    assert_relative_eq!(
        db.entropy("H2O", GAS_PHASE, T0)?,
        188.83,
        max_relative = 1e-4
    );
    assert_relative_eq!(
        db.entropy("N2", GAS_PHASE, T0)?,
        191.51,
        max_relative = 1e-4
    );
    assert_relative_eq!(
        db.entropy("O2", GAS_PHASE, T0)?,
        205.15,
        max_relative = 1e-4
    );
    Ok(())
}

#[test]
fn standard_heat_capacities() -> EquilResult<()> {
    let db = gri()?;
    // NIST values; the N2 fit is about 0.2% low at room temperature
    assert_relative_eq!(
        db.heat_capacity("O2", GAS_PHASE, T0)?,
        29.38,
        max_relative = 1e-3
    );
    assert_relative_eq!(
        db.heat_capacity("N2", GAS_PHASE, T0)?,
        29.12,
        max_relative = 3e-3
    );
    assert_relative_eq!(
        db.heat_capacity("CO2", GAS_PHASE, T0)?,
        37.13,
        max_relative = 1e-3
    );
    Ok(())
}

#[test]
fn enthalpy_and_entropy_are_antiderivatives() -> EquilResult<()> {
    let db = gri()?;
    let dt = 1e-3;
    for species in ["CH4", "CO2", "H2O", "N2"] {
        for temperature in [250.0, 500.0, 900.0, 1500.0, 3000.0] {
            let cp = db.heat_capacity(species, GAS_PHASE, temperature)?;
            let dh = (db.enthalpy(species, GAS_PHASE, temperature + dt)?
                - db.enthalpy(species, GAS_PHASE, temperature - dt)?)
                / (2.0 * dt);
            let ds = (db.entropy(species, GAS_PHASE, temperature + dt)?
                - db.entropy(species, GAS_PHASE, temperature - dt)?)
                / (2.0 * dt);
            assert_relative_eq!(dh, cp, max_relative = 1e-6);
            assert_relative_eq!(ds, cp / temperature, max_relative = 1e-6);
        }
    }
    Ok(())
}

#[test]
fn ranges_join_continuously_at_1000k() -> EquilResult<()> {
    let db = gri()?;
    // NASA-7 fits are constrained to match at the range boundary
    assert_relative_eq!(
        db.heat_capacity("O2", GAS_PHASE, 1000.0)?,
        34.8832,
        max_relative = 1e-4
    );
    for species in ["O2", "N2", "H2O", "CO2", "CO", "CH4"] {
        let below = db.heat_capacity(species, GAS_PHASE, 999.9)?;
        let above = db.heat_capacity(species, GAS_PHASE, 1000.1)?;
        assert_relative_eq!(below, above, max_relative = 1e-3);
        let h_below = db.enthalpy(species, GAS_PHASE, 999.9)?;
        let h_above = db.enthalpy(species, GAS_PHASE, 1000.1)?;
        assert_relative_eq!(h_above - h_below, 0.2 * below, max_relative = 1e-2);
    }
    Ok(())
}

#[test]
fn out_of_range_queries_fail() -> EquilResult<()> {
    let db = gri()?;
    assert!(matches!(
        db.heat_capacity("N2", GAS_PHASE, 4000.0),
        Err(EquilError::OutOfDataRange { .. })
    ));
    assert!(matches!(
        db.enthalpy("N2", GAS_PHASE, 150.0),
        Err(EquilError::OutOfDataRange { .. })
    ));
    assert!(matches!(
        db.heat_capacity("N2", "Liquid", 300.0),
        Err(EquilError::OutOfDataRange { .. })
    ));
    assert!(db.in_data_range("N2", GAS_PHASE, 300.0));
    assert!(!db.in_data_range("N2", GAS_PHASE, 4000.0));
    assert_eq!(db.data_range("N2", GAS_PHASE), Some((200.0, 3500.0)));
    Ok(())
}

#[test]
fn molar_weights() -> EquilResult<()> {
    let db = gri()?;
    // supplied in the data file
    assert_relative_eq!(db.molar_weight("O2")?, 31.998);
    // computed from the elemental composition
    assert_relative_eq!(db.molar_weight("CH4")?, 16.043, max_relative = 1e-10);
    assert_relative_eq!(db.molar_weight("CO")?, 28.01, max_relative = 1e-10);
    Ok(())
}

#[test]
fn water_has_two_phases_and_a_vapor_pressure() -> EquilResult<()> {
    let db = gri()?;
    let phases = db.phases("H2O");
    assert!(phases.contains(&GAS_PHASE));
    assert!(phases.contains(&"Liquid"));
    assert_eq!(db.saturation_temperature_range("H2O"), Some((255.9, 573.0)));

    assert_relative_eq!(
        db.saturation_pressure("H2O", 373.0)?,
        99_232.0,
        max_relative = 1e-4
    );
    assert_relative_eq!(
        db.saturation_pressure("H2O", 473.15)?,
        1.658e6,
        max_relative = 1e-3
    );
    // the two Antoine ranges leave a gap
    assert!(matches!(
        db.saturation_pressure("H2O", 375.0),
        Err(EquilError::OutOfDataRange { .. })
    ));
    Ok(())
}

#[test]
fn entropy_of_air() -> EquilResult<()> {
    let db = gri()?;
    let air = Composition::from_iter([("N2", 0.79), ("O2", 0.21)]);
    let phase: Phase = IdealGasPhase::new(&db, air, T0, 1e5)?.into();
    // pure component entropies plus the entropy of mixing
    assert_relative_eq!(phase.entropy()?, 198.650, max_relative = 1e-4);
    Ok(())
}

#[test]
fn temperature_from_enthalpy_with_polynomial_heat_capacity() -> EquilResult<()> {
    let db = gri()?;
    let air = Composition::from_iter([("N2", 7.9), ("O2", 2.1)]);
    let mut phase: Phase = IdealGasPhase::new(&db, air.clone(), 800.0, 1e5)?.into();
    let target = phase.enthalpy()?;

    let mut cold: Phase = IdealGasPhase::new(&db, air, 300.0, 1e5)?.into();
    cold.set_enthalpy(target)?;
    assert_relative_eq!(cold.temperature(), 800.0, max_relative = 1e-9);
    assert_relative_eq!(cold.enthalpy()?, target, max_relative = 1e-12);

    // the same inversion through the internal energy
    let u = phase.internal_energy()?;
    phase.set_temperature(500.0)?;
    phase.set_internal_energy(u)?;
    assert_relative_eq!(phase.temperature(), 800.0, max_relative = 1e-9);
    Ok(())
}

#[test]
fn ideal_gas_volume() -> EquilResult<()> {
    let db = gri()?;
    let air = Composition::from_iter([("N2", 0.79), ("O2", 0.21)]);
    let phase: Phase = IdealGasPhase::new(&db, air, 273.15, 101_325.0)?.into();
    // 22.4 l/mol at standard conditions
    assert_relative_eq!(
        phase.volume(),
        RGAS * 273.15 / 101_325.0,
        max_relative = 1e-12
    );
    assert_relative_eq!(phase.volume(), 0.0224, max_relative = 1e-2);
    Ok(())
}
