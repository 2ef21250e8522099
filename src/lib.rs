#![warn(clippy::all)]
#![allow(clippy::too_many_arguments)]

/// Print messages with level `Verbosity::Iter` or higher.
#[macro_export]
macro_rules! log_iter {
    ($verbosity:expr, $($arg:tt)*) => {
        if $verbosity >= Verbosity::Iter {
            println!($($arg)*);
        }
    }
}

/// Print messages with level `Verbosity::Result` or higher.
#[macro_export]
macro_rules! log_result {
    ($verbosity:expr, $($arg:tt)*) => {
        if $verbosity >= Verbosity::Result {
            println!($($arg)*);
        }
    }
}

mod composition;
mod correlation;
mod equilibrium;
mod errors;
mod phase;
pub mod species;

pub use composition::Composition;
pub use correlation::{Correlation, PolyTerm};
pub use equilibrium::{
    find_equilibrium, react, Conservation, MechanicalConstraint, SolverOptions, ThermalConstraint,
    Verbosity,
};
pub use errors::{DataError, EquilError, EquilResult};
pub use phase::{IdealGasPhase, IncompressiblePhase, Phase};
pub use species::{ElementTable, SpeciesDatabase};

/// Molar gas constant in J/(mol K).
pub const RGAS: f64 = 8.31451;
/// Reference temperature in K.
pub const T0: f64 = 298.15;
/// Reference pressure in Pa.
pub const P0: f64 = 1.0e5;
