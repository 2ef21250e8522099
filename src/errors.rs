use num_dual::linalg::LinAlgError;
use thiserror::Error;

/// Error type for inconsistent or missing species data.
#[derive(Error, Debug)]
pub enum DataError {
    #[error(transparent)]
    FileIO(#[from] std::io::Error),
    #[error(transparent)]
    Serde(#[from] serde_json::Error),
    #[error("Element `{0}` is already registered.")]
    DuplicateElement(String),
    #[error("Species `{0}` is already registered.")]
    DuplicateSpecies(String),
    #[error("Species `{0}` is not registered.")]
    UnknownSpecies(String),
    #[error("Element `{0}` is not registered.")]
    UnknownElement(String),
    #[error("Molar weight of `{0}` ({1} g/mol) contradicts its elemental composition ({2} g/mol).")]
    MolarWeightMismatch(String, f64, f64),
    #[error("Temperature range [{1} K, {2} K] of `{0}` overlaps an existing record.")]
    OverlappingRange(String, f64, f64),
    #[error("Temperature range [{1} K, {2} K] of `{0}` is empty.")]
    EmptyRange(String, f64, f64),
    #[error("`{0}` correlations cannot be integrated.")]
    NonIntegrable(&'static str),
}

/// Error type for improperly defined states and convergence problems.
#[derive(Error, Debug)]
pub enum EquilError {
    #[error("No property record for `{species}` ({phase}) at {temperature} K.")]
    OutOfDataRange {
        species: String,
        phase: String,
        temperature: f64,
    },
    #[error("Species `{0}` is not registered.")]
    UnknownSpecies(String),
    #[error("The total amount of the composition is zero.")]
    ZeroTotalComposition,
    #[error("Cannot combine a {0} phase with a {1} phase.")]
    PhaseMismatch(String, String),
    #[error("Invalid state in {0}: {1} = {2}.")]
    InvalidState(String, String, f64),
    #[error("`{0}` did not converge within the maximum number of iterations.")]
    NotConverged(String),
    #[error("Equilibrium minimization failed: {0}")]
    InnerSolveFailed(String),
    #[error(transparent)]
    DataError(#[from] DataError),
    #[error(transparent)]
    LinAlgError(#[from] LinAlgError),
}

pub type EquilResult<T> = Result<T, EquilError>;
