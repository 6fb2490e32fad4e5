//! Error types for elastic tensor fitting and property evaluation.

use thiserror::Error;

/// Result type alias using the crate [`enum@Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by fitting and property evaluation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Elastic tensors must have even rank.
    #[error("elastic tensor must have even rank, got rank {0}")]
    OddRank(usize),

    /// A tensor did not have the rank an operation requires.
    #[error("expected tensor of rank {expected}, got rank {found}")]
    RankMismatch { expected: usize, found: usize },

    /// Malformed strain/stress or array shape.
    #[error("shape error: {0}")]
    Shape(String),

    /// Finite-difference stencil cannot produce the requested derivative.
    #[error("rank-deficient stencil: {0}")]
    StencilRankDeficient(String),

    /// Invalid argument that is neither a shape nor a data problem.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// More than one distinct stress at zero strain.
    #[error(
        "multiple stresses found for equilibrium strain state, \
         specify the equilibrium stress or remove extraneous stresses"
    )]
    AmbiguousEquilibriumStress,

    /// Strain states required by the fit mode were not supplied.
    #[error("missing independent strain states: {0}")]
    MissingStrainStates(String),

    /// Two directions that must be orthogonal are not.
    #[error("directions must be orthogonal (|n . m| = {0:e})")]
    NotOrthogonal(f64),

    /// Substitution was asked for a symbol that has no value.
    #[error("no value supplied for symbol {0}")]
    MissingSymbol(String),

    /// Negative bulk or shear modulus feeding a property that requires them positive.
    #[error("bulk or shear modulus is negative (k_vrh = {k_vrh}, g_vrh = {g_vrh}), property cannot be determined")]
    Unphysical { k_vrh: f64, g_vrh: f64 },

    /// Matrix singularity.
    #[error("singular matrix: {0}")]
    SingularMatrix(String),

    /// Root finding or quadrature failure.
    #[error("solver error: {0}")]
    Solver(String),
}

impl Error {
    /// True for the physical-invalidity class that callers may opt to ignore.
    pub fn is_unphysical(&self) -> bool {
        matches!(self, Error::Unphysical { .. })
    }
}
