//! Controller error taxonomy

use thiserror::Error;

use crate::types::ParseModeError;

/// Failures surfaced by [`BrownoutController`](super::BrownoutController).
///
/// Every variant is raised before any state is mutated.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BrownoutError {
    /// Malformed sample or threshold object.
    #[error("invalid input: {}", .0.join("; "))]
    Validation(Vec<String>),

    /// Threshold update would break per-dimension monotonicity.
    #[error("threshold update rejected: {}", .0.join("; "))]
    Configuration(Vec<String>),

    /// Requested mode is not part of the enumeration.
    #[error(transparent)]
    UnknownMode(#[from] ParseModeError),
}

impl BrownoutError {
    /// Stable machine-readable code for API responses.
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "BAD_REQUEST",
            Self::Configuration(_) => "CONFIGURATION_ERROR",
            Self::UnknownMode(_) => "NOT_FOUND",
        }
    }
}
