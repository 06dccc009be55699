use thiserror::Error;

/// Unified error type for `amprs` operations.
#[derive(Debug, Error)]
pub enum AmpError {
    /// Raised when provided arrays or matrices have incompatible dimensions.
    #[error("dimension mismatch in {context}: expected {expected} but found {found}")]
    DimensionMismatch {
        /// Human-readable context describing the operation.
        context: &'static str,
        /// The required dimension, usually implied by the observation matrix.
        expected: usize,
        /// The dimension that was actually supplied.
        found: usize,
    },

    /// Raised when a scalar setting lies outside its admissible range.
    #[error("invalid value {value} for `{name}`")]
    InvalidParameter { name: &'static str, value: f64 },

    /// Raised when the LMMSE linear system cannot be factorized or inverted.
    #[error("singular system in {context}")]
    SingularMatrix { context: &'static str },

    /// Raised when input data contains NaN or infinite entries.
    #[error("encountered non-finite values in {context}")]
    NumericalError { context: &'static str },
}

impl AmpError {
    /// Helper to format a [`DimensionMismatch`](AmpError::DimensionMismatch) error.
    pub fn dimension_mismatch(context: &'static str, expected: usize, found: usize) -> Self {
        Self::DimensionMismatch {
            context,
            expected,
            found,
        }
    }

    /// Helper for rejecting an out-of-range setting.
    pub fn invalid_parameter(name: &'static str, value: f64) -> Self {
        Self::InvalidParameter { name, value }
    }

    /// Helper to raise when a matrix factorization fails due to singularity.
    pub fn singular(context: &'static str) -> Self {
        Self::SingularMatrix { context }
    }
}

/// Type alias for results returned by this crate.
pub type Result<T> = std::result::Result<T, AmpError>;
