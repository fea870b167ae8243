//! Error types for ilur

use thiserror::Error;

/// Result type alias using ilur's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in ilur operations
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid configuration detected before factorization starts
    #[error("Invalid configuration '{param}': {reason}")]
    Config {
        /// The offending parameter or parameter combination
        param: &'static str,
        /// Reason for invalidity
        reason: String,
    },

    /// Unknown or unsupported preset code
    #[error("Unknown preset code {code}")]
    UnknownPreset {
        /// The code that failed to decode
        code: i32,
    },

    /// Matrix data fails a structural invariant
    #[error("Invalid matrix: {reason}")]
    InvalidMatrix {
        /// Description of the violated invariant
        reason: String,
    },

    /// Shape mismatch between operands
    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch {
        /// Expected dimension
        expected: usize,
        /// Actual dimension
        got: usize,
    },

    /// Out of memory
    #[error("Out of memory: failed to allocate {size} bytes")]
    OutOfMemory {
        /// Requested size in bytes
        size: usize,
    },

    /// A required zero Schur complement was not reached
    #[error(
        "Required zero Schur complement of dimension >= {required} was not reached \
         (final block dimension: {reached})"
    )]
    ZeroSchurNotReached {
        /// Dimension of the zero block actually produced
        reached: usize,
        /// Minimum dimension demanded by the configuration
        required: usize,
    },

    /// Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a configuration error
    pub fn config(param: &'static str, reason: impl Into<String>) -> Self {
        Self::Config {
            param,
            reason: reason.into(),
        }
    }

    /// Create an invalid-matrix error
    pub fn invalid_matrix(reason: impl Into<String>) -> Self {
        Self::InvalidMatrix {
            reason: reason.into(),
        }
    }
}
