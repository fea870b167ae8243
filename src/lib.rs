//! # ilur
//!
//! **Multilevel incomplete LU preconditioning for sparse linear systems.**
//!
//! ilur factors a sparse matrix into a stack of incomplete LU levels with
//! dual row and column pivoting, adaptive dropping, and Schur-complement
//! continuation, then applies the stack as a preconditioner.
//!
//! ## Why ilur?
//!
//! - **Multilevel**: Rows the factorization cannot treat well at one
//!   level are deferred to the Schur complement of the next
//! - **Dual pivoting**: Rows and columns are permuted together, with
//!   tunable scopes and tolerances
//! - **Adaptive dropping**: Magnitude, inverse-growth, weighted, and
//!   error-propagation drop rules, optionally combined with positional
//!   and banded structure
//! - **Deterministic**: The same matrix and configuration always
//!   produce the same factorization
//!
//! ## Quick Start
//!
//! ```rust
//! use ilur::prelude::*;
//!
//! # fn main() -> ilur::Result<()> {
//! let a = CsrMatrix::from_triplets(3, 3, &[
//!     (0, 0, 4.0), (0, 1, -1.0),
//!     (1, 0, -1.0), (1, 1, 4.0), (1, 2, -1.0),
//!     (2, 1, -1.0), (2, 2, 4.0),
//! ])?;
//!
//! let m = MultilevelIlu::compute(&a, IluConfig::default())?;
//! let z = m.apply(&[1.0, 2.0, 3.0])?;
//! assert_eq!(z.len(), 3);
//! # Ok(())
//! # }
//! ```
//!
//! Configurations can be built field by field on [`IluConfig`] or taken
//! from the preset catalog via [`IluConfig::from_code`].

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod factor;
pub mod sparse;

pub use config::IluConfig;
pub use error::{Error, Result};
pub use factor::MultilevelIlu;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{IluConfig, LevelCriterion, Preset};
    pub use crate::error::{Error, Result};
    pub use crate::factor::{DroppingMode, MultilevelIlu, PrecondSide};
    pub use crate::sparse::CsrMatrix;
}
