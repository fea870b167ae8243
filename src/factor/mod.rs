//! Multilevel incomplete LU factorization
//!
//! The factorization proceeds level by level. Each level equilibrates
//! its matrix, eliminates a leading block under dual row and column
//! pivoting with adaptive dropping, and hands the Schur complement to
//! the next level. [`MultilevelIlu`] owns the resulting artifacts and
//! applies them as a preconditioner.

mod dropping;
mod level;
mod multilevel;
mod pivoting;
mod types;

pub use dropping::{DropDiscipline, DropType, DroppingMode};
pub use multilevel::MultilevelIlu;
pub use pivoting::{PivotChoice, PivotStrategy, RowPermutationScope, TotalPivotTrigger};
pub use types::{FactorMetrics, LevelFactors, LevelMetrics, PrecondSide, SchurVariant};
