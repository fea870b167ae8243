//! Configuration for the multilevel factorization
//!
//! [`IluConfig`] is an immutable-per-run value type covering dropping,
//! pivoting, level termination, and multilevel orchestration. Defaults
//! match the dual-pivoting multilevel factorization with error
//! propagation dropping; [`Preset`] provides the catalog of named
//! alternatives.
//!
//! Drop thresholds use an exponent scale: a threshold `t` stands for
//! the tolerance `tau = 10^(-t)`, and any `t >= 500` means "keep
//! everything" (tau = 0). This makes threshold arithmetic additive;
//! in particular `threshold_shift_schur` is added to the level
//! threshold when dropping from the Schur complement.

mod preset;
mod weights;

pub use preset::{Preset, PresetDropping, PresetFamily};
pub use weights::{CombineRule, WeightTableKind};

use crate::error::{Error, Result};
use crate::factor::{
    DropDiscipline, DropType, DroppingMode, RowPermutationScope, SchurVariant, TotalPivotTrigger,
};

/// Criterion that ends a level and moves the remainder to the next one
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LevelCriterion {
    /// End the level when every still-uneliminated working row has
    /// grown denser than `factor` times the mean row density of the
    /// level matrix
    Density {
        /// Multiplier on the mean row density
        factor: f64,
    },
    /// End the level when the weighted norm of the L contributions
    /// received by every still-uneliminated row exceeds `threshold`
    RowNorm {
        /// Weighting applied to the norm
        weight: RowNormWeight,
        /// Norm value that triggers the level switch
        threshold: f64,
        /// Use the maximum entry instead of the mean as the norm
        use_max: bool,
    },
    /// Never end a level early (the level eliminates everything it can)
    Disabled,
}

/// Weighting of the row-norm level criterion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowNormWeight {
    /// Norm of the produced U row alone
    Plain,
    /// Norm of the L column scaled by the norm of the U row
    URow,
    /// Norm of the L column scaled by the norm of the U row and the
    /// inverse pivot magnitude
    URowPivot,
}

/// Growth of the per-level memory reservation factor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MemFactorScaling {
    /// Same reservation factor on every level
    #[default]
    Constant,
    /// Scale by n0 / nk (levels shrink, factors may fill)
    Linear,
    /// Scale by (n0 / nk)^2
    Quadratic,
}

impl MemFactorScaling {
    /// Exponent applied to n0 / nk
    pub fn exponent(&self) -> i32 {
        match self {
            MemFactorScaling::Constant => 0,
            MemFactorScaling::Linear => 1,
            MemFactorScaling::Quadratic => 2,
        }
    }
}

/// Coefficients applied to the magnitude-based drop weights
#[derive(Debug, Clone, PartialEq)]
pub struct DropWeights {
    /// Initial value of the running inverse-factor weight vectors
    pub init_lu: f64,
    /// Coefficient for standard (norm-scaled) dropping
    pub standard: f64,
    /// Coefficient for absolute standard dropping
    pub standard_abs: f64,
    /// Coefficient for inverse-based dropping
    pub inverse: f64,
    /// Coefficient for weighted dropping
    pub weighted: f64,
    /// Coefficient for error propagation dropping
    pub err_prop: f64,
    /// Coefficient for error propagation dropping including the pivot
    pub err_prop2: f64,
    /// Coefficient for pivot-based dropping
    pub pivot: f64,
    /// Additionally scale weights by the inverse pivot magnitude
    pub scale_invdiag: bool,
    /// Additionally scale weights by the largest inverse pivot seen
    pub scale_max_invdiag: bool,
}

impl Default for DropWeights {
    fn default() -> Self {
        Self {
            init_lu: 1.0,
            standard: 1.0,
            standard_abs: 1.0,
            inverse: 1.0,
            weighted: 1.0,
            err_prop: 1.0,
            err_prop2: 1.0,
            pivot: 1.0,
            scale_invdiag: false,
            scale_max_invdiag: false,
        }
    }
}

/// Configuration for the multilevel incomplete factorization
#[derive(Debug, Clone, PartialEq)]
pub struct IluConfig {
    // ------------------------------------------------------------------
    // Dropping
    // ------------------------------------------------------------------
    /// Dropping rule (exactly one is active)
    pub dropping: DroppingMode,
    /// Drop threshold on the exponent scale (tau = 10^-threshold)
    pub threshold: f64,
    /// Additive shift of the threshold for Schur complement entries
    pub threshold_shift_schur: f64,
    /// Absolute threshold re-applied to the assembled factors
    pub post_fact_threshold: f64,
    /// Apply the positional weight table during post compression
    pub use_pos_compress: bool,
    /// Structural drop rule for L columns
    pub drop_type_l: DropType,
    /// Structural drop rule for U rows
    pub drop_type_u: DropType,
    /// Threshold dropping or cumulative-sum dropping
    pub discipline: DropDiscipline,
    /// Rule combining magnitude and positional weights
    pub combine_rule: CombineRule,
    /// Curve of the positional weight table
    pub table_kind: WeightTableKind,
    /// Number of slots in the positional weight table
    pub table_size: usize,
    /// Coefficients of the magnitude weights
    pub weights: DropWeights,
    /// Band offset for banded dropping
    pub bandwidth_offset: usize,
    /// Band width as a fraction of the dimension for banded dropping
    pub bandwidth_multiplier: f64,
    /// Cap on retained entries per factor row or column (None = unbounded)
    pub max_fill_per_row: Option<usize>,

    // ------------------------------------------------------------------
    // Pivoting
    // ------------------------------------------------------------------
    /// Column pivot tolerance: 0 pivots on every step, values >=
    /// [`IluConfig::NEVER_PIVOT`] never pivot
    pub pivot_tol: f64,
    /// Which rows may be interchanged
    pub row_scope: RowPermutationScope,
    /// When joint row and column pivoting takes over
    pub total_pivot: TotalPivotTrigger,
    /// Allow total pivoting from the first elimination step
    pub begin_total_pivot: bool,
    /// End the level when no admissible pivot reaches `min_pivot`
    pub small_pivot_terminates: bool,
    /// Smallest acceptable pivot magnitude
    pub min_pivot: f64,

    // ------------------------------------------------------------------
    // Level termination
    // ------------------------------------------------------------------
    /// Criterion ending a level
    pub level_criterion: LevelCriterion,
    /// Fraction of the level that must be eliminated before the
    /// criterion may fire
    pub min_elim_factor: f64,
    /// Externally supplied level boundary (row index), if any
    pub external_final_row: Option<usize>,
    /// Elimination fraction gate used with an external boundary
    pub ext_min_elim_factor: f64,

    // ------------------------------------------------------------------
    // Multilevel orchestration
    // ------------------------------------------------------------------
    /// Maximum number of levels
    pub max_levels: usize,
    /// Hard upper bound on `max_levels` (memory layout bound)
    pub memory_max_levels: usize,
    /// Dimension at or below which the next level is the last
    pub min_ml_size: usize,
    /// Additive threshold change per level
    pub vary_threshold_factor: f64,
    /// Use `final_threshold` on the last level
    pub use_final_threshold: bool,
    /// Threshold for the last level
    pub final_threshold: f64,
    /// Memory reservation factor (multiple of the level nnz)
    pub mem_factor: f64,
    /// Growth of the reservation factor across levels
    pub variable_mem: MemFactorScaling,
    /// Schur complement update variant
    pub schur_variant: SchurVariant,
    /// Factor a numerically zero Schur complement trivially
    pub use_thres_zero_schur: bool,
    /// Frobenius norm below which a Schur complement counts as zero
    pub threshold_zero_schur: f64,
    /// Largest dimension eligible for the zero Schur shortcut
    pub min_size_zero_schur: usize,
    /// Fail unless a zero Schur complement block is reached
    pub require_zero_schur: bool,
    /// Smallest acceptable dimension of the required zero block
    pub req_zero_schur_size: usize,
}

impl Default for IluConfig {
    fn default() -> Self {
        Self {
            dropping: DroppingMode::ErrorProp,
            threshold: 1000.0,
            threshold_shift_schur: 1000.0,
            post_fact_threshold: 1000.0,
            use_pos_compress: false,
            drop_type_l: DropType::Plain,
            drop_type_u: DropType::Plain,
            discipline: DropDiscipline::Threshold,
            combine_rule: CombineRule::Max,
            table_kind: WeightTableKind::ExpSteep,
            table_size: 100,
            weights: DropWeights::default(),
            bandwidth_offset: 0,
            bandwidth_multiplier: 0.5,
            max_fill_per_row: None,
            pivot_tol: 0.0,
            row_scope: RowPermutationScope::Global,
            total_pivot: TotalPivotTrigger::AfterFinalRow,
            begin_total_pivot: true,
            small_pivot_terminates: false,
            min_pivot: 1e-2,
            level_criterion: LevelCriterion::Density { factor: 2.0 },
            min_elim_factor: 0.5,
            external_final_row: None,
            ext_min_elim_factor: 0.0,
            max_levels: 100,
            memory_max_levels: 100,
            min_ml_size: 0,
            vary_threshold_factor: 0.0,
            use_final_threshold: false,
            final_threshold: 1000.0,
            mem_factor: 3.0,
            variable_mem: MemFactorScaling::Constant,
            schur_variant: SchurVariant::Standard,
            use_thres_zero_schur: false,
            threshold_zero_schur: 1e-6,
            min_size_zero_schur: 100,
            require_zero_schur: false,
            req_zero_schur_size: 0,
        }
    }
}

impl IluConfig {
    /// Threshold value at or above which dropping keeps everything
    /// (tau = 0) and pivot tolerances never pivot
    pub const NEVER_PIVOT: f64 = 500.0;

    /// Default trigger value of the row-norm level criterion
    pub const DEFAULT_ROW_NORM_THRESHOLD: f64 = 10.0;

    /// Configuration of a preset from the catalog
    pub fn preset(preset: Preset) -> Self {
        preset.config()
    }

    /// Decode a historical integer preset code into a configuration
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownPreset`] for undocumented codes.
    pub fn from_code(code: i32) -> Result<Self> {
        Ok(Preset::from_code(code)?.config())
    }

    /// Drop tolerance of a threshold on the exponent scale
    ///
    /// Thresholds are positive decimal exponents. Non-positive values
    /// and values at or above [`IluConfig::NEVER_PIVOT`] both disable
    /// dropping (tau = 0).
    pub fn tau(threshold: f64) -> f64 {
        if threshold <= 0.0 || threshold >= Self::NEVER_PIVOT {
            0.0
        } else {
            10f64.powf(-threshold)
        }
    }

    /// Threshold of level `k` of the schedule
    pub fn level_threshold(&self, level: usize) -> f64 {
        self.threshold + self.vary_threshold_factor * level as f64
    }

    /// Sampled positional weight table
    pub fn make_weight_table(&self) -> Vec<f64> {
        self.table_kind.make_table(self.table_size)
    }

    /// Check the configuration before factorization starts
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] on the first violated constraint. All
    /// checks run before any elimination work, so a bad configuration
    /// never produces a partial factorization.
    pub fn validate(&self) -> Result<()> {
        if self.max_levels == 0 {
            return Err(Error::config("max_levels", "must be at least 1"));
        }
        if self.max_levels > self.memory_max_levels {
            return Err(Error::config(
                "max_levels",
                format!(
                    "{} exceeds memory_max_levels = {}",
                    self.max_levels, self.memory_max_levels
                ),
            ));
        }
        if self.table_size == 0 {
            return Err(Error::config("table_size", "must be at least 1"));
        }
        if self.mem_factor <= 0.0 {
            return Err(Error::config("mem_factor", "must be positive"));
        }
        if !(0.0..=1.0).contains(&self.min_elim_factor) {
            return Err(Error::config("min_elim_factor", "must be in [0, 1]"));
        }
        if !(0.0..=1.0).contains(&self.ext_min_elim_factor) {
            return Err(Error::config("ext_min_elim_factor", "must be in [0, 1]"));
        }
        if self.min_pivot <= 0.0 {
            return Err(Error::config("min_pivot", "must be positive"));
        }
        if self.bandwidth_multiplier < 0.0 {
            return Err(Error::config("bandwidth_multiplier", "must be >= 0"));
        }
        if self.use_thres_zero_schur && !self.small_pivot_terminates {
            // A zero Schur complement only arises when elimination stops
            // on small pivots; without that the shortcut never fires.
            return Err(Error::config(
                "use_thres_zero_schur",
                "requires small_pivot_terminates",
            ));
        }
        if self.require_zero_schur && !self.use_thres_zero_schur {
            return Err(Error::config(
                "require_zero_schur",
                "requires use_thres_zero_schur",
            ));
        }
        if let LevelCriterion::Density { factor } = self.level_criterion {
            if factor <= 0.0 {
                return Err(Error::config("level_criterion", "density factor must be positive"));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_validates() {
        IluConfig::default().validate().unwrap();
    }

    #[test]
    fn test_tau_exponent_scale() {
        assert_eq!(IluConfig::tau(1000.0), 0.0);
        assert_eq!(IluConfig::tau(500.0), 0.0);
        assert!((IluConfig::tau(3.0) - 1e-3).abs() < 1e-18);
        // non-positive thresholds disable dropping as well
        assert_eq!(IluConfig::tau(0.0), 0.0);
        assert_eq!(IluConfig::tau(-1.0), 0.0);
    }

    #[test]
    fn test_level_threshold_schedule() {
        let mut c = IluConfig::default();
        c.threshold = 2.0;
        c.vary_threshold_factor = 0.5;
        assert_eq!(c.level_threshold(0), 2.0);
        assert_eq!(c.level_threshold(4), 4.0);
    }

    #[test]
    fn test_max_levels_exceeding_memory_bound_fails() {
        let mut c = IluConfig::default();
        c.max_levels = c.memory_max_levels + 1;
        assert!(matches!(
            c.validate(),
            Err(Error::Config {
                param: "max_levels",
                ..
            })
        ));
    }

    #[test]
    fn test_zero_schur_without_small_pivot_fails() {
        let mut c = IluConfig::default();
        c.use_thres_zero_schur = true;
        assert!(c.validate().is_err());
        c.small_pivot_terminates = true;
        c.validate().unwrap();
    }

    #[test]
    fn test_require_zero_schur_needs_detection() {
        let mut c = IluConfig::default();
        c.require_zero_schur = true;
        assert!(c.validate().is_err());
    }
}
