//! Preset catalog
//!
//! The engine ships a catalog of named configurations covering the
//! useful combinations of pivoting strategy, dropping rule, Schur
//! complement variant, and memory footprint. Presets are described by
//! an orthogonal [`Preset`] value; [`Preset::from_code`] decodes the
//! historical integer codes onto it.
//!
//! Integer codes follow a fixed grid: the tens select the pivoting
//! family, the units select the dropping rule (with an offset of 5 for
//! the improved Schur complement update), and an offset of 1000 selects
//! the low-memory variant. Negative codes were reserved for external
//! direct solvers and experimental configurations and are rejected.

use crate::config::{IluConfig, LevelCriterion, RowNormWeight};
use crate::error::{Error, Result};
use crate::factor::{DroppingMode, RowPermutationScope, SchurVariant, TotalPivotTrigger};

/// Pivoting family of a preset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PresetFamily {
    /// Dual pivoting (row and column), levels end when fill grows too fast
    #[default]
    DualPivot,
    /// Dual pivoting, levels end when the pivot becomes too small
    DualPivotSmallPivot,
    /// Dual pivoting with a small-pivot check and a zero Schur complement check
    DualPivotZeroSchur,
    /// Like [`PresetFamily::DualPivotZeroSchur`], but failing to reach a
    /// zero Schur complement is an error
    DualPivotRequireZeroSchur,
    /// Dual pivoting with a weighted-norm level criterion
    DualPivotRowNorm,
    /// Row permutations with the matching column as pivot
    RowPivot,
    /// No permutations, levels end when the pivot becomes too small
    NoPivot,
    /// No permutations with a zero Schur complement check
    NoPivotZeroSchur,
    /// No permutations, level boundary supplied externally
    NoPivotExternal,
    /// Column pivoting only, level boundary supplied externally
    ColumnPivot,
    /// Single level, dual pivoting
    SingleLevelDualPivot,
    /// Single level, no permutations
    SingleLevelNoPivot,
    /// Single level, column pivoting only
    SingleLevelColumnPivot,
}

/// Dropping rule selected by a preset
///
/// Only the four rules present in the catalog grid; the full set of
/// rules remains available through [`IluConfig`] directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PresetDropping {
    /// Error propagation dropping (catalog default)
    #[default]
    ErrorProp,
    /// Inverse-based dropping
    Inverse,
    /// Weighted dropping
    Weighted,
    /// Dual threshold (norm-scaled) dropping
    Standard,
}

impl PresetDropping {
    fn mode(&self) -> DroppingMode {
        match self {
            PresetDropping::ErrorProp => DroppingMode::ErrorProp,
            PresetDropping::Inverse => DroppingMode::Inverse,
            PresetDropping::Weighted => DroppingMode::Weighted,
            PresetDropping::Standard => DroppingMode::Standard,
        }
    }
}

/// A named configuration from the preset catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Preset {
    /// Pivoting family
    pub family: PresetFamily,
    /// Dropping rule
    pub dropping: PresetDropping,
    /// Use the improved Schur complement update
    pub improved_schur: bool,
    /// Cap fill-in and shift the Schur threshold to save memory
    pub low_memory: bool,
}

impl Preset {
    /// Decode a historical integer preset code
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownPreset`] for codes outside the documented
    /// catalog, including the negative codes reserved for external
    /// solvers and experimental configurations.
    pub fn from_code(code: i32) -> Result<Self> {
        let unknown = || Error::UnknownPreset { code };

        let low_memory = (1000..2000).contains(&code);
        let base = if low_memory { code - 1000 } else { code };
        if base < 0 {
            return Err(unknown());
        }

        // The 100s block is single-level, the 200s block switches the
        // level criterion; everything else is tens = family, units = rule.
        let (family_base, units) = (base / 10, base % 10);
        let improved_schur = units >= 5;
        let dropping = match units % 5 {
            0 => PresetDropping::ErrorProp,
            1 => PresetDropping::Inverse,
            2 => PresetDropping::Weighted,
            3 => PresetDropping::Standard,
            _ => return Err(unknown()),
        };

        let family = match family_base {
            0 => PresetFamily::DualPivot,
            1 => PresetFamily::NoPivot,
            2 => PresetFamily::NoPivotExternal,
            3 => PresetFamily::ColumnPivot,
            4 => PresetFamily::DualPivotSmallPivot,
            5 => PresetFamily::RowPivot,
            6 => PresetFamily::NoPivotZeroSchur,
            8 => PresetFamily::DualPivotRequireZeroSchur,
            9 => PresetFamily::DualPivotZeroSchur,
            10 if !improved_schur => PresetFamily::SingleLevelDualPivot,
            11 if !improved_schur => PresetFamily::SingleLevelNoPivot,
            13 if !improved_schur => PresetFamily::SingleLevelColumnPivot,
            20 => PresetFamily::DualPivotRowNorm,
            _ => return Err(unknown()),
        };

        Ok(Preset {
            family,
            dropping,
            improved_schur,
            low_memory,
        })
    }

    /// Build the configuration this preset describes
    pub fn config(&self) -> IluConfig {
        let mut c = IluConfig::default();
        c.dropping = self.dropping.mode();

        match self.family {
            PresetFamily::DualPivot => {}
            PresetFamily::DualPivotSmallPivot => {
                c.small_pivot_terminates = true;
                c.min_elim_factor = 0.0;
            }
            PresetFamily::DualPivotZeroSchur => {
                c.small_pivot_terminates = true;
                c.min_elim_factor = 0.0;
                c.use_thres_zero_schur = true;
            }
            PresetFamily::DualPivotRequireZeroSchur => {
                c.small_pivot_terminates = true;
                c.min_elim_factor = 0.0;
                c.use_thres_zero_schur = true;
                c.require_zero_schur = true;
                c.req_zero_schur_size = 1;
            }
            PresetFamily::DualPivotRowNorm => {
                c.level_criterion = LevelCriterion::RowNorm {
                    weight: RowNormWeight::Plain,
                    threshold: IluConfig::DEFAULT_ROW_NORM_THRESHOLD,
                    use_max: true,
                };
            }
            PresetFamily::RowPivot => {
                c.pivot_tol = 1.0;
            }
            PresetFamily::NoPivot => {
                c.row_scope = RowPermutationScope::Never;
                c.total_pivot = TotalPivotTrigger::Never;
                c.pivot_tol = IluConfig::NEVER_PIVOT;
                c.small_pivot_terminates = true;
                c.min_elim_factor = 0.0;
            }
            PresetFamily::NoPivotZeroSchur => {
                c.row_scope = RowPermutationScope::Never;
                c.total_pivot = TotalPivotTrigger::Never;
                c.pivot_tol = IluConfig::NEVER_PIVOT;
                c.small_pivot_terminates = true;
                c.min_elim_factor = 0.0;
                c.use_thres_zero_schur = true;
            }
            PresetFamily::NoPivotExternal => {
                c.row_scope = RowPermutationScope::Never;
                c.pivot_tol = IluConfig::NEVER_PIVOT;
                c.begin_total_pivot = false;
                c.level_criterion = LevelCriterion::Disabled;
            }
            PresetFamily::ColumnPivot => {
                c.row_scope = RowPermutationScope::Never;
                c.level_criterion = LevelCriterion::Disabled;
            }
            PresetFamily::SingleLevelDualPivot => {
                c.max_levels = 1;
            }
            PresetFamily::SingleLevelNoPivot => {
                c.max_levels = 1;
                c.row_scope = RowPermutationScope::Never;
                c.pivot_tol = IluConfig::NEVER_PIVOT;
            }
            PresetFamily::SingleLevelColumnPivot => {
                c.max_levels = 1;
                c.row_scope = RowPermutationScope::Never;
            }
        }

        if self.improved_schur {
            c.schur_variant = SchurVariant::Improved;
        }
        if self.low_memory {
            c.threshold_shift_schur = 3.0;
            c.max_fill_per_row = Some(500);
        }

        c
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_code_is_default_preset() {
        let p = Preset::from_code(0).unwrap();
        assert_eq!(p, Preset::default());
        assert_eq!(p.dropping, PresetDropping::ErrorProp);
        assert!(!p.improved_schur);
        assert!(!p.low_memory);
    }

    #[test]
    fn test_improved_schur_offset() {
        let p = Preset::from_code(6).unwrap();
        assert_eq!(p.family, PresetFamily::DualPivot);
        assert_eq!(p.dropping, PresetDropping::Inverse);
        assert!(p.improved_schur);
    }

    #[test]
    fn test_low_memory_offset() {
        let p = Preset::from_code(1013).unwrap();
        assert!(p.low_memory);
        assert_eq!(p.family, PresetFamily::NoPivot);
        assert_eq!(p.dropping, PresetDropping::Standard);
        let c = p.config();
        assert_eq!(c.max_fill_per_row, Some(500));
        assert_eq!(c.threshold_shift_schur, 3.0);
    }

    #[test]
    fn test_single_level_family() {
        let c = Preset::from_code(110).unwrap().config();
        assert_eq!(c.max_levels, 1);
        assert_eq!(c.row_scope, RowPermutationScope::Never);
        assert_eq!(c.pivot_tol, IluConfig::NEVER_PIVOT);
    }

    #[test]
    fn test_require_zero_schur_family() {
        let c = Preset::from_code(80).unwrap().config();
        assert!(c.require_zero_schur);
        assert!(c.use_thres_zero_schur);
        assert!(c.small_pivot_terminates);
        assert_eq!(c.req_zero_schur_size, 1);
    }

    #[test]
    fn test_unknown_codes_rejected() {
        for code in [-1, -2, -102, 4, 9, 74, 105, 140, 2000, 1139] {
            assert!(
                Preset::from_code(code).is_err(),
                "code {} should be rejected",
                code
            );
        }
    }

    #[test]
    fn test_documented_grid_round_trips() {
        for code in [0, 1, 2, 3, 5, 8, 10, 18, 20, 28, 30, 38, 40, 50, 60, 80, 90, 98] {
            let p = Preset::from_code(code).unwrap();
            p.config().validate().unwrap();
        }
        for code in [100, 103, 110, 113, 130, 133, 200, 208, 1000, 1208] {
            let p = Preset::from_code(code).unwrap();
            p.config().validate().unwrap();
        }
    }
}
