//! Dropping policy
//!
//! Decides which candidate factor entries survive. Every decision is
//! drop-if-below: an entry's magnitude is multiplied by a weight and
//! compared against the drop tolerance tau. The weight has a
//! magnitude-based part chosen by [`DroppingMode`] (computed by the
//! level driver from its running state) and a structural part chosen by
//! [`DropType`] (distance from the diagonal, band membership), merged
//! with the configured combination rule.

use crate::config::CombineRule;

/// Magnitude-based weighting rule (exactly one is active per run)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DroppingMode {
    /// Relative dropping: weight = 1 / l2 norm of the candidate vector
    Standard,
    /// Absolute dropping: weight = 1
    StandardAbs,
    /// Inverse-based dropping: weight estimates the relevant row norm
    /// of the inverse factor computed so far
    Inverse,
    /// Weighted dropping: cross-factor running weights, max-updated
    Weighted,
    /// Weighted dropping with running row-sum updates
    Weighted2,
    /// Error propagation dropping: weight by the norm of the opposite
    /// factor's candidate vector
    #[default]
    ErrorProp,
    /// Error propagation dropping including the pivot magnitude
    ErrorProp2,
    /// Pivot-based dropping: weight = 1 / |pivot|
    Pivot,
}

/// Structural dropping rule applied per entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DropType {
    /// Magnitude only
    #[default]
    Plain,
    /// Weight by distance from the diagonal in natural (unpermuted)
    /// indices via the positional table; meaningless under permutation
    Positional,
    /// Weight by distance from the diagonal in pivot-order positions,
    /// which stays meaningful under permutation
    FixedPositional,
    /// Hard cutoff outside the band offset + multiplier * n;
    /// incompatible with pivoting
    Banded,
    /// Positional weighting scaled to the matrix's natural bandwidth
    NaturalBand,
}

/// Dropping discipline (exactly one is active)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DropDiscipline {
    /// Drop every entry whose weighted magnitude is below tau
    #[default]
    Threshold,
    /// Drop smallest entries while their cumulative weighted magnitude
    /// stays below tau
    Sum,
}

/// Structural context for one candidate vector
#[derive(Debug, Clone, Copy)]
pub struct DropContext<'a> {
    /// Drop tolerance (0 keeps everything)
    pub tau: f64,
    /// Discipline in force
    pub discipline: DropDiscipline,
    /// Structural rule in force
    pub drop_type: DropType,
    /// Rule merging magnitude and structural weights
    pub combine: CombineRule,
    /// Positional weight table (table_size + 1 slots)
    pub table: &'a [f64],
    /// Dimension of the level matrix
    pub dim: usize,
    /// Natural bandwidth of the level matrix
    pub natural_bandwidth: usize,
    /// Band cutoff for [`DropType::Banded`]
    pub band_limit: usize,
    /// Cap on retained entries (None = unbounded)
    pub max_fill: Option<usize>,
    /// Natural index of the pivot (diagonal position of this vector)
    pub pivot_index: usize,
    /// Pivot-order position of this elimination step
    pub step: usize,
}

impl DropContext<'_> {
    /// Weight of an entry at natural index `idx` and pivot-order
    /// position `pos`, merged with the magnitude weight `w`
    fn entry_weight(&self, w: f64, idx: usize, pos: usize) -> Option<f64> {
        match self.drop_type {
            DropType::Plain => Some(w),
            DropType::Positional => {
                Some(self.combine.combine(w, self.table_weight(self.pivot_index.abs_diff(idx), self.dim)))
            }
            DropType::FixedPositional => {
                Some(self.combine.combine(w, self.table_weight(self.step.abs_diff(pos), self.dim)))
            }
            DropType::Banded => {
                if self.pivot_index.abs_diff(idx) > self.band_limit {
                    None
                } else {
                    Some(w)
                }
            }
            DropType::NaturalBand => Some(self.combine.combine(
                w,
                self.table_weight(self.pivot_index.abs_diff(idx), self.natural_bandwidth.max(1)),
            )),
        }
    }

    fn table_weight(&self, dist: usize, range: usize) -> f64 {
        let size = self.table.len() - 1;
        let slot = (dist * size / range.max(1)).min(size);
        self.table[slot]
    }
}

/// Candidate entry: natural index, pivot-order position, value
pub(crate) type Candidate = (usize, usize, f64);

/// Apply the dropping policy to a candidate vector in place
///
/// `weight` is the magnitude weight of the whole vector as computed by
/// the level driver for the active [`DroppingMode`]. Surviving entries
/// keep their original relative order, so repeated runs over the same
/// input produce identical factors.
pub(crate) fn apply_drop(ctx: &DropContext<'_>, entries: &mut Vec<Candidate>, weight: f64) {
    // Banded cutoff applies regardless of tau.
    entries.retain(|&(idx, pos, _)| ctx.entry_weight(weight, idx, pos).is_some());

    if ctx.tau > 0.0 {
        match ctx.discipline {
            DropDiscipline::Threshold => {
                entries.retain(|&(idx, pos, v)| {
                    let w = ctx.entry_weight(weight, idx, pos).unwrap_or(0.0);
                    v.abs() * w >= ctx.tau
                });
            }
            DropDiscipline::Sum => {
                let mut keyed: Vec<(f64, usize)> = entries
                    .iter()
                    .enumerate()
                    .map(|(i, &(idx, pos, v))| {
                        (v.abs() * ctx.entry_weight(weight, idx, pos).unwrap_or(0.0), i)
                    })
                    .collect();
                keyed.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
                let mut cumulative = 0.0;
                let mut dropped = vec![false; entries.len()];
                for &(key, i) in &keyed {
                    cumulative += key;
                    if cumulative < ctx.tau {
                        dropped[i] = true;
                    } else {
                        break;
                    }
                }
                let mut i = 0;
                entries.retain(|_| {
                    let keep = !dropped[i];
                    i += 1;
                    keep
                });
            }
        }
    }

    if let Some(cap) = ctx.max_fill {
        if entries.len() > cap {
            // Keep the cap largest weighted magnitudes, preserving order.
            let mut keyed: Vec<(f64, usize)> = entries
                .iter()
                .enumerate()
                .map(|(i, &(idx, pos, v))| {
                    (v.abs() * ctx.entry_weight(weight, idx, pos).unwrap_or(0.0), i)
                })
                .collect();
            keyed.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.cmp(&b.1)));
            let mut keep = vec![false; entries.len()];
            for &(_, i) in keyed.iter().take(cap) {
                keep[i] = true;
            }
            let mut i = 0;
            entries.retain(|_| {
                let k = keep[i];
                i += 1;
                k
            });
        }
    }
}
