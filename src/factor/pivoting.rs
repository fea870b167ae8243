//! Pivot and permutation strategy
//!
//! Chooses, at each elimination step, the pivot entry and with it the
//! row and column interchanges. Column pivoting is governed by a
//! tolerance, row pivoting by a scope, and an optional total pivoting
//! phase searches rows and columns jointly.

use std::collections::BTreeMap;

use crate::config::IluConfig;

/// Which rows may be interchanged during elimination
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RowPermutationScope {
    /// Rows stay in natural order
    Never,
    /// Only trailing rows past the externally supplied boundary may be
    /// interchanged; without a boundary this degenerates to `Never`
    FinalRows,
    /// Rows may be interchanged within the block bounded by the
    /// externally supplied boundary; without a boundary this
    /// degenerates to `Global`
    ReorderingBlock,
    /// Any uneliminated row may be interchanged
    #[default]
    Global,
}

/// When joint row and column (total) pivoting takes over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TotalPivotTrigger {
    /// Never
    Never,
    /// Once elimination passes the externally supplied row boundary
    #[default]
    AfterFinalRow,
    /// From the first elimination step
    Immediately,
}

/// The pivot chosen for one elimination step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PivotChoice {
    /// Original level row index
    pub row: usize,
    /// Original level column index
    pub col: usize,
    /// Pivot value
    pub value: f64,
}

/// Pivot selection state built from the configuration
#[derive(Debug, Clone)]
pub struct PivotStrategy {
    pivot_tol: f64,
    row_scope: RowPermutationScope,
    total_pivot: TotalPivotTrigger,
    begin_total_pivot: bool,
    small_pivot_terminates: bool,
    min_pivot: f64,
    final_row: Option<usize>,
}

impl PivotStrategy {
    /// Build the strategy from a configuration and the externally
    /// supplied level boundary, if any
    pub fn from_config(cfg: &IluConfig, final_row: Option<usize>) -> Self {
        Self {
            pivot_tol: cfg.pivot_tol,
            row_scope: cfg.row_scope,
            total_pivot: cfg.total_pivot,
            begin_total_pivot: cfg.begin_total_pivot,
            small_pivot_terminates: cfg.small_pivot_terminates,
            min_pivot: cfg.min_pivot,
            final_row,
        }
    }

    fn total_pivot_active(&self, step: usize) -> bool {
        match self.total_pivot {
            TotalPivotTrigger::Never => false,
            TotalPivotTrigger::Immediately => true,
            TotalPivotTrigger::AfterFinalRow => match self.final_row {
                Some(fr) => {
                    if self.begin_total_pivot {
                        step >= fr
                    } else {
                        step > fr
                    }
                }
                None => false,
            },
        }
    }

    /// Select the pivot for elimination step `step`
    ///
    /// `rows` holds the working rows in original level indices,
    /// `row_active`/`col_active` mark what is still uneliminated.
    /// Returns None when every admissible pivot falls below the
    /// minimum pivot magnitude and small pivots terminate the level,
    /// or when nothing is left to eliminate.
    pub fn select(
        &self,
        rows: &[BTreeMap<usize, f64>],
        row_active: &[bool],
        col_active: &[bool],
        step: usize,
    ) -> Option<PivotChoice> {
        let choice = if self.total_pivot_active(step) {
            self.select_total(rows, row_active, col_active)
        } else {
            let row = self.candidate_row(rows, row_active, col_active)?;
            self.candidate_col(&rows[row], col_active, row)
                .map(|(col, value)| PivotChoice { row, col, value })
        }?;

        if self.small_pivot_terminates && choice.value.abs() < self.min_pivot {
            return None;
        }
        Some(choice)
    }

    /// First uneliminated row in natural order (forced-completion fallback)
    pub fn natural_choice(
        &self,
        rows: &[BTreeMap<usize, f64>],
        row_active: &[bool],
        col_active: &[bool],
    ) -> Option<PivotChoice> {
        let row = row_active.iter().position(|&a| a)?;
        let col = if col_active.get(row) == Some(&true) {
            row
        } else {
            col_active.iter().position(|&a| a)?
        };
        let value = rows[row].get(&col).copied().unwrap_or(0.0);
        Some(PivotChoice { row, col, value })
    }

    /// Joint search over all admissible rows and columns
    fn select_total(
        &self,
        rows: &[BTreeMap<usize, f64>],
        row_active: &[bool],
        col_active: &[bool],
    ) -> Option<PivotChoice> {
        let mut best: Option<PivotChoice> = None;
        for (r, row) in rows.iter().enumerate() {
            if !row_active[r] {
                continue;
            }
            for (&c, &v) in row {
                if !col_active[c] {
                    continue;
                }
                if best.map_or(true, |b| v.abs() > b.value.abs()) {
                    best = Some(PivotChoice {
                        row: r,
                        col: c,
                        value: v,
                    });
                }
            }
        }
        best
    }

    /// Row selection per the configured scope
    fn candidate_row(
        &self,
        rows: &[BTreeMap<usize, f64>],
        row_active: &[bool],
        col_active: &[bool],
    ) -> Option<usize> {
        let natural = || row_active.iter().position(|&a| a);
        match self.row_scope {
            RowPermutationScope::Never => natural(),
            RowPermutationScope::FinalRows => match self.final_row {
                // Rows up to the boundary keep natural order; past it
                // the best remaining row wins.
                Some(fr) => {
                    let first = natural()?;
                    if first <= fr {
                        Some(first)
                    } else {
                        self.best_row(rows, row_active, col_active, |_| true)
                    }
                }
                None => natural(),
            },
            RowPermutationScope::ReorderingBlock => match self.final_row {
                Some(fr) => self
                    .best_row(rows, row_active, col_active, |r| r <= fr)
                    .or_else(|| self.best_row(rows, row_active, col_active, |_| true)),
                None => self.best_row(rows, row_active, col_active, |_| true),
            },
            RowPermutationScope::Global => self.best_row(rows, row_active, col_active, |_| true),
        }
    }

    /// Row with the largest norm-scaled admissible entry; first index
    /// wins ties so that repeated runs pick identical pivots
    fn best_row<F: Fn(usize) -> bool>(
        &self,
        rows: &[BTreeMap<usize, f64>],
        row_active: &[bool],
        col_active: &[bool],
        admissible: F,
    ) -> Option<usize> {
        let mut best: Option<(f64, usize)> = None;
        for (r, row) in rows.iter().enumerate() {
            if !row_active[r] || !admissible(r) {
                continue;
            }
            let mut max_abs = 0.0f64;
            let mut norm = 0.0f64;
            for (&c, &v) in row {
                if col_active[c] {
                    max_abs = max_abs.max(v.abs());
                    norm += v.abs();
                }
            }
            if norm == 0.0 {
                continue;
            }
            let score = max_abs / norm;
            if best.map_or(true, |(s, _)| score > s) {
                best = Some((score, r));
            }
        }
        best.map(|(_, r)| r).or_else(|| {
            // Remaining admissible rows are all structurally empty.
            row_active
                .iter()
                .enumerate()
                .position(|(r, &a)| a && admissible(r))
        })
    }

    /// Column selection within the candidate row: keep the natural
    /// (diagonal) column when it is within tolerance of the row
    /// maximum, otherwise take the maximum
    fn candidate_col(
        &self,
        row: &BTreeMap<usize, f64>,
        col_active: &[bool],
        natural: usize,
    ) -> Option<(usize, f64)> {
        let natural_val = if col_active.get(natural) == Some(&true) {
            row.get(&natural).copied()
        } else {
            None
        };

        if self.pivot_tol >= IluConfig::NEVER_PIVOT {
            // Never pivot: stick to the diagonal even when it is absent.
            if col_active.get(natural) == Some(&true) {
                return Some((natural, natural_val.unwrap_or(0.0)));
            }
        }

        let mut best: Option<(usize, f64)> = None;
        for (&c, &v) in row {
            if !col_active[c] {
                continue;
            }
            if best.map_or(true, |(_, bv)| v.abs() > bv.abs()) {
                best = Some((c, v));
            }
        }
        let (max_col, max_val) = best.or_else(|| {
            col_active
                .iter()
                .position(|&a| a)
                .map(|c| (c, 0.0))
        })?;

        match natural_val {
            Some(nv) if nv.abs() * (1.0 + self.pivot_tol) >= max_val.abs() && nv != 0.0 => {
                Some((natural, nv))
            }
            _ => Some((max_col, max_val)),
        }
    }
}
