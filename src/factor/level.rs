//! Single-level factorization driver
//!
//! Right-looking Crout elimination of one level: equilibrate, pick a
//! pivot, form the next unit lower column and upper row, drop, update
//! the trailing block in place, and check the termination criterion.
//! The working matrix is held as ordered row maps so that repeated
//! factorizations of the same input are bitwise identical.

use std::collections::BTreeMap;
use std::mem;

use crate::config::{IluConfig, LevelCriterion, RowNormWeight};
use crate::error::{Error, Result};
use crate::factor::dropping::{apply_drop, Candidate, DropContext};
use crate::factor::pivoting::PivotStrategy;
use crate::factor::types::{LevelFactors, SchurVariant};
use crate::factor::DroppingMode;
use crate::sparse::CsrMatrix;

/// Input of one level factorization
pub(crate) struct LevelInput<'a> {
    /// Level matrix (square)
    pub matrix: &'a CsrMatrix,
    /// Drop threshold of this level on the exponent scale
    pub threshold: f64,
    /// Eliminate everything, perturbing zero pivots if needed
    pub force_complete: bool,
    /// Externally supplied level boundary (first level only)
    pub external_final_row: Option<usize>,
    /// Entry capacity to reserve per factor
    pub reserve: usize,
    /// Positional weight table
    pub table: &'a [f64],
}

/// Factor one level; returns the level artifact and the Schur complement
pub(crate) fn factor_level(cfg: &IluConfig, input: &LevelInput<'_>) -> Result<(LevelFactors, CsrMatrix)> {
    let a = input.matrix;
    let n = a.nrows();
    if n == 0 {
        return Ok((empty_level(), CsrMatrix::empty(0, 0)));
    }

    // ------------------------------------------------------------------
    // Equilibration: rows first, then columns of the row-scaled matrix
    // ------------------------------------------------------------------
    let scale_left: Vec<f64> = a
        .row_max_abs()
        .iter()
        .map(|&m| if m > 0.0 { 1.0 / m } else { 1.0 })
        .collect();

    let mut col_max = vec![0.0f64; n];
    for i in 0..n {
        let (cols, vals) = a.row(i);
        for (&j, &v) in cols.iter().zip(vals) {
            col_max[j] = col_max[j].max((v * scale_left[i]).abs());
        }
    }
    let scale_right: Vec<f64> = col_max
        .iter()
        .map(|&m| if m > 0.0 { 1.0 / m } else { 1.0 })
        .collect();

    let mut rows: Vec<BTreeMap<usize, f64>> = vec![BTreeMap::new(); n];
    for i in 0..n {
        let (cols, vals) = a.row(i);
        for (&j, &v) in cols.iter().zip(vals) {
            let s = v * scale_left[i] * scale_right[j];
            if s != 0.0 {
                rows[i].insert(j, s);
            }
        }
    }

    // ------------------------------------------------------------------
    // Elimination state
    // ------------------------------------------------------------------
    let strategy = PivotStrategy::from_config(cfg, input.external_final_row);
    let tau_level = IluConfig::tau(input.threshold);
    let tau_schur = IluConfig::tau(input.threshold + cfg.threshold_shift_schur);
    let tau_post = IluConfig::tau(cfg.post_fact_threshold);

    // Weighted2 only makes sense with position-stable distances.
    let (drop_type_l, drop_type_u) = if cfg.dropping == DroppingMode::Weighted2 {
        (
            crate::factor::DropType::FixedPositional,
            crate::factor::DropType::FixedPositional,
        )
    } else {
        (cfg.drop_type_l, cfg.drop_type_u)
    };

    let band_limit = cfg.bandwidth_offset + (cfg.bandwidth_multiplier * n as f64) as usize;
    let natural_bandwidth = a.bandwidth();
    let mean_density = a.nnz() as f64 / n as f64;

    let mut row_active = vec![true; n];
    let mut col_active = vec![true; n];
    let mut row_order: Vec<usize> = Vec::with_capacity(n);
    let mut col_order: Vec<usize> = Vec::with_capacity(n);

    let init_w = cfg.weights.init_lu;
    let mut linv = vec![init_w; n];
    let mut uinv = vec![init_w; n];
    let mut wgt_l = vec![init_w; n];
    let mut wgt_u = vec![init_w; n];
    let mut max_inv_pivot = 0.0f64;

    let mut lrow_sum = vec![0.0f64; n];
    let mut lrow_max = vec![0.0f64; n];

    let entry_bytes = mem::size_of::<(usize, usize, f64)>();
    let mut l_trip: Vec<(usize, usize, f64)> = Vec::new();
    let mut u_trip: Vec<(usize, usize, f64)> = Vec::new();
    l_trip
        .try_reserve(input.reserve)
        .map_err(|_| Error::OutOfMemory {
            size: input.reserve * entry_bytes,
        })?;
    u_trip
        .try_reserve(input.reserve)
        .map_err(|_| Error::OutOfMemory {
            size: input.reserve * entry_bytes,
        })?;

    let mut zero_pivots = 0usize;
    let mut remaining = n;
    let mut k = 0usize;

    // ------------------------------------------------------------------
    // Elimination loop
    // ------------------------------------------------------------------
    while remaining > 0 {
        let mut choice = strategy.select(&rows, &row_active, &col_active, k);
        if choice.is_none() && (input.force_complete || k == 0) {
            // Forced completion, and a guarantee that every level makes
            // at least one step of progress.
            choice = strategy.natural_choice(&rows, &row_active, &col_active);
        }
        let Some(mut piv) = choice else { break };

        if piv.value.abs() < f64::EPSILON {
            zero_pivots += 1;
            piv.value = if piv.value < 0.0 {
                -cfg.min_pivot
            } else {
                cfg.min_pivot
            };
        }
        let (pr, pc, pv) = (piv.row, piv.col, piv.value);
        max_inv_pivot = max_inv_pivot.max(1.0 / pv.abs());

        // Candidate U row (indexed by column) and L column (indexed by
        // row), both over the active trailing block.
        let mut u_cand: Vec<Candidate> = rows[pr]
            .iter()
            .filter(|&(&j, &v)| col_active[j] && j != pc && v != 0.0)
            .map(|(&j, &v)| (j, 0, v))
            .collect();
        let mut l_cand: Vec<Candidate> = Vec::new();
        for (i, row) in rows.iter().enumerate() {
            if !row_active[i] || i == pr {
                continue;
            }
            if let Some(&v) = row.get(&pc) {
                if v != 0.0 {
                    l_cand.push((i, 0, v / pv));
                }
            }
        }
        // Pivot-order positions for position-stable dropping: trailing
        // entries will land at positions past the current step.
        for (ord, e) in u_cand.iter_mut().enumerate() {
            e.1 = k + 1 + ord;
        }
        for (ord, e) in l_cand.iter_mut().enumerate() {
            e.1 = k + 1 + ord;
        }

        let (w_u, w_l) = mode_weights(cfg, &u_cand, &l_cand, pv, linv[pr], uinv[pc], wgt_l[pr], wgt_u[pc], max_inv_pivot);

        let ctx_u = DropContext {
            tau: tau_level,
            discipline: cfg.discipline,
            drop_type: drop_type_u,
            combine: cfg.combine_rule,
            table: input.table,
            dim: n,
            natural_bandwidth,
            band_limit,
            max_fill: cfg.max_fill_per_row,
            pivot_index: pc,
            step: k,
        };
        let ctx_l = DropContext {
            drop_type: drop_type_l,
            pivot_index: pr,
            ..ctx_u
        };

        let mut u_keep = u_cand.clone();
        let mut l_keep = l_cand.clone();
        apply_drop(&ctx_u, &mut u_keep, w_u);
        apply_drop(&ctx_l, &mut l_keep, w_l);

        // Trailing (Schur) update. The standard variant uses only the
        // retained entries; the improved variant updates with the full
        // candidates and drops from the updated rows afterwards.
        let (u_update, l_update) = match cfg.schur_variant {
            SchurVariant::Standard => (&u_keep, &l_keep),
            SchurVariant::Improved => (&u_cand, &l_cand),
        };
        for &(i, _, lv) in l_update {
            for &(j, _, uv) in u_update {
                let updated = rows[i].get(&j).copied().unwrap_or(0.0) - lv * uv;
                if updated == 0.0 || (tau_schur > 0.0 && updated.abs() < tau_schur) {
                    rows[i].remove(&j);
                } else {
                    rows[i].insert(j, updated);
                }
            }
        }

        // Consume the pivot row and column.
        for (i, row) in rows.iter_mut().enumerate() {
            if row_active[i] && i != pr {
                row.remove(&pc);
            }
        }
        rows[pr].clear();
        row_active[pr] = false;
        col_active[pc] = false;
        row_order.push(pr);
        col_order.push(pc);
        remaining -= 1;

        // Record factors and update running weights.
        for &(j, _, v) in &u_keep {
            u_trip.push((k, j, v));
            let scaled = (v / pv).abs();
            uinv[j] += scaled * uinv[pc];
            match cfg.dropping {
                DroppingMode::Weighted => wgt_u[j] = wgt_u[j].max(scaled),
                DroppingMode::Weighted2 => wgt_u[j] += scaled,
                _ => {}
            }
        }
        u_trip.push((k, pc, pv));
        for &(i, _, v) in &l_keep {
            l_trip.push((k, i, v));
            lrow_sum[i] += v.abs();
            lrow_max[i] = lrow_max[i].max(v.abs());
            linv[i] += v.abs() * linv[pr];
            match cfg.dropping {
                DroppingMode::Weighted => wgt_l[i] = wgt_l[i].max(v.abs()),
                DroppingMode::Weighted2 => wgt_l[i] += v.abs(),
                _ => {}
            }
        }
        k += 1;

        if !input.force_complete
            && remaining > 0
            && criterion_fired(cfg, input, k, n, &rows, &row_active, &lrow_sum, &lrow_max, &u_keep, pv, mean_density)
        {
            break;
        }
    }

    // ------------------------------------------------------------------
    // Assemble permutations, factors, and the Schur complement
    // ------------------------------------------------------------------
    let b = k;
    let mut row_perm = row_order;
    let mut col_perm = col_order;
    for i in 0..n {
        if row_active[i] {
            row_perm.push(i);
        }
        if col_active[i] {
            col_perm.push(i);
        }
    }
    let mut row_pos = vec![0usize; n];
    let mut col_pos = vec![0usize; n];
    for (p, &i) in row_perm.iter().enumerate() {
        row_pos[i] = p;
    }
    for (p, &j) in col_perm.iter().enumerate() {
        col_pos[j] = p;
    }

    let keep_post = |dist: usize, v: f64| -> bool {
        if tau_post == 0.0 {
            return true;
        }
        let w = if cfg.use_pos_compress {
            let size = input.table.len() - 1;
            input.table[(dist * size / n).min(size)]
        } else {
            1.0
        };
        v.abs() * w >= tau_post
    };

    let l_final: Vec<(usize, usize, f64)> = l_trip
        .iter()
        .map(|&(step, i, v)| (row_pos[i], step, v))
        .filter(|&(p, step, v)| keep_post(p - step, v))
        .collect();
    let u_final: Vec<(usize, usize, f64)> = u_trip
        .iter()
        .map(|&(step, j, v)| (step, col_pos[j], v))
        .filter(|&(step, p, v)| p == step || keep_post(p - step, v))
        .collect();

    let l = CsrMatrix::from_triplets(n, b, &l_final)?;
    let u = CsrMatrix::from_triplets(b, n, &u_final)?;

    let mut schur_trip: Vec<(usize, usize, f64)> = Vec::new();
    for (i, row) in rows.iter().enumerate() {
        if !row_active[i] {
            continue;
        }
        for (&j, &v) in row {
            schur_trip.push((row_pos[i] - b, col_pos[j] - b, v));
        }
    }
    let schur = CsrMatrix::from_triplets(n - b, n - b, &schur_trip)?;

    Ok((
        LevelFactors {
            dim: n,
            eliminated: b,
            l,
            u,
            row_perm,
            row_perm_inv: row_pos,
            col_perm,
            col_perm_inv: col_pos,
            scale_left,
            scale_right,
            zero_pivots,
            trivial_zero: false,
        },
        schur,
    ))
}

fn empty_level() -> LevelFactors {
    LevelFactors {
        dim: 0,
        eliminated: 0,
        l: CsrMatrix::empty(0, 0),
        u: CsrMatrix::empty(0, 0),
        row_perm: Vec::new(),
        row_perm_inv: Vec::new(),
        col_perm: Vec::new(),
        col_perm_inv: Vec::new(),
        scale_left: Vec::new(),
        scale_right: Vec::new(),
        zero_pivots: 0,
        trivial_zero: false,
    }
}

/// Magnitude weights of the current U row and L column candidates
#[allow(clippy::too_many_arguments)]
fn mode_weights(
    cfg: &IluConfig,
    u_cand: &[Candidate],
    l_cand: &[Candidate],
    pivot: f64,
    linv_row: f64,
    uinv_col: f64,
    wgt_row: f64,
    wgt_col: f64,
    max_inv_pivot: f64,
) -> (f64, f64) {
    let w = &cfg.weights;
    let abs_piv = pivot.abs();
    let norm2 = |c: &[Candidate], diag: f64| -> f64 {
        (c.iter().map(|e| e.2 * e.2).sum::<f64>() + diag * diag).sqrt()
    };
    let sum1 = |c: &[Candidate]| -> f64 { c.iter().map(|e| e.2.abs()).sum() };

    let (mut w_u, mut w_l) = match cfg.dropping {
        DroppingMode::Standard => (
            w.standard / norm2(u_cand, pivot).max(f64::MIN_POSITIVE),
            w.standard / norm2(l_cand, 1.0).max(f64::MIN_POSITIVE),
        ),
        DroppingMode::StandardAbs => (w.standard_abs, w.standard_abs),
        DroppingMode::Inverse => (w.inverse * linv_row, w.inverse * uinv_col),
        DroppingMode::Weighted => (w.weighted * wgt_row, w.weighted * wgt_col),
        DroppingMode::Weighted2 => (w.weighted * wgt_row, w.weighted * wgt_col),
        DroppingMode::ErrorProp => (
            w.err_prop * (1.0 + sum1(l_cand)),
            w.err_prop * (1.0 + sum1(u_cand) / abs_piv),
        ),
        DroppingMode::ErrorProp2 => (
            w.err_prop2 * (1.0 + sum1(l_cand)) / abs_piv,
            w.err_prop2 * (1.0 + sum1(u_cand) / abs_piv) / abs_piv,
        ),
        DroppingMode::Pivot => (w.pivot / abs_piv, w.pivot / abs_piv),
    };
    if w.scale_invdiag {
        w_u /= abs_piv;
        w_l /= abs_piv;
    }
    if w.scale_max_invdiag {
        w_u *= max_inv_pivot;
        w_l *= max_inv_pivot;
    }
    (w_u, w_l)
}

/// Whether the level termination criterion fires after `eliminated` steps
#[allow(clippy::too_many_arguments)]
fn criterion_fired(
    cfg: &IluConfig,
    input: &LevelInput<'_>,
    eliminated: usize,
    n: usize,
    rows: &[BTreeMap<usize, f64>],
    row_active: &[bool],
    lrow_sum: &[f64],
    lrow_max: &[f64],
    last_u_row: &[Candidate],
    last_pivot: f64,
    mean_density: f64,
) -> bool {
    // An external boundary drives termination by itself.
    if let Some(fr) = input.external_final_row {
        return eliminated > fr && eliminated as f64 >= cfg.ext_min_elim_factor * n as f64;
    }
    if (eliminated as f64) < cfg.min_elim_factor * n as f64 {
        return false;
    }
    match cfg.level_criterion {
        LevelCriterion::Disabled => false,
        LevelCriterion::Density { factor } => {
            let limit = factor * mean_density;
            row_active
                .iter()
                .enumerate()
                .filter(|&(_, &a)| a)
                .all(|(i, _)| rows[i].len() as f64 > limit)
        }
        LevelCriterion::RowNorm {
            weight,
            threshold,
            use_max,
        } => {
            let u_norm = if last_u_row.is_empty() {
                0.0
            } else if use_max {
                last_u_row.iter().fold(0.0f64, |m, e| m.max(e.2.abs()))
            } else {
                last_u_row.iter().map(|e| e.2.abs()).sum::<f64>() / last_u_row.len() as f64
            };
            let scale = match weight {
                RowNormWeight::Plain => 1.0,
                RowNormWeight::URow => u_norm,
                RowNormWeight::URowPivot => u_norm / last_pivot.abs(),
            };
            row_active.iter().enumerate().filter(|&(_, &a)| a).all(|(i, _)| {
                let base = if use_max { lrow_max[i] } else { lrow_sum[i] };
                base * scale > threshold
            })
        }
    }
}
