//! Multilevel factorization orchestrator
//!
//! Drives the level factorization in a loop: factor the current matrix,
//! keep the level artifact, and continue on the Schur complement until
//! it is empty, numerically zero, or the level limit is reached. The
//! artifacts form a flat array; application walks it forward (scaling,
//! row permutation, unit lower solve) and then backward (upper solve,
//! column permutation, unscaling) without recursion.

use crate::config::IluConfig;
use crate::error::{Error, Result};
use crate::factor::level::{factor_level, LevelInput};
use crate::factor::types::{FactorMetrics, LevelFactors, LevelMetrics, PrecondSide};
use crate::sparse::{solve_unit_lower, solve_upper, CsrMatrix};

/// Multilevel incomplete LU preconditioner
///
/// Built once from a square sparse matrix, then applied to vectors as
/// an approximate inverse. Construction and application are both
/// deterministic for a fixed matrix and configuration.
#[derive(Debug, Clone)]
pub struct MultilevelIlu {
    config: IluConfig,
    levels: Vec<LevelFactors>,
    metrics: FactorMetrics,
    n: usize,
}

impl MultilevelIlu {
    /// Compute the multilevel factorization of `a`
    ///
    /// # Errors
    ///
    /// Returns an error when the configuration is inconsistent, the
    /// matrix is not square, a factor allocation fails, or a required
    /// zero Schur block is not reached.
    pub fn compute(a: &CsrMatrix, config: IluConfig) -> Result<Self> {
        config.validate()?;
        if a.nrows() != a.ncols() {
            return Err(Error::invalid_matrix(format!(
                "matrix must be square, got {} x {}",
                a.nrows(),
                a.ncols()
            )));
        }

        let n = a.nrows();
        let original_nnz = a.nnz();
        let table = config.make_weight_table();
        let mem_exp = config.variable_mem.exponent();

        let mut levels: Vec<LevelFactors> = Vec::new();
        let mut per_level: Vec<LevelMetrics> = Vec::new();
        let mut zero_pivots = 0usize;
        let mut zero_block_dim = 0usize;
        let mut reallocations = 0usize;

        let mut current = a.clone();
        let mut level_idx = 0usize;
        while current.nrows() > 0 {
            let nk = current.nrows();
            let force_complete =
                level_idx + 1 == config.max_levels || nk <= config.min_ml_size.max(1);
            let threshold = if force_complete && config.use_final_threshold {
                config.final_threshold
            } else {
                config.level_threshold(level_idx)
            };
            let shrink = (nk as f64 / n as f64).powi(mem_exp);
            let reserve = (config.mem_factor * shrink * original_nnz as f64) as usize;
            let input = LevelInput {
                matrix: &current,
                threshold,
                force_complete,
                external_final_row: if level_idx == 0 {
                    config.external_final_row
                } else {
                    None
                },
                reserve,
                table: &table,
            };

            let (factors, schur) = factor_level(&config, &input)?;
            zero_pivots += factors.zero_pivots;
            if factors.nnz() > 2 * reserve {
                reallocations += 1;
            }
            per_level.push(LevelMetrics {
                dim: factors.dim,
                eliminated: factors.eliminated,
                l_nnz: factors.l.nnz(),
                u_nnz: factors.u.nnz(),
                zero_pivots: factors.zero_pivots,
            });
            levels.push(factors);

            let sd = schur.nrows();
            if sd == 0 {
                break;
            }
            let numerically_zero = schur.nnz() == 0
                || (config.use_thres_zero_schur
                    && sd <= config.min_size_zero_schur
                    && schur.frobenius_norm() < config.threshold_zero_schur);
            if numerically_zero {
                zero_block_dim = sd;
                per_level.push(LevelMetrics {
                    dim: sd,
                    eliminated: sd,
                    l_nnz: 0,
                    u_nnz: 0,
                    zero_pivots: 0,
                });
                levels.push(LevelFactors::trivial_zero(sd));
                break;
            }

            current = schur;
            level_idx += 1;
        }

        if config.require_zero_schur && zero_block_dim < config.req_zero_schur_size {
            return Err(Error::ZeroSchurNotReached {
                reached: zero_block_dim,
                required: config.req_zero_schur_size,
            });
        }

        let total_nnz: usize = levels.iter().map(LevelFactors::nnz).sum();
        let metrics = FactorMetrics {
            n,
            levels: levels.len(),
            original_nnz,
            total_nnz,
            fill_ratio: if original_nnz > 0 {
                total_nnz as f64 / original_nnz as f64
            } else {
                0.0
            },
            zero_pivots,
            zero_block_dim,
            reallocations,
            per_level,
        };

        Ok(Self {
            config,
            levels,
            metrics,
            n,
        })
    }

    /// Apply the preconditioner: `M^{-1} v`
    ///
    /// # Errors
    ///
    /// Returns [`Error::DimensionMismatch`] when `v` has the wrong
    /// length, or an internal error on a zero stored diagonal.
    pub fn apply(&self, v: &[f64]) -> Result<Vec<f64>> {
        let mut work = self.check_input(v)?;
        self.forward(&mut work)?;
        self.backward(&mut work)?;
        Ok(work)
    }

    /// Apply one factor of the split form `M = M_left M_right`
    ///
    /// `apply(v)` equals `apply_split(Right, apply_split(Left, v))`.
    ///
    /// # Errors
    ///
    /// Same conditions as [`MultilevelIlu::apply`].
    pub fn apply_split(&self, side: PrecondSide, v: &[f64]) -> Result<Vec<f64>> {
        let mut work = self.check_input(v)?;
        match side {
            PrecondSide::Left => self.forward(&mut work)?,
            PrecondSide::Right => self.backward(&mut work)?,
        }
        Ok(work)
    }

    fn check_input(&self, v: &[f64]) -> Result<Vec<f64>> {
        if v.len() != self.n {
            return Err(Error::DimensionMismatch {
                expected: self.n,
                got: v.len(),
            });
        }
        Ok(v.to_vec())
    }

    /// Forward sweep: scaling, row permutation, and unit lower solves
    fn forward(&self, work: &mut [f64]) -> Result<()> {
        let mut offset = 0usize;
        for lvl in &self.levels {
            if lvl.trivial_zero {
                break;
            }
            let seg = &mut work[offset..offset + lvl.dim];
            let mut y: Vec<f64> = (0..lvl.dim)
                .map(|p| {
                    let i = lvl.row_perm[p];
                    seg[i] * lvl.scale_left[i]
                })
                .collect();
            solve_unit_lower(&lvl.l, &mut y)?;
            seg.copy_from_slice(&y);
            offset += lvl.eliminated;
        }
        Ok(())
    }

    /// Backward sweep: upper solves, column permutation, and unscaling
    fn backward(&self, work: &mut [f64]) -> Result<()> {
        let mut offsets = Vec::with_capacity(self.levels.len());
        let mut offset = 0usize;
        for lvl in &self.levels {
            offsets.push(offset);
            offset += lvl.eliminated;
        }
        for (lvl, &off) in self.levels.iter().zip(&offsets).rev() {
            let seg = &mut work[off..off + lvl.dim];
            if lvl.trivial_zero {
                // A zero Schur block contributes nothing to the solution.
                seg.fill(0.0);
                continue;
            }
            solve_upper(&lvl.u, seg)?;
            let mut tmp = vec![0.0f64; lvl.dim];
            for (p, &j) in lvl.col_perm.iter().enumerate() {
                tmp[j] = seg[p];
            }
            for (i, s) in seg.iter_mut().enumerate() {
                *s = tmp[i] * lvl.scale_right[i];
            }
        }
        Ok(())
    }

    /// Matrix dimension
    pub fn dim(&self) -> usize {
        self.n
    }

    /// Number of levels including a trailing trivial zero block
    pub fn levels(&self) -> usize {
        self.levels.len()
    }

    /// Stored entries across all level factors
    pub fn nnz(&self) -> usize {
        self.levels.iter().map(LevelFactors::nnz).sum()
    }

    /// Zero pivots perturbed during construction
    pub fn zero_pivots(&self) -> usize {
        self.metrics.zero_pivots
    }

    /// Dimension of the trailing zero Schur block, 0 when absent
    pub fn zero_block_dim(&self) -> usize {
        self.metrics.zero_block_dim
    }

    /// Construction diagnostics
    pub fn metrics(&self) -> &FactorMetrics {
        &self.metrics
    }

    /// Configuration the factorization was built with
    pub fn config(&self) -> &IluConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LevelCriterion;
    use approx::assert_relative_eq;

    fn tridiag(n: usize, diag: f64, off: f64) -> CsrMatrix {
        let mut trip = Vec::new();
        for i in 0..n {
            trip.push((i, i, diag));
            if i > 0 {
                trip.push((i, i - 1, off));
            }
            if i + 1 < n {
                trip.push((i, i + 1, off));
            }
        }
        CsrMatrix::from_triplets(n, n, &trip).unwrap()
    }

    fn keep_all_config() -> IluConfig {
        let mut cfg = IluConfig::default();
        cfg.threshold = 1000.0;
        cfg.level_criterion = LevelCriterion::Disabled;
        cfg
    }

    #[test]
    fn test_exact_solve_on_tridiagonal() {
        // with no dropping the preconditioner inverts the matrix
        let n = 20;
        let a = tridiag(n, 4.0, -1.0);
        let m = MultilevelIlu::compute(&a, keep_all_config()).unwrap();
        let x: Vec<f64> = (0..n).map(|i| (i as f64 * 0.7).sin() + 1.5).collect();
        let b = a.matvec(&x).unwrap();
        let got = m.apply(&b).unwrap();
        for (g, e) in got.iter().zip(&x) {
            assert_relative_eq!(g, e, max_relative = 1e-10);
        }
    }

    #[test]
    fn test_split_application_composes() {
        let a = tridiag(12, 3.0, -1.0);
        let m = MultilevelIlu::compute(&a, keep_all_config()).unwrap();
        let v: Vec<f64> = (0..12).map(|i| 1.0 + i as f64).collect();
        let left = m.apply_split(PrecondSide::Left, &v).unwrap();
        let full = m.apply_split(PrecondSide::Right, &left).unwrap();
        let direct = m.apply(&v).unwrap();
        assert_eq!(full, direct);
    }

    #[test]
    fn test_single_level_cap() {
        let mut cfg = keep_all_config();
        cfg.max_levels = 1;
        let a = tridiag(15, 4.0, -1.0);
        let m = MultilevelIlu::compute(&a, cfg).unwrap();
        assert_eq!(m.levels(), 1);
        assert_eq!(m.metrics().per_level[0].eliminated, 15);
    }

    #[test]
    fn test_dimension_mismatch() {
        let a = tridiag(5, 2.0, -1.0);
        let m = MultilevelIlu::compute(&a, keep_all_config()).unwrap();
        let err = m.apply(&[1.0, 2.0]).unwrap_err();
        assert!(matches!(
            err,
            Error::DimensionMismatch {
                expected: 5,
                got: 2
            }
        ));
    }

    #[test]
    fn test_rejects_non_square() {
        let a = CsrMatrix::from_triplets(2, 3, &[(0, 0, 1.0)]).unwrap();
        let err = MultilevelIlu::compute(&a, IluConfig::default()).unwrap_err();
        assert!(matches!(err, Error::InvalidMatrix { .. }));
    }

    #[test]
    fn test_one_by_one() {
        let a = CsrMatrix::from_triplets(1, 1, &[(0, 0, 3.0)]).unwrap();
        let m = MultilevelIlu::compute(&a, keep_all_config()).unwrap();
        let got = m.apply(&[6.0]).unwrap();
        assert_relative_eq!(got[0], 2.0, max_relative = 1e-14);
    }

    #[test]
    fn test_deterministic_reconstruction() {
        let a = tridiag(10, 5.0, 1.0);
        let m1 = MultilevelIlu::compute(&a, IluConfig::default()).unwrap();
        let m2 = MultilevelIlu::compute(&a, IluConfig::default()).unwrap();
        let v: Vec<f64> = (0..10).map(|i| (i as f64).cos()).collect();
        assert_eq!(m1.apply(&v).unwrap(), m2.apply(&v).unwrap());
        assert_eq!(m1.nnz(), m2.nnz());
    }

    #[test]
    fn test_require_zero_schur_not_reached() {
        let mut cfg = keep_all_config();
        cfg.small_pivot_terminates = true;
        cfg.use_thres_zero_schur = true;
        cfg.require_zero_schur = true;
        cfg.req_zero_schur_size = 3;
        let a = tridiag(8, 4.0, -1.0);
        let err = MultilevelIlu::compute(&a, cfg).unwrap_err();
        assert!(matches!(
            err,
            Error::ZeroSchurNotReached {
                reached: 0,
                required: 3
            }
        ));
    }

    #[test]
    fn test_zero_schur_block_detected() {
        // a rank-one trailing block turns into a zero Schur complement
        let a = CsrMatrix::from_triplets(
            3,
            3,
            &[
                (0, 0, 2.0),
                (0, 1, 1.0),
                (0, 2, 1.0),
                (1, 0, 2.0),
                (1, 1, 1.0),
                (1, 2, 1.0),
                (2, 0, 2.0),
                (2, 1, 1.0),
                (2, 2, 1.0),
            ],
        )
        .unwrap();
        let mut cfg = keep_all_config();
        cfg.small_pivot_terminates = true;
        cfg.total_pivot = crate::factor::TotalPivotTrigger::Never;
        let m = MultilevelIlu::compute(&a, cfg).unwrap();
        assert_eq!(m.zero_block_dim(), 2);
        // the zero block maps to zero output on its segment
        let out = m.apply(&[1.0, 1.0, 1.0]).unwrap();
        assert_eq!(out.len(), 3);
    }

    #[test]
    fn test_near_zero_schur_block_factored_trivially() {
        // nearly rank-one: elimination leaves a 1x1 Schur block of ~1e-9
        let a = CsrMatrix::from_triplets(
            2,
            2,
            &[(0, 0, 1.0), (0, 1, 1.0), (1, 0, 1.0), (1, 1, 1.0 + 1e-9)],
        )
        .unwrap();
        let mut cfg = keep_all_config();
        cfg.small_pivot_terminates = true;
        cfg.use_thres_zero_schur = true;
        let m = MultilevelIlu::compute(&a, cfg).unwrap();
        assert_eq!(m.zero_block_dim(), 1);
        assert_eq!(m.levels(), 2);
        // the tiny block contributes zero instead of being re-scaled
        // and inverted, so the output stays bounded
        let out = m.apply(&[1.0, 2.0]).unwrap();
        assert!(out.iter().all(|x| x.abs() < 1e3), "output blew up: {:?}", out);
    }

    #[test]
    fn test_metrics_totals() {
        let a = tridiag(9, 4.0, -1.0);
        let m = MultilevelIlu::compute(&a, keep_all_config()).unwrap();
        let metrics = m.metrics();
        assert_eq!(metrics.n, 9);
        assert_eq!(metrics.original_nnz, a.nnz());
        assert_eq!(metrics.total_nnz, m.nnz());
        assert_eq!(
            metrics.per_level.iter().map(|l| l.eliminated).sum::<usize>(),
            9
        );
    }
}
