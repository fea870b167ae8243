//! Types for the multilevel factorization
//!
//! Contains level artifacts, option enums shared between the dropping,
//! pivoting, and driver modules, and diagnostic types.

use crate::sparse::CsrMatrix;

// ============================================================================
// Shared option enums
// ============================================================================

/// Schur complement assembly variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SchurVariant {
    /// Update the trailing block with the retained factor entries only
    #[default]
    Standard,
    /// Update the trailing block with the full candidate vectors before
    /// dropping, then drop from the updated rows
    Improved,
}

/// Side of a split preconditioning scheme
///
/// The multilevel factorization splits as M = M_left * M_right, where
/// the left part carries the scalings, row permutations and unit lower
/// factors of every level, and the right part carries the upper factors
/// and column permutations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrecondSide {
    /// Forward half: scalings, row permutations, unit lower solves
    Left,
    /// Backward half: upper solves, column permutations, scalings
    Right,
}

// ============================================================================
// Level artifact
// ============================================================================

/// Factorization artifact of a single level
///
/// The level's input matrix A (dim x dim) satisfies, up to dropping,
/// `P * (D_l A D_r) * Q = [L11 0; L21 I] * [U11 U12; 0 S]` where b =
/// `eliminated` rows/columns were factored and S is the Schur
/// complement handed to the next level.
#[derive(Debug, Clone)]
pub struct LevelFactors {
    /// Dimension of the level's input matrix
    pub dim: usize,
    /// Number of eliminated rows/columns (b)
    pub eliminated: usize,
    /// Unit lower trapezoidal factor, dim x b, implicit unit diagonal
    pub l: CsrMatrix,
    /// Upper trapezoidal factor, b x dim, explicit diagonal
    pub u: CsrMatrix,
    /// Row permutation: position k holds the original level row index
    pub row_perm: Vec<usize>,
    /// Inverse of `row_perm`
    pub row_perm_inv: Vec<usize>,
    /// Column permutation: position k holds the original level column index
    pub col_perm: Vec<usize>,
    /// Inverse of `col_perm`
    pub col_perm_inv: Vec<usize>,
    /// Left (row) equilibration scaling, original level order
    pub scale_left: Vec<f64>,
    /// Right (column) equilibration scaling, original level order
    pub scale_right: Vec<f64>,
    /// Number of pivots that had to be perturbed away from zero
    pub zero_pivots: usize,
    /// This level is a trivially factored zero block (L = U = I, zero
    /// diagonal, generalized-inverse application maps it to zero)
    pub trivial_zero: bool,
}

impl LevelFactors {
    /// Trivial factorization of a numerically zero block
    pub fn trivial_zero(dim: usize) -> Self {
        Self {
            dim,
            eliminated: dim,
            l: CsrMatrix::empty(dim, dim),
            u: CsrMatrix::empty(dim, dim),
            row_perm: (0..dim).collect(),
            row_perm_inv: (0..dim).collect(),
            col_perm: (0..dim).collect(),
            col_perm_inv: (0..dim).collect(),
            scale_left: vec![1.0; dim],
            scale_right: vec![1.0; dim],
            zero_pivots: 0,
            trivial_zero: true,
        }
    }

    /// Stored entries in both factors
    pub fn nnz(&self) -> usize {
        self.l.nnz() + self.u.nnz()
    }
}

// ============================================================================
// Diagnostics
// ============================================================================

/// Per-level diagnostics
#[derive(Debug, Clone)]
pub struct LevelMetrics {
    /// Dimension of the level's input matrix
    pub dim: usize,
    /// Eliminated rows/columns
    pub eliminated: usize,
    /// Stored entries of the unit lower factor
    pub l_nnz: usize,
    /// Stored entries of the upper factor
    pub u_nnz: usize,
    /// Perturbed zero pivots
    pub zero_pivots: usize,
}

/// Metrics of a completed multilevel factorization
#[derive(Debug, Clone)]
pub struct FactorMetrics {
    /// Dimension of the input matrix
    pub n: usize,
    /// Number of levels, including a trivial zero block if present
    pub levels: usize,
    /// Stored entries of the input matrix
    pub original_nnz: usize,
    /// Stored entries across all level factors
    pub total_nnz: usize,
    /// total_nnz / original_nnz
    pub fill_ratio: f64,
    /// Perturbed zero pivots across all levels
    pub zero_pivots: usize,
    /// Dimension of the trivially factored zero block (0 if none)
    pub zero_block_dim: usize,
    /// Levels whose factors outgrew the memory reservation
    pub reallocations: usize,
    /// Per-level breakdown
    pub per_level: Vec<LevelMetrics>,
}

impl std::fmt::Display for FactorMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "multilevel ILU: n = {}, levels = {}, fill ratio = {:.2}",
            self.n, self.levels, self.fill_ratio
        )?;
        for (k, m) in self.per_level.iter().enumerate() {
            writeln!(
                f,
                "  level {}: dim = {}, eliminated = {}, nnz(L) = {}, nnz(U) = {}, zero pivots = {}",
                k, m.dim, m.eliminated, m.l_nnz, m.u_nnz, m.zero_pivots
            )?;
        }
        if self.zero_block_dim > 0 {
            writeln!(f, "  zero Schur block of dimension {}", self.zero_block_dim)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trivial_zero_level() {
        let lvl = LevelFactors::trivial_zero(5);
        assert!(lvl.trivial_zero);
        assert_eq!(lvl.dim, 5);
        assert_eq!(lvl.eliminated, 5);
        assert_eq!(lvl.nnz(), 0);
        assert_eq!(lvl.row_perm, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_metrics_display() {
        let m = FactorMetrics {
            n: 4,
            levels: 1,
            original_nnz: 10,
            total_nnz: 12,
            fill_ratio: 1.2,
            zero_pivots: 0,
            zero_block_dim: 0,
            reallocations: 0,
            per_level: vec![LevelMetrics {
                dim: 4,
                eliminated: 4,
                l_nnz: 5,
                u_nnz: 7,
                zero_pivots: 0,
            }],
        };
        let s = m.to_string();
        assert!(s.contains("levels = 1"));
        assert!(s.contains("level 0"));
    }
}
