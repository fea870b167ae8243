//! Triangular substitution on CSR factors
//!
//! Forward and backward substitution specialized to the factor shapes
//! the level driver produces: a unit lower trapezoidal L (n x b) and an
//! upper trapezoidal U (b x n) with explicit diagonal.

use crate::error::{Error, Result};
use crate::sparse::CsrMatrix;

/// Forward substitution with a unit lower trapezoidal factor, in place
///
/// `l` is n x b with an implicit unit diagonal; every stored entry of
/// row i has column index < min(i, b). Overwrites `x` with the solution
/// of the leading b x b system extended by the rectangular tail:
///
/// # Algorithm
///
/// For i = 0 to n-1:
///   `x[i]` -= sum(`L[i,k]` * `x[k]` for stored k)
pub fn solve_unit_lower(l: &CsrMatrix, x: &mut [f64]) -> Result<()> {
    if x.len() != l.nrows() {
        return Err(Error::DimensionMismatch {
            expected: l.nrows(),
            got: x.len(),
        });
    }
    for i in 0..l.nrows() {
        let (cols, vals) = l.row(i);
        let mut acc = x[i];
        for (&k, &v) in cols.iter().zip(vals) {
            acc -= v * x[k];
        }
        x[i] = acc;
    }
    Ok(())
}

/// Backward substitution with an upper trapezoidal factor, in place
///
/// `u` is b x n; row k holds the diagonal pivot at column k plus
/// entries at columns > k (including the rectangular block at columns
/// >= b, whose solution values must already be present in `x`).
///
/// # Algorithm
///
/// For k = b-1 down to 0:
///   `x[k]` = (`x[k]` - sum(`U[k,j]` * `x[j]` for j > k)) / `U[k,k]`
pub fn solve_upper(u: &CsrMatrix, x: &mut [f64]) -> Result<()> {
    if x.len() != u.ncols() {
        return Err(Error::DimensionMismatch {
            expected: u.ncols(),
            got: x.len(),
        });
    }
    for k in (0..u.nrows()).rev() {
        let (cols, vals) = u.row(k);
        let mut acc = x[k];
        let mut diag = 0.0;
        for (&j, &v) in cols.iter().zip(vals) {
            if j == k {
                diag = v;
            } else {
                acc -= v * x[j];
            }
        }
        if diag == 0.0 {
            return Err(Error::Internal(format!("zero diagonal in U at row {}", k)));
        }
        x[k] = acc / diag;
    }
    Ok(())
}
