//! Compressed sparse row storage and the small set of kernels the
//! factorization engine needs: norms, permutation and scaling
//! application, matrix-vector products, and triangular solves.

mod solve;

pub use solve::{solve_unit_lower, solve_upper};

use crate::error::{Error, Result};

/// CSR (Compressed Sparse Row) sparse matrix with f64 values
#[derive(Debug, Clone, PartialEq)]
pub struct CsrMatrix {
    nrows: usize,
    ncols: usize,
    row_ptrs: Vec<usize>,
    col_indices: Vec<usize>,
    values: Vec<f64>,
}

impl CsrMatrix {
    /// Create a new CSR matrix from components
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `row_ptrs` length != nrows + 1, or it is not monotonically increasing
    /// - `col_indices` and `values` have different lengths
    /// - any column index is >= ncols
    pub fn new(
        nrows: usize,
        ncols: usize,
        row_ptrs: Vec<usize>,
        col_indices: Vec<usize>,
        values: Vec<f64>,
    ) -> Result<Self> {
        if row_ptrs.len() != nrows + 1 {
            return Err(Error::invalid_matrix(format!(
                "row_ptrs length {} does not match nrows + 1 = {}",
                row_ptrs.len(),
                nrows + 1
            )));
        }
        if col_indices.len() != values.len() {
            return Err(Error::invalid_matrix(format!(
                "col_indices length {} does not match values length {}",
                col_indices.len(),
                values.len()
            )));
        }
        if row_ptrs[0] != 0 || row_ptrs[nrows] != values.len() {
            return Err(Error::invalid_matrix(
                "row_ptrs must start at 0 and end at nnz".to_string(),
            ));
        }
        for w in row_ptrs.windows(2) {
            if w[1] < w[0] {
                return Err(Error::invalid_matrix(
                    "row_ptrs must be monotonically increasing".to_string(),
                ));
            }
        }
        if let Some(&bad) = col_indices.iter().find(|&&c| c >= ncols) {
            return Err(Error::invalid_matrix(format!(
                "column index {} out of bounds for {} columns",
                bad, ncols
            )));
        }

        Ok(Self {
            nrows,
            ncols,
            row_ptrs,
            col_indices,
            values,
        })
    }

    /// Build a CSR matrix from (row, col, value) triplets
    ///
    /// Triplets may appear in any order; duplicates are summed.
    pub fn from_triplets(
        nrows: usize,
        ncols: usize,
        triplets: &[(usize, usize, f64)],
    ) -> Result<Self> {
        use std::collections::BTreeMap;

        let mut rows: Vec<BTreeMap<usize, f64>> = vec![BTreeMap::new(); nrows];
        for &(r, c, v) in triplets {
            if r >= nrows || c >= ncols {
                return Err(Error::invalid_matrix(format!(
                    "triplet ({}, {}) out of bounds for {}x{} matrix",
                    r, c, nrows, ncols
                )));
            }
            *rows[r].entry(c).or_insert(0.0) += v;
        }

        let mut row_ptrs = Vec::with_capacity(nrows + 1);
        let mut col_indices = Vec::new();
        let mut values = Vec::new();
        row_ptrs.push(0);
        for row in &rows {
            for (&c, &v) in row {
                col_indices.push(c);
                values.push(v);
            }
            row_ptrs.push(col_indices.len());
        }

        Self::new(nrows, ncols, row_ptrs, col_indices, values)
    }

    /// Identity matrix of dimension n
    pub fn identity(n: usize) -> Self {
        Self {
            nrows: n,
            ncols: n,
            row_ptrs: (0..=n).collect(),
            col_indices: (0..n).collect(),
            values: vec![1.0; n],
        }
    }

    /// Empty matrix (no stored entries)
    pub fn empty(nrows: usize, ncols: usize) -> Self {
        Self {
            nrows,
            ncols,
            row_ptrs: vec![0; nrows + 1],
            col_indices: Vec::new(),
            values: Vec::new(),
        }
    }

    /// Number of rows
    pub fn nrows(&self) -> usize {
        self.nrows
    }

    /// Number of columns
    pub fn ncols(&self) -> usize {
        self.ncols
    }

    /// Number of stored entries
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// Row pointers (length nrows + 1)
    pub fn row_ptrs(&self) -> &[usize] {
        &self.row_ptrs
    }

    /// Column indices for each stored entry
    pub fn col_indices(&self) -> &[usize] {
        &self.col_indices
    }

    /// Values for each stored entry
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Column indices and values of row `i`
    pub fn row(&self, i: usize) -> (&[usize], &[f64]) {
        let start = self.row_ptrs[i];
        let end = self.row_ptrs[i + 1];
        (&self.col_indices[start..end], &self.values[start..end])
    }

    /// Frobenius norm of the stored entries
    pub fn frobenius_norm(&self) -> f64 {
        self.values.iter().map(|v| v * v).sum::<f64>().sqrt()
    }

    /// Largest absolute value among stored entries (0 for an empty matrix)
    pub fn max_abs(&self) -> f64 {
        self.values.iter().fold(0.0, |m, v| m.max(v.abs()))
    }

    /// Infinity norm of each row (maximum absolute entry per row)
    pub fn row_max_abs(&self) -> Vec<f64> {
        (0..self.nrows)
            .map(|i| self.row(i).1.iter().fold(0.0, |m: f64, v| m.max(v.abs())))
            .collect()
    }

    /// Natural bandwidth: maximum |i - j| over stored entries
    pub fn bandwidth(&self) -> usize {
        let mut bw = 0usize;
        for i in 0..self.nrows {
            let (cols, _) = self.row(i);
            for &j in cols {
                bw = bw.max(i.abs_diff(j));
            }
        }
        bw
    }

    /// Dense matrix-vector product y = A·x
    pub fn matvec(&self, x: &[f64]) -> Result<Vec<f64>> {
        if x.len() != self.ncols {
            return Err(Error::DimensionMismatch {
                expected: self.ncols,
                got: x.len(),
            });
        }
        let mut y = vec![0.0; self.nrows];
        for i in 0..self.nrows {
            let (cols, vals) = self.row(i);
            let mut acc = 0.0;
            for (&j, &v) in cols.iter().zip(vals) {
                acc += v * x[j];
            }
            y[i] = acc;
        }
        Ok(y)
    }

    /// Transpose into a new CSR matrix
    pub fn transpose(&self) -> Self {
        let mut counts = vec![0usize; self.ncols];
        for &c in &self.col_indices {
            counts[c] += 1;
        }
        let mut row_ptrs = vec![0usize; self.ncols + 1];
        for j in 0..self.ncols {
            row_ptrs[j + 1] = row_ptrs[j] + counts[j];
        }
        let mut next = row_ptrs.clone();
        let mut col_indices = vec![0usize; self.nnz()];
        let mut values = vec![0.0; self.nnz()];
        for i in 0..self.nrows {
            let (cols, vals) = self.row(i);
            for (&j, &v) in cols.iter().zip(vals) {
                let pos = next[j];
                col_indices[pos] = i;
                values[pos] = v;
                next[j] += 1;
            }
        }
        Self {
            nrows: self.ncols,
            ncols: self.nrows,
            row_ptrs,
            col_indices,
            values,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tridiag(n: usize, lo: f64, di: f64, up: f64) -> CsrMatrix {
        let mut t = Vec::new();
        for i in 0..n {
            if i > 0 {
                t.push((i, i - 1, lo));
            }
            t.push((i, i, di));
            if i + 1 < n {
                t.push((i, i + 1, up));
            }
        }
        CsrMatrix::from_triplets(n, n, &t).unwrap()
    }

    #[test]
    fn test_from_triplets_sorts_and_sums() {
        let a = CsrMatrix::from_triplets(2, 2, &[(0, 1, 2.0), (0, 0, 1.0), (0, 1, 3.0)]).unwrap();
        assert_eq!(a.row(0), (&[0usize, 1][..], &[1.0, 5.0][..]));
        assert_eq!(a.row(1).0.len(), 0);
    }

    #[test]
    fn test_new_rejects_bad_row_ptrs() {
        let r = CsrMatrix::new(2, 2, vec![0, 2, 1], vec![0, 1], vec![1.0, 2.0]);
        assert!(r.is_err());
    }

    #[test]
    fn test_new_rejects_out_of_bounds_column() {
        let r = CsrMatrix::new(1, 2, vec![0, 1], vec![2], vec![1.0]);
        assert!(r.is_err());
    }

    #[test]
    fn test_matvec_tridiagonal() {
        let a = tridiag(4, 1.0, 4.0, 1.0);
        let y = a.matvec(&[1.0, 2.0, 3.0, 4.0]).unwrap();
        assert_eq!(y, vec![6.0, 12.0, 18.0, 19.0]);
    }

    #[test]
    fn test_transpose_roundtrip() {
        let a = CsrMatrix::from_triplets(2, 3, &[(0, 2, 1.5), (1, 0, -2.0), (1, 1, 3.0)]).unwrap();
        let at = a.transpose();
        assert_eq!(at.nrows(), 3);
        assert_eq!(at.ncols(), 2);
        assert_eq!(at.transpose(), a);
    }

    #[test]
    fn test_norms() {
        let a = CsrMatrix::from_triplets(2, 2, &[(0, 0, 3.0), (1, 0, -4.0)]).unwrap();
        assert_eq!(a.max_abs(), 4.0);
        assert!((a.frobenius_norm() - 5.0).abs() < 1e-15);
        assert_eq!(CsrMatrix::empty(2, 2).max_abs(), 0.0);
        assert_eq!(a.row_max_abs(), vec![3.0, 4.0]);
    }

    #[test]
    fn test_bandwidth() {
        let a = tridiag(5, 1.0, 4.0, 1.0);
        assert_eq!(a.bandwidth(), 1);
        assert_eq!(CsrMatrix::identity(3).bandwidth(), 0);
    }
}
