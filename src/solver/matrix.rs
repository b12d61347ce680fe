//! Dense square matrix and LU factorization with partial pivoting.
//!
//! The MNA system of a lumped netlist is small and dense enough that a
//! row-major `Vec<f64>` with Gaussian elimination beats any sparse setup.

use std::fmt;

use crate::error::{Result, TransimError};

use super::PIVOT_TOLERANCE;

/// Dense square matrix stored row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct DenseMatrix {
    data: Vec<f64>,
    size: usize,
}

impl DenseMatrix {
    /// Create a `size × size` matrix of zeros.
    pub fn zeros(size: usize) -> Self {
        Self {
            data: vec![0.0; size * size],
            size,
        }
    }

    /// Create a `size × size` identity matrix.
    pub fn identity(size: usize) -> Self {
        let mut m = Self::zeros(size);
        for i in 0..size {
            m.set(i, i, 1.0);
        }
        m
    }

    /// Build a matrix from row slices. All rows must have `rows.len()` entries.
    pub fn from_rows(rows: &[&[f64]]) -> Result<Self> {
        let size = rows.len();
        let mut m = Self::zeros(size);
        for (i, row) in rows.iter().enumerate() {
            if row.len() != size {
                return Err(TransimError::invalid_simulation_param(format!(
                    "row {} has {} entries, expected {}",
                    i,
                    row.len(),
                    size
                )));
            }
            m.data[i * size..(i + 1) * size].copy_from_slice(row);
        }
        Ok(m)
    }

    /// Matrix dimension.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Reset every entry to zero, keeping the dimension.
    pub fn clear(&mut self) {
        self.data.fill(0.0);
    }

    /// Get matrix element at (row, col).
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[row * self.size + col]
    }

    /// Set matrix element at (row, col).
    pub fn set(&mut self, row: usize, col: usize, value: f64) {
        self.data[row * self.size + col] = value;
    }

    /// Add to matrix element at (row, col).
    pub fn add(&mut self, row: usize, col: usize, value: f64) {
        self.data[row * self.size + col] += value;
    }

    /// Stamp a conductance between two matrix rows (`None` is ground).
    ///
    /// ```text
    /// A[a,a] += g   A[a,b] -= g
    /// A[b,a] -= g   A[b,b] += g
    /// ```
    pub fn stamp_conductance(&mut self, a: Option<usize>, b: Option<usize>, g: f64) {
        if let Some(i) = a {
            self.add(i, i, g);
        }
        if let Some(j) = b {
            self.add(j, j, g);
        }
        if let (Some(i), Some(j)) = (a, b) {
            self.add(i, j, -g);
            self.add(j, i, -g);
        }
    }

    /// Stamp the incidence pattern of a branch current `br` flowing from
    /// `a` through the element to `b`, plus the KVL row `V[a] - V[b]`.
    pub fn stamp_branch_incidence(&mut self, a: Option<usize>, b: Option<usize>, br: usize) {
        if let Some(i) = a {
            self.add(br, i, 1.0);
            self.add(i, br, 1.0);
        }
        if let Some(j) = b {
            self.add(br, j, -1.0);
            self.add(j, br, -1.0);
        }
    }

    /// Largest absolute entry, used to scale the singularity threshold.
    pub fn max_abs(&self) -> f64 {
        self.data.iter().fold(0.0f64, |acc, v| acc.max(v.abs()))
    }

    /// Compute `A·x`.
    pub fn mul_vec(&self, x: &[f64]) -> Vec<f64> {
        let n = self.size;
        (0..n)
            .map(|i| {
                self.data[i * n..(i + 1) * n]
                    .iter()
                    .zip(x)
                    .map(|(a, b)| a * b)
                    .sum()
            })
            .collect()
    }

    /// Factorize this matrix. Never fails; inspect
    /// [`LuDecomposition::is_nonsingular`] or call `solve` to find out.
    pub fn lu(&self) -> LuDecomposition {
        LuDecomposition::new(self)
    }
}

impl fmt::Display for DenseMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for i in 0..self.size {
            let row: Vec<String> = (0..self.size)
                .map(|j| format!("{:>12.4e}", self.get(i, j)))
                .collect();
            writeln!(f, "[{}]", row.join(" "))?;
        }
        Ok(())
    }
}

/// LU decomposition `P·A = L·U` computed with partial pivoting.
#[derive(Debug, Clone)]
pub struct LuDecomposition {
    /// Combined L (below diagonal, unit diagonal implied) and U factors
    lu: Vec<f64>,
    /// Row permutation: row `i` of `P·A` is row `pivots[i]` of `A`
    pivots: Vec<usize>,
    size: usize,
    /// First row where elimination met a pivot below tolerance
    singular_row: Option<usize>,
}

impl LuDecomposition {
    /// Factorize `matrix` by Gaussian elimination with partial pivoting.
    pub fn new(matrix: &DenseMatrix) -> Self {
        let n = matrix.size;
        let mut lu = matrix.data.clone();
        let mut pivots: Vec<usize> = (0..n).collect();
        // Pivots are judged against the largest entry of their own original
        // row, so tiny admittances next to huge ones still count.
        let row_scale: Vec<f64> = (0..n)
            .map(|i| lu[i * n..(i + 1) * n].iter().fold(0.0f64, |m, v| m.max(v.abs())))
            .collect();
        let mut singular_row = None;

        for k in 0..n {
            // Find pivot
            let mut max_val = lu[k * n + k].abs();
            let mut max_row = k;
            for i in (k + 1)..n {
                let val = lu[i * n + k].abs();
                if val > max_val {
                    max_val = val;
                    max_row = i;
                }
            }

            let threshold = PIVOT_TOLERANCE * row_scale[pivots[max_row]];
            if !(max_val > threshold) || max_val < f64::MIN_POSITIVE {
                singular_row.get_or_insert(k);
                continue;
            }

            if max_row != k {
                pivots.swap(k, max_row);
                for j in 0..n {
                    lu.swap(k * n + j, max_row * n + j);
                }
            }

            // Eliminate
            let pivot = lu[k * n + k];
            for i in (k + 1)..n {
                let factor = lu[i * n + k] / pivot;
                lu[i * n + k] = factor;
                if factor != 0.0 {
                    for j in (k + 1)..n {
                        lu[i * n + j] -= factor * lu[k * n + j];
                    }
                }
            }
        }

        Self {
            lu,
            pivots,
            size: n,
            singular_row,
        }
    }

    /// Dimension of the factorized matrix.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Whether every pivot cleared the singularity threshold.
    pub fn is_nonsingular(&self) -> bool {
        self.singular_row.is_none()
    }

    /// Solve `A·x = b` for a single right-hand side.
    pub fn solve(&self, b: &[f64]) -> Result<Vec<f64>> {
        if let Some(row) = self.singular_row {
            return Err(TransimError::SingularSystem { row });
        }
        let n = self.size;
        if b.len() != n {
            return Err(TransimError::invalid_simulation_param(format!(
                "right-hand side has {} entries, expected {}",
                b.len(),
                n
            )));
        }

        // Apply pivot permutation (P·b)
        let mut x: Vec<f64> = self.pivots.iter().map(|&p| b[p]).collect();

        // Forward substitution (L·y = P·b)
        for i in 0..n {
            let mut sum = x[i];
            for j in 0..i {
                sum -= self.lu[i * n + j] * x[j];
            }
            x[i] = sum;
        }

        // Back substitution (U·x = y)
        for i in (0..n).rev() {
            let mut sum = x[i];
            for j in (i + 1)..n {
                sum -= self.lu[i * n + j] * x[j];
            }
            x[i] = sum / self.lu[i * n + i];
        }

        Ok(x)
    }

    /// Solve `A·X = B` for several right-hand sides, one per entry of
    /// `columns`.
    pub fn solve_matrix(&self, columns: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
        columns.iter().map(|b| self.solve(b)).collect()
    }

    /// `A⁻¹`, as rows.
    pub fn inverse(&self) -> Result<DenseMatrix> {
        let n = self.size;
        let mut out = DenseMatrix::zeros(n);
        let unit: Vec<Vec<f64>> = (0..n)
            .map(|j| (0..n).map(|i| if i == j { 1.0 } else { 0.0 }).collect())
            .collect();
        for (j, column) in self.solve_matrix(&unit)?.into_iter().enumerate() {
            for (i, v) in column.into_iter().enumerate() {
                out.set(i, j, v);
            }
        }
        Ok(out)
    }

    /// Determinant of the factorized matrix (zero when singular).
    pub fn determinant(&self) -> f64 {
        if self.singular_row.is_some() {
            return 0.0;
        }
        let n = self.size;
        let mut det: f64 = (0..n).map(|i| self.lu[i * n + i]).product();
        // Parity of the permutation
        let mut visited = vec![false; n];
        for start in 0..n {
            if visited[start] {
                continue;
            }
            let mut len = 0;
            let mut i = start;
            while !visited[i] {
                visited[i] = true;
                i = self.pivots[i];
                len += 1;
            }
            if len % 2 == 0 {
                det = -det;
            }
        }
        det
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_identity_solve_returns_rhs() {
        let m = DenseMatrix::identity(3);
        let x = m.lu().solve(&[1.0, -2.0, 3.5]).unwrap();
        assert_eq!(x, vec![1.0, -2.0, 3.5]);
    }

    #[test]
    fn test_solve_requires_pivoting() {
        // Zero on the first diagonal entry forces a row swap
        let m = DenseMatrix::from_rows(&[&[0.0, 2.0, 1.0], &[1.0, 1.0, 0.0], &[3.0, 0.0, 1.0]])
            .unwrap();
        let b = [5.0, 3.0, 6.0];
        let lu = m.lu();
        assert!(lu.is_nonsingular());
        let x = lu.solve(&b).unwrap();
        let r = m.mul_vec(&x);
        for (ri, bi) in r.iter().zip(b.iter()) {
            assert_abs_diff_eq!(ri, bi, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_singular_matrix_is_reported() {
        // Two nodes joined only by a conductance: no reference to ground
        let mut m = DenseMatrix::zeros(2);
        m.stamp_conductance(Some(0), Some(1), 1e-3);
        let lu = m.lu();
        assert!(!lu.is_nonsingular());
        assert!(matches!(
            lu.solve(&[1.0, 0.0]),
            Err(TransimError::SingularSystem { .. })
        ));
    }

    #[test]
    fn test_zero_matrix_is_singular() {
        let m = DenseMatrix::zeros(2);
        assert!(!m.lu().is_nonsingular());
    }

    #[test]
    fn test_solve_matrix_fewer_columns_than_rows() {
        let m = DenseMatrix::from_rows(&[&[2.0, 0.0, 0.0], &[0.0, 4.0, 0.0], &[0.0, 0.0, 8.0]])
            .unwrap();
        let x = m
            .lu()
            .solve_matrix(&[vec![2.0, 4.0, 8.0], vec![1.0, 0.0, -8.0]])
            .unwrap();
        assert_eq!(x.len(), 2);
        assert_eq!(x[0], vec![1.0, 1.0, 1.0]);
        assert_eq!(x[1], vec![0.5, 0.0, -1.0]);
    }

    #[test]
    fn test_solve_matrix_checks_column_length() {
        let m = DenseMatrix::identity(3);
        assert!(m.lu().solve_matrix(&[vec![1.0, 2.0]]).is_err());
    }

    #[test]
    fn test_small_conductance_beside_large_one_is_nonsingular() {
        // A huge capacitor conductance must not mask an off-diode path
        let mut m = DenseMatrix::zeros(3);
        m.stamp_conductance(Some(0), None, 1e5);
        m.stamp_conductance(Some(0), Some(1), 1e-9);
        m.stamp_conductance(Some(1), Some(2), 1e-9);
        m.stamp_conductance(Some(2), None, 1e-3);
        let lu = m.lu();
        assert!(lu.is_nonsingular());
        let b = [0.0, 1e-9, 0.0];
        let x = lu.solve(&b).unwrap();
        let r = m.mul_vec(&x);
        for (ri, bi) in r.iter().zip(b.iter()) {
            assert_abs_diff_eq!(ri, bi, epsilon = 1e-18);
        }
    }

    #[test]
    fn test_inverse() {
        let m = DenseMatrix::from_rows(&[&[4.0, 7.0], &[2.0, 6.0]]).unwrap();
        let inv = m.lu().inverse().unwrap();
        assert_abs_diff_eq!(inv.get(0, 0), 0.6, epsilon = 1e-12);
        assert_abs_diff_eq!(inv.get(0, 1), -0.7, epsilon = 1e-12);
        assert_abs_diff_eq!(inv.get(1, 0), -0.2, epsilon = 1e-12);
        assert_abs_diff_eq!(inv.get(1, 1), 0.4, epsilon = 1e-12);
    }

    #[test]
    fn test_determinant_with_row_swap() {
        let m = DenseMatrix::from_rows(&[&[0.0, 1.0], &[1.0, 0.0]]).unwrap();
        assert_abs_diff_eq!(m.lu().determinant(), -1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_stamp_conductance_to_ground_touches_one_entry() {
        let mut m = DenseMatrix::zeros(2);
        m.stamp_conductance(Some(1), None, 0.5);
        assert_eq!(m.get(1, 1), 0.5);
        assert_eq!(m.get(0, 0), 0.0);
        assert_eq!(m.get(0, 1), 0.0);
    }

    #[test]
    fn test_rejects_ragged_rows() {
        assert!(DenseMatrix::from_rows(&[&[1.0, 2.0], &[3.0]]).is_err());
    }
}
