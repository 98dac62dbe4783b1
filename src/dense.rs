use crate::error::PowerFlowError;
use num_traits::{One, Zero};
use std::ops::{Add, Mul};

/// Dense matrix with values stored in row-major order (C-style).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Mat<T> {
    rows: usize,
    cols: usize,
    values: Vec<T>,
}

impl<T> Mat<T>
where
    T: Copy + Zero,
{
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            values: vec![T::zero(); rows * cols],
        }
    }

    pub fn identity(n: usize) -> Self
    where
        T: One,
    {
        let mut m = Self::zeros(n, n);
        for i in 0..n {
            m.set(i, i, T::one());
        }
        m
    }

    /// Builds a matrix from row-major `values`.
    pub fn from_vec(rows: usize, cols: usize, values: Vec<T>) -> anyhow::Result<Self> {
        if values.len() != rows * cols {
            return Err(PowerFlowError::DimensionMismatch {
                expected: rows * cols,
                actual: values.len(),
            }
            .into());
        }
        Ok(Self { rows, cols, values })
    }

    /// Builds a matrix from equally sized rows.
    pub fn from_rows(rows: Vec<Vec<T>>) -> anyhow::Result<Self> {
        let n = rows.len();
        let m = rows.first().map(|r| r.len()).unwrap_or(0);
        let mut values = Vec::with_capacity(n * m);
        for row in rows {
            if row.len() != m {
                return Err(PowerFlowError::DimensionMismatch {
                    expected: m,
                    actual: row.len(),
                }
                .into());
            }
            values.extend(row);
        }
        Self::from_vec(n, m, values)
    }

    pub fn rows(&self) -> usize {
        self.rows
    }
    pub fn cols(&self) -> usize {
        self.cols
    }
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }
    pub fn is_square(&self) -> bool {
        self.rows == self.cols
    }

    pub fn values(&self) -> &[T] {
        &self.values
    }

    #[inline]
    fn ix(&self, row: usize, col: usize) -> usize {
        row * self.cols + col
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> T {
        self.values[self.ix(row, col)]
    }

    #[inline]
    pub fn set(&mut self, row: usize, col: usize, v: T) {
        let i = self.ix(row, col);
        self.values[i] = v
    }

    #[inline]
    pub fn add(&mut self, row: usize, col: usize, v: T)
    where
        T: Add<Output = T>,
    {
        let i = self.ix(row, col);
        self.values[i] = self.values[i] + v
    }

    pub fn row(&self, row: usize) -> &[T] {
        assert!(row < self.rows);
        let i = self.ix(row, 0);
        &self.values[i..i + self.cols]
    }

    pub fn swap_rows(&mut self, a: usize, b: usize) {
        if a == b {
            return;
        }
        for c in 0..self.cols {
            self.values.swap(a * self.cols + c, b * self.cols + c);
        }
    }

    pub fn diagonal(&self) -> Vec<T> {
        assert!(self.is_square());
        (0..self.rows).map(|i| self.get(i, i)).collect()
    }

    /// Applies `f` to every element.
    pub fn map<F>(&self, f: F) -> Self
    where
        F: Fn(T) -> T,
    {
        Self {
            rows: self.rows,
            cols: self.cols,
            values: self.values.iter().map(|&v| f(v)).collect(),
        }
    }

    pub fn mat_vec(&self, b: &[T]) -> Vec<T>
    where
        T: Mul<Output = T> + Add<Output = T>,
    {
        assert_eq!(b.len(), self.cols);
        (0..self.rows).map(|i| dot(self.row(i), b)).collect()
    }
}

/// Computes the dot-product of `a` and `b`.
pub fn dot<T>(a: &[T], b: &[T]) -> T
where
    T: Mul<Output = T> + Add<Output = T> + Zero + Copy,
{
    a.iter()
        .zip(b)
        .map(|(&ai, &bi)| ai * bi)
        .fold(T::zero(), |x, y| x + y)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PowerFlowError;
    use anyhow::Result;

    #[test]
    fn mat_vec_product() -> Result<()> {
        let a = Mat::from_rows(vec![vec![1.0, 2.0], vec![3.0, 4.0]])?;
        assert_eq!(a.mat_vec(&[1.0, 1.0]), vec![3.0, 7.0]);
        assert_eq!(a.diagonal(), vec![1.0, 4.0]);
        Ok(())
    }

    #[test]
    fn ragged_rows_are_rejected() {
        let err = Mat::from_rows(vec![vec![1.0, 2.0], vec![3.0]]).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PowerFlowError>(),
            Some(PowerFlowError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn rows_swap() {
        let mut a: Mat<f64> = Mat::identity(3);
        a.swap_rows(0, 2);
        assert_eq!(a.row(0), &[0.0, 0.0, 1.0]);
        assert_eq!(a.row(2), &[1.0, 0.0, 0.0]);
    }
}
