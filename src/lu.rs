use crate::dense::Mat;
use crate::error::PowerFlowError;
use crate::traits::LinearSolver;
use anyhow::Result;

/// Row-pivoted LU decomposition of a square matrix.
///
/// `lu` holds the unit lower triangle (below the diagonal) and the upper
/// triangle (on and above it). `perm[i]` is the original row now stored at
/// row `i`, and `toggle` is `+1` or `-1` depending on the parity of the row
/// swaps.
#[derive(Debug, Clone)]
pub struct LU {
    lu: Mat<f64>,
    perm: Vec<usize>,
    toggle: f64,
}

impl LU {
    /// Doolittle decomposition with partial pivoting.
    ///
    /// The pivot for column `j` is the entry of largest raw magnitude in rows
    /// `j..n` of the partially reduced matrix. A pivot no larger than
    /// `f64::EPSILON` times the largest entry of `a` fails with
    /// [`PowerFlowError::SingularMatrix`].
    pub fn decompose(a: &Mat<f64>) -> Result<Self> {
        if !a.is_square() {
            return Err(PowerFlowError::DimensionMismatch {
                expected: a.rows(),
                actual: a.cols(),
            }
            .into());
        }
        let n = a.rows();
        let mut lu = a.clone();
        let mut perm: Vec<usize> = (0..n).collect();
        let mut toggle = 1.0;

        let scale = a.values().iter().fold(0.0_f64, |m, v| m.max(v.abs()));
        let tiny = f64::EPSILON * scale;

        for j in 0..n {
            let mut col_max = lu.get(j, j).abs();
            let mut p = j;
            for i in j + 1..n {
                let v = lu.get(i, j).abs();
                if v > col_max {
                    col_max = v;
                    p = i;
                }
            }

            if p != j {
                lu.swap_rows(p, j);
                perm.swap(p, j);
                toggle = -toggle;
            }

            let pivot = lu.get(j, j);
            if pivot.abs() <= tiny || !pivot.is_finite() {
                return Err(PowerFlowError::SingularMatrix { column: j }.into());
            }

            for i in j + 1..n {
                let l = lu.get(i, j) / pivot;
                lu.set(i, j, l);
                for k in j + 1..n {
                    let v = lu.get(i, k) - l * lu.get(j, k);
                    lu.set(i, k, v);
                }
            }
        }

        Ok(Self { lu, perm, toggle })
    }

    pub fn size(&self) -> usize {
        self.perm.len()
    }

    pub fn perm(&self) -> &[usize] {
        &self.perm
    }

    /// Solves `A·x = b` using the stored factors.
    pub fn solve(&self, b: &[f64]) -> Result<Vec<f64>> {
        let n = self.size();
        if b.len() != n {
            return Err(PowerFlowError::DimensionMismatch {
                expected: n,
                actual: b.len(),
            }
            .into());
        }

        let mut x: Vec<f64> = self.perm.iter().map(|&p| b[p]).collect();

        // forward substitution, unit lower triangle
        for i in 1..n {
            let mut sum = x[i];
            for j in 0..i {
                sum -= self.lu.get(i, j) * x[j];
            }
            x[i] = sum;
        }

        // back substitution
        for i in (0..n).rev() {
            let mut sum = x[i];
            for j in i + 1..n {
                sum -= self.lu.get(i, j) * x[j];
            }
            x[i] = sum / self.lu.get(i, i);
        }

        Ok(x)
    }

    pub fn det(&self) -> f64 {
        (0..self.size()).fold(self.toggle, |d, i| d * self.lu.get(i, i))
    }

    pub fn inverse(&self) -> Result<Mat<f64>> {
        let n = self.size();
        let mut inv = Mat::zeros(n, n);
        let mut e = vec![0.0; n];
        for j in 0..n {
            e.iter_mut().for_each(|v| *v = 0.0);
            e[j] = 1.0;
            let col = self.solve(&e)?;
            for (i, v) in col.into_iter().enumerate() {
                inv.set(i, j, v);
            }
        }
        Ok(inv)
    }
}

/// Decomposes `a` and solves `a·x = b`.
pub fn lu_solve(a: &Mat<f64>, b: &[f64]) -> Result<Vec<f64>> {
    LU::decompose(a)?.solve(b)
}

/// Dense LU strategy used on the Newton-Raphson path.
#[derive(Debug, Default, Clone, Copy)]
pub struct DenseLU;

impl LinearSolver for DenseLU {
    fn solve(&self, a: &Mat<f64>, b: &[f64]) -> Result<Vec<f64>> {
        lu_solve(a, b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::near;

    fn sample() -> Result<Mat<f64>> {
        Mat::from_rows(vec![
            vec![2.0, 1.0, 1.0],
            vec![4.0, -6.0, 0.0],
            vec![-2.0, 7.0, 2.0],
        ])
    }

    #[test]
    fn solves_three_by_three() -> Result<()> {
        let a = sample()?;
        let x = lu_solve(&a, &[5.0, -2.0, 9.0])?;
        for (xi, ei) in x.iter().zip([1.0, 1.0, 2.0]) {
            assert!(near(*xi, ei, 1e-12), "{:?}", x);
        }
        Ok(())
    }

    #[test]
    fn pivots_on_largest_magnitude() -> Result<()> {
        let lu = LU::decompose(&sample()?)?;
        assert_eq!(lu.perm()[0], 1);
        Ok(())
    }

    #[test]
    fn determinant_and_inverse() -> Result<()> {
        let a = sample()?;
        let lu = LU::decompose(&a)?;
        assert!(near(lu.det(), -16.0, 1e-12));

        let inv = lu.inverse()?;
        for i in 0..3 {
            for j in 0..3 {
                let v: f64 = (0..3).map(|k| a.get(i, k) * inv.get(k, j)).sum();
                let e = if i == j { 1.0 } else { 0.0 };
                assert!(near(v, e, 1e-12));
            }
        }
        Ok(())
    }

    #[test]
    fn zero_pivot_is_fatal() -> Result<()> {
        let a = Mat::from_rows(vec![vec![1.0, 2.0], vec![2.0, 4.0]])?;
        let err = lu_solve(&a, &[1.0, 1.0]).unwrap_err();
        assert_eq!(
            err.downcast_ref::<PowerFlowError>(),
            Some(&PowerFlowError::SingularMatrix { column: 1 })
        );

        let z: Mat<f64> = Mat::zeros(2, 2);
        assert!(DenseLU.solve(&z, &[0.0, 1.0]).is_err());
        Ok(())
    }
}
