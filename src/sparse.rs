use crate::dense::Mat;
use crate::error::PowerFlowError;
use crate::traits::LinearSolver;
use anyhow::Result;
use sparsetools::coo::Coo;
use spsolve::rlu::RLU;
use spsolve::Solver;

/// Sparse LU strategy: compresses the matrix to CSC form and factors it
/// with the RLU solver. Not on the default solve path.
#[derive(Default)]
pub struct SparseLU {
    solver: RLU,
}

impl LinearSolver for SparseLU {
    fn solve(&self, a: &Mat<f64>, b: &[f64]) -> Result<Vec<f64>> {
        let n = a.rows();
        if !a.is_square() || b.len() != n {
            return Err(PowerFlowError::DimensionMismatch {
                expected: n,
                actual: b.len(),
            }
            .into());
        }

        let mut coo = Coo::with_size(n, n);
        for i in 0..n {
            for (j, &v) in a.row(i).iter().enumerate() {
                if v != 0.0 {
                    coo.push(i, j, v);
                }
            }
        }
        let csc = coo.to_csc();

        let mut x = b.to_vec();
        self.solver.solve(
            csc.cols(),
            csc.rowidx(),
            csc.colptr(),
            csc.values(),
            &mut x,
            false,
        )?;
        Ok(x)
    }
}
