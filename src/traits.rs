use crate::dense::Mat;

/// Solves the real linear system `a·x = b`.
///
/// The Newton-Raphson step goes through this trait so that the dense LU on
/// the live path can be swapped for a sparse factorization.
pub trait LinearSolver {
    fn solve(&self, a: &Mat<f64>, b: &[f64]) -> anyhow::Result<Vec<f64>>;
}

/// Receives the iteration count and the convergence measure after every
/// iteration of a solver.
pub trait ProgressMonitor {
    fn update(&self, i: usize, norm_f: f64);
}

pub struct PrintProgress {}

impl ProgressMonitor for PrintProgress {
    fn update(&self, i: usize, norm_f: f64) {
        if i == 0 {
            println!(" it    max mismatch");
            println!("----  --------------");
        }
        println!("{:>3}   {:10.3e}", i, norm_f);
    }
}
