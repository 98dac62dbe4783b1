use crate::dense::Mat;
use anyhow::Result;
use num_complex::Complex64;
use rayon::prelude::*;

/// Admittance matrix in polar form: magnitudes and angles.
#[derive(Debug, Clone)]
pub struct PolarY {
    pub abs: Mat<f64>,
    pub arg: Mat<f64>,
}

impl PolarY {
    pub fn new(y_bus: &Mat<Complex64>) -> Result<Self> {
        let (n, m) = y_bus.shape();
        let abs = Mat::from_vec(n, m, y_bus.values().iter().map(|y| y.norm()).collect())?;
        let arg = Mat::from_vec(n, m, y_bus.values().iter().map(|y| y.arg()).collect())?;
        Ok(Self { abs, arg })
    }

    /// `|Yij| * |Uj|` and the angle `γij + θj - θi`.
    #[inline]
    fn term(&self, i: usize, j: usize, vm: &[f64], va: &[f64]) -> (f64, f64) {
        (
            self.abs.get(i, j) * vm[j],
            self.arg.get(i, j) + va[j] - va[i],
        )
    }

    /// Calculated injection `(P_i, Q_i)` at node `i`.
    fn injection(&self, i: usize, vm: &[f64], va: &[f64]) -> (f64, f64) {
        (0..vm.len()).fold((0.0, 0.0), |(p, q), j| {
            let (yu, phi) = self.term(i, j, vm, va);
            (p + vm[i] * yu * phi.cos(), q - vm[i] * yu * phi.sin())
        })
    }
}

/// Power mismatch `spec - calc`: active power of the first `dim` nodes
/// followed by reactive power of the first `npq` nodes.
pub fn mismatch(
    y: &PolarY,
    vm: &[f64],
    va: &[f64],
    s_spec: &[Complex64],
    npq: usize,
    dim: usize,
) -> Vec<f64> {
    let calc: Vec<(f64, f64)> = (0..dim)
        .into_par_iter()
        .map(|i| y.injection(i, vm, va))
        .collect();

    let d_p = calc.iter().enumerate().map(|(i, (p, _))| s_spec[i].re - p);
    let d_q = calc[..npq]
        .iter()
        .enumerate()
        .map(|(i, (_, q))| s_spec[i].im - q);
    d_p.chain(d_q).collect()
}

/// Forms the reduced power flow Jacobian.
///
/// Rows are `P` of the first `dim` nodes then `Q` of the first `npq`
/// nodes. Columns are the angles of the first `dim` nodes then the
/// magnitudes of the first `npq` nodes. Rows are built in parallel.
pub fn jacobian(y: &PolarY, vm: &[f64], va: &[f64], npq: usize, dim: usize) -> Result<Mat<f64>> {
    let rows: Vec<Vec<f64>> = (0..dim + npq)
        .into_par_iter()
        .map(|r| {
            if r < dim {
                p_row(y, vm, va, r, npq, dim)
            } else {
                q_row(y, vm, va, r - dim, npq, dim)
            }
        })
        .collect();
    Mat::from_rows(rows)
}

fn p_row(y: &PolarY, vm: &[f64], va: &[f64], i: usize, npq: usize, dim: usize) -> Vec<f64> {
    let n = vm.len();
    let mut row = vec![0.0; dim + npq];

    // sums over all nodes, self term removed below
    let mut d_theta = 0.0;
    let mut d_vm = 0.0;
    for j in 0..n {
        let (yu, phi) = y.term(i, j, vm, va);
        d_theta += vm[i] * yu * phi.sin();
        d_vm += yu * phi.cos();
    }
    let (y_ii, g_ii) = (y.abs.get(i, i), y.arg.get(i, i));
    d_theta -= vm[i] * vm[i] * y_ii * g_ii.sin();
    d_vm -= vm[i] * y_ii * g_ii.cos();

    for j in 0..dim {
        row[j] = if j == i {
            d_theta
        } else {
            let (yu, phi) = y.term(i, j, vm, va);
            -vm[i] * yu * phi.sin()
        };
    }
    for j in 0..npq {
        row[dim + j] = if j == i {
            2.0 * vm[i] * y_ii * g_ii.cos() + d_vm
        } else {
            vm[i] * y.abs.get(i, j) * (y.arg.get(i, j) + va[j] - va[i]).cos()
        };
    }
    row
}

fn q_row(y: &PolarY, vm: &[f64], va: &[f64], i: usize, npq: usize, dim: usize) -> Vec<f64> {
    let n = vm.len();
    let mut row = vec![0.0; dim + npq];

    let mut d_theta = 0.0;
    let mut d_vm = 0.0;
    for j in 0..n {
        let (yu, phi) = y.term(i, j, vm, va);
        d_theta += vm[i] * yu * phi.cos();
        d_vm += yu * phi.sin();
    }
    let (y_ii, g_ii) = (y.abs.get(i, i), y.arg.get(i, i));
    d_theta -= vm[i] * vm[i] * y_ii * g_ii.cos();
    d_vm -= vm[i] * y_ii * g_ii.sin();

    for j in 0..dim {
        row[j] = if j == i {
            d_theta
        } else {
            let (yu, phi) = y.term(i, j, vm, va);
            -vm[i] * yu * phi.cos()
        };
    }
    for j in 0..npq {
        row[dim + j] = if j == i {
            -2.0 * vm[i] * y_ii * g_ii.sin() - d_vm
        } else {
            -vm[i] * y.abs.get(i, j) * (y.arg.get(i, j) + va[j] - va[i]).sin()
        };
    }
    row
}
