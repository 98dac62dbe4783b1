use crate::error::PowerFlowError;
use crate::gauss::gausspf;
use crate::grid::Grid;
use crate::lu::DenseLU;
use crate::newton::newtonpf;
use crate::options::{Alg, CalculationOptions};
use crate::solution::Solution;
use crate::traits::{LinearSolver, ProgressMonitor};

use anyhow::Result;
use rayon::prelude::*;
use std::time::Instant;

/// One solver pass of a chained run.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub alg: Alg,
    pub options: CalculationOptions,
}

impl Step {
    pub fn new(alg: Alg, options: CalculationOptions) -> Self {
        Self { alg, options }
    }
}

/// Solves the power flow with a single algorithm.
pub fn solve(
    alg: Alg,
    grid: Grid,
    options: &CalculationOptions,
    solver: &dyn LinearSolver,
    progress: Option<&dyn ProgressMonitor>,
) -> Result<Solution> {
    match alg {
        Alg::NR => newtonpf(grid, options, solver, progress),
        Alg::GS => gausspf(grid, options, progress),
    }
}

/// Runs `steps` in order, each starting from the voltages the previous one
/// reached. The returned solution is the last step's, with the iteration
/// count summed over all steps.
pub fn run(grid: Grid, steps: &[Step], solver: &dyn LinearSolver) -> Result<Solution> {
    let (last, warm) = steps
        .split_last()
        .ok_or_else(|| PowerFlowError::InvalidOptions("no solver steps".to_string()))?;

    let t0 = Instant::now();
    let mut grid = grid;
    let mut its = 0;
    for step in warm {
        let sol = solve(step.alg, grid, &step.options, solver, None)?;
        log::debug!("{:?} warm start: {}", step.alg, sol.summary());
        its += sol.iterations();
        grid = sol.into_grid();
    }

    let mut sol = solve(last.alg, grid, &last.options, solver, None)?;
    sol.iterations += its;
    log::info!("power flow finished in {:?}", t0.elapsed());
    Ok(sol)
}

/// Solves independent networks in parallel with the dense LU solver.
pub fn run_batch(grids: Vec<Grid>, steps: &[Step]) -> Vec<Result<Solution>> {
    grids
        .into_par_iter()
        .map(|grid| run(grid, steps, &DenseLU))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::branch::Branch;
    use crate::cmplx;
    use crate::node::Node;
    use anyhow::format_err;

    fn grid(load: f64) -> Result<Grid> {
        Grid::new(
            vec![
                Node::slack(1, cmplx!(1.0)),
                Node::pq(2, cmplx!(1.0), cmplx!(load, load / 2.0)),
                Node::pq(3, cmplx!(1.0), cmplx!(load / 2.0, load / 4.0)),
            ],
            vec![
                Branch::line(1, 2, cmplx!(4.0, -12.0)),
                Branch::line(2, 3, cmplx!(3.0, -9.0)),
            ],
        )
    }

    #[test]
    fn gauss_seidel_warm_start_then_newton() -> Result<()> {
        let steps = [
            Step::new(
                Alg::GS,
                CalculationOptions {
                    iterations_count: 3,
                    ..Default::default()
                },
            ),
            Step::new(Alg::NR, CalculationOptions::default()),
        ];
        let sol = run(grid(0.4)?, &steps, &DenseLU)?;
        if !sol.success() {
            return Err(format_err!("{}", sol.summary()));
        }
        assert!(sol.iterations() >= 3);
        assert!(sol.summary().starts_with("Newton's method"));

        let direct = solve(Alg::NR, grid(0.4)?, &CalculationOptions::default(), &DenseLU, None)?;
        for (a, b) in sol.voltage().iter().zip(direct.voltage()) {
            assert!((a - b).norm() < 1e-6);
        }
        Ok(())
    }

    #[test]
    fn empty_step_list_is_rejected() -> Result<()> {
        assert!(run(grid(0.1)?, &[], &DenseLU).is_err());
        Ok(())
    }

    #[test]
    fn batch_solves_each_grid() -> Result<()> {
        let grids = vec![grid(0.1)?, grid(0.2)?, grid(0.3)?];
        let steps = [Step::new(Alg::NR, CalculationOptions::default())];
        let results = run_batch(grids, &steps);
        assert_eq!(results.len(), 3);

        let mut last = 1.0;
        for r in results {
            let sol = r?;
            assert!(sol.success());
            let u = sol.voltage()[sol.node_index(3).unwrap()].norm();
            assert!(u < last);
            last = u;
        }
        Ok(())
    }
}
