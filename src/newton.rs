use crate::control::{ControlState, Reactive, Transition};
use crate::debug::{format_f64_mat, format_f64_vec, format_polar_vec};
use crate::grid::Grid;
use crate::jac::{jacobian, mismatch, PolarY};
use crate::math::{norm_inf, with_magnitude};
use crate::node::NodeType;
use crate::options::CalculationOptions;
use crate::pfsoln::finish;
use crate::solution::Solution;
use crate::traits::{LinearSolver, ProgressMonitor};

use anyhow::Result;
use num_complex::Complex64;

/// Solves power flow using full Newton's method (power balance, polar).
///
/// PV reactive limits are enforced between Newton solves: after each
/// converged solve every voltage-controlled node is checked against its
/// bounds, and nodes that change state are retyped before solving again.
pub fn newtonpf(
    grid: Grid,
    options: &CalculationOptions,
    lin_solver: &dyn LinearSolver,
    progress: Option<&dyn ProgressMonitor>,
) -> Result<Solution> {
    options.check()?;

    let mut grid = grid;
    grid.reset_controls();
    let mut v = grid.initial_voltage().to_vec();

    let mut its = 0; // total iterations
    let mut passes = 0;
    let mut converged;
    loop {
        let (v1, conv, i) = newton_solve(&mut grid, v, options, lin_solver, progress)?;
        its += i;
        converged = conv;
        grid.set_voltage(&v1);
        if !converged {
            break;
        }
        passes += 1;

        let transitions = inspect_pv(&grid);
        if transitions.is_empty() {
            break;
        }
        if passes >= options.iterations_count {
            log::warn!(
                "reactive limits still switching after {} solves, giving up",
                passes
            );
            converged = false;
            break;
        }

        grid = grid.rebuild_with(|nodes| {
            for n in nodes.iter_mut() {
                let Some((_, t)) = transitions.iter().find(|(id, _)| *id == n.id) else {
                    continue;
                };
                match *t {
                    Transition::ToPq { limit, q } => {
                        log::info!("node {} held at reactive limit {:?} ({})", n.id, limit, q);
                        n.node_type = NodeType::PQ;
                        n.generation.im = q;
                    }
                    Transition::ToPv => {
                        log::info!("node {} returns to voltage control", n.id);
                        n.node_type = NodeType::PV;
                        n.voltage = n.voltage.map(|u| with_magnitude(u, n.preset_magnitude));
                    }
                    Transition::Hold => {}
                }
                n.control = n.control.apply(t);
            }
        })?;
        v = grid.initial_voltage().to_vec();
    }

    let summary = if converged {
        format!(
            "Newton's method power flow (power balance, polar) converged in {} iterations.",
            its
        )
    } else {
        format!(
            "Newton's method power flow (power balance, polar) did not converge in {} iterations.",
            its
        )
    };
    finish(grid, converged, its, summary, options)
}

/// Newton iterations on a fixed node typing. Returns the final voltage,
/// whether the mismatch dropped to the tolerance and the iteration count.
fn newton_solve(
    grid: &mut Grid,
    v0: Vec<Complex64>,
    options: &CalculationOptions,
    lin_solver: &dyn LinearSolver,
    progress: Option<&dyn ProgressMonitor>,
) -> Result<(Vec<Complex64>, bool, usize)> {
    let tol = options.accuracy;
    let max_it = options.iterations_count;

    let npq = grid.pq_count();
    let dim = npq + grid.pv_count();
    let y = PolarY::new(grid.y_bus())?;

    let mut converged = false;
    let mut i = 0;
    let mut v = v0;
    let mut va: Vec<f64> = v.iter().map(|u| u.arg()).collect();
    let mut vm: Vec<f64> = v.iter().map(|u| u.norm()).collect();

    // evaluate F(x0)
    grid.set_voltage(&v);
    grid.apply_load_models();
    let mut s_spec = grid.injection();
    let mut f = mismatch(&y, &vm, &va, &s_spec, npq, dim);

    // check tolerance
    let norm_f = norm_inf(&f);
    log::debug!("norm_f{}: {}", i, norm_f);
    if let Some(pm) = progress {
        pm.update(i, norm_f);
    }
    if norm_f <= tol {
        converged = true;
    }

    // do Newton iterations
    while !converged && i < max_it {
        i += 1;

        let jac = jacobian(&y, &vm, &va, npq, dim)?;
        log::trace!("J_{}:\n{}", i, format_f64_mat(&jac));

        // J * dx = -F
        let neg_f: Vec<f64> = f.iter().map(|f_i| -f_i).collect();
        let dx = lin_solver.solve(&jac, &neg_f)?;
        log::trace!("dx{}: {}", i, format_f64_vec(&dx));

        // update voltage
        va.iter_mut().take(dim).zip(&dx[..dim]).for_each(|(a, d)| *a -= d);
        vm.iter_mut().take(npq).zip(&dx[dim..]).for_each(|(m, d)| *m -= d);

        // update Vm and Va again in case we wrapped around with a negative Vm
        v = vm
            .iter()
            .zip(&va)
            .map(|(&m, &a)| Complex64::from_polar(m, a))
            .collect();
        va = v.iter().map(|u| u.arg()).collect();
        vm = v.iter().map(|u| u.norm()).collect();

        // voltage dependent loads
        grid.set_voltage(&v);
        grid.apply_load_models();
        s_spec = grid.injection();

        f = mismatch(&y, &vm, &va, &s_spec, npq, dim);

        let norm_f = norm_inf(&f);
        log::debug!("norm_f{}: {}", i, norm_f);
        if let Some(pm) = progress {
            pm.update(i, norm_f);
        }
        if norm_f <= tol {
            converged = true;
        } else if !norm_f.is_finite() {
            log::warn!("mismatch is not finite at iteration {}", i);
            break;
        }
    }
    log::trace!("V{}: {}", i, format_polar_vec(&v));

    Ok((v, converged, i))
}

/// Checks every voltage-controlled node, forced or not, against its
/// reactive bounds at the present voltages.
fn inspect_pv(grid: &Grid) -> Vec<(usize, Transition)> {
    let v = grid.voltage();
    let i_bus = grid.currents();

    grid.nodes()
        .iter()
        .enumerate()
        .filter(|(_, n)| matches!(n.control, ControlState::Pv | ControlState::ForcedPq(_)))
        .filter_map(|(k, n)| {
            let q_gen = (v[k] * i_bus[k].conj()).im + n.load.im;
            let r = Reactive {
                q_gen,
                q_min: n.q_min,
                q_max: n.q_max,
                magnitude: v[k].norm(),
                preset: n.preset_magnitude,
            };
            match n.control.next(&r) {
                Transition::Hold => None,
                t => Some((n.id, t)),
            }
        })
        .collect()
}
