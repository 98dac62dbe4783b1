use crate::control::{ControlState, Reactive, Transition};
use crate::debug::format_polar_vec;
use crate::dense::{dot, Mat};
use crate::error::PowerFlowError;
use crate::grid::Grid;
use crate::math::{with_magnitude, EPSILON};
use crate::node::{Node, NodeType};
use crate::options::CalculationOptions;
use crate::pfsoln::finish;
use crate::solution::Solution;
use crate::traits::ProgressMonitor;

use anyhow::Result;
use num_complex::Complex64;

/// Solves the power flow using a Gauss-Seidel method with acceleration.
///
/// PV nodes whose reactive generation leaves its bounds during a run are
/// solved as PQ for the rest of it. When a run forced any node, the model
/// is rebuilt with the new typing and solved again from the last voltages.
pub fn gausspf(
    grid: Grid,
    options: &CalculationOptions,
    progress: Option<&dyn ProgressMonitor>,
) -> Result<Solution> {
    options.check()?;

    let mut grid = grid;
    grid.reset_controls();
    let mut v = grid.initial_voltage().to_vec();

    let mut its = 0; // total iterations
    let converged = loop {
        let (conv, i, forced) = gauss_run(&grid, &mut v, options, progress)?;
        its += i;
        grid.set_voltage(&v);
        if forced.is_empty() {
            break conv;
        }

        grid = grid.rebuild_with(|nodes| {
            for n in nodes.iter_mut() {
                if let Some((_, t)) = forced.iter().find(|(id, _)| *id == n.id) {
                    if let Transition::ToPq { limit, q } = *t {
                        log::info!("node {} held at reactive limit {:?} ({})", n.id, limit, q);
                        n.node_type = NodeType::PQ;
                        n.generation.im = q;
                    }
                    n.control = n.control.apply(t);
                }
            }
        })?;
        v = grid.initial_voltage().to_vec();
    };

    let summary = if converged {
        format!("Gauss-Seidel power flow converged in {} iterations.", its)
    } else {
        format!("Gauss-Seidel power flow did not converge in {} iterations.", its)
    };
    finish(grid, converged, its, summary, options)
}

/// Iterates sweeps until the largest voltage step drops to the tolerance
/// or the iteration budget runs out. The step is taken over PV nodes as well
/// as PQ nodes; for PV nodes it is the angle move at the preset magnitude.
/// Returns the convergence flag, the number of sweeps and the nodes forced
/// off voltage control.
fn gauss_run(
    grid: &Grid,
    v: &mut [Complex64],
    options: &CalculationOptions,
    progress: Option<&dyn ProgressMonitor>,
) -> Result<(bool, usize, Vec<(usize, Transition)>)> {
    let tol = options.accuracy;
    let max_it = options.iterations_count;

    let y_bus = grid.y_bus();
    for n in grid.nodes().iter().filter(|n| !n.is_slack()) {
        if y_bus.get(n.calc_index, n.calc_index).norm() <= EPSILON {
            return Err(PowerFlowError::SingularMatrix {
                column: n.calc_index,
            }
            .into());
        }
    }

    let mut s = grid.injection();
    let mut states: Vec<ControlState> = grid.nodes().iter().map(|n| n.control).collect();
    let mut forced = Vec::new();

    let mut converged = false;
    let mut i = 0;
    while !converged && i < max_it {
        i += 1;

        let dv = sweep(
            y_bus,
            grid.nodes(),
            &mut states,
            &mut s,
            v,
            options.acceleration_rate,
            &mut forced,
        );
        check_plausible(grid.nodes(), v, options.voltage_ratio)?;

        log::debug!("dv{}: {}", i, dv);
        if let Some(pm) = progress {
            pm.update(i, dv);
        }
        if dv <= tol {
            converged = true;
        }
    }
    log::trace!("V{}: {}", i, format_polar_vec(v));

    Ok((converged, i, forced))
}

/// One Gauss-Seidel sweep over all nodes in calculation order, using each
/// updated voltage immediately. Returns the largest voltage step of any
/// non-slack node.
fn sweep(
    y_bus: &Mat<Complex64>,
    nodes: &[Node],
    states: &mut [ControlState],
    s: &mut [Complex64],
    v: &mut [Complex64],
    alpha: f64,
    forced: &mut Vec<(usize, Transition)>,
) -> f64 {
    let mut dv_max: f64 = 0.0;

    for (k, n) in nodes.iter().enumerate() {
        if states[k] == ControlState::Fixed {
            continue;
        }
        let y_row = y_bus.row(k);
        let v_old = v[k];

        if states[k] == ControlState::Pv {
            let i_k = dot(y_row, v);
            let q_inj = (v[k] * i_k.conj()).im;
            let r = Reactive {
                q_gen: q_inj + n.load.im,
                q_min: n.q_min,
                q_max: n.q_max,
                magnitude: v[k].norm(),
                preset: n.preset_magnitude,
            };
            match states[k].next(&r) {
                t @ Transition::ToPq { q, .. } => {
                    s[k].im = q - n.load.im;
                    states[k] = states[k].apply(&t);
                    forced.push((n.id, t));
                }
                _ => s[k].im = q_inj,
            }
        }

        let y_kk = y_row[k];
        let others = dot(y_row, v) - y_kk * v[k];
        let v_new = ((s[k] / v[k]).conj() - others) / y_kk;
        v[k] = v_old + (v_new - v_old) * alpha;

        if states[k] == ControlState::Pv {
            v[k] = with_magnitude(v[k], n.preset_magnitude);
        }
        dv_max = dv_max.max((v[k] - v_old).norm());
    }

    dv_max
}

/// Rejects voltages outside the band `[|u|(1 - ratio), |u|(1 + ratio)]`.
///
/// The band is centred on the estimate being checked, so only non-finite
/// magnitudes fall outside it.
fn check_plausible(nodes: &[Node], v: &[Complex64], ratio: f64) -> Result<()> {
    for (n, u) in nodes.iter().zip(v).filter(|(n, _)| !n.is_slack()) {
        if !in_band(*u, *u, ratio) {
            return Err(PowerFlowError::VoltageOutOfBand {
                node: n.id,
                magnitude: u.norm(),
            }
            .into());
        }
    }
    Ok(())
}

fn in_band(u: Complex64, reference: Complex64, ratio: f64) -> bool {
    let (m, r) = (u.norm(), reference.norm());
    m.is_finite() && m >= r * (1.0 - ratio) && m <= r * (1.0 + ratio)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::branch::Branch;
    use crate::cmplx;
    use anyhow::format_err;

    #[test]
    fn band_only_rejects_non_finite() {
        assert!(in_band(cmplx!(0.97, -0.1), cmplx!(0.97, -0.1), 0.5));
        assert!(in_band(cmplx!(1e6), cmplx!(1e6), 0.0));
        assert!(!in_band(cmplx!(f64::NAN), cmplx!(f64::NAN), 0.5));
        assert!(!in_band(cmplx!(f64::INFINITY), cmplx!(f64::INFINITY), 0.5));
        assert!(!in_band(cmplx!(2.0), cmplx!(1.0), 0.5));
    }

    #[test]
    fn three_node_network_converges() -> Result<()> {
        let grid = Grid::new(
            vec![
                Node::slack(1, cmplx!(1.0)),
                Node::pq(2, cmplx!(1.0), cmplx!(0.3, 0.1)),
                Node::pq(3, cmplx!(1.0), cmplx!(0.2, 0.05)),
            ],
            vec![
                Branch::line(1, 2, cmplx!(5.0, -15.0)),
                Branch::line(2, 3, cmplx!(4.0, -12.0)),
                Branch::line(1, 3, cmplx!(3.0, -9.0)),
            ],
        )?;
        let options = CalculationOptions {
            acceleration_rate: 1.0,
            accuracy: 1e-10,
            iterations_count: 500,
            ..Default::default()
        };
        let sol = gausspf(grid, &options, None)?;
        if !sol.converged() {
            return Err(format_err!("{}", sol.summary()));
        }

        let balance = sol.power_balance();
        for n in sol.nodes().iter().filter(|n| n.is_pq()) {
            assert!(balance[n.calc_index].norm() < 1e-6);
        }
        Ok(())
    }

    #[test]
    fn sweep_step_counts_pv_angle_moves() -> Result<()> {
        let grid = Grid::new(
            vec![
                Node::slack(1, cmplx!(1.0)),
                Node::pv(2, cmplx!(1.0), 1.0, 0.5),
            ],
            vec![Branch::line(1, 2, cmplx!(2.0, -8.0))],
        )?;
        let mut states: Vec<ControlState> = grid.nodes().iter().map(|n| n.control).collect();
        let mut s = grid.injection();
        let mut v = grid.initial_voltage().to_vec();
        let v0 = v.clone();
        let mut forced = Vec::new();

        let dv = sweep(grid.y_bus(), grid.nodes(), &mut states, &mut s, &mut v, 1.0, &mut forced);
        let k = grid.node_index(2).ok_or_else(|| format_err!("node 2 missing"))?;
        assert!(forced.is_empty());
        assert!((v[k].norm() - 1.0).abs() < 1e-12);
        assert!(v[k].arg() > 0.0);
        assert_eq!(dv, (v[k] - v0[k]).norm());
        Ok(())
    }

    #[test]
    fn isolated_node_is_singular() -> Result<()> {
        let grid = Grid::new(
            vec![
                Node::slack(1, cmplx!(1.0)),
                Node::pq(2, cmplx!(1.0), cmplx!(0.3, 0.1)),
            ],
            vec![],
        )?;
        let err = gausspf(grid, &CalculationOptions::default(), None)
            .err()
            .ok_or_else(|| format_err!("expected an error"))?;
        assert_eq!(
            err.downcast_ref::<PowerFlowError>(),
            Some(&PowerFlowError::SingularMatrix { column: 0 })
        );
        Ok(())
    }
}
