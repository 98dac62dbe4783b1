use crate::control::ControlState;
use crate::grid::Grid;
use crate::node::NodeType;
use crate::options::CalculationOptions;
use crate::solution::{Solution, VoltageViolation};
use anyhow::Result;

/// Updates the model after a solve: slack generation, PV reactive
/// generation and branch end currents and powers, all at the calculated
/// voltages.
pub fn pfsoln(grid: &mut Grid) {
    let v = grid.voltage.clone();
    let i_bus = grid.y_bus.mat_vec(&v);

    for (i, n) in grid.nodes.iter_mut().enumerate() {
        let s_bus = v[i] * i_bus[i].conj(); // total injected power
        match (n.node_type, n.control) {
            (NodeType::Slack, _) => n.generation = s_bus + n.load,
            (NodeType::PV, ControlState::Pv) => n.generation.im = s_bus.im + n.load.im,
            _ => {}
        }
    }

    for br in grid.branches.iter_mut() {
        let (f, t) = (br.from_index, br.to_index);
        let tp = br.two_port(
            grid.nodes[f].nominal_voltage.norm(),
            grid.nodes[t].nominal_voltage.norm(),
        );
        br.current_from = tp.ff * v[f] + tp.ft * v[t];
        br.current_to = tp.tf * v[f] + tp.tt * v[t];
        br.power_from = v[f] * br.current_from.conj();
        br.power_to = v[t] * br.current_to.conj();
    }
}

/// Nodes whose final voltage magnitude lies outside
/// `|Un| * (1 ± percentage / 100)`.
pub fn voltage_violations(grid: &Grid, options: &CalculationOptions) -> Vec<VoltageViolation> {
    let band = options.voltage_constraint_percentage / 100.0;
    grid.nodes()
        .iter()
        .zip(grid.voltage())
        .filter_map(|(n, v)| {
            let un = n.nominal_voltage.norm();
            let (lo, hi) = (un * (1.0 - band), un * (1.0 + band));
            let u = v.norm();
            let deviation = if u > hi {
                u - hi
            } else if u < lo {
                u - lo
            } else {
                return None;
            };
            log::warn!(
                "voltage at node {} is {:.4}, outside [{:.4}, {:.4}]",
                n.id,
                u,
                lo,
                hi
            );
            Some(VoltageViolation {
                node: n.id,
                deviation,
            })
        })
        .collect()
}

/// Restores nameplate types, computes the derived results and packs the
/// solution. Shared by both solvers.
pub(crate) fn finish(
    grid: Grid,
    converged: bool,
    iterations: usize,
    summary: String,
    options: &CalculationOptions,
) -> Result<Solution> {
    if converged {
        log::info!("{}", summary);
    } else {
        log::warn!("{}", summary);
    }

    let mut grid = grid.restore_nameplate()?;
    grid.warm_start();
    pfsoln(&mut grid);
    let violations = if options.use_voltage_constraint {
        voltage_violations(&grid, options)
    } else {
        Vec::new()
    };

    let mut solution = Solution::new(grid);
    solution.converged = converged;
    solution.iterations = iterations;
    solution.summary = summary;
    solution.violations = violations;
    Ok(solution)
}
