use crate::branch::Branch;
use crate::control::ControlState;
use crate::debug::{format_polar_vec, format_rect_mat};
use crate::dense::{dot, Mat};
use crate::error::PowerFlowError;
use crate::load::LoadModel;
use crate::math::EPSILON;
use crate::node::{Node, NodeType};
use crate::order::{order_branches, order_nodes, Counts, Order};
use crate::ybus::make_ybus;

use anyhow::Result;
use num_complex::Complex64;
use std::collections::HashMap;
use std::sync::Arc;

/// Ordered network model: nodes in PQ, PV, Slack blocks, resolved branches,
/// the admittance matrix and the voltage vectors.
///
/// A grid is only ever produced by a full build, so the admittance matrix
/// and block counts always match the node order. Changing a node's type
/// goes through [`Grid::rebuild_with`].
#[derive(Clone)]
pub struct Grid {
    pub(crate) nodes: Vec<Node>,
    pub(crate) branches: Vec<Branch>,
    pub(crate) order: Order,
    pub(crate) counts: Counts,
    pub(crate) y_bus: Mat<Complex64>,
    pub(crate) initial_voltage: Vec<Complex64>,
    pub(crate) voltage: Vec<Complex64>,
    pub(crate) load_models: HashMap<usize, Arc<dyn LoadModel>>,
}

impl Grid {
    pub fn new(nodes: Vec<Node>, branches: Vec<Branch>) -> Result<Self> {
        Self::build(nodes, branches, HashMap::new())
    }

    fn build(
        mut nodes: Vec<Node>,
        branches: Vec<Branch>,
        load_models: HashMap<usize, Arc<dyn LoadModel>>,
    ) -> Result<Self> {
        for n in nodes.iter_mut().filter(|n| n.is_pv() && !n.has_preset()) {
            log::warn!(
                "node {} has no usable preset magnitude ({}), treating it as PQ",
                n.id,
                n.preset_magnitude
            );
            n.node_type = NodeType::PQ;
        }

        let (mut nodes, order, counts) = order_nodes(nodes)?;
        for n in nodes.iter_mut() {
            n.control = ControlState::for_type(n.node_type, n.control);
        }
        let branches = order_branches(branches, &order)?;

        for id in load_models.keys() {
            if order.index(*id).is_none() {
                return Err(PowerFlowError::NoSuchNode(*id).into());
            }
        }

        let y_bus = make_ybus(&nodes, &branches);
        log::trace!("Ybus:\n{}", format_rect_mat(&y_bus));

        let initial_voltage: Vec<Complex64> = nodes.iter().map(starting_voltage).collect();
        let voltage = nodes
            .iter()
            .zip(&initial_voltage)
            .map(|(n, v0)| match n.voltage {
                Some(v) if !n.is_slack() => v,
                _ => *v0,
            })
            .collect();
        log::debug!("V0: {}", format_polar_vec(&initial_voltage));

        Ok(Self {
            nodes,
            branches,
            order,
            counts,
            y_bus,
            initial_voltage,
            voltage,
            load_models,
        })
    }

    /// Rebuilds the model from its own nodes and branches. Node voltages
    /// are carried over as the starting point.
    pub fn rebuild(self) -> Result<Self> {
        Self::build(self.nodes, self.branches, self.load_models)
    }

    /// Applies `f` to the nodes and rebuilds.
    pub fn rebuild_with<F>(mut self, f: F) -> Result<Self>
    where
        F: FnOnce(&mut [Node]),
    {
        f(&mut self.nodes);
        self.rebuild()
    }

    /// Attaches a voltage-dependent load model to node `id`.
    pub fn with_load_model(mut self, id: usize, model: Arc<dyn LoadModel>) -> Result<Self> {
        if self.order.index(id).is_none() {
            return Err(PowerFlowError::NoSuchNode(id).into());
        }
        self.load_models.insert(id, model);
        Ok(self)
    }

    /// Replaces the starting voltage (in calculation order). Slack entries
    /// are kept at their nominal voltage.
    pub fn with_initial_voltage(mut self, v0: Vec<Complex64>) -> Result<Self> {
        if v0.len() != self.nodes.len() {
            return Err(PowerFlowError::DimensionMismatch {
                expected: self.nodes.len(),
                actual: v0.len(),
            }
            .into());
        }
        self.initial_voltage = self
            .nodes
            .iter()
            .zip(v0)
            .map(|(n, v)| if n.is_slack() { n.nominal_voltage } else { v })
            .collect();
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Nodes in calculation order.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }
    pub fn branches(&self) -> &[Branch] {
        &self.branches
    }
    pub fn order(&self) -> &Order {
        &self.order
    }
    pub fn y_bus(&self) -> &Mat<Complex64> {
        &self.y_bus
    }
    pub fn initial_voltage(&self) -> &[Complex64] {
        &self.initial_voltage
    }
    /// Calculated voltages in calculation order.
    pub fn voltage(&self) -> &[Complex64] {
        &self.voltage
    }

    pub fn pq_count(&self) -> usize {
        self.counts.pq
    }
    pub fn pv_count(&self) -> usize {
        self.counts.pv
    }
    pub fn slack_count(&self) -> usize {
        self.counts.slack
    }

    pub fn node_index(&self, id: usize) -> Option<usize> {
        self.order.index(id)
    }

    pub fn node(&self, id: usize) -> Option<&Node> {
        self.node_index(id).map(|i| &self.nodes[i])
    }

    pub(crate) fn node_mut(&mut self, id: usize) -> Option<&mut Node> {
        let i = self.node_index(id)?;
        Some(&mut self.nodes[i])
    }

    /// Specified complex power injection of every node.
    pub fn injection(&self) -> Vec<Complex64> {
        self.nodes.iter().map(|n| n.injection()).collect()
    }

    /// Node currents `Y * U` at the calculated voltages.
    pub fn currents(&self) -> Vec<Complex64> {
        self.y_bus.mat_vec(&self.voltage)
    }

    /// Current mismatch `Y*U - conj(S)/conj(U)` per node, at the calculated
    /// voltages and specified injections. Slack entries carry the power the
    /// slack absorbs and are not expected to be zero.
    pub fn power_balance(&self) -> Vec<Complex64> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, n)| {
                let u = self.voltage[i];
                dot(self.y_bus.row(i), &self.voltage) - (n.injection() / u).conj()
            })
            .collect()
    }

    /// Writes a voltage vector (calculation order) into the model.
    pub(crate) fn set_voltage(&mut self, v: &[Complex64]) {
        self.voltage.copy_from_slice(v);
        for (n, &v) in self.nodes.iter_mut().zip(v) {
            n.voltage = Some(v);
        }
    }

    pub(crate) fn apply_load_models(&mut self) {
        for (id, model) in self.load_models.iter() {
            if let Some(i) = self.order.index(*id) {
                model.apply(&mut self.nodes[i]);
            }
        }
    }

    /// Makes the present node voltages the starting point of the next solve.
    pub(crate) fn warm_start(&mut self) {
        self.initial_voltage = self.nodes.iter().map(starting_voltage).collect();
        log::debug!("V0: {}", format_polar_vec(&self.initial_voltage));
    }

    /// Clears forced markers left on nameplate PV nodes by an earlier solve.
    pub(crate) fn reset_controls(&mut self) {
        for n in self.nodes.iter_mut().filter(|n| n.is_pv()) {
            n.control = ControlState::Pv;
        }
    }

    /// Returns nodes forced off voltage control to their nameplate PV type.
    /// They keep their `ForcedPq` control state and pinned generation.
    pub(crate) fn restore_nameplate(self) -> Result<Self> {
        let forced: Vec<(usize, ControlState)> = self
            .nodes
            .iter()
            .filter(|n| n.control.is_forced())
            .map(|n| (n.id, n.control))
            .collect();
        if forced.is_empty() {
            return Ok(self);
        }

        let mut grid = self.rebuild_with(|nodes| {
            for n in nodes.iter_mut().filter(|n| n.control.is_forced()) {
                n.node_type = NodeType::PV;
            }
        })?;
        for (id, control) in forced {
            if let Some(n) = grid.node_mut(id) {
                n.control = control;
            }
        }
        Ok(grid)
    }
}

/// Starting voltage of a node: slack at nominal, PV at the preset magnitude
/// keeping any carried-over angle, PQ at the carried-over voltage or nominal.
fn starting_voltage(n: &Node) -> Complex64 {
    let carried = n.voltage.filter(|v| v.norm() > EPSILON && v.is_finite());
    match n.node_type {
        NodeType::Slack => n.nominal_voltage,
        NodeType::PV => {
            let angle = carried.map(|v| v.arg()).unwrap_or(0.0);
            Complex64::from_polar(n.preset_magnitude, angle)
        }
        NodeType::PQ => carried.unwrap_or(n.nominal_voltage),
    }
}
