use crate::control::ControlState;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

#[derive(Debug, PartialEq, Eq, Copy, Clone, Default, Hash, Serialize, Deserialize)]
pub enum NodeType {
    /// Fixed active and reactive power.
    #[default]
    PQ,
    /// Fixed voltage magnitude and active power.
    PV,
    /// Fixed voltage magnitude and angle. Absorbs the power imbalance.
    Slack,
}

impl NodeType {
    /// Position of the type's block in the calculation order.
    pub(crate) fn rank(&self) -> u8 {
        match self {
            NodeType::PQ => 0,
            NodeType::PV => 1,
            NodeType::Slack => 2,
        }
    }
}

/// Node (bus) of the network.
///
/// Power values are complex `P + jQ`. `load` is consumed, `generation` is
/// injected, so the specified injection is `generation - load`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Caller-assigned identifier.
    pub id: usize,

    /// Position in the calculation order. Assigned by the model.
    #[serde(default)]
    pub calc_index: usize,

    pub node_type: NodeType,

    /// Calculated voltage, or a warm start when set before a build.
    #[serde(default)]
    pub voltage: Option<Complex64>,

    /// Nominal voltage phasor. Slack nodes are held at this value.
    pub nominal_voltage: Complex64,

    /// Target voltage magnitude of a PV node.
    #[serde(default)]
    pub preset_magnitude: f64,

    #[serde(default)]
    pub load: Complex64,

    #[serde(default)]
    pub generation: Complex64,

    /// Lower bound on generated reactive power.
    #[serde(default)]
    pub q_min: Option<f64>,

    /// Upper bound on generated reactive power.
    #[serde(default)]
    pub q_max: Option<f64>,

    #[serde(default)]
    pub shunt_admittance: Complex64,

    /// Control state reported by the last solve.
    #[serde(default)]
    pub control: ControlState,
}

impl Node {
    pub fn new(id: usize, node_type: NodeType, nominal_voltage: Complex64) -> Self {
        Self {
            id,
            calc_index: 0,
            node_type,
            voltage: None,
            nominal_voltage,
            preset_magnitude: 0.0,
            load: Complex64::default(),
            generation: Complex64::default(),
            q_min: None,
            q_max: None,
            shunt_admittance: Complex64::default(),
            control: ControlState::for_type(node_type, ControlState::Pq),
        }
    }

    pub fn pq(id: usize, nominal_voltage: Complex64, load: Complex64) -> Self {
        Self {
            load,
            ..Self::new(id, NodeType::PQ, nominal_voltage)
        }
    }

    /// Voltage-controlled node producing active power `p`.
    pub fn pv(id: usize, nominal_voltage: Complex64, preset_magnitude: f64, p: f64) -> Self {
        Self {
            preset_magnitude,
            generation: Complex64::new(p, 0.0),
            ..Self::new(id, NodeType::PV, nominal_voltage)
        }
    }

    pub fn slack(id: usize, voltage: Complex64) -> Self {
        Self::new(id, NodeType::Slack, voltage)
    }

    pub fn with_load(mut self, load: Complex64) -> Self {
        self.load = load;
        self
    }

    pub fn with_q_limits(mut self, q_min: Option<f64>, q_max: Option<f64>) -> Self {
        self.q_min = q_min;
        self.q_max = q_max;
        self
    }

    pub fn with_shunt(mut self, y: Complex64) -> Self {
        self.shunt_admittance = y;
        self
    }

    pub fn with_voltage(mut self, v: Complex64) -> Self {
        self.voltage = Some(v);
        self
    }

    pub fn is_pq(&self) -> bool {
        self.node_type == NodeType::PQ
    }
    pub fn is_pv(&self) -> bool {
        self.node_type == NodeType::PV
    }
    pub fn is_slack(&self) -> bool {
        self.node_type == NodeType::Slack
    }

    /// Type the node behaves as: a nameplate PV node held at a reactive
    /// bound behaves as PQ.
    pub fn effective_type(&self) -> NodeType {
        if self.control.is_forced() {
            NodeType::PQ
        } else {
            self.node_type
        }
    }

    /// Specified complex power injection.
    pub fn injection(&self) -> Complex64 {
        self.generation - self.load
    }

    /// True when the preset magnitude can be used as a voltage target.
    pub(crate) fn has_preset(&self) -> bool {
        self.preset_magnitude.is_finite() && self.preset_magnitude > 0.0
    }
}
