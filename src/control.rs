use crate::node::NodeType;
use serde::{Deserialize, Serialize};

/// Reactive bound a voltage-controlled node has been held at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QLimit {
    Min,
    Max,
}

/// Control state of a node.
///
/// `ForcedPq` is a nameplate PV node whose generated reactive power hit a
/// bound. It is solved as PQ with the generation pinned to that bound until
/// its voltage magnitude moves past the preset in the relieving direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ControlState {
    #[default]
    Pq,
    Pv,
    ForcedPq(QLimit),
    /// Slack nodes.
    Fixed,
}

/// Quantities the transition rules look at, all taken at the present
/// voltage estimate.
#[derive(Debug, Clone, Copy)]
pub struct Reactive {
    /// Generated reactive power (injection plus local load).
    pub q_gen: f64,
    pub q_min: Option<f64>,
    pub q_max: Option<f64>,
    pub magnitude: f64,
    pub preset: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Transition {
    Hold,
    /// Pin generated Q to `q` and solve the node as PQ.
    ToPq { limit: QLimit, q: f64 },
    /// Return to voltage control at the preset magnitude.
    ToPv,
}

impl ControlState {
    /// Initial state for a node of the given type. A node already forced
    /// keeps that state while it is typed PQ.
    pub fn for_type(node_type: NodeType, current: ControlState) -> Self {
        match (node_type, current) {
            (NodeType::PQ, ControlState::ForcedPq(limit)) => ControlState::ForcedPq(limit),
            (NodeType::PQ, _) => ControlState::Pq,
            (NodeType::PV, _) => ControlState::Pv,
            (NodeType::Slack, _) => ControlState::Fixed,
        }
    }

    pub fn is_forced(&self) -> bool {
        matches!(self, ControlState::ForcedPq(_))
    }

    pub fn next(self, r: &Reactive) -> Transition {
        match self {
            ControlState::Pv => match (r.q_min, r.q_max) {
                (_, Some(q_max)) if r.q_gen > q_max => Transition::ToPq {
                    limit: QLimit::Max,
                    q: q_max,
                },
                (Some(q_min), _) if r.q_gen < q_min => Transition::ToPq {
                    limit: QLimit::Min,
                    q: q_min,
                },
                _ => Transition::Hold,
            },
            ControlState::ForcedPq(QLimit::Max) if r.magnitude > r.preset => Transition::ToPv,
            ControlState::ForcedPq(QLimit::Min) if r.magnitude < r.preset => Transition::ToPv,
            _ => Transition::Hold,
        }
    }

    pub fn apply(self, transition: &Transition) -> Self {
        match transition {
            Transition::Hold => self,
            Transition::ToPq { limit, .. } => ControlState::ForcedPq(*limit),
            Transition::ToPv => ControlState::Pv,
        }
    }
}
