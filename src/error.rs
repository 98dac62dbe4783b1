use thiserror::Error;

/// Conditions that stop a model build or a solve attempt immediately.
///
/// Functions in this crate return `anyhow::Result`; these variants can be
/// recovered with `err.downcast_ref::<PowerFlowError>()`.
#[derive(Debug, Error, PartialEq)]
pub enum PowerFlowError {
    #[error("branch {branch} references unknown node {node}")]
    UnknownNode { branch: usize, node: usize },

    #[error("no node with id {0}")]
    NoSuchNode(usize),

    #[error("node id {0} is used more than once")]
    DuplicateNode(usize),

    #[error("matrix is singular (zero pivot in column {column})")]
    SingularMatrix { column: usize },

    #[error("voltage at node {node} left the plausibility band ({magnitude})")]
    VoltageOutOfBand { node: usize, magnitude: f64 },

    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("invalid calculation options: {0}")]
    InvalidOptions(String),
}
