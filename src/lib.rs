mod branch;
mod case;
mod control;
mod dense;
mod error;
mod gauss;
mod grid;
mod jac;
mod load;
mod lu;
mod newton;
mod node;
mod options;
mod order;
mod pfsoln;
mod runpf;
mod solution;
mod sparse;
mod traits;
mod ybus;

pub mod debug;
pub mod math;

pub use branch::*;
pub use case::*;
pub use control::*;
pub use dense::*;
pub use error::*;
pub use gauss::*;
pub use grid::*;
pub use jac::*;
pub use load::*;
pub use lu::*;
pub use newton::*;
pub use node::*;
pub use options::*;
pub use order::*;
pub use pfsoln::*;
pub use runpf::*;
pub use solution::*;
pub use sparse::*;
pub use traits::*;
pub use ybus::*;
