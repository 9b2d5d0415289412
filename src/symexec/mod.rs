//! Symbolic execution: runs a program inside a partially-undefined world,
//! forcing the facts a non-crashing run requires and recording the visit
//! trace.

mod executor;
mod oracle;
mod sym_world;

pub use executor::{SymExecutor, MIN_GRID};
pub use oracle::{DecisionOracle, RandomOracle};
pub use sym_world::{SymItem, SymTile, SymWorld};
