//! The solver layer: the z3 wrapper, normal-form manipulation, grid path
//! enumeration, the world and goal encodings, reachability and trace
//! optimality.

pub mod boolean;
pub mod goal;
pub mod graph;
pub mod optimality;
pub mod reachability;
pub mod solver;
pub mod world;

pub use goal::GoalSmt;
pub use graph::GridGraph;
pub use reachability::{cache_file_name, reachability_formula, DEFAULT_K_SHORTEST_PATHS};
pub use solver::{EnumSort, SmtSolver};
pub use world::WorldSmt;
