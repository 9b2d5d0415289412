//! Orchestration of the synthesis stages over a reference puzzle.

mod driver;
mod set_cover;
mod verbosity;

pub use driver::{run, PipelineConfig};
pub use set_cover::goal_set_cover;
pub use verbosity::Verbosity;
