//! Completion of partial worlds into concrete, goal-satisfying worlds.

mod world_gen;

pub use world_gen::{SynthesisLimits, WorldSynthesizer};
