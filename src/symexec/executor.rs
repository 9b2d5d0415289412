//! Driving a program through a partial world. Successful runs yield the
//! partial world with its trace; crashing starts are simply discarded and
//! retried elsewhere.

use crate::domain::{Direction, Program, Turtle};
use crate::emulator::{Emulator, TurtleWorld};
use crate::symexec::{DecisionOracle, SymWorld};
use tracing::debug;

/// Number of random starts tried before giving up on a program.
const MAX_RANDOM_TRIES: usize = 100;

/// Scratch grid used to measure the footprint of a program's trace.
const PROBE_SIZE: usize = 8;

pub const MIN_GRID: usize = 3;

#[derive(Debug)]
pub struct SymExecutor<O> {
    emulator: Emulator,
    oracle: O,
}

impl<O: DecisionOracle> SymExecutor<O> {
    pub fn new(oracle: O) -> Self {
        Self {
            emulator: Emulator::new(),
            oracle,
        }
    }

    /// Run the program from a fixed start; `None` when the run crashes.
    pub fn execute_at(
        &self,
        rows: usize,
        cols: usize,
        program: &Program,
        turtle: Turtle,
    ) -> Option<SymWorld> {
        let mut world = SymWorld::new(rows, cols, turtle);
        self.emulator.run(program, &mut world);
        if world.crashed() {
            debug!(?turtle, "symbolic run crashed");
            return None;
        }
        Some(world)
    }

    /// Run the program from oracle-chosen starts until one survives.
    pub fn execute_random(
        &mut self,
        rows: usize,
        cols: usize,
        program: &Program,
    ) -> Option<SymWorld> {
        for _ in 0..MAX_RANDOM_TRIES {
            let turtle = Turtle::new(
                self.oracle.pick_int(0, rows) as i64,
                self.oracle.pick_int(0, cols) as i64,
                Direction::ALL[self.oracle.pick_int(0, Direction::ALL.len())],
            );
            if let Some(world) = self.execute_at(rows, cols, program, turtle) {
                return Some(world);
            }
        }
        None
    }

    /// The minimum enclosing grid of the program's trace, measured on a
    /// scratch grid and clamped to at least 3x3.
    pub fn min_world_size(&mut self, program: &Program, square: bool) -> (usize, usize) {
        let Some(world) = self.execute_random(PROBE_SIZE, PROBE_SIZE, program) else {
            return (MIN_GRID, MIN_GRID);
        };

        let (mut min_y, mut max_y) = (usize::MAX, 0);
        let (mut min_x, mut max_x) = (usize::MAX, 0);
        for &i in &world.trace {
            let (y, x) = crate::domain::grid::i2yx(i, PROBE_SIZE);
            min_y = min_y.min(y);
            max_y = max_y.max(y);
            min_x = min_x.min(x);
            max_x = max_x.max(x);
        }

        let rows = (max_y - min_y + 1).max(MIN_GRID);
        let cols = (max_x - min_x + 1).max(MIN_GRID);
        if square {
            (rows.max(cols), rows.max(cols))
        } else {
            (rows, cols)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symexec::RandomOracle;
    use serde_json::json;

    fn program(value: serde_json::Value) -> Program {
        Program::from_value(&value).unwrap()
    }

    fn executor() -> SymExecutor<RandomOracle> {
        SymExecutor::new(RandomOracle::from_seed(0))
    }

    #[test]
    fn straight_line_fits_one_by_three() {
        // fd fd fd spans four tiles in a line, clamped to 3 rows
        let straight = program(json!({"run": [
            {"type": "fd"}, {"type": "fd"}, {"type": "fd"}
        ]}));
        let (rows, cols) = executor().min_world_size(&straight, false);
        assert_eq!(rows.min(cols), MIN_GRID);
        assert_eq!(rows.max(cols), 4);
    }

    #[test]
    fn two_forwards_clamp_to_three_by_three() {
        let short = program(json!({"run": [{"type": "fd"}, {"type": "fd"}]}));
        assert_eq!(executor().min_world_size(&short, true), (3, 3));
    }

    #[test]
    fn square_walk_is_three_by_three() {
        let square = program(json!({"run": [
            {"type": "repeat", "times": 4, "body": [
                {"type": "fd"}, {"type": "fd"}, {"type": "rt"}
            ]}
        ]}));
        assert_eq!(executor().min_world_size(&square, true), (3, 3));
    }

    #[test]
    fn fixed_start_is_deterministic() {
        let walk = program(json!({"run": [{"type": "fd"}, {"type": "rt"}, {"type": "fd"}]}));
        let executor = executor();
        let turtle = Turtle::new(2, 0, Direction::North);
        let a = executor.execute_at(3, 3, &walk, turtle).unwrap();
        let b = executor.execute_at(3, 3, &walk, turtle).unwrap();
        assert_eq!(a.trace, b.trace);
        assert_eq!(a.trace, vec![6, 3, 4]);
    }

    #[test]
    fn crashing_start_yields_none() {
        let walk = program(json!({"run": [{"type": "fd"}]}));
        let executor = executor();
        // facing north on the top row walks off the grid
        let turtle = Turtle::new(0, 1, Direction::North);
        assert!(executor.execute_at(3, 3, &walk, turtle).is_none());
    }
}
