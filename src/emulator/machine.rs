//! The instruction dispatcher shared by the reference emulator and the
//! symbolic executor. Both worlds expose the same five operations; the
//! emulator unrolls `repeat` blocks over them and stops at the first
//! crash.

use crate::domain::{Block, PenColour, Program};

/// The operations a world must support to be driven by the emulator. The
/// concrete [`crate::domain::World`] checks facts, the symbolic
/// [`crate::symexec::SymWorld`] forces them.
pub trait TurtleWorld {
    fn fd(&mut self);
    fn bk(&mut self);
    fn lt(&mut self);
    fn rt(&mut self);
    fn setpc(&mut self, colour: Option<PenColour>);
    fn crashed(&self) -> bool;
}

impl TurtleWorld for crate::domain::World {
    fn fd(&mut self) {
        crate::domain::World::fd(self);
    }

    fn bk(&mut self) {
        crate::domain::World::bk(self);
    }

    fn lt(&mut self) {
        crate::domain::World::lt(self);
    }

    fn rt(&mut self) {
        crate::domain::World::rt(self);
    }

    fn setpc(&mut self, colour: Option<PenColour>) {
        crate::domain::World::setpc(self, colour);
    }

    fn crashed(&self) -> bool {
        crate::domain::World::crashed(self)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Emulator;

impl Emulator {
    pub fn new() -> Self {
        Self
    }

    /// Run the whole program; the world accumulates trace, drawn markers
    /// and the crash state.
    pub fn run<W: TurtleWorld>(&self, program: &Program, world: &mut W) {
        self.run_body(&program.run, world);
    }

    fn run_body<W: TurtleWorld>(&self, body: &[Block], world: &mut W) {
        for block in body {
            if world.crashed() {
                return;
            }
            match block {
                Block::Fd => world.fd(),
                Block::Bk => world.bk(),
                Block::Lt => world.lt(),
                Block::Rt => world.rt(),
                Block::SetPc { value } => world.setpc(*value),
                Block::Repeat { times, body } => {
                    for _ in 0..*times {
                        if world.crashed() {
                            return;
                        }
                        self.run_body(body, world);
                    }
                }
                Block::Cursor => {
                    debug_assert!(false, "cursor reached the emulator");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::grid::yx2i;
    use crate::domain::{CrashKind, Direction, MarkerColour, Program};
    use crate::test_utils::open_world;
    use serde_json::json;

    fn program(value: serde_json::Value) -> Program {
        Program::from_value(&value).unwrap()
    }

    #[test]
    fn square_walk_returns_home() {
        // repeat(4){fd fd rt} draws a closed 2x2 square outline
        let mut world = open_world(3, 3, 2, 0, Direction::North);
        let square = program(json!({"run": [
            {"type": "repeat", "times": 4, "body": [
                {"type": "fd"}, {"type": "fd"}, {"type": "rt"}
            ]}
        ]}));
        Emulator::new().run(&square, &mut world);
        assert!(!world.crashed());
        assert_eq!(world.trace.len(), 9);
        assert_eq!(*world.trace.last().unwrap(), yx2i(2, 0, 3));
        assert_eq!(world.turtle.dir, Direction::North);
        assert_eq!(world.drawn_markers.to_lines().len(), 8);
    }

    #[test]
    fn crash_stops_the_unrolling() {
        let mut world = open_world(3, 3, 0, 0, Direction::North);
        let runaway = program(json!({"run": [
            {"type": "repeat", "times": 12, "body": [{"type": "fd"}]}
        ]}));
        Emulator::new().run(&runaway, &mut world);
        assert_eq!(world.crash().unwrap().kind, CrashKind::OutOfWorld);
        // only the first fd could have run
        assert_eq!(world.trace.len(), 1);
    }

    #[test]
    fn pen_colour_changes_mid_run() {
        let mut world = open_world(3, 3, 1, 0, Direction::East);
        let colours = program(json!({"run": [
            {"type": "setpc", "value": "red"},
            {"type": "fd"},
            {"type": "setpc", "value": "blue"},
            {"type": "fd"}
        ]}));
        Emulator::new().run(&colours, &mut world);
        assert!(!world.crashed());
        let lines = world.drawn_markers.to_lines();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].colour().unwrap(), MarkerColour::Red);
        assert_eq!(lines[1].colour().unwrap(), MarkerColour::Blue);
    }
}
