//! End-to-end verification of a candidate puzzle: run the program on the
//! world, then check goal satisfaction (through a satisfiability call with
//! the item variables pinned to the world) and the code-shape constraint
//! (structurally).

use crate::domain::{CrashKind, Program, Puzzle};
use crate::emulator::Emulator;
use crate::smt::{GoalSmt, SmtSolver, WorldSmt};
use tracing::debug;
use z3::{Config, Context};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerifyOutcome {
    pub crash: Option<CrashKind>,
    pub goal_ok: bool,
    pub cons_ok: bool,
}

impl VerifyOutcome {
    pub fn accepted(&self) -> bool {
        self.crash.is_none() && self.goal_ok && self.cons_ok
    }
}

pub fn verify(program: &Program, puzzle: &Puzzle) -> VerifyOutcome {
    let mut run_world = puzzle.world.clone();
    Emulator::new().run(program, &mut run_world);

    if let Some(crash) = run_world.crash() {
        debug!(kind = %crash.kind, "candidate crashed during verification");
        return VerifyOutcome {
            crash: Some(crash.kind),
            goal_ok: false,
            cons_ok: false,
        };
    }

    let goal_ok = if puzzle.goal.is_draw() {
        // a drawing puzzle is solved when the run reproduced the lines
        puzzle.world.markers == run_world.drawn_markers
    } else {
        let config = Config::new();
        let ctx = Context::new(&config);
        let world_smt = WorldSmt::new(&ctx, puzzle.world.rows, puzzle.world.cols);
        let goal_smt = GoalSmt::new(&world_smt, &puzzle.goal, &run_world.trace);

        let solver = SmtSolver::new(&ctx);
        solver.assert(&world_smt.items.properties());
        solver.assert(&world_smt.items.pin_concrete(&puzzle.world.items));
        solver.assert(&goal_smt.properties_for_emulator());
        solver.is_sat()
    };

    VerifyOutcome {
        crash: None,
        goal_ok,
        cons_ok: puzzle.constraints.is_satisfied_by(program),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        CodeConstraints, ConstraintKey, Item, ItemColour, ItemName, Line, MarkerColour,
    };
    use crate::test_utils::{find_red_strawberry_goal, open_world};
    use serde_json::json;

    fn fd_fd() -> Program {
        Program::from_value(&json!({"run": [{"type": "fd"}, {"type": "fd"}]})).unwrap()
    }

    fn fd_fd_constraints() -> CodeConstraints {
        let mut constraints = CodeConstraints::default();
        constraints.exactly.insert(ConstraintKey::Fd, 2);
        constraints.exactly.insert(ConstraintKey::All, 2);
        constraints
    }

    #[test]
    fn accepting_run() {
        let mut world = open_world(3, 3, 1, 0, crate::domain::Direction::East);
        world.items[5] = Some(Item::new(ItemName::Strawberry, ItemColour::Red, 1));
        let puzzle = Puzzle::new(world, find_red_strawberry_goal(), fd_fd_constraints());

        let outcome = verify(&fd_fd(), &puzzle);
        assert!(outcome.accepted());
    }

    #[test]
    fn missing_goal_item_is_rejected() {
        let world = open_world(3, 3, 1, 0, crate::domain::Direction::East);
        let puzzle = Puzzle::new(world, find_red_strawberry_goal(), fd_fd_constraints());

        let outcome = verify(&fd_fd(), &puzzle);
        assert!(outcome.crash.is_none());
        assert!(!outcome.goal_ok);
    }

    #[test]
    fn constraint_violation_is_rejected() {
        let mut world = open_world(3, 3, 1, 0, crate::domain::Direction::East);
        world.items[5] = Some(Item::new(ItemName::Strawberry, ItemColour::Red, 1));
        let puzzle = Puzzle::new(world, find_red_strawberry_goal(), fd_fd_constraints());

        let three_steps = Program::from_value(
            &json!({"run": [{"type": "fd"}, {"type": "fd"}, {"type": "rt"}]}),
        )
        .unwrap();
        let outcome = verify(&three_steps, &puzzle);
        assert!(!outcome.cons_ok);
    }

    #[test]
    fn crashing_program_is_rejected() {
        let mut world = open_world(3, 3, 1, 1, crate::domain::Direction::East);
        world.items[5] = Some(Item::new(ItemName::Strawberry, ItemColour::Red, 1));
        let puzzle = Puzzle::new(world, find_red_strawberry_goal(), fd_fd_constraints());

        let outcome = verify(&fd_fd(), &puzzle);
        assert_eq!(outcome.crash, Some(CrashKind::OutOfWorld));
    }

    #[test]
    fn draw_puzzle_compares_markers() {
        let mut world = open_world(3, 3, 0, 0, crate::domain::Direction::East);
        world
            .markers
            .apply_line(&Line::new(0, 0, 2, 0, MarkerColour::Black))
            .unwrap();
        let goal = crate::domain::Goal::draw_from_lines(&world.markers.to_lines()).unwrap();
        let puzzle = Puzzle::new(world, goal, CodeConstraints::default());

        let outcome = verify(&fd_fd(), &puzzle);
        assert!(outcome.accepted());

        let one_step = Program::from_value(&json!({"run": [{"type": "fd"}]})).unwrap();
        assert!(!verify(&one_step, &puzzle).goal_ok);
    }
}
