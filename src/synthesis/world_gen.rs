//! World synthesis: expand the partial worlds of a mutated program into
//! many concrete worlds that embed the goal, keep the trace optimal and
//! stay visually close to the reference.

use crate::domain::{CodeConstraints, Direction, Goal, Program, Puzzle, Turtle, WorldStats};
use crate::smt::optimality::{optimal_trace_properties, redundant_pen_colours};
use crate::smt::solver::timed_context;
use crate::smt::{reachability_formula, GoalSmt, SmtSolver, WorldSmt, DEFAULT_K_SHORTEST_PATHS};
use crate::symexec::{RandomOracle, SymExecutor, SymWorld};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy)]
pub struct SynthesisLimits {
    /// Distinct non-crashing starting configurations to expand.
    pub n_init: usize,
    /// Worlds enumerated per partial world.
    pub n_worlds_per_init: usize,
    /// Overall cap per `(program, constraint, goal)` triple.
    pub n_max: usize,
    /// Wall-clock deadline of one triple; enumeration stops at expiry and
    /// keeps the puzzles produced so far.
    pub deadline: Option<Duration>,
}

impl Default for SynthesisLimits {
    fn default() -> Self {
        Self {
            n_init: 3,
            n_worlds_per_init: 1000,
            n_max: 3000,
            deadline: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct WorldSynthesizer {
    rows: usize,
    cols: usize,
    symmetric: bool,
    cache_dir: Option<PathBuf>,
}

impl WorldSynthesizer {
    pub fn new(rows: usize, cols: usize, symmetric: bool, cache_dir: Option<PathBuf>) -> Self {
        Self {
            rows,
            cols,
            symmetric,
            cache_dir,
        }
    }

    /// Run the program symbolically from shuffled starting configurations
    /// until enough distinct non-crashing partial worlds are found.
    pub fn partial_worlds(
        &self,
        program: &Program,
        n_init: usize,
        rng: &mut StdRng,
    ) -> Vec<SymWorld> {
        let executor = SymExecutor::new(RandomOracle::from_seed(rng.gen()));

        let mut starts: Vec<Turtle> = (0..self.rows as i64)
            .flat_map(|y| {
                (0..self.cols as i64).flat_map(move |x| {
                    Direction::ALL.map(move |dir| Turtle::new(y, x, dir))
                })
            })
            .collect();
        starts.shuffle(rng);

        let max_tries = n_init * 10;
        let mut pworlds = vec![];
        for turtle in starts.into_iter().take(max_tries) {
            if pworlds.len() >= n_init {
                break;
            }
            let Some(pworld) = executor.execute_at(self.rows, self.cols, program, turtle)
            else {
                continue;
            };
            if redundant_pen_colours(program, &pworld) {
                debug!(?turtle, "pen colours never drawn, start rejected");
                continue;
            }
            pworlds.push(pworld);
        }
        pworlds
    }

    /// Expand one `(program, constraint, goal)` triple into puzzles.
    pub fn synthesize(
        &self,
        program: &Program,
        constraints: &CodeConstraints,
        goal: &Goal,
        reference: &WorldStats,
        limits: &SynthesisLimits,
        rng: &mut StdRng,
    ) -> Vec<Puzzle> {
        let pworlds = self.partial_worlds(program, limits.n_init, rng);
        let marker_world = reference.markers_used;
        let started = Instant::now();

        let mut puzzles = vec![];
        for pworld in &pworlds {
            if puzzles.len() >= limits.n_max {
                break;
            }
            if limits.deadline.is_some_and(|deadline| started.elapsed() > deadline) {
                debug!("triple deadline expired, keeping partial results");
                break;
            }
            let budget = limits.n_max - puzzles.len();
            let per_init = limits.n_worlds_per_init.min(budget);
            puzzles.extend(self.expand_partial_world(
                pworld,
                constraints,
                goal,
                reference,
                marker_world,
                per_init,
            ));
        }
        info!(
            puzzles = puzzles.len(),
            pworlds = pworlds.len(),
            "expanded triple into puzzles"
        );
        puzzles
    }

    fn expand_partial_world(
        &self,
        pworld: &SymWorld,
        constraints: &CodeConstraints,
        goal: &Goal,
        reference: &WorldStats,
        marker_world: bool,
        n_max: usize,
    ) -> Vec<Puzzle> {
        let ctx = timed_context();
        let world_smt = WorldSmt::new(&ctx, self.rows, self.cols);
        let goal_smt = GoalSmt::new(&world_smt, goal, &pworld.trace);

        let solver = SmtSolver::new(&ctx);
        solver.assert(&world_smt.base_properties(self.symmetric));
        if marker_world {
            solver.assert(&world_smt.marker_world_properties());
        } else {
            let reachability = reachability_formula(
                &ctx,
                &world_smt.tiles,
                self.rows,
                self.cols,
                DEFAULT_K_SHORTEST_PATHS,
                self.cache_dir.as_deref(),
            );
            solver.assert(&world_smt.item_world_properties(reference, reachability));
        }
        solver.assert(&goal_smt.properties());
        solver.assert(&world_smt.pin_partial(pworld, marker_world));

        if !goal_smt.is_draw() {
            let feasible = |path: &[usize]| goal_smt.feasible_path(path);
            solver.assert(&optimal_trace_properties(
                &ctx,
                &world_smt.tiles,
                self.rows,
                self.cols,
                &pworld.trace,
                pworld.init_turtle.dir,
                &feasible,
                constraints,
            ));
        }

        let vars = world_smt.vars();
        let mut puzzles = vec![];
        while puzzles.len() < n_max {
            let Some(model) = solver.solve() else {
                break;
            };
            let world = world_smt.decode(&model);
            puzzles.push(Puzzle::new(world, goal.clone(), constraints.clone()));
            solver.block_model(&model, &vars);
        }
        puzzles
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ConstraintKey, ItemColour, ItemName};
    use crate::emulator::verify;
    use rand::SeedableRng;
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

    fn strawberry_reference() -> crate::domain::World {
        let mut reference = crate::test_utils::open_world_3x3();
        reference.items[8] = Some(crate::domain::Item::new(
            ItemName::Strawberry,
            ItemColour::Red,
            1,
        ));
        reference
    }

    fn limits(n: usize) -> SynthesisLimits {
        SynthesisLimits {
            n_init: 2,
            n_worlds_per_init: n,
            n_max: n,
            ..SynthesisLimits::default()
        }
    }

    #[test]
    fn partial_worlds_are_distinct_and_non_crashing() {
        let synthesizer = WorldSynthesizer::new(3, 3, true, None);
        let mut rng = StdRng::seed_from_u64(0);
        let pworlds = synthesizer.partial_worlds(&fd_fd(), 3, &mut rng);
        assert!(!pworlds.is_empty());
        for pworld in &pworlds {
            assert!(pworld.crash().is_none());
            assert_eq!(pworld.trace.len(), 3);
        }
    }

    #[test]
    fn strawberry_hunt_worlds_verify_end_to_end() {
        // the baseline task: fd fd onto a single red strawberry
        let synthesizer = WorldSynthesizer::new(3, 3, true, None);
        let reference = strawberry_reference();
        let goal = crate::test_utils::find_red_strawberry_goal();
        let mut rng = StdRng::seed_from_u64(42);

        let puzzles = synthesizer.synthesize(
            &fd_fd(),
            &fd_fd_constraints(),
            &goal,
            &reference.stats(),
            &limits(4),
            &mut rng,
        );
        assert!(!puzzles.is_empty());

        for puzzle in &puzzles {
            // exactly one red strawberry, no walls, no forbidden areas
            let strawberries = (0..9)
                .filter(|i| {
                    puzzle.world.item(*i).is_some_and(|item| {
                        item.name == ItemName::Strawberry && item.colour == ItemColour::Red
                    })
                })
                .count();
            assert_eq!(strawberries, 1);
            assert_eq!(puzzle.world.stats().n_walls, 0);
            assert_eq!(puzzle.world.stats().n_forbidden, 0);

            let outcome = verify(&fd_fd(), puzzle);
            assert!(outcome.accepted());
        }
    }

    #[test]
    fn enumeration_cap_of_one_is_respected() {
        let synthesizer = WorldSynthesizer::new(3, 3, true, None);
        let reference = strawberry_reference();
        let goal = crate::test_utils::find_red_strawberry_goal();
        let mut rng = StdRng::seed_from_u64(1);

        let puzzles = synthesizer.synthesize(
            &fd_fd(),
            &fd_fd_constraints(),
            &goal,
            &reference.stats(),
            &SynthesisLimits {
                n_init: 1,
                n_worlds_per_init: 1,
                n_max: 1,
                ..SynthesisLimits::default()
            },
            &mut rng,
        );
        assert_eq!(puzzles.len(), 1);
    }

    #[test]
    fn draw_reference_produces_marker_worlds() {
        // a reference with lines switches synthesis to marker worlds
        let mut reference = crate::test_utils::open_world(3, 3, 2, 0, Direction::North);
        reference
            .markers
            .apply_line(&crate::domain::Line::new(
                0,
                0,
                0,
                2,
                crate::domain::MarkerColour::Black,
            ))
            .unwrap();
        let program = Program::from_value(&json!({"run": [
            {"type": "fd"}, {"type": "fd"}
        ]}))
        .unwrap();
        let goal = Goal::draw_from_lines(&reference.markers.to_lines()).unwrap();

        let synthesizer = WorldSynthesizer::new(3, 3, true, None);
        let mut rng = StdRng::seed_from_u64(3);
        // sweep every start so that traces anchored to the borders appear
        let puzzles = synthesizer.synthesize(
            &program,
            &CodeConstraints::default(),
            &goal,
            &reference.stats(),
            &SynthesisLimits {
                n_init: 36,
                n_worlds_per_init: 1,
                n_max: 4,
                ..SynthesisLimits::default()
            },
            &mut rng,
        );

        assert!(!puzzles.is_empty());
        for puzzle in &puzzles {
            assert_eq!(puzzle.world.stats().n_items, 0);
            assert!(!puzzle.world.markers.is_empty());
        }
    }
}
