//! Goal embedding: each objective kind contributes a formula connecting
//! the item variables, the wall variables and the concrete visit trace.
//! `findonly` is lowered to a `find` plus the forbiddance of the negated
//! spec before encoding.

use crate::domain::{Cnf, Goal, ObjectiveKind};
use crate::smt::boolean::negate_cnf;
use crate::smt::graph::GridGraph;
use crate::smt::solver::and_all;
use crate::smt::world::WorldSmt;
use std::collections::BTreeSet;
use z3::ast::{Ast, Bool, Int};

/// The positive part of a goal; at most one per puzzle.
#[derive(Debug, Clone)]
enum Target {
    Find(Cnf),
    CollectAll(Cnf),
    Sum { cnf: Cnf, total: u32 },
    Concat(Vec<Cnf>),
    Draw,
}

#[derive(Debug)]
pub struct GoalSmt<'a, 'ctx> {
    world: &'a WorldSmt<'ctx>,
    visited: Vec<usize>,
    target: Option<Target>,
    forbids: Vec<Cnf>,
}

impl<'a, 'ctx> GoalSmt<'a, 'ctx> {
    pub fn new(world: &'a WorldSmt<'ctx>, goal: &Goal, visited: &[usize]) -> Self {
        let mut target = None;
        let mut forbids = vec![];
        for objective in &goal.objectives {
            match objective.kind {
                ObjectiveKind::Find => {
                    target = Some(Target::Find(objective.specs[0].cnf.clone()));
                }
                ObjectiveKind::FindOnly => {
                    let cnf = objective.specs[0].cnf.clone();
                    forbids.push(negate_cnf(&cnf));
                    target = Some(Target::Find(cnf));
                }
                ObjectiveKind::Forbid => forbids.push(objective.specs[0].cnf.clone()),
                ObjectiveKind::CollectAll => {
                    target = Some(Target::CollectAll(objective.specs[0].cnf.clone()));
                }
                ObjectiveKind::Sum => {
                    target = Some(Target::Sum {
                        cnf: objective.specs[0].cnf.clone(),
                        total: objective.total_cnt.expect("validated sum objective"),
                    });
                }
                ObjectiveKind::Concat => {
                    target = Some(Target::Concat(
                        objective.specs.iter().map(|spec| spec.cnf.clone()).collect(),
                    ));
                }
                ObjectiveKind::Draw => target = Some(Target::Draw),
            }
        }
        Self {
            world,
            visited: visited.to_vec(),
            target,
            forbids,
        }
    }

    pub fn is_draw(&self) -> bool {
        matches!(self.target, Some(Target::Draw))
    }

    fn ctx(&self) -> &'ctx z3::Context {
        self.world.ctx
    }

    fn ntiles(&self) -> usize {
        self.world.ntiles()
    }

    fn non_visited(&self) -> Vec<usize> {
        let visited: BTreeSet<usize> = self.visited.iter().copied().collect();
        (0..self.ntiles()).filter(|i| !visited.contains(i)).collect()
    }

    fn visited_set(&self) -> Vec<usize> {
        let set: BTreeSet<usize> = self.visited.iter().copied().collect();
        set.into_iter().collect()
    }

    fn last_visited(&self) -> usize {
        *self.visited.last().expect("non-empty trace")
    }

    /// The full embedding used during synthesis.
    pub fn properties(&self) -> Bool<'ctx> {
        let mut constraints = vec![];
        if let Some(target) = &self.target {
            constraints.push(self.target_properties(target));
        }
        for cnf in &self.forbids {
            constraints.push(self.forbid_properties(cnf));
        }
        and_all(self.ctx(), &constraints)
    }

    /// The weaker check used by the verification emulator: the executed
    /// trace satisfies the goal, with no placement-quality constraints.
    pub fn properties_for_emulator(&self) -> Bool<'ctx> {
        let ctx = self.ctx();
        let items = &self.world.items;
        let mut constraints = vec![];
        if let Some(target) = &self.target {
            constraints.push(match target {
                Target::Find(cnf) => items.cnf_any(cnf, self.visited_set()),
                Target::CollectAll(cnf) => and_all(
                    ctx,
                    &[
                        items.cnf_any(cnf, self.visited_set()),
                        items.cnf_any(cnf, self.non_visited()).not(),
                    ],
                ),
                Target::Sum { cnf, total } => items
                    .cnf_weighted_count(cnf, self.visited_set())
                    ._eq(&Int::from_i64(ctx, *total as i64)),
                Target::Concat(cnfs) => self.concat_order(cnfs, &self.visited),
                Target::Draw => self.draw_properties(false),
            });
        }
        for cnf in &self.forbids {
            constraints.push(items.cnf_any(cnf, self.visited_set()).not());
        }
        and_all(ctx, &constraints)
    }

    fn target_properties(&self, target: &Target) -> Bool<'ctx> {
        let ctx = self.ctx();
        let items = &self.world.items;
        match target {
            Target::Find(cnf) => and_all(
                ctx,
                &[
                    items.cnf_exactly_one(cnf, 0..self.ntiles()),
                    items.cnf_at(cnf, self.last_visited()),
                ],
            ),
            Target::CollectAll(cnf) => and_all(
                ctx,
                &[
                    items.cnf_any(cnf, self.visited_set()),
                    items.cnf_any(cnf, self.non_visited()).not(),
                    items.cnf_at_least(cnf, self.visited_set(), 2),
                    items.cnf_at(cnf, self.last_visited()),
                ],
            ),
            Target::Sum { cnf, total } => {
                let total_int = Int::from_i64(ctx, *total as i64);
                let last = self.last_visited();
                let pre_visited: Vec<usize> = self
                    .visited_set()
                    .into_iter()
                    .filter(|i| *i != last)
                    .collect();
                let pre_count = items.cnf_weighted_count(cnf, pre_visited);
                let zero = Int::from_i64(ctx, 0);
                let last_count = items
                    .cnf_at(cnf, last)
                    .ite(items.count_var(last), &zero);

                // only strawberries may act as distractors
                let straw_clause: Cnf = vec![vec![
                    crate::domain::Literal::positive(crate::domain::LiteralAtom::Noname),
                    crate::domain::Literal::positive(crate::domain::LiteralAtom::Name(
                        crate::domain::ItemName::Strawberry,
                    )),
                ]];
                let only_strawberries: Vec<Bool> = (0..self.ntiles())
                    .map(|i| items.cnf_at(&straw_clause, i))
                    .collect();

                and_all(
                    ctx,
                    &[
                        pre_count.lt(&total_int),
                        Int::add(ctx, &[&pre_count, &last_count])._eq(&total_int),
                        and_all(ctx, &only_strawberries),
                        items
                            .cnf_weighted_count(cnf, 0..self.ntiles())
                            .gt(&total_int),
                    ],
                )
            }
            Target::Concat(cnfs) => {
                let mut constraints = vec![
                    self.world
                        .items
                        .cnf_at(&cnfs[cnfs.len() - 1], self.last_visited()),
                ];
                for cnf in cnfs {
                    constraints.push(items.cnf_exactly_one(cnf, 0..self.ntiles()));
                }
                constraints.push(self.concat_order(cnfs, &self.visited));
                and_all(ctx, &constraints)
            }
            Target::Draw => self.draw_properties(true),
        }
    }

    /// The visited order respects the spec order: wherever spec `k+1` is
    /// satisfied, spec `k` was satisfied strictly earlier, and never the
    /// other way around.
    fn concat_order(&self, cnfs: &[Cnf], path: &[usize]) -> Bool<'ctx> {
        let ctx = self.ctx();
        let items = &self.world.items;
        let mut constraints = vec![];
        for (k, cnf) in cnfs.iter().enumerate() {
            constraints.push(items.cnf_exactly_one(cnf, path.iter().copied()));
            if k + 1 >= cnfs.len() {
                break;
            }
            let next = &cnfs[k + 1];
            for (position, tile) in path.iter().enumerate().skip(1) {
                let earlier = path[..position].to_vec();
                constraints.push(
                    items
                        .cnf_at(next, *tile)
                        .implies(&items.cnf_any(cnf, earlier.iter().copied())),
                );
                constraints.push(
                    items
                        .cnf_at(cnf, *tile)
                        .implies(&items.cnf_any(next, earlier).not()),
                );
            }
        }
        and_all(ctx, &constraints)
    }

    /// Drawing tasks: the trace's edges all carry markers, off-trace tiles
    /// do not exist. The synthesis variant additionally anchors the
    /// drawing against the top and left borders.
    fn draw_properties(&self, anchored: bool) -> Bool<'ctx> {
        let ctx = self.ctx();
        let markers = &self.world.markers;
        let mut constraints = vec![];

        if anchored {
            let touches_top = self
                .visited
                .iter()
                .any(|i| crate::domain::grid::i2y(*i, self.world.cols) == 0);
            let touches_left = self
                .visited
                .iter()
                .any(|i| crate::domain::grid::i2x(*i, self.world.cols) == 0);
            constraints.push(Bool::from_bool(ctx, touches_top && touches_left));
        }

        for window in self.visited.windows(2) {
            let side = crate::domain::grid::shared_side(
                window[0],
                window[1],
                self.world.rows,
                self.world.cols,
            )
            .expect("trace tiles must be adjacent");
            constraints.push(markers.flag(window[0], side).clone());
            constraints.push(markers.flag(window[1], side.opposite()).clone());
        }
        for i in self.non_visited() {
            constraints.push(self.world.tiles.exist[i].not());
        }
        and_all(ctx, &constraints)
    }

    /// Forbidden items never sit on the trace, occur at least once off the
    /// trace, and only on tiles of some shortest alternative between two
    /// visited tiles, so that the forbiddance explains the detour.
    fn forbid_properties(&self, cnf: &Cnf) -> Bool<'ctx> {
        let ctx = self.ctx();
        let items = &self.world.items;
        let mut constraints = vec![
            items.cnf_any(cnf, self.visited_set()).not(),
            items.cnf_any(cnf, self.non_visited()),
        ];

        let graph = GridGraph::new(self.world.rows, self.world.cols);
        let mut possible: BTreeSet<usize> = BTreeSet::new();
        for i in 0..self.visited.len() {
            for j in i + 1..self.visited.len() {
                for path in graph.all_shortest_paths(self.visited[i], self.visited[j]) {
                    possible.extend(path);
                }
            }
        }
        for tile in &self.visited {
            possible.remove(tile);
        }

        if !possible.is_empty() {
            let impossible: Vec<usize> = (0..self.ntiles())
                .filter(|i| !possible.contains(i) && !self.visited.contains(i))
                .collect();
            constraints.push(items.cnf_any(cnf, impossible).not());
        }
        and_all(ctx, &constraints)
    }

    /// Whether a candidate path could satisfy the goal; consumed by the
    /// trace-optimality encoding.
    pub fn feasible_path(&self, path: &[usize]) -> Bool<'ctx> {
        let ctx = self.ctx();
        let items = &self.world.items;
        let path_set: BTreeSet<usize> = path.iter().copied().collect();
        let path_set: Vec<usize> = path_set.into_iter().collect();

        let mut constraints = vec![];
        if let Some(target) = &self.target {
            constraints.push(match target {
                Target::Find(cnf) => items.cnf_any(cnf, path_set.clone()),
                Target::CollectAll(cnf) => items
                    .cnf_count(cnf, path_set.clone())
                    ._eq(&items.cnf_count(cnf, 0..self.ntiles())),
                Target::Sum { cnf, total } => items
                    .cnf_weighted_count(cnf, path_set.clone())
                    ._eq(&Int::from_i64(ctx, *total as i64)),
                Target::Concat(cnfs) => self.concat_order(cnfs, path),
                Target::Draw => Bool::from_bool(ctx, true),
            });
        }
        for cnf in &self.forbids {
            constraints.push(items.cnf_any(cnf, path_set.clone()).not());
        }
        and_all(ctx, &constraints)
    }

}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ItemColour, ItemName};
    use crate::smt::solver::SmtSolver;
    use serde_json::json;
    use z3::{Config, Context};

    fn goal(value: serde_json::Value) -> Goal {
        Goal::from_value(&value).unwrap()
    }

    #[test]
    fn find_places_the_item_on_the_last_tile() {
        let config = Config::new();
        let ctx = Context::new(&config);
        let world = WorldSmt::new(&ctx, 3, 3);
        let find = goal(json!([
            {"name": "find", "specs": [[
                [{"color": "red", "neg": 0}], [{"name": "strawberry", "neg": 0}]
            ]]}
        ]));
        let visited = vec![3, 4, 5];
        let goal_smt = GoalSmt::new(&world, &find, &visited);

        let solver = SmtSolver::new(&ctx);
        solver.assert(&world.base_properties(false));
        solver.assert(&goal_smt.properties());

        let model = solver.solve().unwrap();
        let decoded = world.decode(&model);
        let found = decoded.item(5).expect("item on the last visited tile");
        assert_eq!(found.name, ItemName::Strawberry);
        assert_eq!(found.colour, ItemColour::Red);
        let occurrences = (0..9)
            .filter(|i| {
                decoded
                    .item(*i)
                    .is_some_and(|item| item.name == ItemName::Strawberry)
            })
            .count();
        assert_eq!(occurrences, 1);
    }

    #[test]
    fn forbid_keeps_the_trace_clean_and_plants_a_distractor() {
        let config = Config::new();
        let ctx = Context::new(&config);
        let world = WorldSmt::new(&ctx, 3, 3);
        let with_forbid = goal(json!([
            {"name": "find", "specs": [[[{"name": "circle", "neg": 0}]]]},
            {"name": "forbid", "specs": [[[{"name": "triangle", "neg": 0}]]]}
        ]));
        // detour: down the left edge then across the bottom
        let visited = vec![0, 3, 6, 7, 8];
        let goal_smt = GoalSmt::new(&world, &with_forbid, &visited);

        let solver = SmtSolver::new(&ctx);
        solver.assert(&world.base_properties(false));
        solver.assert(&goal_smt.properties());

        let model = solver.solve().unwrap();
        let decoded = world.decode(&model);
        for i in &visited {
            assert!(decoded
                .item(*i)
                .map_or(true, |item| item.name != ItemName::Triangle));
        }
        let triangles = (0..9)
            .filter(|i| {
                decoded
                    .item(*i)
                    .is_some_and(|item| item.name == ItemName::Triangle)
            })
            .count();
        assert!(triangles >= 1);
    }

    #[test]
    fn sum_totals_match_on_the_trace() {
        let config = Config::new();
        let ctx = Context::new(&config);
        let world = WorldSmt::new(&ctx, 3, 3);
        let sum = goal(json!([
            {"name": "sum", "specs": [[[{"name": "strawberry", "neg": 0}]]], "total_cnt": 4}
        ]));
        let visited = vec![0, 1, 2, 5];
        let goal_smt = GoalSmt::new(&world, &sum, &visited);

        let solver = SmtSolver::new(&ctx);
        solver.assert(&world.base_properties(false));
        solver.assert(&goal_smt.properties());

        let model = solver.solve().unwrap();
        let decoded = world.decode(&model);
        let on_trace: u32 = visited
            .iter()
            .filter_map(|i| decoded.item(*i))
            .map(|item| item.count as u32)
            .sum();
        assert_eq!(on_trace, 4);
        let everywhere: u32 = (0..9)
            .filter_map(|i| decoded.item(i))
            .map(|item| item.count as u32)
            .sum();
        assert!(everywhere > 4);
    }

    #[test]
    fn findonly_bans_everything_else() {
        let config = Config::new();
        let ctx = Context::new(&config);
        let world = WorldSmt::new(&ctx, 3, 3);
        let findonly = goal(json!([
            {"name": "findonly", "specs": [[[{"name": "lemon", "neg": 0}]]]}
        ]));
        let visited = vec![3, 4, 5];
        let goal_smt = GoalSmt::new(&world, &findonly, &visited);

        let solver = SmtSolver::new(&ctx);
        solver.assert(&world.base_properties(false));
        solver.assert(&goal_smt.properties());

        let model = solver.solve().unwrap();
        let decoded = world.decode(&model);
        assert_eq!(
            decoded.item(5).map(|item| item.name),
            Some(ItemName::Lemon)
        );
        // nothing on the trace except the lemon at its end
        for i in [3, 4] {
            assert!(decoded.item(i).is_none());
        }
    }

    #[test]
    fn concat_orders_the_items_along_the_trace() {
        let config = Config::new();
        let ctx = Context::new(&config);
        let world = WorldSmt::new(&ctx, 3, 3);
        let concat = goal(json!([
            {"name": "concat", "specs": [
                [[{"name": "A", "neg": 0}]],
                [[{"name": "B", "neg": 0}]]
            ]}
        ]));
        let visited = vec![0, 1, 2];
        let goal_smt = GoalSmt::new(&world, &concat, &visited);

        let solver = SmtSolver::new(&ctx);
        solver.assert(&world.base_properties(false));
        solver.assert(&goal_smt.properties());

        let model = solver.solve().unwrap();
        let decoded = world.decode(&model);
        let position_of = |name: ItemName| {
            visited
                .iter()
                .position(|i| decoded.item(*i).is_some_and(|item| item.name == name))
        };
        let a = position_of(ItemName::Char('A')).expect("A is on the trace");
        let b = position_of(ItemName::Char('B')).expect("B is on the trace");
        assert!(a < b);
        assert_eq!(b, 2);
    }

    #[test]
    fn draw_kills_off_trace_tiles() {
        let config = Config::new();
        let ctx = Context::new(&config);
        let world = WorldSmt::new(&ctx, 3, 3);
        let draw = goal(json!([
            {"name": "draw", "specs": [[
                [{"x1": 0, "y1": 0, "x2": 1, "y2": 0, "color": "#000000", "neg": 0}]
            ]]}
        ]));
        let visited = vec![0, 1, 4];
        let goal_smt = GoalSmt::new(&world, &draw, &visited);

        let solver = SmtSolver::new(&ctx);
        solver.assert(&world.base_properties(false));
        solver.assert(&world.marker_world_properties());
        solver.assert(&goal_smt.properties());

        let model = solver.solve().unwrap();
        let decoded = world.decode(&model);
        for i in [2, 3, 5, 6, 7, 8] {
            assert!(!decoded.tile(i).exist);
        }
        use crate::domain::grid::Side;
        assert!(decoded.marker(0).get(Side::Right).is_some());
        assert!(decoded.marker(1).get(Side::Bottom).is_some());
    }
}
