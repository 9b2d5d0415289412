//! Goal mutation: every literal of the reference goal becomes a typed
//! variable over its attribute family, occurrences of the same source
//! value share one variable, distinct source values stay distinct, and
//! attribute palettes keep the mutants plausible. Read-back simplifies
//! each spec through DNF and drops clauses no single item can satisfy.

use crate::domain::{
    Cnf, Goal, ItemColour, ItemName, Literal, LiteralAtom, Objective, ObjectiveKind, Spec,
};
use crate::mutation::GoalBudget;
use crate::smt::boolean::{cnf_to_dnf, dnf_to_cnf};
use crate::smt::solver::{and_all, eval_enum, eval_int, or_all, timed_context, EnumSort, SmtSolver};
use crate::smt::{GoalSmt, WorldSmt};
use std::collections::BTreeMap;
use std::str::FromStr;
use tracing::{debug, info};
use z3::ast::{Ast, Bool, Dynamic, Int};
use z3::{Config, Context, Model};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum AttrClass {
    Fruit,
    Shape,
    Char,
    Colour,
    Count,
}

impl AttrClass {
    fn of_literal(literal: &Literal) -> Option<(AttrClass, String)> {
        match &literal.atom {
            LiteralAtom::Name(name) => {
                let class = match name.class() {
                    crate::domain::ItemClass::Fruit => AttrClass::Fruit,
                    crate::domain::ItemClass::Shape => AttrClass::Shape,
                    crate::domain::ItemClass::Char => AttrClass::Char,
                };
                Some((class, name.to_string()))
            }
            LiteralAtom::Colour(colour) => Some((AttrClass::Colour, colour.to_string())),
            LiteralAtom::Count(count) => Some((AttrClass::Count, count.to_string())),
            LiteralAtom::Noname | LiteralAtom::Line(_) => None,
        }
    }

    fn absent(&self) -> &'static str {
        match self {
            AttrClass::Colour => "nocolor",
            AttrClass::Count => "_0",
            _ => "noname",
        }
    }
}

#[derive(Debug)]
struct GoalSorts<'ctx> {
    fruit: EnumSort<'ctx>,
    shape: EnumSort<'ctx>,
    chars: EnumSort<'ctx>,
    colour: EnumSort<'ctx>,
    count: EnumSort<'ctx>,
}

const CHAR_VARIANTS: [&str; 27] = [
    "A", "B", "C", "D", "E", "F", "G", "H", "I", "J", "K", "L", "M", "N", "O", "P", "Q", "R",
    "S", "T", "U", "V", "W", "X", "Y", "Z", "noname",
];

impl<'ctx> GoalSorts<'ctx> {
    fn new(ctx: &'ctx Context) -> Self {
        Self {
            fruit: EnumSort::new(ctx, "Fruit", &["strawberry", "lemon", "noname"]),
            shape: EnumSort::new(
                ctx,
                "Shape",
                &["triangle", "rectangle", "cross", "circle", "noname"],
            ),
            chars: EnumSort::new(ctx, "Char", &CHAR_VARIANTS),
            colour: EnumSort::new(
                ctx,
                "Color",
                &[
                    "red", "blue", "green", "black", "yellow", "orange", "pink", "purple",
                    "nocolor",
                ],
            ),
            count: EnumSort::new(ctx, "Count", &["_0", "_1", "_2", "_3", "_4"]),
        }
    }

    fn of(&self, class: AttrClass) -> &EnumSort<'ctx> {
        match class {
            AttrClass::Fruit => &self.fruit,
            AttrClass::Shape => &self.shape,
            AttrClass::Char => &self.chars,
            AttrClass::Colour => &self.colour,
            AttrClass::Count => &self.count,
        }
    }
}

/// One literal position in the goal tree: either a shared typed variable
/// or a literal the mutator passes through untouched.
#[derive(Debug, Clone)]
enum LitSlot {
    Var {
        key: String,
        class: AttrClass,
        neg: bool,
    },
    Fixed(Literal),
}

#[derive(Debug, Clone)]
struct ObjectiveTree {
    kind: ObjectiveKind,
    specs: Vec<Vec<Vec<LitSlot>>>,
}

#[derive(Debug, Clone)]
pub struct GoalMutator {
    reference: Goal,
}

impl GoalMutator {
    pub fn new(reference: Goal) -> Self {
        Self { reference }
    }

    /// Enumerate up to `n_max` goal mutants; under `same_goal` (and for
    /// drawing goals) the reference is returned unchanged.
    pub fn generate(&self, budget: &GoalBudget, n_max: usize) -> Vec<Goal> {
        if budget.same_goal || self.reference.is_draw() {
            return vec![self.reference.clone()];
        }

        let ctx = timed_context();
        let sorts = GoalSorts::new(&ctx);

        let mut vars: BTreeMap<String, (Dynamic, AttrClass)> = BTreeMap::new();
        let tree = self.build_tree(&ctx, &sorts, &mut vars);

        let sum_total = self
            .reference
            .of_kind(ObjectiveKind::Sum)
            .next()
            .and_then(|objective| objective.total_cnt)
            .map(|reference| {
                let var = Int::new_const(&ctx, "sum_total_0");
                (var, reference as i64)
            });

        let solver = SmtSolver::new(&ctx);
        solver.assert(&self.palette_properties(&ctx, &sorts, &vars, &tree));
        solver.assert(&self.non_empty_clause_properties(&ctx, &sorts, &vars, &tree));
        solver.assert(&self.symmetry_properties(&ctx, &vars));
        if let Some((var, reference)) = &sum_total {
            solver.assert(&var.ge(&Int::from_i64(&ctx, reference - budget.max_count_dec)));
            solver.assert(&var.le(&Int::from_i64(&ctx, reference + budget.max_count_inc)));
        }

        let mut blockable: Vec<Dynamic> = vars.values().map(|(var, _)| var.clone()).collect();
        if let Some((var, _)) = &sum_total {
            blockable.push(Dynamic::from_ast(var));
        }

        let mut seen = std::collections::BTreeSet::new();
        let mut mutants = vec![];
        while mutants.len() < n_max {
            let Some(model) = solver.solve() else {
                debug!("goal mutation space exhausted");
                break;
            };
            if let Some(goal) = self.decode(&model, &sorts, &vars, &tree, &sum_total) {
                if is_plausible(&goal) && seen.insert(goal.to_value().to_string()) {
                    mutants.push(goal);
                }
            }
            solver.block_model(&model, &blockable);
        }
        info!(count = mutants.len(), "synthesised goal mutants");
        mutants
    }

    fn build_tree<'ctx>(
        &self,
        ctx: &'ctx Context,
        sorts: &GoalSorts<'ctx>,
        vars: &mut BTreeMap<String, (Dynamic<'ctx>, AttrClass)>,
    ) -> Vec<ObjectiveTree> {
        self.reference
            .objectives
            .iter()
            .map(|objective| ObjectiveTree {
                kind: objective.kind,
                specs: objective
                    .specs
                    .iter()
                    .map(|spec| {
                        spec.cnf
                            .iter()
                            .map(|clause| {
                                clause
                                    .iter()
                                    .map(|literal| {
                                        let Some((class, source)) =
                                            AttrClass::of_literal(literal)
                                        else {
                                            return LitSlot::Fixed(*literal);
                                        };
                                        let key = format!(
                                            "{}_{}_{}",
                                            objective.kind,
                                            class_tag(class),
                                            source
                                        );
                                        vars.entry(key.clone()).or_insert_with(|| {
                                            (sorts.of(class).fresh_const(ctx, &key), class)
                                        });
                                        LitSlot::Var {
                                            key,
                                            class,
                                            neg: literal.neg,
                                        }
                                    })
                                    .collect()
                            })
                            .collect()
                    })
                    .collect(),
            })
            .collect()
    }

    /// Shape and fruit literals drag their colours along: a clause mixing
    /// a shape with a colour restricts the colour to the shape palette,
    /// fruits force their natural colour.
    fn palette_properties<'ctx>(
        &self,
        ctx: &'ctx Context,
        sorts: &GoalSorts<'ctx>,
        vars: &BTreeMap<String, (Dynamic<'ctx>, AttrClass)>,
        tree: &[ObjectiveTree],
    ) -> Bool<'ctx> {
        let mut constraints = vec![];
        for objective in tree {
            for spec in &objective.specs {
                for term in cartesian_terms(spec) {
                    let find = |class: AttrClass| {
                        term.iter().find_map(|slot| match slot {
                            LitSlot::Var { key, class: c, .. } if *c == class => {
                                Some(&vars[key].0)
                            }
                            _ => None,
                        })
                    };
                    if let (Some(shape), Some(colour)) =
                        (find(AttrClass::Shape), find(AttrClass::Colour))
                    {
                        let narrow_shape: Vec<Bool> = ["triangle", "rectangle", "cross"]
                            .iter()
                            .map(|name| shape._eq(sorts.shape.value(name)))
                            .collect();
                        let primary: Vec<Bool> = ["blue", "red", "green"]
                            .iter()
                            .map(|name| colour._eq(sorts.colour.value(name)))
                            .collect();
                        constraints.push(
                            or_all(ctx, &narrow_shape).implies(&or_all(ctx, &primary)),
                        );
                    }
                    if let (Some(fruit), Some(colour)) =
                        (find(AttrClass::Fruit), find(AttrClass::Colour))
                    {
                        constraints.push(
                            fruit
                                ._eq(sorts.fruit.value("lemon"))
                                .implies(&colour._eq(sorts.colour.value("yellow"))),
                        );
                        constraints.push(
                            fruit
                                ._eq(sorts.fruit.value("strawberry"))
                                .implies(&colour._eq(sorts.colour.value("red"))),
                        );
                    }
                }
            }
        }
        and_all(ctx, &constraints)
    }

    /// A clause may not collapse entirely into absent values.
    fn non_empty_clause_properties<'ctx>(
        &self,
        ctx: &'ctx Context,
        sorts: &GoalSorts<'ctx>,
        vars: &BTreeMap<String, (Dynamic<'ctx>, AttrClass)>,
        tree: &[ObjectiveTree],
    ) -> Bool<'ctx> {
        let mut constraints = vec![];
        for objective in tree {
            for spec in &objective.specs {
                for clause in spec {
                    let absent: Vec<Bool> = clause
                        .iter()
                        .filter_map(|slot| match slot {
                            LitSlot::Var { key, class, .. } => Some(
                                vars[key]
                                    .0
                                    ._eq(sorts.of(*class).value(class.absent())),
                            ),
                            LitSlot::Fixed(_) => None,
                        })
                        .collect();
                    if !absent.is_empty() {
                        constraints.push(and_all(ctx, &absent).not());
                    }
                }
            }
        }
        and_all(ctx, &constraints)
    }

    /// Attribute symmetry: variables born from the same source value stay
    /// equal, variables born from distinct source values stay distinct.
    fn symmetry_properties<'ctx>(
        &self,
        ctx: &'ctx Context,
        vars: &BTreeMap<String, (Dynamic<'ctx>, AttrClass)>,
    ) -> Bool<'ctx> {
        let mut constraints = vec![];
        for class in [
            AttrClass::Fruit,
            AttrClass::Shape,
            AttrClass::Char,
            AttrClass::Colour,
        ] {
            let mut by_source: BTreeMap<&str, Vec<&Dynamic>> = BTreeMap::new();
            for (key, (var, c)) in vars {
                if *c == class {
                    let source = key.rsplit('_').next().expect("key has a source suffix");
                    by_source.entry(source).or_default().push(var);
                }
            }
            for group in by_source.values() {
                for pair in group.windows(2) {
                    constraints.push(pair[0]._eq(pair[1]));
                }
            }
            let representatives: Vec<&&Dynamic> =
                by_source.values().filter_map(|group| group.first()).collect();
            for i in 0..representatives.len() {
                for j in i + 1..representatives.len() {
                    constraints.push(representatives[i]._eq(representatives[j]).not());
                }
            }
        }
        and_all(ctx, &constraints)
    }

    fn decode<'ctx>(
        &self,
        model: &Model<'ctx>,
        sorts: &GoalSorts<'ctx>,
        vars: &BTreeMap<String, (Dynamic<'ctx>, AttrClass)>,
        tree: &[ObjectiveTree],
        sum_total: &Option<(Int<'ctx>, i64)>,
    ) -> Option<Goal> {
        let mut objectives = vec![];
        for objective in tree {
            let mut specs = vec![];
            for spec in &objective.specs {
                let cnf: Cnf = spec
                    .iter()
                    .map(|clause| {
                        clause
                            .iter()
                            .filter_map(|slot| self.decode_literal(model, sorts, vars, slot))
                            .collect()
                    })
                    .filter(|clause: &Vec<Literal>| !clause.is_empty())
                    .collect();

                let dnf = cnf_to_dnf(&cnf);
                let satisfiable: Vec<Vec<Literal>> = dnf
                    .into_iter()
                    .filter(|term| single_item_satisfiable(term))
                    .collect();
                if !satisfiable.is_empty() {
                    specs.push(Spec::new(dnf_to_cnf(&satisfiable)));
                }
            }
            let total_cnt = match objective.kind {
                ObjectiveKind::Sum => sum_total
                    .as_ref()
                    .map(|(var, _)| eval_int(model, var) as u32),
                _ => None,
            };
            objectives.push(Objective::new(objective.kind, specs, total_cnt).ok()?);
        }
        Some(Goal::new(objectives))
    }

    fn decode_literal<'ctx>(
        &self,
        model: &Model<'ctx>,
        sorts: &GoalSorts<'ctx>,
        vars: &BTreeMap<String, (Dynamic<'ctx>, AttrClass)>,
        slot: &LitSlot,
    ) -> Option<Literal> {
        match slot {
            LitSlot::Fixed(literal) => Some(*literal),
            LitSlot::Var { key, class, neg } => {
                let value = eval_enum(model, sorts.of(*class), &vars[key].0);
                if value == class.absent() {
                    return None;
                }
                let atom = match class {
                    AttrClass::Colour => {
                        LiteralAtom::Colour(ItemColour::from_str(value).ok()?)
                    }
                    AttrClass::Count => {
                        LiteralAtom::Count(value.trim_start_matches('_').parse().ok()?)
                    }
                    _ => LiteralAtom::Name(ItemName::from_str(value).ok()?),
                };
                Some(Literal { atom, neg: *neg })
            }
        }
    }
}

fn class_tag(class: AttrClass) -> &'static str {
    match class {
        AttrClass::Fruit => "fruit",
        AttrClass::Shape => "shape",
        AttrClass::Char => "char",
        AttrClass::Colour => "color",
        AttrClass::Count => "count",
    }
}

/// All ways of picking one literal slot per clause of a spec.
fn cartesian_terms(spec: &[Vec<LitSlot>]) -> Vec<Vec<LitSlot>> {
    let mut terms: Vec<Vec<LitSlot>> = vec![vec![]];
    for clause in spec {
        let mut next = vec![];
        for term in &terms {
            for slot in clause {
                let mut grown = term.clone();
                grown.push(slot.clone());
                next.push(grown);
            }
        }
        terms = next;
    }
    terms
}

/// Best-effort pruning of DNF terms: satisfiable by a single item on a
/// 1x1 grid. Combinations that only break in multi-tile contexts survive.
fn single_item_satisfiable(term: &[Literal]) -> bool {
    let config = Config::new();
    let ctx = Context::new(&config);
    let items = crate::smt::world::ItemSmt::new(&ctx, 1);
    let solver = SmtSolver::new(&ctx);
    solver.assert(&items.properties());
    for literal in term {
        solver.assert(&items.literal(literal, 0));
    }
    solver.is_sat()
}

/// Reject goals that cannot make a puzzle: forbid with nothing to find,
/// degenerate concats, and goals no minimal world satisfies.
fn is_plausible(goal: &Goal) -> bool {
    if goal.is_empty() {
        return false;
    }
    if goal
        .objectives
        .iter()
        .all(|objective| objective.kind == ObjectiveKind::Forbid)
    {
        return false;
    }
    for objective in goal.of_kind(ObjectiveKind::Concat) {
        if objective.specs.len() < 2 {
            return false;
        }
    }

    let wide_trace = goal.has_kind(ObjectiveKind::Concat)
        || goal.has_kind(ObjectiveKind::Sum)
        || goal.has_kind(ObjectiveKind::CollectAll);
    let visited: Vec<usize> = if wide_trace {
        (0..6).collect()
    } else {
        vec![0, 1]
    };

    let config = Config::new();
    let ctx = Context::new(&config);
    let world = WorldSmt::new(&ctx, 3, 3);
    let goal_smt = GoalSmt::new(&world, goal, &visited);
    let solver = SmtSolver::new(&ctx);
    solver.assert(&world.items.properties());
    solver.assert(&goal_smt.properties());
    solver.is_sat()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn goal(value: serde_json::Value) -> Goal {
        Goal::from_value(&value).unwrap()
    }

    fn budget() -> GoalBudget {
        crate::mutation::Difficulty::Hard.goal_budget()
    }

    #[test]
    fn same_goal_budget_returns_the_reference() {
        let reference = goal(json!([
            {"name": "find", "specs": [[[{"name": "circle", "neg": 0}]]]}
        ]));
        let easy = crate::mutation::Difficulty::Easy.goal_budget();
        let mutants = GoalMutator::new(reference.clone()).generate(&easy, 10);
        assert_eq!(mutants, vec![reference]);
    }

    #[test]
    fn find_goal_mutates_within_the_palette() {
        let reference = goal(json!([
            {"name": "find", "specs": [[
                [{"name": "triangle", "neg": 0}],
                [{"color": "red", "neg": 0}]
            ]]}
        ]));
        let mutants = GoalMutator::new(reference).generate(&budget(), 12);
        assert!(!mutants.is_empty());
        for mutant in &mutants {
            for objective in &mutant.objectives {
                assert_eq!(objective.kind, ObjectiveKind::Find);
                for spec in &objective.specs {
                    let literals: Vec<&Literal> = spec.cnf.iter().flatten().collect();
                    let narrow_shape = literals.iter().any(|literal| {
                        matches!(
                            literal.atom,
                            LiteralAtom::Name(ItemName::Triangle)
                                | LiteralAtom::Name(ItemName::Rectangle)
                                | LiteralAtom::Name(ItemName::Cross)
                        )
                    });
                    for literal in &literals {
                        if let LiteralAtom::Colour(colour) = literal.atom {
                            if narrow_shape {
                                // narrow shapes stay on the primary palette
                                assert!(matches!(
                                    colour,
                                    ItemColour::Red | ItemColour::Green | ItemColour::Blue
                                ));
                            }
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn sum_totals_stay_in_budget() {
        let reference = goal(json!([
            {"name": "sum", "specs": [[[{"name": "strawberry", "neg": 0}]]], "total_cnt": 6}
        ]));
        let mutants = GoalMutator::new(reference).generate(&budget(), 16);
        assert!(!mutants.is_empty());
        for mutant in &mutants {
            let total = mutant.objectives[0].total_cnt.unwrap();
            // hard budget: dec -1 forces growth, inc 5 caps it
            assert!((7..=11).contains(&total));
        }
    }

    #[test]
    fn forbid_only_mutants_are_rejected() {
        let reference = goal(json!([
            {"name": "forbid", "specs": [[[{"name": "triangle", "neg": 0}]]]}
        ]));
        let mutants = GoalMutator::new(reference).generate(&budget(), 8);
        assert!(mutants.is_empty());
    }

    #[test]
    fn shared_source_values_mutate_in_lockstep() {
        // "red" appears in both objectives; mutants keep them identical
        let reference = goal(json!([
            {"name": "find", "specs": [[
                [{"name": "circle", "neg": 0}], [{"color": "red", "neg": 0}]
            ]]},
            {"name": "forbid", "specs": [[
                [{"name": "triangle", "neg": 0}], [{"color": "red", "neg": 0}]
            ]]}
        ]));
        let mutants = GoalMutator::new(reference).generate(&budget(), 10);
        for mutant in &mutants {
            let colour_of = |kind: ObjectiveKind| {
                mutant
                    .of_kind(kind)
                    .next()
                    .and_then(|objective| {
                        objective.specs[0].cnf.iter().flatten().find_map(|literal| {
                            match literal.atom {
                                LiteralAtom::Colour(colour) => Some(colour),
                                _ => None,
                            }
                        })
                    })
            };
            if let (Some(find), Some(forbid)) = (
                colour_of(ObjectiveKind::Find),
                colour_of(ObjectiveKind::Forbid),
            ) {
                assert_eq!(find, forbid);
            }
        }
    }
}
