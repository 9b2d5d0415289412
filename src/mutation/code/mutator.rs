//! Enumeration of `(program, constraint)` mutants: pad the reference into
//! slots, encode program and constraint, couple them, then walk the
//! models with the blocker loop and deduplicate on read-back.

use crate::domain::{BlockKind, CodeConstraints, Program};
use crate::mutation::code::cons::ConstraintVars;
use crate::mutation::code::encode::{
    self, collect_vars, decode_program, kind_count, program_properties, total_count, CodeSorts,
    EncodedSlot,
};
use crate::mutation::code::slots;
use crate::mutation::CodeBudget;
use crate::smt::solver::{and_all, or_all, timed_context, SmtSolver};
use rand::rngs::StdRng;
use std::collections::BTreeSet;
use tracing::{debug, info};
use z3::ast::{Ast, Bool, Dynamic, Int};
use z3::Context;

#[derive(Debug, Clone)]
pub struct ProgramMutator {
    reference: Program,
    reference_constraints: CodeConstraints,
}

impl ProgramMutator {
    pub fn new(reference: Program, reference_constraints: CodeConstraints) -> Self {
        Self {
            reference,
            reference_constraints,
        }
    }

    /// Enumerate up to `n_max` distinct mutants for a `rows x cols` world.
    pub fn generate(
        &self,
        budget: &CodeBudget,
        rows: usize,
        cols: usize,
        n_max: usize,
        rng: &mut StdRng,
    ) -> Vec<(Program, CodeConstraints)> {
        let has_repeat = self
            .reference
            .block_count()
            .contains_key(&BlockKind::Repeat);
        let prob_repeat = if has_repeat {
            0.0
        } else {
            budget.prob_insert_repeat
        };
        let padded = slots::pad(
            slots::skeleton(&self.reference.run, ""),
            "",
            budget,
            prob_repeat,
            rng,
        );

        let ctx = timed_context();
        let sorts = CodeSorts::new(&ctx);
        let body = encode::encode(&ctx, &sorts, &padded);
        let cons = ConstraintVars::new(&ctx, &sorts, &self.reference_constraints);

        let solver = SmtSolver::new(&ctx);
        solver.assert(&program_properties(
            &ctx,
            &sorts,
            &body,
            &self.reference,
            rows,
            cols,
            budget,
        ));
        solver.assert(&cons.properties(&sorts, budget));
        solver.assert(&couple_exact_counts(&ctx, &sorts, &body, &cons.exactly));
        solver.assert(&couple_exact_counts(&ctx, &sorts, &body, &cons.at_most));
        solver.assert(&couple_prefix(&ctx, &sorts, &body, &cons));

        let mut vars: Vec<Dynamic> = collect_vars(&body);
        vars.extend(cons.vars());

        let mut seen = BTreeSet::new();
        let mut mutants = vec![];
        while mutants.len() < n_max {
            let Some(model) = solver.solve() else {
                debug!("mutation space exhausted");
                break;
            };
            let program = decode_program(&model, &sorts, &body);
            let constraints = cons.decode(&model, &sorts);
            let key = serde_json::json!({
                "code": program.to_value(),
                "cons": constraints.to_value(),
            })
            .to_string();
            if seen.insert(key) {
                mutants.push((program, constraints));
            }
            solver.block_model(&model, &vars);
        }
        info!(count = mutants.len(), "synthesised program mutants");
        mutants
    }
}

/// For each non-empty, non-`all` name of a counted part, the program's
/// count of that block equals the slot's count; `all` couples the total.
/// The `at_most` part couples by equality as well: its reference reading
/// is "use exactly this many while allowing no more".
fn couple_exact_counts<'ctx>(
    ctx: &'ctx Context,
    sorts: &CodeSorts<'ctx>,
    body: &[EncodedSlot<'ctx>],
    part: &crate::mutation::code::cons::CountedPart<'ctx>,
) -> Bool<'ctx> {
    let noblock = sorts.block.value("noblock");
    let allblocks = sorts.block.value("allblocks");
    let mut constraints = vec![];
    for (name, count) in part.names.iter().zip(&part.counts) {
        constraints.push(
            and_all(ctx, &[name._eq(noblock).not(), name._eq(allblocks).not()])
                .implies(&kind_count(ctx, body, name)._eq(count)),
        );
        constraints.push(
            name._eq(allblocks)
                .implies(&total_count(ctx, sorts, body)._eq(count)),
        );
    }
    and_all(ctx, &constraints)
}

/// The k-th effective entry of the prefix matches the k-th effective
/// top-level block, and the prefix is strictly shorter than the program's
/// top level.
fn couple_prefix<'ctx>(
    ctx: &'ctx Context,
    sorts: &CodeSorts<'ctx>,
    body: &[EncodedSlot<'ctx>],
    cons: &ConstraintVars<'ctx>,
) -> Bool<'ctx> {
    let noblock = sorts.block.value("noblock");
    let start = &cons.start_by.names;
    let effective_before = |vars: &[Dynamic<'ctx>], end: usize| -> Int<'ctx> {
        let effective: Vec<Bool> = vars[..end]
            .iter()
            .map(|var| var._eq(noblock).not())
            .collect();
        crate::smt::solver::count_true(ctx, &effective)
    };

    let top_blocks: Vec<Dynamic> = body.iter().map(|slot| slot.block.clone()).collect();
    let mut constraints = vec![];

    let prefix_size = effective_before(start, start.len());
    let program_size = effective_before(&top_blocks, top_blocks.len());
    constraints.push(prefix_size.lt(&program_size));

    for (i, entry) in start.iter().enumerate() {
        let entry_position = effective_before(start, i);
        let matches: Vec<Bool> = top_blocks
            .iter()
            .enumerate()
            .map(|(j, block)| {
                and_all(
                    ctx,
                    &[
                        effective_before(&top_blocks, j)._eq(&entry_position),
                        block._eq(entry),
                    ],
                )
            })
            .collect();
        constraints.push(
            entry
                ._eq(noblock)
                .not()
                .implies(&or_all(ctx, &matches)),
        );
    }
    and_all(ctx, &constraints)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ConstraintKey;
    use crate::mutation::Difficulty;
    use rand::SeedableRng;
    use serde_json::json;

    fn mutator(code: serde_json::Value, cons: serde_json::Value) -> ProgramMutator {
        ProgramMutator::new(
            Program::from_value(&code).unwrap(),
            CodeConstraints::from_value(&cons).unwrap(),
        )
    }

    fn forbidden_windows(kinds: &[BlockKind]) -> bool {
        let as_str: Vec<&str> = kinds
            .iter()
            .map(|kind| match kind {
                BlockKind::Fd => "fd",
                BlockKind::Bk => "bk",
                BlockKind::Lt => "lt",
                BlockKind::Rt => "rt",
                _ => "other",
            })
            .collect();
        as_str.windows(2).any(|w| {
            matches!(w, ["lt", "rt"] | ["rt", "lt"])
        }) || as_str
            .windows(3)
            .any(|w| matches!(w, ["lt", "lt", "lt"] | ["rt", "rt", "rt"]))
    }

    #[test]
    fn easy_budget_keeps_the_block_count() {
        let mutator = mutator(
            json!({"run": [{"type": "fd"}, {"type": "fd"}]}),
            json!({"exactly": {"fd": 2, "all": 2}}),
        );
        let mut rng = StdRng::seed_from_u64(7);
        let mutants = mutator.generate(&Difficulty::Easy.code_budget(), 3, 3, 8, &mut rng);

        assert!(!mutants.is_empty());
        for (program, constraints) in &mutants {
            assert_eq!(program.total_blocks(), 2);
            // closure: every mutant satisfies its own constraint
            assert!(constraints.is_satisfied_by(program));
        }
    }

    #[test]
    fn mutants_never_contain_forbidden_turn_patterns() {
        // a double-left reference must never grow a triple turn, whatever
        // the padding width
        let mutator = mutator(
            json!({"run": [{"type": "lt"}, {"type": "lt"}, {"type": "fd"}]}),
            json!({}),
        );
        let mut rng = StdRng::seed_from_u64(1);
        let mutants = mutator.generate(&Difficulty::Medium.code_budget(), 3, 3, 24, &mut rng);

        for (program, _) in &mutants {
            let kinds = program.top_level_kinds();
            assert!(!forbidden_windows(&kinds), "bad mutant: {program}");
        }
    }

    #[test]
    fn medium_budget_grows_the_program() {
        let mutator = mutator(
            json!({"run": [{"type": "fd"}, {"type": "fd"}]}),
            json!({}),
        );
        let mut rng = StdRng::seed_from_u64(3);
        let mutants = mutator.generate(&Difficulty::Medium.code_budget(), 4, 4, 12, &mut rng);

        for (program, _) in &mutants {
            // medium: dec = -1, inc = 2, so 3..=4 blocks
            assert!(program.total_blocks() >= 3);
            assert!(program.total_blocks() <= 4);
        }
    }

    #[test]
    fn twin_repeats_stay_twins() {
        let mutator = mutator(
            json!({"run": [
                {"type": "repeat", "times": 2, "body": [{"type": "fd"}, {"type": "rt"}]},
                {"type": "fd"},
                {"type": "repeat", "times": 2, "body": [{"type": "fd"}, {"type": "rt"}]}
            ]}),
            json!({}),
        );
        let mut rng = StdRng::seed_from_u64(11);
        let mutants = mutator.generate(&Difficulty::Medium.code_budget(), 3, 3, 10, &mut rng);

        for (program, _) in &mutants {
            let repeats: Vec<&Vec<crate::domain::Block>> = program
                .run
                .iter()
                .filter_map(|block| match block {
                    crate::domain::Block::Repeat { body, .. } => Some(body),
                    _ => None,
                })
                .collect();
            if repeats.len() == 2 {
                assert_eq!(repeats[0], repeats[1], "twin bodies diverged: {program}");
            }
        }
    }

    #[test]
    fn last_effective_block_is_never_a_turn() {
        let mutator = mutator(
            json!({"run": [{"type": "fd"}, {"type": "rt"}, {"type": "fd"}]}),
            json!({}),
        );
        let mut rng = StdRng::seed_from_u64(5);
        let mutants = mutator.generate(&Difficulty::Medium.code_budget(), 3, 3, 16, &mut rng);

        for (program, _) in &mutants {
            let last = program.run.last().unwrap().kind();
            assert!(!last.is_turn(), "mutant ends on a turn: {program}");
        }
    }

    #[test]
    fn start_by_prefix_matches_every_mutant() {
        let mutator = mutator(
            json!({"run": [{"type": "fd"}, {"type": "rt"}, {"type": "fd"}]}),
            json!({"start_by": ["fd"]}),
        );
        let mut rng = StdRng::seed_from_u64(9);
        let mutants = mutator.generate(&Difficulty::Easy.code_budget(), 3, 3, 6, &mut rng);

        assert!(!mutants.is_empty());
        for (program, constraints) in &mutants {
            if constraints.start_by.is_empty() {
                continue;
            }
            assert!(constraints.is_satisfied_by(program));
        }
    }

    #[test]
    fn exactly_counts_couple_to_the_program() {
        let mutator = mutator(
            json!({"run": [{"type": "fd"}, {"type": "fd"}, {"type": "rt"}, {"type": "fd"}]}),
            json!({"exactly": {"fd": 3}}),
        );
        let mut rng = StdRng::seed_from_u64(2);
        let mutants = mutator.generate(&Difficulty::Easy.code_budget(), 3, 3, 10, &mut rng);

        for (program, constraints) in &mutants {
            if let Some(count) = constraints.exactly.get(&ConstraintKey::Fd) {
                assert_eq!(
                    program.block_count().get(&BlockKind::Fd).copied().unwrap_or(0),
                    *count
                );
            }
        }
    }
}
