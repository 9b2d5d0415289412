//! The solver encoding of a mutated code-shape constraint: slot vectors
//! for the exact counts, the upper bounds and the prefix, each one slot
//! longer than the reference, plus the structural rules and the size
//! budget.

use crate::domain::{BlockKind, CodeConstraints, ConstraintKey};
use crate::mutation::code::encode::CodeSorts;
use crate::mutation::CodeBudget;
use crate::smt::solver::{and_all, count_true, eval_enum, eval_int, or_all, sum};
use std::str::FromStr;
use z3::ast::{Ast, Bool, Dynamic, Int};
use z3::{Context, Model};

const COUNT_MAX: i64 = 15;
const COUNT_MIN_ALL: i64 = 2;
const NAMED_COUNT_MAX: i64 = 4;

/// One of the two counted parts (`exactly` or `at_most`).
#[derive(Debug)]
pub struct CountedPart<'ctx> {
    ctx: &'ctx Context,
    reference: Vec<(ConstraintKey, u32)>,
    pub names: Vec<Dynamic<'ctx>>,
    pub counts: Vec<Int<'ctx>>,
}

impl<'ctx> CountedPart<'ctx> {
    fn new(
        ctx: &'ctx Context,
        sorts: &CodeSorts<'ctx>,
        tag: &'static str,
        reference: &std::collections::BTreeMap<ConstraintKey, u32>,
    ) -> Self {
        let slots = reference.len() + 1;
        Self {
            ctx,
            reference: reference.iter().map(|(k, v)| (*k, *v)).collect(),
            names: (0..slots)
                .map(|i| sorts.block.fresh_const(ctx, &format!("{tag}_name__{i}")))
                .collect(),
            counts: (0..slots)
                .map(|i| Int::new_const(ctx, format!("{tag}_cnt__{i}")))
                .collect(),
        }
    }

    fn ref_len(&self) -> usize {
        self.reference.len()
    }

    fn size(&self, sorts: &CodeSorts<'ctx>) -> Int<'ctx> {
        let effective: Vec<Bool> = self
            .names
            .iter()
            .map(|name| name._eq(sorts.block.value("noblock")).not())
            .collect();
        count_true(self.ctx, &effective)
    }

    fn properties(&self, sorts: &CodeSorts<'ctx>, at_most_part: bool) -> Bool<'ctx> {
        let ctx = self.ctx;
        let noblock = sorts.block.value("noblock");
        let allblocks = sorts.block.value("allblocks");
        let mut constraints = vec![];

        // empty slots count nothing
        for (name, count) in self.names.iter().zip(&self.counts) {
            constraints.push(name._eq(noblock).implies(&count._eq(&Int::from_i64(ctx, 0))));
        }

        // at most two clauses in total
        let max_size = (self.ref_len() + 1).min(2) as i64;
        constraints.push(self.size(sorts).le(&Int::from_i64(ctx, max_size)));

        // per-name multiplicity caps; constraints never mention setpc or
        // repeat
        for (variant, cap) in [
            ("fd", 1),
            ("bk", 1),
            ("lt", 1),
            ("rt", 1),
            ("allblocks", 2),
            ("setpc", 0),
            ("repeat", 0),
        ] {
            let hits: Vec<Bool> = self
                .names
                .iter()
                .map(|name| name._eq(sorts.block.value(variant)))
                .collect();
            constraints.push(count_true(ctx, &hits).le(&Int::from_i64(ctx, cap)));
        }

        // count ranges
        for (name, count) in self.names.iter().zip(&self.counts) {
            constraints.push(count.ge(&Int::from_i64(ctx, 0)));
            constraints.push(count.le(&Int::from_i64(ctx, COUNT_MAX)));
            constraints.push(
                name._eq(allblocks)
                    .implies(&count.ge(&Int::from_i64(ctx, COUNT_MIN_ALL))),
            );
            let named: Vec<Bool> = ["fd", "bk", "lt", "rt"]
                .iter()
                .map(|variant| name._eq(sorts.block.value(variant)))
                .collect();
            constraints.push(
                or_all(ctx, &named).implies(&count.le(&Int::from_i64(ctx, NAMED_COUNT_MAX))),
            );
            if at_most_part {
                // "use at most zero" is spelled as an exact zero instead
                constraints.push(
                    name._eq(noblock)
                        .not()
                        .implies(&count.gt(&Int::from_i64(ctx, 0))),
                );
            }
        }

        // `all` survives exactly when the reference had it
        let has_all: Vec<Bool> = self
            .names
            .iter()
            .map(|name| name._eq(allblocks))
            .collect();
        if self.reference.iter().any(|(k, _)| *k == ConstraintKey::All) {
            constraints.push(or_all(ctx, &has_all));
        } else {
            constraints.push(or_all(ctx, &has_all).not());
        }

        constraints.push(self.using_just_preserved(sorts));
        and_all(ctx, &constraints)
    }

    /// The "using just these commands" pattern: when the reference's `all`
    /// count equals the sum of its named counts, the mutant keeps that sum
    /// equality.
    fn using_just_preserved(&self, sorts: &CodeSorts<'ctx>) -> Bool<'ctx> {
        let ctx = self.ctx;
        let Some(all_count) = self
            .reference
            .iter()
            .find(|(k, _)| *k == ConstraintKey::All)
            .map(|(_, v)| *v)
        else {
            return Bool::from_bool(ctx, true);
        };
        let named_sum: u32 = self
            .reference
            .iter()
            .filter(|(k, _)| *k != ConstraintKey::All)
            .map(|(_, v)| *v)
            .sum();
        if all_count != named_sum {
            return Bool::from_bool(ctx, true);
        }

        let allblocks = sorts.block.value("allblocks");
        let mut constraints = vec![];
        for (i, name) in self.names.iter().enumerate() {
            let others: Vec<Int> = self
                .counts
                .iter()
                .enumerate()
                .filter(|(j, _)| *j != i)
                .map(|(_, count)| count.clone())
                .collect();
            constraints.push(
                name._eq(allblocks)
                    .implies(&sum(ctx, &others)._eq(&self.counts[i])),
            );
        }
        and_all(ctx, &constraints)
    }

    fn decode(
        &self,
        model: &Model<'ctx>,
        sorts: &CodeSorts<'ctx>,
    ) -> std::collections::BTreeMap<ConstraintKey, u32> {
        let mut decoded = std::collections::BTreeMap::new();
        for (name, count) in self.names.iter().zip(&self.counts) {
            let variant = eval_enum(model, &sorts.block, name);
            let key = match variant {
                "noblock" => continue,
                "allblocks" => ConstraintKey::All,
                other => ConstraintKey::from_str(other).expect("constraint key variant"),
            };
            decoded.insert(key, eval_int(model, count) as u32);
        }
        decoded
    }
}

#[derive(Debug)]
pub struct StartByPart<'ctx> {
    ctx: &'ctx Context,
    reference: Vec<BlockKind>,
    pub names: Vec<Dynamic<'ctx>>,
}

impl<'ctx> StartByPart<'ctx> {
    fn new(ctx: &'ctx Context, sorts: &CodeSorts<'ctx>, reference: &[BlockKind]) -> Self {
        let slots = reference.len() + 1;
        Self {
            ctx,
            reference: reference.to_vec(),
            names: (0..slots)
                .map(|i| sorts.block.fresh_const(ctx, &format!("start_name__{i}")))
                .collect(),
        }
    }

    fn size(&self, sorts: &CodeSorts<'ctx>) -> Int<'ctx> {
        let effective: Vec<Bool> = self
            .names
            .iter()
            .map(|name| name._eq(sorts.block.value("noblock")).not())
            .collect();
        count_true(self.ctx, &effective)
    }

    fn properties(&self, sorts: &CodeSorts<'ctx>) -> Bool<'ctx> {
        let ctx = self.ctx;
        let mut constraints = vec![];

        // prefix entries mutate within their movement family
        let mut families: Vec<&'static str> = vec!["noblock"];
        for kind in &self.reference {
            match kind {
                BlockKind::Lt | BlockKind::Rt => families.extend(["lt", "rt"]),
                BlockKind::Fd | BlockKind::Bk => families.extend(["fd", "bk"]),
                _ => {}
            }
        }
        families.sort_unstable();
        families.dedup();
        for name in &self.names {
            let allowed: Vec<Bool> = families
                .iter()
                .map(|variant| name._eq(sorts.block.value(variant)))
                .collect();
            constraints.push(or_all(ctx, &allowed));
        }

        let lower = self.reference.len().saturating_sub(1) as i64;
        let upper = (self.reference.len() as i64 + 2).min(4);
        let size = self.size(sorts);
        constraints.push(size.ge(&Int::from_i64(ctx, lower)));
        constraints.push(size.le(&Int::from_i64(ctx, upper)));

        for banned in ["repeat", "setpc", "allblocks"] {
            for name in &self.names {
                constraints.push(name._eq(sorts.block.value(banned)).not());
            }
        }
        and_all(ctx, &constraints)
    }

    fn decode(&self, model: &Model<'ctx>, sorts: &CodeSorts<'ctx>) -> Vec<BlockKind> {
        self.names
            .iter()
            .filter_map(|name| match eval_enum(model, &sorts.block, name) {
                "noblock" => None,
                other => Some(BlockKind::from_str(other).expect("movement block")),
            })
            .collect()
    }
}

#[derive(Debug)]
pub struct ConstraintVars<'ctx> {
    ctx: &'ctx Context,
    pub exactly: CountedPart<'ctx>,
    pub at_most: CountedPart<'ctx>,
    pub start_by: StartByPart<'ctx>,
    reference_parts: usize,
}

impl<'ctx> ConstraintVars<'ctx> {
    pub fn new(
        ctx: &'ctx Context,
        sorts: &CodeSorts<'ctx>,
        reference: &CodeConstraints,
    ) -> Self {
        let reference_parts = usize::from(!reference.exactly.is_empty())
            + usize::from(!reference.at_most.is_empty())
            + usize::from(!reference.start_by.is_empty());
        Self {
            ctx,
            exactly: CountedPart::new(ctx, sorts, "exactly", &reference.exactly),
            at_most: CountedPart::new(ctx, sorts, "most", &reference.at_most),
            start_by: StartByPart::new(ctx, sorts, &reference.start_by),
            reference_parts,
        }
    }

    pub fn properties(&self, sorts: &CodeSorts<'ctx>, budget: &CodeBudget) -> Bool<'ctx> {
        let ctx = self.ctx;
        let mut constraints = vec![
            self.exactly.properties(sorts, false),
            self.at_most.properties(sorts, true),
            self.start_by.properties(sorts),
            self.disjoint_parts(sorts),
            self.prefix_respects_counts(sorts, &self.exactly),
            self.prefix_respects_counts(sorts, &self.at_most),
        ];

        // size budget across the three parts
        let ref_sizes = [
            self.exactly.ref_len() as i64,
            self.at_most.ref_len() as i64,
            self.start_by.reference.len() as i64,
        ];
        let sizes = [
            self.exactly.size(sorts),
            self.at_most.size(sorts),
            self.start_by.size(sorts),
        ];
        let increases: Vec<Int> = sizes
            .iter()
            .zip(ref_sizes)
            .map(|(size, reference)| Int::sub(ctx, &[size, &Int::from_i64(ctx, reference)]))
            .collect();
        let total_increase = sum(ctx, &increases);
        constraints.push(total_increase.le(&Int::from_i64(ctx, budget.max_cons_inc)));
        let decreases: Vec<Int> = sizes
            .iter()
            .zip(ref_sizes)
            .map(|(size, reference)| Int::sub(ctx, &[&Int::from_i64(ctx, reference), size]))
            .collect();
        constraints.push(sum(ctx, &decreases).le(&Int::from_i64(ctx, budget.max_cons_dec)));

        // the number of populated parts grows by at most the increment
        let zero = Int::from_i64(ctx, 0);
        let populated: Vec<Bool> = sizes.iter().map(|size| size.gt(&zero)).collect();
        constraints.push(count_true(ctx, &populated).le(&Int::from_i64(
            ctx,
            self.reference_parts as i64 + budget.max_cons_inc,
        )));

        and_all(ctx, &constraints)
    }

    /// A block named in `exactly` may not appear in `at_most`.
    fn disjoint_parts(&self, sorts: &CodeSorts<'ctx>) -> Bool<'ctx> {
        let ctx = self.ctx;
        let noblock = sorts.block.value("noblock");
        let mut constraints = vec![];
        for exact in &self.exactly.names {
            for most in &self.at_most.names {
                constraints.push(
                    and_all(ctx, &[exact._eq(noblock).not(), most._eq(noblock).not()])
                        .implies(&exact._eq(most).not()),
                );
            }
        }
        and_all(ctx, &constraints)
    }

    /// The prefix may not demand more of a block than its count allows,
    /// nor any occurrence of a block whose count is zero.
    fn prefix_respects_counts(
        &self,
        sorts: &CodeSorts<'ctx>,
        part: &CountedPart<'ctx>,
    ) -> Bool<'ctx> {
        let ctx = self.ctx;
        let noblock = sorts.block.value("noblock");
        let zero = Int::from_i64(ctx, 0);
        let one = Int::from_i64(ctx, 1);
        let mut constraints = vec![];
        for (name, count) in part.names.iter().zip(&part.counts) {
            for start in &self.start_by.names {
                constraints.push(
                    and_all(ctx, &[count._eq(&zero), name._eq(noblock).not()])
                        .implies(&start._eq(name).not()),
                );
            }
            let occurrences: Vec<Int> = self
                .start_by
                .names
                .iter()
                .map(|start| start._eq(name).ite(&one, &zero))
                .collect();
            constraints.push(
                name._eq(noblock)
                    .not()
                    .implies(&sum(ctx, &occurrences).le(count)),
            );
        }
        and_all(ctx, &constraints)
    }

    pub fn vars(&self) -> Vec<Dynamic<'ctx>> {
        let mut vars = self.exactly.names.clone();
        vars.extend(crate::smt::solver::dynamics(&self.exactly.counts));
        vars.extend(self.at_most.names.iter().cloned());
        vars.extend(crate::smt::solver::dynamics(&self.at_most.counts));
        vars.extend(self.start_by.names.iter().cloned());
        vars
    }

    pub fn decode(&self, model: &Model<'ctx>, sorts: &CodeSorts<'ctx>) -> CodeConstraints {
        CodeConstraints {
            exactly: self.exactly.decode(model, sorts),
            at_most: self.at_most.decode(model, sorts),
            start_by: self.start_by.decode(model, sorts),
        }
    }
}
