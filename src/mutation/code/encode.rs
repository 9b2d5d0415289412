//! The solver encoding of a padded slot tree: one `Block`-sort variable
//! per slot, a `times` integer per repeat and a pen-colour variable per
//! `setpc`, plus the hard properties every mutant must satisfy
//! (anti-patterns, twin repeats, totals, colour rules).

use crate::domain::{Block, BlockKind, PenColour, Program};
use crate::mutation::code::slots::Slot;
use crate::mutation::CodeBudget;
use crate::smt::solver::{and_all, count_true, eval_enum, eval_int, or_all, sum, EnumSort};
use std::str::FromStr;
use z3::ast::{Ast, Bool, Dynamic, Int};
use z3::{Context, Model};

/// Window slack of the anti-pattern scan: how far beyond the pattern's
/// own length erased `noblock` slots are looked through.
const PATTERN_SLIDE: usize = 3;

pub const BLOCK_VARIANTS: [&str; 8] = [
    "fd", "bk", "lt", "rt", "repeat", "setpc", "noblock", "allblocks",
];
pub const PEN_VARIANTS: [&str; 6] = ["white", "black", "green", "yellow", "blue", "red"];

#[derive(Debug)]
pub struct CodeSorts<'ctx> {
    pub block: EnumSort<'ctx>,
    pub pen: EnumSort<'ctx>,
}

impl<'ctx> CodeSorts<'ctx> {
    pub fn new(ctx: &'ctx Context) -> Self {
        Self {
            block: EnumSort::new(ctx, "Block", &BLOCK_VARIANTS),
            pen: EnumSort::new(ctx, "PColor", &PEN_VARIANTS),
        }
    }
}

#[derive(Debug)]
pub enum Payload<'ctx> {
    Action {
        reference: Option<BlockKind>,
    },
    SetPc {
        reference: Option<PenColour>,
        value: Dynamic<'ctx>,
    },
    Repeat {
        ref_times: u8,
        ref_body: Vec<Block>,
        times: Int<'ctx>,
        body: Vec<EncodedSlot<'ctx>>,
    },
}

#[derive(Debug)]
pub struct EncodedSlot<'ctx> {
    #[allow(dead_code)]
    pub id: String,
    pub block: Dynamic<'ctx>,
    pub payload: Payload<'ctx>,
}

pub fn encode<'ctx>(
    ctx: &'ctx Context,
    sorts: &CodeSorts<'ctx>,
    slots: &[Slot],
) -> Vec<EncodedSlot<'ctx>> {
    slots
        .iter()
        .map(|slot| {
            let block = sorts.block.fresh_const(ctx, &format!("block_{}", slot.id()));
            let payload = match slot {
                Slot::Action { reference, .. } => Payload::Action {
                    reference: *reference,
                },
                Slot::SetPc { reference, .. } => Payload::SetPc {
                    reference: *reference,
                    value: sorts.pen.fresh_const(ctx, &format!("value_{}", slot.id())),
                },
                Slot::Repeat(repeat) => Payload::Repeat {
                    ref_times: repeat.ref_times,
                    ref_body: repeat.ref_body.clone(),
                    times: Int::new_const(ctx, format!("times_{}", repeat.id)),
                    body: encode(ctx, sorts, &repeat.body),
                },
            };
            EncodedSlot {
                id: slot.id().to_owned(),
                block,
                payload,
            }
        })
        .collect()
}

pub fn collect_vars<'ctx>(body: &[EncodedSlot<'ctx>]) -> Vec<Dynamic<'ctx>> {
    let mut vars = vec![];
    for slot in body {
        vars.push(slot.block.clone());
        match &slot.payload {
            Payload::SetPc { value, .. } => vars.push(value.clone()),
            Payload::Repeat { times, body, .. } => {
                vars.push(Dynamic::from_ast(times));
                vars.extend(collect_vars(body));
            }
            Payload::Action { .. } => {}
        }
    }
    vars
}

fn block_vars<'a, 'ctx>(body: &'a [EncodedSlot<'ctx>]) -> Vec<&'a Dynamic<'ctx>> {
    body.iter().map(|slot| &slot.block).collect()
}

fn is_value<'ctx>(
    sorts: &CodeSorts<'ctx>,
    var: &Dynamic<'ctx>,
    name: &str,
) -> Bool<'ctx> {
    var._eq(sorts.block.value(name))
}

/// Count of slots in this body (recursively) equal to a target block
/// value, which may itself be a variable.
pub fn kind_count<'ctx>(
    ctx: &'ctx Context,
    body: &[EncodedSlot<'ctx>],
    target: &Dynamic<'ctx>,
) -> Int<'ctx> {
    let zero = Int::from_i64(ctx, 0);
    let one = Int::from_i64(ctx, 1);
    let mut terms = vec![];
    for slot in body {
        terms.push(slot.block._eq(target).ite(&one, &zero));
        if let Payload::Repeat { body, .. } = &slot.payload {
            terms.push(kind_count(ctx, body, target));
        }
    }
    sum(ctx, &terms)
}

/// Total number of effective (non-`noblock`) blocks in this body,
/// recursively.
pub fn total_count<'ctx>(
    ctx: &'ctx Context,
    sorts: &CodeSorts<'ctx>,
    body: &[EncodedSlot<'ctx>],
) -> Int<'ctx> {
    let zero = Int::from_i64(ctx, 0);
    let one = Int::from_i64(ctx, 1);
    let noblock = sorts.block.value("noblock");
    let mut terms = vec![];
    for slot in body {
        terms.push(slot.block._eq(noblock).ite(&zero, &one));
        if let Payload::Repeat { body, .. } = &slot.payload {
            terms.push(total_count(ctx, sorts, body));
        }
    }
    sum(ctx, &terms)
}

fn count_effective<'ctx>(
    ctx: &'ctx Context,
    sorts: &CodeSorts<'ctx>,
    vars: &[&Dynamic<'ctx>],
) -> Int<'ctx> {
    let effective: Vec<Bool> = vars
        .iter()
        .map(|var| var._eq(sorts.block.value("noblock")).not())
        .collect();
    count_true(ctx, &effective)
}

/// Forbid the effective sub-sequence `pattern` anywhere in `body`,
/// looking through erased `noblock` slots.
fn disable_pattern<'ctx>(
    ctx: &'ctx Context,
    sorts: &CodeSorts<'ctx>,
    body: &[EncodedSlot<'ctx>],
    pattern: &[&'static str],
    preceding_nulls: bool,
) -> Bool<'ctx> {
    let vars = block_vars(body);
    let noblock = sorts.block.value("noblock");

    if vars.is_empty() || pattern.is_empty() || vars.len() < pattern.len() {
        return Bool::from_bool(ctx, true);
    }
    if vars.len() == 1 && pattern.len() == 1 {
        return is_value(sorts, vars[0], pattern[0]).not();
    }
    if pattern.len() == 1 {
        // the final pattern element: some earlier effective slot in the
        // window must differ from it
        let mut constraints = vec![];
        for (i, var) in vars.iter().enumerate() {
            let breakers: Vec<Bool> = vars[..i]
                .iter()
                .map(|earlier| {
                    and_all(
                        ctx,
                        &[
                            earlier._eq(noblock).not(),
                            is_value(sorts, earlier, pattern[0]).not(),
                        ],
                    )
                })
                .collect();
            constraints
                .push(is_value(sorts, var, pattern[0]).implies(&or_all(ctx, &breakers)));
        }
        return and_all(ctx, &constraints);
    }
    if vars.len() == 1 {
        return Bool::from_bool(ctx, true);
    }

    let mut constraints = vec![];
    for (i, var) in vars.iter().enumerate() {
        let window_end = (i + 1 + pattern.len() + PATTERN_SLIDE).min(body.len());
        let rest = disable_pattern(ctx, sorts, &body[i + 1..window_end], &pattern[1..], true);
        let head = if preceding_nulls {
            let all_nulls: Vec<Bool> =
                vars[..i].iter().map(|earlier| earlier._eq(noblock)).collect();
            and_all(
                ctx,
                &[is_value(sorts, var, pattern[0]), and_all(ctx, &all_nulls)],
            )
        } else {
            is_value(sorts, var, pattern[0])
        };
        constraints.push(head.implies(&rest));
    }
    and_all(ctx, &constraints)
}

/// The `n`-th effective block of the body is `name` (1-based).
fn nth_effective_is<'ctx>(
    ctx: &'ctx Context,
    sorts: &CodeSorts<'ctx>,
    body: &[EncodedSlot<'ctx>],
    n: usize,
    name: &str,
) -> Bool<'ctx> {
    let vars = block_vars(body);
    let target = Int::from_i64(ctx, n as i64 - 1);
    let mut constraints = vec![];
    for (i, var) in vars.iter().enumerate() {
        let before = count_effective(ctx, sorts, &vars[..i]);
        let effective = var._eq(sorts.block.value("noblock")).not();
        constraints.push(
            and_all(ctx, &[before._eq(&target), effective])
                .implies(&is_value(sorts, var, name)),
        );
    }
    and_all(ctx, &constraints)
}

/// The `n`-th effective block from the end of the body is `name`.
fn last_nth_effective_is<'ctx>(
    ctx: &'ctx Context,
    sorts: &CodeSorts<'ctx>,
    body: &[EncodedSlot<'ctx>],
    n: usize,
    name: &str,
) -> Bool<'ctx> {
    let vars = block_vars(body);
    let target = Int::from_i64(ctx, n as i64 - 1);
    let mut constraints = vec![];
    for (i, var) in vars.iter().enumerate() {
        let after = count_effective(ctx, sorts, &vars[i + 1..]);
        let effective = var._eq(sorts.block.value("noblock")).not();
        constraints.push(
            and_all(ctx, &[after._eq(&target), effective])
                .implies(&is_value(sorts, var, name)),
        );
    }
    and_all(ctx, &constraints)
}

/// Two slot windows hold the same effective block sequence.
fn same_effective_body<'ctx>(
    ctx: &'ctx Context,
    sorts: &CodeSorts<'ctx>,
    body1: &[EncodedSlot<'ctx>],
    body2: &[EncodedSlot<'ctx>],
) -> Bool<'ctx> {
    let vars1 = block_vars(body1);
    let vars2 = block_vars(body2);
    let noblock = sorts.block.value("noblock");

    let mut constraints = vec![];
    for (i, a) in vars1.iter().enumerate() {
        for (j, b) in vars2.iter().enumerate() {
            let aligned = count_effective(ctx, sorts, &vars1[..i])
                ._eq(&count_effective(ctx, sorts, &vars2[..j]));
            constraints.push(
                and_all(
                    ctx,
                    &[a._eq(noblock).not(), b._eq(noblock).not(), aligned],
                )
                .implies(&a._eq(b)),
            );
        }
    }
    constraints.push(
        count_effective(ctx, sorts, &vars1)._eq(&count_effective(ctx, sorts, &vars2)),
    );
    and_all(ctx, &constraints)
}

fn setpc_slots<'a, 'ctx>(
    body: &'a [EncodedSlot<'ctx>],
) -> Vec<(&'a Dynamic<'ctx>, &'a Dynamic<'ctx>)> {
    body.iter()
        .filter_map(|slot| match &slot.payload {
            Payload::SetPc { value, .. } => Some((&slot.block, value)),
            _ => None,
        })
        .collect()
}

/// Two consecutive `setpc` blocks may not set the same colour.
fn distinct_adjacent_pen_colours<'ctx>(
    ctx: &'ctx Context,
    sorts: &CodeSorts<'ctx>,
    body: &[EncodedSlot<'ctx>],
) -> Bool<'ctx> {
    let slots = setpc_slots(body);
    let setpc = sorts.block.value("setpc");
    let mut constraints = vec![];
    for i in 0..slots.len() {
        for j in i + 1..slots.len() {
            let nothing_between: Vec<Bool> = slots[i + 1..j]
                .iter()
                .map(|(block, _)| block._eq(setpc).not())
                .collect();
            constraints.push(
                and_all(
                    ctx,
                    &[
                        slots[i].0._eq(setpc),
                        slots[j].0._eq(setpc),
                        and_all(ctx, &nothing_between),
                    ],
                )
                .implies(&slots[i].1._eq(slots[j].1).not()),
            );
        }
    }
    and_all(ctx, &constraints)
}

/// Blue and black pens are too alike to appear together.
fn exclusive_pen_colours<'ctx>(
    ctx: &'ctx Context,
    sorts: &CodeSorts<'ctx>,
    body: &[EncodedSlot<'ctx>],
) -> Bool<'ctx> {
    let slots = setpc_slots(body);
    let blues: Vec<Bool> = slots
        .iter()
        .map(|(_, value)| value._eq(sorts.pen.value("blue")))
        .collect();
    let blacks: Vec<Bool> = slots
        .iter()
        .map(|(_, value)| value._eq(sorts.pen.value("black")))
        .collect();
    let blue_exists = or_all(ctx, &blues);
    let black_exists = or_all(ctx, &blacks);
    and_all(
        ctx,
        &[
            blue_exists.implies(&black_exists.clone().not()),
            black_exists.implies(&blue_exists.not()),
        ],
    )
}

/// A repeat's body may not equal the effective block sequence right
/// before or right after it (which would merge into the repeat).
fn no_merge_into_repeat<'ctx>(
    ctx: &'ctx Context,
    sorts: &CodeSorts<'ctx>,
    body: &[EncodedSlot<'ctx>],
) -> Bool<'ctx> {
    let mut constraints = vec![];
    for (i, slot) in body.iter().enumerate() {
        let Payload::Repeat { body: inner, .. } = &slot.payload else {
            continue;
        };
        for j in i + 2..=body.len() {
            constraints.push(same_effective_body(ctx, sorts, inner, &body[i + 1..j]).not());
        }
        for j in 0..i {
            constraints.push(same_effective_body(ctx, sorts, inner, &body[j..i]).not());
        }
    }
    and_all(ctx, &constraints)
}

/// Repeat bodies consisting only of forwards, only of backwards, or of a
/// single forward-backward pair are pointless.
fn no_trivial_repeat_body<'ctx>(
    ctx: &'ctx Context,
    sorts: &CodeSorts<'ctx>,
    body: &[EncodedSlot<'ctx>],
) -> Bool<'ctx> {
    let vars = block_vars(body);
    let len = Int::from_i64(ctx, vars.len() as i64);
    let counts = |name: &str| -> Int<'ctx> {
        let hits: Vec<Bool> = vars.iter().map(|var| is_value(sorts, var, name)).collect();
        count_true(ctx, &hits)
    };
    let n_fd = counts("fd");
    let n_bk = counts("bk");
    let n_noblock = counts("noblock");

    let one = Int::from_i64(ctx, 1);
    let only_fd_bk = and_all(
        ctx,
        &[
            n_fd._eq(&one),
            n_bk._eq(&one),
            sum(ctx, &[n_fd.clone(), n_bk.clone(), n_noblock.clone()])._eq(&len),
        ],
    );
    let only_fd = and_all(
        ctx,
        &[n_fd.gt(&one), sum(ctx, &[n_fd.clone(), n_noblock.clone()])._eq(&len)],
    );
    let only_bk = and_all(
        ctx,
        &[n_bk.gt(&one), sum(ctx, &[n_bk, n_noblock])._eq(&len)],
    );
    or_all(ctx, &[only_fd_bk, only_fd, only_bk]).not()
}

/// Pairs of repeats whose reference bodies were identical stay identical,
/// in body and, when the reference times matched, in times.
fn twin_repeat_equality<'ctx>(
    ctx: &'ctx Context,
    sorts: &CodeSorts<'ctx>,
    body: &[EncodedSlot<'ctx>],
) -> Bool<'ctx> {
    let repeats: Vec<(&Vec<Block>, u8, &Vec<EncodedSlot>, &Int)> = body
        .iter()
        .filter_map(|slot| match &slot.payload {
            Payload::Repeat {
                ref_body,
                ref_times,
                body,
                times,
            } => Some((ref_body, *ref_times, body, times)),
            _ => None,
        })
        .collect();

    let mut constraints = vec![];
    for i in 0..repeats.len() {
        for j in i + 1..repeats.len() {
            let (ref_a, times_a, body_a, times_var_a) = &repeats[i];
            let (ref_b, times_b, body_b, times_var_b) = &repeats[j];
            if ref_a == ref_b && body_a.len() == body_b.len() {
                for (a, b) in body_a.iter().zip(body_b.iter()) {
                    constraints.push(a.block._eq(&b.block));
                }
            }
            if times_a == times_b {
                constraints.push(times_var_a._eq(times_var_b));
            }
        }
    }
    and_all(ctx, &constraints)
}

/// The total-block-count window: pinned when `exact` is set, otherwise
/// bounded by the increment and decrement budgets (never below one block,
/// or two for a repeat subtree).
fn total_bounds<'ctx>(
    ctx: &'ctx Context,
    sorts: &CodeSorts<'ctx>,
    body: &[EncodedSlot<'ctx>],
    reference_blocks: i64,
    max_inc: i64,
    max_dec: i64,
    exact_inc: Option<i64>,
    is_repeat: bool,
) -> Bool<'ctx> {
    let total = total_count(ctx, sorts, body);
    let header = i64::from(is_repeat);
    let total = sum(ctx, &[total, Int::from_i64(ctx, header)]);
    match exact_inc {
        Some(exact) => total._eq(&Int::from_i64(ctx, reference_blocks + exact)),
        None => {
            let lower = (reference_blocks - max_dec).max(1 + header);
            and_all(
                ctx,
                &[
                    total.ge(&Int::from_i64(ctx, lower)),
                    total.le(&Int::from_i64(ctx, reference_blocks + max_inc)),
                ],
            )
        }
    }
}

/// Everything a single body must satisfy, recursing into its repeats.
fn body_properties<'ctx>(
    ctx: &'ctx Context,
    sorts: &CodeSorts<'ctx>,
    body: &[EncodedSlot<'ctx>],
    rows: usize,
    cols: usize,
    budget: &CodeBudget,
    top_level: bool,
) -> Bool<'ctx> {
    let mut constraints = vec![];

    for slot in body {
        constraints.push(slot_properties(ctx, sorts, slot, rows, cols, budget));
    }

    let run_length = rows.max(cols);
    let run_fd: Vec<&'static str> = std::iter::repeat("fd").take(run_length).collect();
    let run_bk: Vec<&'static str> = std::iter::repeat("bk").take(run_length).collect();
    let patterns: Vec<Vec<&'static str>> = vec![
        vec!["lt", "lt", "lt"],
        vec!["rt", "rt", "rt"],
        run_fd,
        run_bk,
        vec!["lt", "rt"],
        vec!["rt", "lt"],
        vec!["fd", "bk", "fd"],
        vec!["bk", "fd", "bk"],
        vec!["rt", "rt", "fd"],
        vec!["rt", "rt", "bk"],
        vec!["lt", "lt", "fd"],
        vec!["lt", "lt", "bk"],
        vec!["fd", "rt", "rt"],
        vec!["fd", "lt", "lt"],
        vec!["bk", "rt", "rt"],
        vec!["bk", "lt", "lt"],
    ];
    for pattern in &patterns {
        constraints.push(disable_pattern(ctx, sorts, body, pattern, false));
    }

    constraints.push(twin_repeat_equality(ctx, sorts, body));
    constraints.push(distinct_adjacent_pen_colours(ctx, sorts, body));
    constraints.push(exclusive_pen_colours(ctx, sorts, body));
    constraints.push(no_merge_into_repeat(ctx, sorts, body));

    if top_level {
        // the program may not end on a turn
        constraints.push(last_nth_effective_is(ctx, sorts, body, 1, "lt").not());
        constraints.push(last_nth_effective_is(ctx, sorts, body, 1, "rt").not());
    } else {
        constraints.push(no_trivial_repeat_body(ctx, sorts, body));
        let first_turn = or_all(
            ctx,
            &[
                nth_effective_is(ctx, sorts, body, 1, "lt"),
                nth_effective_is(ctx, sorts, body, 1, "rt"),
            ],
        );
        let last_turn = or_all(
            ctx,
            &[
                last_nth_effective_is(ctx, sorts, body, 1, "lt"),
                last_nth_effective_is(ctx, sorts, body, 1, "rt"),
            ],
        );
        constraints.push(and_all(ctx, &[first_turn, last_turn]).not());
    }

    and_all(ctx, &constraints)
}

fn slot_properties<'ctx>(
    ctx: &'ctx Context,
    sorts: &CodeSorts<'ctx>,
    slot: &EncodedSlot<'ctx>,
    rows: usize,
    cols: usize,
    budget: &CodeBudget,
) -> Bool<'ctx> {
    match &slot.payload {
        Payload::Action { reference } => match reference {
            Some(BlockKind::Fd) => is_value(sorts, &slot.block, "fd"),
            Some(BlockKind::Bk) => is_value(sorts, &slot.block, "bk"),
            Some(BlockKind::Lt) | Some(BlockKind::Rt) => or_all(
                ctx,
                &[
                    is_value(sorts, &slot.block, "lt"),
                    is_value(sorts, &slot.block, "rt"),
                ],
            ),
            Some(other) => unreachable!("{other} is not an action"),
            None => or_all(
                ctx,
                &[
                    is_value(sorts, &slot.block, "fd"),
                    is_value(sorts, &slot.block, "bk"),
                    is_value(sorts, &slot.block, "lt"),
                    is_value(sorts, &slot.block, "rt"),
                    is_value(sorts, &slot.block, "noblock"),
                ],
            ),
        },
        Payload::SetPc { reference, value } => {
            let palette: Vec<Bool> = PEN_VARIANTS
                .iter()
                .map(|name| value._eq(sorts.pen.value(name)))
                .collect();
            // white stays white, anything else stays visible
            let white = value._eq(sorts.pen.value("white"));
            let white_rule = if *reference == Some(PenColour::White) {
                white
            } else {
                white.not()
            };
            and_all(
                ctx,
                &[
                    is_value(sorts, &slot.block, "setpc"),
                    or_all(ctx, &palette),
                    white_rule,
                ],
            )
        }
        Payload::Repeat {
            ref_times,
            ref_body,
            times,
            body,
        } => {
            let lower = (*ref_times as i64 - budget.max_rep_times_dec).max(2);
            let upper = *ref_times as i64 + budget.max_rep_times_inc;
            let reference_blocks = 1 + Program::new(ref_body.clone()).total_blocks() as i64;
            and_all(
                ctx,
                &[
                    is_value(sorts, &slot.block, "repeat"),
                    times.ge(&Int::from_i64(ctx, lower)),
                    times.le(&Int::from_i64(ctx, upper)),
                    body_properties(ctx, sorts, body, rows, cols, budget, false),
                    total_bounds(
                        ctx,
                        sorts,
                        body,
                        reference_blocks,
                        budget.max_rep_body_inc,
                        budget.max_rep_body_dec,
                        None,
                        true,
                    ),
                ],
            )
        }
    }
}

/// All hard properties of a mutated program.
pub fn program_properties<'ctx>(
    ctx: &'ctx Context,
    sorts: &CodeSorts<'ctx>,
    body: &[EncodedSlot<'ctx>],
    reference: &Program,
    rows: usize,
    cols: usize,
    budget: &CodeBudget,
) -> Bool<'ctx> {
    and_all(
        ctx,
        &[
            body_properties(ctx, sorts, body, rows, cols, budget, true),
            total_bounds(
                ctx,
                sorts,
                body,
                reference.total_blocks() as i64,
                budget.max_code_inc,
                budget.max_code_dec,
                budget.exact_code_inc,
                false,
            ),
        ],
    )
}

pub fn decode_program<'ctx>(
    model: &Model<'ctx>,
    sorts: &CodeSorts<'ctx>,
    body: &[EncodedSlot<'ctx>],
) -> Program {
    Program::new(decode_body(model, sorts, body))
}

fn decode_body<'ctx>(
    model: &Model<'ctx>,
    sorts: &CodeSorts<'ctx>,
    body: &[EncodedSlot<'ctx>],
) -> Vec<Block> {
    let mut blocks = vec![];
    for slot in body {
        match eval_enum(model, &sorts.block, &slot.block) {
            "noblock" => {}
            "fd" => blocks.push(Block::Fd),
            "bk" => blocks.push(Block::Bk),
            "lt" => blocks.push(Block::Lt),
            "rt" => blocks.push(Block::Rt),
            "setpc" => {
                let Payload::SetPc { value, .. } = &slot.payload else {
                    unreachable!("setpc value without a setpc slot");
                };
                let colour = PenColour::from_str(eval_enum(model, &sorts.pen, value))
                    .expect("pen colour variant");
                blocks.push(Block::SetPc {
                    value: Some(colour),
                });
            }
            "repeat" => {
                let Payload::Repeat { times, body, .. } = &slot.payload else {
                    unreachable!("repeat payload without a repeat slot");
                };
                blocks.push(Block::Repeat {
                    times: eval_int(model, times) as u8,
                    body: decode_body(model, sorts, body),
                });
            }
            other => unreachable!("unexpected block value {other}"),
        }
    }
    blocks
}
