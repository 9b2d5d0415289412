//! The slot skeleton of a program mutation. The reference program is
//! turned into a tree of typed slots; padding slots are then inserted at
//! block boundaries (heterogeneous at repeat boundaries and the ends,
//! homogeneous between plain blocks). Padding left as `noblock` by the
//! solver is erased on read-back.

use crate::domain::{Block, BlockKind, PenColour};
use crate::mutation::CodeBudget;
use rand::rngs::StdRng;
use rand::Rng;

#[derive(Debug, Clone)]
pub enum Slot {
    Action {
        id: String,
        /// `None` for padding slots, which may become any primitive move
        /// or stay empty.
        reference: Option<BlockKind>,
    },
    SetPc {
        id: String,
        reference: Option<PenColour>,
    },
    Repeat(RepeatSlot),
}

#[derive(Debug, Clone)]
pub struct RepeatSlot {
    pub id: String,
    pub ref_times: u8,
    /// The reference body before padding; twin repeats are matched on it.
    pub ref_body: Vec<Block>,
    pub body: Vec<Slot>,
}

impl Slot {
    pub fn id(&self) -> &str {
        match self {
            Slot::Action { id, .. } => id,
            Slot::SetPc { id, .. } => id,
            Slot::Repeat(repeat) => &repeat.id,
        }
    }
}

/// The reference skeleton of one body, ids nested under `prefix`.
pub fn skeleton(body: &[Block], prefix: &str) -> Vec<Slot> {
    body.iter()
        .enumerate()
        .map(|(i, block)| {
            let id = format!("{prefix}_{i}");
            match block {
                Block::SetPc { value } => Slot::SetPc {
                    id,
                    reference: *value,
                },
                Block::Repeat { times, body } => Slot::Repeat(RepeatSlot {
                    ref_times: *times,
                    ref_body: body.clone(),
                    body: skeleton(body, &id),
                    id,
                }),
                other => Slot::Action {
                    id,
                    reference: Some(other.kind()),
                },
            }
        })
        .collect()
}

fn padding_slots(
    prefix: &str,
    counter: &mut usize,
    n: usize,
    prob_repeat: f64,
    budget: &CodeBudget,
    rng: &mut StdRng,
) -> Vec<Slot> {
    (0..n)
        .map(|_| {
            let id = format!("{prefix}_i{counter}");
            *counter += 1;
            if prob_repeat > 0.0 && rng.gen_bool(prob_repeat) {
                // a seeded repeat: two iterations over a single forward
                let ref_body = vec![Block::Fd];
                let body = pad(skeleton(&ref_body, &id), &id, budget, 0.0, rng);
                Slot::Repeat(RepeatSlot {
                    ref_times: 2,
                    ref_body,
                    body,
                    id,
                })
            } else {
                Slot::Action {
                    id,
                    reference: None,
                }
            }
        })
        .collect()
}

/// Insert padding into one body: heterogeneous padding at the start, at
/// the end and around repeats, homogeneous padding between plain blocks.
/// Repeat bodies are padded recursively and never receive nested repeats.
pub fn pad(
    body: Vec<Slot>,
    prefix: &str,
    budget: &CodeBudget,
    prob_repeat: f64,
    rng: &mut StdRng,
) -> Vec<Slot> {
    let mut counter = 0;
    let mut padded = padding_slots(
        prefix,
        &mut counter,
        budget.blocks_insert_hetero,
        prob_repeat,
        budget,
        rng,
    );

    for i in 0..body.len() {
        let this_is_repeat = matches!(body[i], Slot::Repeat(_));
        let next_is_repeat = matches!(body.get(i + 1), Some(Slot::Repeat(_)));
        let at_end = i + 1 == body.len();

        let slot = match body[i].clone() {
            Slot::Repeat(repeat) => {
                let padded_body = pad(repeat.body, &repeat.id, budget, 0.0, rng);
                Slot::Repeat(RepeatSlot {
                    body: padded_body,
                    ..repeat
                })
            }
            other => other,
        };
        padded.push(slot);

        let n = if this_is_repeat || next_is_repeat || at_end {
            budget.blocks_insert_hetero
        } else {
            budget.blocks_insert_homog
        };
        padded.extend(padding_slots(
            prefix,
            &mut counter,
            n,
            prob_repeat,
            budget,
            rng,
        ));
    }
    padded
}
