//! The block-structured program AST. Programs arrive as JSON of the shape
//! `{"run": [{"type": "fd"}, {"type": "repeat", "times": 4, "body": [...]}]}`
//! and are kept as a typed tree.

use crate::domain::AssetError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use strum_macros::{Display, EnumIter, EnumString};

pub const MAX_REPEAT_TIMES: u8 = 12;

/// Pen colours accepted by `setpc`. A JSON `null` value is represented as
/// `None` at the `SetPc` block and draws in the default black.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display,
    EnumString, EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PenColour {
    Red,
    Black,
    Blue,
    Green,
    Yellow,
    White,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Block {
    Fd,
    Bk,
    Lt,
    Rt,
    SetPc {
        value: Option<PenColour>,
    },
    Repeat {
        times: u8,
        body: Vec<Block>,
    },
    /// Editing sentinel marking the single insertion position of a partially
    /// constructed program. Never present in synthesised programs.
    Cursor,
}

impl Block {
    pub fn kind(&self) -> BlockKind {
        match self {
            Block::Fd => BlockKind::Fd,
            Block::Bk => BlockKind::Bk,
            Block::Lt => BlockKind::Lt,
            Block::Rt => BlockKind::Rt,
            Block::SetPc { .. } => BlockKind::SetPc,
            Block::Repeat { .. } => BlockKind::Repeat,
            Block::Cursor => BlockKind::Cursor,
        }
    }
}

/// The label of a block, without its payload.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, EnumString, EnumIter,
    Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum BlockKind {
    Fd,
    Bk,
    Lt,
    Rt,
    SetPc,
    Repeat,
    Cursor,
}

impl BlockKind {
    pub fn is_move(&self) -> bool {
        matches!(self, BlockKind::Fd | BlockKind::Bk)
    }

    pub fn is_turn(&self) -> bool {
        matches!(self, BlockKind::Lt | BlockKind::Rt)
    }
}

/// An ordered sequence of blocks, the unit that the emulator runs and the
/// mutator rewrites.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Program {
    pub run: Vec<Block>,
}

impl Program {
    pub fn new(run: Vec<Block>) -> Self {
        Self { run }
    }

    pub fn from_value(value: &serde_json::Value) -> Result<Self, AssetError> {
        let program: Program = serde_json::from_value(value.clone())
            .map_err(|source| AssetError::Json { source })?;
        program.validate()?;
        Ok(program)
    }

    /// Structural validation of the invariants that the JSON schema cannot
    /// express: repeat bounds and cursor placement.
    pub fn validate(&self) -> Result<(), AssetError> {
        fn walk(body: &[Block], tail: bool, cursors: &mut usize) -> Result<(), AssetError> {
            for (i, block) in body.iter().enumerate() {
                let at_tail = tail && i == body.len() - 1;
                match block {
                    Block::Repeat { times, body } => {
                        if !(1..=MAX_REPEAT_TIMES).contains(times) {
                            return Err(AssetError::Schema {
                                message: format!("repeat times {times} outside 1..=12"),
                            });
                        }
                        walk(body, at_tail, cursors)?;
                    }
                    Block::Cursor => {
                        if !at_tail {
                            return Err(AssetError::Schema {
                                message: "cursor is only valid at a tail position".to_owned(),
                            });
                        }
                        *cursors += 1;
                    }
                    _ => {}
                }
            }
            Ok(())
        }

        let mut cursors = 0;
        walk(&self.run, true, &mut cursors)?;
        if cursors > 1 {
            return Err(AssetError::Schema {
                message: format!("program has {cursors} cursors, at most one is allowed"),
            });
        }
        Ok(())
    }

    pub fn to_value(&self) -> serde_json::Value {
        serde_json::to_value(self).expect("program serialisation cannot fail")
    }

    pub fn contains_cursor(&self) -> bool {
        *self.block_count().get(&BlockKind::Cursor).unwrap_or(&0) > 0
    }

    /// The number of blocks per kind, counting `repeat` headers and the
    /// blocks inside their bodies.
    pub fn block_count(&self) -> BTreeMap<BlockKind, u32> {
        fn walk(body: &[Block], counts: &mut BTreeMap<BlockKind, u32>) {
            for block in body {
                *counts.entry(block.kind()).or_insert(0) += 1;
                if let Block::Repeat { body, .. } = block {
                    walk(body, counts);
                }
            }
        }
        let mut counts = BTreeMap::new();
        walk(&self.run, &mut counts);
        counts
    }

    /// Total number of blocks, repeat headers included.
    pub fn total_blocks(&self) -> u32 {
        self.block_count().values().sum()
    }

    /// Maximum `repeat` nesting depth; a flat program has depth 0.
    pub fn depth(&self) -> u32 {
        fn walk(body: &[Block], depth: u32) -> u32 {
            body.iter()
                .map(|block| match block {
                    Block::Repeat { body, .. } => walk(body, depth + 1),
                    _ => depth,
                })
                .max()
                .unwrap_or(depth)
        }
        walk(&self.run, 0)
    }

    /// The set of pen colours the program sets, `None` included when a
    /// `setpc` block carries a null value.
    pub fn pen_colours(&self) -> BTreeSet<Option<PenColour>> {
        fn walk(body: &[Block], colours: &mut BTreeSet<Option<PenColour>>) {
            for block in body {
                match block {
                    Block::SetPc { value } => {
                        colours.insert(*value);
                    }
                    Block::Repeat { body, .. } => walk(body, colours),
                    _ => {}
                }
            }
        }
        let mut colours = BTreeSet::new();
        walk(&self.run, &mut colours);
        colours
    }

    /// The kinds of the top-level blocks, in order. Used for the `StartBy`
    /// constraint check.
    pub fn top_level_kinds(&self) -> Vec<BlockKind> {
        self.run.iter().map(Block::kind).collect()
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn write_body(
            f: &mut fmt::Formatter<'_>,
            body: &[Block],
            indent: usize,
        ) -> fmt::Result {
            for block in body {
                for _ in 0..indent {
                    write!(f, "  ")?;
                }
                match block {
                    Block::SetPc { value } => match value {
                        Some(colour) => writeln!(f, "setpc({colour})")?,
                        None => writeln!(f, "setpc(null)")?,
                    },
                    Block::Repeat { times, body } => {
                        writeln!(f, "repeat({times}){{")?;
                        write_body(f, body, indent + 1)?;
                        for _ in 0..indent {
                            write!(f, "  ")?;
                        }
                        writeln!(f, "}}")?;
                    }
                    other => writeln!(f, "{}", other.kind())?,
                }
            }
            Ok(())
        }
        write_body(f, &self.run, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn square_program() -> Program {
        Program::from_value(&json!({
            "run": [
                {"type": "repeat", "times": 4, "body": [
                    {"type": "fd"}, {"type": "fd"}, {"type": "rt"}
                ]}
            ]
        }))
        .unwrap()
    }

    #[test]
    fn round_trip() {
        let value = json!({
            "run": [
                {"type": "setpc", "value": "red"},
                {"type": "repeat", "times": 3, "body": [{"type": "fd"}, {"type": "lt"}]},
                {"type": "bk"}
            ]
        });
        let program = Program::from_value(&value).unwrap();
        assert_eq!(program.to_value(), value);
    }

    #[test]
    fn null_pen_colour_round_trips() {
        let value = json!({"run": [{"type": "setpc", "value": null}, {"type": "fd"}]});
        let program = Program::from_value(&value).unwrap();
        assert_eq!(program.run[0], Block::SetPc { value: None });
        assert_eq!(program.to_value(), value);
    }

    #[test]
    fn block_counts_include_repeat_headers() {
        let program = square_program();
        let counts = program.block_count();
        assert_eq!(counts[&BlockKind::Fd], 2);
        assert_eq!(counts[&BlockKind::Rt], 1);
        assert_eq!(counts[&BlockKind::Repeat], 1);
        assert_eq!(program.total_blocks(), 4);
    }

    #[test]
    fn depth_of_nested_repeats() {
        let program = Program::from_value(&json!({
            "run": [
                {"type": "repeat", "times": 2, "body": [
                    {"type": "repeat", "times": 2, "body": [{"type": "fd"}, {"type": "rt"}]},
                    {"type": "fd"}
                ]}
            ]
        }))
        .unwrap();
        assert_eq!(program.depth(), 2);
        assert_eq!(square_program().depth(), 1);
    }

    #[test]
    fn pen_colours_are_collected_recursively() {
        let program = Program::from_value(&json!({
            "run": [
                {"type": "setpc", "value": "red"},
                {"type": "repeat", "times": 2, "body": [
                    {"type": "setpc", "value": "blue"}, {"type": "fd"}
                ]}
            ]
        }))
        .unwrap();
        let colours = program.pen_colours();
        assert!(colours.contains(&Some(PenColour::Red)));
        assert!(colours.contains(&Some(PenColour::Blue)));
        assert_eq!(colours.len(), 2);
    }

    #[test]
    fn repeat_times_out_of_range_is_rejected() {
        let value = json!({"run": [{"type": "repeat", "times": 13, "body": [{"type": "fd"}]}]});
        assert!(Program::from_value(&value).is_err());
    }

    #[test]
    fn cursor_only_valid_at_tail() {
        let tail = json!({"run": [{"type": "fd"}, {"type": "cursor"}]});
        assert!(Program::from_value(&tail).is_ok());

        let middle = json!({"run": [{"type": "cursor"}, {"type": "fd"}]});
        assert!(Program::from_value(&middle).is_err());
    }
}
