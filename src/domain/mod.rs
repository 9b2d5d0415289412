//! The typed puzzle model: programs, code-shape constraints, goals,
//! worlds and the reference-asset dictionaries they are loaded from.

mod assets;
mod block;
mod constraints;
mod crash;
mod edit_distance;
mod goal;
pub mod grid;
mod item;
mod marker;
mod puzzle;
mod spec;
mod tile;
mod turtle;
mod world;

pub use assets::{AssetError, ReferenceAssets, ReferenceTask};
pub use block::{Block, BlockKind, PenColour, Program, MAX_REPEAT_TIMES};
pub use constraints::{CodeConstraints, ConstraintKey};
pub use crash::{Crash, CrashKind};
pub use edit_distance::{goal_distance, program_distance, tree_distance, TreeNode};
pub use goal::{Goal, Objective, ObjectiveKind};
pub use item::{Item, ItemClass, ItemColour, ItemName, MAX_ITEM_COUNT};
pub use marker::{Line, Marker, MarkerColour, MarkerGrid};
pub use puzzle::{Puzzle, PuzzleRecord};
pub use spec::{Clause, Cnf, LineAtom, Literal, LiteralAtom, Spec};
pub use tile::{Tile, Walls};
pub use turtle::{Direction, Turtle};
pub use world::{pen_to_marker, World, WorldJson, WorldStats, MAX_API_CALLS};
