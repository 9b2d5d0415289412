//! The turtle: a grid position plus one of four headings.

use crate::domain::grid::Side;
use serde::{Deserialize, Serialize};
use strum_macros::EnumIter;

/// Heading of the turtle. The wire format is the integer `0..=3` in the
/// order north, east, south, west.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, EnumIter,
)]
#[serde(into = "u8", try_from = "u8")]
pub enum Direction {
    North,
    East,
    South,
    West,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::North,
        Direction::East,
        Direction::South,
        Direction::West,
    ];

    pub fn index(&self) -> usize {
        *self as usize
    }

    /// The `(dy, dx)` step of a forward move.
    pub fn delta(&self) -> (i64, i64) {
        match self {
            Direction::North => (-1, 0),
            Direction::East => (0, 1),
            Direction::South => (1, 0),
            Direction::West => (0, -1),
        }
    }

    /// The tile face crossed by a forward move.
    pub fn exit_side(&self) -> Side {
        match self {
            Direction::North => Side::Top,
            Direction::East => Side::Right,
            Direction::South => Side::Bottom,
            Direction::West => Side::Left,
        }
    }

    pub fn reversed(&self) -> Direction {
        match self {
            Direction::North => Direction::South,
            Direction::East => Direction::West,
            Direction::South => Direction::North,
            Direction::West => Direction::East,
        }
    }

    pub fn left(&self) -> Direction {
        match self {
            Direction::North => Direction::West,
            Direction::East => Direction::North,
            Direction::South => Direction::East,
            Direction::West => Direction::South,
        }
    }

    pub fn right(&self) -> Direction {
        self.left().reversed()
    }
}

impl From<Direction> for u8 {
    fn from(dir: Direction) -> u8 {
        dir as u8
    }
}

impl TryFrom<u8> for Direction {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Direction::North),
            1 => Ok(Direction::East),
            2 => Ok(Direction::South),
            3 => Ok(Direction::West),
            other => Err(format!("direction {other} outside 0..=3")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Turtle {
    pub y: i64,
    pub x: i64,
    #[serde(rename = "direction")]
    pub dir: Direction,
}

impl Turtle {
    pub fn new(y: i64, x: i64, dir: Direction) -> Self {
        Self { y, x, dir }
    }
}
