//! Drawn line markers. Lines arrive as JSON segments with hex colours and
//! are stored as per-tile edge flags, one colour per face, mirrored across
//! the shared face of adjacent tiles.

use crate::domain::grid::{self, Side};
use crate::domain::AssetError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use strum_macros::{Display, EnumIter, EnumString};

/// Colours a drawn line may take, the pen palette without `null`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, EnumString, EnumIter,
    Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MarkerColour {
    Red,
    Green,
    Blue,
    Black,
    White,
    Yellow,
}

impl MarkerColour {
    pub fn hex(&self) -> &'static str {
        match self {
            MarkerColour::Red => "#D60000",
            MarkerColour::Green => "#009624",
            MarkerColour::Blue => "#0D47A1",
            MarkerColour::Black => "#000000",
            MarkerColour::White => "#FFFFFF",
            MarkerColour::Yellow => "#FFD600",
        }
    }

    pub fn from_hex(hex: &str) -> Result<Self, AssetError> {
        match hex {
            "#D60000" => Ok(MarkerColour::Red),
            "#009624" => Ok(MarkerColour::Green),
            "#0D47A1" => Ok(MarkerColour::Blue),
            "#000000" => Ok(MarkerColour::Black),
            "#FFFFFF" => Ok(MarkerColour::White),
            "#FFD600" => Ok(MarkerColour::Yellow),
            other => Err(AssetError::Schema {
                message: format!("unknown line colour `{other}`"),
            }),
        }
    }
}

/// One axis-aligned line segment of the wire format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Line {
    pub x1: i64,
    pub y1: i64,
    pub x2: i64,
    pub y2: i64,
    #[serde(rename = "color")]
    pub colour_hex: String,
}

impl Line {
    pub fn new(x1: i64, y1: i64, x2: i64, y2: i64, colour: MarkerColour) -> Self {
        Self {
            x1,
            y1,
            x2,
            y2,
            colour_hex: colour.hex().to_owned(),
        }
    }

    pub fn colour(&self) -> Result<MarkerColour, AssetError> {
        // accept colour names as well as hex codes
        MarkerColour::from_hex(&self.colour_hex)
            .or_else(|_| {
                MarkerColour::from_str(&self.colour_hex).map_err(|_| AssetError::Schema {
                    message: format!("unknown line colour `{}`", self.colour_hex),
                })
            })
    }
}

/// Edge flags of one tile: a colour per face or nothing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Marker {
    sides: [Option<MarkerColour>; 4],
}

impl Marker {
    pub fn get(&self, side: Side) -> Option<MarkerColour> {
        self.sides[side.index()]
    }

    pub fn set(&mut self, side: Side, colour: MarkerColour) {
        self.sides[side.index()] = Some(colour);
    }

    pub fn is_empty(&self) -> bool {
        self.sides.iter().all(Option::is_none)
    }

    pub fn colours(&self) -> impl Iterator<Item = MarkerColour> + '_ {
        self.sides.iter().flatten().copied()
    }
}

/// A dense grid of edge markers.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MarkerGrid {
    pub rows: usize,
    pub cols: usize,
    markers: Vec<Marker>,
}

impl MarkerGrid {
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            markers: vec![Marker::default(); rows * cols],
        }
    }

    pub fn get(&self, i: usize) -> &Marker {
        &self.markers[i]
    }

    pub fn set(&mut self, i: usize, side: Side, colour: MarkerColour) {
        self.markers[i].set(side, colour);
    }

    pub fn is_empty(&self) -> bool {
        self.markers.iter().all(Marker::is_empty)
    }

    /// Mark the shared edge between two adjacent tiles on both sides.
    pub fn mark_edge(&mut self, i: usize, j: usize, colour: MarkerColour) {
        let side = grid::shared_side(i, j, self.rows, self.cols)
            .expect("marked tiles must be adjacent");
        self.markers[i].set(side, colour);
        self.markers[j].set(side.opposite(), colour);
    }

    /// Split a line into unit edges and record each of them.
    pub fn apply_line(&mut self, line: &Line) -> Result<(), AssetError> {
        let colour = line.colour()?;
        if line.x1 != line.x2 && line.y1 != line.y2 {
            return Err(AssetError::Schema {
                message: "lines must be axis-aligned".to_owned(),
            });
        }
        let in_bounds = |y: i64, x: i64| {
            y >= 0 && x >= 0 && (y as usize) < self.rows && (x as usize) < self.cols
        };
        if !in_bounds(line.y1, line.x1) || !in_bounds(line.y2, line.x2) {
            return Err(AssetError::Schema {
                message: "line endpoint outside the grid".to_owned(),
            });
        }
        if line.y1 == line.y2 {
            let y = line.y1 as usize;
            for x in line.x1.min(line.x2)..line.x1.max(line.x2) {
                let i = grid::yx2i(y, x as usize, self.cols);
                self.mark_edge(i, i + 1, colour);
            }
        } else {
            let x = line.x1 as usize;
            for y in line.y1.min(line.y2)..line.y1.max(line.y2) {
                let i = grid::yx2i(y as usize, x, self.cols);
                self.mark_edge(i, i + self.cols, colour);
            }
        }
        Ok(())
    }

    /// Merge adjacent half-edges back into unit line segments. The output
    /// is sorted row-major and deterministic.
    pub fn to_lines(&self) -> Vec<Line> {
        let mut lines = vec![];
        for y in 0..self.rows {
            for x in 0..self.cols {
                let i = grid::yx2i(y, x, self.cols);
                if x + 1 < self.cols {
                    if let Some(colour) = self.markers[i].get(Side::Right) {
                        debug_assert_eq!(self.markers[i + 1].get(Side::Left), Some(colour));
                        lines.push(Line::new(
                            x as i64,
                            y as i64,
                            x as i64 + 1,
                            y as i64,
                            colour,
                        ));
                    }
                }
                if y + 1 < self.rows {
                    if let Some(colour) = self.markers[i].get(Side::Bottom) {
                        debug_assert_eq!(
                            self.markers[i + self.cols].get(Side::Top),
                            Some(colour)
                        );
                        lines.push(Line::new(
                            x as i64,
                            y as i64,
                            x as i64,
                            y as i64 + 1,
                            colour,
                        ));
                    }
                }
            }
        }
        lines
    }

    pub fn colours(&self) -> BTreeSet<MarkerColour> {
        self.markers.iter().flat_map(Marker::colours).collect()
    }
}

impl fmt::Display for MarkerGrid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in self.to_lines() {
            writeln!(
                f,
                "({},{})-({},{}) {}",
                line.x1, line.y1, line.x2, line.y2, line.colour_hex
            )?;
        }
        Ok(())
    }
}
