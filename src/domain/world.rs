//! The concrete grid world and its single-step move semantics. A world is
//! built from JSON, executed (which mutates the turtle, the trace and the
//! drawn markers) and then read back; it is never repaired after a crash.

use crate::domain::grid;
use crate::domain::{
    AssetError, Crash, CrashKind, Item, ItemClass, ItemColour, ItemName, Line, Marker,
    MarkerColour, MarkerGrid, PenColour, Tile, Turtle, Walls,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Emulation is aborted once this many api calls have been made; guards
/// against degenerate programs.
pub const MAX_API_CALLS: u64 = 100_000;

pub fn pen_to_marker(pen: Option<PenColour>) -> MarkerColour {
    match pen {
        Some(PenColour::Red) => MarkerColour::Red,
        Some(PenColour::Green) => MarkerColour::Green,
        Some(PenColour::Blue) => MarkerColour::Blue,
        Some(PenColour::Yellow) => MarkerColour::Yellow,
        Some(PenColour::White) => MarkerColour::White,
        Some(PenColour::Black) | None => MarkerColour::Black,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct TileJson {
    x: usize,
    y: usize,
    #[serde(default = "default_true")]
    exist: bool,
    allowed: bool,
    #[serde(default)]
    walls: Walls,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ItemJson {
    x: usize,
    y: usize,
    #[serde(flatten)]
    item: Item,
}

/// The wire format of a world, see the reference-asset schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldJson {
    pub turtle: Turtle,
    tiles: Vec<TileJson>,
    items: Vec<ItemJson>,
    #[serde(default)]
    lines: Vec<Line>,
}

/// Summary statistics of a freshly built world, consumed by the
/// reference-similarity constraints and by scoring.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorldStats {
    pub item_classes_used: BTreeSet<ItemClass>,
    /// Colours of shape items only.
    pub colours_used: BTreeSet<ItemColour>,
    pub shapes_used: BTreeSet<ItemName>,
    pub pen_colours_used: BTreeSet<MarkerColour>,
    pub n_items: usize,
    pub use_count: bool,
    pub n_walls: usize,
    pub n_forbidden: usize,
    pub n_non_existent: usize,
    pub markers_used: bool,
    pub rows: usize,
    pub cols: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct World {
    pub rows: usize,
    pub cols: usize,
    pub turtle: Turtle,
    pub tiles: Vec<Tile>,
    pub items: Vec<Option<Item>>,
    pub markers: MarkerGrid,

    // execution state
    pub trace: Vec<usize>,
    pub pen_colour: Option<PenColour>,
    pub drawn_markers: MarkerGrid,
    crash: Option<Crash>,
    api_calls: u64,
}

impl World {
    pub fn new(
        rows: usize,
        cols: usize,
        turtle: Turtle,
        tiles: Vec<Tile>,
        items: Vec<Option<Item>>,
        markers: MarkerGrid,
    ) -> Self {
        assert_eq!(tiles.len(), rows * cols);
        assert_eq!(items.len(), rows * cols);
        let start = grid::yx2i(turtle.y as usize, turtle.x as usize, cols);
        Self {
            rows,
            cols,
            turtle,
            tiles,
            items,
            markers,
            trace: vec![start],
            pen_colour: None,
            drawn_markers: MarkerGrid::new(rows, cols),
            crash: None,
            api_calls: 0,
        }
    }

    pub fn from_value(value: &serde_json::Value) -> Result<Self, AssetError> {
        let json: WorldJson =
            serde_json::from_value(value.clone()).map_err(|source| AssetError::Json { source })?;
        Self::from_json(&json)
    }

    pub fn from_json(json: &WorldJson) -> Result<Self, AssetError> {
        let rows = json
            .tiles
            .iter()
            .map(|t| t.y + 1)
            .max()
            .ok_or_else(|| AssetError::Schema {
                message: "world has no tiles".to_owned(),
            })?;
        let cols = json.tiles.iter().map(|t| t.x + 1).max().unwrap_or(0);

        // tiles missing from the list are rendered holes
        let mut tiles = vec![Tile::non_existent(); rows * cols];
        for tile in &json.tiles {
            tiles[grid::yx2i(tile.y, tile.x, cols)] =
                Tile::new(tile.exist, tile.allowed, tile.walls);
        }

        let mut items = vec![None; rows * cols];
        for item in &json.items {
            items[grid::yx2i(item.y, item.x, cols)] = Some(item.item);
        }

        let mut markers = MarkerGrid::new(rows, cols);
        for line in &json.lines {
            markers.apply_line(line)?;
        }

        let turtle = json.turtle;
        if turtle.y < 0
            || turtle.x < 0
            || turtle.y as usize >= rows
            || turtle.x as usize >= cols
        {
            return Err(AssetError::Schema {
                message: "turtle outside the grid".to_owned(),
            });
        }

        Ok(Self::new(rows, cols, turtle, tiles, items, markers))
    }

    /// Summary statistics of the current grid contents, recomputed on
    /// demand; collected items no longer count once a run has consumed
    /// them.
    pub fn stats(&self) -> WorldStats {
        let mut stats = WorldStats {
            rows: self.rows,
            cols: self.cols,
            ..WorldStats::default()
        };
        for tile in &self.tiles {
            if tile.exist {
                stats.n_walls += tile.walls.count();
                if !tile.allowed {
                    stats.n_forbidden += 1;
                }
            } else {
                stats.n_non_existent += 1;
            }
        }
        for item in self.items.iter().flatten() {
            stats.n_items += 1;
            stats.item_classes_used.insert(item.name.class());
            if item.name.class() == ItemClass::Shape {
                stats.colours_used.insert(item.colour);
                stats.shapes_used.insert(item.name);
            }
            if item.count > 1 {
                stats.use_count = true;
            }
        }
        stats.markers_used = !self.markers.is_empty();
        stats.pen_colours_used = self.markers.colours();
        stats
    }

    pub fn tile(&self, i: usize) -> &Tile {
        &self.tiles[i]
    }

    pub fn item(&self, i: usize) -> Option<&Item> {
        self.items[i].as_ref()
    }

    pub fn crash(&self) -> Option<Crash> {
        self.crash
    }

    pub fn crashed(&self) -> bool {
        self.crash.is_some()
    }

    fn turtle_index(&self) -> usize {
        grid::yx2i(self.turtle.y as usize, self.turtle.x as usize, self.cols)
    }

    fn in_bounds(&self, y: i64, x: i64) -> bool {
        y >= 0 && x >= 0 && (y as usize) < self.rows && (x as usize) < self.cols
    }

    fn note_api_call(&mut self) {
        self.api_calls += 1;
        if self.api_calls > MAX_API_CALLS {
            self.crash = Some(Crash {
                kind: CrashKind::ExceedMaxCalls,
                pos: (self.turtle.x, self.turtle.y),
            });
        }
    }

    fn crash_here(&mut self, kind: CrashKind) {
        self.crash = Some(Crash {
            kind,
            pos: (self.turtle.x, self.turtle.y),
        });
    }

    /// One `fd` or `bk` step: pre-check the wall on the exit face, move,
    /// then check bounds, forbidden areas and existence in that order. A
    /// successful step collects the item on the destination tile and draws
    /// a marker edge in the current pen colour.
    fn step(&mut self, backwards: bool) {
        if self.crashed() {
            return;
        }
        let heading = if backwards {
            self.turtle.dir.reversed()
        } else {
            self.turtle.dir
        };
        let from = self.turtle_index();
        if self.tiles[from].walls.get(heading.exit_side()) {
            self.crash_here(CrashKind::Wall);
        }

        let (dy, dx) = heading.delta();
        self.turtle.y += dy;
        self.turtle.x += dx;

        if !self.crashed() && !self.in_bounds(self.turtle.y, self.turtle.x) {
            self.crash_here(CrashKind::OutOfWorld);
        }
        if self.crashed() {
            self.note_api_call();
            return;
        }

        let to = self.turtle_index();
        self.trace.push(to);

        if !self.tiles[to].allowed {
            self.crash_here(CrashKind::ForbiddenArea);
        }
        if !self.crashed() && !self.tiles[to].exist {
            self.crash_here(CrashKind::GridNotExist);
        }
        if !self.crashed() {
            // collect
            self.items[to] = None;
            self.drawn_markers
                .mark_edge(from, to, pen_to_marker(self.pen_colour));
        }
        self.note_api_call();
    }

    pub fn fd(&mut self) {
        self.step(false);
    }

    pub fn bk(&mut self) {
        self.step(true);
    }

    pub fn lt(&mut self) {
        if self.crashed() {
            return;
        }
        self.turtle.dir = self.turtle.dir.left();
        self.note_api_call();
    }

    pub fn rt(&mut self) {
        if self.crashed() {
            return;
        }
        self.turtle.dir = self.turtle.dir.right();
        self.note_api_call();
    }

    pub fn setpc(&mut self, colour: Option<PenColour>) {
        self.pen_colour = colour;
        self.note_api_call();
    }

    pub fn to_json(&self) -> WorldJson {
        let mut tiles = vec![];
        let mut items = vec![];
        for y in 0..self.rows {
            for x in 0..self.cols {
                let i = grid::yx2i(y, x, self.cols);
                let tile = &self.tiles[i];
                tiles.push(TileJson {
                    x,
                    y,
                    exist: tile.exist,
                    allowed: tile.allowed,
                    walls: tile.walls,
                });
                if let Some(item) = &self.items[i] {
                    items.push(ItemJson { x, y, item: *item });
                }
            }
        }
        WorldJson {
            turtle: self.turtle,
            tiles,
            items,
            lines: self.markers.to_lines(),
        }
    }

    pub fn to_value(&self) -> serde_json::Value {
        serde_json::to_value(self.to_json()).expect("world serialisation cannot fail")
    }

    pub fn marker(&self, i: usize) -> &Marker {
        self.markers.get(i)
    }
}

impl fmt::Display for World {
    /// A compact character map: `^>v<` turtle, `#` wall on any side, `x`
    /// forbidden, `.` hole, item initial otherwise.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for y in 0..self.rows {
            for x in 0..self.cols {
                let i = grid::yx2i(y, x, self.cols);
                let c = if self.turtle.y == y as i64 && self.turtle.x == x as i64 {
                    match self.turtle.dir {
                        crate::domain::Direction::North => '^',
                        crate::domain::Direction::East => '>',
                        crate::domain::Direction::South => 'v',
                        crate::domain::Direction::West => '<',
                    }
                } else if !self.tiles[i].exist {
                    '.'
                } else if !self.tiles[i].allowed {
                    'x'
                } else if let Some(item) = &self.items[i] {
                    item.name
                        .to_string()
                        .chars()
                        .next()
                        .unwrap_or('?')
                } else if self.tiles[i].walls.count() > 0 {
                    '#'
                } else {
                    '_'
                };
                write!(f, "{c}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::grid::Side;
    use crate::test_utils::open_world_3x3;
    use serde_json::json;

    #[test]
    fn from_json_round_trips() {
        let world = open_world_3x3();
        let value = world.to_value();
        let back = World::from_value(&value).unwrap();
        assert_eq!(back.to_value(), value);
    }

    #[test]
    fn missing_tiles_become_holes() {
        let value = json!({
            "turtle": {"y": 0, "x": 0, "direction": 1},
            "tiles": [
                {"x": 0, "y": 0, "allowed": true, "walls": {}},
                {"x": 1, "y": 1, "allowed": true, "walls": {}}
            ],
            "items": [],
            "lines": []
        });
        let world = World::from_value(&value).unwrap();
        assert!(!world.tile(1).exist);
        assert!(!world.tile(1).allowed);
        assert_eq!(world.stats().n_non_existent, 2);
    }

    #[test]
    fn forward_collects_and_draws() {
        let mut world = open_world_3x3();
        world.items[grid::yx2i(1, 2, 3)] = Some(Item::new(
            ItemName::Strawberry,
            ItemColour::Red,
            1,
        ));
        // turtle at (1,1) facing east
        world.fd();
        assert!(!world.crashed());
        assert_eq!(world.trace, vec![4, 5]);
        assert!(world.item(5).is_none());
        assert_eq!(
            world.drawn_markers.get(4).get(Side::Right),
            Some(MarkerColour::Black)
        );
    }

    #[test]
    fn pen_colour_is_used_for_drawing() {
        let mut world = open_world_3x3();
        world.setpc(Some(PenColour::Red));
        world.fd();
        assert_eq!(
            world.drawn_markers.get(4).get(Side::Right),
            Some(MarkerColour::Red)
        );
    }

    #[test]
    fn wall_crash_on_exit_face() {
        let mut world = open_world_3x3();
        world.tiles[4].walls.set(Side::Right, true);
        world.tiles[5].walls.set(Side::Left, true);
        world.fd();
        assert_eq!(world.crash().unwrap().kind, CrashKind::Wall);
        // crashed moves stop collecting and drawing
        assert!(world.drawn_markers.is_empty());
    }

    #[test]
    fn leaving_the_grid_crashes() {
        let mut world = open_world_3x3();
        world.fd();
        world.fd();
        assert_eq!(world.crash().unwrap().kind, CrashKind::OutOfWorld);
    }

    #[test]
    fn forbidden_tile_crashes() {
        let mut world = open_world_3x3();
        world.tiles[5].allowed = false;
        world.fd();
        assert_eq!(world.crash().unwrap().kind, CrashKind::ForbiddenArea);
    }

    #[test]
    fn crashed_world_ignores_later_moves() {
        let mut world = open_world_3x3();
        world.fd();
        world.fd(); // crashes out of the world
        let trace = world.trace.clone();
        world.rt();
        world.fd();
        assert_eq!(world.trace, trace);
    }

    #[test]
    fn backward_moves_against_heading() {
        let mut world = open_world_3x3();
        world.bk();
        assert!(!world.crashed());
        assert_eq!(world.trace, vec![4, 3]);
    }

    #[test]
    fn turns_rotate_in_place() {
        let mut world = open_world_3x3();
        world.lt();
        assert_eq!(world.turtle.dir, crate::domain::Direction::North);
        world.rt();
        world.rt();
        assert_eq!(world.turtle.dir, crate::domain::Direction::South);
        assert_eq!(world.trace.len(), 1);
    }
}
