//! The partial world: every tile field is three-valued. The symbolic
//! executor is the sole writer; it records the strongest facts consistent
//! with a non-crashing run, and the world synthesizer later completes the
//! remaining unknowns.

use crate::domain::grid::{self, Side};
use crate::domain::{
    pen_to_marker, Crash, CrashKind, Item, ItemColour, ItemName, MarkerColour, MarkerGrid,
    PenColour, Turtle, MAX_API_CALLS,
};
use crate::emulator::TurtleWorld;

/// A tile about which only some facts are known. `None` means unknown and
/// is the initial state of every field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SymTile {
    pub exist: Option<bool>,
    pub allowed: Option<bool>,
    walls: [Option<bool>; 4],
}

impl SymTile {
    pub fn wall(&self, side: Side) -> Option<bool> {
        self.walls[side.index()]
    }

    pub fn set_wall(&mut self, side: Side, value: bool) {
        self.walls[side.index()] = Some(value);
    }
}

/// A partially known item. Symbolic execution never touches items, but
/// reference worlds may pin some attributes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SymItem {
    pub name: Option<ItemName>,
    pub colour: Option<ItemColour>,
    pub count: Option<u8>,
}

impl SymItem {
    pub fn from_item(item: &Item) -> Self {
        Self {
            name: Some(item.name),
            colour: Some(item.colour),
            count: Some(item.count),
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.name.is_none() && self.colour.is_none() && self.count.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymWorld {
    pub rows: usize,
    pub cols: usize,
    pub init_turtle: Turtle,
    pub turtle: Turtle,
    pub tiles: Vec<SymTile>,
    pub items: Vec<SymItem>,

    pub trace: Vec<usize>,
    pub edge_colours: Vec<MarkerColour>,
    pub pen_colour: Option<PenColour>,
    pub drawn_markers: MarkerGrid,
    crash: Option<Crash>,
    api_calls: u64,
}

impl SymWorld {
    pub fn new(rows: usize, cols: usize, turtle: Turtle) -> Self {
        let start = grid::yx2i(turtle.y as usize, turtle.x as usize, cols);
        Self {
            rows,
            cols,
            init_turtle: turtle,
            turtle,
            tiles: vec![SymTile::default(); rows * cols],
            items: vec![SymItem::default(); rows * cols],
            trace: vec![start],
            edge_colours: vec![],
            pen_colour: None,
            drawn_markers: MarkerGrid::new(rows, cols),
            crash: None,
            api_calls: 0,
        }
    }

    pub fn crash(&self) -> Option<Crash> {
        self.crash
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

    /// Force a wall fact on tile `i` and mirror it on the adjacent tile.
    fn force_wall(&mut self, i: usize, side: Side, value: bool) {
        self.tiles[i].set_wall(side, value);
        if let Some(j) = grid::neighbour(i, self.rows, self.cols, side) {
            self.tiles[j].set_wall(side.opposite(), value);
        }
    }

    /// A move succeeds by fiat: the departed and entered tiles must exist
    /// and be allowed, and the crossed face must be open.
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
        self.tiles[from].allowed = Some(true);
        self.tiles[from].exist = Some(true);
        self.force_wall(from, heading.exit_side(), false);

        let (dy, dx) = heading.delta();
        self.turtle.y += dy;
        self.turtle.x += dx;

        if !self.in_bounds(self.turtle.y, self.turtle.x) {
            self.crash = Some(Crash {
                kind: CrashKind::OutOfWorld,
                pos: (self.turtle.x, self.turtle.y),
            });
            self.note_api_call();
            return;
        }

        let to = self.turtle_index();
        self.trace.push(to);
        self.edge_colours.push(pen_to_marker(self.pen_colour));
        self.tiles[to].allowed = Some(true);
        self.tiles[to].exist = Some(true);
        self.drawn_markers
            .mark_edge(from, to, pen_to_marker(self.pen_colour));
        self.note_api_call();
    }
}

impl TurtleWorld for SymWorld {
    fn fd(&mut self) {
        self.step(false);
    }

    fn bk(&mut self) {
        self.step(true);
    }

    fn lt(&mut self) {
        if self.crashed() {
            return;
        }
        self.turtle.dir = self.turtle.dir.left();
        self.note_api_call();
    }

    fn rt(&mut self) {
        if self.crashed() {
            return;
        }
        self.turtle.dir = self.turtle.dir.right();
        self.note_api_call();
    }

    fn setpc(&mut self, colour: Option<PenColour>) {
        self.pen_colour = colour;
        self.note_api_call();
    }

    fn crashed(&self) -> bool {
        self.crash.is_some()
    }
}
