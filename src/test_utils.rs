//! Shared fixtures for the unit tests: small worlds, goals and reference
//! asset dictionaries.

use crate::domain::{Direction, Goal, MarkerGrid, Tile, Turtle, World};
use serde_json::json;
use std::fs;
use std::path::Path;

/// A fully open 3x3 world, turtle on the centre tile facing east, no
/// items, walls or markers.
pub fn open_world_3x3() -> World {
    open_world(3, 3, 1, 1, Direction::East)
}

/// An open `rows x cols` world with the turtle at the given cell.
pub fn open_world(rows: usize, cols: usize, y: i64, x: i64, dir: Direction) -> World {
    World::new(
        rows,
        cols,
        Turtle::new(y, x, dir),
        vec![Tile::open(true); rows * cols],
        vec![None; rows * cols],
        MarkerGrid::new(rows, cols),
    )
}

pub fn find_red_strawberry_goal() -> Goal {
    Goal::from_value(&json!([
        {"name": "find", "specs": [[
            [{"color": "red", "neg": 0}],
            [{"name": "strawberry", "neg": 0}]
        ]]}
    ]))
    .unwrap()
}

/// Write a minimal set of the four reference dictionaries into `dir`:
/// task "1" is the fd-fd strawberry hunt on an open 3x3 grid.
pub fn write_reference_assets(dir: &Path) {
    let codes = json!({
        "1": {"code_json": {"run": [{"type": "fd"}, {"type": "fd"}]}}
    });
    let constraints = json!({
        "1": {"constraints": {"exactly": {"fd": 2, "all": 2}}}
    });
    let tiles: Vec<serde_json::Value> = (0..3)
        .flat_map(|y| {
            (0..3).map(move |x| {
                json!({"x": x, "y": y, "exist": true, "allowed": true, "walls": {}})
            })
        })
        .collect();
    let worlds = json!({
        "1": {"world_json": {
            "turtle": {"y": 2, "x": 0, "direction": 1},
            "tiles": tiles,
            "items": [{"x": 2, "y": 2, "name": "strawberry", "color": "red", "count": 1}],
            "lines": []
        }}
    });
    let goals = json!({
        "1": {"goal": [
            {"name": "find", "specs": [[
                [{"color": "red", "neg": 0}],
                [{"name": "strawberry", "neg": 0}]
            ]]}
        ]}
    });

    fs::write(dir.join("codes.json"), codes.to_string()).unwrap();
    fs::write(dir.join("constraints.json"), constraints.to_string()).unwrap();
    fs::write(dir.join("worlds.json"), worlds.to_string()).unwrap();
    fs::write(dir.join("goals.json"), goals.to_string()).unwrap();
}
