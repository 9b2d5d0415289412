//! Tiles and their walls.

use crate::domain::grid::Side;
use serde::{Deserialize, Serialize};

/// Wall flags for the four faces of a tile. Internal walls are mirrored on
/// both adjacent tiles; the constructors of [`crate::domain::World`] keep
/// that invariant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Walls {
    #[serde(default)]
    pub top: bool,
    #[serde(default)]
    pub left: bool,
    #[serde(default)]
    pub right: bool,
    #[serde(default)]
    pub bottom: bool,
}

impl Walls {
    pub fn get(&self, side: Side) -> bool {
        match side {
            Side::Top => self.top,
            Side::Left => self.left,
            Side::Right => self.right,
            Side::Bottom => self.bottom,
        }
    }

    pub fn set(&mut self, side: Side, value: bool) {
        match side {
            Side::Top => self.top = value,
            Side::Left => self.left = value,
            Side::Right => self.right = value,
            Side::Bottom => self.bottom = value,
        }
    }

    pub fn count(&self) -> usize {
        [self.top, self.left, self.right, self.bottom]
            .into_iter()
            .filter(|w| *w)
            .count()
    }

    pub fn surrounded(&self) -> bool {
        self.count() == 4
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Tile {
    pub exist: bool,
    pub allowed: bool,
    pub walls: Walls,
}

impl Tile {
    pub fn new(exist: bool, allowed: bool, walls: Walls) -> Self {
        Self {
            exist,
            allowed,
            walls,
        }
    }

    /// A rendered hole: unreachable, forbidden, no walls.
    pub fn non_existent() -> Self {
        Self {
            exist: false,
            allowed: false,
            walls: Walls::default(),
        }
    }

    pub fn open(allowed: bool) -> Self {
        Self {
            exist: true,
            allowed,
            walls: Walls::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wall_accessors_match_fields() {
        let mut walls = Walls::default();
        walls.set(Side::Right, true);
        walls.set(Side::Bottom, true);
        assert!(walls.get(Side::Right));
        assert!(walls.get(Side::Bottom));
        assert!(!walls.get(Side::Top));
        assert_eq!(walls.count(), 2);
        assert!(!walls.surrounded());
    }

    #[test]
    fn missing_wall_keys_default_to_false() {
        let walls: Walls = serde_json::from_value(serde_json::json!({"top": true})).unwrap();
        assert!(walls.top);
        assert!(!walls.left && !walls.right && !walls.bottom);
    }
}
