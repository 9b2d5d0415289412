//! Index arithmetic for the `rows x cols` tile grid. Tiles are numbered
//! row-major from the top-left corner, so tile `i` sits at
//! `(y, x) = (i / cols, i % cols)`.

use strum_macros::EnumIter;

/// One of the four faces of a tile, in the fixed order used throughout the
/// crate (walls, markers, neighbour lookups).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, EnumIter)]
pub enum Side {
    Top,
    Left,
    Right,
    Bottom,
}

impl Side {
    pub const ALL: [Side; 4] = [Side::Top, Side::Left, Side::Right, Side::Bottom];

    pub fn opposite(&self) -> Side {
        match self {
            Side::Top => Side::Bottom,
            Side::Left => Side::Right,
            Side::Right => Side::Left,
            Side::Bottom => Side::Top,
        }
    }

    pub fn index(&self) -> usize {
        match self {
            Side::Top => 0,
            Side::Left => 1,
            Side::Right => 2,
            Side::Bottom => 3,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Side::Top => "top",
            Side::Left => "left",
            Side::Right => "right",
            Side::Bottom => "bottom",
        }
    }
}

pub fn yx2i(y: usize, x: usize, cols: usize) -> usize {
    y * cols + x
}

pub fn i2yx(i: usize, cols: usize) -> (usize, usize) {
    (i / cols, i % cols)
}

pub fn i2y(i: usize, cols: usize) -> usize {
    i / cols
}

pub fn i2x(i: usize, cols: usize) -> usize {
    i % cols
}

/// The tile adjacent to `i` on the given side, or `None` at the boundary.
pub fn neighbour(i: usize, rows: usize, cols: usize, side: Side) -> Option<usize> {
    debug_assert!(i < rows * cols);
    let (y, x) = i2yx(i, cols);
    match side {
        Side::Top => (y > 0).then(|| i - cols),
        Side::Left => (x > 0).then(|| i - 1),
        Side::Right => (x + 1 < cols).then(|| i + 1),
        Side::Bottom => (y + 1 < rows).then(|| i + cols),
    }
}

/// All neighbours of tile `i` in side order (top, left, right, bottom).
pub fn neighbours(i: usize, rows: usize, cols: usize) -> [(Side, Option<usize>); 4] {
    [
        (Side::Top, neighbour(i, rows, cols, Side::Top)),
        (Side::Left, neighbour(i, rows, cols, Side::Left)),
        (Side::Right, neighbour(i, rows, cols, Side::Right)),
        (Side::Bottom, neighbour(i, rows, cols, Side::Bottom)),
    ]
}

/// Every internal edge of the grid as a pair `(i, j)` with `i < j`, sorted.
pub fn edges(rows: usize, cols: usize) -> Vec<(usize, usize)> {
    let mut edges = vec![];
    for i in 0..rows * cols {
        if let Some(j) = neighbour(i, rows, cols, Side::Right) {
            edges.push((i, j));
        }
        if let Some(j) = neighbour(i, rows, cols, Side::Bottom) {
            edges.push((i, j));
        }
    }
    edges.sort_unstable();
    edges
}

/// The side of tile `i` shared with its adjacent tile `j`, if any.
pub fn shared_side(i: usize, j: usize, rows: usize, cols: usize) -> Option<Side> {
    Side::ALL
        .into_iter()
        .find(|side| neighbour(i, rows, cols, *side) == Some(j))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_round_trip() {
        for i in 0..12 {
            let (y, x) = i2yx(i, 4);
            assert_eq!(yx2i(y, x, 4), i);
        }
    }

    #[test]
    fn neighbours_of_corner() {
        // top-left corner of a 3x3 grid
        assert_eq!(neighbour(0, 3, 3, Side::Top), None);
        assert_eq!(neighbour(0, 3, 3, Side::Left), None);
        assert_eq!(neighbour(0, 3, 3, Side::Right), Some(1));
        assert_eq!(neighbour(0, 3, 3, Side::Bottom), Some(3));
    }

    #[test]
    fn neighbours_of_centre() {
        assert_eq!(neighbour(4, 3, 3, Side::Top), Some(1));
        assert_eq!(neighbour(4, 3, 3, Side::Left), Some(3));
        assert_eq!(neighbour(4, 3, 3, Side::Right), Some(5));
        assert_eq!(neighbour(4, 3, 3, Side::Bottom), Some(7));
    }

    #[test]
    fn edges_of_3x3() {
        let expected = vec![
            (0, 1),
            (0, 3),
            (1, 2),
            (1, 4),
            (2, 5),
            (3, 4),
            (3, 6),
            (4, 5),
            (4, 7),
            (5, 8),
            (6, 7),
            (7, 8),
        ];
        assert_eq!(edges(3, 3), expected);
    }

    #[test]
    fn shared_side_is_symmetric() {
        assert_eq!(shared_side(4, 1, 3, 3), Some(Side::Top));
        assert_eq!(shared_side(1, 4, 3, 3), Some(Side::Bottom));
        assert_eq!(shared_side(0, 8, 3, 3), None);
    }
}
