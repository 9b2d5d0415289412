//! Tile variables: existence, allowedness and the four wall faces, with
//! the structural rules connecting them.

use crate::domain::grid::{self, Side};
use crate::domain::{Tile, Walls};
use crate::smt::solver::{and_all, eval_bool, exactly_one, or_all};
use crate::symexec::SymTile;
use z3::ast::{Ast, Bool, Dynamic};
use z3::{Context, Model};

#[derive(Debug)]
pub struct TileSmt<'ctx> {
    ctx: &'ctx Context,
    rows: usize,
    cols: usize,
    pub allowed: Vec<Bool<'ctx>>,
    pub exist: Vec<Bool<'ctx>>,
    walls: [Vec<Bool<'ctx>>; 4],
}

impl<'ctx> TileSmt<'ctx> {
    pub fn new(ctx: &'ctx Context, rows: usize, cols: usize) -> Self {
        let ntiles = rows * cols;
        let vector = |name: &str| -> Vec<Bool<'ctx>> {
            (0..ntiles)
                .map(|i| Bool::new_const(ctx, format!("{name}__{i}")))
                .collect()
        };
        Self {
            ctx,
            rows,
            cols,
            allowed: vector("allowed"),
            exist: vector("exist"),
            walls: [
                vector("topW"),
                vector("leftW"),
                vector("rightW"),
                vector("bottomW"),
            ],
        }
    }

    pub fn wall(&self, i: usize, side: Side) -> &Bool<'ctx> {
        &self.walls[side.index()][i]
    }

    fn ntiles(&self) -> usize {
        self.rows * self.cols
    }

    pub fn properties(&self, symmetric: bool) -> Bool<'ctx> {
        let mut constraints = vec![
            self.adjacent_wall_consistency(),
            self.boundary_walls_absent(),
            self.forbidden_area_walls(),
        ];
        if symmetric {
            constraints.push(self.symmetric_forbidden_areas());
        }
        and_all(self.ctx, &constraints)
    }

    /// Two adjacent tiles agree on their shared wall bit.
    fn adjacent_wall_consistency(&self) -> Bool<'ctx> {
        let mut constraints = vec![];
        for (i, j) in grid::edges(self.rows, self.cols) {
            let side = grid::shared_side(i, j, self.rows, self.cols).expect("adjacent edge");
            constraints.push(self.wall(i, side)._eq(self.wall(j, side.opposite())));
        }
        and_all(self.ctx, &constraints)
    }

    /// Tiles on the grid boundary have no outward-facing wall.
    fn boundary_walls_absent(&self) -> Bool<'ctx> {
        let mut constraints = vec![];
        for i in 0..self.ntiles() {
            for side in Side::ALL {
                if grid::neighbour(i, self.rows, self.cols, side).is_none() {
                    constraints.push(self.wall(i, side).not());
                }
            }
        }
        and_all(self.ctx, &constraints)
    }

    /// Forbidden-area rules: allowed implies existing; two forbidden
    /// neighbours are not separated by a wall; an existing tile adjacent
    /// to one of different allowedness is; a fully walled-in tile is not
    /// allowed.
    fn forbidden_area_walls(&self) -> Bool<'ctx> {
        let ctx = self.ctx;
        let mut constraints = vec![];
        for i in 0..self.ntiles() {
            constraints.push(self.allowed[i].implies(&self.exist[i]));

            let mut inner_walls = vec![];
            for (side, neighbour) in grid::neighbours(i, self.rows, self.cols) {
                let Some(j) = neighbour else { continue };
                inner_walls.push(self.wall(i, side).clone());

                let both_forbidden =
                    and_all(ctx, &[self.allowed[i].not(), self.allowed[j].not()]);
                constraints.push(both_forbidden.implies(&self.wall(i, side).not()));

                let both_exist = and_all(ctx, &[self.exist[i].clone(), self.exist[j].clone()]);
                let split_allowedness =
                    exactly_one(ctx, &[self.allowed[i].clone(), self.allowed[j].clone()]);
                constraints.push(
                    and_all(ctx, &[both_exist, split_allowedness])
                        .implies(self.wall(i, side)),
                );
            }
            constraints.push(and_all(ctx, &inner_walls).implies(&self.allowed[i].not()));
        }
        and_all(ctx, &constraints)
    }

    /// The forbidden subset must be symmetric under at least one mirror:
    /// left-right, top-bottom, or (on square grids) either diagonal.
    fn symmetric_forbidden_areas(&self) -> Bool<'ctx> {
        let ctx = self.ctx;
        let at = |y: usize, x: usize| &self.allowed[grid::yx2i(y, x, self.cols)];

        let mut mirrors = vec![];

        let mut left_right = vec![];
        for y in 0..self.rows {
            for x in 0..self.cols / 2 {
                left_right.push(at(y, x)._eq(at(y, self.cols - 1 - x)));
            }
        }
        mirrors.push(and_all(ctx, &left_right));

        let mut top_bottom = vec![];
        for y in 0..self.rows / 2 {
            for x in 0..self.cols {
                top_bottom.push(at(y, x)._eq(at(self.rows - 1 - y, x)));
            }
        }
        mirrors.push(and_all(ctx, &top_bottom));

        if self.rows == self.cols {
            let mut main_diagonal = vec![];
            for y in 0..self.rows {
                for x in y..self.cols {
                    main_diagonal.push(at(y, x)._eq(at(x, y)));
                }
            }
            mirrors.push(and_all(ctx, &main_diagonal));

            let mut anti_diagonal = vec![];
            for y in 0..self.rows {
                for x in 0..self.cols.saturating_sub(y + 1) {
                    anti_diagonal
                        .push(at(y, x)._eq(at(self.rows - 1 - x, self.cols - 1 - y)));
                }
            }
            mirrors.push(and_all(ctx, &anti_diagonal));
        }

        or_all(ctx, &mirrors)
    }

    /// A wall between two allowed, existing tiles.
    pub fn standalone_wall(&self, i: usize, side: Side) -> Bool<'ctx> {
        match grid::neighbour(i, self.rows, self.cols, side) {
            Some(j) => and_all(
                self.ctx,
                &[
                    self.allowed[i].clone(),
                    self.allowed[j].clone(),
                    self.wall(i, side).clone(),
                ],
            ),
            None => Bool::from_bool(self.ctx, false),
        }
    }

    /// The wall variables (both faces) crossed by a path of adjacent
    /// tiles.
    pub fn walls_along_path(&self, path: &[usize]) -> Vec<Bool<'ctx>> {
        let mut walls = vec![];
        for window in path.windows(2) {
            let side = grid::shared_side(window[0], window[1], self.rows, self.cols)
                .expect("path tiles must be adjacent");
            walls.push(self.wall(window[0], side).clone());
            walls.push(self.wall(window[1], side.opposite()).clone());
        }
        walls
    }

    /// Pin the facts a partial world has already established.
    pub fn pin_partial(&self, tiles: &[SymTile]) -> Bool<'ctx> {
        let mut constraints = vec![];
        for (i, tile) in tiles.iter().enumerate() {
            if let Some(exist) = tile.exist {
                constraints.push(self.exist[i]._eq(&Bool::from_bool(self.ctx, exist)));
            }
            if let Some(allowed) = tile.allowed {
                constraints.push(self.allowed[i]._eq(&Bool::from_bool(self.ctx, allowed)));
            }
            for side in Side::ALL {
                if let Some(wall) = tile.wall(side) {
                    constraints.push(self.wall(i, side)._eq(&Bool::from_bool(self.ctx, wall)));
                }
            }
        }
        and_all(self.ctx, &constraints)
    }

    pub fn vars(&self) -> Vec<Dynamic<'ctx>> {
        let mut vars = crate::smt::solver::dynamics(&self.allowed);
        vars.extend(crate::smt::solver::dynamics(&self.exist));
        for wall in &self.walls {
            vars.extend(crate::smt::solver::dynamics(wall));
        }
        vars
    }

    pub fn decode(&self, model: &Model<'ctx>, i: usize) -> Tile {
        let mut walls = Walls::default();
        for side in Side::ALL {
            walls.set(side, eval_bool(model, self.wall(i, side)));
        }
        Tile::new(
            eval_bool(model, &self.exist[i]),
            eval_bool(model, &self.allowed[i]),
            walls,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::smt::solver::SmtSolver;
    use z3::Config;

    #[test]
    fn forbidden_tile_needs_a_separating_wall() {
        let config = Config::new();
        let ctx = Context::new(&config);
        let tiles = TileSmt::new(&ctx, 3, 3);

        let solver = SmtSolver::new(&ctx);
        solver.assert(&tiles.properties(false));
        for i in 0..9 {
            solver.assert(&tiles.exist[i]);
        }
        solver.assert(&tiles.allowed[4].not());
        solver.assert(&tiles.allowed[5]);
        // the wall between 4 and 5 follows
        solver.assert(&tiles.wall(4, Side::Right).not());
        assert!(!solver.is_sat());
    }

    #[test]
    fn walls_mirror_across_the_shared_face() {
        let config = Config::new();
        let ctx = Context::new(&config);
        let tiles = TileSmt::new(&ctx, 2, 2);

        let solver = SmtSolver::new(&ctx);
        solver.assert(&tiles.properties(false));
        solver.assert(tiles.wall(0, Side::Right));
        solver.assert(&tiles.wall(1, Side::Left).not());
        assert!(!solver.is_sat());
    }

    #[test]
    fn boundary_walls_are_impossible() {
        let config = Config::new();
        let ctx = Context::new(&config);
        let tiles = TileSmt::new(&ctx, 2, 2);

        let solver = SmtSolver::new(&ctx);
        solver.assert(&tiles.properties(false));
        solver.assert(tiles.wall(0, Side::Top));
        assert!(!solver.is_sat());
    }

    #[test]
    fn asymmetric_forbidden_subset_is_rejected_when_symmetry_is_on() {
        let config = Config::new();
        let ctx = Context::new(&config);
        let tiles = TileSmt::new(&ctx, 3, 3);

        let solver = SmtSolver::new(&ctx);
        solver.assert(&tiles.properties(true));
        for i in 0..9 {
            solver.assert(&tiles.exist[i]);
        }
        // {0, 1} forbidden clashes with every mirror once 2, 3, 6 and 8
        // stay allowed
        solver.assert(&tiles.allowed[0].not());
        solver.assert(&tiles.allowed[1].not());
        for i in [2, 3, 6, 8] {
            solver.assert(&tiles.allowed[i]);
        }
        assert!(!solver.is_sat());
    }

    #[test]
    fn diagonal_forbidden_corner_is_symmetric() {
        let config = Config::new();
        let ctx = Context::new(&config);
        let tiles = TileSmt::new(&ctx, 3, 3);

        let solver = SmtSolver::new(&ctx);
        solver.assert(&tiles.properties(true));
        for i in 0..9 {
            solver.assert(&tiles.exist[i]);
        }
        // a single forbidden corner lies on the main diagonal mirror
        solver.assert(&tiles.allowed[0].not());
        for i in [2, 6, 8] {
            solver.assert(&tiles.allowed[i]);
        }
        assert!(solver.is_sat());
    }

    #[test]
    fn pinned_partial_tiles_survive_into_the_model() {
        let config = Config::new();
        let ctx = Context::new(&config);
        let tiles = TileSmt::new(&ctx, 2, 2);

        let mut partial = vec![SymTile::default(); 4];
        partial[0].allowed = Some(true);
        partial[0].exist = Some(true);
        partial[0].set_wall(Side::Right, false);

        let solver = SmtSolver::new(&ctx);
        solver.assert(&tiles.properties(false));
        solver.assert(&tiles.pin_partial(&partial));

        let model = solver.solve().unwrap();
        let decoded = tiles.decode(&model, 0);
        assert!(decoded.allowed && decoded.exist);
        assert!(!decoded.walls.right);
    }
}
