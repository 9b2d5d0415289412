//! Turtle variables: one-hot position over the tiles, one-hot heading.

use crate::domain::grid;
use crate::domain::{Direction, Turtle};
use crate::smt::solver::{and_all, eval_bool, exactly_one};
use z3::ast::{Bool, Dynamic};
use z3::{Context, Model};

#[derive(Debug)]
pub struct TurtleSmt<'ctx> {
    ctx: &'ctx Context,
    pub position: Vec<Bool<'ctx>>,
    pub dir: Vec<Bool<'ctx>>,
}

impl<'ctx> TurtleSmt<'ctx> {
    pub fn new(ctx: &'ctx Context, ntiles: usize) -> Self {
        Self {
            ctx,
            position: (0..ntiles)
                .map(|i| Bool::new_const(ctx, format!("turtle__{i}")))
                .collect(),
            dir: (0..Direction::ALL.len())
                .map(|i| Bool::new_const(ctx, format!("dir__{i}")))
                .collect(),
        }
    }

    pub fn properties(&self) -> Bool<'ctx> {
        and_all(
            self.ctx,
            &[
                exactly_one(self.ctx, &self.position),
                exactly_one(self.ctx, &self.dir),
            ],
        )
    }

    /// Pin the known parts of a partial world's initial turtle.
    pub fn pin(&self, turtle: &Turtle, cols: usize) -> Bool<'ctx> {
        let i = grid::yx2i(turtle.y as usize, turtle.x as usize, cols);
        and_all(
            self.ctx,
            &[
                self.position[i].clone(),
                self.dir[turtle.dir.index()].clone(),
            ],
        )
    }

    pub fn vars(&self) -> Vec<Dynamic<'ctx>> {
        let mut vars = crate::smt::solver::dynamics(&self.position);
        vars.extend(crate::smt::solver::dynamics(&self.dir));
        vars
    }

    pub fn decode(&self, model: &Model<'ctx>, cols: usize) -> Turtle {
        let index = self
            .position
            .iter()
            .position(|var| eval_bool(model, var))
            .expect("one-hot position");
        let dir_index = self
            .dir
            .iter()
            .position(|var| eval_bool(model, var))
            .expect("one-hot direction");
        let (y, x) = grid::i2yx(index, cols);
        Turtle::new(y as i64, x as i64, Direction::ALL[dir_index])
    }
}
