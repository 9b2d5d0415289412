//! Marker variables: per tile, a boolean and a colour for each of the
//! four faces, mirrored across shared faces like walls.

use crate::domain::grid::{self, Side};
use crate::domain::{MarkerColour, MarkerGrid};
use crate::smt::solver::{and_all, eval_bool, EnumSort};
use std::str::FromStr;
use z3::ast::{Ast, Bool, Dynamic};
use z3::{Context, Model};

pub const NOCOLOR: &str = "nocolor";

/// The `MarkerColor` enum sort: the six drawable colours plus `nocolor`.
pub fn marker_colour_sort<'ctx>(ctx: &'ctx Context) -> EnumSort<'ctx> {
    EnumSort::new(
        ctx,
        "MarkerColor",
        &["red", "green", "blue", "black", "white", "yellow", "nocolor"],
    )
}

#[derive(Debug)]
pub struct MarkerSmt<'ctx> {
    ctx: &'ctx Context,
    rows: usize,
    cols: usize,
    pub colour_sort: EnumSort<'ctx>,
    flags: [Vec<Bool<'ctx>>; 4],
    colours: [Vec<Dynamic<'ctx>>; 4],
}

fn side_tag(side: Side) -> &'static str {
    match side {
        Side::Top => "topM",
        Side::Left => "leftM",
        Side::Right => "rightM",
        Side::Bottom => "bottomM",
    }
}

impl<'ctx> MarkerSmt<'ctx> {
    pub fn new(ctx: &'ctx Context, rows: usize, cols: usize) -> Self {
        let ntiles = rows * cols;
        let colour_sort = marker_colour_sort(ctx);
        let flags = Side::ALL.map(|side| {
            (0..ntiles)
                .map(|i| Bool::new_const(ctx, format!("{}__{i}", side_tag(side))))
                .collect()
        });
        let colours = Side::ALL.map(|side| {
            (0..ntiles)
                .map(|i| colour_sort.fresh_const(ctx, &format!("{}_color__{i}", side_tag(side))))
                .collect()
        });
        Self {
            ctx,
            rows,
            cols,
            colour_sort,
            flags,
            colours,
        }
    }

    pub fn flag(&self, i: usize, side: Side) -> &Bool<'ctx> {
        &self.flags[side.index()][i]
    }

    pub fn colour(&self, i: usize, side: Side) -> &Dynamic<'ctx> {
        &self.colours[side.index()][i]
    }

    fn ntiles(&self) -> usize {
        self.rows * self.cols
    }

    /// A marker exists exactly when its colour is not `nocolor`; adjacent
    /// tiles agree on their shared face; boundary faces carry no marker.
    pub fn properties(&self) -> Bool<'ctx> {
        let ctx = self.ctx;
        let nocolor = self.colour_sort.value(NOCOLOR);
        let mut constraints = vec![];
        for i in 0..self.ntiles() {
            for side in Side::ALL {
                constraints
                    .push(self.flag(i, side)._eq(&self.colour(i, side)._eq(nocolor).not()));
                match grid::neighbour(i, self.rows, self.cols, side) {
                    Some(j) => {
                        constraints.push(
                            self.flag(j, side.opposite()).implies(self.flag(i, side)),
                        );
                        constraints.push(
                            self.colour(j, side.opposite())._eq(self.colour(i, side)),
                        );
                    }
                    None => constraints.push(self.flag(i, side).not()),
                }
            }
        }
        and_all(ctx, &constraints)
    }

    pub fn set_empty(&self) -> Bool<'ctx> {
        let mut constraints = vec![];
        for flags in &self.flags {
            for flag in flags {
                constraints.push(flag.not());
            }
        }
        and_all(self.ctx, &constraints)
    }

    /// Pin every face to exactly the drawn markers of a partial world's
    /// run: drawn faces carry their colour, every other face is empty.
    pub fn pin_drawn(&self, drawn: &MarkerGrid) -> Bool<'ctx> {
        let mut constraints = vec![];
        for i in 0..self.ntiles() {
            for side in Side::ALL {
                match drawn.get(i).get(side) {
                    Some(colour) => {
                        constraints.push(self.flag(i, side).clone());
                        constraints.push(
                            self.colour(i, side)
                                ._eq(self.colour_sort.value(&colour.to_string())),
                        );
                    }
                    None => constraints.push(self.flag(i, side).not()),
                }
            }
        }
        and_all(self.ctx, &constraints)
    }

    pub fn vars(&self) -> Vec<Dynamic<'ctx>> {
        let mut vars = vec![];
        for flags in &self.flags {
            vars.extend(crate::smt::solver::dynamics(flags));
        }
        for colours in &self.colours {
            vars.extend(colours.iter().cloned());
        }
        vars
    }

    pub fn decode(&self, model: &Model<'ctx>) -> MarkerGrid {
        let mut grid = MarkerGrid::new(self.rows, self.cols);
        for i in 0..self.ntiles() {
            for side in Side::ALL {
                if eval_bool(model, self.flag(i, side)) {
                    let name = crate::smt::solver::eval_enum(
                        model,
                        &self.colour_sort,
                        self.colour(i, side),
                    );
                    let colour =
                        MarkerColour::from_str(name).expect("marker colour variant");
                    grid.set(i, side, colour);
                }
            }
        }
        grid
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::smt::solver::SmtSolver;
    use z3::Config;

    #[test]
    fn marked_face_mirrors_onto_the_neighbour() {
        let config = Config::new();
        let ctx = Context::new(&config);
        let markers = MarkerSmt::new(&ctx, 1, 2);

        let solver = SmtSolver::new(&ctx);
        solver.assert(&markers.properties());
        solver.assert(
            &markers
                .colour(0, Side::Right)
                ._eq(markers.colour_sort.value("red")),
        );

        let model = solver.solve().unwrap();
        let grid = markers.decode(&model);
        assert_eq!(grid.get(0).get(Side::Right), Some(MarkerColour::Red));
        assert_eq!(grid.get(1).get(Side::Left), Some(MarkerColour::Red));
    }

    #[test]
    fn boundary_faces_cannot_be_marked() {
        let config = Config::new();
        let ctx = Context::new(&config);
        let markers = MarkerSmt::new(&ctx, 1, 2);

        let solver = SmtSolver::new(&ctx);
        solver.assert(&markers.properties());
        solver.assert(markers.flag(0, Side::Top));
        assert!(!solver.is_sat());
    }

    #[test]
    fn pinned_drawing_round_trips() {
        let config = Config::new();
        let ctx = Context::new(&config);
        let markers = MarkerSmt::new(&ctx, 2, 2);

        let mut drawn = MarkerGrid::new(2, 2);
        drawn.mark_edge(0, 1, MarkerColour::Blue);

        let solver = SmtSolver::new(&ctx);
        solver.assert(&markers.properties());
        solver.assert(&markers.pin_drawn(&drawn));

        let model = solver.solve().unwrap();
        assert_eq!(markers.decode(&model), drawn);
    }
}
