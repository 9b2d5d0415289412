//! The combined world encoding: all component variables, the cross
//! constraints between them, the two world kinds (item worlds and marker
//! worlds for drawing tasks), the reference-similarity constraints and
//! model decoding.

use crate::domain::grid::Side;
use crate::domain::{ItemClass, ItemColour, ItemName, World, WorldStats};
use crate::smt::solver::{and_all, at_least, at_most, count_true, exactly_one, or_all};
use crate::smt::world::{ItemSmt, MarkerSmt, TileSmt, TurtleSmt};
use crate::symexec::SymWorld;
use z3::ast::{Ast, Bool, Dynamic, Int};
use z3::{Context, Model};

/// Permitted relative deviation from the reference wall and forbidden
/// ratios during synthesis.
pub const WALL_RATIO_VARIATION: f64 = 0.5;
pub const FORBIDDEN_RATIO_VARIATION: f64 = 0.5;

#[derive(Debug)]
pub struct WorldSmt<'ctx> {
    pub ctx: &'ctx Context,
    pub rows: usize,
    pub cols: usize,
    pub turtle: TurtleSmt<'ctx>,
    pub items: ItemSmt<'ctx>,
    pub tiles: TileSmt<'ctx>,
    pub markers: MarkerSmt<'ctx>,
}

impl<'ctx> WorldSmt<'ctx> {
    pub fn new(ctx: &'ctx Context, rows: usize, cols: usize) -> Self {
        Self {
            ctx,
            rows,
            cols,
            turtle: TurtleSmt::new(ctx, rows * cols),
            items: ItemSmt::new(ctx, rows * cols),
            tiles: TileSmt::new(ctx, rows, cols),
            markers: MarkerSmt::new(ctx, rows, cols),
        }
    }

    pub fn ntiles(&self) -> usize {
        self.rows * self.cols
    }

    /// Everything that holds for any synthesised world, independent of the
    /// partial world being completed.
    pub fn base_properties(&self, symmetric: bool) -> Bool<'ctx> {
        and_all(
            self.ctx,
            &[
                self.turtle.properties(),
                self.items.properties(),
                self.tiles.properties(symmetric),
                self.markers.properties(),
                self.turtle_tile_properties(),
                self.tile_item_properties(),
            ],
        )
    }

    /// The turtle's tile carries no item, is allowed, and has an open
    /// side.
    fn turtle_tile_properties(&self) -> Bool<'ctx> {
        let ctx = self.ctx;
        let mut constraints = vec![];
        for i in 0..self.ntiles() {
            let walled_in: Vec<Bool> = Side::ALL
                .map(|side| self.tiles.wall(i, side).clone())
                .to_vec();
            constraints.push(
                self.turtle.position[i].implies(&and_all(
                    ctx,
                    &[
                        self.items.noname_var(i).clone(),
                        self.tiles.allowed[i].clone(),
                        and_all(ctx, &walled_in).not(),
                    ],
                )),
            );
        }
        and_all(ctx, &constraints)
    }

    /// Forbidden tiles carry no item; an item tile has an open side.
    fn tile_item_properties(&self) -> Bool<'ctx> {
        let ctx = self.ctx;
        let mut constraints = vec![];
        for i in 0..self.ntiles() {
            constraints.push(
                self.tiles.allowed[i]
                    .not()
                    .implies(self.items.noname_var(i)),
            );
            let walled_in: Vec<Bool> = Side::ALL
                .map(|side| self.tiles.wall(i, side).clone())
                .to_vec();
            constraints.push(
                self.items
                    .noname_var(i)
                    .not()
                    .implies(&and_all(ctx, &walled_in).not()),
            );
        }
        and_all(ctx, &constraints)
    }

    /// Properties of item-based worlds: no markers, every tile exists,
    /// reference-similar walls, forbidden areas and items, plus the
    /// externally supplied reachability formula.
    pub fn item_world_properties(
        &self,
        reference: &WorldStats,
        reachability: Bool<'ctx>,
    ) -> Bool<'ctx> {
        let all_exist: Vec<Bool> = self.tiles.exist.to_vec();
        and_all(
            self.ctx,
            &[
                self.markers.set_empty(),
                and_all(self.ctx, &all_exist),
                self.wall_ratio_properties(reference, WALL_RATIO_VARIATION),
                self.forbidden_ratio_properties(reference, FORBIDDEN_RATIO_VARIATION),
                self.item_ratio_properties(reference),
                self.similar_item_properties(reference),
                reachability,
            ],
        )
    }

    /// Properties of marker-based (drawing) worlds: no items, no walls on
    /// existing tiles.
    pub fn marker_world_properties(&self) -> Bool<'ctx> {
        let ctx = self.ctx;
        let mut constraints = vec![self.items.set_empty()];
        for i in 0..self.ntiles() {
            for side in Side::ALL {
                constraints.push(
                    self.tiles.exist[i].implies(&self.tiles.wall(i, side).not()),
                );
            }
        }
        and_all(ctx, &constraints)
    }

    /// Pin everything the symbolic execution established. Marker worlds
    /// additionally pin the drawn edges exactly; item worlds leave the
    /// marker grid to `item_world_properties`.
    pub fn pin_partial(&self, pworld: &SymWorld, marker_world: bool) -> Bool<'ctx> {
        let mut constraints = vec![
            self.turtle.pin(&pworld.init_turtle, self.cols),
            self.tiles.pin_partial(&pworld.tiles),
            self.items.pin_partial(&pworld.items),
        ];
        if marker_world {
            constraints.push(self.markers.pin_drawn(&pworld.drawn_markers));
        }
        and_all(self.ctx, &constraints)
    }

    fn item_count(&self) -> Int<'ctx> {
        let named: Vec<Bool> = (0..self.ntiles())
            .map(|i| self.items.noname_var(i).not())
            .collect();
        count_true(self.ctx, &named)
    }

    fn wall_count(&self) -> Int<'ctx> {
        let mut walls = vec![];
        for i in 0..self.ntiles() {
            for side in Side::ALL {
                walls.push(self.tiles.wall(i, side).clone());
            }
        }
        count_true(self.ctx, &walls)
    }

    /// Grown grids may hold one extra item per added row or column; equal
    /// or smaller grids keep the reference count.
    fn item_ratio_properties(&self, reference: &WorldStats) -> Bool<'ctx> {
        let ctx = self.ctx;
        let n_items = self.item_count();
        let ref_tiles = reference.rows * reference.cols;
        if self.ntiles() <= ref_tiles {
            n_items._eq(&Int::from_i64(ctx, reference.n_items as i64))
        } else {
            let growth =
                self.rows.max(self.cols) as i64 - reference.rows.max(reference.cols) as i64;
            and_all(
                ctx,
                &[
                    n_items.le(&Int::from_i64(ctx, reference.n_items as i64 + growth)),
                    n_items.ge(&Int::from_i64(ctx, reference.n_items as i64)),
                ],
            )
        }
    }

    fn wall_ratio_properties(&self, reference: &WorldStats, variation: f64) -> Bool<'ctx> {
        let ctx = self.ctx;
        let ref_tiles = (reference.rows * reference.cols) as f64;
        let ref_ratio = reference.n_walls as f64 / ref_tiles;
        let n_walls = self.wall_count();

        if reference.n_walls == 0 {
            if self.ntiles() <= reference.rows * reference.cols {
                n_walls._eq(&Int::from_i64(ctx, 0))
            } else {
                Bool::from_bool(ctx, true)
            }
        } else {
            let upper = (ref_ratio * (1.0 + variation) * self.ntiles() as f64).ceil() as i64;
            and_all(
                ctx,
                &[
                    n_walls.le(&Int::from_i64(ctx, upper)),
                    n_walls.gt(&Int::from_i64(ctx, 0)),
                ],
            )
        }
    }

    fn forbidden_ratio_properties(&self, reference: &WorldStats, variation: f64) -> Bool<'ctx> {
        let ctx = self.ctx;
        let ref_tiles = (reference.rows * reference.cols) as f64;
        let ref_ratio = reference.n_forbidden as f64 / ref_tiles;
        let forbidden: Vec<Bool> = (0..self.ntiles())
            .map(|i| self.tiles.allowed[i].not())
            .collect();
        let n_forbidden = count_true(ctx, &forbidden);

        let mut constraints = vec![];
        if reference.n_forbidden == 0 {
            if self.ntiles() <= reference.rows * reference.cols {
                for i in 0..self.ntiles() {
                    constraints
                        .push(self.tiles.exist[i].implies(&self.tiles.allowed[i]));
                }
            }
        } else {
            let upper = (ref_ratio * (1.0 + variation) * self.ntiles() as f64).ceil() as i64;
            let lower = (ref_ratio * (1.0 - variation) * self.ntiles() as f64).floor() as i64;
            constraints.push(n_forbidden.le(&Int::from_i64(ctx, upper)));
            constraints.push(n_forbidden.ge(&Int::from_i64(ctx, lower)));
        }
        if reference.n_non_existent == 0 {
            constraints.extend(self.tiles.exist.iter().cloned());
        }
        and_all(ctx, &constraints)
    }

    /// Restrict items to the shapes, classes, colours and counts the
    /// reference world exercises.
    fn similar_item_properties(&self, reference: &WorldStats) -> Bool<'ctx> {
        let ctx = self.ctx;
        let mut constraints = vec![];

        for class in [ItemClass::Fruit, ItemClass::Shape, ItemClass::Char] {
            if reference.item_classes_used.contains(&class) {
                continue;
            }
            for name in ItemName::all() {
                if name.class() == class {
                    for i in 0..self.ntiles() {
                        constraints.push(self.items.name_var(name, i).not());
                    }
                }
            }
        }

        if !reference.use_count {
            let one = Int::from_i64(ctx, 1);
            for i in 0..self.ntiles() {
                constraints.push(self.items.count_var(i).le(&one));
            }
        }

        let shape_used = |name: ItemName| -> Bool<'ctx> {
            let tiles: Vec<Bool> = (0..self.ntiles())
                .map(|i| self.items.name_var(name, i).clone())
                .collect();
            or_all(ctx, &tiles)
        };
        let colour_used = |colour: ItemColour| -> Bool<'ctx> {
            let tiles: Vec<Bool> = (0..self.ntiles())
                .map(|i| self.items.colour_var(colour, i).clone())
                .collect();
            or_all(ctx, &tiles)
        };

        // colour-heavy references stay on a single shape kind
        if reference.colours_used.len() >= 4 {
            let shapes: Vec<Bool> = ItemName::shapes().map(shape_used).to_vec();
            constraints.push(exactly_one(ctx, &shapes));
        }

        // shape-heavy references use exactly three near-balanced colours
        if reference.shapes_used.len() >= 3 {
            use strum::IntoEnumIterator;
            let colours: Vec<Bool> = ItemColour::iter().map(colour_used).collect();
            constraints.push(at_most(ctx, &colours, 3));
            constraints.push(at_least(ctx, &colours, 3));

            let colour_total = |colour: ItemColour| -> Int<'ctx> {
                let tiles: Vec<Bool> = (0..self.ntiles())
                    .map(|i| self.items.colour_var(colour, i).clone())
                    .collect();
                count_true(ctx, &tiles)
            };
            let reds = colour_total(ItemColour::Red);
            let greens = colour_total(ItemColour::Green);
            let blues = colour_total(ItemColour::Blue);
            let one = Int::from_i64(ctx, 1);
            for (a, b) in [(&reds, &greens), (&greens, &reds), (&blues, &reds), (&reds, &blues)]
            {
                constraints.push(Int::sub(ctx, &[a, b]).le(&one));
            }

            let circle_palette = [ItemColour::Red, ItemColour::Green, ItemColour::Blue];
            for i in 0..self.ntiles() {
                let palette: Vec<Bool> = circle_palette
                    .map(|colour| self.items.colour_var(colour, i).clone())
                    .to_vec();
                constraints.push(
                    self.items
                        .name_var(ItemName::Circle, i)
                        .implies(&or_all(ctx, &palette)),
                );
            }
        }

        and_all(ctx, &constraints)
    }

    pub fn vars(&self) -> Vec<Dynamic<'ctx>> {
        let mut vars = self.turtle.vars();
        vars.extend(self.items.vars());
        vars.extend(self.tiles.vars());
        vars.extend(self.markers.vars());
        vars
    }

    pub fn decode(&self, model: &Model<'ctx>) -> World {
        let tiles = (0..self.ntiles())
            .map(|i| self.tiles.decode(model, i))
            .collect();
        let items = (0..self.ntiles())
            .map(|i| self.items.decode(model, i))
            .collect();
        World::new(
            self.rows,
            self.cols,
            self.turtle.decode(model, self.cols),
            tiles,
            items,
            self.markers.decode(model),
        )
    }
}
