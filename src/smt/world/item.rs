//! Item variables: per tile, one boolean per item name and per colour
//! (each family one-hot), plus an integer count. Specs are compiled
//! against these variables.

use crate::domain::{
    Cnf, Item, ItemColour, ItemName, Literal, LiteralAtom, MAX_ITEM_COUNT,
};
use crate::smt::solver::{
    and_all, at_least as at_least_bools, eval_bool, eval_int, exactly_one, or_all,
};
use crate::symexec::SymItem;
use strum::IntoEnumIterator;
use z3::ast::{Ast, Bool, Dynamic, Int};
use z3::{Context, Model};

#[derive(Debug)]
pub struct ItemSmt<'ctx> {
    ctx: &'ctx Context,
    ntiles: usize,
    names: Vec<(ItemName, Vec<Bool<'ctx>>)>,
    noname: Vec<Bool<'ctx>>,
    colours: Vec<(ItemColour, Vec<Bool<'ctx>>)>,
    nocolor: Vec<Bool<'ctx>>,
    count: Vec<Int<'ctx>>,
}

impl<'ctx> ItemSmt<'ctx> {
    pub fn new(ctx: &'ctx Context, ntiles: usize) -> Self {
        let name_vector = |name: &str| -> Vec<Bool<'ctx>> {
            (0..ntiles)
                .map(|i| Bool::new_const(ctx, format!("{name}__{i}")))
                .collect()
        };
        Self {
            ctx,
            ntiles,
            names: ItemName::all()
                .into_iter()
                .map(|name| (name, name_vector(&name.to_string())))
                .collect(),
            noname: name_vector("noname"),
            colours: ItemColour::iter()
                .map(|colour| (colour, name_vector(&colour.to_string())))
                .collect(),
            nocolor: name_vector("nocolor"),
            count: (0..ntiles)
                .map(|i| Int::new_const(ctx, format!("count__{i}")))
                .collect(),
        }
    }

    pub fn ntiles(&self) -> usize {
        self.ntiles
    }

    pub fn name_var(&self, name: ItemName, i: usize) -> &Bool<'ctx> {
        &self
            .names
            .iter()
            .find(|(n, _)| *n == name)
            .expect("every item name has variables")
            .1[i]
    }

    pub fn noname_var(&self, i: usize) -> &Bool<'ctx> {
        &self.noname[i]
    }

    pub fn colour_var(&self, colour: ItemColour, i: usize) -> &Bool<'ctx> {
        &self
            .colours
            .iter()
            .find(|(c, _)| *c == colour)
            .expect("every colour has variables")
            .1[i]
    }

    pub fn count_var(&self, i: usize) -> &Int<'ctx> {
        &self.count[i]
    }

    /// Base item properties: names one-hot, colours one-hot, `noname`,
    /// `nocolor` and `count = 0` coincide, and names imply their palettes
    /// and permitted counts.
    pub fn properties(&self) -> Bool<'ctx> {
        let ctx = self.ctx;
        let mut constraints = vec![];
        for i in 0..self.ntiles {
            let mut name_slots: Vec<Bool> = self
                .names
                .iter()
                .map(|(_, vars)| vars[i].clone())
                .collect();
            name_slots.push(self.noname[i].clone());
            constraints.push(exactly_one(ctx, &name_slots));

            let mut colour_slots: Vec<Bool> = self
                .colours
                .iter()
                .map(|(_, vars)| vars[i].clone())
                .collect();
            colour_slots.push(self.nocolor[i].clone());
            constraints.push(exactly_one(ctx, &colour_slots));

            let zero = Int::from_i64(ctx, 0);
            constraints.push(self.nocolor[i]._eq(&self.noname[i]));
            constraints.push(self.noname[i]._eq(&self.count[i]._eq(&zero)));
            constraints.push(self.count[i].ge(&zero));
            constraints.push(self.count[i].le(&Int::from_i64(ctx, MAX_ITEM_COUNT as i64)));

            for (name, vars) in &self.names {
                let palette: Vec<Bool> = ItemColour::palette(*name)
                    .iter()
                    .map(|colour| self.colour_var(*colour, i).clone())
                    .collect();
                constraints.push(vars[i].implies(&or_all(ctx, &palette)));

                let counts: Vec<Bool> = ItemColour::counts(*name)
                    .iter()
                    .map(|count| self.count[i]._eq(&Int::from_i64(ctx, *count as i64)))
                    .collect();
                constraints.push(vars[i].implies(&or_all(ctx, &counts)));
            }
        }
        and_all(ctx, &constraints)
    }

    pub fn set_empty(&self) -> Bool<'ctx> {
        let mut constraints: Vec<Bool> = self.noname.to_vec();
        constraints.extend(self.nocolor.iter().cloned());
        and_all(self.ctx, &constraints)
    }

    /// The formula of a single literal at tile `i`.
    pub fn literal(&self, literal: &Literal, i: usize) -> Bool<'ctx> {
        let positive = match &literal.atom {
            LiteralAtom::Name(name) => self.name_var(*name, i).clone(),
            LiteralAtom::Noname => self.noname[i].clone(),
            LiteralAtom::Colour(colour) => self.colour_var(*colour, i).clone(),
            LiteralAtom::Count(count) => {
                self.count[i]._eq(&Int::from_i64(self.ctx, *count as i64))
            }
            LiteralAtom::Line(_) => {
                // line literals live on marker edges, not on items
                Bool::from_bool(self.ctx, false)
            }
        };
        if literal.neg {
            positive.not()
        } else {
            positive
        }
    }

    pub fn clause_at(&self, clause: &[Literal], i: usize) -> Bool<'ctx> {
        let literals: Vec<Bool> = clause.iter().map(|l| self.literal(l, i)).collect();
        or_all(self.ctx, &literals)
    }

    /// Tile `i` satisfies the whole spec.
    pub fn cnf_at(&self, cnf: &Cnf, i: usize) -> Bool<'ctx> {
        let clauses: Vec<Bool> = cnf.iter().map(|c| self.clause_at(c, i)).collect();
        and_all(self.ctx, &clauses)
    }

    pub fn cnf_any(&self, cnf: &Cnf, locs: impl IntoIterator<Item = usize>) -> Bool<'ctx> {
        let tiles: Vec<Bool> = locs.into_iter().map(|i| self.cnf_at(cnf, i)).collect();
        or_all(self.ctx, &tiles)
    }

    pub fn cnf_exactly_one(&self, cnf: &Cnf, locs: impl IntoIterator<Item = usize>) -> Bool<'ctx> {
        let tiles: Vec<Bool> = locs.into_iter().map(|i| self.cnf_at(cnf, i)).collect();
        exactly_one(self.ctx, &tiles)
    }

    pub fn cnf_at_least(
        &self,
        cnf: &Cnf,
        locs: impl IntoIterator<Item = usize>,
        n: i32,
    ) -> Bool<'ctx> {
        let tiles: Vec<Bool> = locs.into_iter().map(|i| self.cnf_at(cnf, i)).collect();
        at_least_bools(self.ctx, &tiles, n)
    }

    /// Number of tiles satisfying the spec.
    pub fn cnf_count(&self, cnf: &Cnf, locs: impl IntoIterator<Item = usize>) -> Int<'ctx> {
        let tiles: Vec<Bool> = locs.into_iter().map(|i| self.cnf_at(cnf, i)).collect();
        crate::smt::solver::count_true(self.ctx, &tiles)
    }

    /// `Sum(count[i])` over the tiles of `locs` that satisfy the spec.
    pub fn cnf_weighted_count(
        &self,
        cnf: &Cnf,
        locs: impl IntoIterator<Item = usize>,
    ) -> Int<'ctx> {
        let zero = Int::from_i64(self.ctx, 0);
        let terms: Vec<Int> = locs
            .into_iter()
            .map(|i| self.cnf_at(cnf, i).ite(&self.count[i], &zero))
            .collect();
        crate::smt::solver::sum(self.ctx, &terms)
    }

    /// Pin the known attributes of a partial world's items.
    pub fn pin_partial(&self, items: &[SymItem]) -> Bool<'ctx> {
        let mut constraints = vec![];
        for (i, item) in items.iter().enumerate() {
            if let Some(name) = item.name {
                constraints.push(self.name_var(name, i).clone());
            }
            if let Some(colour) = item.colour {
                constraints.push(self.colour_var(colour, i).clone());
            }
            if let Some(count) = item.count {
                constraints
                    .push(self.count[i]._eq(&Int::from_i64(self.ctx, count as i64)));
            }
        }
        and_all(self.ctx, &constraints)
    }

    /// Pin every tile to exactly the given concrete items; used by the
    /// verification emulator.
    pub fn pin_concrete(&self, items: &[Option<Item>]) -> Bool<'ctx> {
        let mut constraints = vec![];
        for (i, slot) in items.iter().enumerate() {
            match slot {
                Some(item) => {
                    constraints.push(self.name_var(item.name, i).clone());
                    constraints.push(self.colour_var(item.colour, i).clone());
                    constraints
                        .push(self.count[i]._eq(&Int::from_i64(self.ctx, item.count as i64)));
                }
                None => constraints.push(self.noname[i].clone()),
            }
        }
        and_all(self.ctx, &constraints)
    }

    pub fn vars(&self) -> Vec<Dynamic<'ctx>> {
        let mut vars = vec![];
        for (_, vector) in &self.names {
            vars.extend(crate::smt::solver::dynamics(vector));
        }
        vars.extend(crate::smt::solver::dynamics(&self.noname));
        for (_, vector) in &self.colours {
            vars.extend(crate::smt::solver::dynamics(vector));
        }
        vars.extend(crate::smt::solver::dynamics(&self.nocolor));
        vars.extend(crate::smt::solver::dynamics(&self.count));
        vars
    }

    pub fn decode(&self, model: &Model<'ctx>, i: usize) -> Option<Item> {
        if eval_bool(model, &self.noname[i]) {
            return None;
        }
        let name = self
            .names
            .iter()
            .find(|(_, vars)| eval_bool(model, &vars[i]))
            .map(|(name, _)| *name)
            .expect("a named item has a true name variable");
        let colour = self
            .colours
            .iter()
            .find(|(_, vars)| eval_bool(model, &vars[i]))
            .map(|(colour, _)| *colour)
            .expect("a named item has a true colour variable");
        let count = eval_int(model, &self.count[i]) as u8;
        Some(Item::new(name, colour, count))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::smt::solver::SmtSolver;
    use serde_json::json;
    use z3::Config;

    fn red_strawberry_cnf() -> Cnf {
        crate::domain::Spec::from_value(&json!([
            [{"color": "red", "neg": 0}],
            [{"name": "strawberry", "neg": 0}]
        ]))
        .unwrap()
        .cnf
    }

    #[test]
    fn lemon_is_forced_yellow() {
        let config = Config::new();
        let ctx = Context::new(&config);
        let items = ItemSmt::new(&ctx, 1);

        let solver = SmtSolver::new(&ctx);
        solver.assert(&items.properties());
        solver.assert(items.name_var(ItemName::Lemon, 0));

        let model = solver.solve().unwrap();
        let item = items.decode(&model, 0).unwrap();
        assert_eq!(item.colour, ItemColour::Yellow);
        assert_eq!(item.count, 1);
    }

    #[test]
    fn purple_triangle_is_unsat() {
        let config = Config::new();
        let ctx = Context::new(&config);
        let items = ItemSmt::new(&ctx, 1);

        let solver = SmtSolver::new(&ctx);
        solver.assert(&items.properties());
        solver.assert(items.name_var(ItemName::Triangle, 0));
        solver.assert(items.colour_var(ItemColour::Purple, 0));
        assert!(!solver.is_sat());
    }

    #[test]
    fn cnf_exactly_one_places_a_single_item() {
        let config = Config::new();
        let ctx = Context::new(&config);
        let items = ItemSmt::new(&ctx, 4);

        let solver = SmtSolver::new(&ctx);
        solver.assert(&items.properties());
        solver.assert(&items.cnf_exactly_one(&red_strawberry_cnf(), 0..4));

        let model = solver.solve().unwrap();
        let found: Vec<Item> = (0..4).filter_map(|i| items.decode(&model, i)).collect();
        let strawberries: Vec<&Item> = found
            .iter()
            .filter(|item| item.name == ItemName::Strawberry && item.colour == ItemColour::Red)
            .collect();
        assert_eq!(strawberries.len(), 1);
    }

    #[test]
    fn pinned_concrete_world_fixes_the_model() {
        let config = Config::new();
        let ctx = Context::new(&config);
        let items = ItemSmt::new(&ctx, 2);

        let world_items = vec![
            Some(Item::new(ItemName::Circle, ItemColour::Pink, 1)),
            None,
        ];
        let solver = SmtSolver::new(&ctx);
        solver.assert(&items.properties());
        solver.assert(&items.pin_concrete(&world_items));

        let model = solver.solve().unwrap();
        assert_eq!(items.decode(&model, 0), world_items[0]);
        assert_eq!(items.decode(&model, 1), None);
    }

    #[test]
    fn negated_literal_excludes_the_colour() {
        let config = Config::new();
        let ctx = Context::new(&config);
        let items = ItemSmt::new(&ctx, 1);

        let cnf: Cnf = vec![
            vec![Literal::positive(LiteralAtom::Name(ItemName::Circle))],
            vec![Literal {
                atom: LiteralAtom::Colour(ItemColour::Red),
                neg: true,
            }],
        ];
        let solver = SmtSolver::new(&ctx);
        solver.assert(&items.properties());
        solver.assert(&items.cnf_at(&cnf, 0));
        solver.assert(items.colour_var(ItemColour::Red, 0));
        assert!(!solver.is_sat());
    }
}
