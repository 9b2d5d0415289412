//! Thin wrapper around the z3 solver: enum-sort tables, boolean helpers
//! and the model-blocker loop shared by every enumerating component.

use z3::ast::{Ast, Bool, Datatype, Dynamic, Int};
use z3::{Config, Context, FuncDecl, Model, SatResult, Solver, Sort, Symbol};

/// Wall-clock budget of a single solver call. A timed-out check reports
/// unknown, which the enumeration loops treat as a clean end-of-stream.
pub const SOLVER_TIMEOUT_MS: u32 = 10_000;

/// A context whose solver calls are bounded by [`SOLVER_TIMEOUT_MS`].
pub fn timed_context() -> Context {
    let mut config = Config::new();
    config.set_param_value("timeout", &SOLVER_TIMEOUT_MS.to_string());
    Context::new(&config)
}

/// A finite sort together with its named constant values. Mirrors the
/// `EnumSort` style of solver encodings: comparisons go through solver
/// equality, never through language-level equality.
#[derive(Debug)]
pub struct EnumSort<'ctx> {
    pub sort: Sort<'ctx>,
    names: Vec<&'static str>,
    values: Vec<Dynamic<'ctx>>,
}

impl<'ctx> EnumSort<'ctx> {
    pub fn new(ctx: &'ctx Context, name: &str, variants: &[&'static str]) -> Self {
        let symbols: Vec<Symbol> = variants
            .iter()
            .map(|variant| Symbol::String((*variant).to_owned()))
            .collect();
        let (sort, constructors, _testers): (Sort, Vec<FuncDecl>, Vec<FuncDecl>) =
            Sort::enumeration(ctx, Symbol::String(name.to_owned()), &symbols);
        let values = constructors
            .iter()
            .map(|constructor| constructor.apply(&[]))
            .collect();
        Self {
            sort,
            names: variants.to_vec(),
            values,
        }
    }

    /// The constant value named `name`; panics on unknown names, which are
    /// programming errors.
    pub fn value(&self, name: &str) -> &Dynamic<'ctx> {
        let index = self
            .names
            .iter()
            .position(|n| *n == name)
            .unwrap_or_else(|| panic!("unknown enum value `{name}`"));
        &self.values[index]
    }

    pub fn fresh_const(&self, ctx: &'ctx Context, name: &str) -> Dynamic<'ctx> {
        Datatype::new_const(ctx, name, &self.sort).into()
    }

    /// Map an evaluated model value back to its variant name.
    pub fn decode(&self, value: &Dynamic<'ctx>) -> &'static str {
        self.values
            .iter()
            .position(|v| v == value)
            .map(|index| self.names[index])
            .unwrap_or_else(|| panic!("model value `{value}` is not of sort"))
    }
}

pub fn and_all<'ctx>(ctx: &'ctx Context, items: &[Bool<'ctx>]) -> Bool<'ctx> {
    let refs: Vec<&Bool> = items.iter().collect();
    Bool::and(ctx, &refs)
}

pub fn or_all<'ctx>(ctx: &'ctx Context, items: &[Bool<'ctx>]) -> Bool<'ctx> {
    let refs: Vec<&Bool> = items.iter().collect();
    Bool::or(ctx, &refs)
}

pub fn exactly_one<'ctx>(ctx: &'ctx Context, items: &[Bool<'ctx>]) -> Bool<'ctx> {
    let weighted: Vec<(&Bool, i32)> = items.iter().map(|item| (item, 1)).collect();
    Bool::pb_eq(ctx, &weighted, 1)
}

pub fn at_most<'ctx>(ctx: &'ctx Context, items: &[Bool<'ctx>], k: i32) -> Bool<'ctx> {
    let weighted: Vec<(&Bool, i32)> = items.iter().map(|item| (item, 1)).collect();
    Bool::pb_le(ctx, &weighted, k)
}

pub fn at_least<'ctx>(ctx: &'ctx Context, items: &[Bool<'ctx>], k: i32) -> Bool<'ctx> {
    let weighted: Vec<(&Bool, i32)> = items.iter().map(|item| (item, 1)).collect();
    Bool::pb_ge(ctx, &weighted, k)
}

/// `Sum(if b then 1 else 0)` over a slice of booleans.
pub fn count_true<'ctx>(ctx: &'ctx Context, items: &[Bool<'ctx>]) -> Int<'ctx> {
    let zero = Int::from_i64(ctx, 0);
    let one = Int::from_i64(ctx, 1);
    let terms: Vec<Int> = items.iter().map(|item| item.ite(&one, &zero)).collect();
    sum(ctx, &terms)
}

pub fn sum<'ctx>(ctx: &'ctx Context, items: &[Int<'ctx>]) -> Int<'ctx> {
    if items.is_empty() {
        return Int::from_i64(ctx, 0);
    }
    let refs: Vec<&Int> = items.iter().collect();
    Int::add(ctx, &refs)
}

/// The solver handle used by every enumerating component. Infeasibility is
/// a clean end-of-stream here, never an error.
pub struct SmtSolver<'ctx> {
    pub ctx: &'ctx Context,
    solver: Solver<'ctx>,
}

impl<'ctx> SmtSolver<'ctx> {
    pub fn new(ctx: &'ctx Context) -> Self {
        Self {
            ctx,
            solver: Solver::new(ctx),
        }
    }

    pub fn assert(&self, constraint: &Bool<'ctx>) {
        self.solver.assert(constraint);
    }

    /// One model of the current assertions, or `None` on unsat/unknown.
    pub fn solve(&self) -> Option<Model<'ctx>> {
        match self.solver.check() {
            SatResult::Sat => self.solver.get_model(),
            SatResult::Unsat | SatResult::Unknown => None,
        }
    }

    pub fn is_sat(&self) -> bool {
        self.solver.check() == SatResult::Sat
    }

    /// Add the model blocker `not(v1 = c1 and ... and vn = cn)` so the
    /// next query yields a different model.
    pub fn block_model(&self, model: &Model<'ctx>, vars: &[Dynamic<'ctx>]) {
        let same: Vec<Bool> = vars
            .iter()
            .map(|var| {
                let value = model
                    .eval(var, true)
                    .expect("model completion always yields a value");
                var._eq(&value)
            })
            .collect();
        self.assert(&and_all(self.ctx, &same).not());
    }

    /// Load SMT-LIB2 text into this solver's assertion set.
    pub fn assert_smt2(&self, text: &str) {
        self.solver.from_string(text);
    }

    /// Serialise the current assertion set as SMT-LIB2 text.
    pub fn to_smt2(&self) -> String {
        self.solver.to_string()
    }

    pub fn assertions(&self) -> Vec<Bool<'ctx>> {
        // `Solver::get_assertions` under-annotates its return lifetime as
        // tied to `&self` rather than `'ctx`, even though the returned
        // `Bool`s are built from `Solver`'s own `&'ctx Context` field and
        // are genuinely valid for `'ctx`. Correct the annotation.
        self.solver
            .get_assertions()
            .into_iter()
            .map(|assertion| unsafe { std::mem::transmute::<Bool<'_>, Bool<'ctx>>(assertion) })
            .collect()
    }
}

pub fn eval_bool<'ctx>(model: &Model<'ctx>, var: &Bool<'ctx>) -> bool {
    model
        .eval(var, true)
        .and_then(|value| value.as_bool())
        .expect("boolean model value")
}

pub fn eval_int<'ctx>(model: &Model<'ctx>, var: &Int<'ctx>) -> i64 {
    model
        .eval(var, true)
        .and_then(|value| value.as_i64())
        .expect("integer model value")
}

pub fn eval_enum<'ctx>(
    model: &Model<'ctx>,
    sort: &EnumSort<'ctx>,
    var: &Dynamic<'ctx>,
) -> &'static str {
    let value = model.eval(var, true).expect("enum model value");
    sort.decode(&value)
}

pub fn dynamics<'ctx, A: Ast<'ctx>>(vars: &[A]) -> Vec<Dynamic<'ctx>> {
    vars.iter().map(|var| Dynamic::from_ast(var)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use z3::Config;

    #[test]
    fn enum_sort_round_trips_through_a_model() {
        let config = Config::new();
        let ctx = Context::new(&config);
        let colours = EnumSort::new(&ctx, "TestColour", &["red", "green", "blue"]);

        let var = colours.fresh_const(&ctx, "c");
        let solver = SmtSolver::new(&ctx);
        solver.assert(&var._eq(colours.value("green")));

        let model = solver.solve().unwrap();
        assert_eq!(eval_enum(&model, &colours, &var), "green");
    }

    #[test]
    fn model_blocking_enumerates_all_values() {
        let config = Config::new();
        let ctx = Context::new(&config);
        let colours = EnumSort::new(&ctx, "TestColour2", &["red", "green", "blue"]);

        let var = colours.fresh_const(&ctx, "c");
        let solver = SmtSolver::new(&ctx);

        let mut seen = vec![];
        while let Some(model) = solver.solve() {
            seen.push(eval_enum(&model, &colours, &var));
            solver.block_model(&model, &[var.clone()]);
        }
        seen.sort_unstable();
        assert_eq!(seen, vec!["blue", "green", "red"]);
    }

    #[test]
    fn exactly_one_rules_out_pairs() {
        let config = Config::new();
        let ctx = Context::new(&config);
        let a = Bool::new_const(&ctx, "a");
        let b = Bool::new_const(&ctx, "b");

        let solver = SmtSolver::new(&ctx);
        solver.assert(&exactly_one(&ctx, &[a.clone(), b.clone()]));
        solver.assert(&a);
        solver.assert(&b);
        assert!(!solver.is_sat());
    }

    #[test]
    fn count_true_counts() {
        let config = Config::new();
        let ctx = Context::new(&config);
        let items: Vec<Bool> = (0..4).map(|i| Bool::new_const(&ctx, format!("x{i}"))).collect();

        let solver = SmtSolver::new(&ctx);
        solver.assert(&items[0]);
        solver.assert(&items[2]);
        solver.assert(&items[1].not());
        solver.assert(&items[3].not());
        solver.assert(&count_true(&ctx, &items)._eq(&Int::from_i64(&ctx, 2)));
        assert!(solver.is_sat());
    }
}
