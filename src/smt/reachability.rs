//! The reachability encoding: for every tile pair, connectivity is
//! approximated as "at least one of the k shortest simple paths between
//! them carries no wall", and the allowed-partition is forced to coincide
//! with the wall-induced partition. The encoding is expensive to build, so
//! its SMT-LIB2 text is memoised in memory and cached on disk keyed by
//! `(rows, cols, k)`.

use crate::smt::graph::GridGraph;
use crate::smt::solver::{and_all, exactly_one, or_all, SmtSolver};
use crate::smt::world::TileSmt;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, warn};
use z3::ast::Bool;
use z3::Context;

pub const DEFAULT_K_SHORTEST_PATHS: usize = 100;

static TEXT_CACHE: Lazy<Mutex<HashMap<(usize, usize, usize), String>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

pub fn cache_file_name(rows: usize, cols: usize, k: usize) -> String {
    format!("reachability_{rows}x{cols}_{k}.smt2")
}

/// The reachability formula for this grid size, from the fastest source
/// available: the in-memory memo, the on-disk cache, or a fresh
/// computation (which then populates both). Cache I/O failures fall back
/// to computation and are never fatal.
pub fn reachability_formula<'ctx>(
    ctx: &'ctx Context,
    tiles: &TileSmt<'ctx>,
    rows: usize,
    cols: usize,
    k: usize,
    cache_dir: Option<&Path>,
) -> Bool<'ctx> {
    let key = (rows, cols, k);

    if let Some(text) = TEXT_CACHE.lock().expect("cache lock").get(&key) {
        return parse_formula(ctx, text);
    }

    if let Some(dir) = cache_dir {
        let path = dir.join(cache_file_name(rows, cols, k));
        match fs::read_to_string(&path) {
            Ok(text) => {
                debug!(path = %path.display(), "loaded reachability cache");
                let formula = parse_formula(ctx, &text);
                TEXT_CACHE.lock().expect("cache lock").insert(key, text);
                return formula;
            }
            Err(error) if error.kind() != std::io::ErrorKind::NotFound => {
                warn!(path = %path.display(), %error, "reachability cache unreadable, recomputing");
            }
            Err(_) => {}
        }
    }

    let formula = compute_formula(ctx, tiles, rows, cols, k);
    let text = serialise_formula(ctx, &formula);
    if let Some(dir) = cache_dir {
        if let Err(error) = write_atomically(dir, &cache_file_name(rows, cols, k), &text) {
            warn!(%error, "failed to persist reachability cache");
        }
    }
    TEXT_CACHE.lock().expect("cache lock").insert(key, text);
    formula
}

fn parse_formula<'ctx>(ctx: &'ctx Context, text: &str) -> Bool<'ctx> {
    let scratch = SmtSolver::new(ctx);
    scratch.assert_smt2(text);
    and_all(ctx, &scratch.assertions())
}

fn serialise_formula<'ctx>(ctx: &'ctx Context, formula: &Bool<'ctx>) -> String {
    let scratch = SmtSolver::new(ctx);
    scratch.assert(formula);
    scratch.to_smt2()
}

/// Writers use create-then-rename so that readers never observe a torn
/// file.
fn write_atomically(dir: &Path, name: &str, text: &str) -> std::io::Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let mut file = tempfile::NamedTempFile::new_in(dir)?;
    file.write_all(text.as_bytes())?;
    let target = dir.join(name);
    file.persist(&target)
        .map_err(|persist| persist.error)?;
    Ok(target)
}

fn compute_formula<'ctx>(
    ctx: &'ctx Context,
    tiles: &TileSmt<'ctx>,
    rows: usize,
    cols: usize,
    k: usize,
) -> Bool<'ctx> {
    let graph = GridGraph::new(rows, cols);
    let ntiles = rows * cols;
    let mut constraints = vec![];

    for i in 0..ntiles {
        for j in i + 1..ntiles {
            let paths = graph.k_shortest_simple_paths(i, j, k);
            let blocked_per_path: Vec<Bool> = paths
                .iter()
                .map(|path| or_all(ctx, &tiles.walls_along_path(path)))
                .collect();
            // connected iff some sampled path is wall-free
            let connected = and_all(ctx, &blocked_per_path).not();

            let both_allowed =
                and_all(ctx, &[tiles.allowed[i].clone(), tiles.allowed[j].clone()]);
            let split =
                exactly_one(ctx, &[tiles.allowed[i].clone(), tiles.allowed[j].clone()]);
            let both_forbidden = and_all(
                ctx,
                &[tiles.allowed[i].not(), tiles.allowed[j].not()],
            );

            constraints.push(both_allowed.implies(&connected));
            constraints.push(split.implies(&connected.not()));
            constraints.push(
                connected.implies(&or_all(ctx, &[both_allowed.clone(), both_forbidden])),
            );
            constraints.push(
                and_all(ctx, &[tiles.allowed[i].clone(), connected.clone()])
                    .implies(&tiles.allowed[j]),
            );
            constraints.push(
                and_all(ctx, &[tiles.allowed[j].clone(), connected.clone()])
                    .implies(&tiles.allowed[i]),
            );
        }
    }
    and_all(ctx, &constraints)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::smt::solver::eval_bool;
    use serial_test::serial;
    use z3::Config;

    // a small k keeps the tests fast; 3x3 has few simple paths anyway
    const TEST_K: usize = 20;

    #[test]
    #[serial]
    fn wall_cut_forces_a_forbidden_side() {
        let config = Config::new();
        let ctx = Context::new(&config);
        let tiles = TileSmt::new(&ctx, 3, 3);

        let solver = SmtSolver::new(&ctx);
        solver.assert(&tiles.properties(false));
        solver.assert(&reachability_formula(&ctx, &tiles, 3, 3, TEST_K, None));
        for i in 0..9 {
            solver.assert(&tiles.exist[i]);
        }
        // wall the middle column shut: tiles 2,5,8 separated from 0,3,6
        use crate::domain::grid::Side;
        for i in [1, 4, 7] {
            solver.assert(tiles.wall(i, Side::Right));
        }
        solver.assert(&tiles.allowed[0]);

        let model = solver.solve().unwrap();
        // the right column cannot be allowed when the left one is
        for i in [2, 5, 8] {
            assert!(!eval_bool(&model, &tiles.allowed[i]));
        }
    }

    #[test]
    #[serial]
    fn open_grid_allows_everything() {
        let config = Config::new();
        let ctx = Context::new(&config);
        let tiles = TileSmt::new(&ctx, 3, 3);

        let solver = SmtSolver::new(&ctx);
        solver.assert(&tiles.properties(false));
        solver.assert(&reachability_formula(&ctx, &tiles, 3, 3, TEST_K, None));
        for i in 0..9 {
            solver.assert(&tiles.exist[i]);
            for side in crate::domain::grid::Side::ALL {
                solver.assert(&tiles.wall(i, side).not());
            }
        }
        solver.assert(&tiles.allowed[0]);

        let model = solver.solve().unwrap();
        for i in 0..9 {
            assert!(eval_bool(&model, &tiles.allowed[i]));
        }
    }

    #[test]
    #[serial]
    fn disk_cache_round_trips() {
        let dir = tempfile::tempdir().unwrap();

        {
            let config = Config::new();
            let ctx = Context::new(&config);
            let tiles = TileSmt::new(&ctx, 3, 3);
            let _ = reachability_formula(&ctx, &tiles, 3, 3, TEST_K, Some(dir.path()));
        }
        let path = dir.path().join(cache_file_name(3, 3, TEST_K));
        assert!(path.exists());

        // drop the memo so the next call must take the disk path
        TEXT_CACHE.lock().unwrap().remove(&(3, 3, TEST_K));

        let config = Config::new();
        let ctx = Context::new(&config);
        let tiles = TileSmt::new(&ctx, 3, 3);
        let formula = reachability_formula(&ctx, &tiles, 3, 3, TEST_K, Some(dir.path()));

        let solver = SmtSolver::new(&ctx);
        solver.assert(&tiles.properties(false));
        solver.assert(&formula);
        assert!(solver.is_sat());
    }
}
