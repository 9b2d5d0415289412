//! Trace optimality: no program satisfying the code-shape constraint with
//! fewer primitive actions may also reach the goal. Candidate shorter
//! paths are enumerated from the trace's start; each feasible candidate
//! must be physically blocked by a standalone wall, and standalone walls
//! may only sit on edges touched by the trace or by a candidate.

use crate::domain::grid;
use crate::domain::{Block, CodeConstraints, Direction, Program};
use crate::smt::solver::{and_all, or_all};
use crate::smt::world::TileSmt;
use crate::symexec::SymWorld;
use std::collections::BTreeSet;
use z3::ast::Bool;
use z3::Context;

/// Upper bound on the action count of candidate shorter paths.
pub const TRACE_MAX_ACTIONS: usize = 8;

/// Each tile may occur at most this often in a candidate path.
const MAX_TILE_VISITS: usize = 3;

type Edge = (usize, usize);

fn trace_edges(trace: &[usize]) -> Vec<Edge> {
    trace.windows(2).map(|w| (w[0], w[1])).collect()
}

fn canonical(edge: &Edge) -> Edge {
    (edge.0.min(edge.1), edge.0.max(edge.1))
}

fn edge_info(edges: &[Edge]) -> BTreeSet<Edge> {
    edges.iter().map(canonical).collect()
}

fn legal_edges(edges: &[Edge]) -> bool {
    edges.windows(2).all(|w| w[0].1 == w[1].0)
}

fn redundant_sub_edges(edges: &[Edge], sub: &[Edge]) -> bool {
    let info = edge_info(edges);
    let n = sub.len();
    // the first edge can never be redundant, it anchors the start position
    for k in 1..=edges.len().saturating_sub(n) {
        if &edges[k..k + n] == sub {
            let without: Vec<Edge> = edges[..k]
                .iter()
                .chain(&edges[k + n..])
                .copied()
                .collect();
            if legal_edges(&without) && info.difference(&edge_info(&without)).count() == 0 {
                return true;
            }
        }
    }
    false
}

/// A trace is redundant when dropping some contiguous run of its edges
/// loses no information; such traces make poor puzzles and are rejected.
pub fn redundant_trace(trace: &[usize]) -> bool {
    let edges = trace_edges(trace);
    for i in (0..edges.len()).rev() {
        for j in i + 1..=edges.len() {
            if redundant_sub_edges(&edges, &edges[i..j]) {
                return true;
            }
        }
    }
    false
}

/// A program whose pen colours never show up in the drawn markers wastes
/// its `setpc` blocks; such runs are rejected by the driver.
pub fn redundant_pen_colours(program: &Program, pworld: &SymWorld) -> bool {
    let drawn = pworld.drawn_markers.colours();
    program
        .pen_colours()
        .iter()
        .any(|pen| !drawn.contains(&crate::domain::pen_to_marker(*pen)))
}

/// The minimal number of primitive actions needed to walk `path` starting
/// with heading `init_dir`, together with the final heading and the
/// realising program.
pub fn actions_for_path(
    rows: usize,
    cols: usize,
    path: &[usize],
    init_dir: Direction,
) -> (usize, Direction, Program) {
    let mut dir = init_dir;
    let mut blocks = vec![];
    for window in path.windows(2) {
        let side = grid::shared_side(window[0], window[1], rows, cols)
            .expect("path tiles must be adjacent");
        if dir.exit_side() == side {
            blocks.push(Block::Fd);
        } else if dir.reversed().exit_side() == side {
            blocks.push(Block::Bk);
        } else if dir.left().exit_side() == side {
            blocks.push(Block::Lt);
            blocks.push(Block::Fd);
            dir = dir.left();
        } else {
            blocks.push(Block::Rt);
            blocks.push(Block::Fd);
            dir = dir.right();
        }
    }
    (blocks.len(), dir, Program::new(blocks))
}

struct ShorterPathSearch<'a, 'ctx> {
    ctx: &'ctx Context,
    tiles: &'a TileSmt<'ctx>,
    rows: usize,
    cols: usize,
    visited: &'a [usize],
    init_dir: Direction,
    feasible: &'a dyn Fn(&[usize]) -> Bool<'ctx>,
    constraints: &'a CodeConstraints,
    blockers: Vec<Bool<'ctx>>,
    allowed_edges: BTreeSet<Edge>,
}

impl<'a, 'ctx> ShorterPathSearch<'a, 'ctx> {
    fn standalone_walls_along(&self, path: &[usize]) -> Vec<Bool<'ctx>> {
        path.windows(2)
            .flat_map(|window| {
                let side = grid::shared_side(window[0], window[1], self.rows, self.cols)
                    .expect("adjacent");
                [
                    self.tiles.standalone_wall(window[0], side),
                    self.tiles.standalone_wall(window[1], side.opposite()),
                ]
            })
            .collect()
    }

    fn explore(&mut self, start: usize, max_actions: usize, prefix: &mut Vec<usize>, dir: Direction) {
        if max_actions == 0 {
            return;
        }
        for (_, neighbour) in grid::neighbours(start, self.rows, self.cols) {
            let Some(end) = neighbour else { continue };
            if prefix.iter().filter(|tile| **tile == end).count() >= MAX_TILE_VISITS {
                continue;
            }
            let (step_actions, end_dir, _) =
                actions_for_path(self.rows, self.cols, &[start, end], dir);
            if step_actions > max_actions {
                continue;
            }

            prefix.push(end);
            if prefix.as_slice() != self.visited {
                let (_, _, program) =
                    actions_for_path(self.rows, self.cols, prefix, self.init_dir);
                if !redundant_trace(prefix) && self.constraints.is_satisfied_by(&program) {
                    if prefix.last() == self.visited.last() {
                        self.allowed_edges.extend(edge_info(&trace_edges(prefix)));
                    }
                    let walls = self.standalone_walls_along(prefix);
                    let blocked = or_all(self.ctx, &walls);
                    self.blockers.push((self.feasible)(prefix).implies(&blocked));
                }
            }
            self.explore(end, max_actions - step_actions, prefix, end_dir);
            prefix.pop();
        }
    }
}

/// The full optimality formula for one trace, or an unsatisfiable formula
/// when the trace itself is redundant.
pub fn optimal_trace_properties<'ctx>(
    ctx: &'ctx Context,
    tiles: &TileSmt<'ctx>,
    rows: usize,
    cols: usize,
    visited: &[usize],
    init_dir: Direction,
    feasible: &dyn Fn(&[usize]) -> Bool<'ctx>,
    constraints: &CodeConstraints,
) -> Bool<'ctx> {
    if redundant_trace(visited) {
        return Bool::from_bool(ctx, false);
    }

    let (trace_actions, _, _) = actions_for_path(rows, cols, visited, init_dir);
    let mut search = ShorterPathSearch {
        ctx,
        tiles,
        rows,
        cols,
        visited,
        init_dir,
        feasible,
        constraints,
        blockers: vec![],
        allowed_edges: edge_info(&trace_edges(visited)),
    };
    let budget = trace_actions.saturating_sub(1).min(TRACE_MAX_ACTIONS);
    let mut prefix = vec![visited[0]];
    search.explore(visited[0], budget, &mut prefix, init_dir);

    let mut constraints_out = search.blockers;

    // standalone walls may only sit on trace or candidate edges
    for (i, j) in grid::edges(rows, cols) {
        if search.allowed_edges.contains(&(i, j)) {
            continue;
        }
        let side = grid::shared_side(i, j, rows, cols).expect("adjacent");
        constraints_out.push(tiles.standalone_wall(i, side).not());
        constraints_out.push(tiles.standalone_wall(j, side.opposite()).not());
    }
    and_all(ctx, &constraints_out)
}
