//! Path enumeration on the empty grid graph: k shortest simple paths
//! (Yen's algorithm over BFS) for the reachability encoding, and all
//! shortest paths for forbidden-item placement.

use crate::domain::grid::{self, Side};
use petgraph::graph::{NodeIndex, UnGraph};
use priority_queue::PriorityQueue;
use std::cmp::Reverse;
use std::collections::{BTreeSet, VecDeque};

/// The wall-free grid graph: every tile is a node, every internal edge an
/// undirected edge.
#[derive(Debug)]
pub struct GridGraph {
    rows: usize,
    cols: usize,
    graph: UnGraph<usize, ()>,
    nodes: Vec<NodeIndex>,
}

impl GridGraph {
    pub fn new(rows: usize, cols: usize) -> Self {
        let mut graph = UnGraph::new_undirected();
        let nodes: Vec<NodeIndex> = (0..rows * cols).map(|i| graph.add_node(i)).collect();
        for (i, j) in grid::edges(rows, cols) {
            graph.add_edge(nodes[i], nodes[j], ());
        }
        Self {
            rows,
            cols,
            graph,
            nodes,
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    fn open_neighbours(&self, i: usize) -> impl Iterator<Item = usize> + '_ {
        self.graph
            .neighbors(self.nodes[i])
            .map(|n| self.graph[n])
    }

    /// BFS shortest path avoiding banned nodes and banned edges; `None`
    /// when the target is unreachable under the bans.
    fn shortest_path_with_bans(
        &self,
        source: usize,
        target: usize,
        banned_nodes: &BTreeSet<usize>,
        banned_edges: &BTreeSet<(usize, usize)>,
    ) -> Option<Vec<usize>> {
        if banned_nodes.contains(&source) || banned_nodes.contains(&target) {
            return None;
        }
        let n = self.node_count();
        let mut pred = vec![usize::MAX; n];
        let mut seen = vec![false; n];
        let mut queue = VecDeque::new();
        queue.push_back(source);
        seen[source] = true;

        while let Some(i) = queue.pop_front() {
            if i == target {
                let mut path = vec![target];
                let mut cursor = target;
                while cursor != source {
                    cursor = pred[cursor];
                    path.push(cursor);
                }
                path.reverse();
                return Some(path);
            }
            for j in self.open_neighbours(i) {
                let edge = (i.min(j), i.max(j));
                if seen[j] || banned_nodes.contains(&j) || banned_edges.contains(&edge) {
                    continue;
                }
                seen[j] = true;
                pred[j] = i;
                queue.push_back(j);
            }
        }
        None
    }

    /// Yen's algorithm: the `k` shortest simple paths between two tiles in
    /// non-decreasing length order.
    pub fn k_shortest_simple_paths(&self, source: usize, target: usize, k: usize) -> Vec<Vec<usize>> {
        let Some(first) = self.shortest_path_with_bans(
            source,
            target,
            &BTreeSet::new(),
            &BTreeSet::new(),
        ) else {
            return vec![];
        };

        let mut paths: Vec<Vec<usize>> = vec![first];
        let mut candidates: PriorityQueue<Vec<usize>, Reverse<usize>> = PriorityQueue::new();

        while paths.len() < k {
            let previous = paths.last().expect("at least the first path").clone();
            for spur_index in 0..previous.len() - 1 {
                let spur_node = previous[spur_index];
                let root: Vec<usize> = previous[..=spur_index].to_vec();

                // ban edges that would reproduce an already-found path
                let mut banned_edges = BTreeSet::new();
                for path in &paths {
                    if path.len() > spur_index && path[..=spur_index] == root[..] {
                        let (a, b) = (path[spur_index], path[spur_index + 1]);
                        banned_edges.insert((a.min(b), a.max(b)));
                    }
                }
                // ban the root itself so spur paths stay simple
                let banned_nodes: BTreeSet<usize> =
                    root[..spur_index].iter().copied().collect();

                if let Some(spur) = self.shortest_path_with_bans(
                    spur_node,
                    target,
                    &banned_nodes,
                    &banned_edges,
                ) {
                    let mut candidate = root.clone();
                    candidate.extend(&spur[1..]);
                    let length = candidate.len();
                    candidates.push(candidate, Reverse(length));
                }
            }

            let mut added = false;
            while let Some((path, _)) = candidates.pop() {
                if !paths.contains(&path) {
                    paths.push(path);
                    added = true;
                    break;
                }
            }
            if !added {
                break;
            }
        }
        paths.truncate(k);
        paths
    }

    /// All shortest paths between two tiles, via BFS levels and backward
    /// enumeration.
    pub fn all_shortest_paths(&self, source: usize, target: usize) -> Vec<Vec<usize>> {
        let n = self.node_count();
        let mut dist = vec![usize::MAX; n];
        let mut queue = VecDeque::new();
        dist[source] = 0;
        queue.push_back(source);
        while let Some(i) = queue.pop_front() {
            for j in self.open_neighbours(i) {
                if dist[j] == usize::MAX {
                    dist[j] = dist[i] + 1;
                    queue.push_back(j);
                }
            }
        }
        if dist[target] == usize::MAX {
            return vec![];
        }

        let mut paths = vec![];
        let mut stack = vec![target];
        self.collect_backwards(source, &dist, &mut stack, &mut paths);
        paths
    }

    fn collect_backwards(
        &self,
        source: usize,
        dist: &[usize],
        stack: &mut Vec<usize>,
        paths: &mut Vec<Vec<usize>>,
    ) {
        let current = *stack.last().expect("non-empty stack");
        if current == source {
            let mut path = stack.clone();
            path.reverse();
            paths.push(path);
            return;
        }
        for j in self.open_neighbours(current) {
            if dist[j] + 1 == dist[current] {
                stack.push(j);
                self.collect_backwards(source, dist, stack, paths);
                stack.pop();
            }
        }
    }

    /// The `(tile, side)` wall slots crossed by a path, both faces of each
    /// shared edge.
    pub fn walls_along_path(&self, path: &[usize]) -> Vec<(usize, Side)> {
        let mut walls = vec![];
        for window in path.windows(2) {
            let side = grid::shared_side(window[0], window[1], self.rows, self.cols)
                .expect("path tiles must be adjacent");
            walls.push((window[0], side));
            walls.push((window[1], side.opposite()));
        }
        walls
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shortest_path_on_an_open_grid() {
        let graph = GridGraph::new(3, 3);
        let paths = graph.k_shortest_simple_paths(0, 2, 1);
        assert_eq!(paths, vec![vec![0, 1, 2]]);
    }

    #[test]
    fn k_paths_come_in_length_order() {
        let graph = GridGraph::new(3, 3);
        let paths = graph.k_shortest_simple_paths(0, 8, 6);
        assert_eq!(paths.len(), 6);
        for window in paths.windows(2) {
            assert!(window[0].len() <= window[1].len());
        }
        // all returned paths are simple and connect the endpoints
        for path in &paths {
            assert_eq!(*path.first().unwrap(), 0);
            assert_eq!(*path.last().unwrap(), 8);
            let unique: BTreeSet<_> = path.iter().collect();
            assert_eq!(unique.len(), path.len());
        }
    }

    #[test]
    fn all_shortest_paths_between_corners() {
        let graph = GridGraph::new(2, 2);
        let mut paths = graph.all_shortest_paths(0, 3);
        paths.sort();
        assert_eq!(paths, vec![vec![0, 1, 3], vec![0, 2, 3]]);
    }

    #[test]
    fn corner_to_corner_has_six_shortest_routes() {
        // 3x3, (0,0) to (2,2): C(4,2) = 6 monotone paths
        let graph = GridGraph::new(3, 3);
        assert_eq!(graph.all_shortest_paths(0, 8).len(), 6);
    }

    #[test]
    fn walls_cover_both_faces() {
        let graph = GridGraph::new(3, 3);
        let walls = graph.walls_along_path(&[0, 1, 4]);
        assert_eq!(
            walls,
            vec![
                (0, Side::Right),
                (1, Side::Left),
                (1, Side::Bottom),
                (4, Side::Top),
            ]
        );
    }
}
