//! Zhang–Shasha tree edit distance with unit insert/remove/update costs;
//! updating a node is free when the labelled kinds match. Used to compare
//! programs for scoring and goals for the set-cover sampler.

use crate::domain::{Block, Goal, Literal, LiteralAtom, Program};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeNode {
    pub label: String,
    pub children: Vec<TreeNode>,
}

impl TreeNode {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            children: vec![],
        }
    }

    pub fn with_children(label: impl Into<String>, children: Vec<TreeNode>) -> Self {
        Self {
            label: label.into(),
            children,
        }
    }
}

/// Programs compare by block kind; repeat counts and pen colours do not
/// contribute to the distance.
pub fn program_tree(program: &Program) -> TreeNode {
    fn block_node(block: &Block) -> TreeNode {
        match block {
            Block::Repeat { body, .. } => TreeNode::with_children(
                "repeat",
                body.iter().map(block_node).collect(),
            ),
            other => TreeNode::new(other.kind().to_string()),
        }
    }
    TreeNode::with_children("run", program.run.iter().map(block_node).collect())
}

/// Goals compare down to individual literals; a literal's label carries
/// name, colour, count and polarity.
pub fn goal_tree(goal: &Goal) -> TreeNode {
    fn literal_node(literal: &Literal) -> TreeNode {
        let (name, colour, count) = match &literal.atom {
            LiteralAtom::Name(name) => (name.to_string(), "null".to_owned(), "null".to_owned()),
            LiteralAtom::Noname => ("noname".to_owned(), "null".to_owned(), "null".to_owned()),
            LiteralAtom::Colour(colour) => {
                ("null".to_owned(), colour.to_string(), "null".to_owned())
            }
            LiteralAtom::Count(count) => {
                ("null".to_owned(), "null".to_owned(), count.to_string())
            }
            LiteralAtom::Line(line) => (
                format!("l_{}_{}_{}_{}", line.x1, line.y1, line.x2, line.y2),
                line.colour.to_string(),
                "null".to_owned(),
            ),
        };
        TreeNode::new(format!("{}_{}_{}_{}", name, colour, count, literal.neg as u8))
    }

    let objectives = goal
        .objectives
        .iter()
        .map(|objective| {
            let specs = objective
                .specs
                .iter()
                .map(|spec| {
                    // colour clauses sort before name clauses so that
                    // equivalent specs align
                    let mut clauses = spec.cnf.clone();
                    clauses.sort();
                    TreeNode::with_children(
                        "spec",
                        clauses
                            .iter()
                            .map(|clause| {
                                TreeNode::with_children(
                                    "clause",
                                    clause.iter().map(literal_node).collect(),
                                )
                            })
                            .collect(),
                    )
                })
                .collect();
            TreeNode::with_children(objective.kind.to_string(), specs)
        })
        .collect();
    TreeNode::with_children("run", objectives)
}

pub fn program_distance(a: &Program, b: &Program) -> u32 {
    tree_distance(&program_tree(a), &program_tree(b))
}

pub fn goal_distance(a: &Goal, b: &Goal) -> f64 {
    // sums compare by their totals alone, mirroring how close two counting
    // tasks feel to a student
    let sum_total = |goal: &Goal| {
        goal.objectives
            .first()
            .filter(|o| o.kind == crate::domain::ObjectiveKind::Sum)
            .and_then(|o| o.total_cnt)
    };
    if let (Some(a_total), Some(b_total)) = (sum_total(a), sum_total(b)) {
        return match a_total as i64 - b_total as i64 {
            2 => 3.0,
            1 => 1.0,
            _ => 2.0,
        };
    }
    tree_distance(&goal_tree(a), &goal_tree(b)) as f64
}

// postorder-numbered tree with leftmost-leaf-descendant table, 1-based
struct Indexed {
    labels: Vec<String>,
    lmld: Vec<usize>,
}

impl Indexed {
    fn build(root: &TreeNode) -> Self {
        fn walk(node: &TreeNode, labels: &mut Vec<String>, lmld: &mut Vec<usize>) -> usize {
            let mut leftmost = 0;
            for (i, child) in node.children.iter().enumerate() {
                let child_leftmost = walk(child, labels, lmld);
                if i == 0 {
                    leftmost = child_leftmost;
                }
            }
            labels.push(node.label.clone());
            let own = labels.len() - 1;
            if node.children.is_empty() {
                leftmost = own;
            }
            lmld.push(leftmost);
            own
        }
        // index 0 is a placeholder so that postorder numbers start at 1
        let mut labels = vec![String::new()];
        let mut lmld = vec![0];
        walk(root, &mut labels, &mut lmld);
        Self { labels, lmld }
    }

    fn len(&self) -> usize {
        self.labels.len() - 1
    }

    fn keyroots(&self) -> Vec<usize> {
        let n = self.len();
        (1..=n)
            .filter(|&i| !(i + 1..=n).any(|j| self.lmld[j] == self.lmld[i]))
            .collect()
    }
}

pub fn tree_distance(a: &TreeNode, b: &TreeNode) -> u32 {
    let ta = Indexed::build(a);
    let tb = Indexed::build(b);
    let (na, nb) = (ta.len(), tb.len());
    let mut td = vec![vec![0u32; nb + 1]; na + 1];

    for &i in &ta.keyroots() {
        for &j in &tb.keyroots() {
            forest_distance(&ta, &tb, i, j, &mut td);
        }
    }
    td[na][nb]
}

fn forest_distance(ta: &Indexed, tb: &Indexed, i: usize, j: usize, td: &mut [Vec<u32>]) {
    let ioff = ta.lmld[i] - 1;
    let joff = tb.lmld[j] - 1;
    let m = i - ioff;
    let n = j - joff;

    let mut fd = vec![vec![0u32; n + 1]; m + 1];
    for x in 1..=m {
        fd[x][0] = fd[x - 1][0] + 1;
    }
    for y in 1..=n {
        fd[0][y] = fd[0][y - 1] + 1;
    }

    for x in 1..=m {
        for y in 1..=n {
            if ta.lmld[x + ioff] == ta.lmld[i] && tb.lmld[y + joff] == tb.lmld[j] {
                // both prefixes are whole trees
                let update = u32::from(ta.labels[x + ioff] != tb.labels[y + joff]);
                fd[x][y] = (fd[x - 1][y] + 1)
                    .min(fd[x][y - 1] + 1)
                    .min(fd[x - 1][y - 1] + update);
                td[x + ioff][y + joff] = fd[x][y];
            } else {
                let p = ta.lmld[x + ioff] - 1 - ioff;
                let q = tb.lmld[y + joff] - 1 - joff;
                fd[x][y] = (fd[x - 1][y] + 1)
                    .min(fd[x][y - 1] + 1)
                    .min(fd[p][q] + td[x + ioff][y + joff]);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn program(value: serde_json::Value) -> Program {
        Program::from_value(&value).unwrap()
    }

    #[test]
    fn identical_trees_have_distance_zero() {
        let p = program(json!({"run": [{"type": "fd"}, {"type": "rt"}]}));
        assert_eq!(program_distance(&p, &p), 0);
    }

    #[test]
    fn repeat_times_do_not_count() {
        let p1 = program(json!({"run": [
            {"type": "repeat", "times": 4, "body": [{"type": "fd"}, {"type": "fd"}, {"type": "rt"}]}
        ]}));
        let p2 = program(json!({"run": [
            {"type": "repeat", "times": 8, "body": [{"type": "fd"}, {"type": "fd"}, {"type": "lt"}]}
        ]}));
        // only the rt -> lt relabel costs
        assert_eq!(program_distance(&p1, &p2), 1);
    }

    #[test]
    fn moving_a_block_out_of_a_repeat_costs_two() {
        let inside = program(json!({"run": [
            {"type": "repeat", "times": 4, "body": [{"type": "fd"}, {"type": "fd"}, {"type": "rt"}]}
        ]}));
        let outside = program(json!({"run": [
            {"type": "repeat", "times": 4, "body": [{"type": "fd"}, {"type": "fd"}]},
            {"type": "rt"}
        ]}));
        assert_eq!(program_distance(&inside, &outside), 2);
    }

    #[test]
    fn insertion_costs_one() {
        let short = program(json!({"run": [{"type": "fd"}, {"type": "fd"}]}));
        let long = program(json!({"run": [{"type": "fd"}, {"type": "fd"}, {"type": "rt"}]}));
        assert_eq!(program_distance(&short, &long), 1);
    }

    #[test]
    fn sum_goals_compare_by_total() {
        let goal = |total: u32| {
            Goal::from_value(&json!([
                {"name": "sum", "specs": [[[{"name": "strawberry", "neg": 0}]]], "total_cnt": total}
            ]))
            .unwrap()
        };
        assert_eq!(goal_distance(&goal(5), &goal(4)), 1.0);
        assert_eq!(goal_distance(&goal(6), &goal(4)), 3.0);
        assert_eq!(goal_distance(&goal(4), &goal(6)), 2.0);
    }

    #[test]
    fn goal_literal_changes_count() {
        let g1 = Goal::from_value(&json!([
            {"name": "find", "specs": [[[{"name": "circle", "neg": 0}], [{"color": "pink", "neg": 0}]]]}
        ]))
        .unwrap();
        let g2 = Goal::from_value(&json!([
            {"name": "find", "specs": [[[{"name": "circle", "neg": 0}], [{"color": "red", "neg": 0}]]]}
        ]))
        .unwrap();
        assert_eq!(goal_distance(&g1, &g2), 1.0);
    }
}
