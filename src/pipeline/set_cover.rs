//! Greedy goal set cover: pick representative goals so that every mutant
//! is within a tree-edit-distance threshold of a chosen one. Trims the
//! long tail of near-identical goal mutants before pairing.

use crate::domain::{goal_distance, Goal};

fn threshold(n_goals: usize) -> f64 {
    if n_goals > 300 {
        2.0
    } else if n_goals > 50 {
        1.0
    } else {
        0.5
    }
}

pub fn goal_set_cover(goals: &[Goal]) -> Vec<Goal> {
    if goals.is_empty() {
        return vec![];
    }
    let threshold = threshold(goals.len());

    let mut distance = vec![vec![0.0; goals.len()]; goals.len()];
    for i in 0..goals.len() {
        for j in 0..goals.len() {
            if i != j {
                distance[i][j] = goal_distance(&goals[i], &goals[j]);
            }
        }
    }

    let covers: Vec<Vec<usize>> = (0..goals.len())
        .map(|i| {
            (0..goals.len())
                .filter(|j| distance[i][*j] <= threshold)
                .collect()
        })
        .collect();

    let mut uncovered: std::collections::BTreeSet<usize> = (0..goals.len()).collect();
    let mut selected = vec![];
    while !uncovered.is_empty() {
        let best = (0..goals.len())
            .max_by_key(|i| covers[*i].iter().filter(|j| uncovered.contains(j)).count())
            .expect("non-empty goal list");
        for j in &covers[best] {
            uncovered.remove(j);
        }
        selected.push(goals[best].clone());
    }
    selected
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn find_goal(colour: &str) -> Goal {
        Goal::from_value(&json!([
            {"name": "find", "specs": [[
                [{"name": "circle", "neg": 0}], [{"color": colour, "neg": 0}]
            ]]}
        ]))
        .unwrap()
    }

    #[test]
    fn identical_goals_collapse_to_one() {
        let goals = vec![find_goal("red"), find_goal("red"), find_goal("red")];
        assert_eq!(goal_set_cover(&goals).len(), 1);
    }

    #[test]
    fn single_literal_changes_stay_within_the_small_threshold() {
        // distance 1 between any two, threshold 0.5 for small sets: one
        // representative cannot cover the others
        let goals = vec![find_goal("red"), find_goal("green"), find_goal("blue")];
        assert_eq!(goal_set_cover(&goals).len(), 3);
    }

    #[test]
    fn empty_input_yields_empty_cover() {
        assert!(goal_set_cover(&[]).is_empty());
    }
}
