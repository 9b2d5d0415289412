//! Difficulty levels and the mutation budgets they unlock. A negative
//! decrement bound forces growth: the medium preset's `max_code_dec` of
//! -1 means every mutant carries at least one extra block.

use clap::ValueEnum;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[clap(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

/// Bounds on how far a program and its constraint may drift from the
/// reference.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CodeBudget {
    pub max_code_inc: i64,
    pub max_code_dec: i64,
    /// When set, the mutant's block count is pinned to `reference + n`.
    pub exact_code_inc: Option<i64>,
    pub max_rep_body_inc: i64,
    pub max_rep_body_dec: i64,
    pub max_rep_times_inc: i64,
    pub max_rep_times_dec: i64,
    pub max_cons_inc: i64,
    pub max_cons_dec: i64,
    /// Padding slots at repeat boundaries and at the program's ends.
    pub blocks_insert_hetero: usize,
    /// Padding slots between two non-repeat blocks.
    pub blocks_insert_homog: usize,
    /// Chance that a padding slot is seeded as a repeat; only used for
    /// references without a repeat of their own.
    pub prob_insert_repeat: f64,
}

impl Default for CodeBudget {
    fn default() -> Self {
        Self {
            max_code_inc: 4,
            max_code_dec: 1,
            exact_code_inc: None,
            max_rep_body_inc: 2,
            max_rep_body_dec: 2,
            max_rep_times_inc: 2,
            max_rep_times_dec: 2,
            max_cons_inc: 1,
            max_cons_dec: 0,
            blocks_insert_hetero: 2,
            blocks_insert_homog: 1,
            prob_insert_repeat: 0.0,
        }
    }
}

/// Bounds on goal drift; outside `sum` totals, goals either stay fixed or
/// are re-enumerated wholesale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GoalBudget {
    pub same_goal: bool,
    pub max_count_inc: i64,
    pub max_count_dec: i64,
}

impl Difficulty {
    pub fn code_budget(&self) -> CodeBudget {
        match self {
            Difficulty::Easy => CodeBudget {
                max_code_inc: 0,
                max_code_dec: 0,
                exact_code_inc: Some(0),
                max_cons_inc: 0,
                max_cons_dec: 0,
                ..CodeBudget::default()
            },
            Difficulty::Medium => CodeBudget {
                max_code_inc: 2,
                max_code_dec: -1,
                exact_code_inc: None,
                max_cons_inc: 0,
                max_cons_dec: 0,
                ..CodeBudget::default()
            },
            Difficulty::Hard => CodeBudget {
                max_code_inc: 2,
                max_code_dec: 0,
                exact_code_inc: Some(2),
                max_cons_inc: 1,
                max_cons_dec: -1,
                ..CodeBudget::default()
            },
        }
    }

    pub fn goal_budget(&self) -> GoalBudget {
        match self {
            Difficulty::Easy | Difficulty::Medium => GoalBudget {
                same_goal: true,
                max_count_inc: 0,
                max_count_dec: 0,
            },
            Difficulty::Hard => GoalBudget {
                same_goal: false,
                max_count_inc: 5,
                max_count_dec: -1,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn easy_pins_the_block_count() {
        let budget = Difficulty::Easy.code_budget();
        assert_eq!(budget.exact_code_inc, Some(0));
        assert!(Difficulty::Easy.goal_budget().same_goal);
    }

    #[test]
    fn hard_unlocks_goal_mutation() {
        let budget = Difficulty::Hard.goal_budget();
        assert!(!budget.same_goal);
        assert_eq!(budget.max_count_inc, 5);
    }
}
