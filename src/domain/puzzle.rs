//! A synthesised puzzle: a world, a goal and a code-shape constraint,
//! bundled with the program that solves it for the output records.

use crate::domain::{CodeConstraints, Goal, Program, World};
use serde_json::{json, Value};

#[derive(Debug, Clone)]
pub struct Puzzle {
    pub world: World,
    pub goal: Goal,
    pub constraints: CodeConstraints,
}

impl Puzzle {
    pub fn new(world: World, goal: Goal, constraints: CodeConstraints) -> Self {
        Self {
            world,
            goal,
            constraints,
        }
    }

    /// The student-facing instruction text: the goal, the pen colours used
    /// for drawn lines, and the constraint rules.
    pub fn description(&self) -> String {
        let mut text = self.goal.to_string();

        let mut colours: Vec<String> = self
            .world
            .stats()
            .pen_colours_used
            .iter()
            .map(|c| c.to_string())
            .filter(|c| c != "white" && c != "black")
            .collect();
        colours.sort();
        match colours.len() {
            0 => {}
            1 => text.push_str(&format!(" in {}", colours[0])),
            2 => text.push_str(&format!(" using the colors {} and {}", colours[0], colours[1])),
            _ => text.push_str(&format!(
                " using the colors {} and {}",
                colours[..colours.len() - 1].join(", "),
                colours[colours.len() - 1]
            )),
        }

        let constraints = self.constraints.to_string();
        if !constraints.is_empty() {
            text.push_str(". ");
            text.push_str(&constraints);
        }
        if !text.ends_with('.') {
            text.push('.');
        }
        text
    }

    /// The `task_json` of the output record: world JSON extended with id,
    /// description and the embedded goal.
    pub fn to_task_value(&self, task_id: &str) -> Value {
        let mut value = self.world.to_value();
        let map = value.as_object_mut().expect("world json is an object");
        map.insert("id".to_owned(), json!(task_id));
        map.insert("description".to_owned(), json!(self.description()));
        map.insert("rows".to_owned(), json!(self.world.rows));
        map.insert("cols".to_owned(), json!(self.world.cols));
        let goal = if self.goal.is_draw() {
            Value::Null
        } else {
            self.goal.to_value()
        };
        map.insert("goal".to_owned(), goal);
        value
    }
}

/// One line of the output dataset.
#[derive(Debug, Clone)]
pub struct PuzzleRecord {
    pub puzzle: Puzzle,
    pub program: Program,
}

impl PuzzleRecord {
    pub fn to_value(&self, task_id: &str) -> Value {
        json!({
            "task_json": self.puzzle.to_task_value(task_id),
            "code_json": self.program.to_value(),
            "constraints": self.puzzle.constraints.to_value(),
        })
    }
}
