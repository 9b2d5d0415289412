//! Loading of the reference-asset dictionaries: four JSON files keyed by
//! task id, holding programs, code-shape constraints, worlds and goals.
//! Schema violations here are the only fatal error class of the engine.

use crate::domain::{CodeConstraints, Goal, Program, World};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("failed to read asset file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("malformed asset json: {source}")]
    Json { source: serde_json::Error },
    #[error("asset schema violation: {message}")]
    Schema { message: String },
    #[error("unknown task id `{task_id}`")]
    UnknownTask { task_id: String },
}

/// One reference puzzle: the inputs of a synthesis run.
#[derive(Debug, Clone)]
pub struct ReferenceTask {
    pub task_id: String,
    pub program: Program,
    pub constraints: CodeConstraints,
    pub world: World,
    pub goal: Goal,
}

#[derive(Debug, Clone)]
pub struct ReferenceAssets {
    codes: BTreeMap<String, Value>,
    constraints: BTreeMap<String, Value>,
    worlds: BTreeMap<String, Value>,
    goals: BTreeMap<String, Value>,
}

impl ReferenceAssets {
    /// Read the four dictionaries from `dir`. The file names follow the
    /// dataset convention `{codes,constraints,worlds,goals}.json`.
    pub fn load(dir: &Path) -> Result<Self, AssetError> {
        let assets = Self {
            codes: load_dictionary(&dir.join("codes.json"))?,
            constraints: load_dictionary(&dir.join("constraints.json"))?,
            worlds: load_dictionary(&dir.join("worlds.json"))?,
            goals: load_dictionary(&dir.join("goals.json"))?,
        };
        info!(
            tasks = assets.codes.len(),
            "loaded reference asset dictionaries"
        );
        Ok(assets)
    }

    pub fn task_ids(&self) -> impl Iterator<Item = &str> {
        self.codes.keys().map(String::as_str)
    }

    /// Assemble the reference puzzle for one task id, validating every
    /// piece. A goal that is absent or empty denotes a drawing task whose
    /// goal is derived from the world's lines.
    pub fn reference_task(&self, task_id: &str) -> Result<ReferenceTask, AssetError> {
        let entry = |map: &BTreeMap<String, Value>, field: &str| -> Result<Value, AssetError> {
            let record = map.get(task_id).ok_or_else(|| AssetError::UnknownTask {
                task_id: task_id.to_owned(),
            })?;
            record
                .get(field)
                .cloned()
                .ok_or_else(|| AssetError::Schema {
                    message: format!("task `{task_id}` record is missing `{field}`"),
                })
        };

        let program = Program::from_value(&entry(&self.codes, "code_json")?)?;
        if program.contains_cursor() {
            return Err(AssetError::Schema {
                message: format!("reference program `{task_id}` contains a cursor"),
            });
        }
        let constraints = CodeConstraints::from_value(&entry(&self.constraints, "constraints")?)?;
        let world = World::from_value(&entry(&self.worlds, "world_json")?)?;

        let goal_value = entry(&self.goals, "goal")?;
        let goal = if goal_value.is_null() || goal_value.as_array().is_some_and(Vec::is_empty) {
            Goal::draw_from_lines(&world.markers.to_lines())?
        } else {
            Goal::from_value(&goal_value)?
        };

        Ok(ReferenceTask {
            task_id: task_id.to_owned(),
            program,
            constraints,
            world,
            goal,
        })
    }
}

fn load_dictionary(path: &Path) -> Result<BTreeMap<String, Value>, AssetError> {
    let text = fs::read_to_string(path).map_err(|source| AssetError::Io {
        path: path.to_owned(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| AssetError::Json { source })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::write_reference_assets;

    #[test]
    fn loads_a_reference_task() {
        let dir = tempfile::tempdir().unwrap();
        write_reference_assets(dir.path());

        let assets = ReferenceAssets::load(dir.path()).unwrap();
        let task = assets.reference_task("1").unwrap();
        assert_eq!(task.program.total_blocks(), 2);
        assert_eq!(task.world.rows, 3);
        assert!(!task.goal.is_empty());
    }

    #[test]
    fn unknown_task_id_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        write_reference_assets(dir.path());

        let assets = ReferenceAssets::load(dir.path()).unwrap();
        assert!(matches!(
            assets.reference_task("nope"),
            Err(AssetError::UnknownTask { .. })
        ));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            ReferenceAssets::load(dir.path()),
            Err(AssetError::Io { .. })
        ));
    }
}
