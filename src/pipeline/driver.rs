//! The synthesis driver: mutate the reference program and goal, pair and
//! sample the mutants, expand every sampled triple through symbolic
//! execution and world synthesis, and keep what survives verification.
//! Units of work are independent; for a fixed seed the output sequence is
//! deterministic whether or not they run in parallel.

use crate::domain::{PuzzleRecord, ReferenceTask};
use crate::emulator::verify;
use crate::mutation::{Difficulty, GoalMutator, ProgramMutator};
use crate::pipeline::set_cover::goal_set_cover;
use crate::symexec::{RandomOracle, SymExecutor};
use crate::synthesis::{SynthesisLimits, WorldSynthesizer};
use itertools::Itertools;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rayon::prelude::*;
use std::collections::BTreeSet;
use std::path::PathBuf;
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub difficulty: Difficulty,
    pub n_codes: usize,
    pub n_goals: usize,
    pub n_init_pos: usize,
    pub n_worlds_per_init: usize,
    pub n_tasks_per_triple: usize,
    /// Cap on the sampled `(program, constraint, goal)` triples.
    pub max_triples: usize,
    pub seed: u64,
    pub parallel: bool,
    pub max_workers: usize,
    pub symmetric_forbidden_areas: bool,
    pub goal_set_cover: bool,
    pub cache_dir: Option<PathBuf>,
    /// Wall-clock deadline per unit of work.
    pub unit_deadline: Option<std::time::Duration>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            difficulty: Difficulty::Easy,
            n_codes: 100,
            n_goals: 100,
            n_init_pos: 3,
            n_worlds_per_init: 1000,
            n_tasks_per_triple: 3000,
            max_triples: 1000,
            seed: 42,
            parallel: false,
            max_workers: 8,
            symmetric_forbidden_areas: true,
            goal_set_cover: false,
            cache_dir: None,
            unit_deadline: None,
        }
    }
}

pub fn run(reference: &ReferenceTask, config: &PipelineConfig) -> Vec<PuzzleRecord> {
    let code_budget = config.difficulty.code_budget();
    let goal_budget = config.difficulty.goal_budget();

    // stage 1: program and constraint mutation
    let mut rng = StdRng::seed_from_u64(config.seed);
    let mutator = ProgramMutator::new(reference.program.clone(), reference.constraints.clone());
    let programs = mutator.generate(
        &code_budget,
        reference.world.rows,
        reference.world.cols,
        config.n_codes,
        &mut rng,
    );
    info!(count = programs.len(), "stage 1: program mutants");

    // stage 2: goal mutation
    let mut goals = GoalMutator::new(reference.goal.clone()).generate(&goal_budget, config.n_goals);
    if config.goal_set_cover {
        goals = goal_set_cover(&goals);
    }
    info!(count = goals.len(), "stage 2: goal mutants");

    // stage 3: pair, sample, and expand
    let mut triples: Vec<_> = programs
        .iter()
        .cartesian_product(goals.iter())
        .map(|((program, constraints), goal)| {
            (program.clone(), constraints.clone(), goal.clone())
        })
        .collect();
    triples.shuffle(&mut rng);
    triples.truncate(config.max_triples);
    info!(count = triples.len(), "stage 3: sampled triples");

    let limits = SynthesisLimits {
        n_init: config.n_init_pos,
        n_worlds_per_init: config.n_worlds_per_init,
        n_max: config.n_tasks_per_triple,
        deadline: config.unit_deadline,
    };

    let expand = |(index, (program, constraints, goal)): (
        usize,
        &(
            crate::domain::Program,
            crate::domain::CodeConstraints,
            crate::domain::Goal,
        ),
    )|
     -> Vec<PuzzleRecord> {
        let mut unit_rng = StdRng::seed_from_u64(config.seed.wrapping_add(index as u64 + 1));

        let mut executor = SymExecutor::new(RandomOracle::from_seed(
            config.seed.wrapping_add(index as u64),
        ));
        let square = reference.world.rows == reference.world.cols;
        let (rows, cols) = executor.min_world_size(program, square);

        let synthesizer = WorldSynthesizer::new(
            rows,
            cols,
            config.symmetric_forbidden_areas,
            config.cache_dir.clone(),
        );
        let puzzles = synthesizer.synthesize(
            program,
            constraints,
            goal,
            &reference.world.stats(),
            &limits,
            &mut unit_rng,
        );

        puzzles
            .into_iter()
            .filter(|puzzle| {
                let outcome = verify(program, puzzle);
                if !outcome.accepted() {
                    debug!(?outcome, "puzzle rejected by verification");
                }
                outcome.accepted()
            })
            .map(|puzzle| PuzzleRecord {
                puzzle,
                program: program.clone(),
            })
            .collect()
    };

    let batches: Vec<Vec<PuzzleRecord>> = if config.parallel {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.max_workers)
            .build()
            .expect("worker pool construction");
        pool.install(|| triples.par_iter().enumerate().map(expand).collect())
    } else {
        triples.iter().enumerate().map(expand).collect()
    };

    // deduplicate across triples while keeping enumeration order
    let mut seen = BTreeSet::new();
    let mut records = vec![];
    for record in batches.into_iter().flatten() {
        let key = record.to_value(&reference.task_id).to_string();
        if seen.insert(key) {
            records.push(record);
        }
    }
    info!(count = records.len(), "pipeline finished");
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ReferenceAssets;
    use crate::test_utils::write_reference_assets;

    fn small_config() -> PipelineConfig {
        PipelineConfig {
            n_codes: 2,
            n_goals: 2,
            n_init_pos: 2,
            n_worlds_per_init: 2,
            n_tasks_per_triple: 2,
            max_triples: 4,
            ..PipelineConfig::default()
        }
    }

    fn reference() -> ReferenceTask {
        let dir = tempfile::tempdir().unwrap();
        write_reference_assets(dir.path());
        ReferenceAssets::load(dir.path())
            .unwrap()
            .reference_task("1")
            .unwrap()
    }

    #[test]
    fn easy_run_emits_verified_puzzles() {
        let reference = reference();
        let records = run(&reference, &small_config());
        assert!(!records.is_empty());
        for record in &records {
            let outcome = verify(&record.program, &record.puzzle);
            assert!(outcome.accepted());
        }
    }

    #[test]
    fn runs_are_deterministic_under_a_fixed_seed() {
        let reference = reference();
        let config = small_config();

        let first: Vec<String> = run(&reference, &config)
            .iter()
            .map(|record| record.to_value("1").to_string())
            .collect();
        let second: Vec<String> = run(&reference, &config)
            .iter()
            .map(|record| record.to_value("1").to_string())
            .collect();
        assert_eq!(first, second);
    }

    #[test]
    fn parallel_and_serial_runs_agree() {
        let reference = reference();
        let serial_config = small_config();
        let parallel_config = PipelineConfig {
            parallel: true,
            max_workers: 2,
            ..small_config()
        };

        let serial: Vec<String> = run(&reference, &serial_config)
            .iter()
            .map(|record| record.to_value("1").to_string())
            .collect();
        let parallel: Vec<String> = run(&reference, &parallel_config)
            .iter()
            .map(|record| record.to_value("1").to_string())
            .collect();
        assert_eq!(serial, parallel);
    }

    #[test]
    fn records_are_unique() {
        let reference = reference();
        let records = run(&reference, &small_config());
        let mut keys: Vec<String> = records
            .iter()
            .map(|record| record.to_value("1").to_string())
            .collect();
        let before = keys.len();
        keys.sort();
        keys.dedup();
        assert_eq!(keys.len(), before);
    }
}
