use clap::Parser;
use std::fs;
use std::path::PathBuf;
use turtlesyn::domain::ReferenceAssets;
use turtlesyn::mutation::Difficulty;
use turtlesyn::pipeline::{self, PipelineConfig, Verbosity};

#[derive(Parser)]
#[command(version)]
/// Synthesise new puzzles from a reference task.
struct Args {
    #[arg(help = "Directory holding the reference asset dictionaries", long = "assets")]
    assets: PathBuf,
    #[arg(help = "The reference task id", long = "task_id")]
    task_id: String,
    #[arg(
        value_enum,
        help = "The difficulty level",
        long = "diff",
        default_value_t = Difficulty::Easy
    )]
    diff: Difficulty,
    #[arg(help = "Maximum program mutants", long = "n_codes", default_value_t = 100)]
    n_codes: usize,
    #[arg(help = "Maximum goal mutants", long = "n_goals", default_value_t = 100)]
    n_goals: usize,
    #[arg(
        help = "Distinct starting configurations per triple",
        long = "n_init_pos",
        default_value_t = 3
    )]
    n_init_pos: usize,
    #[arg(
        help = "Maximum worlds per starting configuration",
        long = "n_worlds_per_init",
        default_value_t = 1000
    )]
    n_worlds_per_init: usize,
    #[arg(
        help = "Maximum puzzles per (program, constraint, goal) triple",
        long = "n_tasks_per_triple",
        default_value_t = 3000
    )]
    n_tasks_per_triple: usize,
    #[arg(help = "Run triples on a worker pool", long = "parallel")]
    parallel: bool,
    #[arg(help = "Worker pool size", long = "max_workers", default_value_t = 8)]
    max_workers: usize,
    #[arg(help = "Output directory", long = "save_dir", default_value = "./results")]
    save_dir: PathBuf,
    #[arg(help = "Seed of the sampling and the oracles", long = "seed", default_value_t = 42)]
    seed: u64,
    #[arg(
        help = "Directory of the reachability cache",
        long = "cache_dir",
        default_value = "./cache"
    )]
    cache_dir: PathBuf,
    #[arg(
        value_enum,
        help = "The verbosity level",
        short = 'v',
        long = "verbosity",
        default_value_t = Verbosity::Normal
    )]
    verbosity: Verbosity,
}

fn main() {
    let args = Args::parse();

    let level: tracing::Level = args.verbosity.into();
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let assets = ReferenceAssets::load(&args.assets).expect("Failed to load reference assets");
    let reference = assets
        .reference_task(&args.task_id)
        .expect("Failed to assemble the reference task");

    let config = PipelineConfig {
        difficulty: args.diff,
        n_codes: args.n_codes,
        n_goals: args.n_goals,
        n_init_pos: args.n_init_pos,
        n_worlds_per_init: args.n_worlds_per_init,
        n_tasks_per_triple: args.n_tasks_per_triple,
        parallel: args.parallel,
        max_workers: args.max_workers,
        seed: args.seed,
        cache_dir: Some(args.cache_dir.clone()),
        ..PipelineConfig::default()
    };
    let records = pipeline::run(&reference, &config);

    let values: Vec<serde_json::Value> = records
        .iter()
        .map(|record| record.to_value(&args.task_id))
        .collect();
    fs::create_dir_all(&args.save_dir).expect("Failed to create the output directory");
    let difficulty = match args.diff {
        Difficulty::Easy => "easy",
        Difficulty::Medium => "medium",
        Difficulty::Hard => "hard",
    };
    let path = args
        .save_dir
        .join(format!("task_{}_{}.json", args.task_id, difficulty));
    fs::write(&path, serde_json::to_string(&values).expect("serialisable records"))
        .expect("Failed to write the output file");

    println!("{} puzzles written to {}", records.len(), path.display());
}
