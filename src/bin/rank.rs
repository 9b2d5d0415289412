use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::PathBuf;
use turtlesyn::domain::{
    CodeConstraints, Goal, Program, Puzzle, PuzzleRecord, ReferenceAssets, World,
};
use turtlesyn::pipeline::Verbosity;
use turtlesyn::scoring::{select_records, Selection};

#[derive(Parser)]
#[command(version)]
/// Rank synthesised puzzles against their reference and pick a quartile.
struct Args {
    #[arg(help = "Directory holding the reference asset dictionaries", long = "assets")]
    assets: PathBuf,
    #[arg(help = "The reference task id", long = "task_id")]
    task_id: String,
    #[arg(help = "A puzzle file produced by the synthesizer")]
    puzzles: PathBuf,
    #[arg(help = "Score quartile to select from (1 low to 4 high)", long = "quartile", default_value_t = 4)]
    quartile: u8,
    #[arg(
        value_enum,
        help = "Selection mode within the quartile",
        long = "selection",
        default_value_t = Selection::TopK
    )]
    selection: Selection,
    #[arg(help = "Number of puzzles to select", long = "n_sample", default_value_t = 5)]
    n_sample: usize,
    #[arg(help = "Sampling seed", long = "seed", default_value_t = 0)]
    seed: u64,
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

    let text = std::fs::read_to_string(&args.puzzles).expect("Failed to read the puzzle file");
    let raw: Vec<serde_json::Value> =
        serde_json::from_str(&text).expect("Failed to parse the puzzle file");
    let records: Vec<PuzzleRecord> = raw
        .iter()
        .map(|record| {
            let program = Program::from_value(&record["code_json"]).expect("record program");
            let constraints =
                CodeConstraints::from_value(&record["constraints"]).expect("record constraints");
            let world = World::from_value(&record["task_json"]).expect("record world");
            let goal_value = &record["task_json"]["goal"];
            let goal = if goal_value.is_null() {
                Goal::draw_from_lines(&world.markers.to_lines()).expect("record lines")
            } else {
                Goal::from_value(goal_value).expect("record goal")
            };
            PuzzleRecord {
                puzzle: Puzzle::new(world, goal, constraints),
                program,
            }
        })
        .collect();

    let mut rng = StdRng::seed_from_u64(args.seed);
    let selected = select_records(
        &reference,
        records,
        args.quartile,
        args.selection,
        args.n_sample,
        &mut rng,
    );
    for (score, record) in &selected {
        println!("score {score:.4}");
        println!("{}", record.puzzle.description());
        println!("{}", record.program);
    }
}
