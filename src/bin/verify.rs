use clap::Parser;
use std::path::PathBuf;
use turtlesyn::domain::{CodeConstraints, Goal, Program, Puzzle, World};
use turtlesyn::emulator;
use turtlesyn::pipeline::Verbosity;

#[derive(Parser)]
#[command(version)]
/// Re-verify a synthesised puzzle file: run each program on its world and
/// check goal and constraint satisfaction.
struct Args {
    #[arg(help = "A puzzle file produced by the synthesizer")]
    puzzles: PathBuf,
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

    let text = std::fs::read_to_string(&args.puzzles).expect("Failed to read the puzzle file");
    let records: Vec<serde_json::Value> =
        serde_json::from_str(&text).expect("Failed to parse the puzzle file");

    let mut accepted = 0;
    for (index, record) in records.iter().enumerate() {
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

        let puzzle = Puzzle::new(world, goal, constraints);
        let outcome = emulator::verify(&program, &puzzle);
        if outcome.accepted() {
            accepted += 1;
        } else {
            println!("record {index} failed: {outcome:?}");
        }
    }
    println!("{accepted}/{} records verified", records.len());
    if accepted != records.len() {
        std::process::exit(1);
    }
}
