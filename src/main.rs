use clap::Parser;
use std::path::PathBuf;
use turtlesyn::domain::ReferenceAssets;

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Args {
    #[arg(short, long, value_name = "ASSETS")]
    assets: PathBuf,
    #[arg(short, long, value_name = "TASK_ID")]
    task_id: String,
}

fn main() {
    let args = Args::parse();
    let assets = ReferenceAssets::load(&args.assets).expect("Failed to load reference assets");
    let task = assets
        .reference_task(&args.task_id)
        .expect("Failed to assemble the reference task");
    println!("{}", task.program);
    println!("{}", task.world);
    println!("{}", task.goal);
    println!("{}", task.constraints);
}
