//! Headless colony run
//!
//! Spawns a colony, lets the armory engine arm it, and prints what happened.

use std::path::PathBuf;
use std::process;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use armory_core::ArmoryConfig;
use armory_sim::{HostSettings, SimOptions};

/// Command line arguments for the harness
#[derive(Parser, Debug)]
#[command(name = "armory_sim")]
#[command(about = "Headless colony harness for the armory engine")]
struct Args {
    /// Random seed for reproducibility
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Number of ticks to simulate
    #[arg(long, default_value_t = 2000)]
    ticks: u64,

    /// Number of colonists
    #[arg(long, default_value_t = 6)]
    colonists: usize,

    /// Number of weapons scattered at start
    #[arg(long, default_value_t = 25)]
    weapons: usize,

    /// Engine configuration file (TOML); defaults apply when omitted
    #[arg(long)]
    config: Option<PathBuf>,

    /// Report carried ammunition to the engine
    #[arg(long)]
    ammo: bool,

    /// Chance that a colonist fails to pick up its target
    #[arg(long, default_value_t = 0.1)]
    failure_chance: f32,

    /// Print the default configuration and exit
    #[arg(long)]
    print_config: bool,
}

fn main() {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if args.print_config {
        println!("{}", armory_core::default_config_toml());
        return;
    }

    let config = match &args.config {
        Some(path) => ArmoryConfig::from_file(path).unwrap_or_else(|e| {
            eprintln!("Error: Could not load {}: {}", path.display(), e);
            process::exit(1);
        }),
        None => ArmoryConfig::default(),
    };

    println!("Armory Colony Harness");
    println!("=====================");
    println!("Seed: {}", args.seed);
    println!("Ticks: {}", args.ticks);
    println!("Colonists: {}", args.colonists);
    println!("Weapons: {}", args.weapons);
    println!();

    let options = SimOptions {
        seed: args.seed,
        ticks: args.ticks,
        colonists: args.colonists,
        weapons: args.weapons,
        ammo_system: args.ammo,
        host: HostSettings {
            failure_chance: args.failure_chance.clamp(0.0, 1.0),
            ..HostSettings::default()
        },
    };

    let report = match armory_sim::run(&options, config) {
        Ok(report) => report,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    println!();
    println!(
        "Simulation complete. {} jobs issued ({} succeeded, {} failed, {} abandoned).",
        report.jobs_issued, report.jobs_succeeded, report.jobs_failed, report.jobs_abandoned
    );
    println!(
        "{} of {} colonists armed.",
        report.armed_colonists, args.colonists
    );
    match serde_json::to_string_pretty(&report.engine) {
        Ok(json) => println!("Engine summary:\n{}", json),
        Err(e) => eprintln!("Warning: Could not serialize engine summary: {}", e),
    }
    println!("Save data:\n{}", report.save_data);
}
