mod clock;
mod config;
mod error;
mod generator;
mod logging;
mod message_queue;
mod pipeline;
mod reconciler;
mod sim;
mod types;

use std::time::Duration;

use anyhow::Result;
use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::config::{DEFAULT_WORKERS, FieldBounds, PipelineConfig, SpawnOrder};
use crate::message_queue::OverflowPolicy;

/// Perishable food pipeline for a snake-style grid game
#[derive(Parser)]
#[command(name = "snake_forage")]
#[command(about = "Run the concurrent food pipeline against a scripted snake")]
#[command(version)]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Demo settings used when no subcommand is given
    #[command(flatten)]
    demo: DemoArgs,
}

#[derive(Subcommand)]
enum Commands {
    /// Drive a scripted snake through live food and print a summary (default)
    Demo(DemoArgs),
    /// Run producers against a draining consumer and print a CSV row
    Soak(SoakArgs),
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OverflowArg {
    DropOldest,
    Reject,
}

impl From<OverflowArg> for OverflowPolicy {
    fn from(arg: OverflowArg) -> Self {
        match arg {
            OverflowArg::DropOldest => OverflowPolicy::DropOldest,
            OverflowArg::Reject => OverflowPolicy::Reject,
        }
    }
}

/// Settings shared by every subcommand.
#[derive(Args, Clone, Debug)]
struct PipelineArgs {
    /// Number of food workers
    #[arg(long, default_value_t = DEFAULT_WORKERS)]
    workers: usize,

    /// Grid width in cells
    #[arg(long, default_value_t = 20, allow_negative_numbers = true)]
    width: i32,

    /// Grid height in cells
    #[arg(long, default_value_t = 20, allow_negative_numbers = true)]
    height: i32,

    /// Milliseconds per time unit (the game uses 1000)
    #[arg(long, default_value_t = 20)]
    unit_ms: u64,

    /// Emit each worker's first item before its first delay
    #[arg(long)]
    produce_first: bool,

    /// Bound the handoff queue to this many items
    #[arg(long)]
    capacity: Option<usize>,

    /// What a full bounded queue does with a new item
    #[arg(long, value_enum, default_value_t = OverflowArg::DropOldest)]
    overflow: OverflowArg,

    /// Seed worker RNGs for reproducible placement
    #[arg(long)]
    seed: Option<u64>,
}

impl PipelineArgs {
    fn to_config(&self) -> PipelineConfig {
        PipelineConfig {
            bounds: FieldBounds::new(self.width, self.height),
            time_unit: Duration::from_millis(self.unit_ms),
            spawn_order: if self.produce_first {
                SpawnOrder::ProduceThenDelay
            } else {
                SpawnOrder::DelayThenProduce
            },
            queue_capacity: self.capacity,
            overflow: self.overflow.into(),
            seed: self.seed,
            ..PipelineConfig::default()
        }
    }
}

#[derive(Args, Clone, Debug)]
struct DemoArgs {
    #[command(flatten)]
    pipeline: PipelineArgs,

    /// Game loop iterations to run
    #[arg(long, default_value_t = 200)]
    cycles: usize,

    /// Milliseconds between game loop iterations
    #[arg(long, default_value_t = 10)]
    tick_ms: u64,
}

#[derive(Args, Clone, Debug)]
struct SoakArgs {
    #[command(flatten)]
    pipeline: PipelineArgs,

    /// How many time units producers run before shutdown
    #[arg(long, default_value_t = 30)]
    units: u32,
}

fn main() -> Result<()> {
    logging::init();
    let cli = Cli::parse();
    match cli.command.unwrap_or(Commands::Demo(cli.demo)) {
        Commands::Demo(args) => sim::run_demo(
            args.pipeline.to_config(),
            sim::DemoRun {
                workers: args.pipeline.workers,
                cycles: args.cycles,
                tick: Duration::from_millis(args.tick_ms),
            },
        ),
        Commands::Soak(args) => {
            sim::run_soak(args.pipeline.to_config(), args.pipeline.workers, args.units)
        }
    }
}
