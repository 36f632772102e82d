use clap::{Args, Parser, Subcommand};
use utils::version;

use crate::infrastructure::EventFormat;

#[derive(Parser)]
#[command(about, long_about, version = &**version::VERSION)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run one workshop simulation
    Run(Box<RunArgs>),
    /// Run the preset scenarios one after another and compare their durations
    Compare(CompareArgs),
}

/// Flags shared by every command that runs simulations.
#[derive(Args, Clone, Debug)]
pub struct CommonArgs {
    #[arg(
        long,
        env = "WORKSHOP_INITIAL_MODE",
        default_value_t = 0,
        value_parser = clap::value_parser!(u8).range(0..=9),
        help = "Operating mode at start-up (0-9)"
    )]
    pub initial_mode: u8,

    #[arg(
        long,
        env = "WORKSHOP_MODE_SERVER",
        default_value = "localhost:8000",
        help = "host:port of the line-oriented mode-change server"
    )]
    pub mode_server: String,

    #[arg(
        long,
        help = "Do not connect to a mode server, keep the initial mode"
    )]
    pub no_mode_source: bool,

    #[arg(
        long,
        env = "WORKSHOP_TIME_SCALE",
        default_value_t = 1.0,
        help = "Multiplier applied to service times and arrival gaps, e.g. 0.01 for a quick run"
    )]
    pub time_scale: f64,

    #[arg(long, help = "Seed for fleet generation and arrival gaps")]
    pub seed: Option<u64>,

    #[arg(long, value_enum, default_value_t = EventFormat::Text)]
    pub event_format: EventFormat,
}

#[derive(Args, Clone, Debug)]
pub struct RunArgs {
    #[arg(long, env = "WORKSHOP_BAYS", default_value_t = 6, help = "Number of bays")]
    pub bays: usize,

    #[arg(
        long,
        env = "WORKSHOP_MECHANICS",
        default_value_t = 3,
        help = "Number of mechanics"
    )]
    pub mechanics: usize,

    #[arg(long, default_value_t = 2)]
    pub cleaners: usize,

    #[arg(long, default_value_t = 2)]
    pub inspectors: usize,

    #[arg(long, default_value_t = 10, help = "Vehicles with a mechanical incident")]
    pub mechanical: usize,

    #[arg(long, default_value_t = 10, help = "Vehicles with an electrical incident")]
    pub electrical: usize,

    #[arg(long, default_value_t = 10, help = "Vehicles with a bodywork incident")]
    pub bodywork: usize,

    #[command(flatten)]
    pub common: CommonArgs,
}

#[derive(Args, Clone, Debug)]
pub struct CompareArgs {
    #[command(flatten)]
    pub common: CommonArgs,
}
