use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    version,
    about = "edmd - an event-driven molecular dynamics engine for hard-core and stepped potentials.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a configuration for a number of events and save the final state.
    Run(RunArgs),
    /// Compress a configuration to a target packing fraction or density.
    Compress(CompressArgs),
    /// Run thermostatted replicas with parallel tempering exchanges.
    Replex(ReplexArgs),
    /// Load a configuration and report overlapping pairs without running it.
    Check(CheckArgs),
}

/// Run options shared by every command that advances a simulation.
#[derive(Args, Debug, Clone)]
pub struct SimulationArgs {
    /// Number of events to run.
    #[arg(short = 'c', long, value_name = "INT", default_value_t = 100_000)]
    pub events: u64,

    /// Events between periodic progress lines in the log (0 disables them).
    #[arg(long, value_name = "INT", default_value_t = 100_000)]
    pub print_interval: u64,

    /// Period of the ticker driving sampling plugins, in simulation time units.
    #[arg(long, value_name = "FLOAT")]
    pub ticker_period: Option<f64>,

    /// Output plugin to load, as `Name` or `Name:key=value,...`. Can be used multiple times.
    #[arg(short = 'L', long = "plugin", value_name = "SPEC")]
    pub plugins: Vec<String>,

    /// Seed for the random number generator, overriding the configuration.
    #[arg(short, long, value_name = "INT")]
    pub seed: Option<u64>,
}

/// Arguments for the `run` subcommand.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Path to the input configuration (TOML).
    #[arg(short, long, required = true, value_name = "PATH")]
    pub input: PathBuf,

    /// Path for the final configuration.
    #[arg(short, long, default_value = "config.out.toml", value_name = "PATH")]
    pub output: PathBuf,

    /// Path for the collected output data.
    #[arg(long, default_value = "output.toml", value_name = "PATH")]
    pub output_data: PathBuf,

    #[command(flatten)]
    pub simulation: SimulationArgs,
}

/// Arguments for the `compress` subcommand.
#[derive(Args, Debug)]
pub struct CompressArgs {
    /// Path to the input configuration (TOML).
    #[arg(short, long, required = true, value_name = "PATH")]
    pub input: PathBuf,

    /// Path for the compressed configuration.
    #[arg(short, long, default_value = "config.out.toml", value_name = "PATH")]
    pub output: PathBuf,

    /// Path for the collected output data.
    #[arg(long, default_value = "output.toml", value_name = "PATH")]
    pub output_data: PathBuf,

    /// Relative growth rate of every interaction length per unit time.
    #[arg(short, long, default_value_t = 1.0, value_name = "FLOAT")]
    pub growth_rate: f64,

    #[command(flatten)]
    pub target: CompressionTargetArgs,

    #[command(flatten)]
    pub simulation: SimulationArgs,
}

/// At most one compression target; without one the event budget ends the run.
#[derive(Args, Debug, Clone, Copy)]
#[group(required = false, multiple = false)]
pub struct CompressionTargetArgs {
    /// Stop when the packing fraction reaches this value.
    #[arg(long, value_name = "FLOAT")]
    pub target_pack_frac: Option<f64>,
    /// Stop when the number density reaches this value.
    #[arg(long, value_name = "FLOAT")]
    pub target_density: Option<f64>,
}

/// Arguments for the `replex` subcommand.
#[derive(Args, Debug)]
pub struct ReplexArgs {
    /// Input configurations, one per replica, each with an Andersen thermostat.
    #[arg(short, long, required = true, num_args(2..), value_name = "PATH")]
    pub inputs: Vec<PathBuf>,

    /// Directory receiving `replica-N.toml` and `replica-N.output.toml` for every replica.
    #[arg(short, long, default_value = ".", value_name = "DIR")]
    pub output_dir: PathBuf,

    /// Simulation time between exchange attempts.
    #[arg(long, default_value_t = 1.0, value_name = "FLOAT")]
    pub interval: f64,

    /// Number of exchange rounds.
    #[arg(long, default_value_t = 10, value_name = "INT")]
    pub rounds: usize,

    #[command(flatten)]
    pub simulation: SimulationArgs,
}

/// Arguments for the `check` subcommand.
#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Path to the configuration (TOML).
    #[arg(short, long, required = true, value_name = "PATH")]
    pub input: PathBuf,
}
