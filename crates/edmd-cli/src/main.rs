mod cli;
mod commands;
mod error;
mod logging;
mod utils;

use crate::cli::{Cli, Commands};
use clap::Parser;
use std::process::ExitCode;
use tracing::{debug, error, info};

fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(e) = logging::setup_logging(cli.verbose, cli.quiet, cli.log_file.as_deref()) {
        eprintln!("❌ Error: {e}");
        return ExitCode::FAILURE;
    }

    info!("edmd CLI v{} starting up.", env!("CARGO_PKG_VERSION"));
    debug!("Full CLI arguments parsed: {:?}", &cli);

    let command_result = match cli.command {
        Commands::Run(args) => {
            info!("Dispatching to 'run' command.");
            commands::run::run(args)
        }
        Commands::Compress(args) => {
            info!("Dispatching to 'compress' command.");
            commands::compress::run(args)
        }
        Commands::Replex(args) => {
            info!("Dispatching to 'replex' command.");
            commands::replex::run(args)
        }
        Commands::Check(args) => {
            info!("Dispatching to 'check' command.");
            commands::check::run(args)
        }
    };

    match command_result {
        Ok(()) => {
            info!("Command completed successfully.");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Command failed: {e}");
            eprintln!("❌ Command failed: {e}");
            ExitCode::FAILURE
        }
    }
}
