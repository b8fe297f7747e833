use crate::cli::ReplexArgs;
use crate::error::{CliError, Result};
use crate::utils::output::{write_document, write_output_data};
use crate::utils::progress::CliProgressHandler;
use anyhow::Context;
use edmd::core::io::document::SimulationDocument;
use edmd::core::io::traits::ConfigFile;
use edmd::engine::progress::ProgressReporter;
use edmd::workflows::replica::{self, ReplicaConfig};
use tracing::info;

pub fn run(args: ReplexArgs) -> Result<()> {
    if args.rounds == 0 {
        return Err(CliError::Argument("--rounds must be at least 1".to_string()));
    }
    let documents = args
        .inputs
        .iter()
        .map(|path| {
            info!(input = %path.display(), "Loading replica.");
            SimulationDocument::read_from_path(path)
        })
        .collect::<std::result::Result<Vec<_>, _>>()?;
    let config = args.simulation.run_config()?;
    let replica_config = ReplicaConfig {
        interval: args.interval,
        rounds: args.rounds,
        seed: config.seed.unwrap_or_default(),
    };
    std::fs::create_dir_all(&args.output_dir).with_context(|| {
        format!("Failed to create output directory '{}'", args.output_dir.display())
    })?;

    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    println!(
        "Running {} replicas for {} exchange rounds...",
        documents.len(),
        args.rounds
    );
    let outcome = replica::run(&documents, &config, &replica_config, &reporter)?;

    for (index, result) in outcome.replicas.iter().enumerate() {
        write_document(
            &result.document,
            &args.output_dir.join(format!("replica-{index}.toml")),
        )?;
        write_output_data(
            &result.output,
            &args.output_dir.join(format!("replica-{index}.output.toml")),
        )?;
        println!(
            "  Replica {index}: T = {:.4}, {} events",
            result.temperature, result.events
        );
    }
    for stats in &outcome.exchanges {
        println!(
            "  T {:.4} <-> {:.4}: {}/{} accepted ({:.1}%)",
            stats.low,
            stats.high,
            stats.accepted,
            stats.attempts,
            100.0 * stats.acceptance_ratio()
        );
    }
    println!("✓ Replicas written to: {}", args.output_dir.display());
    Ok(())
}
