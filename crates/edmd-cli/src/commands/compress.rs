use crate::cli::{CompressArgs, CompressionTargetArgs};
use crate::error::Result;
use crate::utils::output::{write_document, write_output_data};
use crate::utils::progress::CliProgressHandler;
use edmd::core::io::document::SimulationDocument;
use edmd::core::io::traits::ConfigFile;
use edmd::engine::progress::ProgressReporter;
use edmd::workflows::compress::{self, CompressionConfig, CompressionTarget};
use tracing::info;

fn target(args: CompressionTargetArgs) -> Option<CompressionTarget> {
    match (args.target_pack_frac, args.target_density) {
        (Some(phi), _) => Some(CompressionTarget::PackingFraction(phi)),
        (None, Some(density)) => Some(CompressionTarget::Density(density)),
        (None, None) => None,
    }
}

pub fn run(args: CompressArgs) -> Result<()> {
    info!(input = %args.input.display(), "Loading configuration.");
    let document = SimulationDocument::read_from_path(&args.input)?;
    let config = args.simulation.run_config()?;
    let compression = CompressionConfig {
        growth_rate: args.growth_rate,
        target: target(args.target),
    };

    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    println!("Compressing {} particles...", document.particles.len());
    let outcome = compress::run(&document, &config, &compression, &reporter)?;

    write_document(&outcome.document, &args.output)?;
    write_output_data(&outcome.output, &args.output_data)?;
    println!(
        "✓ Packing fraction {:.6} -> {:.6} (growth factor {:.6}). Configuration written to: {}",
        outcome.initial_packing_fraction,
        outcome.final_packing_fraction,
        outcome.growth_factor,
        args.output.display()
    );
    Ok(())
}
