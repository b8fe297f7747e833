use crate::cli::RunArgs;
use crate::error::Result;
use crate::utils::output::{write_document, write_output_data};
use crate::utils::progress::CliProgressHandler;
use edmd::core::io::document::SimulationDocument;
use edmd::core::io::traits::ConfigFile;
use edmd::engine::progress::ProgressReporter;
use edmd::workflows;
use tracing::info;

pub fn run(args: RunArgs) -> Result<()> {
    info!(input = %args.input.display(), "Loading configuration.");
    let document = SimulationDocument::read_from_path(&args.input)?;
    let config = args.simulation.run_config()?;

    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    println!(
        "Running {} particles for up to {} events...",
        document.particles.len(),
        config.end_event_count
    );
    let outcome = workflows::run::run(&document, &config, &reporter)?;

    write_document(&outcome.document, &args.output)?;
    write_output_data(&outcome.output, &args.output_data)?;
    println!(
        "✓ {} events run. Configuration written to: {}",
        outcome.events,
        args.output.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::SimulationArgs;
    use crate::commands::testing::write_lattice;

    #[test]
    fn run_writes_configuration_and_output_data() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_lattice(dir.path(), "input.toml", None);
        let args = RunArgs {
            input,
            output: dir.path().join("final.toml"),
            output_data: dir.path().join("output.toml"),
            simulation: SimulationArgs {
                events: 1_000,
                print_interval: 0,
                ticker_period: None,
                plugins: vec!["Misc".to_string()],
                seed: Some(3),
            },
        };

        run(args).unwrap();

        let document = SimulationDocument::read_from_path(dir.path().join("final.toml")).unwrap();
        assert_eq!(document.particles.len(), 27);
        let output: toml::Table =
            toml::from_str(&std::fs::read_to_string(dir.path().join("output.toml")).unwrap())
                .unwrap();
        assert_eq!(output["run"]["events"].as_integer(), Some(1_000));
        assert!(output.contains_key("Misc"));
    }

    #[test]
    fn missing_input_is_a_document_error() {
        let dir = tempfile::tempdir().unwrap();
        let args = RunArgs {
            input: dir.path().join("absent.toml"),
            output: dir.path().join("final.toml"),
            output_data: dir.path().join("output.toml"),
            simulation: SimulationArgs {
                events: 10,
                print_interval: 0,
                ticker_period: None,
                plugins: Vec::new(),
                seed: None,
            },
        };
        assert!(matches!(run(args), Err(crate::error::CliError::Document(_))));
    }
}
