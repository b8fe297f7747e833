use crate::cli::CheckArgs;
use crate::error::{CliError, Result};
use edmd::core::io::document::SimulationDocument;
use edmd::core::io::traits::ConfigFile;
use edmd::engine::config::RunConfigBuilder;
use edmd::engine::error::EngineError;
use edmd::engine::simulation::Simulation;
use tracing::{info, warn};

/// Summary of a checked configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckReport {
    pub particles: usize,
    pub packing_fraction: f64,
    pub number_density: f64,
    pub overlaps: usize,
}

pub fn inspect(document: &SimulationDocument) -> Result<CheckReport> {
    let config = RunConfigBuilder::new()
        .end_event_count(0)
        .print_interval(0)
        .build()
        .map_err(EngineError::from)?;
    let mut sim = Simulation::from_document(document, &config)?;
    sim.initialise()?;
    Ok(CheckReport {
        particles: sim.state().n(),
        packing_fraction: sim.packing_fraction(),
        number_density: sim.number_density(),
        overlaps: sim.check_system(),
    })
}

pub fn run(args: CheckArgs) -> Result<()> {
    info!(input = %args.input.display(), "Checking configuration.");
    let document = SimulationDocument::read_from_path(&args.input)?;
    let report = inspect(&document)?;

    println!("Particles:        {}", report.particles);
    println!("Packing fraction: {:.6}", report.packing_fraction);
    println!("Number density:   {:.6}", report.number_density);
    println!("Overlaps:         {}", report.overlaps);

    if report.overlaps > 0 {
        warn!(overlaps = report.overlaps, "Configuration has overlapping particles.");
        return Err(CliError::Other(anyhow::anyhow!(
            "'{}' has {} overlap(s)",
            args.input.display(),
            report.overlaps
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing::write_lattice;

    #[test]
    fn lattice_passes_the_check() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_lattice(dir.path(), "lattice.toml", None);
        let document = SimulationDocument::read_from_path(&path).unwrap();

        let report = inspect(&document).unwrap();

        assert_eq!(report.particles, 27);
        assert_eq!(report.overlaps, 0);
        let expected = 27.0 * std::f64::consts::PI / 6.0 / 216.0;
        assert!((report.packing_fraction - expected).abs() < 1e-12);
        assert!(run(CheckArgs { input: path }).is_ok());
    }

    #[test]
    fn overlapping_particles_fail_the_check() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_lattice(dir.path(), "lattice.toml", None);
        let mut document = SimulationDocument::read_from_path(&path).unwrap();
        document.particles[1].position = [-1.5, -2.0, -2.0];
        let overlapping = dir.path().join("overlapping.toml");
        document.write_to_path(&overlapping).unwrap();

        assert_eq!(inspect(&document).unwrap().overlaps, 1);
        assert!(matches!(
            run(CheckArgs { input: overlapping }),
            Err(CliError::Other(_))
        ));
    }
}
