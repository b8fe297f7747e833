use super::drive;
use crate::core::io::document::SimulationDocument;
use crate::engine::config::RunConfig;
use crate::engine::error::EngineError;
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::simulation::{SaveOptions, Simulation};
use tracing::{info, instrument};

/// Final state and results of a run.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub document: SimulationDocument,
    pub output: toml::Table,
    pub events: u64,
}

#[instrument(skip_all, name = "run_workflow")]
pub fn run(
    document: &SimulationDocument,
    config: &RunConfig,
    reporter: &ProgressReporter,
) -> Result<RunOutcome, EngineError> {
    // === Phase 1: Initialisation ===
    reporter.report(Progress::PhaseStart {
        name: "Initialisation",
    });
    let mut sim = Simulation::from_document(document, config)?;
    sim.initialise()?;
    reporter.report(Progress::PhaseFinish);

    // === Phase 2: Production ===
    reporter.report(Progress::TaskStart {
        total_steps: config.end_event_count,
    });
    let events = drive(&mut sim, reporter)?;
    reporter.report(Progress::TaskFinish);

    // === Phase 3: Output ===
    reporter.report(Progress::PhaseStart { name: "Output" });
    sim.finalise()?;
    let outcome = RunOutcome {
        document: sim.to_document(SaveOptions {
            apply_boundary: true,
            round: false,
        }),
        output: sim.output_data(),
        events,
    };
    reporter.report(Progress::PhaseFinish);

    info!(events, "Run workflow complete.");
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::progress::ProgressCallback;
    use crate::engine::simulation::fixtures::{lattice_document, run_config};
    use std::sync::Mutex;

    #[test]
    fn run_reports_every_event_and_saves_the_final_state() {
        let advanced = Mutex::new(0u64);
        let callback: ProgressCallback = Box::new(|progress| {
            if let Progress::TaskAdvance { steps } = progress {
                *advanced.lock().unwrap() += steps;
            }
        });
        let reporter = ProgressReporter::with_callback(callback);
        let document = lattice_document(3, 11);

        let outcome = run(&document, &run_config(2_500, &["Misc"]), &reporter).unwrap();
        drop(reporter);

        assert_eq!(outcome.events, 2_500);
        assert_eq!(advanced.into_inner().unwrap(), 2_500);
        assert_eq!(outcome.document.particles.len(), 27);
        assert_ne!(outcome.document.particles, document.particles);
        assert_eq!(outcome.output["run"]["events"].as_integer(), Some(2_500));
        assert!(outcome.output.contains_key("Misc"));
        let half = 0.5 * outcome.document.simulation.size[0];
        assert!(
            outcome
                .document
                .particles
                .iter()
                .all(|p| p.position.iter().all(|x| x.abs() <= half + 1e-12))
        );
    }
}
