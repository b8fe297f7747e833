use super::drive;
use crate::core::io::document::SimulationDocument;
use crate::engine::config::{ConfigError, RunConfig};
use crate::engine::dynamics::Dynamics;
use crate::engine::error::EngineError;
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::simulation::{SaveOptions, Simulation};
use crate::engine::systems::cell_rebuild::CellRebuild;
use crate::engine::systems::halt::Halt;
use tracing::{info, instrument, warn};

/// Where a compression run stops.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CompressionTarget {
    PackingFraction(f64),
    /// Number density in file units.
    Density(f64),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompressionConfig {
    /// Relative growth of every interaction length per unit time.
    pub growth_rate: f64,
    /// Without a target the run ends when the event budget does.
    pub target: Option<CompressionTarget>,
}

#[derive(Debug, Clone)]
pub struct CompressionOutcome {
    pub document: SimulationDocument,
    pub output: toml::Table,
    pub events: u64,
    pub initial_packing_fraction: f64,
    pub final_packing_fraction: f64,
    pub growth_factor: f64,
}

/// Time after which lengths growing at `growth_rate` have scaled `current` to `target`,
/// where the measure scales with the cube of the lengths.
fn time_to_target(current: f64, target: f64, growth_rate: f64, field: &str) -> Result<f64, ConfigError> {
    if !(target > current && target.is_finite()) {
        return Err(ConfigError::InvalidValue {
            field: field.to_string(),
            message: format!("target {target} must exceed the current value {current}"),
        });
    }
    Ok(((target / current).cbrt() - 1.0) / growth_rate)
}

#[instrument(skip_all, name = "compression_workflow")]
pub fn run(
    document: &SimulationDocument,
    config: &RunConfig,
    compression: &CompressionConfig,
    reporter: &ProgressReporter,
) -> Result<CompressionOutcome, EngineError> {
    // === Phase 1: Set up growth dynamics ===
    reporter.report(Progress::PhaseStart {
        name: "Initialisation",
    });
    if !(compression.growth_rate > 0.0 && compression.growth_rate.is_finite()) {
        return Err(ConfigError::InvalidValue {
            field: "growth-rate".to_string(),
            message: format!("must be positive and finite, got {}", compression.growth_rate),
        }
        .into());
    }
    let mut sim = Simulation::from_document(document, config)?;
    let restored = sim.state().dynamics.clone();
    if restored != Dynamics::Newtonian {
        warn!(dynamics = ?restored, "Compressing a system with non-Newtonian dynamics; they are suspended until the end.");
    }
    let growth_rate = compression.growth_rate / sim.state().units.time;
    sim.set_dynamics(Dynamics::Compression { growth_rate })?;
    sim.add_system(Box::new(CellRebuild::new("CompressionCellRebuild")))?;

    let initial_packing_fraction = sim.packing_fraction();
    let halt_time = match compression.target {
        Some(CompressionTarget::PackingFraction(target)) => Some(time_to_target(
            initial_packing_fraction,
            target,
            growth_rate,
            "target packing fraction",
        )?),
        Some(CompressionTarget::Density(target)) => Some(time_to_target(
            sim.number_density(),
            target,
            growth_rate,
            "target density",
        )?),
        None => None,
    };
    if let Some(time) = halt_time {
        info!(time, initial_packing_fraction, "Compression halt scheduled.");
        sim.add_system(Box::new(Halt::new("CompressionHalt", time)))?;
    }
    sim.initialise()?;
    reporter.report(Progress::PhaseFinish);

    // === Phase 2: Compression ===
    reporter.report(Progress::TaskStart {
        total_steps: config.end_event_count,
    });
    let events = drive(&mut sim, reporter)?;
    reporter.report(Progress::TaskFinish);
    if let Some(time) = halt_time {
        if sim.state().system_time + 1e-9 < time {
            warn!(
                reached = sim.state().system_time,
                target = time,
                "Event budget ran out before the compression target was reached."
            );
        }
    }

    // === Phase 3: Restore and save ===
    reporter.report(Progress::PhaseStart {
        name: "Restoring dynamics",
    });
    sim.finalise()?;
    let growth_factor = sim.restore_compression(restored)?;
    let final_packing_fraction = sim.packing_fraction();
    let outcome = CompressionOutcome {
        document: sim.to_document(SaveOptions {
            apply_boundary: true,
            round: false,
        }),
        output: sim.output_data(),
        events,
        initial_packing_fraction,
        final_packing_fraction,
        growth_factor,
    };
    reporter.report(Progress::PhaseFinish);

    info!(
        initial = initial_packing_fraction,
        final_ = final_packing_fraction,
        growth_factor,
        "Compression workflow complete."
    );
    Ok(outcome)
}
