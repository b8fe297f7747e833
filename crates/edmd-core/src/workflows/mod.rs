//! # Workflows Module
//!
//! Complete procedures built from the engine. Each workflow takes a loaded document and run
//! options, reports its phases through a [`ProgressReporter`], and returns the final
//! document together with the collected output data.
//!
//! - **Run** ([`run`]) - a plain production run
//! - **Compression** ([`compress`]) - grows every interaction until a target packing fraction
//!   or density is reached, then folds the growth back into the units
//! - **Replica exchange** ([`replica`]) - parallel tempering across thermostatted replicas

pub mod compress;
pub mod replica;
pub mod run;

use crate::engine::error::EngineError;
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::simulation::Simulation;

/// Events between progress notifications.
const PROGRESS_BATCH: u64 = 1_000;

/// Runs `sim` until its event budget is spent, reporting progress in batches. Returns the
/// number of events run.
fn drive(sim: &mut Simulation, reporter: &ProgressReporter) -> Result<u64, EngineError> {
    let start = sim.state().event_count;
    let mut reported = start;
    while sim.run_simulation_step()? {
        let count = sim.state().event_count;
        if count - reported >= PROGRESS_BATCH {
            reporter.report(Progress::TaskAdvance {
                steps: count - reported,
            });
            reported = count;
        }
    }
    let count = sim.state().event_count;
    if count > reported {
        reporter.report(Progress::TaskAdvance {
            steps: count - reported,
        });
    }
    Ok(count - start)
}
