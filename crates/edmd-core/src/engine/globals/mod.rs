//! # Globals
//!
//! Per-particle events against the environment rather than another particle: cell
//! transitions, and sentinels that force a particle to be re-examined before its cached
//! events could go wrong (crossing half a periodic box, passing a trajectory apex).

pub mod cells;
pub mod parabola_sentinel;
pub mod pbc_sentinel;

use super::context::GlobalContext;
use super::error::EngineError;
use super::event::{Event, EventData};
use super::neighbourhood::Neighbourhood;
use super::state::SimState;
use crate::core::io::document::GlobalConfig;
use crate::core::models::ids::ParticleId;
use crate::core::models::units::Units;
use std::fmt;

pub trait Global: fmt::Debug {
    fn name(&self) -> &str;

    fn initialise(&mut self, id: usize, ctx: &GlobalContext<'_>) -> Result<(), EngineError>;

    fn get_event(&self, particle: ParticleId, state: &SimState) -> Event;

    fn run_event(&mut self, event: &Event, state: &mut SimState) -> Result<EventData, EngineError>;

    /// The candidate enumeration this global maintains, if it is a neighbour list.
    fn neighbourhood(&self) -> Option<&dyn Neighbourhood> {
        None
    }

    /// Longest interaction distance the neighbourhood can currently serve.
    fn supported_range(&self) -> Option<f64> {
        None
    }

    /// Rebuilds any spatial structure for the current state. `ctx.longest_interaction` is the
    /// range the rebuilt structure must cover.
    fn rebuild(&mut self, _ctx: &GlobalContext<'_>) -> Result<(), EngineError> {
        Ok(())
    }

    fn to_config(&self, units: &Units) -> GlobalConfig;
}

pub fn from_config(config: &GlobalConfig, units: &Units) -> Box<dyn Global> {
    match config {
        GlobalConfig::Cells {
            name,
            min_cell_size,
            limit_cells,
        } => Box::new(cells::Cells::new(
            name.clone(),
            min_cell_size.map(|size| size * units.length),
            *limit_cells,
        )),
        GlobalConfig::PbcSentinel { name } => Box::new(pbc_sentinel::PbcSentinel::new(name.clone())),
        GlobalConfig::ParabolaSentinel { name } => {
            Box::new(parabola_sentinel::ParabolaSentinel::new(name.clone()))
        }
    }
}

fn single_participant(event: &Event, owner: &str) -> Result<ParticleId, EngineError> {
    match event.source {
        super::event::EventSource::Global { particle, .. } => Ok(particle),
        other => Err(EngineError::Consistency(format!(
            "global {owner} received an event from {other:?}"
        ))),
    }
}
