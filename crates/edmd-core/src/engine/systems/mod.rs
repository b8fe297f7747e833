//! # Systems
//!
//! Whole-simulation clocks. Each system holds the time until it next fires; the scheduler
//! streams that clock down alongside the particles and dispatches the system when it hits
//! zero.
//!
//! - [`ticker::Ticker`] - periodic sampling for ticker output plugins
//! - [`halt::Halt`] - stops the run at a given time
//! - [`andersen::Andersen`] - stochastic thermostat
//! - [`cell_rebuild::CellRebuild`] - keeps the cell lattice ahead of growing interactions

pub mod andersen;
pub mod cell_rebuild;
pub mod halt;
pub mod ticker;

use super::context::SystemContext;
use super::error::EngineError;
use super::event::{Event, EventData};
use super::state::SimState;
use crate::core::io::document::SystemConfig;
use crate::core::models::units::Units;
use std::any::Any;
use std::fmt;

pub trait System: fmt::Debug {
    fn name(&self) -> &str;

    fn initialise(&mut self, id: usize, ctx: &mut SystemContext<'_>) -> Result<(), EngineError>;

    fn next_event(&self) -> Event;

    /// Counts the system clock down by `dt`.
    fn stream(&mut self, dt: f64);

    fn run_event(&mut self, state: &mut SimState) -> Result<EventData, EngineError>;

    /// Called after the neighbourhood has been rebuilt in response to a directive.
    fn neighbourhood_rebuilt(&mut self, _ctx: &mut SystemContext<'_>) -> Result<(), EngineError> {
        Ok(())
    }

    /// Bath temperature, for systems that thermostat the simulation.
    fn thermostat_temperature(&self) -> Option<f64> {
        None
    }

    fn is_ticker(&self) -> bool {
        false
    }

    /// Changes the firing period of a periodic system. Returns false if the system has none.
    fn set_period(&mut self, _period: f64) -> bool {
        false
    }

    /// Re-arms a one-shot system to fire after `dt`. Returns false if it cannot be re-armed.
    fn rearm(&mut self, _dt: f64) -> bool {
        false
    }

    /// Exchanges whatever state belongs to the ensemble rather than the configuration. `other`
    /// is the system at the same position in the other replica.
    fn replica_exchange(&mut self, _other: &mut dyn System) {}

    /// `None` for systems that are recreated by the workflow that needs them.
    fn to_config(&self, state: &SimState) -> Option<SystemConfig>;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

pub fn from_config(config: &SystemConfig, units: &Units) -> Box<dyn System> {
    match config {
        SystemConfig::Ticker { name, period } => {
            Box::new(ticker::Ticker::new(name.clone(), period * units.time))
        }
        SystemConfig::Halt { name, time } => Box::new(halt::Halt::new(name.clone(), time * units.time)),
        SystemConfig::Andersen {
            name,
            mean_free_time,
            temperature,
        } => Box::new(andersen::Andersen::new(
            name.clone(),
            mean_free_time * units.time,
            temperature * units.energy(),
        )),
    }
}
