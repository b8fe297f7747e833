//! Particle events against fixed geometry. Locals are attached to the cells their geometry
//! intersects, so the neighbourhood layer only offers them to nearby particles.

pub mod wall;

use super::error::EngineError;
use super::event::{Event, EventData};
use super::state::SimState;
use crate::core::io::document::LocalConfig;
use crate::core::models::ids::ParticleId;
use crate::core::models::units::Units;
use nalgebra::Vector3;
use std::fmt;

pub trait Local: fmt::Debug {
    fn name(&self) -> &str;

    fn initialise(&mut self, id: usize, state: &SimState) -> Result<(), EngineError>;

    /// Whether this local acts on `particle` at all.
    fn applies_to(&self, particle: ParticleId) -> bool;

    /// Whether the geometry intersects the axis-aligned cell at `origin` with edges `width`.
    fn touches_cell(&self, origin: &Vector3<f64>, width: &Vector3<f64>) -> bool;

    fn get_event(&self, particle: ParticleId, state: &SimState) -> Event;

    fn run_event(&mut self, event: &Event, state: &mut SimState) -> Result<EventData, EngineError>;

    fn overlaps(&self, _particle: ParticleId, _state: &SimState) -> bool {
        false
    }

    fn rescale_lengths(&mut self, _factor: f64) {}

    fn to_config(&self, units: &Units) -> LocalConfig;
}

pub fn from_config(config: &LocalConfig, units: &Units) -> Box<dyn Local> {
    match config {
        LocalConfig::Wall(c) => Box::new(wall::Wall::from_config(c, units)),
    }
}
