use super::OutputPlugin;
use crate::engine::error::EngineError;
use crate::engine::event::{Event, EventData};
use crate::engine::state::SimState;
use std::any::Any;
use toml::Table;

/// Instantaneous and time-averaged kinetic temperature, tracked incrementally from the
/// translational kinetic energy changes of each event.
#[derive(Debug, Clone, Default)]
pub struct KEnergy {
    kinetic_energy: f64,
    degrees: f64,
    integral: f64,
    elapsed: f64,
    last_time: f64,
}

impl KEnergy {
    pub fn new() -> Self {
        Self::default()
    }

    /// `kT` from the current translational kinetic energy.
    pub fn temperature(&self) -> f64 {
        if self.degrees == 0.0 {
            0.0
        } else {
            2.0 * self.kinetic_energy / self.degrees
        }
    }

    pub fn average_temperature(&self) -> f64 {
        if self.elapsed > 0.0 {
            2.0 * self.integral / (self.elapsed * self.degrees)
        } else {
            self.temperature()
        }
    }

    fn accumulate(&mut self, now: f64) {
        let dt = now - self.last_time;
        if dt > 0.0 {
            self.integral += self.kinetic_energy * dt;
            self.elapsed += dt;
        }
        self.last_time = now;
    }
}

impl OutputPlugin for KEnergy {
    fn name(&self) -> &'static str {
        "KEnergy"
    }

    fn priority(&self) -> i32 {
        50
    }

    fn initialise(&mut self, state: &SimState) -> Result<(), EngineError> {
        let mut ke = 0.0;
        let mut movable = 0usize;
        for particle in &state.particles {
            let mass = state.species_of(particle.id).mass;
            if mass.is_finite() {
                ke += 0.5 * mass * particle.velocity.norm_squared();
                movable += 1;
            }
        }
        self.kinetic_energy = ke;
        self.degrees = 3.0 * movable as f64;
        self.last_time = state.system_time;
        Ok(())
    }

    fn event_update(&mut self, _event: &Event, data: &EventData, state: &SimState) {
        self.accumulate(state.system_time);
        for delta in &data.deltas {
            let mass = state.species[delta.species].mass;
            if mass.is_finite() {
                self.kinetic_energy += 0.5
                    * mass
                    * (delta.new_velocity.norm_squared() - delta.old_velocity.norm_squared());
            }
        }
    }

    fn periodic_output(&self, state: &SimState) -> Option<String> {
        let energy = state.units.energy();
        Some(format!(
            "T {:.6}, <T> {:.6}",
            self.temperature() / energy,
            self.average_temperature() / energy
        ))
    }

    fn output(&self, state: &SimState) -> Table {
        let energy = state.units.energy();
        let mut table = Table::new();
        table.insert("temperature".into(), (self.temperature() / energy).into());
        table.insert(
            "average-temperature".into(),
            (self.average_temperature() / energy).into(),
        );
        table
    }

    fn replica_exchange(&mut self, other: &mut dyn OutputPlugin) {
        if let Some(other) = other.as_any_mut().downcast_mut::<KEnergy>() {
            std::mem::swap(&mut self.integral, &mut other.integral);
            std::mem::swap(&mut self.elapsed, &mut other.elapsed);
            std::mem::swap(&mut self.last_time, &mut other.last_time);
        }
    }

    fn temperature_rescale(&mut self, factor: f64) {
        self.kinetic_energy *= factor;
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
