use super::System;
use crate::core::io::document::SystemConfig;
use crate::core::models::ids::ParticleId;
use crate::engine::context::SystemContext;
use crate::engine::error::EngineError;
use crate::engine::event::{Event, EventData, EventSource, EventType};
use crate::engine::state::SimState;
use nalgebra::Vector3;
use rand::Rng;
use rand_distr::{Distribution, Exp, Normal};
use std::any::Any;

/// Andersen thermostat: at exponentially distributed intervals a random particle has its
/// velocity redrawn from the Maxwell-Boltzmann distribution of the bath.
///
/// The bath temperature is read from the ensemble when the simulation is NVT, so replica
/// exchange moves the thermostat along with the ensemble.
#[derive(Debug, Clone)]
pub struct Andersen {
    name: String,
    mean_free_time: f64,
    temperature: f64,
    dt: f64,
    id: usize,
}

impl Andersen {
    pub fn new(name: impl Into<String>, mean_free_time: f64, temperature: f64) -> Self {
        Self {
            name: name.into(),
            mean_free_time,
            temperature,
            dt: f64::INFINITY,
            id: 0,
        }
    }

    fn sample_interval(&self, state: &mut SimState) -> Result<f64, EngineError> {
        if state.n() == 0 {
            return Ok(f64::INFINITY);
        }
        let rate = state.n() as f64 / self.mean_free_time;
        let exp = Exp::new(rate).map_err(|e| {
            EngineError::Consistency(format!("thermostat {} has invalid rate {rate}: {e}", self.name))
        })?;
        Ok(exp.sample(&mut state.rng))
    }

    fn bath_temperature(&self, state: &SimState) -> f64 {
        state.ensemble.temperature().unwrap_or(self.temperature)
    }
}

impl System for Andersen {
    fn name(&self) -> &str {
        &self.name
    }

    fn initialise(&mut self, id: usize, ctx: &mut SystemContext<'_>) -> Result<(), EngineError> {
        self.id = id;
        if !(self.mean_free_time > 0.0 && self.temperature >= 0.0) {
            return Err(crate::engine::config::ConfigError::InvalidValue {
                field: format!("systems.{}", self.name),
                message: "mean free time must be positive and temperature non-negative".into(),
            }
            .into());
        }
        self.dt = self.sample_interval(ctx.state)?;
        Ok(())
    }

    fn next_event(&self) -> Event {
        Event::new(EventSource::System { id: self.id }, EventType::Thermostat, self.dt)
    }

    fn stream(&mut self, dt: f64) {
        self.dt -= dt;
    }

    fn run_event(&mut self, state: &mut SimState) -> Result<EventData, EngineError> {
        let particle = ParticleId(state.rng.gen_range(0..state.n()));
        state.update_particle(particle);

        let mass = state.species_of(particle).mass;
        let sigma = (self.bath_temperature(state) / mass).sqrt();
        let normal = Normal::new(0.0, sigma).map_err(|e| {
            EngineError::Consistency(format!("thermostat {} cannot sample: {e}", self.name))
        })?;
        let velocity = Vector3::from_fn(|_, _| normal.sample(&mut state.rng));
        let delta = state.set_velocity(particle, velocity);

        self.dt = self.sample_interval(state)?;
        Ok(EventData::new(EventType::Thermostat)
            .with_deltas([delta])
            .with_reschedule([particle]))
    }

    fn thermostat_temperature(&self) -> Option<f64> {
        Some(self.temperature)
    }

    fn to_config(&self, state: &SimState) -> Option<SystemConfig> {
        Some(SystemConfig::Andersen {
            name: self.name.clone(),
            mean_free_time: self.mean_free_time / state.units.time,
            temperature: self.bath_temperature(state) / state.units.energy(),
        })
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::particle::Particle;
    use crate::engine::ensemble::Ensemble;
    use crate::engine::interactions::fixtures;

    fn setup() -> (Andersen, SimState) {
        let particles = (0..500)
            .map(|i| Particle::new(ParticleId(i), Vector3::zeros(), Vector3::zeros()))
            .collect();
        let mut state = fixtures::state(particles);
        let mut thermostat = Andersen::new("Thermostat", 1.0, 2.0);
        thermostat
            .initialise(
                0,
                &mut SystemContext {
                    state: &mut state,
                    globals: &[],
                    base_longest_interaction: 1.0,
                },
            )
            .unwrap();
        (thermostat, state)
    }

    #[test]
    fn resampling_approaches_the_bath_temperature() {
        let (mut thermostat, mut state) = setup();
        assert!(thermostat.next_event().dt.is_finite());
        for _ in 0..10_000 {
            thermostat.run_event(&mut state).unwrap();
        }
        let t = state.kinetic_temperature();
        assert!((t - 2.0).abs() < 0.5, "kinetic temperature {t}");
    }

    #[test]
    fn bath_temperature_follows_the_ensemble() {
        let (thermostat, mut state) = setup();
        state.ensemble = Ensemble::Nvt {
            n: 500,
            volume: 1.0,
            temperature: 5.0,
        };
        match thermostat.to_config(&state) {
            Some(SystemConfig::Andersen { temperature, .. }) => assert_eq!(temperature, 5.0),
            other => panic!("unexpected config {other:?}"),
        }
    }

    #[test]
    fn same_seed_same_draws() {
        let (mut a, mut sa) = setup();
        let (mut b, mut sb) = setup();
        for _ in 0..10 {
            a.run_event(&mut sa).unwrap();
            b.run_event(&mut sb).unwrap();
        }
        assert_eq!(sa.particles, sb.particles);
        assert_eq!(a.next_event().dt, b.next_event().dt);
    }
}
