use super::{Global, single_participant};
use crate::core::io::document::GlobalConfig;
use crate::core::models::ids::ParticleId;
use crate::core::models::units::Units;
use crate::core::physics::roots::travel_time;
use crate::engine::context::GlobalContext;
use crate::engine::error::EngineError;
use crate::engine::event::{Event, EventData, EventSource, EventType};
use crate::engine::state::SimState;

/// Re-examines a particle before it can travel far enough for the minimum image of one of
/// its pairs to flip, which would invalidate pair events predicted on the old image.
#[derive(Debug, Clone)]
pub struct PbcSentinel {
    name: String,
    id: usize,
    half_box: f64,
    /// Longest interaction distance before compression growth.
    base_interaction: f64,
}

impl PbcSentinel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: 0,
            half_box: f64::INFINITY,
            base_interaction: 0.0,
        }
    }
}

impl Global for PbcSentinel {
    fn name(&self) -> &str {
        &self.name
    }

    fn initialise(&mut self, id: usize, ctx: &GlobalContext<'_>) -> Result<(), EngineError> {
        self.id = id;
        self.half_box = 0.5 * ctx.state.primary_cell.min();
        self.base_interaction =
            ctx.longest_interaction / ctx.state.dynamics.growth_factor(ctx.state.system_time);
        Ok(())
    }

    fn get_event(&self, particle: ParticleId, state: &SimState) -> Event {
        let source = EventSource::Global {
            id: self.id,
            particle,
        };
        let reach = self.half_box
            - self.base_interaction * state.dynamics.growth_factor(state.system_time);
        if reach <= 0.0 {
            return Event::none(source);
        }
        let p = state.particle(particle);
        let accel = state.dynamics.acceleration(p).norm();
        let dt = travel_time(reach, p.velocity.norm(), accel);
        if dt.is_finite() {
            Event::new(source, EventType::Virtual, dt)
        } else {
            Event::none(source)
        }
    }

    fn run_event(&mut self, event: &Event, _state: &mut SimState) -> Result<EventData, EngineError> {
        let particle = single_participant(event, &self.name)?;
        Ok(EventData::new(EventType::Virtual).with_reschedule([particle]))
    }

    fn to_config(&self, _units: &Units) -> GlobalConfig {
        GlobalConfig::PbcSentinel {
            name: self.name.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::particle::Particle;
    use crate::engine::interactions::fixtures;
    use nalgebra::Vector3;

    #[test]
    fn fires_before_half_a_box_minus_the_interaction_range() {
        let state = fixtures::state(vec![Particle::new(
            ParticleId(0),
            Vector3::zeros(),
            Vector3::new(0.0, 3.0, 4.0),
        )]);
        let mut sentinel = PbcSentinel::new("PBCSentinel");
        sentinel
            .initialise(
                1,
                &GlobalContext {
                    state: &state,
                    locals: &[],
                    longest_interaction: 1.0,
                },
            )
            .unwrap();
        let event = sentinel.get_event(ParticleId(0), &state);
        assert_eq!(event.event_type, EventType::Virtual);
        assert!((event.dt - 9.0 / 5.0).abs() < 1e-12);
    }

    #[test]
    fn resting_particle_needs_no_sentinel() {
        let state = fixtures::state(vec![Particle::new(
            ParticleId(0),
            Vector3::zeros(),
            Vector3::zeros(),
        )]);
        let sentinel = PbcSentinel::new("PBCSentinel");
        assert!(sentinel.get_event(ParticleId(0), &state).is_none());
    }
}
