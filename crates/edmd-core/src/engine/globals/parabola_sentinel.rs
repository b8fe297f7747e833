use super::{Global, single_participant};
use crate::core::io::document::GlobalConfig;
use crate::core::models::ids::ParticleId;
use crate::core::models::units::Units;
use crate::engine::context::GlobalContext;
use crate::engine::error::EngineError;
use crate::engine::event::{Event, EventData, EventSource, EventType};
use crate::engine::state::SimState;
use tracing::warn;

/// Stops each particle at the apex of its parabola under an external field, pinning the
/// velocity component along the field to exactly zero so crossing roots stay well posed.
#[derive(Debug, Clone)]
pub struct ParabolaSentinel {
    name: String,
    id: usize,
}

impl ParabolaSentinel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: 0,
        }
    }
}

impl Global for ParabolaSentinel {
    fn name(&self) -> &str {
        &self.name
    }

    fn initialise(&mut self, id: usize, _ctx: &GlobalContext<'_>) -> Result<(), EngineError> {
        self.id = id;
        Ok(())
    }

    fn get_event(&self, particle: ParticleId, state: &SimState) -> Event {
        let source = EventSource::Global {
            id: self.id,
            particle,
        };
        let dt = state.dynamics.parabola_apex_time(state.particle(particle));
        if dt.is_finite() {
            Event::new(source, EventType::VirtualParabola, dt)
        } else {
            Event::none(source)
        }
    }

    fn run_event(&mut self, event: &Event, state: &mut SimState) -> Result<EventData, EngineError> {
        let particle = single_participant(event, &self.name)?;
        let p = state.particle(particle);
        if state.dynamics.parabola_apex_time(p).is_infinite() {
            warn!(
                particle = %particle,
                "Particle drifted past its apex; rescheduling without enforcing."
            );
            return Ok(EventData::new(EventType::VirtualParabola).with_reschedule([particle]));
        }

        let mut apex = p.clone();
        state.dynamics.enforce_parabola(&mut apex);
        let delta = state.set_velocity(particle, apex.velocity);
        Ok(EventData::new(EventType::VirtualParabola)
            .with_deltas([delta])
            .with_reschedule([particle]))
    }

    fn to_config(&self, _units: &Units) -> GlobalConfig {
        GlobalConfig::ParabolaSentinel {
            name: self.name.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::particle::Particle;
    use crate::engine::dynamics::Dynamics;
    use crate::engine::interactions::fixtures;
    use nalgebra::Vector3;

    fn setup(vz: f64) -> (ParabolaSentinel, SimState) {
        let mut state = fixtures::state(vec![Particle::new(
            ParticleId(0),
            Vector3::zeros(),
            Vector3::new(1.0, 0.0, vz),
        )]);
        state.dynamics = Dynamics::Gravity {
            g: Vector3::new(0.0, 0.0, -1.0),
        };
        (ParabolaSentinel::new("ParabolaSentinel"), state)
    }

    #[test]
    fn apex_is_enforced_exactly() {
        let (mut sentinel, mut state) = setup(2.0);
        let event = sentinel.get_event(ParticleId(0), &state);
        assert_eq!(event.event_type, EventType::VirtualParabola);
        assert!((event.dt - 2.0).abs() < 1e-12);

        state.advance(event.dt * (1.0 - 1e-12));
        state.update_all_particles();
        sentinel.run_event(&event, &mut state).unwrap();
        let v = state.particle(ParticleId(0)).velocity;
        assert_eq!(v.z, 0.0);
        assert_eq!(v.x, 1.0);
    }

    #[test]
    fn drifted_past_apex_is_left_alone() {
        let (mut sentinel, mut state) = setup(-0.1);
        let event = Event::new(
            EventSource::Global {
                id: 0,
                particle: ParticleId(0),
            },
            EventType::VirtualParabola,
            0.0,
        );
        assert!(sentinel.get_event(ParticleId(0), &state).is_none());
        let data = sentinel.run_event(&event, &mut state).unwrap();
        assert!(data.deltas.is_empty());
        assert_eq!(state.particle(ParticleId(0)).velocity.z, -0.1);
    }
}
